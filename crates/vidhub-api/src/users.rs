use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};

use vidhub_db::models::Pagination;
use vidhub_types::api::{Page, PageQuery, UpdateAccountRequest};

use crate::auth::{AppState, discard_assets, run_db};
use crate::error::{ApiError, ApiResult, respond};
use crate::extract::{JsonBody, MultipartForm, QueryParams, required};
use crate::middleware::AuthUser;
use crate::views;

/// GET /users/current-user
pub async fn current_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    let uid = user.id_str();
    let row = run_db(&state, move |db| db.get_user_by_id(&uid))
        .await?
        .ok_or_else(|| ApiError::not_found("User does not exist"))?;

    Ok(respond(
        StatusCode::OK,
        views::user_profile(&row),
        "Current user fetched successfully",
    ))
}

/// PATCH /users/update-account
pub async fn update_account(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(req): JsonBody<UpdateAccountRequest>,
) -> ApiResult<impl IntoResponse> {
    let full_name = required(Some(req.full_name.as_str()), "Full name")?;
    let email = required(Some(req.email.as_str()), "Email")?.to_lowercase();
    if !email.contains('@') {
        return Err(ApiError::validation("Email is invalid"));
    }

    let (uid, e) = (user.id_str(), email.clone());
    let taken = run_db(&state, move |db| {
        db.user_conflicts(None, Some(e.as_str()), Some(uid.as_str()))
    })
    .await?;
    if taken {
        return Err(ApiError::Conflict("Email is already in use".into()));
    }

    let uid = user.id_str();
    let row = run_db(&state, move |db| db.update_account(&uid, &full_name, &email))
        .await
        .map_err(|e| ApiError::from_db(e, "Email is already in use"))?
        .ok_or_else(|| ApiError::not_found("User does not exist"))?;

    Ok(respond(
        StatusCode::OK,
        views::user_profile(&row),
        "Account details updated successfully",
    ))
}

#[derive(Clone, Copy)]
enum ProfileImage {
    Avatar,
    Cover,
}

impl ProfileImage {
    fn field(self) -> &'static str {
        match self {
            Self::Avatar => "avatar",
            Self::Cover => "coverImage",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Avatar => "Avatar",
            Self::Cover => "Cover image",
        }
    }
}

/// Upload a new image, point the user at it, then drop the old asset.
async fn replace_image(
    state: AppState,
    user: AuthUser,
    mut form: MultipartForm,
    kind: ProfileImage,
) -> ApiResult<impl IntoResponse> {
    let file = form
        .take_file(kind.field())
        .ok_or_else(|| ApiError::validation(format!("{} file is missing", kind.label())))?;

    let stored = state
        .media
        .upload(&file.bytes, file.file_name.as_deref())
        .await?;

    let (uid, url, sid) = (user.id_str(), stored.url.clone(), stored.storage_id.clone());
    let previous = run_db(&state, move |db| match kind {
        ProfileImage::Avatar => db.replace_avatar(&uid, &url, &sid),
        ProfileImage::Cover => db.replace_cover_image(&uid, &url, &sid),
    })
    .await;

    let previous = match previous {
        Ok(previous) => previous,
        Err(e) => {
            discard_assets(&state, &[stored.storage_id.as_str()]).await;
            return Err(e.into());
        }
    };

    if let Some(old) = previous {
        if let Err(e) = state.media.delete(&old).await {
            warn!("Failed to delete previous {} {}: {:#}", kind.field(), old, e);
        }
    }

    let uid = user.id_str();
    let row = run_db(&state, move |db| db.get_user_by_id(&uid))
        .await?
        .ok_or_else(|| ApiError::not_found("User does not exist"))?;

    info!("User {} replaced their {}", user.username, kind.field());
    Ok(respond(
        StatusCode::OK,
        views::user_profile(&row),
        &format!("{} updated successfully", kind.label()),
    ))
}

/// PATCH /users/avatar
pub async fn update_avatar(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    form: MultipartForm,
) -> ApiResult<impl IntoResponse> {
    replace_image(state, user, form, ProfileImage::Avatar).await
}

/// PATCH /users/cover-image
pub async fn update_cover_image(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    form: MultipartForm,
) -> ApiResult<impl IntoResponse> {
    replace_image(state, user, form, ProfileImage::Cover).await
}

/// GET /users/c/{username}
pub async fn channel_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(username): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let username = required(Some(username.as_str()), "Username")?.to_lowercase();
    let viewer = user.id_str();
    let row = run_db(&state, move |db| db.channel_profile(&username, &viewer))
        .await?
        .ok_or_else(|| ApiError::not_found("Channel does not exist"))?;

    Ok(respond(
        StatusCode::OK,
        views::channel_profile(row),
        "Channel fetched successfully",
    ))
}

/// GET /users/history
pub async fn watch_history(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    QueryParams(q): QueryParams<PageQuery>,
) -> ApiResult<impl IntoResponse> {
    let page = Pagination::new(q.page, q.limit);
    let uid = user.id_str();
    let (rows, total) = run_db(&state, move |db| db.watch_history(&uid, page)).await?;

    let docs = rows.into_iter().map(views::video_summary).collect();
    Ok(respond(
        StatusCode::OK,
        Page::new(docs, page.page, page.limit, total),
        "Watch history fetched successfully",
    ))
}

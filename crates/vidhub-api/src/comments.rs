use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use vidhub_db::models::{CommentRow, Pagination};
use vidhub_types::api::{ContentRequest, Empty, Page, PageQuery};

use crate::auth::{AppState, run_db};
use crate::error::{ApiError, ApiResult, respond};
use crate::extract::{JsonBody, QueryParams, parse_id, required};
use crate::middleware::AuthUser;
use crate::views;

/// True when the video exists and the viewer may see it.
async fn video_visible(state: &AppState, video_id: &str, viewer: &str) -> ApiResult<bool> {
    let (vid, uid) = (video_id.to_string(), viewer.to_string());
    let visible = run_db(state, move |db| {
        Ok(db
            .get_video(&vid)?
            .is_some_and(|v| v.is_published || v.owner_id == uid))
    })
    .await?;
    Ok(visible)
}

async fn load_comment(state: &AppState, comment_id: Uuid) -> ApiResult<CommentRow> {
    let cid = comment_id.to_string();
    run_db(state, move |db| db.get_comment(&cid))
        .await?
        .ok_or_else(|| ApiError::not_found("Comment does not exist"))
}

/// GET /comments/{videoId}
pub async fn list_comments(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(video_id): Path<String>,
    QueryParams(q): QueryParams<PageQuery>,
) -> ApiResult<impl IntoResponse> {
    let video_id = parse_id(&video_id, "video")?.to_string();
    let viewer = user.id_str();
    if !video_visible(&state, &video_id, &viewer).await? {
        return Err(ApiError::not_found("Video does not exist"));
    }

    let page = Pagination::new(q.page, q.limit);
    let (rows, total) = run_db(&state, move |db| db.comment_views(&video_id, &viewer, page)).await?;

    let docs = rows.into_iter().map(views::comment_view).collect();
    Ok(respond(
        StatusCode::OK,
        Page::new(docs, page.page, page.limit, total),
        "Comments fetched successfully",
    ))
}

/// POST /comments/{videoId}
pub async fn add_comment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(video_id): Path<String>,
    JsonBody(req): JsonBody<ContentRequest>,
) -> ApiResult<impl IntoResponse> {
    let video_id = parse_id(&video_id, "video")?.to_string();
    let content = required(Some(req.content.as_str()), "Content")?;
    let owner = user.id_str();
    if !video_visible(&state, &video_id, &owner).await? {
        return Err(ApiError::not_found("Video does not exist"));
    }

    let id = Uuid::new_v4().to_string();
    let row = run_db(&state, move |db| db.insert_comment(&id, &video_id, &owner, &content)).await?;

    Ok(respond(
        StatusCode::CREATED,
        views::comment(row),
        "Comment added successfully",
    ))
}

/// PATCH /comments/c/{commentId}
pub async fn update_comment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(comment_id): Path<String>,
    JsonBody(req): JsonBody<ContentRequest>,
) -> ApiResult<impl IntoResponse> {
    let comment_id = parse_id(&comment_id, "comment")?;
    let content = required(Some(req.content.as_str()), "Content")?;

    let comment = load_comment(&state, comment_id).await?;
    if comment.owner_id != user.id_str() {
        return Err(ApiError::forbidden());
    }

    let cid = comment.id;
    let row = run_db(&state, move |db| db.update_comment(&cid, &content))
        .await?
        .ok_or_else(|| ApiError::not_found("Comment does not exist"))?;

    Ok(respond(
        StatusCode::OK,
        views::comment(row),
        "Comment updated successfully",
    ))
}

/// DELETE /comments/c/{commentId}: allowed for the comment's author and
/// for the owner of the video it was left on.
pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(comment_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let comment_id = parse_id(&comment_id, "comment")?;
    let comment = load_comment(&state, comment_id).await?;
    let uid = user.id_str();

    if comment.owner_id != uid {
        let vid = comment.video_id.clone();
        let video_owner = run_db(&state, move |db| Ok(db.get_video(&vid)?.map(|v| v.owner_id)))
            .await?;
        if video_owner.as_deref() != Some(uid.as_str()) {
            return Err(ApiError::forbidden());
        }
    }

    let cid = comment.id;
    if !run_db(&state, move |db| db.delete_comment(&cid)).await? {
        return Err(ApiError::not_found("Comment does not exist"));
    }

    Ok(respond(StatusCode::OK, Empty::default(), "Comment deleted successfully"))
}

use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use vidhub_db::models::{NewVideo, Pagination, VideoChanges, VideoFilter, VideoSort};
use vidhub_db::Database;
use vidhub_types::api::{Empty, Page, PublishStatus, VideoListQuery};

use crate::auth::{AppState, discard_assets, run_db};
use crate::error::{ApiError, ApiResult, respond};
use crate::extract::{MultipartForm, QueryParams, optional, parse_id, required};
use crate::middleware::AuthUser;
use crate::views;

const SIDE_EFFECT_ATTEMPTS: u32 = 3;

/// Load a video the caller owns, or fail with 404/403.
async fn owned_video(
    state: &AppState,
    user: &AuthUser,
    video_id: Uuid,
) -> ApiResult<vidhub_db::models::VideoRow> {
    let vid = video_id.to_string();
    let video = run_db(state, move |db| db.get_video(&vid))
        .await?
        .ok_or_else(|| ApiError::not_found("Video does not exist"))?;
    if video.owner_id != user.id_str() {
        return Err(ApiError::forbidden());
    }
    Ok(video)
}

/// POST /videos: multipart: title, description, duration, video, thumbnail.
pub async fn publish_video(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    mut form: MultipartForm,
) -> ApiResult<impl IntoResponse> {
    let title = required(form.text("title"), "Title")?;
    let description = required(form.text("description"), "Description")?;
    let duration = match optional(form.text("duration")) {
        Some(raw) => raw
            .parse::<f64>()
            .ok()
            .filter(|d| d.is_finite() && *d >= 0.0)
            .ok_or_else(|| ApiError::validation("Duration must be a non-negative number"))?,
        None => 0.0,
    };

    let video_file = form
        .take_file("video")
        .or_else(|| form.take_file("videoFile"))
        .ok_or_else(|| ApiError::validation("Video file is required"))?;
    let thumbnail = form
        .take_file("thumbnail")
        .ok_or_else(|| ApiError::validation("Thumbnail is required"))?;

    let video_asset = state
        .media
        .upload(&video_file.bytes, video_file.file_name.as_deref())
        .await?;
    let thumb_asset = match state
        .media
        .upload(&thumbnail.bytes, thumbnail.file_name.as_deref())
        .await
    {
        Ok(stored) => stored,
        Err(e) => {
            discard_assets(&state, &[video_asset.storage_id.as_str()]).await;
            return Err(e.into());
        }
    };

    let insert = {
        let id = Uuid::new_v4().to_string();
        let owner = user.id_str();
        let (v, t) = (video_asset.clone(), thumb_asset.clone());
        run_db(&state, move |db| {
            db.insert_video(&NewVideo {
                id: &id,
                owner_id: &owner,
                video_url: &v.url,
                video_storage_id: &v.storage_id,
                thumbnail_url: &t.url,
                thumbnail_storage_id: &t.storage_id,
                title: &title,
                description: &description,
                duration,
            })
        })
        .await
    };

    let row = match insert {
        Ok(row) => row,
        Err(e) => {
            let ids = [
                video_asset.storage_id.as_str(),
                thumb_asset.storage_id.as_str(),
            ];
            discard_assets(&state, &ids).await;
            return Err(e.into());
        }
    };

    info!("User {} published video {}", user.username, row.id);
    Ok(respond(
        StatusCode::CREATED,
        views::video(row),
        "Video published successfully",
    ))
}

/// Retry a fire-and-continue write. Failures are logged, never returned.
async fn with_retries<F>(state: &AppState, what: &str, f: F) -> bool
where
    F: Fn(&Database) -> anyhow::Result<bool> + Clone + Send + 'static,
{
    for attempt in 1..=SIDE_EFFECT_ATTEMPTS {
        let op = f.clone();
        match run_db(state, move |db| op(db)).await {
            Ok(done) => return done,
            Err(e) => warn!(
                "{} failed (attempt {}/{}): {:#}",
                what, attempt, SIDE_EFFECT_ATTEMPTS, e
            ),
        }
    }
    error!("{} gave up after {} attempts", what, SIDE_EFFECT_ATTEMPTS);
    false
}

/// GET /videos/{videoId}: also counts a view and records watch history.
pub async fn get_video(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(video_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let video_id = parse_id(&video_id, "video")?.to_string();
    let viewer = user.id_str();

    let (vid, uid) = (video_id.clone(), viewer.clone());
    let mut detail = run_db(&state, move |db| db.video_detail(&vid, &uid))
        .await?
        .ok_or_else(|| ApiError::not_found("Video does not exist"))?;

    let vid = video_id.clone();
    let counted = with_retries(&state, "View increment", move |db| db.increment_views(&vid)).await;
    if counted {
        detail.video.views += 1;
    }

    let (vid, uid) = (video_id.clone(), viewer);
    with_retries(&state, "Watch history update", move |db| {
        db.add_to_watch_history(&uid, &vid).map(|()| true)
    })
    .await;

    Ok(respond(
        StatusCode::OK,
        views::video_detail(detail),
        "Video fetched successfully",
    ))
}

/// GET /videos: paginated, searchable, sortable listing.
pub async fn list_videos(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    QueryParams(q): QueryParams<VideoListQuery>,
) -> ApiResult<impl IntoResponse> {
    let pagination = Pagination::new(q.page, q.limit);

    let sort = match optional(q.sort_by.as_deref()) {
        Some(raw) => VideoSort::parse(&raw)
            .ok_or_else(|| ApiError::validation(format!("Cannot sort by '{raw}'")))?,
        None => VideoSort::default(),
    };
    let ascending = match optional(q.sort_type.as_deref()).as_deref() {
        None | Some("desc") => false,
        Some("asc") => true,
        Some(other) => {
            return Err(ApiError::validation(format!(
                "sortType must be 'asc' or 'desc', got '{other}'"
            )));
        }
    };
    let owner = match optional(q.user_id.as_deref()) {
        Some(raw) => Some(parse_id(&raw, "user")?.to_string()),
        None => None,
    };
    let search_tokens: Vec<String> = q
        .query
        .as_deref()
        .unwrap_or_default()
        .split_whitespace()
        .map(str::to_string)
        .collect();

    let viewer = user.id_str();
    let (rows, total) = run_db(&state, move |db| {
        db.list_videos(&VideoFilter {
            owner_id: owner.as_deref(),
            search_tokens,
            viewer_id: &viewer,
            sort,
            ascending,
            pagination,
        })
    })
    .await?;

    let docs = rows.into_iter().map(views::video_summary).collect();
    Ok(respond(
        StatusCode::OK,
        Page::new(docs, pagination.page, pagination.limit, total),
        "Videos fetched successfully",
    ))
}

/// PATCH /videos/{videoId}: multipart with optional title, description, thumbnail.
pub async fn update_video(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(video_id): Path<String>,
    mut form: MultipartForm,
) -> ApiResult<impl IntoResponse> {
    let video_id = parse_id(&video_id, "video")?;
    let title = optional(form.text("title"));
    let description = optional(form.text("description"));
    let thumbnail = form.take_file("thumbnail");

    if title.is_none() && description.is_none() && thumbnail.is_none() {
        return Err(ApiError::validation(
            "Provide a title, description or thumbnail to update",
        ));
    }

    let existing = owned_video(&state, &user, video_id).await?;

    let new_thumb = match thumbnail {
        Some(file) => Some(
            state
                .media
                .upload(&file.bytes, file.file_name.as_deref())
                .await?,
        ),
        None => None,
    };

    let update = {
        let vid = video_id.to_string();
        let thumb = new_thumb.clone();
        run_db(&state, move |db| {
            db.update_video(
                &vid,
                &VideoChanges {
                    title: title.as_deref(),
                    description: description.as_deref(),
                    thumbnail: thumb
                        .as_ref()
                        .map(|t| (t.url.as_str(), t.storage_id.as_str())),
                },
            )
        })
        .await
    };

    let row = match update {
        Ok(Some(row)) => Ok(row),
        Ok(None) => Err(ApiError::not_found("Video does not exist")),
        Err(e) => Err(ApiError::from(e)),
    };
    let row = match row {
        Ok(row) => row,
        Err(e) => {
            if let Some(t) = &new_thumb {
                discard_assets(&state, &[t.storage_id.as_str()]).await;
            }
            return Err(e);
        }
    };

    if new_thumb.is_some() {
        if let Err(e) = state.media.delete(&existing.thumbnail_storage_id).await {
            warn!(
                "Failed to delete replaced thumbnail {}: {:#}",
                existing.thumbnail_storage_id, e
            );
        }
    }

    Ok(respond(
        StatusCode::OK,
        views::video(row),
        "Video updated successfully",
    ))
}

/// DELETE /videos/{videoId}
pub async fn delete_video(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(video_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let video_id = parse_id(&video_id, "video")?;
    owned_video(&state, &user, video_id).await?;

    let vid = video_id.to_string();
    let deleted = run_db(&state, move |db| db.delete_video(&vid))
        .await?
        .ok_or_else(|| ApiError::not_found("Video does not exist"))?;

    for storage_id in [&deleted.video_storage_id, &deleted.thumbnail_storage_id] {
        if let Err(e) = state.media.delete(storage_id).await {
            warn!("Video {} deleted but asset {} remains: {:#}", deleted.id, storage_id, e);
        }
    }

    info!("User {} deleted video {}", user.username, deleted.id);
    Ok(respond(StatusCode::OK, Empty::default(), "Video deleted successfully"))
}

/// PATCH /videos/toggle/publish/{videoId}
pub async fn toggle_publish(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(video_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let video_id = parse_id(&video_id, "video")?;
    owned_video(&state, &user, video_id).await?;

    let vid = video_id.to_string();
    let is_published = run_db(&state, move |db| db.toggle_published(&vid))
        .await?
        .ok_or_else(|| ApiError::not_found("Video does not exist"))?;

    Ok(respond(
        StatusCode::OK,
        PublishStatus { is_published },
        "Publish status toggled successfully",
    ))
}

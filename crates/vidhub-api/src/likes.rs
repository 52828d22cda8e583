use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::debug;

use vidhub_db::models::{LikeTarget, Pagination};
use vidhub_types::api::{Page, PageQuery, ToggleResponse};

use crate::auth::{AppState, run_db};
use crate::error::{ApiError, ApiResult, respond};
use crate::extract::{QueryParams, parse_id};
use crate::middleware::AuthUser;
use crate::views;

fn describe(target: LikeTarget) -> &'static str {
    match target {
        LikeTarget::Video => "video",
        LikeTarget::Comment => "comment",
        LikeTarget::Tweet => "tweet",
    }
}

/// Shared toggle flow: validate the key, then check and flip in one step.
/// Unpublished videos and their comments only exist for the video's owner.
async fn toggle(
    state: AppState,
    user: AuthUser,
    target: LikeTarget,
    raw_id: String,
) -> ApiResult<impl IntoResponse> {
    let what = describe(target);
    let target_id = parse_id(&raw_id, what)?.to_string();
    let (uid, tid) = (user.id_str(), target_id.clone());

    let active = run_db(&state, move |db| db.toggle_like(&uid, target, &tid))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("{} does not exist", capitalize(what))))?;

    debug!("User {} like on {} {} -> {}", user.username, what, target_id, active);
    let message = if active {
        format!("Liked {what} successfully")
    } else {
        format!("Unliked {what} successfully")
    };
    Ok(respond(StatusCode::OK, ToggleResponse { active }, &message))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// POST /likes/toggle/v/{videoId}
pub async fn toggle_video_like(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(video_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    toggle(state, user, LikeTarget::Video, video_id).await
}

/// POST /likes/toggle/c/{commentId}
pub async fn toggle_comment_like(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(comment_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    toggle(state, user, LikeTarget::Comment, comment_id).await
}

/// POST /likes/toggle/t/{tweetId}
pub async fn toggle_tweet_like(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(tweet_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    toggle(state, user, LikeTarget::Tweet, tweet_id).await
}

/// GET /likes/videos
pub async fn liked_videos(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    QueryParams(q): QueryParams<PageQuery>,
) -> ApiResult<impl IntoResponse> {
    let page = Pagination::new(q.page, q.limit);
    let uid = user.id_str();
    let (rows, total) = run_db(&state, move |db| db.liked_videos(&uid, page)).await?;

    let docs = rows.into_iter().map(views::video_summary).collect();
    Ok(respond(
        StatusCode::OK,
        Page::new(docs, page.page, page.limit, total),
        "Liked videos fetched successfully",
    ))
}

use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use vidhub_db::models::Pagination;
use vidhub_types::api::{Page, PageQuery, ToggleResponse};

use crate::auth::{AppState, run_db};
use crate::error::{ApiError, ApiResult, respond};
use crate::extract::{QueryParams, parse_id};
use crate::middleware::AuthUser;
use crate::views;

/// POST /subscriptions/c/{channelId}
pub async fn toggle_subscription(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(channel_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let channel_id = parse_id(&channel_id, "channel")?;
    if channel_id == user.id {
        return Err(ApiError::validation("You cannot subscribe to your own channel"));
    }

    let (cid, uid) = (channel_id.to_string(), user.id_str());
    let active = run_db(&state, move |db| db.toggle_subscription(&uid, &cid))
        .await?
        .ok_or_else(|| ApiError::not_found("Channel does not exist"))?;

    info!(
        "User {} {} channel {}",
        user.username,
        if active { "subscribed to" } else { "unsubscribed from" },
        channel_id
    );
    let message = if active {
        "Subscribed successfully"
    } else {
        "Unsubscribed successfully"
    };
    Ok(respond(StatusCode::OK, ToggleResponse { active }, message))
}

/// GET /subscriptions/c/{channelId}: the channel's subscribers.
pub async fn channel_subscribers(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(channel_id): Path<String>,
    QueryParams(q): QueryParams<PageQuery>,
) -> ApiResult<impl IntoResponse> {
    let channel_id = parse_id(&channel_id, "channel")?.to_string();
    let page = Pagination::new(q.page, q.limit);
    let viewer = user.id_str();

    let (rows, total) = run_db(&state, move |db| {
        if db.get_user_by_id(&channel_id)?.is_none() {
            return Ok(None);
        }
        db.channel_subscribers(&channel_id, &viewer, page).map(Some)
    })
    .await?
        .ok_or_else(|| ApiError::not_found("Channel does not exist"))?;

    let docs = rows.into_iter().map(views::channel_summary).collect();
    Ok(respond(
        StatusCode::OK,
        Page::new(docs, page.page, page.limit, total),
        "Subscribers fetched successfully",
    ))
}

/// GET /subscriptions/u/{subscriberId}: channels the user follows.
pub async fn subscribed_channels(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(subscriber_id): Path<String>,
    QueryParams(q): QueryParams<PageQuery>,
) -> ApiResult<impl IntoResponse> {
    let subscriber_id = parse_id(&subscriber_id, "subscriber")?.to_string();
    let page = Pagination::new(q.page, q.limit);
    let viewer = user.id_str();

    let (rows, total) = run_db(&state, move |db| {
        if db.get_user_by_id(&subscriber_id)?.is_none() {
            return Ok(None);
        }
        db.subscribed_channels(&subscriber_id, &viewer, page).map(Some)
    })
    .await?
    .ok_or_else(|| ApiError::not_found("User does not exist"))?;

    let docs = rows.into_iter().map(views::channel_summary).collect();
    Ok(respond(
        StatusCode::OK,
        Page::new(docs, page.page, page.limit, total),
        "Subscribed channels fetched successfully",
    ))
}

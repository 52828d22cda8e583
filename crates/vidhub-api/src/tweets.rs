use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use vidhub_db::models::{Pagination, TweetRow};
use vidhub_types::api::{ContentRequest, Empty, Page, PageQuery};

use crate::auth::{AppState, run_db};
use crate::error::{ApiError, ApiResult, respond};
use crate::extract::{JsonBody, QueryParams, parse_id, required};
use crate::middleware::AuthUser;
use crate::views;

async fn owned_tweet(state: &AppState, user: &AuthUser, raw_id: &str) -> ApiResult<TweetRow> {
    let tid = parse_id(raw_id, "tweet")?.to_string();
    let tweet = run_db(state, move |db| db.get_tweet(&tid))
        .await?
        .ok_or_else(|| ApiError::not_found("Tweet does not exist"))?;
    if tweet.owner_id != user.id_str() {
        return Err(ApiError::forbidden());
    }
    Ok(tweet)
}

/// POST /tweets
pub async fn create_tweet(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(req): JsonBody<ContentRequest>,
) -> ApiResult<impl IntoResponse> {
    let content = required(Some(req.content.as_str()), "Content")?;
    let (id, owner) = (Uuid::new_v4().to_string(), user.id_str());
    let row = run_db(&state, move |db| db.insert_tweet(&id, &owner, &content)).await?;

    Ok(respond(
        StatusCode::CREATED,
        views::tweet(row),
        "Tweet created successfully",
    ))
}

/// GET /tweets/user/{userId}
pub async fn user_tweets(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(user_id): Path<String>,
    QueryParams(q): QueryParams<PageQuery>,
) -> ApiResult<impl IntoResponse> {
    let owner = parse_id(&user_id, "user")?.to_string();
    let page = Pagination::new(q.page, q.limit);
    let viewer = user.id_str();

    let (rows, total) = run_db(&state, move |db| {
        if db.get_user_by_id(&owner)?.is_none() {
            return Ok(None);
        }
        db.tweet_views(&owner, &viewer, page).map(Some)
    })
    .await?
    .ok_or_else(|| ApiError::not_found("User does not exist"))?;

    let docs = rows.into_iter().map(views::tweet_view).collect();
    Ok(respond(
        StatusCode::OK,
        Page::new(docs, page.page, page.limit, total),
        "Tweets fetched successfully",
    ))
}

/// PATCH /tweets/{tweetId}
pub async fn update_tweet(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(tweet_id): Path<String>,
    JsonBody(req): JsonBody<ContentRequest>,
) -> ApiResult<impl IntoResponse> {
    let content = required(Some(req.content.as_str()), "Content")?;
    let tweet = owned_tweet(&state, &user, &tweet_id).await?;

    let tid = tweet.id;
    let row = run_db(&state, move |db| db.update_tweet(&tid, &content))
        .await?
        .ok_or_else(|| ApiError::not_found("Tweet does not exist"))?;

    Ok(respond(StatusCode::OK, views::tweet(row), "Tweet updated successfully"))
}

/// DELETE /tweets/{tweetId}
pub async fn delete_tweet(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(tweet_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let tweet = owned_tweet(&state, &user, &tweet_id).await?;

    let tid = tweet.id;
    if !run_db(&state, move |db| db.delete_tweet(&tid)).await? {
        return Err(ApiError::not_found("Tweet does not exist"));
    }

    Ok(respond(StatusCode::OK, Empty::default(), "Tweet deleted successfully"))
}

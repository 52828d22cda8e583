use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, patch, post},
};
use serde_json::json;

use crate::auth::{self, AppState};
use crate::error::respond;
use crate::middleware::require_auth;
use crate::{comments, likes, media, playlists, subscriptions, tweets, users, videos};

/// GET /healthcheck
async fn healthcheck() -> impl IntoResponse {
    respond(StatusCode::OK, json!({ "status": "OK" }), "Service is healthy")
}

/// Every `/api/v1` route. `max_upload_bytes` caps multipart bodies.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let public_routes = Router::new()
        .route("/healthcheck", get(healthcheck))
        .route("/users/register", post(auth::register))
        .route("/users/login", post(auth::login))
        .route("/users/refresh-token", post(auth::refresh_token))
        .route("/media/{storage_id}", get(media::serve_media));

    let protected_routes = Router::new()
        // Users
        .route("/users/logout", post(auth::logout))
        .route("/users/change-password", post(auth::change_password))
        .route("/users/current-user", get(users::current_user))
        .route("/users/update-account", patch(users::update_account))
        .route("/users/avatar", patch(users::update_avatar))
        .route("/users/cover-image", patch(users::update_cover_image))
        .route("/users/c/{username}", get(users::channel_profile))
        .route("/users/history", get(users::watch_history))
        // Videos
        .route("/videos", get(videos::list_videos).post(videos::publish_video))
        .route(
            "/videos/{video_id}",
            get(videos::get_video)
                .patch(videos::update_video)
                .delete(videos::delete_video),
        )
        .route("/videos/toggle/publish/{video_id}", patch(videos::toggle_publish))
        // Likes
        .route("/likes/toggle/v/{video_id}", post(likes::toggle_video_like))
        .route("/likes/toggle/c/{comment_id}", post(likes::toggle_comment_like))
        .route("/likes/toggle/t/{tweet_id}", post(likes::toggle_tweet_like))
        .route("/likes/videos", get(likes::liked_videos))
        // Subscriptions
        .route(
            "/subscriptions/c/{channel_id}",
            get(subscriptions::channel_subscribers).post(subscriptions::toggle_subscription),
        )
        .route("/subscriptions/u/{subscriber_id}", get(subscriptions::subscribed_channels))
        // Comments
        .route(
            "/comments/{video_id}",
            get(comments::list_comments).post(comments::add_comment),
        )
        .route(
            "/comments/c/{comment_id}",
            patch(comments::update_comment).delete(comments::delete_comment),
        )
        // Tweets
        .route("/tweets", post(tweets::create_tweet))
        .route("/tweets/user/{user_id}", get(tweets::user_tweets))
        .route(
            "/tweets/{tweet_id}",
            patch(tweets::update_tweet).delete(tweets::delete_tweet),
        )
        // Playlists
        .route("/playlist", post(playlists::create_playlist))
        .route(
            "/playlist/{playlist_id}",
            get(playlists::get_playlist)
                .patch(playlists::update_playlist)
                .delete(playlists::delete_playlist),
        )
        .route("/playlist/add/{video_id}/{playlist_id}", patch(playlists::add_video))
        .route(
            "/playlist/remove/{video_id}/{playlist_id}",
            patch(playlists::remove_video),
        )
        .route("/playlist/user/{user_id}", get(playlists::user_playlists))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let api = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state);

    Router::new().nest("/api/v1", api)
}

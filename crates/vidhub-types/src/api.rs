use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{OwnerSummary, UserProfile};

// -- Envelopes --

/// Success envelope shared by every endpoint.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status_code: u16,
    pub data: T,
    pub message: String,
    pub success: bool,
}

impl<T> ApiResponse<T> {
    pub fn new(status_code: u16, data: T, message: impl Into<String>) -> Self {
        Self {
            status_code,
            data,
            message: message.into(),
            success: true,
        }
    }
}

/// Error envelope. `success` is always false.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub message: String,
    pub success: bool,
    pub errors: Vec<String>,
}

/// Empty `data` payload for operations that only report success.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Empty {}

// -- JWT Claims --

/// Access token claims, verified by the auth middleware on every protected request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub email: String,
    pub exp: usize,
    pub jti: Uuid,
}

/// Refresh token claims. Only the subject matters; the token itself is
/// compared against the value stored on the user record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: Uuid,
    pub exp: usize,
    pub jti: Uuid,
}

// -- Auth --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default, alias = "userNameOrEmail", alias = "username", alias = "email")]
    pub identifier: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    pub user: UserProfile,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
}

// -- Channels & subscriptions --

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProfile {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub avatar: String,
    pub cover_image: Option<String>,
    pub subscribers_count: i64,
    pub channels_subscribed_to_count: i64,
    pub is_subscribed: bool,
    pub created_at: DateTime<Utc>,
}

/// A channel or subscriber as listed by the subscription endpoints.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSummary {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub avatar: String,
    pub subscribers_count: i64,
    pub is_subscribed: bool,
}

/// Owner block embedded in a video detail view.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelOwner {
    pub id: Uuid,
    pub username: String,
    pub avatar: String,
    pub subscribers_count: i64,
    pub is_subscribed: bool,
}

/// Result of a like or subscription toggle.
#[derive(Debug, Serialize, Deserialize)]
pub struct ToggleResponse {
    pub active: bool,
}

// -- Videos --

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetail {
    pub id: Uuid,
    pub video_file: String,
    pub thumbnail: String,
    pub title: String,
    pub description: String,
    pub duration: f64,
    pub views: i64,
    pub is_published: bool,
    pub likes_count: i64,
    pub comments_count: i64,
    pub is_liked: bool,
    pub owner: ChannelOwner,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSummary {
    pub id: Uuid,
    pub video_file: String,
    pub thumbnail: String,
    pub title: String,
    pub description: String,
    pub duration: f64,
    pub views: i64,
    pub is_published: bool,
    pub owner: OwnerSummary,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishStatus {
    pub is_published: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub query: Option<String>,
    pub sort_by: Option<String>,
    pub sort_type: Option<String>,
    pub user_id: Option<String>,
}

/// One page of a paginated listing.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub docs: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total_docs: i64,
    pub total_pages: i64,
    pub has_next_page: bool,
}

impl<T> Page<T> {
    pub fn new(docs: Vec<T>, page: u32, limit: u32, total_docs: i64) -> Self {
        let limit_i = i64::from(limit.max(1));
        let total_pages = (total_docs + limit_i - 1) / limit_i;
        Self {
            docs,
            page,
            limit,
            total_docs,
            total_pages,
            has_next_page: i64::from(page) < total_pages,
        }
    }
}

// -- Comments & tweets --

#[derive(Debug, Default, Deserialize)]
pub struct ContentRequest {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: Uuid,
    pub video_id: Uuid,
    pub content: String,
    pub likes_count: i64,
    pub is_liked: bool,
    pub owner: OwnerSummary,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TweetView {
    pub id: Uuid,
    pub content: String,
    pub likes_count: i64,
    pub is_liked: bool,
    pub owner: OwnerSummary,
    pub created_at: DateTime<Utc>,
}

// -- Playlists --

#[derive(Debug, Default, Deserialize)]
pub struct PlaylistRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistVideo {
    pub id: Uuid,
    pub video_file: String,
    pub thumbnail: String,
    pub title: String,
    pub description: String,
    pub duration: f64,
    pub views: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistView {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub owner: OwnerSummary,
    pub videos: Vec<PlaylistVideo>,
    pub total_videos: i64,
    pub total_views: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

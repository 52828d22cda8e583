use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use vidhub_db::models::PlaylistRow;
use vidhub_types::api::{Empty, PlaylistRequest};

use crate::auth::{AppState, run_db};
use crate::error::{ApiError, ApiResult, respond};
use crate::extract::{JsonBody, optional, parse_id, required};
use crate::middleware::AuthUser;
use crate::views;

async fn owned_playlist(state: &AppState, user: &AuthUser, raw_id: &str) -> ApiResult<PlaylistRow> {
    let pid = parse_id(raw_id, "playlist")?.to_string();
    let playlist = run_db(state, move |db| db.get_playlist(&pid))
        .await?
        .ok_or_else(|| ApiError::not_found("Playlist does not exist"))?;
    if playlist.owner_id != user.id_str() {
        return Err(ApiError::forbidden());
    }
    Ok(playlist)
}

/// POST /playlist
pub async fn create_playlist(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(req): JsonBody<PlaylistRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = required(req.name.as_deref(), "Name")?;
    let description = optional(req.description.as_deref()).unwrap_or_default();

    let (id, owner) = (Uuid::new_v4().to_string(), user.id_str());
    let row = run_db(&state, move |db| db.insert_playlist(&id, &owner, &name, &description)).await?;

    Ok(respond(
        StatusCode::CREATED,
        views::playlist(row),
        "Playlist created successfully",
    ))
}

/// GET /playlist/{playlistId}
pub async fn get_playlist(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(playlist_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let pid = parse_id(&playlist_id, "playlist")?.to_string();
    let viewer = user.id_str();
    let row = run_db(&state, move |db| db.playlist_view(&pid, &viewer))
        .await?
        .ok_or_else(|| ApiError::not_found("Playlist does not exist"))?;

    Ok(respond(
        StatusCode::OK,
        views::playlist_view(row),
        "Playlist fetched successfully",
    ))
}

/// GET /playlist/user/{userId}
pub async fn user_playlists(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(user_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let owner = parse_id(&user_id, "user")?.to_string();
    let viewer = user.id_str();
    let rows = run_db(&state, move |db| {
        if db.get_user_by_id(&owner)?.is_none() {
            return Ok(None);
        }
        db.playlist_views_by_owner(&owner, &viewer).map(Some)
    })
    .await?
    .ok_or_else(|| ApiError::not_found("User does not exist"))?;

    let playlists: Vec<_> = rows.into_iter().map(views::playlist_view).collect();
    Ok(respond(
        StatusCode::OK,
        playlists,
        "User playlists fetched successfully",
    ))
}

/// PATCH /playlist/{playlistId}
pub async fn update_playlist(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(playlist_id): Path<String>,
    JsonBody(req): JsonBody<PlaylistRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = optional(req.name.as_deref());
    let description = optional(req.description.as_deref());
    if name.is_none() && description.is_none() {
        return Err(ApiError::validation("Provide a name or description to update"));
    }

    let playlist = owned_playlist(&state, &user, &playlist_id).await?;
    let pid = playlist.id;
    let row = run_db(&state, move |db| {
        db.update_playlist(&pid, name.as_deref(), description.as_deref())
    })
    .await?
    .ok_or_else(|| ApiError::not_found("Playlist does not exist"))?;

    Ok(respond(
        StatusCode::OK,
        views::playlist(row),
        "Playlist updated successfully",
    ))
}

/// DELETE /playlist/{playlistId}
pub async fn delete_playlist(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(playlist_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let playlist = owned_playlist(&state, &user, &playlist_id).await?;
    let pid = playlist.id;
    if !run_db(&state, move |db| db.delete_playlist(&pid)).await? {
        return Err(ApiError::not_found("Playlist does not exist"));
    }

    Ok(respond(StatusCode::OK, Empty::default(), "Playlist deleted successfully"))
}

/// PATCH /playlist/add/{videoId}/{playlistId}
pub async fn add_video(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((video_id, playlist_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let vid = parse_id(&video_id, "video")?.to_string();
    let playlist = owned_playlist(&state, &user, &playlist_id).await?;

    let (pid, uid) = (playlist.id, user.id_str());
    let row = run_db(&state, move |db| {
        let visible = db
            .get_video(&vid)?
            .is_some_and(|v| v.is_published || v.owner_id == uid);
        if !visible {
            return Ok(Err(ApiError::not_found("Video does not exist")));
        }
        Ok(db
            .add_video_to_playlist(&pid, &vid)?
            .ok_or_else(|| ApiError::not_found("Playlist does not exist")))
    })
    .await??;

    Ok(respond(
        StatusCode::OK,
        views::playlist(row),
        "Video added to playlist successfully",
    ))
}

/// PATCH /playlist/remove/{videoId}/{playlistId}
pub async fn remove_video(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((video_id, playlist_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let vid = parse_id(&video_id, "video")?.to_string();
    let playlist = owned_playlist(&state, &user, &playlist_id).await?;
    if !playlist.videos.contains(&vid) {
        return Err(ApiError::not_found("Video is not in this playlist"));
    }

    let pid = playlist.id;
    let row = run_db(&state, move |db| db.remove_video_from_playlist(&pid, &vid))
        .await?
        .ok_or_else(|| ApiError::not_found("Playlist does not exist"))?;

    Ok(respond(
        StatusCode::OK,
        views::playlist(row),
        "Video removed from playlist successfully",
    ))
}

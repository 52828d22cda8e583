use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Extension,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::{error, info, warn};
use uuid::Uuid;

use vidhub_db::Database;
use vidhub_db::models::{NewUser, UserRow};
use vidhub_media::MediaStore;
use vidhub_types::api::{
    AuthPayload, ChangePasswordRequest, Claims, Empty, LoginRequest, RefreshClaims,
    RefreshRequest, TokenPair,
};

use crate::error::{ApiError, ApiResult, respond};
use crate::extract::{JsonBody, MultipartForm, required};
use crate::middleware::AuthUser;
use crate::views::user_profile;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";
/// Accepted username length, in characters.
const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=32;
const MIN_PASSWORD_LEN: usize = 8;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub media: MediaStore,
    pub auth: AuthConfig,
}

/// Token secrets and lifetimes, loaded once at startup.
#[derive(Clone)]
pub struct AuthConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl: chrono::Duration,
    pub refresh_ttl: chrono::Duration,
    pub secure_cookies: bool,
}

/// Run blocking work (SQLite, argon2) off the async runtime.
pub(crate) async fn run_blocking<F, T>(f: F) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        anyhow::anyhow!("blocking task failed: {}", e)
    })?
}

pub(crate) async fn run_db<F, T>(state: &AppState, f: F) -> anyhow::Result<T>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    run_blocking(move || f(&state.db)).await
}

// -- Passwords --

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("Stored password hash is unparseable: {}", e);
            false
        }
    }
}

async fn hash_on_pool(password: String) -> anyhow::Result<String> {
    run_blocking(move || hash_password(&password)).await
}

async fn verify_on_pool(password: String, hash: String) -> anyhow::Result<bool> {
    run_blocking(move || Ok(verify_password(&password, &hash))).await
}

// -- Tokens --

fn expiry(ttl: chrono::Duration) -> usize {
    (chrono::Utc::now() + ttl).timestamp() as usize
}

pub fn create_tokens(config: &AuthConfig, user: &UserRow) -> anyhow::Result<TokenPair> {
    let sub: Uuid = user.id.parse()?;

    let access = Claims {
        sub,
        username: user.username.clone(),
        email: user.email.clone(),
        exp: expiry(config.access_ttl),
        jti: Uuid::new_v4(),
    };
    let refresh = RefreshClaims {
        sub,
        exp: expiry(config.refresh_ttl),
        jti: Uuid::new_v4(),
    };

    Ok(TokenPair {
        access_token: encode(
            &Header::default(),
            &access,
            &EncodingKey::from_secret(config.access_secret.as_bytes()),
        )?,
        refresh_token: encode(
            &Header::default(),
            &refresh,
            &EncodingKey::from_secret(config.refresh_secret.as_bytes()),
        )?,
    })
}

pub fn decode_access_token(config: &AuthConfig, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.access_secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}

pub fn decode_refresh_token(config: &AuthConfig, token: &str) -> Option<RefreshClaims> {
    decode::<RefreshClaims>(
        token,
        &DecodingKey::from_secret(config.refresh_secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}

fn session_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

fn with_session(jar: CookieJar, tokens: &TokenPair, config: &AuthConfig) -> CookieJar {
    jar.add(session_cookie(ACCESS_COOKIE, tokens.access_token.clone(), config.secure_cookies))
        .add(session_cookie(REFRESH_COOKIE, tokens.refresh_token.clone(), config.secure_cookies))
}

fn without_session(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(ACCESS_COOKIE).path("/"))
        .remove(Cookie::build(REFRESH_COOKIE).path("/"))
}

/// Issue a fresh token pair and store the refresh token on the user.
async fn start_session(state: &AppState, user: &UserRow) -> ApiResult<TokenPair> {
    let tokens = create_tokens(&state.auth, user)?;
    let uid = user.id.clone();
    let refresh = tokens.refresh_token.clone();
    run_db(state, move |db| db.set_refresh_token(&uid, Some(refresh.as_str()))).await?;
    Ok(tokens)
}

// -- Handlers --

/// POST /users/register: multipart form with the profile fields, an
/// `avatar` file and an optional `coverImage` file.
pub async fn register(
    State(state): State<AppState>,
    mut form: MultipartForm,
) -> ApiResult<impl IntoResponse> {
    let username = required(form.text("userName").or(form.text("username")), "Username")?
        .to_lowercase();
    let email = required(form.text("email"), "Email")?.to_lowercase();
    let full_name = required(form.text("fullName"), "Full name")?;
    let password = form.text("password").unwrap_or_default().to_string();

    if !USERNAME_LEN.contains(&username.chars().count()) {
        return Err(ApiError::validation("Username must be 3 to 32 characters"));
    }
    if !email.contains('@') {
        return Err(ApiError::validation("Email is invalid"));
    }
    if password.trim().is_empty() {
        return Err(ApiError::validation("Password is required"));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation("Password must be at least 8 characters"));
    }

    let avatar = form
        .take_file("avatar")
        .ok_or_else(|| ApiError::validation("Avatar is required"))?;
    let cover = form.take_file("coverImage");

    let (u, e) = (username.clone(), email.clone());
    let taken = run_db(&state, move |db| {
        db.user_conflicts(Some(u.as_str()), Some(e.as_str()), None)
    })
    .await?;
    if taken {
        return Err(ApiError::Conflict(
            "User with this email or username already exists".into(),
        ));
    }

    let password_hash = hash_on_pool(password).await?;

    let avatar = state
        .media
        .upload(&avatar.bytes, avatar.file_name.as_deref())
        .await?;
    let cover = match cover {
        Some(file) => match state.media.upload(&file.bytes, file.file_name.as_deref()).await {
            Ok(stored) => Some(stored),
            Err(e) => {
                discard_assets(&state, &[avatar.storage_id.as_str()]).await;
                return Err(e.into());
            }
        },
        None => None,
    };

    let user_id = Uuid::new_v4().to_string();
    let insert = {
        let (id, avatar, cover) = (user_id.clone(), avatar.clone(), cover.clone());
        let (username, email, full_name) = (username.clone(), email.clone(), full_name.clone());
        run_db(&state, move |db| {
            db.create_user(&NewUser {
                id: &id,
                username: &username,
                email: &email,
                full_name: &full_name,
                password_hash: &password_hash,
                avatar_url: &avatar.url,
                avatar_id: &avatar.storage_id,
                cover_url: cover.as_ref().map(|c| c.url.as_str()),
                cover_id: cover.as_ref().map(|c| c.storage_id.as_str()),
            })?;
            db.get_user_by_id(&id)
        })
        .await
    };

    let user = match insert {
        Ok(Some(user)) => user,
        Ok(None) => {
            return Err(anyhow::anyhow!("User {} vanished after insert", user_id).into());
        }
        Err(e) => {
            let mut ids = vec![avatar.storage_id.as_str()];
            if let Some(c) = &cover {
                ids.push(c.storage_id.as_str());
            }
            discard_assets(&state, &ids).await;
            return Err(ApiError::from_db(
                e,
                "User with this email or username already exists",
            ));
        }
    };

    info!("Registered user {} ({})", user.username, user.id);
    Ok(respond(
        StatusCode::CREATED,
        user_profile(&user),
        "User registered successfully",
    ))
}

/// Best-effort removal of assets whose owning record was never written.
pub(crate) async fn discard_assets(state: &AppState, storage_ids: &[&str]) {
    for id in storage_ids {
        if let Err(e) = state.media.delete(id).await {
            warn!("Failed to clean up orphaned asset {}: {:#}", id, e);
        }
    }
}

/// POST /users/login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    JsonBody(req): JsonBody<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let identifier = required(Some(req.identifier.as_str()), "Username or email")?.to_lowercase();
    if req.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let user = run_db(&state, move |db| db.find_user_by_identifier(&identifier))
        .await?
        .ok_or_else(|| ApiError::not_found("User does not exist"))?;

    if !verify_on_pool(req.password, user.password.clone()).await? {
        return Err(ApiError::unauthorized("Invalid user credentials"));
    }

    let tokens = start_session(&state, &user).await?;
    let jar = with_session(jar, &tokens, &state.auth);

    Ok((
        jar,
        respond(
            StatusCode::OK,
            AuthPayload {
                user: user_profile(&user),
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
            },
            "User logged in successfully",
        ),
    ))
}

/// POST /users/logout
pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    jar: CookieJar,
) -> ApiResult<impl IntoResponse> {
    let uid = user.id.to_string();
    run_db(&state, move |db| db.set_refresh_token(&uid, None)).await?;

    Ok((
        without_session(jar),
        respond(StatusCode::OK, Empty::default(), "User logged out"),
    ))
}

/// POST /users/refresh-token: token from the cookie or the JSON body.
pub async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let from_body = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<RefreshRequest>(&body)
            .map_err(|_| ApiError::validation("Malformed request body"))?
            .refresh_token
    };
    let incoming = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .or(from_body)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Refresh token is missing"))?;

    let claims = decode_refresh_token(&state.auth, &incoming)
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired refresh token"))?;

    let uid = claims.sub.to_string();
    let user = run_db(&state, move |db| db.get_user_by_id(&uid))
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid refresh token"))?;

    if user.refresh_token.as_deref() != Some(incoming.as_str()) {
        warn!("Refresh token reuse detected for user {}", user.id);
        return Err(ApiError::unauthorized("Refresh token is expired or used"));
    }

    let tokens = create_tokens(&state.auth, &user)?;
    let (uid, expected, next) = (
        user.id.clone(),
        incoming.clone(),
        tokens.refresh_token.clone(),
    );
    let rotated = run_db(&state, move |db| db.rotate_refresh_token(&uid, &expected, &next)).await?;
    if !rotated {
        return Err(ApiError::unauthorized("Refresh token is expired or used"));
    }

    let jar = with_session(jar, &tokens, &state.auth);
    Ok((
        jar,
        respond(StatusCode::OK, tokens, "Access token refreshed"),
    ))
}

/// POST /users/change-password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(req): JsonBody<ChangePasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.old_password.is_empty() || req.new_password.trim().is_empty() {
        return Err(ApiError::validation("Old and new password are required"));
    }
    if req.new_password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation("Password must be at least 8 characters"));
    }

    let uid = user.id.to_string();
    let row = run_db(&state, move |db| db.get_user_by_id(&uid))
        .await?
        .ok_or_else(|| ApiError::not_found("User does not exist"))?;

    if !verify_on_pool(req.old_password, row.password).await? {
        return Err(ApiError::unauthorized("Old password is incorrect"));
    }

    let hash = hash_on_pool(req.new_password).await?;
    let uid = user.id.to_string();
    run_db(&state, move |db| db.update_password(&uid, &hash)).await?;

    Ok(respond(StatusCode::OK, Empty::default(), "Password changed successfully"))
}

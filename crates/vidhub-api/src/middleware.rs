use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use uuid::Uuid;

use crate::auth::{ACCESS_COOKIE, AppState, decode_access_token, run_db};
use crate::error::ApiError;

/// The authenticated caller, inserted as a request extension.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

impl AuthUser {
    pub fn id_str(&self) -> String {
        self.id.to_string()
    }
}

/// Validate the access token from the `accessToken` cookie or the
/// `Authorization: Bearer` header, then confirm the user still exists.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = jar
        .get(ACCESS_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| {
            req.headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(|t| t.trim().to_string())
        })
        .ok_or_else(|| ApiError::unauthorized("Unauthorized request"))?;

    let claims = decode_access_token(&state.auth, &token)
        .ok_or_else(|| ApiError::unauthorized("Invalid access token"))?;

    let uid = claims.sub.to_string();
    let user = run_db(&state, move |db| db.get_user_by_id(&uid))
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid access token"))?;

    req.extensions_mut().insert(AuthUser {
        id: claims.sub,
        username: user.username,
        email: user.email,
    });
    Ok(next.run(req).await)
}

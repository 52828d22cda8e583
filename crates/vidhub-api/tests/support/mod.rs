//! Shared harness: a full router over a temporary database and media dir.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use vidhub_api::auth::{AppStateInner, AuthConfig};
use vidhub_db::Database;
use vidhub_media::MediaStore;

pub const PASSWORD: &str = "password123";

pub struct TestApp {
    pub router: Router,
    pub dir: TempDir,
}

pub struct Session {
    pub id: String,
    pub username: String,
    pub access_token: String,
    pub refresh_token: String,
}

pub enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

const BOUNDARY: &str = "vidhub-test-boundary";

pub fn multipart(parts: &[Part<'_>]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, file_name, data) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("vidhub.db")).unwrap();
        let media = MediaStore::new(dir.path().join("media"), "http://localhost/api/v1/media")
            .await
            .unwrap();
        let state = Arc::new(AppStateInner {
            db,
            media,
            auth: AuthConfig {
                access_secret: "test-access-secret-0123456789".into(),
                refresh_secret: "test-refresh-secret-0123456789".into(),
                access_ttl: chrono::Duration::minutes(15),
                refresh_ttl: chrono::Duration::days(10),
                secure_cookies: false,
            },
        });
        Self {
            router: vidhub_api::router(state, 16 * 1024 * 1024),
            dir,
        }
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    pub async fn raw(&self, req: Request<Body>) -> axum::response::Response {
        self.router.clone().oneshot(req).await.unwrap()
    }

    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(req).await
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.json(Method::GET, uri, Some(token), None).await
    }

    pub async fn form(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        parts: &[Part<'_>],
    ) -> (StatusCode, Value) {
        let (content_type, body) = multipart(parts);
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, content_type);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::from(body)).unwrap()).await
    }

    pub async fn register(&self, username: &str) -> (StatusCode, Value) {
        let email = format!("{username}@example.com");
        self.form(
            Method::POST,
            "/api/v1/users/register",
            None,
            &[
                Part::Text("userName", username),
                Part::Text("email", &email),
                Part::Text("fullName", "Test User"),
                Part::Text("password", PASSWORD),
                Part::File("avatar", "avatar.png", b"fake avatar bytes"),
            ],
        )
        .await
    }

    pub async fn login(&self, identifier: &str) -> (StatusCode, Value) {
        self.json(
            Method::POST,
            "/api/v1/users/login",
            None,
            Some(serde_json::json!({ "identifier": identifier, "password": PASSWORD })),
        )
        .await
    }

    /// Register then log in, panicking on any failure.
    pub async fn signup(&self, username: &str) -> Session {
        let (status, body) = self.register(username).await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        let (status, body) = self.login(username).await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        Session {
            id: body["data"]["user"]["id"].as_str().unwrap().to_string(),
            username: username.to_string(),
            access_token: body["data"]["accessToken"].as_str().unwrap().to_string(),
            refresh_token: body["data"]["refreshToken"].as_str().unwrap().to_string(),
        }
    }

    /// Publish a video owned by `session` and return its id.
    pub async fn publish(&self, session: &Session, title: &str) -> String {
        let (status, body) = self
            .form(
                Method::POST,
                "/api/v1/videos",
                Some(&session.access_token),
                &[
                    Part::Text("title", title),
                    Part::Text("description", "a test video"),
                    Part::Text("duration", "42.5"),
                    Part::File("video", "clip.mp4", b"fake video bytes"),
                    Part::File("thumbnail", "thumb.png", b"fake thumbnail bytes"),
                ],
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "publish failed: {body}");
        body["data"]["id"].as_str().unwrap().to_string()
    }

    /// Install a trigger that aborts every `event` ("INSERT", "UPDATE") on
    /// `table`, so handlers hit a write failure after their uploads.
    pub fn break_writes(&self, event: &str, table: &str) {
        let conn = rusqlite::Connection::open(self.dir.path().join("vidhub.db")).unwrap();
        conn.execute_batch(&format!(
            "CREATE TRIGGER fail_{table}_{event} BEFORE {event} ON {table}
             BEGIN SELECT RAISE(ABORT, 'write refused'); END;"
        ))
        .unwrap();
    }

    /// Number of files currently in the media directory.
    pub fn media_files(&self) -> usize {
        std::fs::read_dir(self.dir.path().join("media"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

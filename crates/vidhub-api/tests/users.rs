mod support;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::json;

use support::{PASSWORD, Part, TestApp};

#[tokio::test]
async fn register_returns_sanitized_profile() {
    let app = TestApp::new().await;
    let (status, body) = app.register("Alice").await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["statusCode"], 201);
    let user = &body["data"];
    assert_eq!(user["username"], "alice");
    assert_eq!(user["email"], "alice@example.com");
    assert!(user["avatar"].as_str().unwrap().starts_with("http://localhost/api/v1/media/"));
    assert!(user.get("password").is_none());
    assert!(user.get("refreshToken").is_none());
    assert_eq!(app.media_files(), 1);
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let app = TestApp::new().await;
    app.register("bob").await;

    let (status, body) = app.register("bob").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(body["errors"], json!([]));
    // The rejected request never uploaded its avatar.
    assert_eq!(app.media_files(), 1);
}

#[tokio::test]
async fn register_validates_input() {
    let app = TestApp::new().await;

    let (status, body) = app
        .form(
            Method::POST,
            "/api/v1/users/register",
            None,
            &[
                Part::Text("userName", "carol"),
                Part::Text("email", "carol@example.com"),
                Part::Text("fullName", "Carol"),
                Part::Text("password", PASSWORD),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Avatar is required");

    let (status, _) = app
        .form(
            Method::POST,
            "/api/v1/users/register",
            None,
            &[
                Part::Text("userName", "carol"),
                Part::Text("email", "carol@example.com"),
                Part::Text("fullName", "   "),
                Part::Text("password", PASSWORD),
                Part::File("avatar", "a.png", b"x"),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .form(
            Method::POST,
            "/api/v1/users/register",
            None,
            &[
                Part::Text("userName", "carol"),
                Part::Text("email", "carol@example.com"),
                Part::Text("fullName", "Carol"),
                Part::Text("password", "short"),
                Part::File("avatar", "a.png", b"x"),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let long_name = "x".repeat(33);
    for name in ["ab", long_name.as_str()] {
        let (status, body) = app
            .form(
                Method::POST,
                "/api/v1/users/register",
                None,
                &[
                    Part::Text("userName", name),
                    Part::Text("email", "carol@example.com"),
                    Part::Text("fullName", "Carol"),
                    Part::Text("password", PASSWORD),
                    Part::File("avatar", "a.png", b"x"),
                ],
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Username must be 3 to 32 characters");
    }
    assert_eq!(app.media_files(), 0);
}

#[tokio::test]
async fn login_by_username_or_email() {
    let app = TestApp::new().await;
    app.register("dave").await;

    let (status, body) = app.login("DAVE@example.com").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["accessToken"].as_str().is_some());

    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/users/login",
            None,
            Some(json!({ "userNameOrEmail": "dave", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.login("nobody").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/users/login",
            None,
            Some(json!({ "identifier": "", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_sets_http_only_cookies() {
    let app = TestApp::new().await;
    app.register("erin").await;

    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/users/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "identifier": "erin", "password": PASSWORD }).to_string()))
        .unwrap();
    let resp = app.raw(req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let cookies: Vec<String> = resp
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert!(cookies.iter().any(|c| c.starts_with("accessToken=") && c.contains("HttpOnly")));
    assert!(cookies.iter().any(|c| c.starts_with("refreshToken=") && c.contains("HttpOnly")));

    // The access cookie alone authenticates.
    let access = cookies
        .iter()
        .find(|c| c.starts_with("accessToken="))
        .and_then(|c| c.split(';').next())
        .unwrap()
        .to_string();
    let req = Request::builder()
        .uri("/api/v1/users/current-user")
        .header(header::COOKIE, access)
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "erin");
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() {
    let app = TestApp::new().await;

    let (status, body) = app
        .json(Method::GET, "/api/v1/users/current-user", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = app.get("/api/v1/users/current-user", "not-a-jwt").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_rotates_and_detects_reuse() {
    let app = TestApp::new().await;
    let frank = app.signup("frank").await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/v1/users/refresh-token",
            None,
            Some(json!({ "refreshToken": frank.refresh_token })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let rotated = body["data"]["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(rotated, frank.refresh_token);

    // Replaying the old token fails and does not revoke the new one.
    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/users/refresh-token",
            None,
            Some(json!({ "refreshToken": frank.refresh_token })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/users/refresh-token",
            None,
            Some(json!({ "refreshToken": rotated })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .json(Method::POST, "/api/v1/users/refresh-token", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_revokes_refresh_token() {
    let app = TestApp::new().await;
    let gina = app.signup("gina").await;

    let (status, _) = app
        .json(Method::POST, "/api/v1/users/logout", Some(&gina.access_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/users/refresh-token",
            None,
            Some(json!({ "refreshToken": gina.refresh_token })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn change_password_requires_old_password() {
    let app = TestApp::new().await;
    let hank = app.signup("hank").await;

    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/users/change-password",
            Some(&hank.access_token),
            Some(json!({ "oldPassword": "not-my-password", "newPassword": "new-password-1" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/users/change-password",
            Some(&hank.access_token),
            Some(json!({ "oldPassword": PASSWORD, "newPassword": "new-password-1" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.login("hank").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn update_account_rejects_taken_email() {
    let app = TestApp::new().await;
    let ivan = app.signup("ivan").await;
    app.register("judy").await;

    let (status, _) = app
        .json(
            Method::PATCH,
            "/api/v1/users/update-account",
            Some(&ivan.access_token),
            Some(json!({ "fullName": "Ivan", "email": "judy@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .json(
            Method::PATCH,
            "/api/v1/users/update-account",
            Some(&ivan.access_token),
            Some(json!({ "fullName": "Ivan the Great", "email": "ivan@new.example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["fullName"], "Ivan the Great");
    assert_eq!(body["data"]["email"], "ivan@new.example.com");
}

#[tokio::test]
async fn avatar_replacement_removes_old_asset() {
    let app = TestApp::new().await;
    let kim = app.signup("kim").await;
    assert_eq!(app.media_files(), 1);

    let (status, body) = app
        .form(
            Method::PATCH,
            "/api/v1/users/avatar",
            Some(&kim.access_token),
            &[Part::File("avatar", "new.jpg", b"new avatar bytes")],
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["avatar"].as_str().unwrap().ends_with(".jpg"));
    assert_eq!(app.media_files(), 1);

    let (status, body) = app
        .form(
            Method::PATCH,
            "/api/v1/users/cover-image",
            Some(&kim.access_token),
            &[Part::File("coverImage", "cover.png", b"cover bytes")],
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["coverImage"].as_str().is_some());
    assert_eq!(app.media_files(), 2);
}

#[tokio::test]
async fn channel_profile_counts_subscriptions() {
    let app = TestApp::new().await;
    let lee = app.signup("lee").await;
    let mia = app.signup("mia").await;

    let (status, _) = app
        .json(
            Method::POST,
            &format!("/api/v1/subscriptions/c/{}", lee.id),
            Some(&mia.access_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get("/api/v1/users/c/lee", &mia.access_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["subscribersCount"], 1);
    assert_eq!(body["data"]["channelsSubscribedToCount"], 0);
    assert_eq!(body["data"]["isSubscribed"], true);

    let (status, body) = app.get("/api/v1/users/c/lee", &lee.access_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isSubscribed"], false);

    let (status, _) = app.get("/api/v1/users/c/ghost", &lee.access_token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn healthcheck_is_public() {
    let app = TestApp::new().await;
    let (status, body) = app
        .json(Method::GET, "/api/v1/healthcheck", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn failed_registration_releases_uploaded_assets() {
    let app = TestApp::new().await;
    app.break_writes("INSERT", "users");

    let (status, body) = app
        .form(
            Method::POST,
            "/api/v1/users/register",
            None,
            &[
                Part::Text("userName", "grace"),
                Part::Text("email", "grace@example.com"),
                Part::Text("fullName", "Grace"),
                Part::Text("password", PASSWORD),
                Part::File("avatar", "a.png", b"avatar"),
                Part::File("coverImage", "c.png", b"cover"),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(app.media_files(), 0);
}

#[tokio::test]
async fn failed_avatar_swap_keeps_the_old_avatar() {
    let app = TestApp::new().await;
    let heidi = app.signup("heidi").await;
    assert_eq!(app.media_files(), 1);
    app.break_writes("UPDATE", "users");

    let (status, _) = app
        .form(
            Method::PATCH,
            "/api/v1/users/avatar",
            Some(&heidi.access_token),
            &[Part::File("avatar", "new.png", b"new avatar")],
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(app.media_files(), 1);
}

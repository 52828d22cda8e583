mod support;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::json;

use support::{Part, TestApp};

#[tokio::test]
async fn like_scenario_reports_viewer_state() {
    let app = TestApp::new().await;
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;
    let video = app.publish(&alice, "First upload").await;

    let (status, body) = app
        .json(
            Method::POST,
            &format!("/api/v1/likes/toggle/v/{video}"),
            Some(&bob.access_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["active"], true);

    let (status, body) = app.get(&format!("/api/v1/videos/{video}"), &bob.access_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isLiked"], true);
    assert_eq!(body["data"]["likesCount"], 1);
    assert_eq!(body["data"]["owner"]["username"], "alice");

    let (_, body) = app
        .json(
            Method::POST,
            &format!("/api/v1/likes/toggle/v/{video}"),
            Some(&bob.access_token),
            None,
        )
        .await;
    assert_eq!(body["data"]["active"], false);

    let (_, body) = app.get(&format!("/api/v1/videos/{video}"), &bob.access_token).await;
    assert_eq!(body["data"]["isLiked"], false);
    assert_eq!(body["data"]["likesCount"], 0);

    // Alice never liked it.
    let (_, body) = app.get(&format!("/api/v1/videos/{video}"), &alice.access_token).await;
    assert_eq!(body["data"]["isLiked"], false);
}

#[tokio::test]
async fn each_detail_read_counts_one_view() {
    let app = TestApp::new().await;
    let alice = app.signup("alice").await;
    let video = app.publish(&alice, "Counting").await;

    for expected in 1..=3 {
        let (status, body) = app.get(&format!("/api/v1/videos/{video}"), &alice.access_token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["views"], expected);
    }

    let (_, body) = app.get("/api/v1/users/history", &alice.access_token).await;
    assert_eq!(body["data"]["totalDocs"], 1);
    assert_eq!(body["data"]["docs"][0]["id"], video.as_str());
}

#[tokio::test]
async fn deleted_video_is_gone_with_its_comments() {
    let app = TestApp::new().await;
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;
    let video = app.publish(&alice, "Short lived").await;
    assert_eq!(app.media_files(), 4);

    let (status, body) = app
        .json(
            Method::POST,
            &format!("/api/v1/comments/{video}"),
            Some(&bob.access_token),
            Some(json!({ "content": "nice" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let comment = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .json(
            Method::DELETE,
            &format!("/api/v1/videos/{video}"),
            Some(&bob.access_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .json(
            Method::DELETE,
            &format!("/api/v1/videos/{video}"),
            Some(&alice.access_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    // Both avatars remain, both video assets are released.
    assert_eq!(app.media_files(), 2);

    let (status, _) = app.get(&format!("/api/v1/videos/{video}"), &alice.access_token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .json(
            Method::POST,
            &format!("/api/v1/likes/toggle/c/{comment}"),
            Some(&bob.access_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn publish_requires_both_files() {
    let app = TestApp::new().await;
    let alice = app.signup("alice").await;

    let (status, body) = app
        .form(
            Method::POST,
            "/api/v1/videos",
            Some(&alice.access_token),
            &[
                Part::Text("title", "No thumbnail"),
                Part::Text("description", "missing a part"),
                Part::File("video", "clip.mp4", b"bytes"),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Thumbnail is required");
    assert_eq!(app.media_files(), 1);
}

#[tokio::test]
async fn non_owner_cannot_update_or_toggle() {
    let app = TestApp::new().await;
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;
    let video = app.publish(&alice, "Mine").await;

    let (status, _) = app
        .form(
            Method::PATCH,
            &format!("/api/v1/videos/{video}"),
            Some(&bob.access_token),
            &[Part::Text("title", "Stolen")],
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .json(
            Method::PATCH,
            &format!("/api/v1/videos/toggle/publish/{video}"),
            Some(&bob.access_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .form(
            Method::PATCH,
            &format!("/api/v1/videos/{video}"),
            Some(&alice.access_token),
            &[
                Part::Text("title", "Renamed"),
                Part::File("thumbnail", "new.png", b"new thumb"),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Renamed");
    assert_eq!(body["data"]["description"], "a test video");
    // Old thumbnail replaced, not accumulated.
    assert_eq!(app.media_files(), 4);
}

#[tokio::test]
async fn unpublished_videos_are_owner_only() {
    let app = TestApp::new().await;
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;
    let video = app.publish(&alice, "Draft").await;

    let (status, body) = app
        .json(
            Method::PATCH,
            &format!("/api/v1/videos/toggle/publish/{video}"),
            Some(&alice.access_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isPublished"], false);

    let (status, _) = app.get(&format!("/api/v1/videos/{video}"), &bob.access_token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.get(&format!("/api/v1/videos/{video}"), &alice.access_token).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get("/api/v1/videos", &bob.access_token).await;
    assert_eq!(body["data"]["totalDocs"], 0);
    let (_, body) = app.get("/api/v1/videos", &alice.access_token).await;
    assert_eq!(body["data"]["totalDocs"], 1);
}

#[tokio::test]
async fn list_searches_sorts_and_paginates() {
    let app = TestApp::new().await;
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;
    app.publish(&alice, "Rust ownership explained").await;
    app.publish(&alice, "Cooking pasta").await;
    app.publish(&bob, "Rust async deep dive").await;

    let (status, body) = app.get("/api/v1/videos?query=rust", &bob.access_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalDocs"], 2);

    let (_, body) = app
        .get("/api/v1/videos?query=RUST%20async", &bob.access_token)
        .await;
    assert_eq!(body["data"]["totalDocs"], 1);
    assert_eq!(body["data"]["docs"][0]["owner"]["username"], "bob");

    let (_, body) = app
        .get(
            &format!("/api/v1/videos?userId={}&sortBy=title&sortType=asc", alice.id),
            &bob.access_token,
        )
        .await;
    assert_eq!(body["data"]["totalDocs"], 2);
    assert_eq!(body["data"]["docs"][0]["title"], "Cooking pasta");

    let (_, body) = app.get("/api/v1/videos?page=2&limit=2", &bob.access_token).await;
    assert_eq!(body["data"]["page"], 2);
    assert_eq!(body["data"]["totalPages"], 2);
    assert_eq!(body["data"]["hasNextPage"], false);
    assert_eq!(body["data"]["docs"].as_array().unwrap().len(), 1);

    let (status, _) = app.get("/api/v1/videos?sortBy=likes", &bob.access_token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_ids_are_validation_errors() {
    let app = TestApp::new().await;
    let alice = app.signup("alice").await;

    let (status, body) = app.get("/api/v1/videos/not-a-uuid", &alice.access_token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid video id");

    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/likes/toggle/t/123",
            Some(&alice.access_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn liked_videos_lists_newest_like_first() {
    let app = TestApp::new().await;
    let alice = app.signup("alice").await;
    let first = app.publish(&alice, "One").await;
    let second = app.publish(&alice, "Two").await;

    for video in [&first, &second] {
        app.json(
            Method::POST,
            &format!("/api/v1/likes/toggle/v/{video}"),
            Some(&alice.access_token),
            None,
        )
        .await;
    }

    let (status, body) = app.get("/api/v1/likes/videos", &alice.access_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalDocs"], 2);
    assert_eq!(body["data"]["docs"][0]["id"], second.as_str());
}

#[tokio::test]
async fn media_is_served_with_content_type() {
    let app = TestApp::new().await;
    let alice = app.signup("alice").await;
    let video = app.publish(&alice, "Streamed").await;

    let (_, body) = app.get(&format!("/api/v1/videos/{video}"), &alice.access_token).await;
    let url = body["data"]["videoFile"].as_str().unwrap();
    let path = url.strip_prefix("http://localhost").unwrap().to_string();

    let resp = app
        .raw(Request::builder().uri(&path).body(Body::empty()).unwrap())
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "video/mp4");
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"fake video bytes");

    let resp = app
        .raw(
            Request::builder()
                .uri(&path)
                .header(header::RANGE, "bytes=5-")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"video bytes");

    let resp = app
        .raw(
            Request::builder()
                .uri("/api/v1/media/..%2F..%2Fetc%2Fpasswd")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn failed_publish_releases_both_assets() {
    let app = TestApp::new().await;
    let alice = app.signup("alice").await;
    app.break_writes("INSERT", "videos");

    let (status, _) = app
        .form(
            Method::POST,
            "/api/v1/videos",
            Some(&alice.access_token),
            &[
                Part::Text("title", "Never stored"),
                Part::Text("description", "insert refused"),
                Part::File("video", "clip.mp4", b"fake video bytes"),
                Part::File("thumbnail", "thumb.png", b"fake thumbnail bytes"),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    // Only the avatar is left.
    assert_eq!(app.media_files(), 1);
}

#[tokio::test]
async fn failed_update_releases_the_new_thumbnail() {
    let app = TestApp::new().await;
    let alice = app.signup("alice").await;
    let video = app.publish(&alice, "Stable").await;
    assert_eq!(app.media_files(), 3);
    app.break_writes("UPDATE", "videos");

    let (status, _) = app
        .form(
            Method::PATCH,
            &format!("/api/v1/videos/{video}"),
            Some(&alice.access_token),
            &[
                Part::Text("title", "Renamed"),
                Part::File("thumbnail", "new.png", b"new thumb"),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(app.media_files(), 3);
}

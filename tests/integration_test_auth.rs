mod common;
use common::{parse_body, set_cookies, TestApp, PASSWORD};
use serde_json::json;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use tower::ServiceExt;
use tokio::task::JoinSet;

#[tokio::test]
async fn test_signup_and_login() {
    let app = TestApp::new().await;

    let body = app.signup("Tech Events Inc", "Org@Example.com", "organizer").await;
    assert_eq!(body["user"]["email"], "org@example.com");
    assert_eq!(body["user"]["event_role"], "organizer");
    assert_eq!(body["user"]["support_role"], "customer");
    assert!(body["user"].get("password_hash").is_none());

    let auth = app.login("org@example.com", PASSWORD).await;
    assert!(!auth.access_token.is_empty());
    assert!(!auth.refresh_token.is_empty());
    assert!(!auth.csrf_token.is_empty());

    let res = app.request("POST", "/api/auth/login", None, Some(json!({
        "email": "org@example.com",
        "password": "wrong-password"
    }))).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_signup_validation_and_duplicates() {
    let app = TestApp::new().await;
    app.signup("Jane", "jane@example.com", "attendee").await;

    let res = app.request("POST", "/api/auth/signup", None, Some(json!({
        "name": "Jane Again",
        "email": "jane@example.com",
        "password": PASSWORD
    }))).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = app.request("POST", "/api/auth/signup", None, Some(json!({
        "name": "Short",
        "email": "short@example.com",
        "password": "short"
    }))).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app.request("POST", "/api/auth/signup", None, Some(json!({
        "name": "No At",
        "email": "not-an-email",
        "password": PASSWORD
    }))).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_csrf_header_required_for_mutations() {
    let app = TestApp::new().await;
    let auth = app.user("Jane", "attendee").await;

    // Reads only need the cookie.
    let req = Request::builder()
        .method("GET")
        .uri("/api/tickets")
        .header(header::COOKIE, format!("access_token={}", auth.access_token))
        .body(Body::empty())
        .unwrap();
    let res = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let req = Request::builder()
        .method("POST")
        .uri("/api/tickets")
        .header(header::COOKIE, format!("access_token={}", auth.access_token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "subject": "s", "message": "m", "category": "general" }).to_string()))
        .unwrap();
    let res = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_refresh_rotates_tokens() {
    let app = TestApp::new().await;
    let auth = app.user("Jane", "attendee").await;

    let refresh = |token: String| {
        Request::builder()
            .method("POST")
            .uri("/api/auth/refresh")
            .header(header::COOKIE, format!("refresh_token={}", token))
            .body(Body::empty())
            .unwrap()
    };

    let res = app.router.clone().oneshot(refresh(auth.refresh_token.clone())).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let cookies = set_cookies(&res);
    assert!(cookies.iter().any(|c| c.starts_with("access_token=")));
    assert!(cookies.iter().any(|c| c.starts_with("refresh_token=")));
    let body = parse_body(res).await;
    assert_eq!(body["user"]["id"], auth.user_id.as_str());
    assert_ne!(body["csrf_token"], auth.csrf_token.as_str());

    // The old refresh token was consumed by the rotation.
    let res = app.router.clone().oneshot(refresh(auth.refresh_token.clone())).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_concurrent_refresh_spends_token_once() {
    let app = TestApp::new().await;
    let auth = app.user("Jane", "attendee").await;

    let mut set = JoinSet::new();
    for _ in 0..2 {
        let router = app.router.clone();
        let req = Request::builder()
            .method("POST")
            .uri("/api/auth/refresh")
            .header(header::COOKIE, format!("refresh_token={}", auth.refresh_token))
            .body(Body::empty())
            .unwrap();
        set.spawn(async move { router.oneshot(req).await.unwrap().status() });
    }

    let mut statuses = Vec::new();
    while let Some(status) = set.join_next().await {
        statuses.push(status.unwrap());
    }
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::OK, StatusCode::UNAUTHORIZED]);

    let (live,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM refresh_tokens WHERE user_id = ?")
        .bind(&auth.user_id)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert!(live <= 1);
}

#[tokio::test]
async fn test_logout_revokes_refresh_token() {
    let app = TestApp::new().await;
    let auth = app.user("Jane", "attendee").await;

    let req = Request::builder()
        .method("POST")
        .uri("/api/auth/logout")
        .header(header::COOKIE, format!("refresh_token={}", auth.refresh_token))
        .body(Body::empty())
        .unwrap();
    let res = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let req = Request::builder()
        .method("POST")
        .uri("/api/auth/refresh")
        .header(header::COOKIE, format!("refresh_token={}", auth.refresh_token))
        .body(Body::empty())
        .unwrap();
    let res = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new().await;
    let res = app.request("GET", "/health", None, None).await;
    assert_eq!(res.status(), StatusCode::OK);
}

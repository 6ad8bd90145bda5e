mod common;
use common::{event_payload, parse_body, TestApp};
use axum::http::StatusCode;
use std::sync::Arc;
use tokio::task::JoinSet;

fn register_uri(event_id: &str) -> String {
    format!("/api/registrations/{}/register", event_id)
}

fn unregister_uri(event_id: &str) -> String {
    format!("/api/registrations/{}/unregister", event_id)
}

#[tokio::test]
async fn test_register_unregister_round_trip() {
    let app = TestApp::new().await;
    let organizer = app.user("Organizer", "organizer").await;
    let attendee = app.user("Attendee", "attendee").await;

    let created = app.create_event(&organizer, event_payload("Rust Meetup", 10, 7)).await;
    let event_id = created["id"].as_str().unwrap();

    let res = app.request("POST", &register_uri(event_id), Some(&attendee), None).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = parse_body(res).await;
    assert_eq!(body["is_registered"], true);
    assert_eq!(body["event"]["registered"], 1);

    let res = app.request("GET", "/api/registrations/user-registrations", Some(&attendee), None).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = parse_body(res).await;
    let registrations = body["registrations"].as_array().unwrap();
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0]["event_id"], event_id);
    assert_eq!(body["stats"]["upcoming"], 1);
    assert_eq!(body["stats"]["total_value"], 25.0);

    let res = app.request("DELETE", &unregister_uri(event_id), Some(&attendee), None).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = parse_body(res).await;
    assert_eq!(body["is_registered"], false);
    assert_eq!(body["event"]["registered"], 0);

    let res = app.request("GET", "/api/registrations/user-registrations", Some(&attendee), None).await;
    let body = parse_body(res).await;
    assert!(body["registrations"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_double_registration_is_conflict() {
    let app = TestApp::new().await;
    let organizer = app.user("Organizer", "organizer").await;
    let attendee = app.user("Attendee", "attendee").await;

    let created = app.create_event(&organizer, event_payload("Rust Meetup", 10, 7)).await;
    let event_id = created["id"].as_str().unwrap();

    let res = app.request("POST", &register_uri(event_id), Some(&attendee), None).await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = app.request("POST", &register_uri(event_id), Some(&attendee), None).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = app.request("GET", &format!("/api/events/{}", event_id), None, None).await;
    let body = parse_body(res).await;
    assert_eq!(body["registered"], 1);
}

#[tokio::test]
async fn test_full_event_rejects_registration() {
    let app = TestApp::new().await;
    let organizer = app.user("Organizer", "organizer").await;
    let first = app.user("First", "attendee").await;
    let second = app.user("Second", "attendee").await;

    let created = app.create_event(&organizer, event_payload("Tiny Room", 1, 7)).await;
    let event_id = created["id"].as_str().unwrap();

    let res = app.request("POST", &register_uri(event_id), Some(&first), None).await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = app.request("POST", &register_uri(event_id), Some(&second), None).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body = parse_body(res).await;
    assert_eq!(body["error"], "Event is full");

    let res = app.request("GET", &format!("/api/events/{}", event_id), None, None).await;
    let body = parse_body(res).await;
    assert_eq!(body["registered"], 1);
    assert_eq!(body["is_full"], true);
}

#[tokio::test]
async fn test_past_event_and_organizer_are_rejected() {
    let app = TestApp::new().await;
    let organizer = app.user("Organizer", "organizer").await;
    let attendee = app.user("Attendee", "attendee").await;

    let past = app.create_event(&organizer, event_payload("Last Week", 10, -7)).await;
    let res = app.request("POST", &register_uri(past["id"].as_str().unwrap()), Some(&attendee), None).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let upcoming = app.create_event(&organizer, event_payload("Next Week", 10, 7)).await;
    let res = app.request("POST", &register_uri(upcoming["id"].as_str().unwrap()), Some(&organizer), None).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_unregister_without_registration_is_conflict() {
    let app = TestApp::new().await;
    let organizer = app.user("Organizer", "organizer").await;
    let attendee = app.user("Attendee", "attendee").await;

    let created = app.create_event(&organizer, event_payload("Rust Meetup", 10, 7)).await;
    let event_id = created["id"].as_str().unwrap();

    let res = app.request("DELETE", &unregister_uri(event_id), Some(&attendee), None).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = app.request("GET", &format!("/api/events/{}", event_id), None, None).await;
    let body = parse_body(res).await;
    assert_eq!(body["registered"], 0);

    let res = app.request("POST", &register_uri("missing-event"), Some(&attendee), None).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_registration_requires_auth_and_csrf() {
    let app = TestApp::new().await;
    let organizer = app.user("Organizer", "organizer").await;
    let mut attendee = app.user("Attendee", "attendee").await;

    let created = app.create_event(&organizer, event_payload("Rust Meetup", 10, 7)).await;
    let event_id = created["id"].as_str().unwrap();

    let res = app.request("POST", &register_uri(event_id), None, None).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    attendee.csrf_token = "wrong".to_string();
    let res = app.request("POST", &register_uri(event_id), Some(&attendee), None).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_concurrent_registrations_respect_capacity() {
    let app = TestApp::new().await;
    let organizer = app.user("Organizer", "organizer").await;

    let capacity = 3;
    let created = app.create_event(&organizer, event_payload("Hot Ticket", capacity, 7)).await;
    let event_id = created["id"].as_str().unwrap().to_string();

    let mut attendees = Vec::new();
    for i in 0..8 {
        attendees.push(app.user(&format!("Attendee{}", i), "attendee").await);
    }

    let app = Arc::new(app);
    let mut set = JoinSet::new();
    for attendee in attendees {
        let app = app.clone();
        let uri = register_uri(&event_id);
        set.spawn(async move {
            app.request("POST", &uri, Some(&attendee), None).await.status()
        });
    }

    let mut accepted = 0;
    while let Some(status) = set.join_next().await {
        let status = status.unwrap();
        if status == StatusCode::OK {
            accepted += 1;
        } else {
            assert_eq!(status, StatusCode::CONFLICT, "rejected registrations must conflict");
        }
    }
    assert_eq!(accepted, capacity);

    let res = app.request("GET", &format!("/api/events/{}", event_id), None, None).await;
    let body = parse_body(res).await;
    assert_eq!(body["registered"], accepted);

    let (rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM registrations WHERE event_id = ?")
        .bind(&event_id)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(rows, i64::from(accepted));
}

#[tokio::test]
async fn test_deleting_event_removes_registrations() {
    let app = TestApp::new().await;
    let organizer = app.user("Organizer", "organizer").await;
    let attendee = app.user("Attendee", "attendee").await;

    let created = app.create_event(&organizer, event_payload("Cancelled", 10, 7)).await;
    let event_id = created["id"].as_str().unwrap();

    let res = app.request("POST", &register_uri(event_id), Some(&attendee), None).await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = app.request("DELETE", &format!("/api/events/{}", event_id), Some(&organizer), None).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = app.request("GET", "/api/registrations/user-registrations", Some(&attendee), None).await;
    let body = parse_body(res).await;
    assert!(body["registrations"].as_array().unwrap().is_empty());
}

use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderName, HeaderValue, Method},
    routing::{get, post, put, delete, patch},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use crate::state::AppState;
use crate::api::handlers::{health, auth, event, registration, ticket, user};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
    classify::ServerErrorsFailureClass,
};
use tower_cookies::CookieManagerLayer;
use tracing::{info_span, Span, error, info, warn};
use uuid::Uuid;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("x-csrf-token")])
        .allow_credentials(true)
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors_allowed_origins);

    Router::new()
        .route("/health", get(health::health_check))

        // Auth
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/auth/logout", post(auth::logout))

        // Users
        .route("/api/users/{id}/support-role", put(user::update_support_role))

        // Events
        .route("/api/events", get(event::list_events).post(event::create_event))
        .route("/api/events/categories", get(event::list_categories))
        .route("/api/events/mine/stats", get(event::my_event_stats))
        .route("/api/events/{id}", get(event::get_event).put(event::update_event).delete(event::delete_event))

        // Registrations
        .route("/api/registrations/user-registrations", get(registration::list_user_registrations))
        .route("/api/registrations/{event_id}/register", post(registration::register))
        .route("/api/registrations/{event_id}/unregister", delete(registration::unregister))

        // Support tickets
        .route("/api/tickets", get(ticket::list_tickets).post(ticket::create_ticket))
        .route("/api/tickets/{id}", get(ticket::get_ticket).patch(ticket::update_ticket).delete(ticket::delete_ticket))
        .route("/api/tickets/{id}/replies", post(ticket::add_reply))
        .route("/api/tickets/{id}/status", patch(ticket::update_ticket_status))
        .route("/api/tickets/{id}/read", post(ticket::mark_replies_read))

        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    let request_id = Uuid::new_v4().to_string();
                    info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = ?request.method(),
                        uri = ?request.uri(),
                        version = ?request.version(),
                        user_id = tracing::field::Empty,
                    )
                })
                .on_request(|request: &Request<Body>, _span: &Span| {
                    info!("started processing request: {} {}", request.method(), request.uri().path());
                })
                .on_response(|response: &axum::http::Response<Body>, latency: Duration, _span: &Span| {
                    info!(
                        status = response.status().as_u16(),
                        latency_ms = latency.as_millis(),
                        "finished processing request"
                    );
                })
                .on_failure(|error: ServerErrorsFailureClass, _latency: Duration, _span: &Span| {
                    error!("request failed: {:?}", error);
                })
        )
        .layer(CookieManagerLayer::new())
        .layer(cors)
        .with_state(state)
}

use crate::api::dtos::{
    requests::{CreateEventRequest, LoginRequest, UpdateEventRequest},
    responses::{EventResponse, RegistrationResponse, RegistrationsResponse},
};
use crate::domain::models::{auth::{AuthResponse, UserProfile}, event::{Event, NewEvent}};
use crate::error::AppError;
use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Remote operations backing an [`EventSession`](super::EventSession).
///
/// Implementations report network failures as `AppError::Transport` and map
/// HTTP error statuses back onto the matching `AppError` variant.
#[async_trait]
pub trait EventApi: Send + Sync {
    async fn list_events(&self) -> Result<Vec<Event>, AppError>;
    async fn create_event(&self, data: &NewEvent) -> Result<Event, AppError>;
    async fn update_event(&self, id: &str, patch: &UpdateEventRequest) -> Result<Event, AppError>;
    async fn delete_event(&self, id: &str) -> Result<(), AppError>;
    /// Ids of the events the signed-in user is registered for.
    async fn user_registrations(&self) -> Result<Vec<String>, AppError>;
    async fn register(&self, event_id: &str) -> Result<Event, AppError>;
    async fn unregister(&self, event_id: &str) -> Result<Event, AppError>;
}

pub struct HttpEventApi {
    client: Client,
    base_url: String,
    csrf_token: RwLock<Option<String>>,
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

async fn error_from_response(res: Response) -> AppError {
    let status = res.status();
    let message = res
        .json::<Value>()
        .await
        .ok()
        .and_then(|body| body.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| status.to_string());

    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => AppError::Validation(message),
        StatusCode::UNAUTHORIZED => AppError::Unauthorized,
        StatusCode::FORBIDDEN => AppError::Forbidden(message),
        StatusCode::NOT_FOUND => AppError::NotFound(message),
        StatusCode::CONFLICT => AppError::Conflict(message),
        _ => AppError::Transport(format!("{}: {}", status, message)),
    }
}

async fn decode<T: DeserializeOwned>(res: Response) -> Result<T, AppError> {
    if !res.status().is_success() {
        return Err(error_from_response(res).await);
    }
    res.json::<T>().await.map_err(AppError::from)
}

fn to_body<T: serde::Serialize>(value: &T) -> Result<Value, AppError> {
    serde_json::to_value(value).map_err(|e| AppError::InternalWithMsg(format!("Request encoding failed: {}", e)))
}

impl HttpEventApi {
    pub fn new(base_url: impl Into<String>) -> Result<Self, AppError> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            csrf_token: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, AppError> {
        let body = to_body(&LoginRequest { email: email.to_string(), password: password.to_string() })?;
        let res = self.client.post(self.url("/api/auth/login")).json(&body).send().await?;
        let auth: AuthResponse = decode(res).await?;

        *self.csrf_token.write().await = Some(auth.csrf_token);
        Ok(auth.user)
    }

    pub async fn logout(&self) -> Result<(), AppError> {
        let res = self.client.post(self.url("/api/auth/logout")).send().await?;
        *self.csrf_token.write().await = None;
        if !res.status().is_success() {
            return Err(error_from_response(res).await);
        }
        Ok(())
    }

    async fn refresh_session(&self) -> Result<(), AppError> {
        let res = self.client.post(self.url("/api/auth/refresh")).send().await?;
        let auth: AuthResponse = decode(res).await?;
        *self.csrf_token.write().await = Some(auth.csrf_token);
        debug!("Session refreshed for {}", auth.user.id);
        Ok(())
    }

    async fn send_once(&self, method: &Method, path: &str, body: Option<&Value>) -> Result<Response, AppError> {
        let mut req = self.client.request(method.clone(), self.url(path));

        if *method != Method::GET {
            if let Some(token) = self.csrf_token.read().await.as_deref() {
                req = req.header("X-CSRF-Token", token);
            }
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        Ok(req.send().await?)
    }

    /// Sends a request, refreshing the session once when the access token
    /// has expired.
    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Response, AppError> {
        let res = self.send_once(&method, path, body.as_ref()).await?;
        if res.status() != StatusCode::UNAUTHORIZED {
            return Ok(res);
        }

        warn!("{} {} returned 401, refreshing session", method, path);
        self.refresh_session().await?;
        self.send_once(&method, path, body.as_ref()).await
    }
}

#[async_trait]
impl EventApi for HttpEventApi {
    async fn list_events(&self) -> Result<Vec<Event>, AppError> {
        let res = self.send(Method::GET, "/api/events", None).await?;
        let events: Vec<EventResponse> = decode(res).await?;
        Ok(events.into_iter().map(|e| e.event).collect())
    }

    async fn create_event(&self, data: &NewEvent) -> Result<Event, AppError> {
        let body = to_body(&CreateEventRequest::from(data.clone()))?;
        let res = self.send(Method::POST, "/api/events", Some(body)).await?;
        let created: EventResponse = decode(res).await?;
        Ok(created.event)
    }

    async fn update_event(&self, id: &str, patch: &UpdateEventRequest) -> Result<Event, AppError> {
        let body = to_body(patch)?;
        let res = self.send(Method::PUT, &format!("/api/events/{}", id), Some(body)).await?;
        let updated: EventResponse = decode(res).await?;
        Ok(updated.event)
    }

    async fn delete_event(&self, id: &str) -> Result<(), AppError> {
        let res = self.send(Method::DELETE, &format!("/api/events/{}", id), None).await?;
        if !res.status().is_success() {
            return Err(error_from_response(res).await);
        }
        Ok(())
    }

    async fn user_registrations(&self) -> Result<Vec<String>, AppError> {
        let res = self.send(Method::GET, "/api/registrations/user-registrations", None).await?;
        if res.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let body: RegistrationsResponse = decode(res).await?;
        Ok(body.registrations.into_iter().map(|r| r.event_id).collect())
    }

    async fn register(&self, event_id: &str) -> Result<Event, AppError> {
        let res = self.send(Method::POST, &format!("/api/registrations/{}/register", event_id), None).await?;
        let body: RegistrationResponse = decode(res).await?;
        Ok(body.event)
    }

    async fn unregister(&self, event_id: &str) -> Result<Event, AppError> {
        let res = self.send(Method::DELETE, &format!("/api/registrations/{}/unregister", event_id), None).await?;
        let body: RegistrationResponse = decode(res).await?;
        Ok(body.event)
    }
}

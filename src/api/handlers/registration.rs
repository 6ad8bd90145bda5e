use axum::{extract::{State, Path}, response::IntoResponse, Json};
use crate::state::AppState;
use crate::api::extractors::auth::AuthUser;
use crate::api::dtos::responses::{RegistrationResponse, RegistrationsResponse};
use crate::domain::models::registration::{Registration, RegistrationStats};
use crate::domain::services::event_registry::check_registration;
use crate::error::AppError;
use std::sync::Arc;
use chrono::Utc;
use tracing::info;

pub async fn list_user_registrations(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let registrations = state.registration_repo.list_for_user(&user.id).await?;
    let stats = RegistrationStats::from_events(registrations.iter().map(|r| &r.event), Utc::now());

    Ok(Json(RegistrationsResponse { registrations, stats }))
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(event_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let event = state.event_repo.find_by_id(&event_id).await?
        .ok_or(AppError::NotFound("Event not found".into()))?;

    let now = Utc::now();
    let already = state.registration_repo.is_registered(&user.id, &event.id).await?;
    check_registration(&event, &user.id, already, now)?;

    // The repository re-checks capacity and date inside its transaction.
    let registration = Registration {
        user_id: user.id.clone(),
        event_id: event.id.clone(),
        created_at: now,
    };
    let updated = state.registration_repo.register(&registration, now).await?;

    info!("User {} registered for event {} ({}/{})", user.id, updated.id, updated.registered, updated.capacity);

    Ok(Json(RegistrationResponse {
        event_id: updated.id.clone(),
        is_registered: true,
        event: updated,
    }))
}

pub async fn unregister(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(event_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let event = state.event_repo.find_by_id(&event_id).await?
        .ok_or(AppError::NotFound("Event not found".into()))?;

    let updated = state.registration_repo.unregister(&user.id, &event.id).await?;

    info!("User {} unregistered from event {} ({}/{})", user.id, updated.id, updated.registered, updated.capacity);

    Ok(Json(RegistrationResponse {
        event_id: updated.id.clone(),
        is_registered: false,
        event: updated,
    }))
}

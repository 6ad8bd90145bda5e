use axum::{extract::{State, Path, Query}, response::IntoResponse, Json, http::StatusCode};
use crate::state::AppState;
use crate::api::extractors::{auth::AuthUser, maybe_auth::MaybeAuthUser};
use crate::api::dtos::{
    requests::{CreateEventRequest, EventListQuery, UpdateEventRequest},
    responses::EventResponse,
};
use crate::domain::models::{
    event::{Event, EventPatch, EventQuery, NewEvent},
    registration::EventStats,
    user::{EventRole, User},
};
use crate::domain::services::event_registry::{browse_events, event_categories, EventRegistry};
use crate::error::AppError;
use std::sync::Arc;
use chrono::Utc;
use tracing::{info, warn};

async fn load_event(state: &AppState, id: &str) -> Result<Event, AppError> {
    state.event_repo.find_by_id(id).await?
        .ok_or(AppError::NotFound("Event not found".into()))
}

async fn load_owned_event(state: &AppState, id: &str, user: &User) -> Result<Event, AppError> {
    let event = load_event(state, id).await?;
    if !event.is_organized_by(&user.id) {
        warn!("User {} tried to modify event {} owned by {}", user.id, event.id, event.organizer_id);
        return Err(AppError::Forbidden("Only the organizer can modify this event".into()));
    }
    Ok(event)
}

/// Registry view of `events` for a signed-in user, used to derive affordances.
async fn registry_for(state: &AppState, user: &User, events: Vec<Event>) -> Result<EventRegistry, AppError> {
    let registered = state.registration_repo.list_for_user(&user.id).await?
        .into_iter()
        .map(|r| r.event_id);
    Ok(EventRegistry::with_state(user.event_actor(), events, registered))
}

pub async fn list_events(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(user): MaybeAuthUser,
    Query(query): Query<EventListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let query = EventQuery::from(query);
    let events = state.event_repo.list().await?;
    let now = Utc::now();

    let response: Vec<EventResponse> = match user {
        Some(user) => {
            let registry = registry_for(&state, &user, events).await?;
            registry.browse(&query)
                .into_iter()
                .map(|e| EventResponse::new(e.clone(), now, Some(registry.affordance(e, now))))
                .collect()
        }
        None => browse_events(&events, &query)
            .into_iter()
            .map(|e| EventResponse::new(e.clone(), now, None))
            .collect(),
    };

    Ok(Json(response))
}

pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let events = state.event_repo.list().await?;
    Ok(Json(event_categories(&events)))
}

pub async fn get_event(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(user): MaybeAuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let event = load_event(&state, &id).await?;
    let now = Utc::now();

    let affordance = match user {
        Some(user) => {
            let registry = registry_for(&state, &user, vec![event.clone()]).await?;
            Some(registry.affordance(&event, now))
        }
        None => None,
    };

    Ok(Json(EventResponse::new(event, now, affordance)))
}

pub async fn create_event(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(payload): Json<CreateEventRequest>,
) -> Result<impl IntoResponse, AppError> {
    let data = NewEvent::from(payload);
    data.validate()?;

    let event = Event::new(data, user.id.clone(), user.name.clone());
    let created = state.event_repo.create(&event).await?;

    info!("Event {} created by {}", created.id, user.id);

    Ok((StatusCode::CREATED, Json(EventResponse::new(created, Utc::now(), None))))
}

pub async fn update_event(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdateEventRequest>,
) -> Result<impl IntoResponse, AppError> {
    let event = load_owned_event(&state, &id, &user).await?;

    let next = event.patched(EventPatch::from(payload))?;
    let saved = state.event_repo.update(&next).await?;

    info!("Event {} updated", saved.id);

    Ok(Json(EventResponse::new(saved, Utc::now(), None)))
}

pub async fn delete_event(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let event = load_owned_event(&state, &id, &user).await?;

    state.event_repo.delete(&event.id).await?;

    info!("Event {} deleted by {}", event.id, user.id);

    Ok(StatusCode::NO_CONTENT)
}

pub async fn my_event_stats(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    if user.event_role != EventRole::Organizer {
        return Err(AppError::Forbidden("Organizer stats are only available to organizers".into()));
    }
    let events = state.event_repo.list_by_organizer(&user.id).await?;
    Ok(Json(EventStats::from_events(&events, Utc::now())))
}

use axum::{extract::{State, Path, Query}, response::IntoResponse, Json, http::StatusCode};
use crate::state::AppState;
use crate::api::extractors::auth::AuthUser;
use crate::api::dtos::{
    requests::{CreateReplyRequest, CreateTicketRequest, TicketListQuery, UpdateTicketRequest, UpdateTicketStatusRequest},
    responses::{MarkReadResponse, TicketListResponse, TicketResponse},
};
use crate::domain::models::{
    ticket::{NewReply, NewTicket, Reply, Ticket, TicketPatch},
    user::{SupportActor, User},
};
use crate::domain::services::ticket_registry::{
    can_change_status, can_delete, can_edit, can_reply, can_view, TicketRegistry,
};
use crate::error::AppError;
use std::sync::Arc;
use tracing::{info, warn};

async fn load_visible_ticket(state: &AppState, id: &str, actor: &SupportActor) -> Result<Ticket, AppError> {
    let ticket = state.ticket_repo.find_by_id(id).await?
        .ok_or(AppError::NotFound("Ticket not found".into()))?;
    if !can_view(&ticket, actor) {
        warn!("User {} denied access to ticket {}", actor.id, ticket.id);
        return Err(AppError::Forbidden("You do not have access to this ticket".into()));
    }
    Ok(ticket)
}

fn respond(ticket: Ticket, user: &User) -> Json<TicketResponse> {
    Json(TicketResponse::for_reader(ticket, &user.id))
}

pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<TicketListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let actor = user.support_actor();
    let scope = if actor.is_agent() { None } else { Some(actor.id.as_str()) };
    let tickets = state.ticket_repo.list(scope).await?;

    let mut registry = TicketRegistry::with_tickets(actor.clone(), tickets);
    registry.set_status_filter(query.status);

    let counts = registry.status_counts();
    let tickets = registry.visible_tickets()
        .into_iter()
        .map(|t| TicketResponse::for_reader(t.clone(), &actor.id))
        .collect();

    Ok(Json(TicketListResponse { tickets, counts }))
}

pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(payload): Json<CreateTicketRequest>,
) -> Result<impl IntoResponse, AppError> {
    let data = NewTicket::from(payload);
    data.validate()?;

    let ticket = Ticket::new(data, user.id.clone(), user.name.clone(), user.email.clone());
    let created = state.ticket_repo.create(&ticket).await?;

    info!("Ticket {} opened by {}", created.id, user.id);

    Ok((StatusCode::CREATED, respond(created, &user)))
}

pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let ticket = load_visible_ticket(&state, &id, &user.support_actor()).await?;
    Ok(respond(ticket, &user))
}

pub async fn update_ticket(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdateTicketRequest>,
) -> Result<impl IntoResponse, AppError> {
    let actor = user.support_actor();
    let mut ticket = load_visible_ticket(&state, &id, &actor).await?;
    let patch = TicketPatch::from(payload);

    if patch.touches_content() && !can_edit(&ticket, &actor) {
        return Err(AppError::Forbidden("Only the owner can edit an unresolved ticket".into()));
    }
    if patch.touches_workflow() && !can_change_status(&actor) {
        return Err(AppError::Forbidden("Only agents can change status or assignment".into()));
    }

    let expected = ticket.updated_at;
    ticket.apply_patch(patch)?;
    let saved = state.ticket_repo.update(&ticket, expected).await?;

    info!("Ticket {} updated by {}", saved.id, user.id);

    Ok(respond(saved, &user))
}

pub async fn delete_ticket(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let actor = user.support_actor();
    let ticket = load_visible_ticket(&state, &id, &actor).await?;

    if !can_delete(&ticket, &actor) {
        return Err(AppError::Forbidden("Only the owner can delete an unresolved ticket".into()));
    }

    state.ticket_repo.delete(&ticket.id).await?;

    info!("Ticket {} deleted by {}", ticket.id, user.id);

    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_reply(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<CreateReplyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let actor = user.support_actor();
    let mut ticket = load_visible_ticket(&state, &id, &actor).await?;

    if !can_reply(&ticket, &actor) {
        return Err(AppError::Forbidden("You cannot reply to this ticket".into()));
    }

    let data = NewReply::from(payload);
    data.validate()?;

    let reply = Reply::new(ticket.id.clone(), actor.id.clone(), actor.name.clone(), actor.role, data.message);
    ticket.push_reply(reply.clone());
    state.ticket_repo.add_reply(&reply, ticket.updated_at).await?;

    info!("Reply {} added to ticket {} by {}", reply.id, ticket.id, user.id);

    Ok((StatusCode::CREATED, respond(ticket, &user)))
}

pub async fn update_ticket_status(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdateTicketStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let actor = user.support_actor();
    let mut ticket = load_visible_ticket(&state, &id, &actor).await?;

    if !can_change_status(&actor) {
        return Err(AppError::Forbidden("Only agents can change ticket status".into()));
    }

    let expected = ticket.updated_at;
    if !ticket.set_status(payload.status) {
        return Ok(respond(ticket, &user));
    }

    let saved = state.ticket_repo.update(&ticket, expected).await?;
    info!("Ticket {} moved to {}", saved.id, saved.status);

    Ok(respond(saved, &user))
}

pub async fn mark_replies_read(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let mut ticket = load_visible_ticket(&state, &id, &user.support_actor()).await?;

    let updated = state.ticket_repo.mark_replies_read(&ticket.id, &user.id).await?;
    ticket.mark_replies_read(&user.id);

    Ok(Json(MarkReadResponse {
        updated,
        ticket: TicketResponse::for_reader(ticket, &user.id),
    }))
}

use crate::domain::models::{
    auth::UserProfile,
    event::{Event, RegistrationAffordance},
    registration::{RegistrationStats, RegistrationWithEvent},
    ticket::Ticket,
};
use crate::domain::services::ticket_registry::StatusCounts;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An event plus its derived display fields.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EventResponse {
    #[serde(flatten)]
    pub event: Event,
    pub spots_left: i32,
    pub is_full: bool,
    pub is_past: bool,
    pub registration_percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub affordance: Option<RegistrationAffordance>,
}

impl EventResponse {
    pub fn new(event: Event, now: DateTime<Utc>, affordance: Option<RegistrationAffordance>) -> Self {
        Self {
            spots_left: event.spots_left(),
            is_full: event.is_full(),
            is_past: event.is_past(now),
            registration_percentage: event.registration_percentage(),
            affordance,
            event,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RegistrationsResponse {
    pub registrations: Vec<RegistrationWithEvent>,
    #[serde(default)]
    pub stats: RegistrationStats,
}

/// Outcome of a register / unregister call: the event as stored afterwards.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RegistrationResponse {
    pub event_id: String,
    pub is_registered: bool,
    pub event: Event,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TicketResponse {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub unread_count: usize,
}

impl TicketResponse {
    pub fn for_reader(ticket: Ticket, reader_id: &str) -> Self {
        let unread_count = ticket.unread_count(reader_id);
        Self { ticket, unread_count }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TicketListResponse {
    pub tickets: Vec<TicketResponse>,
    pub counts: StatusCounts,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MarkReadResponse {
    pub updated: u64,
    pub ticket: TicketResponse,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SignupResponse {
    pub user: UserProfile,
}

use crate::domain::models::{
    event::{EventPatch, EventQuery, EventSort, NewEvent},
    ticket::{NewReply, NewTicket, StatusFilter, TicketCategory, TicketPatch, TicketStatus},
    user::{EventRole, SupportRole},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<EventRole>,
}

#[derive(Deserialize, Serialize)]
pub struct UpdateSupportRoleRequest {
    pub support_role: SupportRole,
}

#[derive(Deserialize, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Serialize, Clone)]
pub struct CreateEventRequest {
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub location: String,
    pub capacity: i32,
    pub category: String,
    pub price: Option<f64>,
    pub image: Option<String>,
}

impl From<CreateEventRequest> for NewEvent {
    fn from(req: CreateEventRequest) -> Self {
        NewEvent {
            title: req.title,
            description: req.description,
            date: req.date,
            location: req.location,
            capacity: req.capacity,
            category: req.category,
            price: req.price,
            image: req.image,
        }
    }
}

impl From<NewEvent> for CreateEventRequest {
    fn from(data: NewEvent) -> Self {
        CreateEventRequest {
            title: data.title,
            description: data.description,
            date: data.date,
            location: data.location,
            capacity: data.capacity,
            category: data.category,
            price: data.price,
            image: data.image,
        }
    }
}

/// The registered count is not client-writable; it only moves through
/// the registration endpoints.
#[derive(Deserialize, Serialize, Clone, Default)]
pub struct UpdateEventRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl From<UpdateEventRequest> for EventPatch {
    fn from(req: UpdateEventRequest) -> Self {
        EventPatch {
            title: req.title,
            description: req.description,
            date: req.date,
            location: req.location,
            capacity: req.capacity,
            registered: None,
            category: req.category,
            price: req.price,
            image: req.image,
        }
    }
}

/// `GET /api/events?search=&category=&sort=date|title|price`
#[derive(Deserialize, Default)]
pub struct EventListQuery {
    #[serde(default)]
    pub search: String,
    pub category: Option<String>,
    #[serde(default)]
    pub sort: EventSort,
}

impl From<EventListQuery> for EventQuery {
    fn from(query: EventListQuery) -> Self {
        let category = query.category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty() && c != "all");
        EventQuery { search: query.search, category, sort: query.sort }
    }
}

#[derive(Deserialize, Serialize)]
pub struct CreateTicketRequest {
    pub subject: String,
    pub message: String,
    pub category: TicketCategory,
}

impl From<CreateTicketRequest> for NewTicket {
    fn from(req: CreateTicketRequest) -> Self {
        NewTicket { subject: req.subject, message: req.message, category: req.category }
    }
}

#[derive(Deserialize, Serialize, Default)]
pub struct UpdateTicketRequest {
    pub subject: Option<String>,
    pub category: Option<TicketCategory>,
    pub status: Option<TicketStatus>,
    pub assigned_agent_id: Option<String>,
    pub assigned_agent_name: Option<String>,
}

impl From<UpdateTicketRequest> for TicketPatch {
    fn from(req: UpdateTicketRequest) -> Self {
        TicketPatch {
            subject: req.subject,
            category: req.category,
            status: req.status,
            assigned_agent_id: req.assigned_agent_id,
            assigned_agent_name: req.assigned_agent_name,
        }
    }
}

#[derive(Deserialize, Serialize)]
pub struct CreateReplyRequest {
    pub message: String,
}

impl From<CreateReplyRequest> for NewReply {
    fn from(req: CreateReplyRequest) -> Self {
        NewReply { message: req.message }
    }
}

#[derive(Deserialize, Serialize)]
pub struct UpdateTicketStatusRequest {
    pub status: TicketStatus,
}

#[derive(Deserialize, Default)]
pub struct TicketListQuery {
    #[serde(default)]
    pub status: StatusFilter,
}

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::str::FromStr;
use crate::domain::models::ticket::UnknownVariant;

/// Role vocabulary of the event module.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventRole {
    Organizer,
    #[default]
    Attendee,
}

/// Role vocabulary of the support module.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SupportRole {
    #[default]
    Customer,
    Agent,
}

impl EventRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventRole::Organizer => "organizer",
            EventRole::Attendee => "attendee",
        }
    }
}

impl FromStr for EventRole {
    type Err = UnknownVariant;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "organizer" => Ok(EventRole::Organizer),
            "attendee" => Ok(EventRole::Attendee),
            other => Err(UnknownVariant::new("event role", other)),
        }
    }
}

impl TryFrom<String> for EventRole {
    type Error = UnknownVariant;
    fn try_from(value: String) -> Result<Self, Self::Error> { value.parse() }
}

impl SupportRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupportRole::Customer => "customer",
            SupportRole::Agent => "agent",
        }
    }
}

impl FromStr for SupportRole {
    type Err = UnknownVariant;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(SupportRole::Customer),
            "agent" => Ok(SupportRole::Agent),
            other => Err(UnknownVariant::new("support role", other)),
        }
    }
}

impl TryFrom<String> for SupportRole {
    type Error = UnknownVariant;
    fn try_from(value: String) -> Result<Self, Self::Error> { value.parse() }
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub event_role: EventRole,
    #[sqlx(try_from = "String")]
    pub support_role: SupportRole,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: String, email: String, password_hash: String, event_role: EventRole) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            email,
            password_hash,
            event_role,
            support_role: SupportRole::Customer,
            avatar: None,
            created_at: Utc::now(),
        }
    }

    pub fn event_actor(&self) -> EventActor {
        EventActor {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.event_role,
        }
    }

    pub fn support_actor(&self) -> SupportActor {
        SupportActor {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.support_role,
        }
    }
}

/// The signed-in user as seen by the event registry.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EventActor {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: EventRole,
}

/// The signed-in user as seen by the ticket registry.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SupportActor {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: SupportRole,
}

impl SupportActor {
    pub fn is_agent(&self) -> bool {
        self.role == SupportRole::Agent
    }
}

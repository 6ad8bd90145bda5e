use serde::{Deserialize, Serialize};
use chrono::{DateTime, Duration, SubsecRound, Utc};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use crate::domain::models::user::SupportRole;
use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Open,
    Pending,
    Resolved,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TicketCategory {
    Technical,
    Billing,
    General,
    BugReport,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl UnknownVariant {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self { kind, value: value.to_string() }
    }
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 3] = [TicketStatus::Open, TicketStatus::Pending, TicketStatus::Resolved];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::Pending => "pending",
            TicketStatus::Resolved => "resolved",
        }
    }
}

impl FromStr for TicketStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(TicketStatus::Open),
            "pending" => Ok(TicketStatus::Pending),
            "resolved" => Ok(TicketStatus::Resolved),
            other => Err(UnknownVariant::new("ticket status", other)),
        }
    }
}

impl TryFrom<String> for TicketStatus {
    type Error = UnknownVariant;
    fn try_from(value: String) -> Result<Self, Self::Error> { value.parse() }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TicketCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketCategory::Technical => "technical",
            TicketCategory::Billing => "billing",
            TicketCategory::General => "general",
            TicketCategory::BugReport => "bug-report",
        }
    }
}

impl FromStr for TicketCategory {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "technical" => Ok(TicketCategory::Technical),
            "billing" => Ok(TicketCategory::Billing),
            "general" => Ok(TicketCategory::General),
            "bug-report" => Ok(TicketCategory::BugReport),
            other => Err(UnknownVariant::new("ticket category", other)),
        }
    }
}

impl TryFrom<String> for TicketCategory {
    type Error = UnknownVariant;
    fn try_from(value: String) -> Result<Self, Self::Error> { value.parse() }
}

/// Ticket list filter. `All` is the sentinel that disables filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(TicketStatus),
}

impl StatusFilter {
    pub fn matches(&self, status: TicketStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(s) => *s == status,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(StatusFilter::All);
        }
        s.parse().map(StatusFilter::Only)
    }
}

impl Serialize for StatusFilter {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            StatusFilter::All => serializer.serialize_str("all"),
            StatusFilter::Only(s) => serializer.serialize_str(s.as_str()),
        }
    }
}

impl<'de> Deserialize<'de> for StatusFilter {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone, PartialEq)]
pub struct Reply {
    pub id: String,
    pub ticket_id: String,
    pub user_id: String,
    pub user_name: String,
    #[sqlx(try_from = "String")]
    pub user_role: SupportRole,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone, PartialEq)]
pub struct Ticket {
    pub id: String,
    pub subject: String,
    pub message: String,
    #[sqlx(try_from = "String")]
    pub category: TicketCategory,
    #[sqlx(try_from = "String")]
    pub status: TicketStatus,
    pub customer_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub assigned_agent_id: Option<String>,
    pub assigned_agent_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    #[serde(default)]
    pub replies: Vec<Reply>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NewTicket {
    pub subject: String,
    pub message: String,
    pub category: TicketCategory,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct TicketPatch {
    pub subject: Option<String>,
    pub category: Option<TicketCategory>,
    pub status: Option<TicketStatus>,
    pub assigned_agent_id: Option<String>,
    pub assigned_agent_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NewReply {
    pub message: String,
}

fn require_text(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

impl NewTicket {
    pub fn validate(&self) -> Result<(), AppError> {
        require_text("Subject", &self.subject)?;
        require_text("Message", &self.message)
    }
}

impl NewReply {
    pub fn validate(&self) -> Result<(), AppError> {
        require_text("Message", &self.message)
    }
}

impl TicketPatch {
    pub fn touches_workflow(&self) -> bool {
        self.status.is_some() || self.assigned_agent_id.is_some() || self.assigned_agent_name.is_some()
    }

    pub fn touches_content(&self) -> bool {
        self.subject.is_some() || self.category.is_some()
    }
}

/// Current time at microsecond precision, the finest both databases keep.
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Next value for `updated_at`: the current time, or one microsecond past the
/// previous value when the clock has not moved on.
pub fn advance_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = timestamp_now();
    if now > previous { now } else { (previous + Duration::microseconds(1)).trunc_subsecs(6) }
}

impl Ticket {
    pub fn new(data: NewTicket, customer_id: String, customer_name: String, customer_email: String) -> Self {
        let now = timestamp_now();
        Self {
            id: Uuid::new_v4().to_string(),
            subject: data.subject.trim().to_string(),
            message: data.message.trim().to_string(),
            category: data.category,
            status: TicketStatus::Open,
            customer_id,
            customer_name,
            customer_email,
            assigned_agent_id: None,
            assigned_agent_name: None,
            created_at: now,
            updated_at: now,
            replies: Vec::new(),
        }
    }

    /// Merges a patch and advances `updated_at`. Nothing changes when the
    /// patch is invalid.
    pub fn apply_patch(&mut self, patch: TicketPatch) -> Result<(), AppError> {
        if let Some(subject) = &patch.subject {
            require_text("Subject", subject)?;
        }

        if let Some(val) = patch.subject { self.subject = val.trim().to_string(); }
        if let Some(val) = patch.category { self.category = val; }
        if let Some(val) = patch.status { self.status = val; }
        if let Some(val) = patch.assigned_agent_id { self.assigned_agent_id = Some(val); }
        if let Some(val) = patch.assigned_agent_name { self.assigned_agent_name = Some(val); }

        self.touch();
        Ok(())
    }

    /// Returns false, leaving the ticket untouched, when the status is unchanged.
    pub fn set_status(&mut self, status: TicketStatus) -> bool {
        if self.status == status {
            return false;
        }
        self.status = status;
        self.touch();
        true
    }

    pub fn push_reply(&mut self, reply: Reply) {
        self.replies.push(reply);
        self.touch();
    }

    /// Distributes replies onto their tickets. Reply order is preserved.
    pub fn attach_replies(mut tickets: Vec<Ticket>, replies: Vec<Reply>) -> Vec<Ticket> {
        for reply in replies {
            if let Some(ticket) = tickets.iter_mut().find(|t| t.id == reply.ticket_id) {
                ticket.replies.push(reply);
            }
        }
        tickets
    }

    pub fn touch(&mut self) {
        self.updated_at = advance_timestamp(self.updated_at);
    }

    /// Replies authored by someone other than `reader_id` that are still unread.
    pub fn unread_count(&self, reader_id: &str) -> usize {
        self.replies
            .iter()
            .filter(|r| r.user_id != reader_id && !r.is_read)
            .count()
    }

    pub fn mark_replies_read(&mut self, reader_id: &str) {
        for reply in self.replies.iter_mut().filter(|r| r.user_id != reader_id) {
            reply.is_read = true;
        }
    }
}

impl Reply {
    pub fn new(ticket_id: String, user_id: String, user_name: String, user_role: SupportRole, message: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            ticket_id,
            user_id,
            user_name,
            user_role,
            message: message.trim().to_string(),
            created_at: timestamp_now(),
            is_read: false,
        }
    }
}

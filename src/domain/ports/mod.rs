use crate::domain::models::{
    user::{SupportRole, User}, event::Event, registration::{Registration, RegistrationWithEvent},
    ticket::{Ticket, Reply}, auth::RefreshTokenRecord,
};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &User) -> Result<User, AppError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError>;
    /// Returns `None` when no such user exists.
    async fn update_support_role(&self, id: &str, role: SupportRole) -> Result<Option<User>, AppError>;
}

#[async_trait]
pub trait AuthRepository: Send + Sync {
    async fn create_refresh_token(&self, record: &RefreshTokenRecord) -> Result<(), AppError>;
    async fn find_refresh_token(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>, AppError>;
    /// Atomically consumes `consumed_hash` and stores `next`. Returns false,
    /// storing nothing, when the consumed token no longer exists.
    async fn rotate_refresh_token(&self, consumed_hash: &str, next: &RefreshTokenRecord) -> Result<bool, AppError>;
    async fn revoke_refresh_token(&self, token_hash: &str) -> Result<(), AppError>;
    /// Returns how many tokens of the family were still live.
    async fn revoke_refresh_family(&self, family_id: Uuid) -> Result<u64, AppError>;
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn create(&self, event: &Event) -> Result<Event, AppError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Event>, AppError>;
    async fn list(&self) -> Result<Vec<Event>, AppError>;
    async fn list_by_organizer(&self, organizer_id: &str) -> Result<Vec<Event>, AppError>;
    async fn update(&self, event: &Event) -> Result<Event, AppError>;
    /// Removes the event together with every registration that points at it.
    async fn delete(&self, id: &str) -> Result<(), AppError>;
}

#[async_trait]
pub trait RegistrationRepository: Send + Sync {
    /// Inserts the registration and bumps the event counter in one transaction.
    /// Fails with `Conflict` when the event is full, already past or the user
    /// is already registered; nothing is written in that case.
    async fn register(&self, registration: &Registration, now: DateTime<Utc>) -> Result<Event, AppError>;
    /// Deletes the registration and decrements the counter (never below zero).
    async fn unregister(&self, user_id: &str, event_id: &str) -> Result<Event, AppError>;
    async fn is_registered(&self, user_id: &str, event_id: &str) -> Result<bool, AppError>;
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<RegistrationWithEvent>, AppError>;
}

#[async_trait]
pub trait TicketRepository: Send + Sync {
    async fn create(&self, ticket: &Ticket) -> Result<Ticket, AppError>;
    /// Loads the ticket with its replies in creation order.
    async fn find_by_id(&self, id: &str) -> Result<Option<Ticket>, AppError>;
    /// Most recent first. `None` lists every customer's tickets.
    async fn list(&self, customer_id: Option<&str>) -> Result<Vec<Ticket>, AppError>;
    /// Writes the ticket only if its stored `updated_at` still equals
    /// `expected_updated_at`; otherwise fails with `Conflict`.
    async fn update(&self, ticket: &Ticket, expected_updated_at: DateTime<Utc>) -> Result<Ticket, AppError>;
    async fn delete(&self, id: &str) -> Result<(), AppError>;
    async fn add_reply(&self, reply: &Reply, ticket_updated_at: DateTime<Utc>) -> Result<(), AppError>;
    async fn mark_replies_read(&self, ticket_id: &str, reader_id: &str) -> Result<u64, AppError>;
}

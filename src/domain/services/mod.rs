pub mod auth_service;
pub mod event_registry;
pub mod ticket_registry;

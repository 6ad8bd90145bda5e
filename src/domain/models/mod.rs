pub mod auth;
pub mod event;
pub mod registration;
pub mod ticket;
pub mod user;

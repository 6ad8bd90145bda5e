//! Client side of the event API: a typed remote interface and a session
//! container that keeps a local [`EventRegistry`] in sync with the server.
//!
//! [`EventRegistry`]: crate::domain::services::event_registry::EventRegistry

pub mod api_client;
pub mod event_session;

pub use api_client::{EventApi, HttpEventApi};
pub use event_session::EventSession;

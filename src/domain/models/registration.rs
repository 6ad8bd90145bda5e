use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use crate::domain::models::event::Event;

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Registration {
    pub user_id: String,
    pub event_id: String,
    pub created_at: DateTime<Utc>,
}

/// A registration joined with the event it points at.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RegistrationWithEvent {
    pub event_id: String,
    pub registered_at: DateTime<Utc>,
    pub event: Event,
}

impl RegistrationWithEvent {
    /// Pairs each registration with its event, keeping registration order.
    /// Registrations whose event is missing are skipped.
    pub fn join(registrations: Vec<Registration>, events: Vec<Event>) -> Vec<Self> {
        registrations
            .into_iter()
            .filter_map(|r| {
                let event = events.iter().find(|e| e.id == r.event_id)?.clone();
                Some(Self { event_id: r.event_id, registered_at: r.created_at, event })
            })
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct EventStats {
    pub total_events: usize,
    pub total_registrations: i64,
    pub average_registrations: i64,
    pub upcoming_events: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct RegistrationStats {
    pub upcoming: usize,
    pub past: usize,
    pub total_value: f64,
    pub average_price: f64,
    pub free_events: usize,
}

impl EventStats {
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a Event>, now: DateTime<Utc>) -> Self {
        let mut stats = EventStats::default();
        for event in events {
            stats.total_events += 1;
            stats.total_registrations += i64::from(event.registered);
            if !event.is_past(now) {
                stats.upcoming_events += 1;
            }
        }
        if stats.total_events > 0 {
            let avg = stats.total_registrations as f64 / stats.total_events as f64;
            stats.average_registrations = avg.round() as i64;
        }
        stats
    }
}

impl RegistrationStats {
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a Event>, now: DateTime<Utc>) -> Self {
        let mut stats = RegistrationStats::default();
        let mut count = 0usize;
        for event in events {
            count += 1;
            if event.is_past(now) { stats.past += 1; } else { stats.upcoming += 1; }
            if event.price == 0.0 { stats.free_events += 1; }
            stats.total_value += event.price;
        }
        if count > 0 {
            stats.average_price = stats.total_value / count as f64;
        }
        stats
    }
}

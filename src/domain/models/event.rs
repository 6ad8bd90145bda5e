use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;
use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize, FromRow, Clone, PartialEq)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub location: String,
    pub capacity: i32,
    pub registered: i32,
    pub organizer_id: String,
    pub organizer: String,
    pub category: String,
    pub price: f64,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Everything a caller supplies when creating an event. Id, counters and
/// organizer fields are assigned by the registry.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub location: String,
    pub capacity: i32,
    pub category: String,
    pub price: Option<f64>,
    pub image: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub capacity: Option<i32>,
    pub registered: Option<i32>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub image: Option<String>,
}

/// What the registration control shows for one actor and one event.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationAffordance {
    Past,
    Owner,
    Registered,
    Full,
    Available,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventSort {
    /// Soonest first.
    #[default]
    Date,
    Title,
    /// Cheapest first.
    Price,
}

/// Browse parameters for the event list. A `None` category (or `all` on the
/// wire) matches every category; an empty search matches every event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventQuery {
    pub search: String,
    pub category: Option<String>,
    pub sort: EventSort,
}

impl EventQuery {
    pub fn matches(&self, event: &Event) -> bool {
        let needle = self.search.to_lowercase();
        let matches_search = event.title.to_lowercase().contains(&needle)
            || event.description.to_lowercase().contains(&needle);
        let matches_category = self.category.as_deref().is_none_or(|c| event.category == c);
        matches_search && matches_category
    }
}

fn require_text(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

fn validate_capacity(capacity: i32) -> Result<(), AppError> {
    if capacity <= 0 {
        return Err(AppError::Validation("Capacity must be a positive integer".into()));
    }
    Ok(())
}

fn validate_price(price: f64) -> Result<(), AppError> {
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::Validation("Price must be a non-negative number".into()));
    }
    Ok(())
}

impl NewEvent {
    pub fn validate(&self) -> Result<(), AppError> {
        require_text("Title", &self.title)?;
        require_text("Description", &self.description)?;
        require_text("Location", &self.location)?;
        require_text("Category", &self.category)?;
        validate_capacity(self.capacity)?;
        if let Some(price) = self.price {
            validate_price(price)?;
        }
        Ok(())
    }
}

impl Event {
    pub fn new(data: NewEvent, organizer_id: String, organizer: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: data.title,
            description: data.description,
            date: data.date,
            location: data.location,
            capacity: data.capacity,
            registered: 0,
            organizer_id,
            organizer,
            category: data.category,
            price: data.price.unwrap_or(0.0),
            image: data.image,
            created_at: Utc::now(),
        }
    }

    pub fn is_past(&self, now: DateTime<Utc>) -> bool {
        self.date <= now
    }

    pub fn is_full(&self) -> bool {
        self.registered >= self.capacity
    }

    pub fn is_organized_by(&self, actor_id: &str) -> bool {
        self.organizer_id == actor_id
    }

    pub fn spots_left(&self) -> i32 {
        (self.capacity - self.registered).max(0)
    }

    pub fn registration_percentage(&self) -> f64 {
        if self.capacity <= 0 {
            return 0.0;
        }
        f64::from(self.registered) / f64::from(self.capacity) * 100.0
    }

    /// Merges a patch into a copy of the event. The original is untouched if
    /// the result would break an invariant.
    pub fn patched(&self, patch: EventPatch) -> Result<Event, AppError> {
        let mut next = self.clone();

        if let Some(val) = patch.title { require_text("Title", &val)?; next.title = val; }
        if let Some(val) = patch.description { require_text("Description", &val)?; next.description = val; }
        if let Some(val) = patch.date { next.date = val; }
        if let Some(val) = patch.location { require_text("Location", &val)?; next.location = val; }
        if let Some(val) = patch.category { require_text("Category", &val)?; next.category = val; }
        if let Some(val) = patch.capacity { validate_capacity(val)?; next.capacity = val; }
        if let Some(val) = patch.registered { next.registered = val; }
        if let Some(val) = patch.price { validate_price(val)?; next.price = val; }
        if let Some(val) = patch.image { next.image = if val.is_empty() { None } else { Some(val) }; }

        if next.registered < 0 {
            return Err(AppError::Validation("Registered count cannot be negative".into()));
        }
        if next.registered > next.capacity {
            return Err(AppError::Validation(format!(
                "Capacity {} is below the {} existing registrations",
                next.capacity, next.registered
            )));
        }

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample(capacity: i32, registered: i32) -> Event {
        let mut event = Event::new(
            NewEvent {
                title: "Design Workshop".into(),
                description: "Hands-on".into(),
                date: Utc::now() + Duration::days(3),
                location: "Studio".into(),
                capacity,
                category: "Design".into(),
                price: None,
                image: None,
            },
            "org2".into(),
            "Design Masters".into(),
        );
        event.registered = registered;
        event
    }

    #[test]
    fn derived_fields() {
        let event = sample(50, 35);
        assert!(!event.is_full());
        assert_eq!(event.spots_left(), 15);
        assert!((event.registration_percentage() - 70.0).abs() < f64::EPSILON);
        assert_eq!(event.price, 0.0);
        assert!(sample(2, 2).is_full());
    }

    #[test]
    fn query_matches_title_or_description_case_insensitively() {
        let event = sample(10, 0);
        let query = |search: &str, category: Option<&str>| EventQuery {
            search: search.into(),
            category: category.map(str::to_string),
            ..Default::default()
        };

        assert!(query("", None).matches(&event));
        assert!(query("WORKSHOP", None).matches(&event));
        assert!(query("hands-ON", None).matches(&event));
        assert!(query("workshop", Some("Design")).matches(&event));
        assert!(!query("workshop", Some("Music")).matches(&event));
        assert!(!query("concert", None).matches(&event));
    }

    #[test]
    fn patch_rejects_capacity_below_registered() {
        let event = sample(10, 8);
        let err = event.patched(EventPatch { capacity: Some(5), ..Default::default() });
        assert!(matches!(err, Err(AppError::Validation(_))));
    }

    #[test]
    fn patch_rejects_registered_over_capacity() {
        let event = sample(10, 8);
        let err = event.patched(EventPatch { registered: Some(11), ..Default::default() });
        assert!(matches!(err, Err(AppError::Validation(_))));
    }

    #[test]
    fn validate_rejects_non_positive_capacity() {
        let mut data = NewEvent {
            title: "T".into(),
            description: "D".into(),
            date: Utc::now(),
            location: "L".into(),
            capacity: 0,
            category: "C".into(),
            price: Some(10.0),
            image: None,
        };
        assert!(matches!(data.validate(), Err(AppError::Validation(_))));
        data.capacity = 1;
        data.price = Some(-1.0);
        assert!(matches!(data.validate(), Err(AppError::Validation(_))));
    }
}

use crate::api::dtos::requests::UpdateEventRequest;
use crate::client::api_client::EventApi;
use crate::domain::models::{
    event::{Event, EventPatch, NewEvent, RegistrationAffordance},
    user::EventActor,
};
use crate::domain::services::event_registry::EventRegistry;
use crate::error::AppError;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Marks an event as having a registration call outstanding. Released on drop.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<String>>,
    event_id: String,
}

impl<'a> InFlight<'a> {
    fn acquire(set: &'a Mutex<HashSet<String>>, event_id: &str) -> Result<Self, AppError> {
        if !lock(set).insert(event_id.to_string()) {
            return Err(AppError::Conflict("A registration change for this event is already in progress".into()));
        }
        Ok(Self { set, event_id: event_id.to_string() })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        lock(self.set).remove(&self.event_id);
    }
}

/// Per-session event state backed by a remote [`EventApi`].
///
/// Mutations are confirm-then-apply: local rules are checked first (a
/// failing check never reaches the network), then the remote call runs, and
/// only a successful response touches local state. Responses that arrive
/// after [`invalidate`](Self::invalidate) are discarded.
pub struct EventSession {
    api: Arc<dyn EventApi>,
    registry: Mutex<EventRegistry>,
    in_flight: Mutex<HashSet<String>>,
    generation: AtomicU64,
}

impl EventSession {
    pub fn new(api: Arc<dyn EventApi>, actor: EventActor) -> Self {
        Self {
            api,
            registry: Mutex::new(EventRegistry::new(actor)),
            in_flight: Mutex::new(HashSet::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Copy of the current local state for rendering.
    pub fn snapshot(&self) -> EventRegistry {
        lock(&self.registry).clone()
    }

    pub fn events(&self) -> Vec<Event> {
        lock(&self.registry).events().to_vec()
    }

    pub fn is_registered(&self, event_id: &str) -> bool {
        lock(&self.registry).is_registered(event_id)
    }

    pub fn affordance(&self, event_id: &str) -> Option<RegistrationAffordance> {
        let registry = lock(&self.registry);
        registry.get_event(event_id).map(|e| registry.affordance(e, Utc::now()))
    }

    /// Drops local state and orphans every response still in flight.
    pub fn invalidate(&self) {
        let mut registry = lock(&self.registry);
        self.generation.fetch_add(1, Ordering::SeqCst);
        registry.reset(Vec::new(), Vec::new());
    }

    fn apply_if_current<F>(&self, generation: u64, apply: F) -> bool
    where
        F: FnOnce(&mut EventRegistry),
    {
        let mut registry = lock(&self.registry);
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("Discarding stale response from generation {}", generation);
            return false;
        }
        apply(&mut registry);
        true
    }

    /// Reloads events and registrations. Returns `false` when the result
    /// was discarded because the session was invalidated meanwhile.
    pub async fn refresh(&self) -> Result<bool, AppError> {
        let generation = self.generation.load(Ordering::SeqCst);

        let (events, registrations) = tokio::try_join!(
            self.api.list_events(),
            self.api.user_registrations(),
        )?;

        let applied = self.apply_if_current(generation, |registry| registry.reset(events, registrations));
        if applied {
            info!("Session state refreshed");
        }
        Ok(applied)
    }

    pub async fn create_event(&self, data: NewEvent) -> Result<Event, AppError> {
        data.validate()?;

        let generation = self.generation.load(Ordering::SeqCst);
        let created = self.api.create_event(&data).await?;

        self.apply_if_current(generation, |registry| registry.insert_event(created.clone()));
        Ok(created)
    }

    fn check_owned(&self, event_id: &str) -> Result<Event, AppError> {
        let registry = lock(&self.registry);
        let event = registry
            .get_event(event_id)
            .ok_or(AppError::NotFound("Event not found".into()))?;
        if !registry.is_owner(event) {
            return Err(AppError::Forbidden("Only the organizer can modify this event".into()));
        }
        Ok(event.clone())
    }

    pub async fn update_event(&self, event_id: &str, patch: UpdateEventRequest) -> Result<Event, AppError> {
        let current = self.check_owned(event_id)?;
        current.patched(EventPatch::from(patch.clone()))?;

        let generation = self.generation.load(Ordering::SeqCst);
        let updated = self.api.update_event(event_id, &patch).await?;

        self.apply_if_current(generation, |registry| registry.insert_event(updated.clone()));
        Ok(updated)
    }

    pub async fn delete_event(&self, event_id: &str) -> Result<(), AppError> {
        self.check_owned(event_id)?;

        let generation = self.generation.load(Ordering::SeqCst);
        self.api.delete_event(event_id).await?;

        self.apply_if_current(generation, |registry| {
            registry.remove_event(event_id);
        });
        Ok(())
    }

    pub async fn register(&self, event_id: &str) -> Result<Event, AppError> {
        let _guard = InFlight::acquire(&self.in_flight, event_id)?;

        {
            let registry = lock(&self.registry);
            let event = registry
                .get_event(event_id)
                .ok_or(AppError::NotFound("Event not found".into()))?;
            registry.check_registration_at(event, Utc::now())?;
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let confirmed = self.api.register(event_id).await?;

        self.apply_if_current(generation, |registry| registry.record_registration(confirmed.clone()));
        info!("Registered for event {}", event_id);
        Ok(confirmed)
    }

    pub async fn unregister(&self, event_id: &str) -> Result<Event, AppError> {
        let _guard = InFlight::acquire(&self.in_flight, event_id)?;

        lock(&self.registry).check_unregistration(event_id)?;

        let generation = self.generation.load(Ordering::SeqCst);
        let confirmed = self.api.unregister(event_id).await?;

        self.apply_if_current(generation, |registry| registry.record_unregistration(confirmed.clone()));
        info!("Unregistered from event {}", event_id);
        Ok(confirmed)
    }
}

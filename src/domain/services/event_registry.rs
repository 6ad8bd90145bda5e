use std::collections::HashSet;
use chrono::{DateTime, Utc};
use tracing::debug;
use crate::domain::models::{
    event::{Event, EventPatch, EventQuery, EventSort, NewEvent, RegistrationAffordance},
    registration::{EventStats, RegistrationStats},
    user::EventActor,
};
use crate::error::AppError;

/// Eligibility guard shared by the in-memory registry and the HTTP layer.
///
/// Stricter than [`EventRegistry::can_register`]: the organizer of an event
/// is rejected as well.
pub fn check_registration(
    event: &Event,
    actor_id: &str,
    already_registered: bool,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    if event.is_past(now) {
        return Err(AppError::Conflict("Event has already taken place".into()));
    }
    if event.is_organized_by(actor_id) {
        return Err(AppError::Conflict("Organizers cannot register for their own event".into()));
    }
    if already_registered {
        return Err(AppError::Conflict("Already registered for this event".into()));
    }
    if event.is_full() {
        return Err(AppError::Conflict("Event is full".into()));
    }
    Ok(())
}

/// Filters `events` by `query` and orders the matches. The sort is stable,
/// so ties keep their incoming order.
pub fn browse_events<'a>(events: impl IntoIterator<Item = &'a Event>, query: &EventQuery) -> Vec<&'a Event> {
    let mut matched: Vec<&Event> = events.into_iter().filter(|e| query.matches(e)).collect();
    match query.sort {
        EventSort::Date => matched.sort_by_key(|e| e.date),
        EventSort::Title => matched.sort_by(|a, b| {
            a.title.to_lowercase().cmp(&b.title.to_lowercase()).then_with(|| a.title.cmp(&b.title))
        }),
        EventSort::Price => matched.sort_by(|a, b| a.price.total_cmp(&b.price)),
    }
    matched
}

/// Distinct categories in first-seen order.
pub fn event_categories<'a>(events: impl IntoIterator<Item = &'a Event>) -> Vec<String> {
    let mut seen = HashSet::new();
    events
        .into_iter()
        .filter(|e| seen.insert(e.category.as_str()))
        .map(|e| e.category.clone())
        .collect()
}

fn clamp_registered(mut event: Event) -> Event {
    event.registered = event.registered.clamp(0, event.capacity.max(0));
    event
}

/// Events plus the current actor's registration set.
///
/// Every operation is all-or-nothing: on error the registry is unchanged.
#[derive(Debug, Clone)]
pub struct EventRegistry {
    actor: EventActor,
    events: Vec<Event>,
    registrations: HashSet<String>,
}

impl EventRegistry {
    pub fn new(actor: EventActor) -> Self {
        Self { actor, events: Vec::new(), registrations: HashSet::new() }
    }

    pub fn with_state(actor: EventActor, events: Vec<Event>, registrations: impl IntoIterator<Item = String>) -> Self {
        let mut registry = Self::new(actor);
        registry.reset(events, registrations);
        registry
    }

    pub fn actor(&self) -> &EventActor {
        &self.actor
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn registered_event_ids(&self) -> &HashSet<String> {
        &self.registrations
    }

    pub fn get_event(&self, id: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.id == id)
    }

    fn position(&self, id: &str) -> Result<usize, AppError> {
        self.events
            .iter()
            .position(|e| e.id == id)
            .ok_or(AppError::NotFound("Event not found".into()))
    }

    fn owned_position(&self, id: &str) -> Result<usize, AppError> {
        let idx = self.position(id)?;
        if !self.is_owner(&self.events[idx]) {
            return Err(AppError::Forbidden("Only the organizer can modify this event".into()));
        }
        Ok(idx)
    }

    pub fn create_event(&mut self, data: NewEvent) -> Result<Event, AppError> {
        data.validate()?;
        let event = Event::new(data, self.actor.id.clone(), self.actor.name.clone());
        self.events.insert(0, event.clone());
        debug!("Created event {}", event.id);
        Ok(event)
    }

    pub fn update_event(&mut self, id: &str, patch: EventPatch) -> Result<Event, AppError> {
        let idx = self.owned_position(id)?;
        let next = self.events[idx].patched(patch)?;
        self.events[idx] = next.clone();
        Ok(next)
    }

    pub fn delete_event(&mut self, id: &str) -> Result<(), AppError> {
        let idx = self.owned_position(id)?;
        self.events.remove(idx);
        self.registrations.remove(id);
        Ok(())
    }

    pub fn register_for_event(&mut self, event_id: &str) -> Result<Event, AppError> {
        self.register_for_event_at(event_id, Utc::now())
    }

    pub fn register_for_event_at(&mut self, event_id: &str, now: DateTime<Utc>) -> Result<Event, AppError> {
        let idx = self.position(event_id)?;
        self.check_registration_at(&self.events[idx], now)?;

        let event = &mut self.events[idx];
        event.registered += 1;
        self.registrations.insert(event.id.clone());
        Ok(event.clone())
    }

    pub fn unregister_from_event(&mut self, event_id: &str) -> Result<Event, AppError> {
        self.check_unregistration(event_id)?;
        let idx = self.position(event_id)?;

        let event = &mut self.events[idx];
        event.registered = (event.registered - 1).max(0);
        self.registrations.remove(event_id);
        Ok(event.clone())
    }

    pub fn check_registration_at(&self, event: &Event, now: DateTime<Utc>) -> Result<(), AppError> {
        check_registration(event, &self.actor.id, self.is_registered(&event.id), now)
    }

    pub fn check_unregistration(&self, event_id: &str) -> Result<(), AppError> {
        if !self.is_registered(event_id) {
            return Err(AppError::Conflict("Not registered for this event".into()));
        }
        Ok(())
    }

    pub fn is_registered(&self, event_id: &str) -> bool {
        self.registrations.contains(event_id)
    }

    pub fn can_register(&self, event: &Event) -> bool {
        self.can_register_at(event, Utc::now())
    }

    pub fn can_register_at(&self, event: &Event, now: DateTime<Utc>) -> bool {
        !event.is_past(now) && event.registered < event.capacity && !self.is_registered(&event.id)
    }

    pub fn is_owner(&self, event: &Event) -> bool {
        event.is_organized_by(&self.actor.id)
    }

    pub fn affordance(&self, event: &Event, now: DateTime<Utc>) -> RegistrationAffordance {
        if event.is_past(now) {
            RegistrationAffordance::Past
        } else if self.is_owner(event) {
            RegistrationAffordance::Owner
        } else if self.is_registered(&event.id) {
            RegistrationAffordance::Registered
        } else if event.is_full() {
            RegistrationAffordance::Full
        } else {
            RegistrationAffordance::Available
        }
    }

    pub fn browse(&self, query: &EventQuery) -> Vec<&Event> {
        browse_events(&self.events, query)
    }

    pub fn categories(&self) -> Vec<String> {
        event_categories(&self.events)
    }

    pub fn registered_events(&self) -> Vec<&Event> {
        self.events.iter().filter(|e| self.is_registered(&e.id)).collect()
    }

    /// Soonest first.
    pub fn upcoming_events(&self, now: DateTime<Utc>) -> Vec<&Event> {
        let mut events: Vec<&Event> = self.events.iter().filter(|e| !e.is_past(now)).collect();
        events.sort_by_key(|e| e.date);
        events
    }

    /// Most recent first.
    pub fn past_events(&self, now: DateTime<Utc>) -> Vec<&Event> {
        let mut events: Vec<&Event> = self.events.iter().filter(|e| e.is_past(now)).collect();
        events.sort_by(|a, b| b.date.cmp(&a.date));
        events
    }

    pub fn my_events(&self) -> Vec<&Event> {
        self.events.iter().filter(|e| self.is_owner(e)).collect()
    }

    pub fn stats_for_organizer(&self, now: DateTime<Utc>) -> EventStats {
        EventStats::from_events(self.my_events(), now)
    }

    pub fn registration_stats(&self, now: DateTime<Utc>) -> RegistrationStats {
        RegistrationStats::from_events(self.registered_events(), now)
    }

    // Apply methods: local state catches up with a mutation the backend has
    // already confirmed.

    /// Replaces the whole state with a fresh snapshot. Registrations pointing
    /// at unknown events are dropped.
    pub fn reset(&mut self, events: Vec<Event>, registrations: impl IntoIterator<Item = String>) {
        self.events = events.into_iter().map(clamp_registered).collect();
        let known: HashSet<&str> = self.events.iter().map(|e| e.id.as_str()).collect();
        self.registrations = registrations
            .into_iter()
            .filter(|id| known.contains(id.as_str()))
            .collect();
    }

    pub fn insert_event(&mut self, event: Event) {
        let event = clamp_registered(event);
        match self.events.iter().position(|e| e.id == event.id) {
            Some(idx) => self.events[idx] = event,
            None => self.events.insert(0, event),
        }
    }

    /// Returns false when the event is not known locally.
    pub fn replace_event(&mut self, event: Event) -> bool {
        match self.events.iter().position(|e| e.id == event.id) {
            Some(idx) => {
                self.events[idx] = clamp_registered(event);
                true
            }
            None => false,
        }
    }

    pub fn remove_event(&mut self, id: &str) -> Option<Event> {
        self.registrations.remove(id);
        let idx = self.events.iter().position(|e| e.id == id)?;
        Some(self.events.remove(idx))
    }

    /// `event` is the server's view after the registration was accepted.
    pub fn record_registration(&mut self, event: Event) {
        self.registrations.insert(event.id.clone());
        self.insert_event(event);
    }

    pub fn record_unregistration(&mut self, event: Event) {
        self.registrations.remove(&event.id);
        self.insert_event(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use crate::domain::models::user::EventRole;

    fn actor(id: &str) -> EventActor {
        EventActor {
            id: id.into(),
            name: format!("User {}", id),
            email: format!("{}@example.com", id),
            role: EventRole::Attendee,
        }
    }

    fn new_event(capacity: i32, days_ahead: i64) -> NewEvent {
        NewEvent {
            title: "Tech Conference".into(),
            description: "Talks and workshops".into(),
            date: Utc::now() + Duration::days(days_ahead),
            location: "Convention Center".into(),
            capacity,
            category: "Technology".into(),
            price: Some(99.0),
            image: None,
        }
    }

    fn event_by(organizer: &str, capacity: i32, registered: i32, days_ahead: i64) -> Event {
        let mut event = Event::new(new_event(capacity, days_ahead), organizer.into(), "Org".into());
        event.registered = registered;
        event
    }

    fn assert_capacity_invariant(registry: &EventRegistry) {
        for e in registry.events() {
            assert!(e.registered >= 0 && e.registered <= e.capacity, "{:?}", e);
        }
    }

    #[test]
    fn create_event_assigns_actor_and_goes_first() {
        let mut registry = EventRegistry::new(actor("org1"));
        let first = registry.create_event(new_event(10, 5)).unwrap();
        let second = registry.create_event(new_event(20, 5)).unwrap();

        assert_eq!(registry.events()[0].id, second.id);
        assert_eq!(registry.events()[1].id, first.id);
        assert_eq!(first.registered, 0);
        assert_eq!(first.organizer_id, "org1");
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn create_event_rejects_zero_capacity() {
        let mut registry = EventRegistry::new(actor("org1"));
        let res = registry.create_event(new_event(0, 5));
        assert!(matches!(res, Err(AppError::Validation(_))));
        assert!(registry.events().is_empty());
    }

    #[test]
    fn full_event_cannot_be_registered() {
        let event = event_by("org1", 2, 2, 5);
        let id = event.id.clone();
        let mut registry = EventRegistry::with_state(actor("user1"), vec![event], Vec::new());

        assert!(!registry.can_register(registry.get_event(&id).unwrap()));
        let res = registry.register_for_event(&id);
        assert!(matches!(res, Err(AppError::Conflict(_))));
        assert_eq!(registry.get_event(&id).unwrap().registered, 2);
        assert!(!registry.is_registered(&id));
    }

    #[test]
    fn double_registration_is_rejected() {
        let event = event_by("org1", 10, 3, 5);
        let id = event.id.clone();
        let mut registry = EventRegistry::with_state(actor("user1"), vec![event], Vec::new());

        registry.register_for_event(&id).unwrap();
        let once = registry.clone();
        let res = registry.register_for_event(&id);

        assert!(matches!(res, Err(AppError::Conflict(_))));
        assert_eq!(registry.get_event(&id), once.get_event(&id));
        assert_eq!(registry.registered_event_ids(), once.registered_event_ids());
        assert_eq!(registry.get_event(&id).unwrap().registered, 4);
    }

    #[test]
    fn register_then_unregister_round_trips() {
        let event = event_by("org1", 10, 7, 5);
        let id = event.id.clone();
        let mut registry = EventRegistry::with_state(actor("user1"), vec![event], Vec::new());

        registry.register_for_event(&id).unwrap();
        assert!(registry.is_registered(&id));
        registry.unregister_from_event(&id).unwrap();

        assert!(!registry.is_registered(&id));
        assert_eq!(registry.get_event(&id).unwrap().registered, 7);
    }

    #[test]
    fn unregister_requires_registration_and_floors_at_zero() {
        let event = event_by("org1", 10, 0, 5);
        let id = event.id.clone();
        let mut registry = EventRegistry::with_state(actor("user1"), vec![event], vec![id.clone()]);

        assert!(matches!(
            EventRegistry::new(actor("user2")).unregister_from_event(&id),
            Err(AppError::Conflict(_))
        ));

        let updated = registry.unregister_from_event(&id).unwrap();
        assert_eq!(updated.registered, 0);
        assert_capacity_invariant(&registry);
    }

    #[test]
    fn can_register_follows_date_capacity_and_membership() {
        let now = Utc::now();
        let open = event_by("org1", 5, 1, 3);
        let past = event_by("org1", 5, 1, -3);
        let full = event_by("org1", 5, 5, 3);
        let joined = event_by("org1", 5, 1, 3);
        let joined_id = joined.id.clone();
        let registry = EventRegistry::with_state(
            actor("user1"),
            vec![open.clone(), past.clone(), full.clone(), joined.clone()],
            vec![joined_id],
        );

        assert!(registry.can_register_at(&open, now));
        assert!(!registry.can_register_at(&past, now));
        assert!(!registry.can_register_at(&full, now));
        assert!(!registry.can_register_at(&joined, now));

        let mut exactly_now = open.clone();
        exactly_now.date = now;
        assert!(!registry.can_register_at(&exactly_now, now));
    }

    #[test]
    fn organizer_passes_can_register_but_is_refused() {
        let event = event_by("org1", 5, 0, 3);
        let id = event.id.clone();
        let mut registry = EventRegistry::with_state(actor("org1"), vec![event], Vec::new());

        assert!(registry.can_register(registry.get_event(&id).unwrap()));
        assert!(matches!(registry.register_for_event(&id), Err(AppError::Conflict(_))));
        assert_eq!(
            registry.affordance(registry.get_event(&id).unwrap(), Utc::now()),
            RegistrationAffordance::Owner
        );
    }

    #[test]
    fn past_event_registration_is_a_conflict() {
        let event = event_by("org1", 5, 0, 3);
        let id = event.id.clone();
        let date = event.date;
        let mut registry = EventRegistry::with_state(actor("user1"), vec![event], Vec::new());

        let res = registry.register_for_event_at(&id, date + Duration::seconds(1));
        assert!(matches!(res, Err(AppError::Conflict(_))));
        assert_eq!(registry.get_event(&id).unwrap().registered, 0);
    }

    #[test]
    fn delete_event_drops_registration() {
        let event = event_by("org1", 5, 1, 3);
        let id = event.id.clone();
        let mut registry = EventRegistry::with_state(actor("org1"), vec![event], vec![id.clone()]);

        registry.delete_event(&id).unwrap();
        assert!(registry.get_event(&id).is_none());
        assert!(!registry.is_registered(&id));
        assert!(matches!(registry.delete_event(&id), Err(AppError::NotFound(_))));
    }

    #[test]
    fn non_owner_cannot_update_or_delete() {
        let event = event_by("org1", 5, 1, 3);
        let id = event.id.clone();
        let mut registry = EventRegistry::with_state(actor("user1"), vec![event.clone()], Vec::new());

        let res = registry.update_event(&id, EventPatch { title: Some("Hijacked".into()), ..Default::default() });
        assert!(matches!(res, Err(AppError::Forbidden(_))));
        assert_eq!(registry.get_event(&id), Some(&event));

        assert!(matches!(registry.delete_event(&id), Err(AppError::Forbidden(_))));
        assert!(matches!(
            registry.update_event("missing", EventPatch::default()),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn owner_update_merges_fields() {
        let event = event_by("org1", 5, 4, 3);
        let id = event.id.clone();
        let mut registry = EventRegistry::with_state(actor("org1"), vec![event], Vec::new());

        let updated = registry
            .update_event(&id, EventPatch { location: Some("Hall B".into()), capacity: Some(8), ..Default::default() })
            .unwrap();
        assert_eq!(updated.location, "Hall B");
        assert_eq!(updated.capacity, 8);
        assert_eq!(updated.title, "Tech Conference");

        let res = registry.update_event(&id, EventPatch { registered: Some(9), ..Default::default() });
        assert!(matches!(res, Err(AppError::Validation(_))));
        assert_eq!(registry.get_event(&id).unwrap().registered, 4);
    }

    #[test]
    fn affordance_priority() {
        let now = Utc::now();
        let registry_actor = actor("user1");
        let past_full = event_by("org1", 1, 1, -1);
        let full = event_by("org1", 1, 1, 1);
        let joined_full = event_by("org1", 1, 1, 1);
        let open = event_by("org1", 3, 1, 1);
        let registry = EventRegistry::with_state(
            registry_actor,
            vec![past_full.clone(), full.clone(), joined_full.clone(), open.clone()],
            vec![joined_full.id.clone()],
        );

        assert_eq!(registry.affordance(&past_full, now), RegistrationAffordance::Past);
        assert_eq!(registry.affordance(&full, now), RegistrationAffordance::Full);
        assert_eq!(registry.affordance(&joined_full, now), RegistrationAffordance::Registered);
        assert_eq!(registry.affordance(&open, now), RegistrationAffordance::Available);
    }

    #[test]
    fn capacity_invariant_holds_over_mixed_sequence() {
        let events: Vec<Event> = (0..4).map(|i| event_by("org1", 2, i % 3, 2)).collect();
        let ids: Vec<String> = events.iter().map(|e| e.id.clone()).collect();
        let mut registry = EventRegistry::with_state(actor("user1"), events, Vec::new());

        for round in 0..6 {
            for id in &ids {
                let _ = if round % 2 == 0 {
                    registry.register_for_event(id)
                } else {
                    registry.unregister_from_event(id)
                };
                assert_capacity_invariant(&registry);
            }
        }
    }

    #[test]
    fn apply_methods_clamp_and_keep_set_semantics() {
        let mut registry = EventRegistry::new(actor("user1"));
        let mut event = event_by("org1", 3, 9, 2);
        registry.insert_event(event.clone());
        assert_eq!(registry.get_event(&event.id).unwrap().registered, 3);

        event.registered = 2;
        registry.record_registration(event.clone());
        registry.record_registration(event.clone());
        assert_eq!(registry.registered_event_ids().len(), 1);
        assert_eq!(registry.events().len(), 1);

        event.registered = 1;
        registry.record_unregistration(event.clone());
        assert!(!registry.is_registered(&event.id));
        assert_eq!(registry.get_event(&event.id).unwrap().registered, 1);

        assert!(!registry.replace_event(event_by("org1", 3, 0, 2)));
        assert!(registry.remove_event(&event.id).is_some());
        assert!(registry.events().is_empty());
    }

    #[test]
    fn reset_drops_dangling_registrations() {
        let event = event_by("org1", 3, 1, 2);
        let registry = EventRegistry::with_state(actor("user1"), vec![event.clone()], vec![event.id.clone(), "gone".into()]);
        assert_eq!(registry.registered_event_ids().len(), 1);
        assert!(registry.is_registered(&event.id));
    }

    #[test]
    fn stats_cover_owned_and_registered_events() {
        let now = Utc::now();
        let mut free = event_by("org2", 10, 4, -2);
        free.price = 0.0;
        let paid = event_by("org2", 10, 6, 2);
        let mine_a = event_by("user1", 10, 3, 2);
        let mine_b = event_by("user1", 10, 4, -1);
        let registry = EventRegistry::with_state(
            actor("user1"),
            vec![free.clone(), paid.clone(), mine_a, mine_b],
            vec![free.id.clone(), paid.id.clone()],
        );

        let owned = registry.stats_for_organizer(now);
        assert_eq!(owned.total_events, 2);
        assert_eq!(owned.total_registrations, 7);
        assert_eq!(owned.average_registrations, 4);
        assert_eq!(owned.upcoming_events, 1);

        let joined = registry.registration_stats(now);
        assert_eq!(joined.upcoming, 1);
        assert_eq!(joined.past, 1);
        assert_eq!(joined.free_events, 1);
        assert!((joined.total_value - 99.0).abs() < f64::EPSILON);
        assert!((joined.average_price - 49.5).abs() < f64::EPSILON);

        assert_eq!(registry.upcoming_events(now).len(), 2);
        assert_eq!(registry.past_events(now).len(), 2);
    }

    #[test]
    fn browse_filters_and_sorts() {
        let mut rust = event_by("org1", 10, 0, 9);
        rust.title = "rust Meetup".into();
        rust.price = 15.0;
        let mut jazz = event_by("org1", 10, 0, 3);
        jazz.title = "Jazz Night".into();
        jazz.description = "Live music downtown".into();
        jazz.category = "Music".into();
        jazz.price = 40.0;
        let mut ai = event_by("org2", 10, 0, 5);
        ai.title = "AI Summit".into();
        ai.price = 0.0;
        let registry = EventRegistry::with_state(
            actor("user1"),
            vec![rust.clone(), jazz.clone(), ai.clone()],
            Vec::new(),
        );

        let ids = |events: Vec<&Event>| events.into_iter().map(|e| e.id.clone()).collect::<Vec<_>>();

        let by_date = registry.browse(&EventQuery::default());
        assert_eq!(ids(by_date), vec![jazz.id.clone(), ai.id.clone(), rust.id.clone()]);

        let by_title = registry.browse(&EventQuery { sort: EventSort::Title, ..Default::default() });
        assert_eq!(ids(by_title), vec![ai.id.clone(), jazz.id.clone(), rust.id.clone()]);

        let by_price = registry.browse(&EventQuery { sort: EventSort::Price, ..Default::default() });
        assert_eq!(ids(by_price), vec![ai.id.clone(), rust.id.clone(), jazz.id.clone()]);

        let music = registry.browse(&EventQuery { category: Some("Music".into()), ..Default::default() });
        assert_eq!(ids(music), vec![jazz.id.clone()]);

        let searched = registry.browse(&EventQuery { search: "DOWNTOWN".into(), ..Default::default() });
        assert_eq!(ids(searched), vec![jazz.id.clone()]);

        assert!(registry.browse(&EventQuery { search: "opera".into(), ..Default::default() }).is_empty());
        assert_eq!(registry.categories(), vec!["Technology".to_string(), "Music".to_string()]);
    }
}

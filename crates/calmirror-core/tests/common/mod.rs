//! Shared helpers for calmirror-core integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet};

use calmirror_core::{
    CalendarDirectory, CalendarError, CalendarService, Config, EventStatus, EventTime,
    MirroredEventDraft, SourceEvent,
};
use chrono::{DateTime, Utc};

pub const TARGET: &str = "mirror@group.calendar.google.com";

/// In-memory calendar service with failure injection.
#[derive(Default)]
pub struct FakeCalendar {
    calendars: Vec<(String, String)>,
    sources: RefCell<HashMap<String, Vec<SourceEvent>>>,
    target: RefCell<BTreeMap<String, MirroredEventDraft>>,
    next_id: Cell<u32>,
    fail_create: RefCell<HashSet<String>>,
    fail_update: RefCell<HashSet<String>>,
    fail_fetch: RefCell<HashSet<String>>,
    fail_delete: Cell<bool>,
    listing_error: RefCell<Option<(u16, String)>>,
    pub deletes: RefCell<Vec<String>>,
    pub updates: RefCell<Vec<String>>,
    pub windows: RefCell<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
}

impl FakeCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a calendar resolvable by display name.
    pub fn with_named_calendar(mut self, name: &str, id: &str) -> Self {
        self.calendars.push((name.to_string(), id.to_string()));
        self
    }

    pub fn set_events(&self, calendar_id: &str, events: Vec<SourceEvent>) {
        self.sources
            .borrow_mut()
            .insert(calendar_id.to_string(), events);
    }

    pub fn cancel(&self, calendar_id: &str, event_id: &str) {
        if let Some(events) = self.sources.borrow_mut().get_mut(calendar_id) {
            for ev in events.iter_mut().filter(|ev| ev.id == event_id) {
                ev.status = EventStatus::Cancelled;
            }
        }
    }

    pub fn remove(&self, calendar_id: &str, event_id: &str) {
        if let Some(events) = self.sources.borrow_mut().get_mut(calendar_id) {
            events.retain(|ev| ev.id != event_id);
        }
    }

    /// Fail creates whose draft summary equals `summary`.
    pub fn fail_create_for(&self, summary: &str) {
        self.fail_create.borrow_mut().insert(summary.to_string());
    }

    /// Fail updates of the given target event.
    pub fn fail_update_for(&self, target_event_id: &str) {
        self.fail_update.borrow_mut().insert(target_event_id.to_string());
    }

    pub fn fail_fetch_for(&self, calendar_id: &str) {
        self.fail_fetch.borrow_mut().insert(calendar_id.to_string());
    }

    pub fn clear_failures(&self) {
        self.fail_create.borrow_mut().clear();
        self.fail_update.borrow_mut().clear();
        self.fail_fetch.borrow_mut().clear();
        self.fail_delete.set(false);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_delete.set(fail);
    }

    pub fn reject_credentials(&self, reject: bool) {
        let error = reject.then(|| (401, "Invalid Credentials".to_string()));
        *self.listing_error.borrow_mut() = error;
    }

    /// Make calendar listing and event fetches fail with `status`.
    pub fn fail_listing(&self, status: u16, message: &str) {
        *self.listing_error.borrow_mut() = Some((status, message.to_string()));
    }

    fn listing_error(&self) -> Option<CalendarError> {
        self.listing_error
            .borrow()
            .as_ref()
            .map(|(status, message)| Self::http(*status, message))
    }

    pub fn target_event(&self, id: &str) -> Option<MirroredEventDraft> {
        self.target.borrow().get(id).cloned()
    }

    pub fn target_ids(&self) -> Vec<String> {
        self.target.borrow().keys().cloned().collect()
    }

    pub fn target_len(&self) -> usize {
        self.target.borrow().len()
    }

    pub fn target_summaries(&self) -> Vec<String> {
        self.target
            .borrow()
            .values()
            .map(|d| d.summary.clone())
            .collect()
    }

    fn http(status: u16, message: &str) -> CalendarError {
        CalendarError::Http {
            status,
            message: message.to_string(),
        }
    }
}

impl CalendarService for FakeCalendar {
    fn list_calendars(&self) -> Result<CalendarDirectory, CalendarError> {
        if let Some(e) = self.listing_error() {
            return Err(e);
        }
        Ok(self.calendars.iter().cloned().collect())
    }

    fn list_events(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<SourceEvent>, CalendarError> {
        if let Some(e) = self.listing_error() {
            return Err(e);
        }
        if self.fail_fetch.borrow().contains(calendar_id) {
            return Err(Self::http(503, "Backend Error"));
        }
        self.windows.borrow_mut().push((time_min, time_max));
        Ok(self
            .sources
            .borrow()
            .get(calendar_id)
            .cloned()
            .unwrap_or_default())
    }

    fn list_upcoming(
        &self,
        calendar_id: &str,
        from: DateTime<Utc>,
        max_results: usize,
    ) -> Result<Vec<SourceEvent>, CalendarError> {
        if self.fail_fetch.borrow().contains(calendar_id) {
            return Err(Self::http(404, "Not Found"));
        }
        Ok(self
            .sources
            .borrow()
            .get(calendar_id)
            .map(|events| {
                events
                    .iter()
                    .filter(|ev| ev.start.instant().map_or(true, |at| at >= from))
                    .take(max_results)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn create_event(
        &self,
        calendar_id: &str,
        draft: &MirroredEventDraft,
    ) -> Result<String, CalendarError> {
        assert_eq!(calendar_id, TARGET, "mirrors must only be written to the target");
        if self.fail_create.borrow().contains(&draft.summary) {
            return Err(Self::http(500, "Backend Error"));
        }
        let n = self.next_id.get() + 1;
        self.next_id.set(n);
        let id = format!("t{n}");
        self.target.borrow_mut().insert(id.clone(), draft.clone());
        Ok(id)
    }

    fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        draft: &MirroredEventDraft,
    ) -> Result<(), CalendarError> {
        assert_eq!(calendar_id, TARGET, "mirrors must only be written to the target");
        self.updates.borrow_mut().push(event_id.to_string());
        if self.fail_update.borrow().contains(event_id) {
            return Err(Self::http(503, "Service Unavailable"));
        }
        let mut target = self.target.borrow_mut();
        match target.get_mut(event_id) {
            Some(existing) => {
                *existing = draft.clone();
                Ok(())
            }
            None => Err(Self::http(404, "Not Found")),
        }
    }

    fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), CalendarError> {
        assert_eq!(calendar_id, TARGET, "mirrors must only be deleted from the target");
        self.deletes.borrow_mut().push(event_id.to_string());
        if self.fail_delete.get() {
            return Err(Self::http(500, "Backend Error"));
        }
        self.target.borrow_mut().remove(event_id);
        Ok(())
    }
}

pub fn at(rfc3339: &str) -> EventTime {
    EventTime::at(DateTime::parse_from_rfc3339(rfc3339).expect("valid timestamp"))
}

/// A confirmed timed event.
pub fn event(id: &str, summary: &str, start: &str, end: &str) -> SourceEvent {
    SourceEvent {
        id: id.to_string(),
        summary: Some(summary.to_string()),
        start: at(start),
        end: at(end),
        location: None,
        description: None,
        status: EventStatus::Confirmed,
    }
}

/// Config mirroring `sources` into [`TARGET`] with no throttle.
pub fn config(sources: &[&str]) -> Config {
    Config {
        source_calendars: sources.iter().map(|s| s.to_string()).collect(),
        target_calendar_id: TARGET.to_string(),
        throttle_ms: 0,
        ..Config::default()
    }
}

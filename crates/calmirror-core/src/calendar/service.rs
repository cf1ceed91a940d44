//! The calendar service seam.
//!
//! The reconciler only talks to a [`CalendarService`]; the Google client is
//! one implementation and tests supply an in-memory one.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::types::{MirroredEventDraft, SourceEvent};
use crate::error::{CalendarError, CoreError};

/// Calendars visible to the authenticated principal, keyed by lowercase name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalendarDirectory {
    by_name: BTreeMap<String, String>,
}

impl CalendarDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a calendar. Later entries with the same name win.
    pub fn insert(&mut self, name: &str, id: impl Into<String>) {
        self.by_name.insert(name.to_lowercase(), id.into());
    }

    /// Literal ids (anything containing `@`) pass through; names are
    /// matched case-insensitively.
    pub fn resolve(&self, identifier: &str) -> Result<String, CoreError> {
        if identifier.contains('@') {
            return Ok(identifier.to_string());
        }
        self.by_name
            .get(&identifier.to_lowercase())
            .cloned()
            .ok_or_else(|| CoreError::CalendarNotFound {
                identifier: identifier.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// `(lowercase name, id)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.by_name.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for CalendarDirectory {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut dir = Self::new();
        for (name, id) in iter {
            dir.insert(&name, id);
        }
        dir
    }
}

/// Blocking calendar operations used by the reconciler.
pub trait CalendarService {
    /// Every calendar visible to the principal, paginated to exhaustion.
    fn list_calendars(&self) -> Result<CalendarDirectory, CalendarError>;

    /// Single-instance-expanded events in `[time_min, time_max)`, ordered by
    /// start time, paginated to exhaustion.
    fn list_events(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<SourceEvent>, CalendarError>;

    /// At most `max_results` events starting from `from`.
    fn list_upcoming(
        &self,
        calendar_id: &str,
        from: DateTime<Utc>,
        max_results: usize,
    ) -> Result<Vec<SourceEvent>, CalendarError>;

    /// Create an event and return its id.
    fn create_event(
        &self,
        calendar_id: &str,
        draft: &MirroredEventDraft,
    ) -> Result<String, CalendarError>;

    fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        draft: &MirroredEventDraft,
    ) -> Result<(), CalendarError>;

    /// Delete an event. Implementations treat "already gone" as success.
    fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), CalendarError>;
}

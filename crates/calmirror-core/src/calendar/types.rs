//! Event types exchanged with the calendar service.
//!
//! Field names follow the Calendar v3 JSON representation so the same types
//! decode list responses and encode insert/update bodies.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Start or end of an event: a calendar date (all-day) or an instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<DateTime<FixedOffset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventTime {
    pub fn at(date_time: DateTime<FixedOffset>) -> Self {
        Self {
            date_time: Some(date_time),
            ..Self::default()
        }
    }

    pub fn all_day(date: NaiveDate) -> Self {
        Self {
            date: Some(date),
            ..Self::default()
        }
    }

    /// The instant this time denotes; all-day dates resolve to UTC midnight.
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        if let Some(dt) = self.date_time {
            return Some(dt.with_timezone(&Utc));
        }
        self.date
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }
}

/// Event status as reported by the source calendar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Confirmed,
    Tentative,
    Cancelled,
}

/// A concrete (single-instance) event fetched from a source calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceEvent {
    pub id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub start: EventTime,
    #[serde(default)]
    pub end: EventTime,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: EventStatus,
}

impl SourceEvent {
    pub fn is_cancelled(&self) -> bool {
        self.status == EventStatus::Cancelled
    }
}

/// Write payload for creating or updating a mirror on the target calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirroredEventDraft {
    pub summary: String,
    pub start: EventTime,
    pub end: EventTime,
    pub location: String,
    pub description: String,
}

/// Title used when a source event has no summary.
pub const DEFAULT_SUMMARY: &str = "Busy";

impl MirroredEventDraft {
    /// `"[<label>] <summary or Busy>"`, with times and text copied verbatim.
    pub fn from_source(label: &str, event: &SourceEvent) -> Self {
        let summary = event.summary.as_deref().unwrap_or(DEFAULT_SUMMARY);
        Self {
            summary: format!("[{label}] {summary}"),
            start: event.start.clone(),
            end: event.end.clone(),
            location: event.location.clone().unwrap_or_default(),
            description: event.description.clone().unwrap_or_default(),
        }
    }
}

//! Calendar service types, the service trait, and the Google implementation.

pub mod google;
pub mod service;
pub mod types;

pub use google::GoogleCalendarClient;
pub use service::{CalendarDirectory, CalendarService};
pub use types::{EventStatus, EventTime, MirroredEventDraft, SourceEvent};

//! # calmirror Core Library
//!
//! One-way mirroring of several source Google Calendars into a single
//! target calendar. Each run is a reconciliation cycle: fetch the sources
//! over a sliding window, create or update one mirror per live event, and
//! remove mirrors whose source event disappeared or was cancelled.
//!
//! ## Architecture
//!
//! - **Calendar**: the [`CalendarService`] seam and its Google Calendar v3
//!   implementation
//! - **Storage**: TOML configuration and the SQLite mapping store that
//!   correlates source events with their mirrors
//! - **Mirror**: the [`Reconciler`], the advisory cycle lock, and the
//!   source access check
//! - **Auth**: bearer tokens from the environment or the OS keyring
//!
//! ## Key Components
//!
//! - [`Reconciler`]: runs one reconciliation cycle
//! - [`MappingDb`]: durable source → target event table
//! - [`Config`]: run configuration, loaded once and passed in

pub mod auth;
pub mod calendar;
pub mod error;
pub mod logging;
pub mod mirror;
pub mod storage;

pub use calendar::{
    CalendarDirectory, CalendarService, EventStatus, EventTime, GoogleCalendarClient,
    MirroredEventDraft, SourceEvent,
};
pub use error::{CalendarError, ConfigError, CoreError, DatabaseError, OAuthError, Result};
pub use mirror::{verify_access, AccessReport, CycleLock, CycleReport, Reconciler};
pub use storage::{Config, MappingDb, MappingStore, MirrorRecord, SourceSpec};

//! Calendar mirroring: the reconciler, its run lock, and the access check.

pub mod lock;
pub mod reconciler;
pub mod verify;

pub use lock::{CycleGuard, CycleLock};
pub use reconciler::{CycleReport, EventFailure, Reconciler, ResolvedSource, SourceReport};
pub use verify::{verify_access, AccessOutcome, AccessReport};

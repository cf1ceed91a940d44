//! Log lines emitted while sweeping stale mirrors.

mod common;

use std::io;
use std::sync::{Arc, Mutex};

use calmirror_core::{MappingDb, MappingStore, MirrorRecord, Reconciler};
use chrono::{TimeZone, Utc};
use common::{config, FakeCalendar};

/// Shared in-memory sink for a scoped fmt subscriber.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn with_captured_logs(f: impl FnOnce()) -> String {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    let bytes = buffer.0.lock().unwrap().clone();
    String::from_utf8(bytes).unwrap()
}

fn stale_store() -> MappingDb {
    let store = MappingDb::open_memory().unwrap();
    store
        .upsert(&MirrorRecord::new("old@example.org", "gone", "t-old"))
        .unwrap();
    store
}

#[test]
fn failed_stale_delete_is_not_logged_as_removed() {
    let cal = FakeCalendar::new();
    cal.fail_deletes(true);
    let store = stale_store();
    let cfg = config(&["staff@example.org"]);
    let now = Utc.with_ymd_and_hms(2025, 1, 8, 12, 0, 0).unwrap();

    let logs = with_captured_logs(|| {
        Reconciler::new(&cal, &store, &cfg)
            .reconcile_cycle_at(now)
            .unwrap();
    });

    assert!(store.all().unwrap().is_empty());
    assert!(logs.contains("ignoring failed delete of stale mirror"), "{logs}");
    assert!(!logs.contains("removed deleted source event"), "{logs}");
}

#[test]
fn successful_stale_delete_is_logged() {
    let cal = FakeCalendar::new();
    let store = stale_store();
    let cfg = config(&["staff@example.org"]);
    let now = Utc.with_ymd_and_hms(2025, 1, 8, 12, 0, 0).unwrap();

    let logs = with_captured_logs(|| {
        Reconciler::new(&cal, &store, &cfg)
            .reconcile_cycle_at(now)
            .unwrap();
    });

    assert!(logs.contains("removed deleted source event"), "{logs}");
    assert!(!logs.contains("ignoring failed delete"), "{logs}");
}

//! Metrics collection for EventBatcher

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::table::WriteOutcome;

/// Snapshot of the counters kept by the Engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Messages that reached the ingress handler
    pub messages_ingested: u64,

    /// Writes that replaced an existing entry
    pub entries_overwritten: u64,

    /// Control messages dropped because an earlier one was still pending
    pub control_suppressed: u64,

    /// Messages that arrived after the table was closed
    pub rejected_after_close: u64,

    /// Emission periods that produced a non-empty batch
    pub batches_emitted: u64,

    /// Emission periods with nothing to emit
    pub empty_periods: u64,

    /// Total records delivered across all batches
    pub events_emitted: u64,

    /// Size of the most recent non-empty batch
    pub last_batch_size: u64,

    /// Largest batch seen so far
    pub max_batch_size: u64,

    /// Entries dropped when the Engine stopped
    pub events_discarded: u64,

    /// Seconds since the collector was created
    pub uptime_seconds: u64,
}

/// Lock-free counters shared by the ingress and emitter tasks
pub struct MetricsCollector {
    messages_ingested: AtomicU64,
    entries_overwritten: AtomicU64,
    control_suppressed: AtomicU64,
    rejected_after_close: AtomicU64,

    batches_emitted: AtomicU64,
    empty_periods: AtomicU64,
    events_emitted: AtomicU64,
    last_batch_size: AtomicU64,
    max_batch_size: AtomicU64,

    events_discarded: AtomicU64,

    start_time: Instant,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            messages_ingested: AtomicU64::new(0),
            entries_overwritten: AtomicU64::new(0),
            control_suppressed: AtomicU64::new(0),
            rejected_after_close: AtomicU64::new(0),
            batches_emitted: AtomicU64::new(0),
            empty_periods: AtomicU64::new(0),
            events_emitted: AtomicU64::new(0),
            last_batch_size: AtomicU64::new(0),
            max_batch_size: AtomicU64::new(0),
            events_discarded: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record one ingress write and what it did to the table
    pub fn record_write(&self, outcome: WriteOutcome) {
        self.messages_ingested.fetch_add(1, Ordering::Relaxed);
        match outcome {
            WriteOutcome::Inserted => {}
            WriteOutcome::Overwritten => {
                self.entries_overwritten.fetch_add(1, Ordering::Relaxed);
            }
            WriteOutcome::Suppressed => {
                self.control_suppressed.fetch_add(1, Ordering::Relaxed);
            }
            WriteOutcome::Closed => {
                self.rejected_after_close.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Record one emission period
    pub fn record_batch(&self, size: usize) {
        let size = size as u64;
        if size == 0 {
            self.empty_periods.fetch_add(1, Ordering::Relaxed);
            return;
        }

        self.batches_emitted.fetch_add(1, Ordering::Relaxed);
        self.events_emitted.fetch_add(size, Ordering::Relaxed);
        self.last_batch_size.store(size, Ordering::Relaxed);
        self.max_batch_size.fetch_max(size, Ordering::Relaxed);
    }

    pub fn record_discarded(&self, count: usize) {
        self.events_discarded.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Get current metrics
    pub fn get_stats(&self) -> EngineStats {
        EngineStats {
            messages_ingested: self.messages_ingested.load(Ordering::Relaxed),
            entries_overwritten: self.entries_overwritten.load(Ordering::Relaxed),
            control_suppressed: self.control_suppressed.load(Ordering::Relaxed),
            rejected_after_close: self.rejected_after_close.load(Ordering::Relaxed),
            batches_emitted: self.batches_emitted.load(Ordering::Relaxed),
            empty_periods: self.empty_periods.load(Ordering::Relaxed),
            events_emitted: self.events_emitted.load(Ordering::Relaxed),
            last_batch_size: self.last_batch_size.load(Ordering::Relaxed),
            max_batch_size: self.max_batch_size.load(Ordering::Relaxed),
            events_discarded: self.events_discarded.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Reset all counters
    pub fn reset(&self) {
        self.messages_ingested.store(0, Ordering::Relaxed);
        self.entries_overwritten.store(0, Ordering::Relaxed);
        self.control_suppressed.store(0, Ordering::Relaxed);
        self.rejected_after_close.store(0, Ordering::Relaxed);
        self.batches_emitted.store(0, Ordering::Relaxed);
        self.empty_periods.store(0, Ordering::Relaxed);
        self.events_emitted.store(0, Ordering::Relaxed);
        self.last_batch_size.store(0, Ordering::Relaxed);
        self.max_batch_size.store(0, Ordering::Relaxed);
        self.events_discarded.store(0, Ordering::Relaxed);
    }
}

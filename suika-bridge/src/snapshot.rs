//! Single-writer / multi-reader snapshot exchange.
//!
//! The ingestion task owns the only [`SnapshotWriter`]. It mutates a private
//! working copy of [`BridgeState`] and then swaps a fresh immutable
//! `Arc<BridgeState>` into the shared slot. Readers clone that `Arc` and never
//! see a half-applied update; the lock is held only for the pointer swap or
//! clone.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use suika_common::{Counters, SensorCategory, SensorSnapshot};

use crate::parser::ParseError;

/// Everything the serving side may observe.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BridgeState {
    /// Latest per-category values.
    pub snapshot: SensorSnapshot,
    /// Ingestion counters.
    pub counters: Counters,
    /// At least one frame was accepted since start or the last reset.
    pub has_valid_data: bool,
    /// Most recent rejection reason.
    pub last_error: Option<String>,
    /// Text of the last frame handed to the parser.
    pub last_raw: String,
    /// Uptime tick of the last frame admitted by the rate limiter.
    pub last_read_ms: u64,
}

impl BridgeState {
    /// Record a frame admitted by the rate limiter, before parsing.
    pub fn record_read(&mut self, raw: &str, now_ms: u64) {
        self.counters.frames_seen += 1;
        self.last_read_ms = now_ms;
        self.last_raw.clear();
        self.last_raw.push_str(raw);
    }

    /// Record a frame discarded by the rate limiter.
    pub fn record_drop(&mut self) {
        self.counters.frames_dropped += 1;
    }

    /// Apply the classified values of one frame.
    ///
    /// Present categories overwrite, absent ones keep their previous value.
    /// An empty map is a frame-level failure and leaves the values untouched.
    pub fn publish(
        &mut self,
        values: &BTreeMap<SensorCategory, f64>,
        now_ms: u64,
    ) -> Result<(), ParseError> {
        if values.is_empty() {
            let err = ParseError::NoClassifiable;
            self.reject(&err);
            return Err(err);
        }

        for (&category, &value) in values {
            self.snapshot.set(category, value);
        }
        self.snapshot.last_update_ms = now_ms;
        self.counters.frames_accepted += 1;
        self.has_valid_data = true;
        Ok(())
    }

    /// Record a rejected frame.
    pub fn reject(&mut self, err: &ParseError) {
        self.counters.frames_rejected += 1;
        self.last_error = Some(err.to_string());
    }

    /// Return to the initial state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

type Slot = Arc<RwLock<Arc<BridgeState>>>;

/// Create a connected writer/reader pair.
pub fn exchange() -> (SnapshotWriter, SnapshotReader) {
    let slot: Slot = Arc::new(RwLock::new(Arc::new(BridgeState::default())));
    (
        SnapshotWriter {
            slot: slot.clone(),
            working: BridgeState::default(),
        },
        SnapshotReader { slot },
    )
}

/// The only handle that can change published state. Not `Clone`.
#[derive(Debug)]
pub struct SnapshotWriter {
    slot: Slot,
    working: BridgeState,
}

impl SnapshotWriter {
    /// Apply `f` to the working copy and publish the result as one transition.
    pub fn update<T>(&mut self, f: impl FnOnce(&mut BridgeState) -> T) -> T {
        let result = f(&mut self.working);
        let published = Arc::new(self.working.clone());
        *self.slot.write() = published;
        result
    }

    /// The writer's working copy. Every [`update`](Self::update) publishes
    /// it, so readers see the same state.
    pub fn current(&self) -> &BridgeState {
        &self.working
    }
}

/// Read-only handle to the published state.
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    slot: Slot,
}

impl SnapshotReader {
    /// Get the current published state.
    pub fn load(&self) -> Arc<BridgeState> {
        self.slot.read().clone()
    }
}

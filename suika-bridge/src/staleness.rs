//! Freshness check for the published snapshot.

use suika_common::SensorSnapshot;

/// True once `timeout_ms` or more has passed since the snapshot's last update.
///
/// A clock reading earlier than the update tick counts as zero elapsed time.
pub fn is_stale(snapshot: &SensorSnapshot, now_ms: u64, timeout_ms: u64) -> bool {
    now_ms.saturating_sub(snapshot.last_update_ms) >= timeout_ms
}

//! Sequence guard for the order book stream
//!
//! Deltas carry the sequence number they extend (`prevSeqNum`). A delta is
//! only applied when that number equals the last accepted sequence; any
//! mismatch is a gap, and the only recovery is a full resubscribe followed
//! by a fresh snapshot. Local repair of the missing range is never tried.
//!
//! ```text
//! UNSYNCED ──snapshot──▶ SYNCED ──delta(prev == last)──▶ SYNCED
//!    ▲                     │
//!    │                delta(prev != last)
//!    │                     ▼
//!    └───resubscribe─── GAP_PENDING
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Synchronisation state of the order book stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncState {
    /// Waiting for a snapshot; deltas are ignored.
    #[default]
    Unsynced,
    /// Snapshot installed; deltas are checked for continuity.
    Synced,
    /// A gap was found and a resubscribe is being issued.
    GapPending,
}

/// A detected discontinuity in the delta stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("sequence gap: expected prevSeqNum {expected}, got {received_prev:?} (seqNum {received_seq})")]
pub struct SequenceGap {
    /// Last accepted sequence number.
    pub expected: u64,
    /// The delta's `prevSeqNum`, if it carried one.
    pub received_prev: Option<u64>,
    /// The delta's own `seqNum`.
    pub received_seq: u64,
}

/// Decision for one incoming delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaVerdict {
    /// Continuous: apply it. The guard has already advanced.
    Accept,
    /// No snapshot yet (or resync in progress): drop it.
    Unsynced,
    /// Discontinuous: do not apply, resubscribe.
    Gap(SequenceGap),
}

/// Tracks the last accepted sequence number and the sync state.
#[derive(Debug, Default)]
pub struct SequenceGuard {
    state: SyncState,
    /// Set by a snapshot, advanced by accepted deltas, never rolled back.
    last_accepted: Option<u64>,
}

impl SequenceGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn last_accepted(&self) -> Option<u64> {
        self.last_accepted
    }

    /// A snapshot establishes ground truth unconditionally.
    pub fn on_snapshot(&mut self, seq_num: u64) {
        if let Some(previous) = self.last_accepted {
            debug!(previous, sequence = seq_num, "Snapshot replaces sequence state");
        }
        self.last_accepted = Some(seq_num);
        self.state = SyncState::Synced;
        info!(sequence = seq_num, "Order book synced from snapshot");
    }

    /// Check a delta's continuity. On acceptance the guard advances to
    /// `seq_num`; on a gap it moves to [`SyncState::GapPending`].
    pub fn on_delta(&mut self, prev_seq_num: Option<u64>, seq_num: u64) -> DeltaVerdict {
        let last = match (self.state, self.last_accepted) {
            (SyncState::Synced, Some(last)) => last,
            _ => {
                debug!(
                    state = ?self.state,
                    sequence = seq_num,
                    "Ignoring delta while unsynced"
                );
                return DeltaVerdict::Unsynced;
            }
        };

        if prev_seq_num == Some(last) {
            self.last_accepted = Some(seq_num);
            return DeltaVerdict::Accept;
        }

        let gap = SequenceGap {
            expected: last,
            received_prev: prev_seq_num,
            received_seq: seq_num,
        };
        warn!(
            expected = last,
            received_prev = ?prev_seq_num,
            received_seq = seq_num,
            "Sequence gap detected, resubscribing"
        );
        self.state = SyncState::GapPending;
        DeltaVerdict::Gap(gap)
    }

    /// The resubscribe has been issued; wait for a fresh snapshot.
    pub fn resync_requested(&mut self) {
        self.state = SyncState::Unsynced;
    }
}

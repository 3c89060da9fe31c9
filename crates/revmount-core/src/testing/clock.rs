//! A revision clock that never sleeps.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;

use crate::clock::RevisionClock;

/// Records boundary waits and returns immediately.
///
/// Archives produced by [`SnapshotArchiver`](super::SnapshotArchiver) are
/// sequence-numbered, so simulated runs do not need real spacing.
#[derive(Debug, Default)]
pub struct ManualClock {
    waits: AtomicUsize,
    previous: Mutex<Vec<SystemTime>>,
}

impl ManualClock {
    /// Number of times [`RevisionClock::await_boundary`] was called.
    pub fn waits(&self) -> usize {
        self.waits.load(Ordering::SeqCst)
    }

    /// The `previous` timestamps passed to each wait, in call order.
    pub fn observed(&self) -> Vec<SystemTime> {
        self.previous
            .lock()
            .map(|previous| previous.clone())
            .unwrap_or_default()
    }
}

impl RevisionClock for ManualClock {
    fn await_boundary(&self, previous: SystemTime) {
        self.waits.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut observed) = self.previous.lock() {
            observed.push(previous);
        }
    }
}

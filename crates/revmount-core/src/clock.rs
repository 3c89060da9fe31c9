//! Revision boundaries.
//!
//! The backup driver stamps each increment with a timestamp of limited
//! resolution (one second for rdiff-backup). Two snapshots taken within the
//! same tick collide, so the builder has to wait for the next tick before
//! taking another one.

use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// rdiff-backup increment timestamps have one-second resolution.
pub const DEFAULT_REVISION_RESOLUTION: Duration = Duration::from_secs(1);

/// Waits until a new snapshot gets a distinguishable revision identifier.
pub trait RevisionClock: Send + Sync {
    /// Blocks until a snapshot started now cannot share an identifier with
    /// one that completed at `previous`.
    fn await_boundary(&self, previous: SystemTime);
}

/// Real-time clock aligned to the driver's timestamp resolution.
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    resolution: Duration,
}

impl WallClock {
    /// Creates a clock with the given tick length.
    pub fn new(resolution: Duration) -> Self {
        Self { resolution }
    }

    /// First tick boundary strictly after `previous`.
    pub fn next_boundary(&self, previous: SystemTime) -> SystemTime {
        let tick = self.resolution.as_nanos();
        if tick == 0 {
            return previous;
        }
        let since_epoch = previous
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let boundary = (since_epoch / tick + 1) * tick;
        let secs = u64::try_from(boundary / 1_000_000_000).unwrap_or(u64::MAX);
        // Remainder of a division by 1e9 always fits.
        #[allow(clippy::cast_possible_truncation)]
        let nanos = (boundary % 1_000_000_000) as u32;
        UNIX_EPOCH + Duration::new(secs, nanos)
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new(DEFAULT_REVISION_RESOLUTION)
    }
}

impl RevisionClock for WallClock {
    fn await_boundary(&self, previous: SystemTime) {
        let boundary = self.next_boundary(previous);
        // sleep() may return early; re-check against the clock.
        while let Ok(remaining) = boundary.duration_since(SystemTime::now()) {
            if remaining.is_zero() {
                break;
            }
            tracing::trace!(?remaining, "waiting for revision boundary");
            thread::sleep(remaining);
        }
    }
}

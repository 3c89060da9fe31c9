//! Test doubles for running the harness without external tools.
//!
//! - [`SnapshotArchiver`] stands in for the backup program
//! - [`SnapshotMount`] stands in for the mount executable, with optional
//!   [`Defect`] injection
//! - [`ManualClock`] skips revision spacing
//!
//! # Usage
//!
//! ```
//! use revmount_core::testing::{assert_verification_failure, Defect, ManualClock, SnapshotArchiver, SnapshotMount};
//! use revmount_core::{catalog, HarnessConfig, Harness, MountMode, TestCase};
//!
//! let harness = Harness::new(
//!     HarnessConfig::default(),
//!     Box::new(SnapshotArchiver),
//!     Box::new(SnapshotMount::with_defect(Defect::StaleContent)),
//!     Box::new(ManualClock::default()),
//! );
//! let case = TestCase::new("flat_single_file", catalog::flat_single_file(), MountMode::Full);
//! assert_verification_failure(harness.run(&case), &case.name);
//! ```

pub mod assertions;
pub mod clock;
pub mod snapshot;

pub use assertions::{assert_verification_failure, assert_verified};
pub use clock::ManualClock;
pub use snapshot::{Defect, SnapshotArchiver, SnapshotMount};

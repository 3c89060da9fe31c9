//! The standard fixture catalog against the real backup and mount programs.
//!
//! Needs the backup program on `PATH`, the mount executable at the
//! configured location and a working FUSE setup. Tool locations come from
//! the usual config file and `REVMOUNT_*` overrides.
//!
//! Run: `cargo nextest run -p revmount-core --features mount-tests mounted_suite`

#![cfg(all(unix, feature = "mount-tests"))]

use revmount_core::{catalog, Harness, HarnessConfig};

fn mounted_harness() -> Harness {
    let config = HarnessConfig::load(None).unwrap_or_else(|e| panic!("invalid harness config: {e}"));
    Harness::from_config(config).unwrap_or_else(|e| panic!("cannot wire harness: {e}"))
}

revmount_core::revision_suite! {
    harness = mounted_harness();
    flat_single_file => catalog::flat_single_file(),
    flat_two_files => catalog::flat_two_files(),
    flat_adding_files => catalog::flat_adding_files(),
    flat_removing_files => catalog::flat_removing_files(),
    nested_single_file => catalog::nested_single_file(),
    nested_two_files => catalog::nested_two_files(),
    nested_adding_files => catalog::nested_adding_files(),
    nested_removing_files => catalog::nested_removing_files(),
    multiple_repo_single_file => catalog::multiple_repo_single_file(),
    future_files_flat => catalog::future_files_flat(),
    future_files_nested => catalog::future_files_nested(),
    large_single => catalog::large_single(),
    large_multi => catalog::large_multi(),
}

//! Exit codes for the CLI.
//!
//! These follow common Unix conventions and provide meaningful
//! status information for scripting and automation.

/// Successful execution
pub const SUCCESS: u8 = 0;

/// General/unspecified error
pub const GENERAL_ERROR: u8 = 1;

/// Command-line usage error (bad arguments, unreadable fixture file)
pub const USAGE_ERROR: u8 = 2;

/// At least one case ran and its mounted view did not match the fixture
pub const VERIFICATION_FAILED: u8 = 3;

/// The backup program, mount executable or unmount utility failed
pub const TOOL_FAILED: u8 = 4;

/// Configuration file or environment overrides are invalid
pub const CONFIG_INVALID: u8 = 5;

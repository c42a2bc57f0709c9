//! Squawk Common Library
//!
//! Shared protocol types and wire helpers for the Squawk push-to-talk client.

pub mod io;
pub mod protocol;
pub mod validators;

/// Version information for the Squawk protocol
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Default port for Squawk connections
pub const DEFAULT_PORT: u16 = 7600;

/// Default port as a string for display and address parsing.
///
/// This is the string representation of [`DEFAULT_PORT`], provided as a constant
/// because Rust doesn't support const string formatting.
pub const DEFAULT_PORT_STR: &str = "7600";

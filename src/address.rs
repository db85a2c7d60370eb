//! `debug-pipe` address formatting and parsing.
//!
//! Addresses use a single key-value scheme:
//!
//! ```text
//! debug-pipe:name=<endpoint-name>
//! ```
//!
//! The name is opaque to this crate — it is only required to be unique
//! within one registry. No escaping rules are defined.

use crate::error::{PipeError, Result};

/// Prefix shared by every debug-pipe address.
pub const ADDRESS_PREFIX: &str = "debug-pipe:name=";

/// Format the address for a listener name.
pub fn format_address(name: &str) -> String {
    format!("{ADDRESS_PREFIX}{name}")
}

/// Extract the listener name from a debug-pipe address.
///
/// Returns [`PipeError::BadAddress`] if the scheme prefix is missing or
/// the name is empty.
pub fn parse_address(address: &str) -> Result<&str> {
    match address.strip_prefix(ADDRESS_PREFIX) {
        Some(name) if !name.is_empty() => Ok(name),
        _ => Err(PipeError::BadAddress(address.to_string())),
    }
}

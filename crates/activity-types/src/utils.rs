//! Formatting helpers for log output.

/// Shortens an identifier to its first 10 characters for display.
///
/// Long enough to keep the `0x` prefix plus four bytes of a hash.
pub fn truncate_id(id: &str) -> String {
	if id.len() <= 10 {
		id.to_string()
	} else {
		format!("{}..", &id[..10])
	}
}

/// Adds a `0x` prefix to a hex string unless one is already present.
pub fn with_0x_prefix(hex_str: &str) -> String {
	if hex_str.to_lowercase().starts_with("0x") {
		hex_str.to_string()
	} else {
		format!("0x{}", hex_str)
	}
}

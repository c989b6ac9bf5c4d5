//! Common types for the activity bot.
//!
//! Shared by every crate of the workspace: transaction requests and receipts
//! exchanged with the delivery layer, the redacted secret wrapper used for
//! account keys, and small formatting helpers for log output.

/// Transaction request, hash and receipt types.
pub mod delivery;
/// Redacted wrapper for key material loaded from configuration.
pub mod secret_string;
/// Formatting helpers for hashes and addresses in logs.
pub mod utils;

pub use alloy_primitives::{Address, Bytes, U256};
pub use delivery::*;
pub use secret_string::SecretString;
pub use utils::{truncate_id, with_0x_prefix};

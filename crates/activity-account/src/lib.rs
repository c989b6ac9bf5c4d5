//! Account management for the activity bot.
//!
//! Exposes the address the bot acts as and hands the signing key to the
//! delivery layer, which installs it as the provider wallet. Key storage and
//! export live outside this crate.

use activity_types::{Address, SecretString};
use async_trait::async_trait;
use thiserror::Error;

pub mod implementations {
	pub mod local;
}

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AccountError {
	/// Error that occurs when a cryptographic key is invalid or malformed.
	#[error("Invalid key: {0}")]
	InvalidKey(String),
	/// Error that occurs when interacting with the account implementation.
	#[error("Implementation error: {0}")]
	Implementation(String),
}

/// Interface every account implementation provides.
#[async_trait]
pub trait AccountInterface: Send + Sync {
	/// Returns the address transactions are sent from.
	async fn address(&self) -> Result<Address, AccountError>;

	/// Returns the private key, 0x-prefixed, for the delivery wallet.
	fn get_private_key(&self) -> SecretString;
}

/// Thin service wrapper over the configured account implementation.
pub struct AccountService {
	implementation: Box<dyn AccountInterface>,
}

impl AccountService {
	pub fn new(implementation: Box<dyn AccountInterface>) -> Self {
		Self { implementation }
	}

	pub async fn get_address(&self) -> Result<Address, AccountError> {
		self.implementation.address().await
	}

	pub fn get_private_key(&self) -> SecretString {
		self.implementation.get_private_key()
	}
}

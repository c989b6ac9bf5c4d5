//! Account backed by a private key held in memory.

use crate::{AccountError, AccountInterface};
use activity_config::AccountConfig;
use activity_types::{with_0x_prefix, Address, SecretString};
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;

/// Account derived from a hex encoded secp256k1 private key.
pub struct LocalAccount {
	signer: PrivateKeySigner,
	private_key: SecretString,
}

impl LocalAccount {
	/// Parses `private_key` (with or without `0x`) into a signer.
	pub fn new(private_key: &SecretString) -> Result<Self, AccountError> {
		let signer: PrivateKeySigner = private_key.with_exposed(|key| {
			key.parse()
				.map_err(|_| AccountError::InvalidKey("Invalid private key format".to_string()))
		})?;
		let private_key = private_key.with_exposed(|key| SecretString::new(with_0x_prefix(key)));

		Ok(Self {
			signer,
			private_key,
		})
	}
}

#[async_trait]
impl AccountInterface for LocalAccount {
	async fn address(&self) -> Result<Address, AccountError> {
		Ok(self.signer.address())
	}

	fn get_private_key(&self) -> SecretString {
		self.private_key.clone()
	}
}

/// Creates the account from the `[account]` section.
pub fn create_account(config: &AccountConfig) -> Result<Box<dyn AccountInterface>, AccountError> {
	Ok(Box::new(LocalAccount::new(&config.private_key)?))
}

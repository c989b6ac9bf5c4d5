//! Transaction types exchanged between activities and the delivery layer.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hash identifying a broadcast transaction.
///
/// Used as the key under which confirmation waits are registered, so two
/// waits for the same hash always land in the same bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionHash(pub B256);

impl TransactionHash {
	/// Returns the hash as a 0x-prefixed hex string.
	pub fn to_hex(&self) -> String {
		format!("0x{}", hex::encode(self.0))
	}
}

impl fmt::Display for TransactionHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.to_hex())
	}
}

impl From<B256> for TransactionHash {
	fn from(hash: B256) -> Self {
		Self(hash)
	}
}

/// Outcome of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
	/// The hash of the transaction.
	pub hash: TransactionHash,
	/// The block number where the transaction was included.
	pub block_number: u64,
	/// Whether the transaction executed successfully.
	pub success: bool,
}

/// Transaction to be signed and broadcast by the delivery layer.
///
/// Fields left as `None` are filled by the provider (nonce, fees, gas) at
/// submission time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
	/// Recipient or contract address.
	pub to: Option<Address>,
	/// Call data.
	pub data: Bytes,
	/// Native value attached to the transaction, in wei.
	pub value: U256,
	/// Explicit gas limit.
	pub gas_limit: Option<u64>,
	/// Explicit nonce.
	pub nonce: Option<u64>,
	/// EIP-1559 fee cap, in wei.
	pub max_fee_per_gas: Option<u128>,
	/// EIP-1559 priority fee, in wei.
	pub max_priority_fee_per_gas: Option<u128>,
}

impl Transaction {
	/// Creates a call to `to` carrying `data` and no native value.
	pub fn call(to: Address, data: impl Into<Bytes>) -> Self {
		Self {
			to: Some(to),
			data: data.into(),
			..Default::default()
		}
	}

	/// Sets the native value attached to the transaction.
	pub fn with_value(mut self, value: U256) -> Self {
		self.value = value;
		self
	}

	/// Sets an explicit gas limit.
	pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
		self.gas_limit = Some(gas_limit);
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_hash_display_is_prefixed_hex() {
		let hash = TransactionHash(B256::repeat_byte(0xab));
		let shown = hash.to_string();
		assert!(shown.starts_with("0xabab"));
		assert_eq!(shown.len(), 66);
	}

	#[test]
	fn test_call_builder() {
		let to = Address::repeat_byte(0x11);
		let tx = Transaction::call(to, vec![1u8, 2, 3])
			.with_value(U256::from(7))
			.with_gas_limit(21_000);

		assert_eq!(tx.to, Some(to));
		assert_eq!(tx.data.as_ref(), &[1, 2, 3]);
		assert_eq!(tx.value, U256::from(7));
		assert_eq!(tx.gas_limit, Some(21_000));
		assert!(tx.nonce.is_none());
	}
}

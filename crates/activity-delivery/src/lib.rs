//! Chain access for the activity bot.
//!
//! Defines the capability set the rest of the bot consumes: balance, nonce
//! and fee queries, receipt lookup, block height and header subscription,
//! read-only contract calls and transaction submission. Every operation is a
//! potentially failing remote call returning [`DeliveryError`] on transport
//! failure.

use activity_types::{Address, Bytes, Transaction, TransactionHash, TransactionReceipt, U256};
use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

pub mod erc20;

pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
}

/// Stream of block heights pushed by a header subscription.
///
/// The stream ending means the subscription is gone.
pub type BlockStream = BoxStream<'static, u64>;

/// Errors that can occur during chain access.
#[derive(Debug, Error)]
pub enum DeliveryError {
	/// Error that occurs during network communication.
	#[error("Network error: {0}")]
	Network(String),
	/// Error that occurs when a header subscription cannot be established.
	#[error("Subscription error: {0}")]
	Subscription(String),
	/// Error that occurs when a response cannot be decoded.
	#[error("Invalid response: {0}")]
	InvalidResponse(String),
}

/// Chain RPC capability used by the waiter and the activities.
#[async_trait]
pub trait DeliveryInterface: Send + Sync {
	/// Signs and broadcasts a transaction, returning its hash.
	async fn submit(&self, tx: Transaction) -> Result<TransactionHash, DeliveryError>;

	/// Executes a read-only call and returns the raw return data.
	async fn call(&self, tx: &Transaction) -> Result<Bytes, DeliveryError>;

	/// Returns the receipt of a mined transaction, or `None` if not mined yet.
	async fn get_receipt(
		&self,
		hash: &TransactionHash,
	) -> Result<Option<TransactionReceipt>, DeliveryError>;

	/// Returns the latest block number.
	async fn get_block_number(&self) -> Result<u64, DeliveryError>;

	/// Subscribes to new block headers.
	async fn subscribe_blocks(&self) -> Result<BlockStream, DeliveryError>;

	/// Returns the native balance for `None`, or the ERC-20 balance of `token`.
	async fn get_balance(
		&self,
		address: Address,
		token: Option<Address>,
	) -> Result<U256, DeliveryError>;

	/// Returns how much of `token` `spender` may move on behalf of `owner`.
	async fn get_allowance(
		&self,
		owner: Address,
		spender: Address,
		token: Address,
	) -> Result<U256, DeliveryError>;

	/// Returns the next nonce for `address`, counting pending transactions.
	async fn get_nonce(&self, address: Address) -> Result<u64, DeliveryError>;

	/// Returns the suggested fee cap in wei.
	async fn get_gas_price(&self) -> Result<u128, DeliveryError>;

	/// Returns the suggested priority fee in wei.
	async fn get_max_priority_fee(&self) -> Result<u128, DeliveryError>;
}

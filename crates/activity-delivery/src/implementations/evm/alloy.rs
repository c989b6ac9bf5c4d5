//! Alloy-backed chain access.
//!
//! One provider per bot process. The provider carries the account key as its
//! wallet plus the recommended fillers, so transactions submitted without a
//! nonce, gas limit or fees are completed before signing.

use crate::erc20::IERC20;
use crate::{BlockStream, DeliveryError, DeliveryInterface};
use activity_types::{
	truncate_id, Address, Bytes, SecretString, Transaction, TransactionHash, TransactionReceipt,
	U256,
};
use alloy_network::EthereumWallet;
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::SolCall;
use alloy_transport::BoxTransport;
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;

/// Alloy-based EVM chain access.
pub struct AlloyDelivery {
	provider: Arc<dyn Provider<BoxTransport> + Send + Sync>,
}

impl AlloyDelivery {
	/// Connects to `rpc_url` (http, https, ws or wss) and checks the chain id.
	pub async fn new(
		rpc_url: &str,
		chain_id: u64,
		signer: PrivateKeySigner,
	) -> Result<Self, DeliveryError> {
		let wallet = EthereumWallet::from(signer.with_chain_id(Some(chain_id)));

		let provider = ProviderBuilder::new()
			.with_recommended_fillers()
			.wallet(wallet)
			.on_builtin(rpc_url)
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to connect: {}", e)))?;

		let remote_chain_id = provider
			.get_chain_id()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get chain id: {}", e)))?;
		if remote_chain_id != chain_id {
			return Err(DeliveryError::InvalidResponse(format!(
				"Endpoint serves chain {} but {} is configured",
				remote_chain_id, chain_id
			)));
		}

		tracing::info!(chain_id, "Connected to chain");
		Ok(Self {
			provider: Arc::new(provider),
		})
	}

	async fn call_erc20<C: SolCall>(
		&self,
		token: Address,
		call: C,
	) -> Result<C::Return, DeliveryError> {
		let output = self.call(&Transaction::call(token, call.abi_encode())).await?;
		C::abi_decode_returns(&output, true).map_err(|e| {
			DeliveryError::InvalidResponse(format!(
				"Failed to decode {} from {}: {}",
				C::SIGNATURE,
				token,
				e
			))
		})
	}
}

fn to_request(tx: Transaction) -> TransactionRequest {
	let mut request = TransactionRequest::default()
		.value(tx.value)
		.input(tx.data.into());
	if let Some(to) = tx.to {
		request = request.to(to);
	}
	if let Some(gas_limit) = tx.gas_limit {
		request = request.gas_limit(gas_limit);
	}
	if let Some(nonce) = tx.nonce {
		request = request.nonce(nonce);
	}
	if let Some(max_fee) = tx.max_fee_per_gas {
		request = request.max_fee_per_gas(max_fee);
	}
	if let Some(priority_fee) = tx.max_priority_fee_per_gas {
		request = request.max_priority_fee_per_gas(priority_fee);
	}
	request
}

#[async_trait]
impl DeliveryInterface for AlloyDelivery {
	async fn submit(&self, tx: Transaction) -> Result<TransactionHash, DeliveryError> {
		let pending_tx = self
			.provider
			.send_transaction(to_request(tx))
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to send transaction: {}", e)))?;

		let hash = TransactionHash(*pending_tx.tx_hash());
		tracing::info!(tx_hash = %truncate_id(&hash.to_hex()), "Submitted transaction");
		Ok(hash)
	}

	async fn call(&self, tx: &Transaction) -> Result<Bytes, DeliveryError> {
		self.provider
			.call(&to_request(tx.clone()))
			.await
			.map_err(|e| DeliveryError::Network(format!("Call failed: {}", e)))
	}

	async fn get_receipt(
		&self,
		hash: &TransactionHash,
	) -> Result<Option<TransactionReceipt>, DeliveryError> {
		let receipt = self
			.provider
			.get_transaction_receipt(hash.0)
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get receipt: {}", e)))?;

		Ok(receipt.map(|receipt| TransactionReceipt {
			hash: TransactionHash(receipt.transaction_hash),
			block_number: receipt.block_number.unwrap_or(0),
			success: receipt.status(),
		}))
	}

	async fn get_block_number(&self) -> Result<u64, DeliveryError> {
		self.provider
			.get_block_number()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get block number: {}", e)))
	}

	async fn subscribe_blocks(&self) -> Result<BlockStream, DeliveryError> {
		let subscription = self
			.provider
			.subscribe_blocks()
			.await
			.map_err(|e| DeliveryError::Subscription(e.to_string()))?;

		Ok(subscription
			.into_stream()
			.map(|header| header.inner.number)
			.boxed())
	}

	async fn get_balance(
		&self,
		address: Address,
		token: Option<Address>,
	) -> Result<U256, DeliveryError> {
		match token {
			None => self
				.provider
				.get_balance(address)
				.await
				.map_err(|e| DeliveryError::Network(format!("Failed to get balance: {}", e))),
			Some(token) => Ok(self
				.call_erc20(token, IERC20::balanceOfCall { account: address })
				.await?
				.balance),
		}
	}

	async fn get_allowance(
		&self,
		owner: Address,
		spender: Address,
		token: Address,
	) -> Result<U256, DeliveryError> {
		Ok(self
			.call_erc20(token, IERC20::allowanceCall { owner, spender })
			.await?
			.remaining)
	}

	async fn get_nonce(&self, address: Address) -> Result<u64, DeliveryError> {
		self.provider
			.get_transaction_count(address)
			.pending()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get nonce: {}", e)))
	}

	async fn get_gas_price(&self) -> Result<u128, DeliveryError> {
		self.provider
			.get_gas_price()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get gas price: {}", e)))
	}

	async fn get_max_priority_fee(&self) -> Result<u128, DeliveryError> {
		self.provider
			.get_max_priority_fee_per_gas()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get priority fee: {}", e)))
	}
}

/// Creates the delivery for the configured endpoint, signing with `private_key`.
pub async fn create_delivery(
	rpc_url: &str,
	chain_id: u64,
	private_key: &SecretString,
) -> Result<Box<dyn DeliveryInterface>, DeliveryError> {
	let signer: PrivateKeySigner = private_key.with_exposed(|key| {
		key.parse()
			.map_err(|_| DeliveryError::Network("Invalid private key format".to_string()))
	})?;

	Ok(Box::new(AlloyDelivery::new(rpc_url, chain_id, signer).await?))
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::TxKind;

	#[test]
	fn test_request_keeps_explicit_fields() {
		let to = Address::repeat_byte(0x22);
		let tx = Transaction {
			to: Some(to),
			data: Bytes::from(vec![0xaa, 0xbb]),
			value: U256::from(5),
			gas_limit: Some(21_000),
			nonce: Some(3),
			max_fee_per_gas: Some(100),
			max_priority_fee_per_gas: Some(2),
		};

		let request = to_request(tx);
		assert_eq!(request.to, Some(TxKind::Call(to)));
		assert_eq!(request.value, Some(U256::from(5)));
		assert_eq!(request.gas, Some(21_000));
		assert_eq!(request.nonce, Some(3));
		assert_eq!(request.max_fee_per_gas, Some(100));
		assert_eq!(request.max_priority_fee_per_gas, Some(2));
	}

	#[test]
	fn test_request_leaves_unset_fields_for_fillers() {
		let request = to_request(Transaction::call(Address::ZERO, Vec::<u8>::new()));
		assert!(request.gas.is_none());
		assert!(request.nonce.is_none());
		assert!(request.max_fee_per_gas.is_none());
	}
}

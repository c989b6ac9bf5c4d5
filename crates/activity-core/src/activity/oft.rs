//! LayerZero OFT cross-chain transfer.

use super::{
	decode_returns, ensure_allowance, submit_step, Activity, ActivityContext, ActivityError, Step,
};
use crate::supplier::ValueSupplier;
use activity_types::{Address, Bytes, Transaction, TransactionReceipt, U256};
use alloy_primitives::B256;
use alloy_sol_types::{sol, SolCall};
use async_trait::async_trait;

sol! {
	interface IOftV2 {
		struct LzCallParams {
			address refundAddress;
			address zroPaymentAddress;
			bytes adapterParams;
		}

		function estimateSendFee(uint16 _dstChainId, bytes32 _toAddress, uint256 _amount, bool _useZro, bytes _adapterParams) external view returns (uint256 nativeFee, uint256 zroFee);
		function sendFrom(address _from, uint16 _dstChainId, bytes32 _toAddress, uint256 _amount, uint256 _minAmount, LzCallParams _callParams) external payable;
	}
}

const BRIDGE_GAS: u64 = 300_000;

/// Sends an OFT token to the same account on another chain.
pub struct OftBridge {
	/// Contract exposing `sendFrom`; the token itself for native OFTs.
	pub bridge: Address,
	pub token: Address,
	pub dst_chain_id: u16,
	/// Gas forwarded to the destination chain.
	pub dst_gas: u64,
	pub supplier: ValueSupplier,
}

impl OftBridge {
	/// Version 2 adapter parameters: destination gas plus an airdrop of zero
	/// native value to `recipient`.
	fn adapter_params(&self, recipient: Address) -> Bytes {
		let mut params = Vec::with_capacity(2 + 32 + 32 + 20);
		params.extend_from_slice(&2u16.to_be_bytes());
		params.extend_from_slice(&U256::from(self.dst_gas).to_be_bytes::<32>());
		params.extend_from_slice(&[0u8; 32]);
		params.extend_from_slice(recipient.as_slice());
		params.into()
	}
}

#[async_trait]
impl Activity for OftBridge {
	fn name(&self) -> &'static str {
		"oft_bridge"
	}

	fn supplier(&self) -> &ValueSupplier {
		&self.supplier
	}

	fn funding_token(&self) -> Option<Address> {
		Some(self.token)
	}

	async fn act(
		&self,
		ctx: &ActivityContext,
		value: U256,
	) -> Result<TransactionReceipt, ActivityError> {
		let to_address = B256::left_padding_from(ctx.account.as_slice());
		let adapter_params = self.adapter_params(ctx.account);

		if self.bridge != self.token {
			ensure_allowance(ctx, self.token, self.bridge, value).await?;
		}

		let estimate = IOftV2::estimateSendFeeCall {
			_dstChainId: self.dst_chain_id,
			_toAddress: to_address,
			_amount: value,
			_useZro: false,
			_adapterParams: adapter_params.clone(),
		};
		let output = ctx
			.delivery
			.call(&Transaction::call(self.bridge, estimate.abi_encode()))
			.await?;
		let fee = decode_returns::<IOftV2::estimateSendFeeCall>(&output)?.nativeFee;
		tracing::info!(
			activity = self.name(),
			dst_chain_id = self.dst_chain_id,
			%value,
			%fee,
			"Bridging"
		);

		let send = IOftV2::sendFromCall {
			_from: ctx.account,
			_dstChainId: self.dst_chain_id,
			_toAddress: to_address,
			_amount: value,
			_minAmount: value,
			_callParams: IOftV2::LzCallParams {
				refundAddress: ctx.account,
				zroPaymentAddress: Address::ZERO,
				adapterParams: adapter_params,
			},
		};
		let tx = Transaction::call(self.bridge, send.abi_encode())
			.with_value(fee)
			.with_gas_limit(BRIDGE_GAS);
		submit_step(ctx, Step::Bridge, tx).await
	}
}

//! Stargate-style cross-chain transfer.

use super::{
	decode_returns, ensure_allowance, submit_step, Activity, ActivityContext, ActivityError, Step,
};
use crate::supplier::ValueSupplier;
use activity_types::{Address, Bytes, Transaction, TransactionReceipt, U256};
use alloy_sol_types::{sol, SolCall};
use async_trait::async_trait;

sol! {
	interface IStargateRouter {
		struct lzTxObj {
			uint256 dstGasForCall;
			uint256 dstNativeAmount;
			bytes dstNativeAddr;
		}

		function quoteLayerZeroFee(uint16 _dstChainId, uint8 _functionType, bytes _toAddress, bytes _transferAndCallPayload, lzTxObj _lzTxParams) external view returns (uint256 nativeFee, uint256 zroFee);
		function swap(uint16 _dstChainId, uint256 _srcPoolId, uint256 _dstPoolId, address _refundAddress, uint256 _amountLD, uint256 _minAmountLD, lzTxObj _lzTxParams, bytes _to, bytes _payload) external payable;
	}
}

/// Function type LayerZero quotes for a plain pool swap.
const TYPE_SWAP_REMOTE: u8 = 1;

const BRIDGE_GAS: u64 = 600_000;

/// Moves `token` to another chain through a Stargate router pool.
pub struct StargateBridge {
	pub router: Address,
	pub token: Address,
	pub src_pool_id: U256,
	pub dst_pool_id: U256,
	pub dst_chain_id: u16,
	/// Accepted slippage in basis points.
	pub slippage_bps: u16,
	pub supplier: ValueSupplier,
}

impl StargateBridge {
	fn min_amount(&self, value: U256) -> U256 {
		value * U256::from(10_000 - self.slippage_bps) / U256::from(10_000)
	}
}

fn empty_lz_tx() -> IStargateRouter::lzTxObj {
	IStargateRouter::lzTxObj {
		dstGasForCall: U256::ZERO,
		dstNativeAmount: U256::ZERO,
		dstNativeAddr: Bytes::new(),
	}
}

#[async_trait]
impl Activity for StargateBridge {
	fn name(&self) -> &'static str {
		"stargate_bridge"
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
		let recipient = Bytes::copy_from_slice(ctx.account.as_slice());

		let quote = IStargateRouter::quoteLayerZeroFeeCall {
			_dstChainId: self.dst_chain_id,
			_functionType: TYPE_SWAP_REMOTE,
			_toAddress: recipient.clone(),
			_transferAndCallPayload: Bytes::new(),
			_lzTxParams: empty_lz_tx(),
		};
		let output = ctx
			.delivery
			.call(&Transaction::call(self.router, quote.abi_encode()))
			.await?;
		let fee = decode_returns::<IStargateRouter::quoteLayerZeroFeeCall>(&output)?.nativeFee;
		tracing::info!(
			activity = self.name(),
			dst_chain_id = self.dst_chain_id,
			%value,
			%fee,
			"Bridging"
		);

		ensure_allowance(ctx, self.token, self.router, value).await?;

		let swap = IStargateRouter::swapCall {
			_dstChainId: self.dst_chain_id,
			_srcPoolId: self.src_pool_id,
			_dstPoolId: self.dst_pool_id,
			_refundAddress: ctx.account,
			_amountLD: value,
			_minAmountLD: self.min_amount(value),
			_lzTxParams: empty_lz_tx(),
			_to: recipient,
			_payload: Bytes::new(),
		};
		let tx = Transaction::call(self.router, swap.abi_encode())
			.with_value(fee)
			.with_gas_limit(BRIDGE_GAS);
		submit_step(ctx, Step::Bridge, tx).await
	}
}

//! Router swap.

use super::{
	decode_returns, ensure_allowance, submit_step, Activity, ActivityContext, ActivityError, Step,
};
use crate::supplier::ValueSupplier;
use activity_types::{Address, Transaction, TransactionReceipt, U256};
use alloy_primitives::address;
use alloy_sol_types::{sol, SolCall};
use async_trait::async_trait;

sol! {
	interface IWooRouter {
		function querySwap(address fromToken, address toToken, uint256 fromAmount) external view returns (uint256 toAmount);
		function swap(address fromToken, address toToken, uint256 fromAmount, uint256 minToAmount, address to, address rebateTo) external payable returns (uint256 realToAmount);
	}
}

/// Placeholder token address routers use for the chain's native asset.
pub const NATIVE_TOKEN: Address = address!("EeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE");

const SWAP_GAS: u64 = 350_000;

/// Swaps `from_token` for `to_token` through a WOOFi-style router.
///
/// The router is quoted first and the quote is used as the minimum output,
/// so any price movement between quote and inclusion reverts the swap.
pub struct RouterSwap {
	router: Address,
	from_token: Address,
	to_token: Address,
	supplier: ValueSupplier,
}

impl RouterSwap {
	pub fn new(
		router: Address,
		from_token: Address,
		to_token: Address,
		supplier: ValueSupplier,
	) -> Self {
		Self {
			router,
			from_token,
			to_token,
			supplier,
		}
	}

	fn is_native(&self) -> bool {
		self.from_token == NATIVE_TOKEN
	}
}

#[async_trait]
impl Activity for RouterSwap {
	fn name(&self) -> &'static str {
		"router_swap"
	}

	fn supplier(&self) -> &ValueSupplier {
		&self.supplier
	}

	fn funding_token(&self) -> Option<Address> {
		(!self.is_native()).then_some(self.from_token)
	}

	async fn act(
		&self,
		ctx: &ActivityContext,
		value: U256,
	) -> Result<TransactionReceipt, ActivityError> {
		let query = IWooRouter::querySwapCall {
			fromToken: self.from_token,
			toToken: self.to_token,
			fromAmount: value,
		};
		let output = ctx
			.delivery
			.call(&Transaction::call(self.router, query.abi_encode()))
			.await?;
		let quote = decode_returns::<IWooRouter::querySwapCall>(&output)?.toAmount;
		tracing::info!(
			activity = self.name(),
			from_token = %self.from_token,
			to_token = %self.to_token,
			%value,
			%quote,
			"Swapping"
		);

		let native_value = if self.is_native() {
			value
		} else {
			ensure_allowance(ctx, self.from_token, self.router, value).await?;
			U256::ZERO
		};

		let swap = IWooRouter::swapCall {
			fromToken: self.from_token,
			toToken: self.to_token,
			fromAmount: value,
			minToAmount: quote,
			to: ctx.account,
			rebateTo: ctx.account,
		};
		let tx = Transaction::call(self.router, swap.abi_encode())
			.with_value(native_value)
			.with_gas_limit(SWAP_GAS);
		submit_step(ctx, Step::Swap, tx).await
	}
}

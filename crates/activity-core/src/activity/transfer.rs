//! Native value transfer.

use super::{broadcast_step, confirm_step, Activity, ActivityContext, ActivityError, Step};
use crate::supplier::ValueSupplier;
use activity_types::{Address, Transaction, TransactionReceipt, U256};
use async_trait::async_trait;

const TRANSFER_GAS: u64 = 21_000;

/// Sends native value to a fixed recipient.
///
/// Nonce and fees are fetched explicitly so the transaction is built as an
/// EIP-1559 transfer with the node's suggested fee cap and tip. The nonce is
/// read while holding the submission slot.
pub struct TransferNative {
	to: Address,
	supplier: ValueSupplier,
}

impl TransferNative {
	pub fn new(to: Address, supplier: ValueSupplier) -> Self {
		Self { to, supplier }
	}
}

#[async_trait]
impl Activity for TransferNative {
	fn name(&self) -> &'static str {
		"transfer_native"
	}

	fn supplier(&self) -> &ValueSupplier {
		&self.supplier
	}

	async fn act(
		&self,
		ctx: &ActivityContext,
		value: U256,
	) -> Result<TransactionReceipt, ActivityError> {
		tracing::info!(activity = self.name(), to = %self.to, %value, "Transferring");

		let max_fee = ctx.delivery.get_gas_price().await?;
		let priority_fee = ctx.delivery.get_max_priority_fee().await?;

		let hash = {
			let _slot = ctx.submission_slot().await;
			let nonce = ctx.delivery.get_nonce(ctx.account).await?;
			let tx = Transaction {
				to: Some(self.to),
				value,
				gas_limit: Some(TRANSFER_GAS),
				nonce: Some(nonce),
				max_fee_per_gas: Some(max_fee),
				max_priority_fee_per_gas: Some(priority_fee.min(max_fee)),
				..Default::default()
			};
			broadcast_step(ctx, Step::Transfer, tx).await?
		};
		confirm_step(ctx, Step::Transfer, hash).await
	}
}

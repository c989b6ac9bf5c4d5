//! The activity protocol.
//!
//! Every activity goes through two phases per attempt. *Evaluate* reads the
//! spendable balance and draws a value from the activity's supplier; *act*
//! submits the transactions (an optional ERC-20 approval, then the primary
//! transaction) and waits for each one to be mined successfully before the
//! next is sent. The drawn value lives in the attempt state and is only good
//! for the act call that follows it.
//!
//! Attempts from one account may run concurrently. Evaluation is serialized
//! and the drawn value stays reserved against its funding balance until the
//! act call returns. Broadcasts go through the context's submission slot so
//! each transaction is built and sent on top of the previous one's nonce.

use crate::supplier::{SupplierError, ValueSupplier};
use crate::waiter::{ConfirmationWaiter, WaitError};
use activity_config::ActivityConfig;
use activity_delivery::erc20::IERC20;
use activity_delivery::{DeliveryError, DeliveryInterface};
use activity_types::{truncate_id, Address, Transaction, TransactionHash, TransactionReceipt, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

pub mod bridge;
pub mod oft;
pub mod swap;
pub mod transfer;

pub use bridge::StargateBridge;
pub use oft::OftBridge;
pub use swap::RouterSwap;
pub use transfer::TransferNative;

/// A transaction within an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
	Approval,
	Transfer,
	Swap,
	Bridge,
}

impl fmt::Display for Step {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Step::Approval => "approval",
			Step::Transfer => "transfer",
			Step::Swap => "swap",
			Step::Bridge => "bridge",
		};
		f.write_str(name)
	}
}

/// Errors that can occur while evaluating or executing an activity.
#[derive(Debug, Error)]
pub enum ActivityError {
	#[error("Transport error: {0}")]
	Transport(#[from] DeliveryError),
	#[error("Insufficient balance: have {balance}, need at least {required}")]
	InsufficientBalance { balance: U256, required: U256 },
	#[error("{step} transaction {hash} reverted")]
	TransactionReverted { step: Step, hash: TransactionHash },
	#[error("{step} transaction {hash} not mined within {timeout:?}")]
	Timeout {
		step: Step,
		hash: TransactionHash,
		timeout: Duration,
	},
	#[error("Failed to submit {step} transaction: {source}")]
	Submission {
		step: Step,
		#[source]
		source: DeliveryError,
	},
	#[error("Invalid usage: {0}")]
	Usage(String),
}

/// Shared collaborators handed to every activity.
pub struct ActivityContext {
	pub delivery: Arc<dyn DeliveryInterface>,
	pub waiter: Arc<ConfirmationWaiter>,
	/// Address transactions are sent from.
	pub account: Address,
	/// How long each step waits for its receipt.
	pub receipt_timeout: Duration,
	submission: AsyncMutex<()>,
	evaluation: AsyncMutex<()>,
	reservations: Arc<Reservations>,
}

impl ActivityContext {
	pub fn new(
		delivery: Arc<dyn DeliveryInterface>,
		waiter: Arc<ConfirmationWaiter>,
		account: Address,
		receipt_timeout: Duration,
	) -> Self {
		Self {
			delivery,
			waiter,
			account,
			receipt_timeout,
			submission: AsyncMutex::new(()),
			evaluation: AsyncMutex::new(()),
			reservations: Arc::new(Reservations::default()),
		}
	}

	/// Exclusive right to broadcast from the account.
	///
	/// Hold it from the nonce read until the transaction has been handed to
	/// the node, and release it before waiting for the receipt.
	pub async fn submission_slot(&self) -> MutexGuard<'_, ()> {
		self.submission.lock().await
	}

	/// Value currently reserved by evaluated attempts against `token`
	/// (`None` for the native balance).
	pub fn reserved(&self, token: Option<Address>) -> U256 {
		self.reservations.held(token)
	}
}

/// Unspent values drawn by evaluated attempts, per funding asset.
#[derive(Default)]
struct Reservations(Mutex<HashMap<Option<Address>, U256>>);

impl Reservations {
	fn held(&self, token: Option<Address>) -> U256 {
		let held = self.0.lock().unwrap_or_else(PoisonError::into_inner);
		held.get(&token).copied().unwrap_or_default()
	}

	fn reserve(self: &Arc<Self>, token: Option<Address>, value: U256) -> Reservation {
		let mut held = self.0.lock().unwrap_or_else(PoisonError::into_inner);
		let entry = held.entry(token).or_default();
		*entry = entry.saturating_add(value);
		Reservation {
			ledger: self.clone(),
			token,
			value,
		}
	}
}

/// Releases its value when dropped.
struct Reservation {
	ledger: Arc<Reservations>,
	token: Option<Address>,
	value: U256,
}

impl Drop for Reservation {
	fn drop(&mut self) {
		let mut held = self.ledger.0.lock().unwrap_or_else(PoisonError::into_inner);
		if let Some(entry) = held.get_mut(&self.token) {
			*entry = entry.saturating_sub(self.value);
			if entry.is_zero() {
				held.remove(&self.token);
			}
		}
	}
}

/// A configured on-chain action.
#[async_trait]
pub trait Activity: Send + Sync {
	fn name(&self) -> &'static str;

	fn supplier(&self) -> &ValueSupplier;

	/// ERC-20 token the activity's value is paid in, `None` for native value.
	fn funding_token(&self) -> Option<Address> {
		None
	}

	/// Balance the activity's value is paid from.
	async fn spendable_balance(&self, ctx: &ActivityContext) -> Result<U256, ActivityError> {
		Ok(ctx
			.delivery
			.get_balance(ctx.account, self.funding_token())
			.await?)
	}

	/// Submits the activity's transactions for `value`.
	///
	/// Returns the receipt of the primary transaction.
	async fn act(
		&self,
		ctx: &ActivityContext,
		value: U256,
	) -> Result<TransactionReceipt, ActivityError>;
}

/// Phase of an [`ActivityAttempt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityState {
	Idle,
	Ready { value: U256 },
	Rejected,
	Completed { receipt: TransactionReceipt },
	Failed,
}

/// One evaluate-then-act run of an activity.
pub struct ActivityAttempt {
	activity: Arc<dyn Activity>,
	state: ActivityState,
	reservation: Option<Reservation>,
}

impl ActivityAttempt {
	pub fn new(activity: Arc<dyn Activity>) -> Self {
		Self {
			activity,
			state: ActivityState::Idle,
			reservation: None,
		}
	}

	pub fn state(&self) -> &ActivityState {
		&self.state
	}

	pub fn activity(&self) -> &dyn Activity {
		self.activity.as_ref()
	}

	/// Checks the balance and draws the value for the next [`execute`](Self::execute).
	///
	/// Evaluating again replaces any value drawn before. The value is drawn
	/// from the balance left after other attempts' reservations and stays
	/// reserved until [`execute`](Self::execute) returns or the attempt is
	/// dropped.
	pub async fn evaluate(&mut self, ctx: &ActivityContext) -> Result<U256, ActivityError> {
		self.state = ActivityState::Idle;
		self.reservation = None;

		let supplier = self.activity.supplier();
		let token = self.activity.funding_token();
		let _evaluation = ctx.evaluation.lock().await;
		let balance = self.activity.spendable_balance(ctx).await?;
		let reserved = ctx.reservations.held(token);
		let available = balance.saturating_sub(reserved);

		match supplier.sample_within(available) {
			Some(value) => {
				tracing::debug!(
					activity = self.activity.name(),
					%value,
					%reserved,
					min = %supplier.min(),
					max = %supplier.max(),
					"Evaluated"
				);
				self.reservation = Some(ctx.reservations.reserve(token, value));
				self.state = ActivityState::Ready { value };
				Ok(value)
			}
			None => {
				self.state = ActivityState::Rejected;
				Err(ActivityError::InsufficientBalance {
					balance: available,
					required: supplier.min(),
				})
			}
		}
	}

	/// Runs the act phase with the evaluated value.
	pub async fn execute(
		&mut self,
		ctx: &ActivityContext,
	) -> Result<TransactionReceipt, ActivityError> {
		let value = match self.state {
			ActivityState::Ready { value } => value,
			ref other => {
				return Err(ActivityError::Usage(format!(
					"execute requires an evaluated attempt, state is {:?}",
					other
				)))
			}
		};

		let result = self.activity.act(ctx, value).await;
		self.reservation = None;
		match result {
			Ok(receipt) => {
				self.state = ActivityState::Completed {
					receipt: receipt.clone(),
				};
				Ok(receipt)
			}
			Err(e) => {
				self.state = ActivityState::Failed;
				Err(e)
			}
		}
	}
}

/// Submits `tx` and waits until it is mined successfully.
pub async fn submit_step(
	ctx: &ActivityContext,
	step: Step,
	tx: Transaction,
) -> Result<TransactionReceipt, ActivityError> {
	let hash = {
		let _slot = ctx.submission_slot().await;
		broadcast_step(ctx, step, tx).await?
	};
	confirm_step(ctx, step, hash).await
}

/// Hands `tx` to the node. Callers hold the submission slot.
pub async fn broadcast_step(
	ctx: &ActivityContext,
	step: Step,
	tx: Transaction,
) -> Result<TransactionHash, ActivityError> {
	ctx.delivery
		.submit(tx)
		.await
		.map_err(|source| ActivityError::Submission { step, source })
}

/// Waits for a broadcast step to be mined successfully.
pub async fn confirm_step(
	ctx: &ActivityContext,
	step: Step,
	hash: TransactionHash,
) -> Result<TransactionReceipt, ActivityError> {
	let tx_hash = truncate_id(&hash.to_hex());
	tracing::info!(%step, %tx_hash, "Waiting for confirmation");

	match ctx
		.waiter
		.wait_for_receipt_or_timeout(hash, ctx.receipt_timeout)
		.await
	{
		Ok(receipt) if receipt.success => {
			tracing::info!(%step, %tx_hash, block = receipt.block_number, "Confirmed");
			Ok(receipt)
		}
		Ok(_) => Err(ActivityError::TransactionReverted { step, hash }),
		Err(WaitError::Timeout(timeout)) => Err(ActivityError::Timeout {
			step,
			hash,
			timeout,
		}),
		Err(WaitError::Closed) => Err(ActivityError::Usage(
			"confirmation waiter dropped a pending request".into(),
		)),
	}
}

/// Approves `spender` for exactly `amount` of `token` unless the current
/// allowance already covers it.
pub async fn ensure_allowance(
	ctx: &ActivityContext,
	token: Address,
	spender: Address,
	amount: U256,
) -> Result<Option<TransactionReceipt>, ActivityError> {
	let allowance = ctx
		.delivery
		.get_allowance(ctx.account, spender, token)
		.await?;
	if allowance >= amount {
		tracing::debug!(%token, %spender, %allowance, "Allowance sufficient");
		return Ok(None);
	}

	tracing::info!(%token, %spender, %allowance, %amount, "Approving");
	let approve = IERC20::approveCall { spender, amount };
	submit_step(ctx, Step::Approval, Transaction::call(token, approve.abi_encode()))
		.await
		.map(Some)
}

/// Decodes the return data of a read-only call.
pub(crate) fn decode_returns<C: SolCall>(output: &[u8]) -> Result<C::Return, ActivityError> {
	C::abi_decode_returns(output, true).map_err(|e| {
		ActivityError::Transport(DeliveryError::InvalidResponse(format!(
			"Failed to decode {}: {}",
			C::SIGNATURE,
			e
		)))
	})
}

/// Builds the activity described by an `[[activities]]` entry.
pub fn build_activity(config: &ActivityConfig) -> Result<Arc<dyn Activity>, SupplierError> {
	let supplier = ValueSupplier::from_config(config.amount())?;
	let activity: Arc<dyn Activity> = match config {
		ActivityConfig::TransferNative { to, .. } => Arc::new(TransferNative::new(*to, supplier)),
		ActivityConfig::RouterSwap {
			router,
			from_token,
			to_token,
			..
		} => Arc::new(RouterSwap::new(*router, *from_token, *to_token, supplier)),
		ActivityConfig::StargateBridge {
			router,
			token,
			src_pool_id,
			dst_pool_id,
			dst_chain_id,
			slippage_bps,
			..
		} => Arc::new(StargateBridge {
			router: *router,
			token: *token,
			src_pool_id: U256::from(*src_pool_id),
			dst_pool_id: U256::from(*dst_pool_id),
			dst_chain_id: *dst_chain_id,
			slippage_bps: *slippage_bps,
			supplier,
		}),
		ActivityConfig::OftBridge {
			bridge,
			token,
			dst_chain_id,
			dst_gas,
			..
		} => Arc::new(OftBridge {
			bridge: *bridge,
			token: *token,
			dst_chain_id: *dst_chain_id,
			dst_gas: *dst_gas,
			supplier,
		}),
	};
	Ok(activity)
}

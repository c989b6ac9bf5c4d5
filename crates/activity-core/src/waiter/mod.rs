//! Confirmation waiting.
//!
//! [`ConfirmationWaiter`] multiplexes any number of "tell me when this
//! transaction is mined" and "tell me when the chain is N blocks further"
//! requests over a single chain feed. Callers get a one-shot receiver; the
//! feed calls [`ConfirmationWaiter::resolve`] once per tick.
//!
//! Receipt lookups run outside the state lock against a snapshot of the
//! pending hashes, so registration never blocks behind RPC latency. Senders
//! are fired only after the lock is released.

use activity_delivery::{DeliveryError, DeliveryInterface};
use activity_types::{truncate_id, TransactionHash, TransactionReceipt};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{oneshot, Mutex};
use tokio::time::Instant;

/// Errors returned by deadline-bounded waits.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WaitError {
	#[error("No receipt within {0:?}")]
	Timeout(Duration),
	#[error("Waiter dropped the request")]
	Closed,
}

#[derive(Default)]
struct WaiterState {
	last_known_height: u64,
	height_refreshed_at: Option<Instant>,
	transactions: HashMap<TransactionHash, Vec<oneshot::Sender<TransactionReceipt>>>,
	blocks: BTreeMap<u64, Vec<oneshot::Sender<()>>>,
}

impl WaiterState {
	fn height_is_fresh(&self, floor: Duration) -> bool {
		self.height_refreshed_at
			.is_some_and(|at| at.elapsed() < floor)
	}
}

pub struct ConfirmationWaiter {
	delivery: Arc<dyn DeliveryInterface>,
	refresh_floor: Duration,
	state: Mutex<WaiterState>,
}

impl ConfirmationWaiter {
	/// Creates a waiter that refreshes the block height at most once per
	/// `refresh_floor`.
	pub fn new(delivery: Arc<dyn DeliveryInterface>, refresh_floor: Duration) -> Self {
		Self {
			delivery,
			refresh_floor,
			state: Mutex::new(WaiterState::default()),
		}
	}

	/// Registers interest in the receipt of `hash`.
	///
	/// Every call is a separate registration. The receiver never fires if the
	/// transaction is never mined.
	pub async fn wait_for_transaction(
		&self,
		hash: TransactionHash,
	) -> oneshot::Receiver<TransactionReceipt> {
		let (tx, rx) = oneshot::channel();
		self.state
			.lock()
			.await
			.transactions
			.entry(hash)
			.or_default()
			.push(tx);
		tracing::debug!(tx_hash = %truncate_id(&hash.to_hex()), "Registered receipt wait");
		rx
	}

	/// Registers interest in the chain reaching `blocks` past the current height.
	pub async fn wait_for_blocks(
		&self,
		blocks: u64,
	) -> Result<oneshot::Receiver<()>, DeliveryError> {
		let height = self.refresh_height().await?;
		let target = height.saturating_add(blocks);
		let (tx, rx) = oneshot::channel();
		self.state
			.lock()
			.await
			.blocks
			.entry(target)
			.or_default()
			.push(tx);
		tracing::debug!(height, target, "Registered block wait");
		Ok(rx)
	}

	/// Waits for the receipt of `hash` for at most `deadline`.
	///
	/// On timeout the registration stays in place until the hash resolves.
	pub async fn wait_for_receipt_or_timeout(
		&self,
		hash: TransactionHash,
		deadline: Duration,
	) -> Result<TransactionReceipt, WaitError> {
		let receiver = self.wait_for_transaction(hash).await;
		match tokio::time::timeout(deadline, receiver).await {
			Ok(Ok(receipt)) => Ok(receipt),
			Ok(Err(_)) => Err(WaitError::Closed),
			Err(_) => Err(WaitError::Timeout(deadline)),
		}
	}

	/// Records a height pushed by the feed. Heights never move backwards.
	pub async fn observe_height(&self, height: u64) -> u64 {
		let mut state = self.state.lock().await;
		state.last_known_height = state.last_known_height.max(height);
		state.height_refreshed_at = Some(Instant::now());
		state.last_known_height
	}

	pub async fn last_known_height(&self) -> u64 {
		self.state.lock().await.last_known_height
	}

	pub async fn has_pending(&self) -> bool {
		let state = self.state.lock().await;
		!state.transactions.is_empty() || !state.blocks.is_empty()
	}

	/// Runs one resolution pass.
	///
	/// Idle passes return without touching the chain. Receipt errors leave
	/// the hash pending; a failed height refresh skips the block waits for
	/// this pass.
	pub async fn resolve(&self) {
		let (hashes, has_block_waits) = {
			let state = self.state.lock().await;
			if state.transactions.is_empty() && state.blocks.is_empty() {
				return;
			}
			let hashes: Vec<TransactionHash> = state.transactions.keys().copied().collect();
			(hashes, !state.blocks.is_empty())
		};

		let mut receipts = Vec::new();
		for hash in hashes {
			match self.delivery.get_receipt(&hash).await {
				Ok(Some(receipt)) => receipts.push((hash, receipt)),
				Ok(None) => {}
				Err(e) => {
					tracing::warn!(
						tx_hash = %truncate_id(&hash.to_hex()),
						error = %e,
						"Failed to query receipt"
					);
				}
			}
		}

		let height = if has_block_waits {
			match self.refresh_height().await {
				Ok(height) => Some(height),
				Err(e) => {
					tracing::warn!(error = %e, "Failed to refresh block height");
					None
				}
			}
		} else {
			None
		};

		let (mined, reached) = {
			let mut state = self.state.lock().await;
			let mined: Vec<_> = receipts
				.into_iter()
				.filter_map(|(hash, receipt)| {
					state
						.transactions
						.remove(&hash)
						.map(|senders| (senders, receipt))
				})
				.collect();

			let reached: Vec<oneshot::Sender<()>> = match height {
				Some(height) => {
					let pending = state.blocks.split_off(&height.saturating_add(1));
					std::mem::replace(&mut state.blocks, pending)
						.into_values()
						.flatten()
						.collect()
				}
				None => Vec::new(),
			};
			(mined, reached)
		};

		for (senders, receipt) in mined {
			tracing::debug!(
				tx_hash = %truncate_id(&receipt.hash.to_hex()),
				block = receipt.block_number,
				waiters = senders.len(),
				"Transaction mined"
			);
			for sender in senders {
				let _ = sender.send(receipt.clone());
			}
		}
		for sender in reached {
			let _ = sender.send(());
		}
	}

	/// Returns the current height, fetching it if the last refresh is older
	/// than the refresh floor.
	async fn refresh_height(&self) -> Result<u64, DeliveryError> {
		{
			let state = self.state.lock().await;
			if state.height_is_fresh(self.refresh_floor) {
				return Ok(state.last_known_height);
			}
		}
		let height = self.delivery.get_block_number().await?;
		Ok(self.observe_height(height).await)
	}
}

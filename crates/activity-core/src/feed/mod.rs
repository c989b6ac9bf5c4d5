//! Chain feeds driving the confirmation waiter.
//!
//! A feed runs one resolution pass on the waiter every time the chain may
//! have advanced. [`PollFeed`] ticks on a fixed interval and lets the waiter
//! fetch the height itself; [`SubscriptionFeed`] pushes every new header
//! height and then resolves.

use crate::waiter::ConfirmationWaiter;
use activity_config::{FeedConfig, FeedMode};
use activity_delivery::{DeliveryError, DeliveryInterface};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub mod poll;
pub mod subscribe;

pub use poll::PollFeed;
pub use subscribe::SubscriptionFeed;

/// Errors that end a feed.
#[derive(Debug, Error)]
pub enum FeedError {
	#[error("Subscription failed: {0}")]
	Subscription(#[from] DeliveryError),
	#[error("Header stream ended")]
	StreamEnded,
	#[error("Feed task failed: {0}")]
	Task(String),
}

/// Source of "the chain has advanced" ticks.
pub trait ChainFeed: Send + Sync {
	/// Starts delivering ticks to `waiter` on a background task.
	fn start(&self, waiter: Arc<ConfirmationWaiter>) -> FeedHandle;
}

/// Handle to a running feed.
///
/// Dropping the handle stops the feed as well.
pub struct FeedHandle {
	stop_tx: mpsc::Sender<()>,
	task: JoinHandle<Result<(), FeedError>>,
}

impl FeedHandle {
	pub(crate) fn spawn<F>(run: impl FnOnce(mpsc::Receiver<()>) -> F) -> Self
	where
		F: std::future::Future<Output = Result<(), FeedError>> + Send + 'static,
	{
		let (stop_tx, stop_rx) = mpsc::channel(1);
		Self {
			stop_tx,
			task: tokio::spawn(run(stop_rx)),
		}
	}

	/// Stops further ticks. A pass already running finishes first.
	pub fn cancel(&self) {
		let _ = self.stop_tx.try_send(());
	}

	pub fn is_finished(&self) -> bool {
		self.task.is_finished()
	}

	/// Waits for the feed task to end and returns why it ended.
	pub async fn join(self) -> Result<(), FeedError> {
		self.task
			.await
			.map_err(|e| FeedError::Task(e.to_string()))?
	}
}

/// Creates the feed selected by `[feed]`.
pub fn create_feed(
	config: &FeedConfig,
	delivery: Arc<dyn DeliveryInterface>,
) -> Box<dyn ChainFeed> {
	match config.mode {
		FeedMode::Poll => Box::new(PollFeed::new(Duration::from_millis(
			config.poll_interval_ms,
		))),
		FeedMode::Subscribe => Box::new(SubscriptionFeed::new(delivery)),
	}
}

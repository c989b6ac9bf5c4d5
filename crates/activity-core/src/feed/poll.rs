//! Fixed-interval polling feed.

use super::{ChainFeed, FeedError, FeedHandle};
use crate::waiter::ConfirmationWaiter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::instrument;

pub struct PollFeed {
	interval: Duration,
}

impl PollFeed {
	pub fn new(interval: Duration) -> Self {
		Self { interval }
	}

	#[instrument(skip_all, fields(interval_ms = interval.as_millis() as u64))]
	async fn run(
		waiter: Arc<ConfirmationWaiter>,
		interval: Duration,
		mut stop_rx: mpsc::Receiver<()>,
	) -> Result<(), FeedError> {
		let mut ticker = tokio::time::interval(interval);
		ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
		// The first tick completes immediately.
		ticker.tick().await;

		tracing::info!("Polling feed started");
		loop {
			tokio::select! {
				_ = ticker.tick() => {
					waiter.resolve().await;
				}
				_ = stop_rx.recv() => {
					tracing::info!("Polling feed stopped");
					return Ok(());
				}
			}
		}
	}
}

impl ChainFeed for PollFeed {
	fn start(&self, waiter: Arc<ConfirmationWaiter>) -> FeedHandle {
		let interval = self.interval;
		FeedHandle::spawn(move |stop_rx| Self::run(waiter, interval, stop_rx))
	}
}

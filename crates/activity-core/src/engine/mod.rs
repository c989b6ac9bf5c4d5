//! Round driver.
//!
//! The engine runs a fixed number of rounds. Every round picks one of the
//! configured activities at random, evaluates it and, if it is ready, acts.
//! Attempts run on their own tasks with concurrency bounded by
//! `bot.max_concurrent`, and rounds are spaced by a random delay drawn from
//! `[bot.min_delay_seconds, bot.max_delay_seconds]`.

use crate::activity::{Activity, ActivityAttempt, ActivityContext, ActivityError};
use crate::feed::{FeedError, FeedHandle};
use activity_config::BotConfig;
use rand::{rngs::OsRng, Rng};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::instrument;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Invalid usage: {0}")]
	Usage(String),
	#[error("Chain feed stopped")]
	FeedStopped,
	#[error("Feed error: {0}")]
	Feed(#[from] FeedError),
	#[error("Service error: {0}")]
	Service(String),
}

/// Outcome counts of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
	/// Attempts whose transactions were all mined successfully.
	pub completed: u32,
	/// Attempts rejected during evaluation for lack of balance.
	pub skipped: u32,
	/// Attempts that failed on transport, submission, timeout or revert.
	pub failed: u32,
}

impl RunSummary {
	fn record(
		&mut self,
		result: Result<Result<(), ActivityError>, JoinError>,
	) -> Result<(), EngineError> {
		match result {
			Ok(Ok(())) => self.completed += 1,
			Ok(Err(ActivityError::InsufficientBalance { .. })) => self.skipped += 1,
			Ok(Err(ActivityError::Usage(message))) => return Err(EngineError::Usage(message)),
			Ok(Err(_)) => self.failed += 1,
			Err(e) => {
				tracing::error!(error = %e, "Attempt task failed");
				self.failed += 1;
			}
		}
		Ok(())
	}

	pub fn total(&self) -> u32 {
		self.completed + self.skipped + self.failed
	}
}

/// Runs activity rounds against a live confirmation waiter.
pub struct ActivityEngine {
	config: BotConfig,
	context: Arc<ActivityContext>,
	activities: Vec<Arc<dyn Activity>>,
	feed: FeedHandle,
}

impl ActivityEngine {
	pub fn new(
		config: BotConfig,
		context: ActivityContext,
		activities: Vec<Arc<dyn Activity>>,
		feed: FeedHandle,
	) -> Self {
		Self {
			config,
			context: Arc::new(context),
			activities,
			feed,
		}
	}

	pub fn context(&self) -> &ActivityContext {
		&self.context
	}

	/// Runs `rounds` attempts and returns their outcome counts.
	///
	/// Individual attempt failures are logged and counted. A usage error
	/// aborts the run and cancels the attempts still in flight.
	#[instrument(skip(self), fields(bot_id = %self.config.id))]
	pub async fn run(&self, rounds: u32) -> Result<RunSummary, EngineError> {
		if self.activities.is_empty() {
			return Err(EngineError::Usage("no activities configured".into()));
		}

		let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
		let mut attempts = JoinSet::new();
		let mut summary = RunSummary::default();

		for round in 0..rounds {
			if round > 0 {
				let delay = self.round_delay();
				if !delay.is_zero() {
					tracing::debug!(delay_secs = delay.as_secs(), "Waiting before next round");
					tokio::time::sleep(delay).await;
				}
			}
			if self.feed.is_finished() {
				attempts.abort_all();
				return Err(EngineError::FeedStopped);
			}

			let permit = semaphore
				.clone()
				.acquire_owned()
				.await
				.map_err(|e| EngineError::Service(e.to_string()))?;
			let activity = self.pick_activity();
			let context = self.context.clone();
			attempts.spawn(async move {
				let _permit = permit;
				run_attempt(&context, activity, round).await
			});

			while let Some(result) = attempts.try_join_next() {
				if let Err(e) = summary.record(result) {
					attempts.abort_all();
					return Err(e);
				}
			}
		}

		while let Some(result) = attempts.join_next().await {
			if let Err(e) = summary.record(result) {
				attempts.abort_all();
				return Err(e);
			}
		}

		tracing::info!(
			completed = summary.completed,
			skipped = summary.skipped,
			failed = summary.failed,
			"Run finished"
		);
		Ok(summary)
	}

	/// Stops the chain feed and reports how it ended.
	///
	/// Requests still pending in the waiter are left as they are.
	pub async fn shutdown(self) -> Result<(), EngineError> {
		self.feed.cancel();
		self.feed.join().await?;
		Ok(())
	}

	fn pick_activity(&self) -> Arc<dyn Activity> {
		let index = OsRng.gen_range(0..self.activities.len());
		self.activities[index].clone()
	}

	fn round_delay(&self) -> Duration {
		let min = self.config.min_delay_seconds;
		let max = self.config.max_delay_seconds.max(min);
		Duration::from_secs(OsRng.gen_range(min..=max))
	}
}

#[instrument(skip_all, fields(round = round, activity = activity.name()))]
async fn run_attempt(
	ctx: &ActivityContext,
	activity: Arc<dyn Activity>,
	round: u32,
) -> Result<(), ActivityError> {
	let mut attempt = ActivityAttempt::new(activity);

	if let Err(e) = attempt.evaluate(ctx).await {
		match &e {
			ActivityError::InsufficientBalance { .. } => {
				tracing::warn!(error = %e, "Skipping activity");
			}
			_ => tracing::error!(error = %e, "Failed to evaluate activity"),
		}
		return Err(e);
	}

	match attempt.execute(ctx).await {
		Ok(receipt) => {
			tracing::info!(block = receipt.block_number, "Activity completed");
			Ok(())
		}
		Err(e) => {
			tracing::error!(error = %e, "Activity failed");
			Err(e)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::activity::build_activity;
	use crate::feed::{ChainFeed, PollFeed};
	use crate::supplier::ValueSupplier;
	use crate::test_utils::MockDelivery;
	use crate::waiter::ConfirmationWaiter;
	use activity_config::{ActivityConfig, AmountConfig};
	use activity_types::{Address, TransactionReceipt, U256};
	use async_trait::async_trait;

	fn bot_config(max_concurrent: usize, min_delay: u64, max_delay: u64) -> BotConfig {
		BotConfig {
			id: "engine-test".into(),
			rounds: 1,
			max_concurrent,
			min_delay_seconds: min_delay,
			max_delay_seconds: max_delay,
		}
	}

	fn engine_with(
		mock: &Arc<MockDelivery>,
		config: BotConfig,
		activities: Vec<Arc<dyn Activity>>,
	) -> ActivityEngine {
		let waiter = Arc::new(ConfirmationWaiter::new(
			mock.clone(),
			Duration::from_millis(100),
		));
		let feed = PollFeed::new(Duration::from_millis(100)).start(waiter.clone());
		let context = ActivityContext::new(
			mock.clone(),
			waiter,
			Address::repeat_byte(0xac),
			Duration::from_secs(30),
		);
		ActivityEngine::new(config, context, activities, feed)
	}

	fn engine(mock: &Arc<MockDelivery>, activities: Vec<Arc<dyn Activity>>) -> ActivityEngine {
		engine_with(mock, bot_config(2, 1, 3), activities)
	}

	fn transfer(min: u64, max: u64) -> Arc<dyn Activity> {
		build_activity(&ActivityConfig::TransferNative {
			to: Address::repeat_byte(0x01),
			amount: AmountConfig { unit: 1, min, max },
		})
		.unwrap()
	}

	#[tokio::test(start_paused = true)]
	async fn test_run_completes_every_round() {
		let mock = Arc::new(MockDelivery::auto_mining());
		mock.set_native_balance(U256::from(1_000));
		let engine = engine(&mock, vec![transfer(10, 20)]);

		let summary = engine.run(4).await.unwrap();
		assert_eq!(
			summary,
			RunSummary {
				completed: 4,
				skipped: 0,
				failed: 0
			}
		);
		assert_eq!(mock.submitted().len(), 4);
		engine.shutdown().await.unwrap();
	}

	#[tokio::test(start_paused = true)]
	async fn test_run_counts_skips_and_failures() {
		let mock = Arc::new(MockDelivery::auto_mining());
		mock.set_native_balance(U256::from(5));
		let engine = engine(&mock, vec![transfer(10, 20)]);

		let summary = engine.run(2).await.unwrap();
		assert_eq!(summary.skipped, 2);
		assert!(mock.submitted().is_empty());

		mock.set_native_balance(U256::from(1_000));
		mock.revert_submission(0);
		let summary = engine.run(2).await.unwrap();
		assert_eq!(summary.completed, 1);
		assert_eq!(summary.failed, 1);
		assert_eq!(summary.total(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn test_concurrent_attempts_use_distinct_nonces() {
		let mock = Arc::new(MockDelivery::auto_mining());
		mock.set_native_balance(U256::from(1_000));
		let engine = engine_with(&mock, bot_config(2, 0, 0), vec![transfer(10, 20)]);

		let summary = engine.run(4).await.unwrap();
		assert_eq!(summary.completed, 4);

		let mut nonces: Vec<u64> = mock
			.submitted()
			.iter()
			.map(|tx| tx.nonce.unwrap())
			.collect();
		nonces.sort_unstable();
		assert_eq!(nonces, vec![0, 1, 2, 3]);
		assert!(engine.context().reserved(None).is_zero());
	}

	#[tokio::test(start_paused = true)]
	async fn test_concurrent_attempts_share_balance() {
		// Nothing is mined, so the first attempt keeps its value reserved.
		let mock = Arc::new(MockDelivery::new());
		mock.set_native_balance(U256::from(15));
		let engine = engine_with(&mock, bot_config(2, 0, 0), vec![transfer(10, 10)]);

		let summary = engine.run(2).await.unwrap();
		assert_eq!(summary.skipped, 1);
		assert_eq!(summary.failed, 1);
		assert_eq!(mock.submitted().len(), 1);
		assert!(engine.context().reserved(None).is_zero());
	}

	struct Misbehaving(ValueSupplier);

	#[async_trait]
	impl Activity for Misbehaving {
		fn name(&self) -> &'static str {
			"misbehaving"
		}

		fn supplier(&self) -> &ValueSupplier {
			&self.0
		}

		async fn spendable_balance(&self, _ctx: &ActivityContext) -> Result<U256, ActivityError> {
			Ok(U256::MAX)
		}

		async fn act(
			&self,
			_ctx: &ActivityContext,
			_value: U256,
		) -> Result<TransactionReceipt, ActivityError> {
			Err(ActivityError::Usage("act called twice".into()))
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_usage_error_aborts_run() {
		let mock = Arc::new(MockDelivery::auto_mining());
		let supplier = ValueSupplier::new(U256::from(1), U256::from(1), U256::from(2)).unwrap();
		let engine = engine(&mock, vec![Arc::new(Misbehaving(supplier))]);

		let result = engine.run(3).await;
		assert!(matches!(result, Err(EngineError::Usage(_))));
	}

	#[tokio::test(start_paused = true)]
	async fn test_stopped_feed_aborts_run() {
		let mock = Arc::new(MockDelivery::auto_mining());
		mock.set_native_balance(U256::from(1_000));
		let engine = engine(&mock, vec![transfer(10, 20)]);

		engine.feed.cancel();
		tokio::time::sleep(Duration::from_millis(10)).await;
		assert!(matches!(
			engine.run(1).await,
			Err(EngineError::FeedStopped)
		));
	}

	#[tokio::test]
	async fn test_empty_activities_rejected() {
		let mock = Arc::new(MockDelivery::auto_mining());
		let engine = engine(&mock, Vec::new());
		assert!(matches!(engine.run(1).await, Err(EngineError::Usage(_))));
	}
}

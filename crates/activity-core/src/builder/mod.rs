//! Assembly of an [`ActivityEngine`] from configuration.
//!
//! The builder takes the already connected chain access and account, builds
//! every configured activity, creates the confirmation waiter and starts the
//! chain feed selected by `[feed]`.

use crate::activity::{build_activity, ActivityContext};
use crate::engine::ActivityEngine;
use crate::feed::create_feed;
use crate::waiter::ConfirmationWaiter;
use activity_account::AccountService;
use activity_config::Config;
use activity_delivery::DeliveryInterface;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Builder for an [`ActivityEngine`].
pub struct ActivityBotBuilder {
	config: Config,
}

impl ActivityBotBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the engine and starts its chain feed.
	///
	/// Must be called from within a tokio runtime.
	pub async fn build(
		self,
		account: &AccountService,
		delivery: Arc<dyn DeliveryInterface>,
	) -> Result<ActivityEngine, BuilderError> {
		let address = account
			.get_address()
			.await
			.map_err(|e| BuilderError::MissingComponent(format!("account address: {}", e)))?;
		tracing::info!(component = "account", %address, "Loaded");

		let mut activities = Vec::with_capacity(self.config.activities.len());
		for (index, activity_config) in self.config.activities.iter().enumerate() {
			let activity = build_activity(activity_config).map_err(|e| {
				tracing::error!(
					component = "activity",
					index,
					error = %e,
					"Failed to create activity"
				);
				BuilderError::Config(format!("activities[{}]: {}", index, e))
			})?;
			tracing::info!(component = "activity", index, implementation = activity.name(), "Loaded");
			activities.push(activity);
		}
		if activities.is_empty() {
			return Err(BuilderError::MissingComponent("activities".into()));
		}

		let waiter = Arc::new(ConfirmationWaiter::new(
			delivery.clone(),
			Duration::from_millis(self.config.waiter.height_refresh_floor_ms),
		));
		let feed = create_feed(&self.config.feed, delivery.clone()).start(waiter.clone());
		tracing::info!(component = "feed", mode = ?self.config.feed.mode, "Loaded");

		let context = ActivityContext::new(
			delivery,
			waiter,
			address,
			Duration::from_secs(self.config.waiter.receipt_timeout_seconds),
		);
		Ok(ActivityEngine::new(
			self.config.bot,
			context,
			activities,
			feed,
		))
	}
}

//! Configuration module for the activity bot.
//!
//! Loads the bot configuration from a TOML file, substitutes `${VAR}` and
//! `${VAR:-default}` references from the environment, and validates every
//! section before the bot is assembled.

mod activities;

pub use activities::{ActivityConfig, AmountConfig};

use activity_types::SecretString;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message only, the error display embeds the whole input
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the activity bot.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Run-level settings.
	pub bot: BotConfig,
	/// Chain connection settings.
	pub network: NetworkConfig,
	/// How the confirmation waiter observes new blocks.
	#[serde(default)]
	pub feed: FeedConfig,
	/// Confirmation waiting settings.
	#[serde(default)]
	pub waiter: WaiterConfig,
	/// Signing account.
	pub account: AccountConfig,
	/// Activities the bot picks from on every round.
	pub activities: Vec<ActivityConfig>,
}

/// Run-level settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BotConfig {
	/// Identifier used in logs.
	pub id: String,
	/// Number of activity attempts per run.
	#[serde(default = "default_rounds")]
	pub rounds: u32,
	/// Maximum number of attempts in flight at the same time.
	#[serde(default = "default_max_concurrent")]
	pub max_concurrent: usize,
	/// Lower bound of the random pause between rounds.
	#[serde(default)]
	pub min_delay_seconds: u64,
	/// Upper bound of the random pause between rounds.
	#[serde(default)]
	pub max_delay_seconds: u64,
}

fn default_rounds() -> u32 {
	1
}

fn default_max_concurrent() -> usize {
	1
}

/// Chain connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
	/// RPC endpoint; `ws://`/`wss://` is required for the subscribe feed.
	pub rpc_url: String,
	/// Expected chain id, checked against the endpoint on startup.
	pub chain_id: u64,
}

impl NetworkConfig {
	/// Returns true if the endpoint speaks websocket and can push headers.
	pub fn supports_subscriptions(&self) -> bool {
		self.rpc_url.starts_with("ws://") || self.rpc_url.starts_with("wss://")
	}
}

/// Block observation strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedMode {
	/// Run a resolution pass on a fixed interval.
	#[default]
	Poll,
	/// Run a resolution pass for every new block header.
	Subscribe,
}

/// Feed settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedConfig {
	#[serde(default)]
	pub mode: FeedMode,
	/// Interval between poll ticks in milliseconds.
	#[serde(default = "default_poll_interval_ms")]
	pub poll_interval_ms: u64,
}

impl Default for FeedConfig {
	fn default() -> Self {
		Self {
			mode: FeedMode::default(),
			poll_interval_ms: default_poll_interval_ms(),
		}
	}
}

fn default_poll_interval_ms() -> u64 {
	1000
}

/// Confirmation waiter settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WaiterConfig {
	/// Deadline for each submitted transaction to be mined.
	#[serde(default = "default_receipt_timeout_seconds")]
	pub receipt_timeout_seconds: u64,
	/// Minimum age of the cached block height before it is fetched again.
	#[serde(default = "default_height_refresh_floor_ms")]
	pub height_refresh_floor_ms: u64,
}

impl Default for WaiterConfig {
	fn default() -> Self {
		Self {
			receipt_timeout_seconds: default_receipt_timeout_seconds(),
			height_refresh_floor_ms: default_height_refresh_floor_ms(),
		}
	}
}

fn default_receipt_timeout_seconds() -> u64 {
	30
}

fn default_height_refresh_floor_ms() -> u64 {
	1000
}

/// Signing account settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
	/// Hex encoded private key, usually injected as `${PRIVATE_KEY}`.
	pub private_key: SecretString,
}

/// Replaces `${VAR}` and `${VAR:-default}` with values from the environment.
///
/// Input is capped at 1MB to bound regex work.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut resolved = String::with_capacity(input.len());
	let mut cursor = 0;
	for cap in re.captures_iter(input) {
		let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match (std::env::var(name.as_str()), cap.get(2)) {
			(Ok(value), _) => value,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				return Err(ConfigError::Validation(format!(
					"Environment variable '{}' not found",
					name.as_str()
				)))
			},
		};
		resolved.push_str(&input[cursor..whole.start()]);
		resolved.push_str(&value);
		cursor = whole.end();
	}
	resolved.push_str(&input[cursor..]);

	Ok(resolved)
}

impl Config {
	/// Loads, resolves and validates the configuration file at `path`.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let content = tokio::fs::read_to_string(path.as_ref()).await?;
		content.parse()
	}

	/// Validates every section.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.bot.id.is_empty() {
			return Err(ConfigError::Validation("Bot ID cannot be empty".into()));
		}
		if self.bot.rounds == 0 {
			return Err(ConfigError::Validation(
				"bot.rounds must be at least 1".into(),
			));
		}
		if self.bot.max_concurrent == 0 {
			return Err(ConfigError::Validation(
				"bot.max_concurrent must be at least 1".into(),
			));
		}
		if self.bot.min_delay_seconds > self.bot.max_delay_seconds {
			return Err(ConfigError::Validation(format!(
				"bot.min_delay_seconds ({}) cannot exceed bot.max_delay_seconds ({})",
				self.bot.min_delay_seconds, self.bot.max_delay_seconds
			)));
		}

		let url = &self.network.rpc_url;
		if !["http://", "https://", "ws://", "wss://"]
			.iter()
			.any(|scheme| url.starts_with(scheme))
		{
			return Err(ConfigError::Validation(format!(
				"network.rpc_url must start with http(s):// or ws(s)://, got '{}'",
				url
			)));
		}
		if self.network.chain_id == 0 {
			return Err(ConfigError::Validation(
				"network.chain_id must be greater than 0".into(),
			));
		}

		if self.feed.mode == FeedMode::Subscribe && !self.network.supports_subscriptions() {
			return Err(ConfigError::Validation(
				"feed.mode = \"subscribe\" requires a ws:// or wss:// rpc_url".into(),
			));
		}
		if !(100..=60_000).contains(&self.feed.poll_interval_ms) {
			return Err(ConfigError::Validation(
				"feed.poll_interval_ms must be between 100 and 60000".into(),
			));
		}

		if self.waiter.receipt_timeout_seconds == 0 {
			return Err(ConfigError::Validation(
				"waiter.receipt_timeout_seconds must be greater than 0".into(),
			));
		}
		if self.waiter.receipt_timeout_seconds > 3600 {
			return Err(ConfigError::Validation(
				"waiter.receipt_timeout_seconds cannot exceed 3600 (1 hour)".into(),
			));
		}

		if self.account.private_key.is_empty() {
			return Err(ConfigError::Validation(
				"account.private_key cannot be empty".into(),
			));
		}

		if self.activities.is_empty() {
			return Err(ConfigError::Validation(
				"At least one activity must be configured".into(),
			));
		}
		for (index, activity) in self.activities.iter().enumerate() {
			activity
				.validate()
				.map_err(|e| ConfigError::Validation(format!("activities[{}]: {}", index, e)))?;
		}

		Ok(())
	}
}

/// Parses a TOML string, resolving environment variables and validating the result.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

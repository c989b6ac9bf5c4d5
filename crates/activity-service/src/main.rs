//! Main entry point for the activity bot.
//!
//! Loads the configuration, connects to the chain with the configured
//! account as wallet, and runs the configured number of activity rounds.
//! Ctrl-C stops the run; transactions already broadcast are not tracked
//! any further.

use activity_account::implementations::local::create_account;
use activity_account::AccountService;
use activity_config::Config;
use activity_core::{ActivityBotBuilder, ActivityEngine};
use activity_delivery::implementations::evm::alloy::create_delivery;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

/// Command-line arguments for the activity bot.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	/// Number of rounds to run, overriding `bot.rounds`
	#[arg(short, long)]
	rounds: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started activity bot");

	let config = Config::from_file(&args.config).await?;
	tracing::info!("Loaded configuration [{}]", config.bot.id);
	let rounds = args.rounds.unwrap_or(config.bot.rounds);

	let engine = build_engine(config).await?;

	let outcome = tokio::select! {
		result = engine.run(rounds) => result.map(|summary| {
			tracing::info!(
				completed = summary.completed,
				skipped = summary.skipped,
				failed = summary.failed,
				"Finished {} rounds",
				summary.total()
			);
		}),
		_ = tokio::signal::ctrl_c() => {
			tracing::warn!("Interrupted, stopping");
			Ok(())
		}
	};

	if let Err(e) = engine.shutdown().await {
		tracing::error!(error = %e, "Chain feed ended with an error");
	}
	tracing::info!("Stopped activity bot");
	outcome?;
	Ok(())
}

/// Connects the account and chain access and assembles the engine.
async fn build_engine(config: Config) -> Result<ActivityEngine, Box<dyn std::error::Error>> {
	let account = AccountService::new(create_account(&config.account)?);

	let delivery = create_delivery(
		&config.network.rpc_url,
		config.network.chain_id,
		&account.get_private_key(),
	)
	.await?;
	tracing::info!(
		component = "delivery",
		chain_id = config.network.chain_id,
		"Loaded"
	);

	let engine = ActivityBotBuilder::new(config)
		.build(&account, Arc::from(delivery))
		.await?;
	Ok(engine)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn test_default_args() {
		let args = Args::try_parse_from(["activity-bot"]).unwrap();
		assert_eq!(args.config, PathBuf::from("config.toml"));
		assert_eq!(args.log_level, "info");
		assert_eq!(args.rounds, None);
	}

	#[test]
	fn test_rounds_override() {
		let args = Args::try_parse_from([
			"activity-bot",
			"--config",
			"bot.toml",
			"--rounds",
			"12",
			"-l",
			"debug",
		])
		.unwrap();
		assert_eq!(args.config, PathBuf::from("bot.toml"));
		assert_eq!(args.rounds, Some(12));
		assert_eq!(args.log_level, "debug");
	}

	#[test]
	fn test_rejects_non_numeric_rounds() {
		assert!(Args::try_parse_from(["activity-bot", "--rounds", "many"]).is_err());
	}

	#[tokio::test]
	async fn test_build_fails_on_unreachable_endpoint() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(
			file,
			r#"
[bot]
id = "service-test"

[network]
rpc_url = "http://127.0.0.1:1"
chain_id = 1337

[account]
private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"

[[activities]]
type = "transfer_native"
to = "0x3654114f003C108A339664f909131b4C07b0F779"
amount = {{ unit = 1, min = 1, max = 2 }}
"#
		)
		.unwrap();

		let config = Config::from_file(file.path()).await.unwrap();
		assert!(build_engine(config).await.is_err());
	}
}

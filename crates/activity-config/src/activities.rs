//! Activity configuration entries.
//!
//! Every `[[activities]]` table is tagged by `type` and carries the static
//! parameters of one activity plus the amount range its value is drawn from.

use activity_types::Address;
use serde::{Deserialize, Serialize};

/// Amount range as `unit * min` ..= `unit * max`.
///
/// `unit` is the smallest meaningful step for the asset, e.g. 1 Gwei
/// (`1000000000`) for native value or `1` for a 6-decimals stablecoin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct AmountConfig {
	pub unit: u64,
	pub min: u64,
	pub max: u64,
}

impl AmountConfig {
	fn validate(&self) -> Result<(), String> {
		if self.unit == 0 {
			return Err("amount.unit must be greater than 0".into());
		}
		if self.min > self.max {
			return Err(format!(
				"amount.min ({}) cannot exceed amount.max ({})",
				self.min, self.max
			));
		}
		Ok(())
	}
}

/// A configured activity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivityConfig {
	/// Native value transfer to a fixed recipient.
	TransferNative { to: Address, amount: AmountConfig },
	/// Single-hop swap through a WOOFi-style router.
	///
	/// `from_token` may be the `0xEeee..EEeE` sentinel to swap native value.
	RouterSwap {
		router: Address,
		from_token: Address,
		to_token: Address,
		amount: AmountConfig,
	},
	/// Cross-chain transfer through a Stargate-style router.
	StargateBridge {
		router: Address,
		token: Address,
		src_pool_id: u64,
		dst_pool_id: u64,
		dst_chain_id: u16,
		/// Accepted slippage in basis points.
		#[serde(default = "default_slippage_bps")]
		slippage_bps: u16,
		amount: AmountConfig,
	},
	/// Cross-chain transfer of a LayerZero OFT token.
	OftBridge {
		bridge: Address,
		token: Address,
		dst_chain_id: u16,
		/// Gas forwarded to the destination chain.
		#[serde(default = "default_dst_gas")]
		dst_gas: u64,
		amount: AmountConfig,
	},
}

fn default_slippage_bps() -> u16 {
	100
}

fn default_dst_gas() -> u64 {
	250_000
}

impl ActivityConfig {
	/// Returns the amount range of the activity.
	pub fn amount(&self) -> &AmountConfig {
		match self {
			Self::TransferNative { amount, .. }
			| Self::RouterSwap { amount, .. }
			| Self::StargateBridge { amount, .. }
			| Self::OftBridge { amount, .. } => amount,
		}
	}

	pub(crate) fn validate(&self) -> Result<(), String> {
		self.amount().validate()?;
		match self {
			Self::RouterSwap {
				from_token,
				to_token,
				..
			} if from_token == to_token => Err("from_token and to_token must differ".into()),
			Self::StargateBridge { slippage_bps, .. } if *slippage_bps > 10_000 => Err(format!(
				"slippage_bps ({}) cannot exceed 10000",
				slippage_bps
			)),
			Self::OftBridge { dst_gas: 0, .. } => Err("dst_gas must be greater than 0".into()),
			_ => Ok(()),
		}
	}
}

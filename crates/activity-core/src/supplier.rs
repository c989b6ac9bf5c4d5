//! Bounded random amounts.
//!
//! A [`ValueSupplier`] draws amounts uniformly from `[min, max)` where both
//! bounds are multiples of a fixed unit. Draws come from the operating system
//! CSPRNG.

use activity_config::AmountConfig;
use alloy_primitives::U256;
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;

/// Draws attempted by [`ValueSupplier::sample_within`] before clamping.
const MAX_SAMPLE_ATTEMPTS: usize = 64;

/// Errors that can occur when building a supplier.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SupplierError {
	#[error("Invalid range: min {min} exceeds max {max}")]
	InvalidRange { min: U256, max: U256 },
	#[error("Amount overflow: {unit} * {multiplier}")]
	Overflow { unit: U256, multiplier: U256 },
}

/// Immutable amount range with a uniform sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueSupplier {
	min: U256,
	max: U256,
}

impl ValueSupplier {
	/// Creates a supplier over `[unit * min_multiplier, unit * max_multiplier)`.
	pub fn new(
		unit: U256,
		min_multiplier: U256,
		max_multiplier: U256,
	) -> Result<Self, SupplierError> {
		let scale = |multiplier: U256| {
			unit.checked_mul(multiplier)
				.ok_or(SupplierError::Overflow { unit, multiplier })
		};
		let min = scale(min_multiplier)?;
		let max = scale(max_multiplier)?;
		if min > max {
			return Err(SupplierError::InvalidRange { min, max });
		}
		Ok(Self { min, max })
	}

	/// Creates a supplier from an `[activities.amount]` table.
	pub fn from_config(amount: &AmountConfig) -> Result<Self, SupplierError> {
		Self::new(
			U256::from(amount.unit),
			U256::from(amount.min),
			U256::from(amount.max),
		)
	}

	pub fn min(&self) -> U256 {
		self.min
	}

	pub fn max(&self) -> U256 {
		self.max
	}

	/// Draws a value uniformly from `[min, max)`, or `min` when the range is empty.
	pub fn supply(&self) -> U256 {
		if self.min == self.max {
			return self.min;
		}
		self.min + uniform_below(self.max - self.min)
	}

	/// Draws a value that does not exceed `balance`.
	///
	/// Returns `None` when `balance` is below `min`. Otherwise redraws up to
	/// [`MAX_SAMPLE_ATTEMPTS`] times and falls back to `balance` itself, which
	/// then lies in `[min, max)`.
	pub fn sample_within(&self, balance: U256) -> Option<U256> {
		if balance < self.min {
			return None;
		}
		for _ in 0..MAX_SAMPLE_ATTEMPTS {
			let value = self.supply();
			if value <= balance {
				return Some(value);
			}
		}
		Some(balance)
	}
}

/// Uniform draw from `[0, bound)` by masked rejection. `bound` must be non-zero.
fn uniform_below(bound: U256) -> U256 {
	let mask = U256::MAX >> (bound.leading_zeros());
	let mut bytes = [0u8; 32];
	loop {
		OsRng.fill_bytes(&mut bytes);
		let candidate = U256::from_be_bytes(bytes) & mask;
		if candidate < bound {
			return candidate;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn gwei_supplier() -> ValueSupplier {
		ValueSupplier::new(
			U256::from(1_000_000_000u64),
			U256::from(10_000_000u64),
			U256::from(100_000_000u64),
		)
		.unwrap()
	}

	#[test]
	fn test_gwei_range_bounds() {
		let supplier = gwei_supplier();
		let min = U256::from(10u64).pow(U256::from(16));
		let max = U256::from(10u64).pow(U256::from(17));
		assert_eq!(supplier.min(), min);
		assert_eq!(supplier.max(), max);

		for _ in 0..1_000 {
			let value = supplier.supply();
			assert!(value >= min && value < max, "{} out of range", value);
		}
	}

	#[test]
	fn test_small_range_hits_every_value() {
		let supplier = ValueSupplier::new(U256::from(1), U256::from(5), U256::from(8)).unwrap();
		let mut seen = [false; 3];
		for _ in 0..1_000 {
			let value = supplier.supply().to::<u64>();
			assert!((5..8).contains(&value));
			seen[(value - 5) as usize] = true;
		}
		assert!(seen.iter().all(|s| *s));
	}

	#[test]
	fn test_empty_range_yields_min() {
		let supplier = ValueSupplier::new(U256::from(7), U256::from(3), U256::from(3)).unwrap();
		assert_eq!(supplier.supply(), U256::from(21));
	}

	#[test]
	fn test_min_above_max_rejected() {
		let result = ValueSupplier::new(U256::from(1), U256::from(9), U256::from(2));
		assert!(matches!(result, Err(SupplierError::InvalidRange { .. })));
	}

	#[test]
	fn test_overflow_rejected() {
		let result = ValueSupplier::new(U256::MAX, U256::from(1), U256::from(2));
		assert!(matches!(result, Err(SupplierError::Overflow { .. })));
	}

	#[test]
	fn test_full_width_range() {
		let supplier = ValueSupplier::new(U256::from(1), U256::ZERO, U256::MAX).unwrap();
		for _ in 0..100 {
			assert!(supplier.supply() < U256::MAX);
		}
	}

	#[test]
	fn test_sample_within_respects_balance() {
		let supplier = gwei_supplier();
		let balance = supplier.min() + U256::from(1_000u64);
		for _ in 0..100 {
			let value = supplier.sample_within(balance).unwrap();
			assert!(value >= supplier.min() && value <= balance);
		}
	}

	#[test]
	fn test_sample_within_below_min() {
		let supplier = gwei_supplier();
		assert_eq!(supplier.sample_within(supplier.min() - U256::from(1)), None);
	}

	#[test]
	fn test_from_config() {
		let supplier = ValueSupplier::from_config(&AmountConfig {
			unit: 1_000_000,
			min: 5,
			max: 20,
		})
		.unwrap();
		assert_eq!(supplier.min(), U256::from(5_000_000u64));
		assert_eq!(supplier.max(), U256::from(20_000_000u64));
	}
}

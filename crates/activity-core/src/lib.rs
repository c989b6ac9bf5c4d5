//! Core of the activity bot.
//!
//! Ties the chain feed, the confirmation waiter and the value supplier
//! together behind the activity protocol. Each attempt evaluates an activity
//! (balance check plus randomized value), then acts by submitting its
//! transactions and waiting for every one of them to be mined.

pub mod activity;
pub mod builder;
pub mod engine;
pub mod feed;
pub mod supplier;
pub mod waiter;

#[cfg(test)]
pub(crate) mod test_utils;

pub use activity::{
	build_activity, Activity, ActivityAttempt, ActivityContext, ActivityError, ActivityState, Step,
};
pub use builder::{ActivityBotBuilder, BuilderError};
pub use engine::{ActivityEngine, EngineError, RunSummary};
pub use feed::{create_feed, ChainFeed, FeedError, FeedHandle};
pub use supplier::{SupplierError, ValueSupplier};
pub use waiter::{ConfirmationWaiter, WaitError};

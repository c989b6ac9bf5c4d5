//! Header subscription feed.

use super::{ChainFeed, FeedError, FeedHandle};
use crate::waiter::ConfirmationWaiter;
use activity_delivery::DeliveryInterface;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::instrument;

/// Feed pushing every new header height into the waiter.
///
/// Losing the subscription ends the feed with an error; there is no
/// automatic fallback to polling.
pub struct SubscriptionFeed {
	delivery: Arc<dyn DeliveryInterface>,
}

impl SubscriptionFeed {
	pub fn new(delivery: Arc<dyn DeliveryInterface>) -> Self {
		Self { delivery }
	}

	#[instrument(skip_all)]
	async fn run(
		delivery: Arc<dyn DeliveryInterface>,
		waiter: Arc<ConfirmationWaiter>,
		mut stop_rx: mpsc::Receiver<()>,
	) -> Result<(), FeedError> {
		let mut heads = delivery.subscribe_blocks().await.map_err(|e| {
			tracing::error!(error = %e, "Failed to subscribe to new heads");
			FeedError::Subscription(e)
		})?;

		tracing::info!("Subscription feed started");
		loop {
			tokio::select! {
				head = heads.next() => match head {
					Some(height) => {
						tracing::trace!(height, "New head");
						waiter.observe_height(height).await;
						waiter.resolve().await;
					}
					None => {
						tracing::error!("Header subscription ended");
						return Err(FeedError::StreamEnded);
					}
				},
				_ = stop_rx.recv() => {
					tracing::info!("Subscription feed stopped");
					return Ok(());
				}
			}
		}
	}
}

impl ChainFeed for SubscriptionFeed {
	fn start(&self, waiter: Arc<ConfirmationWaiter>) -> FeedHandle {
		let delivery = self.delivery.clone();
		FeedHandle::spawn(move |stop_rx| Self::run(delivery, waiter, stop_rx))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_utils::MockDelivery;
	use std::time::Duration;

	fn setup() -> (Arc<MockDelivery>, Arc<ConfirmationWaiter>) {
		let mock = Arc::new(MockDelivery::new());
		let waiter = Arc::new(ConfirmationWaiter::new(
			mock.clone(),
			Duration::from_secs(1),
		));
		(mock, waiter)
	}

	#[tokio::test]
	async fn test_every_header_is_forwarded() {
		let (mock, waiter) = setup();
		mock.set_block_number(100);
		let heads = mock.head_sender();
		heads.unbounded_send(100).unwrap();

		let handle = SubscriptionFeed::new(mock.clone()).start(waiter.clone());
		let plus_one = waiter.wait_for_blocks(1).await.unwrap();
		let plus_three = waiter.wait_for_blocks(3).await.unwrap();

		for height in 101..=103 {
			heads.unbounded_send(height).unwrap();
		}
		tokio::time::timeout(Duration::from_secs(5), async {
			plus_one.await.unwrap();
			plus_three.await.unwrap();
		})
		.await
		.unwrap();
		assert!(waiter.last_known_height().await >= 103);

		handle.cancel();
		handle.join().await.unwrap();
	}

	#[tokio::test]
	async fn test_receipts_resolve_on_new_heads() {
		let (mock, waiter) = setup();
		let heads = mock.head_sender();
		let handle = SubscriptionFeed::new(mock.clone()).start(waiter.clone());

		let hash = MockDelivery::hash(4);
		let receiver = waiter.wait_for_transaction(hash).await;
		mock.mine(hash, true);
		heads.unbounded_send(1).unwrap();

		assert_eq!(receiver.await.unwrap().hash, hash);
		handle.cancel();
		handle.join().await.unwrap();
	}

	#[tokio::test]
	async fn test_subscribe_failure_is_fatal() {
		let (mock, waiter) = setup();
		mock.fail_subscribe();

		let handle = SubscriptionFeed::new(mock).start(waiter);
		assert!(matches!(
			handle.join().await,
			Err(FeedError::Subscription(_))
		));
	}

	#[tokio::test]
	async fn test_stream_end_is_fatal() {
		let (mock, waiter) = setup();
		let heads = mock.head_sender();
		let handle = SubscriptionFeed::new(mock).start(waiter);

		heads.unbounded_send(5).unwrap();
		drop(heads);
		assert!(matches!(handle.join().await, Err(FeedError::StreamEnded)));
	}
}

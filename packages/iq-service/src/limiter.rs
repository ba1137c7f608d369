use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Caps the number of outstanding calls. Waiters queue in FIFO order.
#[derive(Clone, Debug)]
pub struct ConcurrencyLimiter {
	semaphore: Arc<Semaphore>,
	limit: usize,
}
impl ConcurrencyLimiter {
	pub fn new(limit: usize) -> Self {
		let limit = limit.max(1);

		Self { semaphore: Arc::new(Semaphore::new(limit)), limit }
	}

	pub fn limit(&self) -> usize {
		self.limit
	}

	pub fn in_flight(&self) -> usize {
		self.limit - self.semaphore.available_permits()
	}

	/// Waits for a slot. `None` only when the limiter has been closed.
	pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
		self.semaphore.clone().acquire_owned().await.ok()
	}
}

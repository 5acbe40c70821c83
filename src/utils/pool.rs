use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// A bounded pool of background jobs sharing the tokio runtime.
///
/// Each job holds one permit for its whole duration. Closing the pool makes
/// every subsequent job resolve to `None` without running.
#[derive(Clone)]
pub struct WorkerPool {
	permits: Arc<Semaphore>,
	size: u32,
}

impl WorkerPool {
	pub fn new(size: usize) -> Self {
		let size = size.clamp(1, Semaphore::MAX_PERMITS) as u32;
		Self {
			permits: Arc::new(Semaphore::new(size as usize)),
			size,
		}
	}

	/// Spawns `job` onto the runtime once a permit is available.
	pub fn spawn<F>(&self, job: F) -> JoinHandle<Option<F::Output>>
	where
		F: Future + Send + 'static,
		F::Output: Send + 'static,
	{
		let permits = self.permits.clone();
		tokio::spawn(async move {
			let _permit = permits.acquire_owned().await.ok()?;
			Some(job.await)
		})
	}

	/// Waits for every running job to finish, then refuses new ones.
	pub async fn close(&self) {
		if let Ok(all) = self.permits.acquire_many(self.size).await {
			self.permits.close();
			drop(all);
		}
	}
}

//! Pool-mode dispatcher: independent work items, bounded concurrency.

use std::sync::Arc;

use strand_primitives::Notifier;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::exec::run_blocking;
use crate::outcome::{Completion, TaskFailure};
use crate::token::{GenerationClock, TaskId};
use crate::{DispatchError, TaskClass, spawn};


/// Configuration for a [`ThreadPool`].
#[derive(Debug, Clone)]
pub struct PoolSpec {
	pub(crate) class: TaskClass,
	pub(crate) max_workers: usize,
}

impl PoolSpec {
	/// Sets the execution class used for every task.
	#[must_use]
	pub fn class(mut self, class: TaskClass) -> Self {
		self.class = class;
		self
	}

	/// Sets how many tasks may run at once.
	///
	/// # Panics
	///
	/// Panics if `max_workers` is zero.
	#[must_use]
	pub fn max_workers(mut self, max_workers: usize) -> Self {
		assert!(max_workers > 0, "pool max_workers must be > 0");
		self.max_workers = max_workers;
		self
	}
}

impl Default for PoolSpec {
	fn default() -> Self {
		Self {
			class: TaskClass::Background,
			max_workers: 4,
		}
	}
}

struct PoolInner<R> {
	spec: PoolSpec,
	permits: Arc<Semaphore>,
	shutdown: CancellationToken,
	ids: GenerationClock,
	completed: Notifier<Completion<TaskId, R>>,
}

impl<R: Send + 'static> PoolInner<R> {
	fn finish(&self, completion: Completion<TaskId, R>) {
		tracing::trace!(task = completion.id.get(), ok = completion.is_ok(), "dispatch.complete");
		if let Err(error) = self.completed.fire(&completion) {
			tracing::debug!(task = completion.id.get(), %error, "pool.listener_failed");
		}
	}
}

/// Runs submitted work items on the blocking pool, at most
/// `max_workers` at a time, in no particular order.
///
/// Every accepted item produces exactly one [`Completion`] on
/// [`Self::completed`], fired on a worker thread.
pub struct ThreadPool<R> {
	inner: Arc<PoolInner<R>>,
}

impl<R> Clone for ThreadPool<R> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<R: Send + 'static> Default for ThreadPool<R> {
	fn default() -> Self {
		Self::new(PoolSpec::default())
	}
}

impl<R: Send + 'static> ThreadPool<R> {
	pub fn new(spec: PoolSpec) -> Self {
		Self {
			inner: Arc::new(PoolInner {
				permits: Arc::new(Semaphore::new(spec.max_workers)),
				spec,
				shutdown: CancellationToken::new(),
				ids: GenerationClock::new(),
				completed: Notifier::new(),
			}),
		}
	}

	/// Notifier fired once per finished, failed or cancelled task.
	pub fn completed(&self) -> &Notifier<Completion<TaskId, R>> {
		&self.inner.completed
	}

	/// Queues `work` for execution.
	pub fn submit<F>(&self, work: F) -> Result<TaskId, DispatchError>
	where
		F: FnOnce() -> Result<R, String> + Send + 'static,
	{
		if self.inner.shutdown.is_cancelled() {
			return Err(DispatchError::Closed);
		}
		let id = self.inner.ids.next_task();
		let class = self.inner.spec.class;
		tracing::trace!(task = id.get(), worker_class = class.as_str(), "pool.submit");

		let inner = Arc::clone(&self.inner);
		spawn(class, async move {
			let permits = Arc::clone(&inner.permits);
			let permit = tokio::select! {
				biased;
				_ = inner.shutdown.cancelled() => None,
				permit = permits.acquire_owned() => permit.ok(),
			};
			let outcome = match permit {
				Some(permit) => {
					run_blocking(class, move || {
						let _permit = permit;
						work()
					})
					.await
				}
				None => Err(TaskFailure::cancelled()),
			};
			inner.finish(Completion { id, outcome });
		});
		Ok(id)
	}

	/// Rejects new submissions and cancels every item still waiting for a worker.
	///
	/// Items already running finish normally.
	pub fn shutdown(&self) {
		if !self.inner.shutdown.is_cancelled() {
			tracing::debug!(worker_class = self.inner.spec.class.as_str(), "pool.shutdown");
		}
		self.inner.shutdown.cancel();
	}

	pub fn is_shut_down(&self) -> bool {
		self.inner.shutdown.is_cancelled()
	}

	/// Number of workers currently free.
	pub fn idle_workers(&self) -> usize {
		self.inner.permits.available_permits()
	}
}

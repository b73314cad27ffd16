//! Where dispatched work runs.
//!
//! Work goes to the ambient tokio runtime when there is one. Callers outside
//! tokio (plain threads, synchronous tests, listeners fired from UI code) get
//! a small runtime owned by this crate, built on first use.

use std::fmt;
use std::future::Future;
use std::sync::OnceLock;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;

use crate::outcome::{TaskOutcome, outcome_from_join};

/// Scheduling class of dispatched work, carried on every trace event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TaskClass {
	/// Debounced emissions, sampling and other latency-sensitive updates.
	Interactive,
	#[default]
	Background,
	/// Work expected to hold its thread for a long time.
	Blocking,
}

impl TaskClass {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Interactive => "interactive",
			Self::Background => "background",
			Self::Blocking => "blocking",
		}
	}
}

impl fmt::Display for TaskClass {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

fn dispatch_handle() -> Handle {
	static FALLBACK: OnceLock<Runtime> = OnceLock::new();
	match Handle::try_current() {
		Ok(handle) => handle,
		Err(_) => FALLBACK
			.get_or_init(|| {
				Builder::new_multi_thread()
					.enable_time()
					.worker_threads(2)
					.thread_name("strand-dispatch")
					.build()
					.expect("failed to build the strand dispatch runtime")
			})
			.handle()
			.clone(),
	}
}

/// Spawns a driver future for dispatched work.
///
/// # Panics
///
/// Panics if called outside tokio and the fallback runtime cannot be built.
pub fn spawn<F>(class: TaskClass, fut: F) -> JoinHandle<F::Output>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	tracing::trace!(worker_class = class.as_str(), "dispatch.spawn");
	dispatch_handle().spawn(fut)
}

/// Runs `work` on the blocking pool and folds its result, error or panic into
/// a [`TaskOutcome`].
pub(crate) async fn run_blocking<R, F>(class: TaskClass, work: F) -> TaskOutcome<R>
where
	F: FnOnce() -> Result<R, String> + Send + 'static,
	R: Send + 'static,
{
	tracing::trace!(worker_class = class.as_str(), "dispatch.run_blocking");
	outcome_from_join(dispatch_handle().spawn_blocking(work).await)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::TaskFailureKind;

	#[test]
	fn runs_outside_tokio_on_fallback_runtime() {
		let handle = spawn(TaskClass::Background, async { run_blocking(TaskClass::Blocking, || Ok::<_, String>(7)).await });
		let outcome = dispatch_handle().block_on(handle).unwrap();
		assert_eq!(outcome, Ok(7));
	}

	#[tokio::test]
	async fn folds_errors_and_panics() {
		let failed = run_blocking(TaskClass::Background, || Err::<(), _>("nope".to_string())).await;
		assert_eq!(failed.unwrap_err().kind(), TaskFailureKind::Error);

		let panicked = run_blocking(TaskClass::Background, || -> Result<(), String> { panic!("kaboom") }).await;
		let failure = panicked.unwrap_err();
		assert_eq!(failure.kind(), TaskFailureKind::Panicked);
		assert_eq!(failure.message(), "kaboom");
	}
}

use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of one task submitted to a [`ThreadPool`](crate::ThreadPool).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
	/// Returns the raw numeric id.
	pub const fn get(self) -> u64 {
		self.0
	}
}

/// Monotonic counter handing out task ids and pending-job generations.
#[derive(Debug, Default)]
pub(crate) struct GenerationClock {
	next: AtomicU64,
}

impl GenerationClock {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the next generation, starting at 1.
	pub fn next(&self) -> u64 {
		self.next.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
	}

	pub fn next_task(&self) -> TaskId {
		TaskId(self.next())
	}
}

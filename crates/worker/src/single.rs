//! Single-item dispatcher: per key, at most one job running and one waiting.
//!
//! Each key is in one of four states. An absent key is `Idle`.
//!
//! * `Idle` + submit: `InFlight` (no delay) or `Waiting` (delay).
//! * `Waiting` + delay elapsed: `InFlight`.
//! * `InFlight` + submit: `InFlightPending`.
//! * `InFlight` + complete: `Idle`.
//! * `InFlightPending` + complete: `InFlight` if the pending job is due,
//!   otherwise `Waiting` for the rest of its delay.
//!
//! A submission that finds a pending job replaces it; the replaced job never
//! runs. A submission that finds a running job becomes the pending job and
//! starts once the running one completes and its own delay has elapsed.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use strand_primitives::Notifier;

use crate::exec::run_blocking;
use crate::outcome::{Completion, TaskOutcome};
use crate::token::GenerationClock;
use crate::{TaskClass, spawn};

#[cfg(test)]
mod tests;

/// Work accepted by a [`SingleItemDispatcher`].
pub type Job = Box<dyn FnOnce() -> Result<(), String> + Send + 'static>;

/// Configuration for a [`SingleItemDispatcher`].
#[derive(Debug, Clone)]
pub struct DispatcherSpec {
	pub(crate) class: TaskClass,
	pub(crate) delay: Duration,
}

impl DispatcherSpec {
	/// Sets the execution class used for every job.
	#[must_use]
	pub fn class(mut self, class: TaskClass) -> Self {
		self.class = class;
		self
	}

	/// Sets the delay applied by [`SingleItemDispatcher::submit`].
	#[must_use]
	pub fn delay(mut self, delay: Duration) -> Self {
		self.delay = delay;
		self
	}
}

impl Default for DispatcherSpec {
	fn default() -> Self {
		Self {
			class: TaskClass::Interactive,
			delay: Duration::ZERO,
		}
	}
}

/// Observable per-key state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
	Idle,
	/// A job waits for its delay to elapse.
	Waiting,
	InFlight,
	/// A job runs and another waits behind it.
	InFlightPending,
}

/// What a submission did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
	/// The job started immediately.
	Started,
	/// The job is waiting for its delay.
	Scheduled,
	/// The job waits behind the running one.
	Queued,
	/// An older pending job was discarded in favor of this one.
	Replaced,
}

struct Pending {
	job: Job,
	generation: u64,
	due: Instant,
}

enum Slot {
	Waiting(Pending),
	InFlight,
	InFlightPending(Pending),
}

impl Slot {
	fn state(&self) -> SlotState {
		match self {
			Self::Waiting(_) => SlotState::Waiting,
			Self::InFlight => SlotState::InFlight,
			Self::InFlightPending(_) => SlotState::InFlightPending,
		}
	}
}

/// Follow-up action decided under the slot lock and performed after it.
enum Next {
	Start(Job),
	Arm { delay: Duration, generation: u64 },
}

struct Shared<K> {
	spec: DispatcherSpec,
	slots: Mutex<HashMap<K, Slot>>,
	generations: GenerationClock,
	completed: Notifier<Completion<K, ()>>,
}

/// Coalescing dispatcher keyed by `K`.
///
/// Completions for one key are fired in execution order and never overlap.
/// Dropping every handle stops pending timers; running jobs still complete.
pub struct SingleItemDispatcher<K> {
	shared: Arc<Shared<K>>,
}

impl<K> Clone for SingleItemDispatcher<K> {
	fn clone(&self) -> Self {
		Self {
			shared: Arc::clone(&self.shared),
		}
	}
}

impl<K> fmt::Debug for SingleItemDispatcher<K> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SingleItemDispatcher")
			.field("spec", &self.shared.spec)
			.field("active_keys", &self.shared.slots.lock().len())
			.finish()
	}
}

impl<K> Default for SingleItemDispatcher<K>
where
	K: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static,
{
	fn default() -> Self {
		Self::new(DispatcherSpec::default())
	}
}

impl<K> SingleItemDispatcher<K>
where
	K: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static,
{
	pub fn new(spec: DispatcherSpec) -> Self {
		Self {
			shared: Arc::new(Shared {
				spec,
				slots: Mutex::new(HashMap::new()),
				generations: GenerationClock::new(),
				completed: Notifier::new(),
			}),
		}
	}

	/// Notifier fired after each job finishes, before the key's next job starts.
	pub fn completed(&self) -> &Notifier<Completion<K, ()>> {
		&self.shared.completed
	}

	/// Submits `job` for `key` using the configured delay.
	pub fn submit(&self, key: K, job: impl FnOnce() -> Result<(), String> + Send + 'static) -> SubmitOutcome {
		self.submit_delayed(key, self.shared.spec.delay, job)
	}

	/// Submits `job` for `key`, to run once `delay` passes without a newer submission.
	pub fn submit_delayed(
		&self, key: K, delay: Duration, job: impl FnOnce() -> Result<(), String> + Send + 'static,
	) -> SubmitOutcome {
		let pending = Pending {
			job: Box::new(job),
			generation: self.shared.generations.next(),
			due: Instant::now() + delay,
		};
		let generation = pending.generation;

		let (outcome, next) = {
			let mut slots = self.shared.slots.lock();
			match slots.remove(&key) {
				None if delay.is_zero() => {
					slots.insert(key.clone(), Slot::InFlight);
					(SubmitOutcome::Started, Some(Next::Start(pending.job)))
				}
				None => {
					slots.insert(key.clone(), Slot::Waiting(pending));
					(SubmitOutcome::Scheduled, Some(Next::Arm { delay, generation }))
				}
				Some(Slot::Waiting(_)) if delay.is_zero() => {
					slots.insert(key.clone(), Slot::InFlight);
					(SubmitOutcome::Replaced, Some(Next::Start(pending.job)))
				}
				Some(Slot::Waiting(_)) => {
					slots.insert(key.clone(), Slot::Waiting(pending));
					(SubmitOutcome::Replaced, Some(Next::Arm { delay, generation }))
				}
				Some(Slot::InFlight) => {
					slots.insert(key.clone(), Slot::InFlightPending(pending));
					(SubmitOutcome::Queued, None)
				}
				Some(Slot::InFlightPending(_)) => {
					slots.insert(key.clone(), Slot::InFlightPending(pending));
					(SubmitOutcome::Replaced, None)
				}
			}
		};

		if outcome == SubmitOutcome::Replaced {
			tracing::trace!(key = ?key, generation, "dispatch.coalesce");
		} else {
			tracing::trace!(key = ?key, generation, outcome = ?outcome, "dispatch.submit");
		}
		if let Some(next) = next {
			Shared::run_next(&self.shared, key, next);
		}
		outcome
	}

	/// Drops the pending job for `key`, if any. Running jobs are unaffected.
	///
	/// Returns `true` when a pending job was discarded.
	pub fn cancel(&self, key: &K) -> bool {
		let mut slots = self.shared.slots.lock();
		match slots.remove(key) {
			Some(Slot::Waiting(_)) => true,
			Some(Slot::InFlightPending(_)) => {
				slots.insert(key.clone(), Slot::InFlight);
				true
			}
			Some(Slot::InFlight) => {
				slots.insert(key.clone(), Slot::InFlight);
				false
			}
			None => false,
		}
	}

	pub fn state(&self, key: &K) -> SlotState {
		self.shared.slots.lock().get(key).map_or(SlotState::Idle, Slot::state)
	}
}

impl<K> Shared<K>
where
	K: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static,
{
	fn run_next(this: &Arc<Self>, key: K, next: Next) {
		match next {
			Next::Start(job) => Self::start(this, key, job),
			Next::Arm { delay, generation } => Self::arm(this, key, delay, generation),
		}
	}

	fn start(this: &Arc<Self>, key: K, job: Job) {
		let class = this.spec.class;
		let shared = Arc::clone(this);
		spawn(class, async move {
			let outcome = run_blocking(class, job).await;
			Self::complete(&shared, key, outcome);
		});
	}

	fn arm(this: &Arc<Self>, key: K, delay: Duration, generation: u64) {
		let weak: Weak<Self> = Arc::downgrade(this);
		spawn(this.spec.class, async move {
			tokio::time::sleep(delay).await;
			if let Some(shared) = weak.upgrade() {
				Self::promote(&shared, key, generation);
			}
		});
	}

	/// Starts the waiting job for `key` if it is still the one the timer was armed for.
	fn promote(this: &Arc<Self>, key: K, generation: u64) {
		let job = {
			let mut slots = this.slots.lock();
			match slots.remove(&key) {
				Some(Slot::Waiting(pending)) if pending.generation == generation => {
					slots.insert(key.clone(), Slot::InFlight);
					Some(pending.job)
				}
				Some(other) => {
					slots.insert(key.clone(), other);
					None
				}
				None => None,
			}
		};
		if let Some(job) = job {
			Self::start(this, key, job);
		}
	}

	fn complete(this: &Arc<Self>, key: K, outcome: TaskOutcome<()>) {
		tracing::trace!(key = ?key, ok = outcome.is_ok(), "dispatch.complete");
		let completion = Completion {
			id: key.clone(),
			outcome,
		};
		if let Err(error) = this.completed.fire(&completion) {
			tracing::debug!(key = ?key, %error, "dispatch.listener_failed");
		}

		let next = {
			let mut slots = this.slots.lock();
			match slots.remove(&key) {
				Some(Slot::InFlightPending(pending)) => {
					let now = Instant::now();
					if pending.due <= now {
						slots.insert(key.clone(), Slot::InFlight);
						Some(Next::Start(pending.job))
					} else {
						let next = Next::Arm {
							delay: pending.due - now,
							generation: pending.generation,
						};
						slots.insert(key.clone(), Slot::Waiting(pending));
						Some(next)
					}
				}
				Some(Slot::Waiting(pending)) => {
					slots.insert(key.clone(), Slot::Waiting(pending));
					None
				}
				Some(Slot::InFlight) | None => None,
			}
		};
		if let Some(next) = next {
			Self::run_next(this, key, next);
		}
	}
}

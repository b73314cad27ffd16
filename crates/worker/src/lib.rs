//! Task dispatchers: a bounded pool for independent work and a coalescing
//! single-item dispatcher for "latest request wins" work such as debouncing.

mod error;
mod exec;
/// Completion and failure reporting.
pub mod outcome;
/// Pool-mode dispatcher.
pub mod pool;
/// Single-item coalescing dispatcher.
pub mod single;
mod token;

pub use error::DispatchError;
pub use exec::{TaskClass, spawn};
pub use outcome::{Completion, TaskFailure, TaskFailureKind, TaskOutcome};
pub use pool::{PoolSpec, ThreadPool};
pub use single::{DispatcherSpec, Job, SingleItemDispatcher, SlotState, SubmitOutcome};
pub use token::TaskId;

//! Completion reporting shared by the dispatchers.

use std::any::Any;
use std::fmt;

use thiserror::Error;
use tokio::task::JoinError;

/// Classification of a failed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskFailureKind {
	/// The work returned an error.
	Error,
	/// The work panicked.
	Panicked,
	/// The work was dropped before it ran.
	Cancelled,
}

impl TaskFailureKind {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Error => "error",
			Self::Panicked => "panicked",
			Self::Cancelled => "cancelled",
		}
	}
}

impl fmt::Display for TaskFailureKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Failure delivered through a dispatcher's completion notifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("task {kind}: {message}")]
pub struct TaskFailure {
	kind: TaskFailureKind,
	message: String,
}

impl TaskFailure {
	pub fn new(kind: TaskFailureKind, message: impl Into<String>) -> Self {
		Self {
			kind,
			message: message.into(),
		}
	}

	pub(crate) fn cancelled() -> Self {
		Self::new(TaskFailureKind::Cancelled, "dropped before execution")
	}

	pub fn kind(&self) -> TaskFailureKind {
		self.kind
	}

	pub fn message(&self) -> &str {
		&self.message
	}
}

/// Result of one executed task.
pub type TaskOutcome<R> = Result<R, TaskFailure>;

/// Completion event fired once per submitted task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion<Id, R> {
	pub id: Id,
	pub outcome: TaskOutcome<R>,
}

impl<Id, R> Completion<Id, R> {
	pub fn is_ok(&self) -> bool {
		self.outcome.is_ok()
	}
}

/// Extracts the panic message from a join error, or `None` if it was not a panic.
pub(crate) fn join_error_panic_message(error: JoinError) -> Option<String> {
	if !error.is_panic() {
		return None;
	}
	Some(panic_payload_message(error.into_panic()))
}

fn panic_payload_message(payload: Box<dyn Any + Send>) -> String {
	match payload.downcast::<&'static str>() {
		Ok(message) => (*message).to_string(),
		Err(payload) => match payload.downcast::<String>() {
			Ok(message) => *message,
			Err(_) => "non-string panic payload".to_string(),
		},
	}
}

/// Folds a blocking task's join result into a [`TaskOutcome`].
pub(crate) fn outcome_from_join<R>(joined: Result<Result<R, String>, JoinError>) -> TaskOutcome<R> {
	match joined {
		Ok(Ok(value)) => Ok(value),
		Ok(Err(message)) => Err(TaskFailure::new(TaskFailureKind::Error, message)),
		Err(error) if error.is_cancelled() => Err(TaskFailure::cancelled()),
		Err(error) => {
			let message = join_error_panic_message(error).unwrap_or_else(|| "join failed".to_string());
			Err(TaskFailure::new(TaskFailureKind::Panicked, message))
		}
	}
}

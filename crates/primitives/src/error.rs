//! Error types for notification dispatch.

use std::fmt;

use thiserror::Error;

/// Boxed error accepted as the source of a [`ListenerError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A listener failed while handling a fired event.
///
/// Dispatch is fail-fast: the error stops delivery to the remaining
/// listeners of that fire and propagates to whoever triggered it.
#[derive(Debug, Error)]
#[error("listener failed: {message}")]
pub struct ListenerError {
	message: String,
	#[source]
	source: Option<BoxError>,
}

impl ListenerError {
	/// Creates an error from a plain message.
	pub fn new(message: impl fmt::Display) -> Self {
		Self {
			message: message.to_string(),
			source: None,
		}
	}

	/// Wraps an underlying error, keeping it as the source.
	pub fn from_error(error: impl Into<BoxError>) -> Self {
		let source = error.into();
		Self {
			message: source.to_string(),
			source: Some(source),
		}
	}

	/// Returns the failure message.
	pub fn message(&self) -> &str {
		&self.message
	}
}

/// Result type for operations that fire notifications.
pub type Result<T, E = ListenerError> = std::result::Result<T, E>;

use thiserror::Error;

/// Submission rejected by a dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DispatchError {
	/// The dispatcher was shut down.
	#[error("dispatcher is shut down")]
	Closed,
}

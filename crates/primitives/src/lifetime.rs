use std::sync::{Arc, Weak};

/// Liveness token held by a subscription owner.
///
/// Notifiers never keep an owner alive: they hold a [`LifetimeWatch`] and
/// treat the subscription as gone once the `Lifetime` is dropped. Embed one
/// in any struct whose listeners should expire with it.
#[derive(Debug, Default)]
pub struct Lifetime {
	token: Arc<()>,
}

impl Lifetime {
	/// Creates a live token.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns a non-owning watch on this lifetime.
	pub fn watch(&self) -> LifetimeWatch {
		LifetimeWatch {
			token: Arc::downgrade(&self.token),
		}
	}

	/// Ends the lifetime, expiring every subscription registered against it.
	pub fn end(self) {}
}

/// Weak view of a [`Lifetime`].
#[derive(Debug, Clone)]
pub struct LifetimeWatch {
	token: Weak<()>,
}

impl LifetimeWatch {
	/// Returns `true` while the owning [`Lifetime`] exists.
	pub fn is_alive(&self) -> bool {
		self.token.strong_count() > 0
	}
}

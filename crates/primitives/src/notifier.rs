//! Multi-listener event dispatch.
//!
//! A [`Notifier`] broadcasts one event kind to its listeners in subscription
//! order. Dispatch runs against a snapshot of the listener list, so listeners
//! may subscribe or unsubscribe while being called without affecting the
//! fire in progress. Subscriptions end when:
//!
//! * their [`Subscription`] guard is dropped (unless detached),
//! * [`Notifier::unsubscribe`] is called with their id,
//! * the [`Lifetime`] they were registered against is dropped,
//! * the notifier itself is closed or dropped.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::Result;
use crate::lifetime::{Lifetime, LifetimeWatch};

type Callback<E> = Arc<dyn Fn(&E) -> Result<()> + Send + Sync>;

/// Identifier of one subscription within its notifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
	/// Returns the raw numeric id.
	pub const fn get(self) -> u64 {
		self.0
	}
}

struct Record<E> {
	id: SubscriptionId,
	owner: Option<LifetimeWatch>,
	callback: Callback<E>,
}

impl<E> Clone for Record<E> {
	fn clone(&self) -> Self {
		Self {
			id: self.id,
			owner: self.owner.clone(),
			callback: Arc::clone(&self.callback),
		}
	}
}

impl<E> Record<E> {
	fn is_expired(&self) -> bool {
		self.owner.as_ref().is_some_and(|owner| !owner.is_alive())
	}
}

struct Registry<E> {
	records: Vec<Record<E>>,
	closed: bool,
}

struct NotifierInner<E> {
	registry: Mutex<Registry<E>>,
	next_id: AtomicU64,
}

/// Removal hook used by type-erased [`Subscription`] guards.
trait Unsubscribe: Send + Sync {
	fn remove(&self, id: SubscriptionId);
	fn contains(&self, id: SubscriptionId) -> bool;
}

impl<E: 'static> Unsubscribe for NotifierInner<E> {
	fn remove(&self, id: SubscriptionId) {
		self.registry.lock().records.retain(|record| record.id != id);
	}

	fn contains(&self, id: SubscriptionId) -> bool {
		self.registry.lock().records.iter().any(|record| record.id == id && !record.is_expired())
	}
}

/// Broadcast channel for a single event kind.
pub struct Notifier<E> {
	inner: Arc<NotifierInner<E>>,
}

impl<E: 'static> Default for Notifier<E> {
	fn default() -> Self {
		Self::new()
	}
}

impl<E> fmt::Debug for Notifier<E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let registry = self.inner.registry.lock();
		f.debug_struct("Notifier")
			.field("listeners", &registry.records.len())
			.field("closed", &registry.closed)
			.finish()
	}
}

impl<E: 'static> Notifier<E> {
	/// Creates a notifier with no listeners.
	pub fn new() -> Self {
		Self {
			inner: Arc::new(NotifierInner {
				registry: Mutex::new(Registry {
					records: Vec::new(),
					closed: false,
				}),
				next_id: AtomicU64::new(0),
			}),
		}
	}

	/// Subscribes an infallible listener.
	///
	/// The returned guard unsubscribes when dropped.
	pub fn subscribe(&self, callback: impl Fn(&E) + Send + Sync + 'static) -> Subscription {
		self.try_subscribe(move |event| {
			callback(event);
			Ok(())
		})
	}

	/// Subscribes a listener whose failure aborts the current fire.
	pub fn try_subscribe(&self, callback: impl Fn(&E) -> Result<()> + Send + Sync + 'static) -> Subscription {
		let id = self.register(None, Arc::new(callback));
		let source: Weak<dyn Unsubscribe> = Arc::downgrade(&self.inner) as Weak<dyn Unsubscribe>;
		Subscription { id, source: Some(source) }
	}

	/// Subscribes a listener that lives as long as `owner`.
	///
	/// No guard is returned; the subscription ends when the owner's
	/// [`Lifetime`] is dropped or when [`Self::unsubscribe`] is called.
	pub fn subscribe_owned(&self, owner: &Lifetime, callback: impl Fn(&E) + Send + Sync + 'static) -> SubscriptionId {
		self.try_subscribe_owned(owner, move |event| {
			callback(event);
			Ok(())
		})
	}

	/// Fallible variant of [`Self::subscribe_owned`].
	pub fn try_subscribe_owned(
		&self, owner: &Lifetime, callback: impl Fn(&E) -> Result<()> + Send + Sync + 'static,
	) -> SubscriptionId {
		self.register(Some(owner.watch()), Arc::new(callback))
	}

	fn register(&self, owner: Option<LifetimeWatch>, callback: Callback<E>) -> SubscriptionId {
		let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
		let mut registry = self.inner.registry.lock();
		assert!(!registry.closed, "subscribe on a closed notifier");
		registry.records.push(Record { id, owner, callback });
		id
	}

	/// Removes a subscription. Unknown or already removed ids are ignored.
	pub fn unsubscribe(&self, id: SubscriptionId) {
		self.inner.remove(id);
	}

	/// Dispatches `event` to every listener subscribed when the fire began.
	///
	/// Listeners whose owner has been dropped are skipped and pruned. The
	/// first listener error stops dispatch and is returned.
	pub fn fire(&self, event: &E) -> Result<()> {
		let snapshot = self.inner.registry.lock().records.clone();
		if snapshot.is_empty() {
			return Ok(());
		}
		tracing::trace!(listeners = snapshot.len(), "notify.fire");

		let mut expired = false;
		let mut outcome = Ok(());
		for record in &snapshot {
			if record.is_expired() {
				expired = true;
				continue;
			}
			if let Err(error) = (record.callback)(event) {
				tracing::debug!(subscription = record.id.0, %error, "notify.listener_failed");
				outcome = Err(error);
				break;
			}
		}

		if expired {
			self.prune();
		}
		outcome
	}

	/// Returns the number of live listeners, pruning expired owners.
	pub fn listener_count(&self) -> usize {
		self.prune();
		self.inner.registry.lock().records.len()
	}

	/// Returns `true` when the notifier has been closed.
	pub fn is_closed(&self) -> bool {
		self.inner.registry.lock().closed
	}

	/// Drops every subscription and rejects new ones.
	pub fn close(&self) {
		let dropped = {
			let mut registry = self.inner.registry.lock();
			registry.closed = true;
			std::mem::take(&mut registry.records)
		};
		tracing::trace!(dropped = dropped.len(), "notify.close");
	}

	fn prune(&self) {
		let mut registry = self.inner.registry.lock();
		let before = registry.records.len();
		registry.records.retain(|record| !record.is_expired());
		let pruned = before - registry.records.len();
		if pruned > 0 {
			tracing::trace!(pruned, "notify.prune");
		}
	}
}

/// Guard for one notifier subscription.
///
/// Dropping the guard unsubscribes. Once the notifier is gone the guard is
/// inert.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
	id: SubscriptionId,
	source: Option<Weak<dyn Unsubscribe>>,
}

impl fmt::Debug for Subscription {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Subscription").field("id", &self.id).field("active", &self.is_active()).finish()
	}
}

impl Subscription {
	/// Returns the subscription id.
	pub fn id(&self) -> SubscriptionId {
		self.id
	}

	/// Returns `true` while the notifier still delivers to this subscription.
	pub fn is_active(&self) -> bool {
		self.source
			.as_ref()
			.and_then(Weak::upgrade)
			.is_some_and(|source| source.contains(self.id))
	}

	/// Keeps the subscription alive past the guard.
	///
	/// It then lasts until [`Notifier::unsubscribe`] or until the notifier is
	/// closed or dropped.
	pub fn detach(mut self) -> SubscriptionId {
		self.source = None;
		self.id
	}

	/// Unsubscribes now. Equivalent to dropping the guard.
	pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		if let Some(source) = self.source.take().and_then(|source| source.upgrade()) {
			source.remove(self.id);
		}
	}
}

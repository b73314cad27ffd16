use std::sync::Arc;

use parking_lot::Mutex;
use strand_primitives::{Observe, Result, Subscription};

use crate::stream::{Connection, Emitter, Stream};

impl<T: Clone + PartialEq + Send + Sync + 'static> Stream<T> {
	/// Stream of one named property of an observable entity.
	///
	/// Follows `property_changed` events for `name`, emitting only when the
	/// value differs from the last one emitted. Events carrying no value are
	/// skipped.
	pub fn from_property<S>(source: Arc<S>, name: &'static str) -> Stream<T>
	where
		S: Observe<T> + Send + Sync + 'static,
	{
		Self::follow_property(&Stream::constant(source), name)
	}

	/// Stream of one named property of whichever entity `sources` currently holds.
	///
	/// When `sources` produces a new entity the stream drops its subscription
	/// to the previous one, subscribes to the new one and emits the new
	/// entity's value of `name` if it differs.
	pub fn follow_property<S>(sources: &Stream<Arc<S>>, name: &'static str) -> Stream<T>
	where
		S: Observe<T> + Send + Sync + 'static,
	{
		let pull = {
			let sources = sources.clone();
			move || sources.current().and_then(|source| source.property(name))
		};
		let sources = sources.clone();
		Stream::derived(pull, move |emitter| {
			let follower = Arc::new(PropertyFollower {
				name,
				emitter,
				last: Mutex::new(None),
				watched: Mutex::new(None),
			});
			if let Some(source) = sources.current() {
				follower.watch(&source);
				*follower.last.lock() = source.property(name);
			}

			let switcher = Arc::clone(&follower);
			let subscription = sources.try_listen(move |source| {
				switcher.watch(source);
				switcher.offer(source.property(name))
			});
			tracing::trace!(property = name, "stream.follow_property");
			Connection::default().subscription(subscription).on_close(move || {
				follower.watched.lock().take();
			})
		})
	}
}

/// Connected state of a property-following stream.
struct PropertyFollower<T> {
	name: &'static str,
	emitter: Emitter<T>,
	last: Mutex<Option<T>>,
	/// Subscription to the entity currently followed.
	watched: Mutex<Option<Subscription>>,
}

impl<T: Clone + PartialEq + Send + Sync + 'static> PropertyFollower<T> {
	fn watch<S>(self: &Arc<Self>, source: &Arc<S>)
	where
		S: Observe<T> + Send + Sync + 'static,
	{
		let follower = Arc::downgrade(self);
		let name = self.name;
		let subscription = source.observable().property_changed().try_subscribe(move |event| {
			match (follower.upgrade(), &event.value) {
				(Some(follower), Some(value)) if event.name == name => follower.offer(Some(value.clone())),
				_ => Ok(()),
			}
		});
		let previous = self.watched.lock().replace(subscription);
		drop(previous);
	}

	fn offer(&self, value: Option<T>) -> Result<()> {
		let Some(value) = value else {
			return Ok(());
		};
		{
			let mut last = self.last.lock();
			if last.as_ref() == Some(&value) {
				return Ok(());
			}
			*last = Some(value.clone());
		}
		self.emitter.emit(value)
	}
}

use std::any::Any;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};
use strand_primitives::{ListenerError, Notifier, Result, Subscription};

type Pull<T> = Box<dyn Fn() -> Option<T> + Send + Sync>;
type Connect<T> = Box<dyn Fn(Emitter<T>) -> Connection + Send + Sync>;

/// Upstream resources held while a stream is connected.
///
/// Dropping it unsubscribes from every upstream and runs the cleanups.
#[derive(Default)]
pub(crate) struct Connection {
	subscriptions: Vec<Subscription>,
	cleanups: Vec<Box<dyn FnOnce() + Send>>,
	retained: Vec<Arc<dyn Any + Send + Sync>>,
}

impl Connection {
	pub fn subscription(mut self, subscription: Subscription) -> Self {
		self.subscriptions.push(subscription);
		self
	}

	pub fn on_close(mut self, cleanup: impl FnOnce() + Send + 'static) -> Self {
		self.cleanups.push(Box::new(cleanup));
		self
	}

	/// Keeps `handle` alive for as long as the connection lasts.
	pub fn retain(mut self, handle: impl Any + Send + Sync) -> Self {
		self.retained.push(Arc::new(handle));
		self
	}
}

impl Drop for Connection {
	fn drop(&mut self) {
		self.subscriptions.clear();
		for cleanup in self.cleanups.drain(..) {
			cleanup();
		}
		self.retained.clear();
	}
}

enum Phase {
	Cold,
	Hot(Connection),
	Closed,
}

struct StreamInner<T> {
	value: Mutex<Option<T>>,
	/// Held across caching plus broadcast, and across a new subscriber's
	/// registration plus initial delivery, so neither interleaves with the other.
	delivery: ReentrantMutex<()>,
	notifier: Notifier<T>,
	phase: Mutex<Phase>,
	pull: Option<Pull<T>>,
	connect: Option<Connect<T>>,
}

/// Weak write handle given to a stream's upstream listeners.
pub(crate) struct Emitter<T> {
	inner: Weak<StreamInner<T>>,
}

impl<T> Clone for Emitter<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Weak::clone(&self.inner),
		}
	}
}

impl<T: Clone + Send + Sync + 'static> Emitter<T> {
	/// Caches and broadcasts `value`. A dropped or closed stream ignores it.
	pub fn emit(&self, value: T) -> Result<()> {
		match self.inner.upgrade() {
			Some(inner) => inner.emit(value),
			None => Ok(()),
		}
	}
}

impl<T: Clone + Send + Sync + 'static> StreamInner<T> {
	fn emit(&self, value: T) -> Result<()> {
		let _delivery = self.delivery.lock();
		if matches!(*self.phase.lock(), Phase::Closed) {
			return Ok(());
		}
		*self.value.lock() = Some(value.clone());
		self.notifier.fire(&value)
	}
}

/// Shared handle to a push-based value stream.
///
/// Cloning yields another handle to the same stream. The stream is released,
/// along with its upstream subscriptions, when the last handle drops.
pub struct Stream<T> {
	inner: Arc<StreamInner<T>>,
}

impl<T> Clone for Stream<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<T: fmt::Debug> fmt::Debug for Stream<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let phase = match *self.inner.phase.lock() {
			Phase::Cold => "cold",
			Phase::Hot(_) => "hot",
			Phase::Closed => "closed",
		};
		f.debug_struct("Stream")
			.field("value", &*self.inner.value.lock())
			.field("phase", &phase)
			.finish()
	}
}

impl<T: Clone + Send + Sync + 'static> Stream<T> {
	fn from_parts(value: Option<T>, phase: Phase, pull: Option<Pull<T>>, connect: Option<Connect<T>>) -> Self {
		Self {
			inner: Arc::new(StreamInner {
				value: Mutex::new(value),
				delivery: ReentrantMutex::new(()),
				notifier: Notifier::new(),
				phase: Mutex::new(phase),
				pull,
				connect,
			}),
		}
	}

	/// A stream whose value never changes.
	pub fn constant(value: T) -> Self {
		Self::from_parts(Some(value), Phase::Cold, None, None)
	}

	/// A lazily connected stream.
	///
	/// `pull` computes the current value while disconnected. `connect` runs on
	/// the first subscription and returns the upstream resources to hold.
	pub(crate) fn derived(
		pull: impl Fn() -> Option<T> + Send + Sync + 'static,
		connect: impl Fn(Emitter<T>) -> Connection + Send + Sync + 'static,
	) -> Self {
		Self::from_parts(None, Phase::Cold, Some(Box::new(pull)), Some(Box::new(connect)))
	}

	/// A stream fed directly through its emitter, connected from the start.
	pub(crate) fn eager(initial: Option<T>) -> Self {
		Self::from_parts(initial, Phase::Hot(Connection::default()), None, None)
	}

	pub(crate) fn emitter(&self) -> Emitter<T> {
		Emitter {
			inner: Arc::downgrade(&self.inner),
		}
	}

	/// Installs the upstream resources of an eager stream.
	pub(crate) fn attach(&self, connection: Connection) {
		let mut phase = self.inner.phase.lock();
		if matches!(*phase, Phase::Closed) {
			return;
		}
		*phase = Phase::Hot(connection);
	}

	/// Latest value, or `None` if nothing has been produced yet.
	pub fn current(&self) -> Option<T> {
		if matches!(*self.inner.phase.lock(), Phase::Cold)
			&& let Some(pull) = &self.inner.pull
		{
			return pull();
		}
		self.inner.value.lock().clone()
	}

	/// Returns `true` while the stream holds upstream subscriptions.
	pub fn is_connected(&self) -> bool {
		matches!(*self.inner.phase.lock(), Phase::Hot(_))
	}

	pub fn is_closed(&self) -> bool {
		matches!(*self.inner.phase.lock(), Phase::Closed)
	}

	/// Number of listeners currently attached.
	pub fn listener_count(&self) -> usize {
		self.inner.notifier.listener_count()
	}

	/// Delivers the current value, if any, then every later value.
	///
	/// A value produced concurrently is delivered after the current one, never
	/// before it or instead of it.
	pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
		self.connect();
		let callback = Arc::new(callback);
		let _delivery = self.inner.delivery.lock();
		let subscription = self.inner.notifier.subscribe({
			let callback = Arc::clone(&callback);
			move |value| callback(value)
		});
		if let Some(value) = self.current() {
			callback(&value);
		}
		subscription
	}

	/// Fallible variant of [`Self::subscribe`]; an error from the initial
	/// delivery is returned and no subscription is made.
	pub fn try_subscribe(
		&self, callback: impl Fn(&T) -> Result<()> + Send + Sync + 'static,
	) -> Result<Subscription> {
		self.connect();
		let callback = Arc::new(callback);
		let _delivery = self.inner.delivery.lock();
		let subscription = self.inner.notifier.try_subscribe({
			let callback = Arc::clone(&callback);
			move |value| callback(value)
		});
		if let Some(value) = self.current() {
			callback(&value)?;
		}
		Ok(subscription)
	}

	/// Delivers only values produced after this call.
	pub fn listen(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
		self.connect();
		self.inner.notifier.subscribe(callback)
	}

	/// Fallible variant of [`Self::listen`]; listener errors propagate to the producer.
	pub fn try_listen(&self, callback: impl Fn(&T) -> Result<()> + Send + Sync + 'static) -> Subscription {
		self.connect();
		self.inner.notifier.try_subscribe(callback)
	}

	fn connect(&self) {
		let Some(connect) = &self.inner.connect else {
			return;
		};
		let mut phase = self.inner.phase.lock();
		if !matches!(*phase, Phase::Cold) {
			return;
		}
		let seed = self.inner.pull.as_ref().and_then(|pull| pull());
		*self.inner.value.lock() = seed;
		let connection = connect(self.emitter());
		tracing::trace!(upstreams = connection.subscriptions.len(), "stream.connect");
		*phase = Phase::Hot(connection);
	}

	/// Releases upstream subscriptions and stops producing values.
	///
	/// The last value stays readable through [`Self::current`]. Idempotent.
	pub fn close(&self) {
		let previous = {
			let mut phase = self.inner.phase.lock();
			if matches!(*phase, Phase::Closed) {
				return;
			}
			if matches!(*phase, Phase::Cold)
				&& let Some(pull) = &self.inner.pull
			{
				*self.inner.value.lock() = pull();
			}
			std::mem::replace(&mut *phase, Phase::Closed)
		};
		tracing::trace!(connected = matches!(previous, Phase::Hot(_)), "stream.close");
		drop(previous);
	}
}

/// Source stream written to directly.
///
/// Dereferences to the underlying [`Stream`] for reading and subscribing.
pub struct ValueStream<T> {
	stream: Stream<T>,
}

impl<T: Clone + Send + Sync + 'static> Default for ValueStream<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: Clone + Send + Sync + 'static> ValueStream<T> {
	/// Creates a stream with no value.
	pub fn new() -> Self {
		Self {
			stream: Stream::eager(None),
		}
	}

	/// Creates a stream holding `value`.
	pub fn with_value(value: T) -> Self {
		Self {
			stream: Stream::eager(Some(value)),
		}
	}

	/// Stores and broadcasts `value`, even if it equals the current one.
	pub fn send_value(&self, value: T) -> Result<()> {
		self.stream.inner.emit(value)
	}

	/// Returns a handle to the stream itself.
	pub fn stream(&self) -> Stream<T> {
		self.stream.clone()
	}
}

impl<T: Clone + PartialEq + Send + Sync + 'static> ValueStream<T> {
	/// Stores and broadcasts `value` only when it differs from the current one.
	///
	/// Returns whether it was broadcast.
	pub fn set_value(&self, value: T) -> std::result::Result<bool, ListenerError> {
		if self.stream.current().as_ref() == Some(&value) {
			return Ok(false);
		}
		self.send_value(value)?;
		Ok(true)
	}
}

impl<T> Deref for ValueStream<T> {
	type Target = Stream<T>;

	fn deref(&self) -> &Stream<T> {
		&self.stream
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use pretty_assertions::assert_eq;

	use super::*;

	fn recorder<T: Clone + Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl Fn(&T) + Send + Sync + 'static) {
		let seen = Arc::new(Mutex::new(Vec::new()));
		let sink = Arc::clone(&seen);
		(seen, move |value: &T| sink.lock().push(value.clone()))
	}

	#[test]
	fn subscribe_delivers_current_first() {
		let source = ValueStream::with_value(1);
		let (seen, record) = recorder();
		let _sub = source.subscribe(record);
		source.send_value(2).unwrap();
		assert_eq!(*seen.lock(), vec![1, 2]);
	}

	#[test]
	fn listen_skips_current() {
		let source = ValueStream::with_value(1);
		let (seen, record) = recorder();
		let _sub = source.listen(record);
		source.send_value(2).unwrap();
		assert_eq!(*seen.lock(), vec![2]);
	}

	#[test]
	fn empty_stream_has_no_current() {
		let source = ValueStream::<u8>::new();
		let (seen, record) = recorder();
		let _sub = source.subscribe(record);
		assert_eq!(source.current(), None);
		assert!(seen.lock().is_empty());
	}

	#[test]
	fn set_value_fires_only_on_change() {
		let source = ValueStream::with_value("a");
		let (seen, record) = recorder();
		let _sub = source.listen(record);
		assert!(!source.set_value("a").unwrap());
		assert!(source.set_value("b").unwrap());
		source.send_value("b").unwrap();
		assert_eq!(*seen.lock(), vec!["b", "b"]);
	}

	#[test]
	fn constant_never_changes() {
		let stream = Stream::constant(42);
		let (seen, record) = recorder();
		let _sub = stream.subscribe(record);
		assert_eq!(stream.current(), Some(42));
		assert_eq!(*seen.lock(), vec![42]);
	}

	#[test]
	fn closed_stream_ignores_values_and_close_is_idempotent() {
		let source = ValueStream::with_value(1);
		let hits = Arc::new(AtomicUsize::new(0));
		let counter = Arc::clone(&hits);
		let _sub = source.listen(move |_| {
			counter.fetch_add(1, Ordering::SeqCst);
		});
		source.close();
		source.close();
		assert!(source.is_closed());
		source.send_value(2).unwrap();
		assert_eq!(hits.load(Ordering::SeqCst), 0);
		assert_eq!(source.current(), Some(1));
	}

	#[test]
	fn listener_error_reaches_producer() {
		let source = ValueStream::new();
		let _sub = source.try_listen(|v: &i32| if *v < 0 { Err(ListenerError::new("negative")) } else { Ok(()) });
		assert!(source.send_value(1).is_ok());
		assert_eq!(source.send_value(-1).unwrap_err().message(), "negative");
	}

	#[test]
	fn late_subscriber_ends_on_the_latest_value() {
		for _ in 0..50 {
			let source = Arc::new(ValueStream::with_value(0u32));
			let producer = {
				let source = Arc::clone(&source);
				std::thread::spawn(move || {
					for value in 1..=200 {
						source.send_value(value).unwrap();
					}
				})
			};
			let (seen, record) = recorder();
			let _sub = source.subscribe(record);
			producer.join().unwrap();

			let seen = seen.lock();
			assert_eq!(seen.last().copied(), source.current());
			assert!(seen.windows(2).all(|pair| pair[0] < pair[1]), "out of order: {seen:?}");
		}
	}

	#[test]
	fn try_subscribe_rejects_failing_initial_delivery() {
		let source = ValueStream::with_value(-5);
		let result = source.try_subscribe(|v: &i32| if *v < 0 { Err(ListenerError::new("negative")) } else { Ok(()) });
		assert!(result.is_err());
		assert_eq!(source.listener_count(), 0);
	}
}

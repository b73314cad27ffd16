use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use strand_worker::{DispatcherSpec, SingleItemDispatcher, TaskClass};

use crate::stream::{Connection, Stream};

static NEXT_KEY: AtomicU64 = AtomicU64::new(0);

/// Process-wide dispatcher used by [`Stream::debounce`].
pub fn default_dispatcher() -> &'static SingleItemDispatcher<u64> {
	static DISPATCHER: OnceLock<SingleItemDispatcher<u64>> = OnceLock::new();
	DISPATCHER.get_or_init(|| SingleItemDispatcher::new(DispatcherSpec::default().class(TaskClass::Interactive)))
}

impl<T: Clone + Send + Sync + 'static> Stream<T> {
	/// Emits the latest upstream value once `delay` passes without another one.
	///
	/// Unlike the other combinators this connects immediately. Uses
	/// [`default_dispatcher`].
	pub fn debounce(&self, delay: Duration) -> Stream<T> {
		self.debounce_on(delay, default_dispatcher())
	}

	/// [`Self::debounce`] scheduled on a caller-provided dispatcher.
	///
	/// Closing or dropping the returned stream cancels a pending emission.
	pub fn debounce_on(&self, delay: Duration, dispatcher: &SingleItemDispatcher<u64>) -> Stream<T> {
		let key = NEXT_KEY.fetch_add(1, Ordering::Relaxed);
		let debounced = Stream::eager(self.current());

		let emitter = debounced.emitter();
		let scheduler = dispatcher.clone();
		let subscription = self.listen(move |value| {
			let emitter = emitter.clone();
			let value = value.clone();
			scheduler.submit_delayed(key, delay, move || emitter.emit(value).map_err(|error| error.to_string()));
		});

		let canceller = dispatcher.clone();
		debounced.attach(
			Connection::default()
				.subscription(subscription)
				.on_close(move || {
					canceller.cancel(&key);
				})
				.retain(self.clone()),
		);
		debounced
	}
}

#[cfg(test)]
mod tests {
	use std::sync::mpsc;

	use super::*;
	use crate::ValueStream;

	#[test]
	fn emits_only_the_last_value_of_a_burst() {
		let source = ValueStream::with_value(0);
		let debounced = source.debounce(Duration::from_millis(100));
		assert_eq!(debounced.current(), Some(0));

		let (tx, rx) = mpsc::channel();
		let _sub = debounced.listen(move |value| {
			let _ = tx.send(*value);
		});
		for value in [1, 2, 3] {
			source.send_value(value).unwrap();
		}
		std::thread::sleep(Duration::from_millis(300));

		assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![3]);
		assert_eq!(debounced.current(), Some(3));
	}

	#[test]
	fn is_connected_without_subscribers() {
		let source = ValueStream::with_value(1);
		let debounced = source.debounce(Duration::from_millis(20));
		assert!(debounced.is_connected());
		assert_eq!(source.listener_count(), 1);

		source.send_value(2).unwrap();
		let deadline = std::time::Instant::now() + Duration::from_secs(5);
		while debounced.current() != Some(2) {
			assert!(std::time::Instant::now() < deadline, "debounced value never arrived");
			std::thread::sleep(Duration::from_millis(5));
		}
	}

	#[test]
	fn close_cancels_pending_emission() {
		let dispatcher = SingleItemDispatcher::default();
		let source = ValueStream::with_value(1);
		let debounced = source.debounce_on(Duration::from_millis(50), &dispatcher);
		let (tx, rx) = mpsc::channel();
		let _sub = debounced.listen(move |value| {
			let _ = tx.send(*value);
		});

		source.send_value(2).unwrap();
		debounced.close();
		assert_eq!(source.listener_count(), 0);
		assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
		assert_eq!(debounced.current(), Some(1));
	}
}

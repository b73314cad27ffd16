use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use strand_worker::{TaskClass, spawn};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::stream::{Connection, Stream};

impl<T: Clone + Send + Sync + 'static> Stream<T> {
	/// Emits the latest upstream value every `period`, skipping periods in
	/// which the upstream produced nothing.
	///
	/// # Panics
	///
	/// Panics if `period` is zero.
	pub fn sample(&self, period: Duration) -> Stream<T> {
		assert!(!period.is_zero(), "sample period must be > 0");
		let pull = {
			let upstream = self.clone();
			move || upstream.current()
		};
		let upstream = self.clone();
		Stream::derived(pull, move |emitter| {
			let latest: Arc<Mutex<Option<T>>> = Arc::default();
			let sink = Arc::clone(&latest);
			let subscription = upstream.listen(move |value| {
				*sink.lock() = Some(value.clone());
			});

			let cancel = CancellationToken::new();
			let task_cancel = cancel.clone();
			spawn(TaskClass::Interactive, async move {
				let mut ticker = tokio::time::interval(period);
				ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
				ticker.tick().await;
				loop {
					tokio::select! {
						_ = task_cancel.cancelled() => break,
						_ = ticker.tick() => {
							let next = latest.lock().take();
							if let Some(value) = next
								&& let Err(error) = emitter.emit(value)
							{
								tracing::debug!(%error, "stream.sample_listener_failed");
							}
						}
					}
				}
			});

			Connection::default().subscription(subscription).on_close(move || cancel.cancel())
		})
	}
}

#[cfg(test)]
mod tests {
	use std::sync::mpsc;

	use super::*;
	use crate::ValueStream;

	#[tokio::test(flavor = "multi_thread")]
	async fn samples_latest_value_per_period() {
		let source = ValueStream::with_value(0);
		let sampled = source.sample(Duration::from_millis(50));
		assert_eq!(sampled.current(), Some(0));

		let (tx, rx) = mpsc::channel();
		let _sub = sampled.listen(move |value| {
			let _ = tx.send(*value);
		});
		source.send_value(1).unwrap();
		source.send_value(2).unwrap();
		tokio::time::sleep(Duration::from_millis(120)).await;
		source.send_value(3).unwrap();
		tokio::time::sleep(Duration::from_millis(120)).await;

		assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![2, 3]);
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn quiet_upstream_produces_nothing() {
		let source = ValueStream::with_value(7);
		let sampled = source.sample(Duration::from_millis(20));
		let (tx, rx) = mpsc::channel::<i32>();
		let _sub = sampled.listen(move |value| {
			let _ = tx.send(*value);
		});
		tokio::time::sleep(Duration::from_millis(100)).await;
		assert!(rx.try_recv().is_err());

		sampled.close();
		assert_eq!(source.listener_count(), 0);
	}
}

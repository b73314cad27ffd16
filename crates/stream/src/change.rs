//! Value changes grouped into begin/change/end transactions.
//!
//! A [`ValueChangeStream`] wraps a value stream and reports its changes only
//! between [`ValueChangeStream::begin`] and [`ValueChangeStream::end`], such
//! as the span of a slider drag. A [`ValueChangeReactor`] consumes those
//! reports from async code.

use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use strand_primitives::{Result, Subscription};
use strand_worker::{TaskClass, spawn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::stream::{Connection, Emitter, Stream};

/// Position of a report within its transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueChangeKind {
	Begin,
	Change,
	End,
}

/// One report of a [`ValueChangeStream`], carrying the wrapped value at that point.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueChange<T> {
	pub kind: ValueChangeKind,
	pub value: Option<T>,
}

impl<T> ValueChange<T> {
	pub fn is_begin(&self) -> bool {
		self.kind == ValueChangeKind::Begin
	}

	pub fn is_end(&self) -> bool {
		self.kind == ValueChangeKind::End
	}
}

/// Stream of [`ValueChange`] reports over a wrapped value stream.
///
/// Changes of the wrapped stream outside a transaction are not reported.
/// Dereferences to the report stream.
pub struct ValueChangeStream<T> {
	reports: Stream<ValueChange<T>>,
	values: Stream<T>,
	emitter: Emitter<ValueChange<T>>,
	active: Arc<AtomicBool>,
}

impl<T: Clone + Send + Sync + 'static> ValueChangeStream<T> {
	pub fn new(values: &Stream<T>) -> Self {
		let reports = Stream::eager(None);
		let emitter = reports.emitter();
		let active = Arc::new(AtomicBool::new(false));

		let forward = emitter.clone();
		let gate = Arc::clone(&active);
		let subscription = values.try_listen(move |value| {
			if !gate.load(Ordering::Acquire) {
				return Ok(());
			}
			forward.emit(ValueChange {
				kind: ValueChangeKind::Change,
				value: Some(value.clone()),
			})
		});
		reports.attach(Connection::default().subscription(subscription));

		Self {
			reports,
			values: values.clone(),
			emitter,
			active,
		}
	}

	/// Opens a transaction and reports its start.
	pub fn begin(&self) -> Result<()> {
		self.active.store(true, Ordering::Release);
		tracing::trace!("stream.change_begin");
		self.report(ValueChangeKind::Begin)
	}

	/// Reports the end of the transaction and closes it.
	pub fn end(&self) -> Result<()> {
		let reported = self.report(ValueChangeKind::End);
		self.active.store(false, Ordering::Release);
		tracing::trace!("stream.change_end");
		reported
	}

	/// Returns `true` between [`Self::begin`] and [`Self::end`].
	pub fn is_active(&self) -> bool {
		self.active.load(Ordering::Acquire)
	}

	/// Returns a handle to the report stream.
	pub fn stream(&self) -> Stream<ValueChange<T>> {
		self.reports.clone()
	}

	fn report(&self, kind: ValueChangeKind) -> Result<()> {
		self.emitter.emit(ValueChange {
			kind,
			value: self.values.current(),
		})
	}
}

impl<T> Deref for ValueChangeStream<T> {
	type Target = Stream<ValueChange<T>>;

	fn deref(&self) -> &Stream<ValueChange<T>> {
		&self.reports
	}
}

/// Async consumer of [`ValueChange`] reports.
///
/// Reports are queued from the moment the reactor is created. The queue ends
/// once the report stream is gone.
pub struct ValueChangeReactor<T> {
	queue: mpsc::UnboundedReceiver<ValueChange<T>>,
	_subscription: Subscription,
}

impl<T: Clone + Send + Sync + 'static> ValueChangeReactor<T> {
	pub fn new(reports: &Stream<ValueChange<T>>) -> Self {
		let (tx, queue) = mpsc::unbounded_channel();
		let subscription = reports.listen(move |change| {
			let _ = tx.send(change.clone());
		});
		Self {
			queue,
			_subscription: subscription,
		}
	}

	/// Waits for the next transaction to open, skipping anything before it.
	///
	/// Returns `false` if the reports ended first.
	pub async fn begin(&mut self) -> bool {
		while let Some(change) = self.queue.recv().await {
			if change.is_begin() {
				return true;
			}
		}
		false
	}

	/// Next queued report, or `None` once the reports ended.
	pub async fn next_value_change(&mut self) -> Option<ValueChange<T>> {
		self.queue.recv().await
	}

	/// Runs `body` with this reactor on the dispatch runtime.
	///
	/// The task is aborted when the returned handle drops.
	pub fn run<F, Fut>(self, body: F) -> ReactorTask
	where
		F: FnOnce(Self) -> Fut,
		Fut: Future<Output = ()> + Send + 'static,
	{
		ReactorTask {
			handle: spawn(TaskClass::Interactive, body(self)),
		}
	}
}

/// Running reactor body started by [`ValueChangeReactor::run`].
#[derive(Debug)]
pub struct ReactorTask {
	handle: JoinHandle<()>,
}

impl ReactorTask {
	pub fn is_finished(&self) -> bool {
		self.handle.is_finished()
	}
}

impl Drop for ReactorTask {
	fn drop(&mut self) {
		self.handle.abort();
	}
}

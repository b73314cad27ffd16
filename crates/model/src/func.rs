use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use strand_primitives::{Observable, Observe, Subscription};
use strand_stream::Stream;
use strand_worker::{DispatcherSpec, SingleItemDispatcher, TaskClass};

use crate::PropertyModel;

/// Deferred computation of a model value.
pub type ValueFn<T> = Arc<dyn Fn() -> T + Send + Sync>;

static NEXT_KEY: AtomicU64 = AtomicU64::new(0);

/// Process-wide dispatcher used by [`FuncStreamValueModel::new`].
pub fn evaluation_dispatcher() -> &'static SingleItemDispatcher<u64> {
	static DISPATCHER: OnceLock<SingleItemDispatcher<u64>> = OnceLock::new();
	DISPATCHER.get_or_init(|| SingleItemDispatcher::new(DispatcherSpec::default().class(TaskClass::Background)))
}

/// Property model whose value is computed off the caller's thread.
///
/// Every function produced by the followed stream is evaluated on a
/// [`SingleItemDispatcher`]: a function arriving while another is still
/// waiting replaces it, and one arriving during an evaluation runs after it.
/// Results are stored with [`PropertyModel::set`], so listeners only hear
/// about values that differ. Dereferences to the underlying model.
pub struct FuncStreamValueModel<T> {
	model: Arc<PropertyModel<T>>,
	dispatcher: SingleItemDispatcher<u64>,
	key: u64,
	functions: Stream<ValueFn<T>>,
	_subscription: Subscription,
}

impl<T: fmt::Debug> fmt::Debug for FuncStreamValueModel<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FuncStreamValueModel")
			.field("model", &self.model)
			.field("key", &self.key)
			.finish_non_exhaustive()
	}
}

impl<T: Clone + PartialEq + Send + Sync + 'static> FuncStreamValueModel<T> {
	/// Follows `functions`, starting from `initial` until the first result lands.
	pub fn new(functions: &Stream<ValueFn<T>>, initial: T) -> Self {
		Self::with_dispatcher(functions, initial, evaluation_dispatcher())
	}

	/// [`Self::new`] evaluating on a caller-provided dispatcher.
	pub fn with_dispatcher(functions: &Stream<ValueFn<T>>, initial: T, dispatcher: &SingleItemDispatcher<u64>) -> Self {
		let model = Arc::new(PropertyModel::new(initial));
		let key = NEXT_KEY.fetch_add(1, Ordering::Relaxed);

		let target: Weak<PropertyModel<T>> = Arc::downgrade(&model);
		let scheduler = dispatcher.clone();
		let subscription = functions.subscribe(move |function| {
			let target = Weak::clone(&target);
			let function = Arc::clone(function);
			scheduler.submit(key, move || {
				let value = function();
				match target.upgrade() {
					Some(model) => model.set(value).map(drop).map_err(|error| error.to_string()),
					None => Ok(()),
				}
			});
		});

		Self {
			model,
			dispatcher: dispatcher.clone(),
			key,
			functions: functions.clone(),
			_subscription: subscription,
		}
	}

	/// Evaluates the latest function on the calling thread, bypassing the dispatcher.
	///
	/// The model itself is not updated.
	pub fn evaluate_now(&self) -> Option<T> {
		self.functions.current().map(|function| function())
	}

	/// Returns a handle to the underlying model.
	pub fn model(&self) -> Arc<PropertyModel<T>> {
		Arc::clone(&self.model)
	}
}

impl<T> Deref for FuncStreamValueModel<T> {
	type Target = PropertyModel<T>;

	fn deref(&self) -> &PropertyModel<T> {
		&self.model
	}
}

impl<T: Clone + Send + Sync + 'static> Observe<T> for FuncStreamValueModel<T> {
	fn observable(&self) -> &Observable<T> {
		self.model.observable()
	}

	fn property(&self, name: &str) -> Option<T> {
		self.model.property(name)
	}
}

impl<T> Drop for FuncStreamValueModel<T> {
	/// Discards an evaluation that has not started; a running one finishes
	/// into a model nobody else may hold.
	fn drop(&mut self) {
		self.dispatcher.cancel(&self.key);
	}
}

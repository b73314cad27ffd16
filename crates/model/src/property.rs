use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use strand_primitives::{Observable, Observe, Result, Subscription};
use strand_stream::Stream;

type Equality<T> = Box<dyn Fn(&T, &T) -> bool + Send + Sync>;

/// Single observable value.
///
/// Fires `property_changed` for [`Self::PROPERTY`] whenever [`Self::set`]
/// stores a value that the model's equality considers different.
pub struct PropertyModel<T> {
	observable: Observable<T>,
	value: Mutex<T>,
	eq: Equality<T>,
	follow: Mutex<Option<(Subscription, Stream<T>)>>,
}

impl<T: fmt::Debug> fmt::Debug for PropertyModel<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PropertyModel").field("value", &*self.value.lock()).finish_non_exhaustive()
	}
}

impl<T: Clone + PartialEq + Send + Sync + 'static> PropertyModel<T> {
	pub fn new(value: T) -> Self {
		Self::with_eq(value, |a: &T, b: &T| a == b)
	}

	/// Model that mirrors `stream`, starting from its current value or `fallback`.
	///
	/// The model holds the stream until the model is dropped.
	pub fn from_stream(stream: &Stream<T>, fallback: T) -> Arc<Self> {
		let model = Arc::new(Self::new(stream.current().unwrap_or(fallback)));
		let weak: Weak<Self> = Arc::downgrade(&model);
		let subscription = stream.try_listen(move |value| match weak.upgrade() {
			Some(model) => model.set(value.clone()).map(drop),
			None => Ok(()),
		});
		*model.follow.lock() = Some((subscription, stream.clone()));
		model
	}
}

impl<T: Clone + Send + Sync + 'static> PropertyModel<T> {
	/// Name carried by this model's `property_changed` events.
	pub const PROPERTY: &'static str = "value";

	/// Creates a model that compares values with `eq`.
	pub fn with_eq(value: T, eq: impl Fn(&T, &T) -> bool + Send + Sync + 'static) -> Self {
		Self {
			observable: Observable::new(),
			value: Mutex::new(value),
			eq: Box::new(eq),
			follow: Mutex::new(None),
		}
	}

	pub fn get(&self) -> T {
		self.value.lock().clone()
	}

	/// Stores `value`, firing only when it differs. Returns whether it fired.
	pub fn set(&self, value: T) -> Result<bool> {
		{
			let mut current = self.value.lock();
			if (self.eq)(&*current, &value) {
				return Ok(false);
			}
			*current = value;
		}
		self.notify_property_changed(Self::PROPERTY)?;
		Ok(true)
	}

	/// Stops following the stream given to [`Self::from_stream`].
	pub fn unfollow(&self) {
		self.follow.lock().take();
	}
}

impl<T: Clone + Send + Sync + 'static> Observe<T> for PropertyModel<T> {
	fn observable(&self) -> &Observable<T> {
		&self.observable
	}

	fn property(&self, name: &str) -> Option<T> {
		(name == Self::PROPERTY).then(|| self.get())
	}
}

use std::sync::Arc;

use parking_lot::Mutex;

use crate::stream::{Connection, Stream};

impl<T: Clone + Send + Sync + 'static> Stream<T> {
	/// Stream of `f` applied to every value.
	pub fn map<U, F>(&self, f: F) -> Stream<U>
	where
		U: Clone + Send + Sync + 'static,
		F: Fn(&T) -> U + Send + Sync + 'static,
	{
		let f = Arc::new(f);
		let pull = {
			let upstream = self.clone();
			let f = Arc::clone(&f);
			move || upstream.current().map(|value| f(&value))
		};
		let upstream = self.clone();
		Stream::derived(pull, move |emitter| {
			let f = Arc::clone(&f);
			Connection::default().subscription(upstream.try_listen(move |value| emitter.emit(f(value))))
		})
	}

	/// Stream of the values that satisfy `predicate`.
	pub fn filter<P>(&self, predicate: P) -> Stream<T>
	where
		P: Fn(&T) -> bool + Send + Sync + 'static,
	{
		let predicate = Arc::new(predicate);
		let pull = {
			let upstream = self.clone();
			let predicate = Arc::clone(&predicate);
			move || upstream.current().filter(|value| predicate(value))
		};
		let upstream = self.clone();
		Stream::derived(pull, move |emitter| {
			let predicate = Arc::clone(&predicate);
			Connection::default().subscription(upstream.try_listen(move |value| {
				if predicate(value) { emitter.emit(value.clone()) } else { Ok(()) }
			}))
		})
	}

	/// Merge of this stream and `other`, in arrival order.
	///
	/// The initial value is `other`'s current value if it has one, else this
	/// stream's.
	pub fn concat(&self, other: &Stream<T>) -> Stream<T> {
		let pull = {
			let first = self.clone();
			let second = other.clone();
			move || second.current().or_else(|| first.current())
		};
		let first = self.clone();
		let second = other.clone();
		Stream::derived(pull, move |emitter| {
			let to_first = emitter.clone();
			Connection::default()
				.subscription(first.try_listen(move |value| to_first.emit(value.clone())))
				.subscription(second.try_listen(move |value| emitter.emit(value.clone())))
		})
	}

	/// Stream of `f` over the latest value of every input.
	///
	/// Produces nothing until every input has a value.
	pub fn combine_latest<U, F>(inputs: &[Stream<T>], f: F) -> Stream<U>
	where
		U: Clone + Send + Sync + 'static,
		F: Fn(&[T]) -> U + Send + Sync + 'static,
	{
		let f = Arc::new(f);
		let pull = {
			let inputs = inputs.to_vec();
			let f = Arc::clone(&f);
			move || {
				let values: Option<Vec<T>> = inputs.iter().map(Stream::current).collect();
				values.map(|values| f(&values))
			}
		};
		let inputs = inputs.to_vec();
		Stream::derived(pull, move |emitter| {
			let latest = Arc::new(Mutex::new(inputs.iter().map(Stream::current).collect::<Vec<_>>()));
			inputs.iter().enumerate().fold(Connection::default(), |connection, (slot, input)| {
				let latest = Arc::clone(&latest);
				let emitter = emitter.clone();
				let f = Arc::clone(&f);
				connection.subscription(input.try_listen(move |value| {
					let complete: Option<Vec<T>> = {
						let mut latest = latest.lock();
						latest[slot] = Some(value.clone());
						latest.iter().cloned().collect()
					};
					match complete {
						Some(values) => emitter.emit(f(&values)),
						None => Ok(()),
					}
				}))
			})
		})
	}
}

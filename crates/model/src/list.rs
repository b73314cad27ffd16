use std::fmt;

use parking_lot::RwLock;
use strand_primitives::{Observable, ObservableCollection, Observe, Result};

/// Ordered master collection.
///
/// Every mutation updates the backing vector first, then fires exactly one
/// matching item event from the same call.
pub struct ObservableList<T> {
	name: &'static str,
	observable: Observable<T>,
	items: RwLock<Vec<T>>,
}

impl<T: fmt::Debug> fmt::Debug for ObservableList<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ObservableList")
			.field("name", &self.name)
			.field("items", &*self.items.read())
			.finish()
	}
}

impl<T: Clone + Send + Sync + 'static> ObservableList<T> {
	/// Creates an empty list whose events carry `name`.
	pub fn new(name: &'static str) -> Self {
		Self::from_vec(name, Vec::new())
	}

	pub fn from_vec(name: &'static str, items: Vec<T>) -> Self {
		Self {
			name,
			observable: Observable::new(),
			items: RwLock::new(items),
		}
	}

	pub fn get(&self, index: usize) -> Option<T> {
		self.items.read().get(index).cloned()
	}

	/// Inserts `item` at `index`.
	///
	/// # Panics
	///
	/// Panics if `index > len`.
	pub fn insert(&self, index: usize, item: T) -> Result<()> {
		{
			let mut items = self.items.write();
			let len = items.len();
			assert!(index <= len, "list insert index ({index}) out of bounds for length {len}");
			items.insert(index, item.clone());
		}
		self.observable.notify_item_inserted(self.name, item, index)
	}

	/// Appends `item`, returning its index.
	pub fn push(&self, item: T) -> Result<usize> {
		let index = {
			let mut items = self.items.write();
			items.push(item.clone());
			items.len() - 1
		};
		self.observable.notify_item_inserted(self.name, item, index)?;
		Ok(index)
	}

	/// Removes and returns the item at `index`.
	///
	/// # Panics
	///
	/// Panics if `index >= len`.
	pub fn remove(&self, index: usize) -> Result<T> {
		let item = {
			let mut items = self.items.write();
			let len = items.len();
			assert!(index < len, "list remove index ({index}) out of bounds for length {len}");
			items.remove(index)
		};
		self.observable.notify_item_removed(self.name, item.clone(), index)?;
		Ok(item)
	}

	/// Replaces the item at `index`, returning the old one.
	///
	/// # Panics
	///
	/// Panics if `index >= len`.
	pub fn replace(&self, index: usize, item: T) -> Result<T> {
		let old = {
			let mut items = self.items.write();
			let len = items.len();
			assert!(index < len, "list replace index ({index}) out of bounds for length {len}");
			std::mem::replace(&mut items[index], item.clone())
		};
		self.observable.notify_item_changed(self.name, old.clone(), item, index)?;
		Ok(old)
	}

	/// Removes every item from the back, one `item_removed` per item.
	pub fn clear(&self) -> Result<()> {
		loop {
			let popped = {
				let mut items = self.items.write();
				items.pop().map(|item| (items.len(), item))
			};
			let Some((index, item)) = popped else {
				return Ok(());
			};
			self.observable.notify_item_removed(self.name, item, index)?;
		}
	}
}

impl<T: Clone + Send + Sync + 'static> Observe<T> for ObservableList<T> {
	fn observable(&self) -> &Observable<T> {
		&self.observable
	}
}

impl<T: Clone + Send + Sync + 'static> ObservableCollection<T> for ObservableList<T> {
	fn collection_name(&self) -> &'static str {
		self.name
	}

	fn items(&self) -> Vec<T> {
		self.items.read().clone()
	}

	fn len(&self) -> usize {
		self.items.read().len()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use parking_lot::Mutex;
	use pretty_assertions::assert_eq;

	use super::*;

	#[derive(Debug, Clone, PartialEq)]
	enum Event {
		Inserted(char, usize),
		Removed(char, usize),
		Changed(char, char, usize),
	}

	fn record(list: &ObservableList<char>) -> (Arc<Mutex<Vec<Event>>>, Vec<strand_primitives::Subscription>) {
		let log = Arc::new(Mutex::new(Vec::new()));
		let observable = list.observable();
		let inserted = Arc::clone(&log);
		let removed = Arc::clone(&log);
		let changed = Arc::clone(&log);
		let subs = vec![
			observable
				.item_inserted()
				.subscribe(move |e| inserted.lock().push(Event::Inserted(e.item, e.index))),
			observable
				.item_removed()
				.subscribe(move |e| removed.lock().push(Event::Removed(e.item, e.index))),
			observable
				.item_changed()
				.subscribe(move |e| changed.lock().push(Event::Changed(e.old, e.new, e.index))),
		];
		(log, subs)
	}

	#[test]
	fn mutations_fire_one_event_each() {
		let list = ObservableList::new("letters");
		let (log, _subs) = record(&list);

		list.push('a').unwrap();
		list.push('c').unwrap();
		list.insert(1, 'b').unwrap();
		assert_eq!(list.replace(2, 'z').unwrap(), 'c');
		assert_eq!(list.remove(0).unwrap(), 'a');

		assert_eq!(list.items(), vec!['b', 'z']);
		assert_eq!(*log.lock(), vec![
			Event::Inserted('a', 0),
			Event::Inserted('c', 1),
			Event::Inserted('b', 1),
			Event::Changed('c', 'z', 2),
			Event::Removed('a', 0),
		]);
	}

	#[test]
	fn events_see_updated_sequence() {
		let list = Arc::new(ObservableList::from_vec("letters", vec!['x']));
		let view = Arc::downgrade(&list);
		let _sub = list.observable().item_inserted().subscribe(move |e| {
			let list = view.upgrade().unwrap();
			assert_eq!(list.get(e.index), Some(e.item));
			assert_eq!(list.len(), 2);
		});
		list.insert(0, 'w').unwrap();
	}

	#[test]
	fn clear_removes_from_back() {
		let list = ObservableList::from_vec("letters", vec!['a', 'b', 'c']);
		let (log, _subs) = record(&list);
		list.clear().unwrap();
		assert!(list.is_empty());
		assert_eq!(*log.lock(), vec![Event::Removed('c', 2), Event::Removed('b', 1), Event::Removed('a', 0)]);
	}

	#[test]
	#[should_panic(expected = "out of bounds")]
	fn insert_past_end_panics() {
		let list = ObservableList::<u8>::new("bytes");
		let _ = list.insert(1, 0);
	}
}

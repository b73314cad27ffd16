use std::fmt;
use std::hash::Hash;

use indexmap::IndexSet;
use parking_lot::RwLock;
use strand_primitives::{Observable, ObservableCollection, Observe, Result};

/// Insertion-ordered membership collection.
///
/// Alongside the positional `item_inserted`/`item_removed` events it fires the
/// set-like `item_added`/`item_discarded` for membership-only consumers.
pub struct ObservableSet<T> {
	name: &'static str,
	observable: Observable<T>,
	items: RwLock<IndexSet<T>>,
}

impl<T: fmt::Debug> fmt::Debug for ObservableSet<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ObservableSet")
			.field("name", &self.name)
			.field("items", &*self.items.read())
			.finish()
	}
}

impl<T: Clone + Eq + Hash + Send + Sync + 'static> ObservableSet<T> {
	pub fn new(name: &'static str) -> Self {
		Self {
			name,
			observable: Observable::new(),
			items: RwLock::new(IndexSet::new()),
		}
	}

	pub fn contains(&self, item: &T) -> bool {
		self.items.read().contains(item)
	}

	/// Adds `item` at the end. Returns `false` if it was already present.
	pub fn insert(&self, item: T) -> Result<bool> {
		let index = {
			let mut items = self.items.write();
			let (index, added) = items.insert_full(item.clone());
			if !added {
				return Ok(false);
			}
			index
		};
		self.observable.notify_item_inserted(self.name, item.clone(), index)?;
		self.observable.notify_item_added(self.name, item)?;
		Ok(true)
	}

	/// Removes `item`, keeping the order of the rest. Returns `false` if absent.
	pub fn discard(&self, item: &T) -> Result<bool> {
		let removed = self.items.write().shift_remove_full(item);
		let Some((index, item)) = removed else {
			return Ok(false);
		};
		self.observable.notify_item_removed(self.name, item.clone(), index)?;
		self.observable.notify_item_discarded(self.name, item)?;
		Ok(true)
	}

	/// Discards every item, last first.
	pub fn clear(&self) -> Result<()> {
		loop {
			let popped = {
				let mut items = self.items.write();
				items.pop().map(|item| (items.len(), item))
			};
			let Some((index, item)) = popped else {
				return Ok(());
			};
			self.observable.notify_item_removed(self.name, item.clone(), index)?;
			self.observable.notify_item_discarded(self.name, item)?;
		}
	}
}

impl<T: Clone + Eq + Hash + Send + Sync + 'static> Observe<T> for ObservableSet<T> {
	fn observable(&self) -> &Observable<T> {
		&self.observable
	}
}

impl<T: Clone + Eq + Hash + Send + Sync + 'static> ObservableCollection<T> for ObservableSet<T> {
	fn collection_name(&self) -> &'static str {
		self.name
	}

	fn items(&self) -> Vec<T> {
		self.items.read().iter().cloned().collect()
	}

	fn len(&self) -> usize {
		self.items.read().len()
	}
}

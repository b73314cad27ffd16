//! Observation capability shared by models and collections.
//!
//! Any entity becomes observable by holding an [`Observable`] and
//! implementing [`Observe`]. Collections additionally implement
//! [`ObservableCollection`] so derived views can treat every compliant
//! source the same way.

use crate::error::Result;
use crate::notifier::Notifier;

/// A property changed; `value` was read when the event fired.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyChanged<T> {
	pub name: &'static str,
	pub value: Option<T>,
}

/// An item was inserted; `index` is its position after insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemInserted<T> {
	pub collection: &'static str,
	pub item: T,
	pub index: usize,
}

/// An item was removed; `index` is the position it occupied.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemRemoved<T> {
	pub collection: &'static str,
	pub item: T,
	pub index: usize,
}

/// An item was replaced in place.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemChanged<T> {
	pub collection: &'static str,
	pub old: T,
	pub new: T,
	pub index: usize,
}

/// Membership-only notification: an item joined or left a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Membership<T> {
	pub collection: &'static str,
	pub item: T,
}

/// Set of notifiers describing changes to one entity.
#[derive(Debug)]
pub struct Observable<T> {
	property_changed: Notifier<PropertyChanged<T>>,
	item_inserted: Notifier<ItemInserted<T>>,
	item_removed: Notifier<ItemRemoved<T>>,
	item_changed: Notifier<ItemChanged<T>>,
	item_added: Notifier<Membership<T>>,
	item_discarded: Notifier<Membership<T>>,
}

impl<T: 'static> Default for Observable<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: 'static> Observable<T> {
	/// Creates an observable with empty notifiers.
	pub fn new() -> Self {
		Self {
			property_changed: Notifier::new(),
			item_inserted: Notifier::new(),
			item_removed: Notifier::new(),
			item_changed: Notifier::new(),
			item_added: Notifier::new(),
			item_discarded: Notifier::new(),
		}
	}

	pub fn property_changed(&self) -> &Notifier<PropertyChanged<T>> {
		&self.property_changed
	}

	pub fn item_inserted(&self) -> &Notifier<ItemInserted<T>> {
		&self.item_inserted
	}

	pub fn item_removed(&self) -> &Notifier<ItemRemoved<T>> {
		&self.item_removed
	}

	pub fn item_changed(&self) -> &Notifier<ItemChanged<T>> {
		&self.item_changed
	}

	pub fn item_added(&self) -> &Notifier<Membership<T>> {
		&self.item_added
	}

	pub fn item_discarded(&self) -> &Notifier<Membership<T>> {
		&self.item_discarded
	}

	/// Fires `property_changed` with an already-read value.
	pub fn notify_property_value(&self, name: &'static str, value: Option<T>) -> Result<()> {
		self.property_changed.fire(&PropertyChanged { name, value })
	}

	/// Fires `item_inserted`. Call after the backing sequence holds `item` at `index`.
	pub fn notify_item_inserted(&self, collection: &'static str, item: T, index: usize) -> Result<()> {
		self.item_inserted.fire(&ItemInserted { collection, item, index })
	}

	/// Fires `item_removed`. Call after the backing sequence dropped `item` from `index`.
	pub fn notify_item_removed(&self, collection: &'static str, item: T, index: usize) -> Result<()> {
		self.item_removed.fire(&ItemRemoved { collection, item, index })
	}

	/// Fires `item_changed` for an in-place replacement.
	pub fn notify_item_changed(&self, collection: &'static str, old: T, new: T, index: usize) -> Result<()> {
		self.item_changed.fire(&ItemChanged {
			collection,
			old,
			new,
			index,
		})
	}

	/// Fires the set-like `item_added` notification.
	pub fn notify_item_added(&self, collection: &'static str, item: T) -> Result<()> {
		self.item_added.fire(&Membership { collection, item })
	}

	/// Fires the set-like `item_discarded` notification.
	pub fn notify_item_discarded(&self, collection: &'static str, item: T) -> Result<()> {
		self.item_discarded.fire(&Membership { collection, item })
	}

	/// Closes every notifier. Later subscriptions are contract violations.
	pub fn close(&self) {
		self.property_changed.close();
		self.item_inserted.close();
		self.item_removed.close();
		self.item_changed.close();
		self.item_added.close();
		self.item_discarded.close();
	}
}

/// Capability trait: "has a notifier set".
pub trait Observe<T: 'static> {
	/// Returns the entity's notifiers.
	fn observable(&self) -> &Observable<T>;

	/// Reads a property by name. Entities without properties return `None`.
	fn property(&self, _name: &str) -> Option<T> {
		None
	}

	/// Fires `property_changed` with the value of `name` read now.
	fn notify_property_changed(&self, name: &'static str) -> Result<()> {
		let value = self.property(name);
		self.observable().notify_property_value(name, value)
	}
}

/// An observable ordered collection.
pub trait ObservableCollection<T: 'static>: Observe<T> {
	/// Name carried by this collection's item events.
	fn collection_name(&self) -> &'static str;

	/// Snapshot of the items in order.
	fn items(&self) -> Vec<T>;

	/// Number of items.
	fn len(&self) -> usize;

	fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use parking_lot::Mutex;

	use super::*;

	struct Thermometer {
		observable: Observable<f64>,
		reading: Mutex<f64>,
	}

	impl Observe<f64> for Thermometer {
		fn observable(&self) -> &Observable<f64> {
			&self.observable
		}

		fn property(&self, name: &str) -> Option<f64> {
			(name == "reading").then(|| *self.reading.lock())
		}
	}

	#[test]
	fn property_value_is_read_at_fire_time() {
		let thermometer = Thermometer {
			observable: Observable::new(),
			reading: Mutex::new(20.0),
		};
		let seen = Arc::new(Mutex::new(Vec::new()));
		let sink = Arc::clone(&seen);
		let _sub = thermometer.observable().property_changed().subscribe(move |event| {
			sink.lock().push((event.name, event.value));
		});

		*thermometer.reading.lock() = 21.5;
		thermometer.notify_property_changed("reading").unwrap();
		thermometer.notify_property_changed("unknown").unwrap();

		assert_eq!(*seen.lock(), vec![("reading", Some(21.5)), ("unknown", None)]);
	}

	#[test]
	fn close_invalidates_all_notifiers() {
		let observable = Observable::<u8>::new();
		let sub = observable.item_inserted().subscribe(|_| {});
		observable.close();
		assert!(!sub.is_active());
		assert!(observable.item_removed().is_closed());
		observable.notify_item_inserted("items", 1, 0).unwrap();
	}
}

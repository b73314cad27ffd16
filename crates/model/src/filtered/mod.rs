//! Filtered, sorted view over an observable collection.
//!
//! The derived sequence is kept equal to
//! `stable_sort(filter(master, predicate), comparator)` at every observable
//! point. Master insertions and removals are applied incrementally;
//! predicate or comparator changes rebuild the view and replay the
//! difference as individual remove/insert events, after which selected items
//! that still qualify stay selected at their new positions. Comparator ties
//! keep master order.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use strand_primitives::{Lifetime, Observable, ObservableCollection, Observe, Result, Selection, SelectionStyle};

mod diff;

use diff::Edit;

type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;
type Comparator<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;
type Source<T> = Arc<dyn ObservableCollection<T> + Send + Sync>;

#[derive(Debug, Clone)]
struct Entry<T> {
	master_index: usize,
	item: T,
}

struct State<T> {
	entries: Vec<Entry<T>>,
	predicate: Predicate<T>,
	comparator: Comparator<T>,
}

impl<T: Clone> State<T> {
	/// Position for an item at `master_index`, ordered by comparator then master index.
	fn position_for(&self, item: &T, master_index: usize) -> usize {
		self.entries.partition_point(|entry| {
			(self.comparator)(&entry.item, item).then(entry.master_index.cmp(&master_index)) == Ordering::Less
		})
	}

	/// Full recompute from a master snapshot.
	fn derive(&self, master: Vec<T>) -> Vec<Entry<T>> {
		let mut entries: Vec<Entry<T>> = master
			.into_iter()
			.enumerate()
			.filter(|(_, item)| (self.predicate)(item))
			.map(|(master_index, item)| Entry { master_index, item })
			.collect();
		entries.sort_by(|a, b| (self.comparator)(&a.item, &b.item));
		entries
	}
}

/// Configures and builds a [`FilteredSortedModel`].
pub struct ModelBuilder<T> {
	source: Source<T>,
	name: &'static str,
	style: SelectionStyle,
	predicate: Predicate<T>,
	comparator: Comparator<T>,
}

impl<T: Clone + Send + Sync + 'static> ModelBuilder<T> {
	/// Name carried by the view's own item events.
	#[must_use]
	pub fn name(mut self, name: &'static str) -> Self {
		self.name = name;
		self
	}

	#[must_use]
	pub fn selection_style(mut self, style: SelectionStyle) -> Self {
		self.style = style;
		self
	}

	/// Keeps only items satisfying `predicate`. Defaults to keeping everything.
	#[must_use]
	pub fn filter(mut self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
		self.predicate = Arc::new(predicate);
		self
	}

	/// Orders items with `comparator`. Defaults to master order.
	#[must_use]
	pub fn sort(mut self, comparator: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static) -> Self {
		self.comparator = Arc::new(comparator);
		self
	}

	/// Builds the view and starts following the source.
	pub fn build(self) -> Arc<FilteredSortedModel<T>> {
		let mut state = State {
			entries: Vec::new(),
			predicate: self.predicate,
			comparator: self.comparator,
		};
		state.entries = state.derive(self.source.items());
		let len = state.entries.len();

		let model = Arc::new(FilteredSortedModel {
			name: self.name,
			source: self.source,
			observable: Observable::new(),
			state: Mutex::new(state),
			selection: Selection::bounded(self.style, len),
			lifetime: Lifetime::new(),
		});
		model.follow_source();
		model
	}
}

/// Filtered, sorted view with a synchronized [`Selection`].
///
/// Selection indices refer to positions in the derived sequence and are
/// remapped on every structural change. The view follows its source only
/// while it is alive; dropping the last handle detaches it.
pub struct FilteredSortedModel<T> {
	name: &'static str,
	source: Source<T>,
	observable: Observable<T>,
	state: Mutex<State<T>>,
	selection: Selection,
	lifetime: Lifetime,
}

impl<T: fmt::Debug> fmt::Debug for FilteredSortedModel<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.state.lock();
		f.debug_struct("FilteredSortedModel")
			.field("name", &self.name)
			.field("entries", &state.entries.len())
			.field("selection", &self.selection)
			.finish_non_exhaustive()
	}
}

impl<T: Clone + Send + Sync + 'static> FilteredSortedModel<T> {
	/// Starts configuring a view over `source`.
	pub fn builder<S>(source: Arc<S>) -> ModelBuilder<T>
	where
		S: ObservableCollection<T> + Send + Sync + 'static,
	{
		ModelBuilder {
			source,
			name: "filtered",
			style: SelectionStyle::default(),
			predicate: Arc::new(|_: &T| true),
			comparator: Arc::new(|_: &T, _: &T| Ordering::Equal),
		}
	}

	/// View over `source` keeping items that satisfy `predicate`, ordered by `comparator`.
	pub fn new<S>(
		source: Arc<S>, predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
		comparator: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static,
	) -> Arc<Self>
	where
		S: ObservableCollection<T> + Send + Sync + 'static,
	{
		Self::builder(source).filter(predicate).sort(comparator).build()
	}

	fn follow_source(self: &Arc<Self>) {
		let events = self.source.observable();
		let source_name = self.source.collection_name();

		let model = Arc::downgrade(self);
		events.item_inserted().try_subscribe_owned(&self.lifetime, move |event| {
			if event.collection != source_name {
				return Ok(());
			}
			with_model(&model, |model| model.master_inserted(event.item.clone(), event.index))
		});

		let model = Arc::downgrade(self);
		events.item_removed().try_subscribe_owned(&self.lifetime, move |event| {
			if event.collection != source_name {
				return Ok(());
			}
			with_model(&model, |model| model.master_removed(event.index))
		});

		let model = Arc::downgrade(self);
		events.item_changed().try_subscribe_owned(&self.lifetime, move |event| {
			if event.collection != source_name {
				return Ok(());
			}
			with_model(&model, |model| model.master_changed(event.new.clone(), event.index))
		});
	}

	/// Derived items in order.
	pub fn items(&self) -> Vec<T> {
		self.state.lock().entries.iter().map(|entry| entry.item.clone()).collect()
	}

	pub fn get(&self, index: usize) -> Option<T> {
		self.state.lock().entries.get(index).map(|entry| entry.item.clone())
	}

	/// Position in the master collection of the derived item at `index`.
	pub fn master_index(&self, index: usize) -> Option<usize> {
		self.state.lock().entries.get(index).map(|entry| entry.master_index)
	}

	pub fn len(&self) -> usize {
		self.state.lock().entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.state.lock().entries.is_empty()
	}

	/// Selection over derived positions.
	pub fn selection(&self) -> &Selection {
		&self.selection
	}

	/// Selected items in derived order.
	pub fn selected_items(&self) -> Vec<T> {
		let indices = self.selection.indices();
		let state = self.state.lock();
		indices.into_iter().filter_map(|i| state.entries.get(i)).map(|entry| entry.item.clone()).collect()
	}

	/// Replaces the predicate and rebuilds.
	pub fn set_filter(&self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Result<()> {
		self.state.lock().predicate = Arc::new(predicate);
		self.rebuild()
	}

	/// Replaces the comparator and rebuilds.
	pub fn set_sort(&self, comparator: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static) -> Result<()> {
		self.state.lock().comparator = Arc::new(comparator);
		self.rebuild()
	}

	/// Re-evaluates predicate and comparator against the whole master.
	///
	/// Needed after items change in ways the source does not report.
	pub fn refilter(&self) -> Result<()> {
		self.rebuild()
	}

	fn master_inserted(&self, item: T, master_index: usize) -> Result<()> {
		let position = {
			let mut state = self.state.lock();
			for entry in &mut state.entries {
				if entry.master_index >= master_index {
					entry.master_index += 1;
				}
			}
			Self::insert_entry(&mut state, &item, master_index)
		};
		match position {
			Some(index) => self.announce_inserted(item, index),
			None => Ok(()),
		}
	}

	fn master_removed(&self, master_index: usize) -> Result<()> {
		let removed = {
			let mut state = self.state.lock();
			let removed = Self::remove_entry(&mut state, master_index);
			for entry in &mut state.entries {
				if entry.master_index > master_index {
					entry.master_index -= 1;
				}
			}
			removed
		};
		match removed {
			Some((index, item)) => self.announce_removed(item, index),
			None => Ok(()),
		}
	}

	/// A replaced master item is a removal of the old entry and an insertion of the new one.
	fn master_changed(&self, item: T, master_index: usize) -> Result<()> {
		let removed = Self::remove_entry(&mut self.state.lock(), master_index);
		if let Some((index, old)) = removed {
			self.announce_removed(old, index)?;
		}
		let inserted = Self::insert_entry(&mut self.state.lock(), &item, master_index);
		match inserted {
			Some(index) => self.announce_inserted(item, index),
			None => Ok(()),
		}
	}

	fn insert_entry(state: &mut State<T>, item: &T, master_index: usize) -> Option<usize> {
		if !(state.predicate)(item) {
			return None;
		}
		let index = state.position_for(item, master_index);
		state.entries.insert(index, Entry {
			master_index,
			item: item.clone(),
		});
		Some(index)
	}

	fn remove_entry(state: &mut State<T>, master_index: usize) -> Option<(usize, T)> {
		let index = state.entries.iter().position(|entry| entry.master_index == master_index)?;
		Some((index, state.entries.remove(index).item))
	}

	fn announce_inserted(&self, item: T, index: usize) -> Result<()> {
		self.selection.insert_index(index, true)?;
		self.observable.notify_item_inserted(self.name, item, index)
	}

	fn announce_removed(&self, item: T, index: usize) -> Result<()> {
		self.selection.remove_index(index, true)?;
		self.observable.notify_item_removed(self.name, item, index)
	}

	fn rebuild(&self) -> Result<()> {
		let master = self.source.items();
		let (script, old, target) = {
			let state = self.state.lock();
			let target = state.derive(master);
			let old: Vec<usize> = state.entries.iter().map(|entry| entry.master_index).collect();
			let new: Vec<usize> = target.iter().map(|entry| entry.master_index).collect();
			(diff::edits(&old, &new), old, target)
		};
		tracing::debug!(model = self.name, edits = script.len(), len = target.len(), "model.rebuild");

		let selection_before = self.selection.snapshot();
		let outcome = self.replay(&script, &target);

		// Selected items that still qualify keep their selection at their new position.
		let new_positions: HashMap<usize, usize> =
			target.iter().enumerate().map(|(position, entry)| (entry.master_index, position)).collect();
		let moved = |index: usize| old.get(index).and_then(|master_index| new_positions.get(master_index)).copied();
		let indices: Vec<usize> = selection_before.indices().filter_map(moved).collect();
		let anchor = selection_before.anchor().and_then(moved);
		self.selection.remap_with(false, |remap| remap.reselect(indices, anchor))?;

		self.state.lock().entries = target;
		outcome?;

		if self.selection.snapshot() != selection_before {
			self.selection.notify_changed()?;
		}
		Ok(())
	}

	/// Applies `script` one edit at a time with the selection remapped
	/// silently, announcing each edit.
	///
	/// A failing listener stops the announcements but not the edits, so the
	/// entries and the selection bound always end at the target. The first
	/// error is returned.
	fn replay(&self, script: &[Edit], target: &[Entry<T>]) -> Result<()> {
		let mut outcome = Ok(());
		for edit in script {
			let announced = match *edit {
				Edit::Remove(index) => {
					let entry = self.state.lock().entries.remove(index);
					self.selection.remap_with(false, |remap| remap.remove_index(index))?;
					outcome.is_ok().then(|| self.observable.notify_item_removed(self.name, entry.item, index))
				}
				Edit::Insert(index) => {
					let entry = target[index].clone();
					let item = entry.item.clone();
					self.state.lock().entries.insert(index, entry);
					self.selection.remap_with(false, |remap| remap.insert_index(index))?;
					outcome.is_ok().then(|| self.observable.notify_item_inserted(self.name, item, index))
				}
			};
			if let Some(Err(error)) = announced {
				tracing::debug!(model = self.name, %error, "model.rebuild_listener_failed");
				outcome = Err(error);
			}
		}
		outcome
	}
}

fn with_model<T>(model: &Weak<FilteredSortedModel<T>>, f: impl FnOnce(&FilteredSortedModel<T>) -> Result<()>) -> Result<()> {
	match model.upgrade() {
		Some(model) => f(&model),
		None => Ok(()),
	}
}

impl<T: Clone + Send + Sync + 'static> Observe<T> for FilteredSortedModel<T> {
	fn observable(&self) -> &Observable<T> {
		&self.observable
	}
}

impl<T: Clone + Send + Sync + 'static> ObservableCollection<T> for FilteredSortedModel<T> {
	fn collection_name(&self) -> &'static str {
		self.name
	}

	fn items(&self) -> Vec<T> {
		FilteredSortedModel::items(self)
	}

	fn len(&self) -> usize {
		FilteredSortedModel::len(self)
	}
}

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::notifier::Notifier;

#[cfg(test)]
mod tests;

/// How many indices a selection may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionStyle {
	/// Nothing can be selected.
	None,
	/// At most one index.
	SingleOrNone,
	/// Any number of indices.
	#[default]
	Multiple,
}

/// Plain value snapshot of a [`Selection`].
///
/// When `len` is set the selection is bound to a collection of that length
/// and every stored index lies in `[0, len)`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionState {
	indices: BTreeSet<usize>,
	anchor: Option<usize>,
	len: Option<usize>,
}

impl SelectionState {
	/// Selected indices in ascending order.
	pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
		self.indices.iter().copied()
	}

	/// Anchor used by range extension.
	pub fn anchor(&self) -> Option<usize> {
		self.anchor
	}

	/// Length of the bound collection, if any.
	pub fn bound(&self) -> Option<usize> {
		self.len
	}

	pub fn contains(&self, index: usize) -> bool {
		self.indices.contains(&index)
	}

	fn check(&self, index: usize) {
		if let Some(len) = self.len {
			assert!(index < len, "selection index ({index}) out of bounds for length {len}");
		}
	}

	fn insert_index(&mut self, index: usize) {
		if let Some(len) = self.len {
			assert!(index <= len, "selection insert index ({index}) out of bounds for length {len}");
			self.len = Some(len + 1);
		}
		self.indices = self.indices.iter().map(|&i| if i >= index { i + 1 } else { i }).collect();
		if let Some(anchor) = self.anchor.as_mut()
			&& *anchor >= index
		{
			*anchor += 1;
		}
	}

	fn remove_index(&mut self, index: usize) {
		if let Some(len) = self.len {
			assert!(index < len, "selection remove index ({index}) out of bounds for length {len}");
			self.len = Some(len - 1);
		}
		self.indices = self
			.indices
			.iter()
			.filter(|&&i| i != index)
			.map(|&i| if i > index { i - 1 } else { i })
			.collect();
		self.anchor = match self.anchor {
			Some(anchor) if anchor == index => None,
			Some(anchor) if anchor > index => Some(anchor - 1),
			other => other,
		};
	}

	fn nearest_selected(&self, index: usize) -> Option<usize> {
		let below = self.indices.range(..=index).next_back().copied();
		let above = self.indices.range(index..).next().copied();
		match (below, above) {
			(Some(b), Some(a)) => Some(if index - b <= a - index { b } else { a }),
			(b, a) => b.or(a),
		}
	}
}

struct Shared {
	style: SelectionStyle,
	state: Mutex<SelectionState>,
	changed: Notifier<SelectionState>,
}

/// Ordered set of indices with an anchor, shared between its holders.
///
/// Mutators fire [`Self::changed`] with the new state after the lock is
/// released, and only when the state actually changed. The structural remap
/// operations [`Self::insert_index`] and [`Self::remove_index`] instead fire
/// exactly once per call when asked to.
#[derive(Clone)]
pub struct Selection {
	shared: Arc<Shared>,
}

impl fmt::Debug for Selection {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Selection")
			.field("style", &self.shared.style)
			.field("state", &*self.shared.state.lock())
			.finish()
	}
}

impl Default for Selection {
	fn default() -> Self {
		Self::new(SelectionStyle::default())
	}
}

impl Selection {
	/// Creates an unbounded selection.
	pub fn new(style: SelectionStyle) -> Self {
		Self::with_state(style, SelectionState::default())
	}

	/// Creates a selection bound to a collection of `len` items.
	pub fn bounded(style: SelectionStyle, len: usize) -> Self {
		Self::with_state(
			style,
			SelectionState {
				len: Some(len),
				..SelectionState::default()
			},
		)
	}

	fn with_state(style: SelectionStyle, state: SelectionState) -> Self {
		Self {
			shared: Arc::new(Shared {
				style,
				state: Mutex::new(state),
				changed: Notifier::new(),
			}),
		}
	}

	/// Notifier fired with the new state on every change.
	pub fn changed(&self) -> &Notifier<SelectionState> {
		&self.shared.changed
	}

	pub fn style(&self) -> SelectionStyle {
		self.shared.style
	}

	/// Returns a copy of the current state.
	pub fn snapshot(&self) -> SelectionState {
		self.shared.state.lock().clone()
	}

	/// Selected indices in ascending order.
	pub fn indices(&self) -> Vec<usize> {
		self.shared.state.lock().indices().collect()
	}

	pub fn anchor(&self) -> Option<usize> {
		self.shared.state.lock().anchor
	}

	pub fn contains(&self, index: usize) -> bool {
		self.shared.state.lock().contains(index)
	}

	/// Number of selected indices.
	pub fn len(&self) -> usize {
		self.shared.state.lock().indices.len()
	}

	pub fn is_empty(&self) -> bool {
		self.shared.state.lock().indices.is_empty()
	}

	/// The selected index when exactly one is selected.
	pub fn current_index(&self) -> Option<usize> {
		let state = self.shared.state.lock();
		if state.indices.len() == 1 { state.indices.first().copied() } else { None }
	}

	/// Replaces the selection. The first index becomes the anchor.
	pub fn set(&self, indices: impl IntoIterator<Item = usize>) -> Result<()> {
		let style = self.shared.style;
		let indices: Vec<usize> = indices.into_iter().collect();
		self.update(|state| {
			for &index in &indices {
				state.check(index);
			}
			state.indices.clear();
			state.anchor = None;
			match style {
				SelectionStyle::None => {}
				SelectionStyle::SingleOrNone => {
					if let Some(&last) = indices.last() {
						state.indices.insert(last);
						state.anchor = Some(last);
					}
				}
				SelectionStyle::Multiple => {
					state.indices.extend(indices.iter().copied());
					state.anchor = indices.first().copied();
				}
			}
		})
	}

	/// Adds one index and makes it the anchor.
	pub fn add(&self, index: usize) -> Result<()> {
		let style = self.shared.style;
		self.update(|state| {
			state.check(index);
			match style {
				SelectionStyle::None => return,
				SelectionStyle::SingleOrNone => state.indices.clear(),
				SelectionStyle::Multiple => {}
			}
			state.indices.insert(index);
			state.anchor = Some(index);
		})
	}

	/// Adds every index in `range`, anchoring at its start if unanchored.
	pub fn add_range(&self, range: Range<usize>) -> Result<()> {
		if range.is_empty() {
			return Ok(());
		}
		if self.shared.style != SelectionStyle::Multiple {
			return self.add(range.end - 1);
		}
		self.update(|state| {
			state.check(range.end - 1);
			state.indices.extend(range.clone());
			if state.anchor.is_none() {
				state.anchor = Some(range.start);
			}
		})
	}

	/// Removes one index; removing the anchor clears it.
	pub fn remove(&self, index: usize) -> Result<()> {
		self.update(|state| {
			state.check(index);
			state.indices.remove(&index);
			if state.anchor == Some(index) {
				state.anchor = None;
			}
		})
	}

	/// Adds `index` if absent, otherwise removes it.
	pub fn toggle(&self, index: usize) -> Result<()> {
		if self.contains(index) { self.remove(index) } else { self.add(index) }
	}

	/// Selects the inclusive range between the anchor and `index`.
	///
	/// Without an anchor, the nearest selected index becomes the anchor; with
	/// an empty selection, exactly `{index}` is selected and anchored.
	pub fn extend_to(&self, index: usize) -> Result<()> {
		let style = self.shared.style;
		if style != SelectionStyle::Multiple {
			return self.add(index);
		}
		self.update(|state| {
			state.check(index);
			let anchor = state.anchor.or_else(|| state.nearest_selected(index)).unwrap_or(index);
			state.anchor = Some(anchor);
			state.indices = (anchor.min(index)..=anchor.max(index)).collect();
		})
	}

	/// Deselects everything and drops the anchor.
	pub fn clear(&self) -> Result<()> {
		self.update(|state| {
			state.indices.clear();
			state.anchor = None;
		})
	}

	/// Rebinds to a collection of `len` items, dropping indices past the end.
	pub fn set_bound(&self, len: usize) -> Result<()> {
		self.update(|state| {
			state.len = Some(len);
			state.indices.retain(|&i| i < len);
			if state.anchor.is_some_and(|anchor| anchor >= len) {
				state.anchor = None;
			}
		})
	}

	/// Shifts stored indices for an item inserted at `index`.
	pub fn insert_index(&self, index: usize, notify_changes: bool) -> Result<()> {
		self.remap(notify_changes, |state| state.insert_index(index))
	}

	/// Shifts stored indices for the item removed from `index`.
	pub fn remove_index(&self, index: usize, notify_changes: bool) -> Result<()> {
		self.remap(notify_changes, |state| state.remove_index(index))
	}

	/// Applies a batch of remaps under one lock and fires at most once.
	///
	/// Used by views that restructure many positions at a time.
	pub fn remap_with(&self, notify_changes: bool, f: impl FnOnce(&mut SelectionRemap<'_>)) -> Result<()> {
		self.remap(notify_changes, |state| f(&mut SelectionRemap { state }))
	}

	/// Fires [`Self::changed`] with the current state.
	pub fn notify_changed(&self) -> Result<()> {
		let snapshot = self.snapshot();
		self.shared.changed.fire(&snapshot)
	}

	fn update(&self, f: impl FnOnce(&mut SelectionState)) -> Result<()> {
		let changed = {
			let mut state = self.shared.state.lock();
			let before = state.clone();
			f(&mut state);
			(*state != before).then(|| state.clone())
		};
		match changed {
			Some(snapshot) => self.shared.changed.fire(&snapshot),
			None => Ok(()),
		}
	}

	fn remap(&self, notify_changes: bool, f: impl FnOnce(&mut SelectionState)) -> Result<()> {
		let snapshot = {
			let mut state = self.shared.state.lock();
			f(&mut state);
			notify_changes.then(|| state.clone())
		};
		match snapshot {
			Some(snapshot) => self.shared.changed.fire(&snapshot),
			None => Ok(()),
		}
	}
}

/// Batch remap handle passed to [`Selection::remap_with`].
pub struct SelectionRemap<'a> {
	state: &'a mut SelectionState,
}

impl SelectionRemap<'_> {
	pub fn insert_index(&mut self, index: usize) {
		self.state.insert_index(index);
	}

	pub fn remove_index(&mut self, index: usize) {
		self.state.remove_index(index);
	}

	/// Replaces the selected indices and the anchor outright, keeping the bound.
	///
	/// Used when positions move in ways the per-index shifts cannot express,
	/// such as a reorder. Style limits are not re-applied.
	pub fn reselect(&mut self, indices: impl IntoIterator<Item = usize>, anchor: Option<usize>) {
		let indices: BTreeSet<usize> = indices.into_iter().collect();
		for &index in indices.iter().chain(anchor.as_ref()) {
			self.state.check(index);
		}
		self.state.indices = indices;
		self.state.anchor = anchor;
	}
}

use std::sync::atomic::{AtomicUsize, Ordering};

use proptest::prelude::*;

use super::*;

fn change_counter(selection: &Selection) -> (Arc<AtomicUsize>, crate::Subscription) {
	let count = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&count);
	let sub = selection.changed().subscribe(move |_| {
		counter.fetch_add(1, Ordering::SeqCst);
	});
	(count, sub)
}

#[test]
fn add_remove_contains() {
	let sel = Selection::default();
	sel.add(3).unwrap();
	sel.add(1).unwrap();
	assert!(sel.contains(1));
	assert!(sel.contains(3));
	assert_eq!(sel.indices(), vec![1, 3]);
	assert_eq!(sel.anchor(), Some(1));

	sel.remove(1).unwrap();
	assert_eq!(sel.indices(), vec![3]);
	assert_eq!(sel.anchor(), None, "removing the anchor clears it");
	assert_eq!(sel.current_index(), Some(3));
}

#[test]
fn single_or_none_keeps_one() {
	let sel = Selection::new(SelectionStyle::SingleOrNone);
	sel.add(2).unwrap();
	sel.add(5).unwrap();
	assert_eq!(sel.indices(), vec![5]);
	sel.set([1, 4]).unwrap();
	assert_eq!(sel.indices(), vec![4]);
}

#[test]
fn style_none_selects_nothing() {
	let sel = Selection::new(SelectionStyle::None);
	sel.add(2).unwrap();
	sel.extend_to(4).unwrap();
	assert!(sel.is_empty());
}

#[test]
fn extend_from_anchor() {
	let sel = Selection::default();
	sel.add(2).unwrap();
	sel.extend_to(5).unwrap();
	assert_eq!(sel.indices(), vec![2, 3, 4, 5]);
	sel.extend_to(0).unwrap();
	assert_eq!(sel.indices(), vec![0, 1, 2]);
	assert_eq!(sel.anchor(), Some(2));
}

#[test]
fn extend_without_anchor_on_empty_selects_exactly_target() {
	let sel = Selection::default();
	sel.extend_to(4).unwrap();
	assert_eq!(sel.indices(), vec![4]);
	assert_eq!(sel.anchor(), Some(4));
}

#[test]
fn extend_without_anchor_uses_nearest_selected() {
	let sel = Selection::default();
	sel.set([1, 9]).unwrap();
	sel.remove(1).unwrap();
	assert_eq!(sel.anchor(), None);

	sel.extend_to(6).unwrap();
	assert_eq!(sel.anchor(), Some(9));
	assert_eq!(sel.indices(), vec![6, 7, 8, 9]);
}

#[test]
fn toggle_and_ranges() {
	let sel = Selection::default();
	sel.add_range(2..5).unwrap();
	assert_eq!(sel.indices(), vec![2, 3, 4]);
	assert_eq!(sel.anchor(), Some(2));
	sel.toggle(3).unwrap();
	sel.toggle(7).unwrap();
	assert_eq!(sel.indices(), vec![2, 4, 7]);
	sel.clear().unwrap();
	assert!(sel.is_empty());
	assert_eq!(sel.anchor(), None);
}

#[test]
fn insert_index_shifts_at_and_after() {
	let sel = Selection::default();
	sel.set([1, 3, 5]).unwrap();
	sel.insert_index(3, false).unwrap();
	assert_eq!(sel.indices(), vec![1, 4, 6]);
	assert_eq!(sel.anchor(), Some(1));
}

#[test]
fn remove_index_drops_and_shifts() {
	let sel = Selection::default();
	sel.set([3, 1, 5]).unwrap();
	sel.remove_index(3, false).unwrap();
	assert_eq!(sel.indices(), vec![1, 4]);
	assert_eq!(sel.anchor(), None, "anchor sat on the removed index");
}

#[test]
fn remap_notifies_once_per_call() {
	let sel = Selection::default();
	sel.set([0, 2, 4, 6]).unwrap();
	let (count, _sub) = change_counter(&sel);

	sel.insert_index(0, true).unwrap();
	assert_eq!(count.load(Ordering::SeqCst), 1);
	sel.remove_index(0, false).unwrap();
	assert_eq!(count.load(Ordering::SeqCst), 1);
	sel.remap_with(true, |remap| {
		remap.insert_index(1);
		remap.insert_index(1);
		remap.remove_index(0);
	})
	.unwrap();
	assert_eq!(count.load(Ordering::SeqCst), 2);
	assert_eq!(sel.indices(), vec![3, 5, 7]);
}

#[test]
fn reselect_moves_indices_and_anchor_silently() {
	let sel = Selection::bounded(SelectionStyle::Multiple, 4);
	sel.set([0, 1]).unwrap();
	let (count, _sub) = change_counter(&sel);

	sel.remap_with(false, |remap| remap.reselect([3, 2], Some(3))).unwrap();
	assert_eq!(count.load(Ordering::SeqCst), 0);
	assert_eq!(sel.indices(), vec![2, 3]);
	assert_eq!(sel.anchor(), Some(3));
	assert_eq!(sel.snapshot().bound(), Some(4));
}

#[test]
#[should_panic(expected = "out of bounds")]
fn reselect_past_bound_panics() {
	let sel = Selection::bounded(SelectionStyle::Multiple, 2);
	sel.remap_with(false, |remap| remap.reselect([2], None)).unwrap();
}

#[test]
fn mutators_fire_only_on_change() {
	let sel = Selection::default();
	let (count, _sub) = change_counter(&sel);
	sel.add(1).unwrap();
	sel.add(1).unwrap();
	sel.remove(4).unwrap();
	assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn bounded_tracks_length() {
	let sel = Selection::bounded(SelectionStyle::Multiple, 3);
	sel.add(2).unwrap();
	sel.insert_index(3, false).unwrap();
	assert_eq!(sel.snapshot().bound(), Some(4));
	sel.remove_index(0, false).unwrap();
	assert_eq!(sel.indices(), vec![1]);
	sel.set_bound(1).unwrap();
	assert!(sel.is_empty());
}

#[test]
#[should_panic(expected = "out of bounds")]
fn bounded_remove_index_out_of_range_panics() {
	let sel = Selection::bounded(SelectionStyle::Multiple, 2);
	let _ = sel.remove_index(2, false);
}

#[test]
#[should_panic(expected = "out of bounds")]
fn bounded_add_out_of_range_panics() {
	let sel = Selection::bounded(SelectionStyle::Multiple, 2);
	let _ = sel.add(5);
}

proptest! {
	/// `insert_index(i)` then `remove_index(i)` restores the previous state.
	#[test]
	fn prop_insert_then_remove_restores(
		len in 1usize..40,
		picks in proptest::collection::vec(any::<prop::sample::Index>(), 0..12),
		anchor in any::<prop::sample::Index>(),
		at in any::<prop::sample::Index>(),
	) {
		let sel = Selection::bounded(SelectionStyle::Multiple, len);
		sel.set(picks.iter().map(|p| p.index(len))).unwrap();
		if !picks.is_empty() {
			sel.add(anchor.index(len)).unwrap();
		}
		let before = sel.snapshot();
		let index = at.index(len + 1);

		sel.insert_index(index, false).unwrap();
		prop_assert!(!sel.contains(index));
		sel.remove_index(index, false).unwrap();

		prop_assert_eq!(sel.snapshot(), before);
	}
}

//! Minimal remove/insert script between two sequences of unique keys.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// One edit applied to the sequence as it stands after the previous edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Edit {
	Remove(usize),
	Insert(usize),
}

/// Edits turning `old` into `new`, keeping a longest run of keys whose
/// relative order is unchanged.
///
/// Removals come first, from the highest old index down; insertions follow in
/// ascending new index. Both slices must hold unique keys.
pub(crate) fn edits<K: Copy + Eq + Hash>(old: &[K], new: &[K]) -> Vec<Edit> {
	let new_positions: HashMap<K, usize> = new.iter().enumerate().map(|(i, &k)| (k, i)).collect();
	let survivors: Vec<(usize, usize)> = old
		.iter()
		.enumerate()
		.filter_map(|(old_index, key)| new_positions.get(key).map(|&new_index| (old_index, new_index)))
		.collect();
	let kept: HashSet<usize> = longest_increasing(&survivors).into_iter().collect();

	let mut script: Vec<Edit> = (0..old.len()).rev().filter(|i| !kept.contains(i)).map(Edit::Remove).collect();
	let kept_new: HashSet<usize> = survivors
		.iter()
		.filter(|(old_index, _)| kept.contains(old_index))
		.map(|&(_, new_index)| new_index)
		.collect();
	script.extend((0..new.len()).filter(|j| !kept_new.contains(j)).map(Edit::Insert));
	script
}

/// Old indices of a longest subsequence of `pairs` with strictly increasing
/// new index.
fn longest_increasing(pairs: &[(usize, usize)]) -> Vec<usize> {
	// tails[len] = index into `pairs` of the smallest tail of an increasing run of length len + 1
	let mut tails: Vec<usize> = Vec::new();
	let mut parent: Vec<Option<usize>> = vec![None; pairs.len()];
	for (i, &(_, value)) in pairs.iter().enumerate() {
		let at = tails.partition_point(|&t| pairs[t].1 < value);
		parent[i] = at.checked_sub(1).map(|prev| tails[prev]);
		if at == tails.len() {
			tails.push(i);
		} else {
			tails[at] = i;
		}
	}

	let mut run = Vec::with_capacity(tails.len());
	let mut cursor = tails.last().copied();
	while let Some(i) = cursor {
		run.push(pairs[i].0);
		cursor = parent[i];
	}
	run.reverse();
	run
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use proptest::prelude::*;

	use super::*;

	fn apply(old: &[u32], new: &[u32], script: &[Edit]) -> Vec<u32> {
		let mut seq = old.to_vec();
		for edit in script {
			match *edit {
				Edit::Remove(i) => {
					seq.remove(i);
				}
				Edit::Insert(j) => seq.insert(j, new[j]),
			}
		}
		seq
	}

	#[test]
	fn keeps_longest_ordered_run() {
		let old = [1, 2, 3, 4, 5];
		let new = [2, 5, 3, 4, 6];
		let script = edits(&old, &new);
		assert_eq!(script, vec![Edit::Remove(4), Edit::Remove(0), Edit::Insert(1), Edit::Insert(4)]);
		assert_eq!(apply(&old, &new, &script), new);
	}

	#[test]
	fn identical_sequences_need_no_edits() {
		assert!(edits(&[3, 1, 2], &[3, 1, 2]).is_empty());
	}

	#[test]
	fn reversal_keeps_one() {
		let script = edits(&[1, 2, 3], &[3, 2, 1]);
		assert_eq!(script.len(), 4);
	}

	proptest! {
		#[test]
		fn script_reproduces_target(
			old in proptest::sample::subsequence((0u32..30).collect::<Vec<_>>(), 0..30).prop_shuffle(),
			new in proptest::sample::subsequence((0u32..30).collect::<Vec<_>>(), 0..30).prop_shuffle(),
		) {
			let script = edits(&old, &new);
			prop_assert_eq!(apply(&old, &new, &script), new.clone());

			let removals = script.iter().filter(|e| matches!(e, Edit::Remove(_))).count();
			let common = old.iter().filter(|k| new.contains(k)).count();
			prop_assert!(removals >= old.len() - common);
		}
	}
}

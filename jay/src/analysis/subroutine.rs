use indexmap::IndexSet;
use crate::tree::method::code::{InsnKey, Label};

/// A fixed-size bit set, indexed by local variable slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitSet {
	len: usize,
	words: Vec<u64>,
}

impl BitSet {
	pub fn new(len: usize) -> BitSet {
		BitSet {
			len,
			words: vec![0; len.div_ceil(64)],
		}
	}

	pub fn len(&self) -> usize {
		self.len
	}

	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	pub fn get(&self, index: usize) -> bool {
		assert!(index < self.len, "bit index {index} out of bounds ({})", self.len);
		self.words[index / 64] & (1 << (index % 64)) != 0
	}

	pub fn set(&mut self, index: usize) {
		assert!(index < self.len, "bit index {index} out of bounds ({})", self.len);
		self.words[index / 64] |= 1 << (index % 64);
	}

	/// Ors `other` into this set, returning whether any bit flipped.
	pub fn union_with(&mut self, other: &BitSet) -> bool {
		assert_eq!(self.len, other.len, "bit sets of different sizes");
		let mut changed = false;
		for (word, other_word) in self.words.iter_mut().zip(&other.words) {
			let merged = *word | other_word;
			if merged != *word {
				*word = merged;
				changed = true;
			}
		}
		changed
	}

	/// The indices of the set bits.
	pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
		(0..self.len).filter(|&index| self.get(index))
	}
}

/// A `jsr`/`ret` subroutine discovered in a method: where it starts, which
/// local variables it touches, and the `jsr` instructions calling it.
///
/// The analyzer's "main" subroutine, the code outside of any `jsr`, is the
/// sentinel with `start: None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subroutine {
	/// The label of the subroutine's first instruction; `None` marks the
	/// sentinel for the method's top level.
	pub start: Option<Label>,
	/// One bit per local variable slot the subroutine reads or writes
	/// (both slots, for `long`/`double` accesses).
	pub locals_used: BitSet,
	/// The `jsr` instructions calling this subroutine, in discovery order.
	pub callers: IndexSet<InsnKey>,
}

impl Subroutine {
	pub fn new(start: Option<Label>, max_locals: usize, caller: Option<InsnKey>) -> Subroutine {
		Subroutine {
			start,
			locals_used: BitSet::new(max_locals),
			callers: caller.into_iter().collect(),
		}
	}

	/// Merges `other` into this subroutine: unions the touched locals
	/// always, and the caller sets iff both describe the same subroutine.
	/// Returns whether anything changed.
	pub fn merge(&mut self, other: &Subroutine) -> bool {
		let mut changed = self.locals_used.union_with(&other.locals_used);
		if self.start == other.start {
			for &caller in &other.callers {
				changed |= self.callers.insert(caller);
			}
		}
		changed
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use crate::analysis::subroutine::{BitSet, Subroutine};
	use crate::tree::method::code::{Insn, InsnList, Label};

	#[test]
	fn bits() {
		let mut bits = BitSet::new(70);
		assert!(!bits.get(0));
		assert!(!bits.get(69));

		bits.set(1);
		bits.set(64);
		bits.set(69);
		assert!(bits.get(1));
		assert!(bits.get(64));
		assert!(bits.get(69));
		assert!(!bits.get(2));
		assert_eq!(bits.iter().collect::<Vec<_>>(), vec![1, 64, 69]);
	}

	#[test]
	fn union_reports_changes() {
		let mut a = BitSet::new(8);
		let mut b = BitSet::new(8);
		a.set(1);
		b.set(1);
		b.set(2);

		assert!(a.union_with(&b));
		assert!(a.get(2));
		assert!(!a.union_with(&b));
	}

	#[test]
	fn merge_unions_callers_only_for_same_start() {
		let mut list = InsnList::new();
		let start = Label::new();
		let jsr_a = list.push_back(Insn::Jsr(start));
		let jsr_b = list.push_back(Insn::Jsr(start));

		let mut a = Subroutine::new(Some(start), 4, Some(jsr_a));
		let b = Subroutine::new(Some(start), 4, Some(jsr_b));
		assert!(a.merge(&b));
		assert_eq!(a.callers.len(), 2);

		let mut other = Subroutine::new(Some(Label::new()), 4, None);
		other.locals_used.set(3);
		assert!(a.merge(&other));
		assert!(a.locals_used.get(3));
		assert_eq!(a.callers.len(), 2, "callers of a different subroutine don't leak in");
	}
}

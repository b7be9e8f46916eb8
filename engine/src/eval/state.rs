//! The reactive state protocol: state snapshots and dependency sets.
//!
//! A state snapshot maps conditions to resolved values. It is supplied by the host at evaluation
//! time; an absent key means "not yet resolved", which makes the matching effect evaluate to a
//! signal carrying its condition. The dependency set returned alongside every evaluation records
//! which conditions were read, so the host knows exactly what to resolve (or what changed) before
//! the next pass.

use crate::memory::arena::Arena;
use crate::memory::hash::Hasher;
use crate::memory::term::Term;

/// A state snapshot: a hashmap term from condition to resolved value, or nothing.
///
/// Keeping the snapshot as a term gives it a precomputed structural hash for free, which is what
/// the [cache](super::cache) uses as the overall state hash.
#[derive(Clone, Copy, Debug, Default)]
pub struct State(Option<Term>);

impl State {
    /// The empty snapshot: every effect is unresolved.
    #[inline]
    #[must_use]
    pub const fn empty() -> Self {
        Self(None)
    }

    /// Wraps an existing hashmap term as a snapshot.
    #[must_use]
    pub fn of(entries: Term, arena: &Arena) -> Self {
        assert!(entries.is_hashmap(arena), "state snapshot must be a hashmap term");
        Self(Some(entries))
    }

    /// Builds a snapshot from condition/value pairs.
    #[must_use]
    pub fn from_entries(entries: &[(Term, Term)], arena: &mut Arena) -> Self {
        if entries.is_empty() {
            return Self::empty();
        }
        Self(Some(Term::hashmap(entries, arena)))
    }

    /// The underlying hashmap term, if any.
    #[inline]
    #[must_use]
    pub const fn entries(self) -> Option<Term> {
        self.0
    }

    /// Resolves a condition, returning the value the host supplied for it.
    #[must_use]
    pub fn lookup(self, condition: Term, arena: &Arena) -> Option<Term> {
        self.0.and_then(|entries| entries.hashmap_get(condition, arena))
    }

    /// The hash of the entire snapshot. Bit-identical snapshots hash identically.
    #[must_use]
    pub fn overall_hash(self, arena: &Arena) -> u64 {
        self.0.map_or(0, |entries| entries.hash(arena))
    }
}

/// The set of conditions an evaluation depended on, as a tree spine.
///
/// Structurally identical to a signal payload; semantically a record of reads rather than a
/// failure. Union is tree concatenation, so accumulating dependencies never rewrites existing
/// spines.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Dependencies(Option<Term>);

impl Dependencies {
    /// The empty dependency set.
    #[inline]
    #[must_use]
    pub const fn none() -> Self {
        Self(None)
    }

    /// A dependency set holding a single condition.
    #[inline]
    #[must_use]
    pub const fn of(condition: Term) -> Self {
        Self(Some(condition))
    }

    /// Wraps a condition tree, such as a signal payload.
    #[inline]
    #[must_use]
    pub const fn from_tree(tree: Option<Term>) -> Self {
        Self(tree)
    }

    /// The union of two dependency sets.
    #[must_use]
    pub fn union(self, other: Self, arena: &mut Arena) -> Self {
        Self(Term::join_condition_trees(self.0, other.0, arena))
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0.is_none()
    }

    /// The underlying condition tree, if any.
    #[inline]
    #[must_use]
    pub const fn as_tree(self) -> Option<Term> {
        self.0
    }

    /// The distinct conditions in this set, in first-read order.
    #[must_use]
    pub fn conditions(self, arena: &Arena) -> Vec<Term> {
        self.0.map_or_else(Vec::new, |tree| tree.distinct_conditions(arena))
    }

    /// Whether this set contains a condition equal to the given one.
    #[must_use]
    pub fn contains(self, condition: Term, arena: &Arena) -> bool {
        let Some(tree) = self.0 else {
            return false;
        };
        let mut found = false;
        tree.walk_conditions(arena, &mut |leaf| found |= leaf.equals(condition, arena));
        found
    }

    /// The state fingerprint restricted to this dependency set.
    ///
    /// Folds the hash of the state value for each condition in spine order, substituting zero for
    /// conditions the snapshot does not resolve. Two snapshots that agree on every condition in
    /// the set produce the same fingerprint, which is the cache's subset-invalidation test.
    #[must_use]
    pub fn minimal_state_hash(self, state: State, arena: &Arena) -> u64 {
        let Some(tree) = self.0 else {
            return Hasher::new().finish();
        };
        let mut hasher = Hasher::new();
        tree.walk_conditions(arena, &mut |condition| {
            hasher = hasher.write_hash(state.lookup(condition, arena).map_or(0, |value| value.hash(arena)));
        });
        hasher.finish()
    }
}

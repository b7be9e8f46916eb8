//! The memoization cache for applications.
//!
//! Each entry pairs an invocation fingerprint with the cached result, the dependency set of that
//! result, and two state fingerprints: the hash of the entire snapshot the entry was computed
//! against (the fast path) and the hash of just the values the result depended on (the precise
//! path). An entry survives any state change that leaves its dependency subset intact; anything
//! else evicts it. There is deliberately no capacity bound: the cache is monotonic between
//! [bulk resets](crate::memory::arena::Arena::reset).

use crate::eval::state::{Dependencies, State};
use crate::memory::arena::Arena;
use crate::memory::hash::Hasher;
use crate::memory::term::Term;

/// Smallest bucket capacity of the cache table.
const MIN_CAPACITY: usize = 1024;

/// Load factor threshold above which the table doubles.
const MAX_LOAD_NUMERATOR: usize = 1;
const MAX_LOAD_DENOMINATOR: usize = 2;

/// A cached application result.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct ApplicationCache {
    pub(crate) value: Term,
    pub(crate) dependencies: Dependencies,
    /// Hash of the entire state snapshot the entry was computed (or last validated) against.
    pub(crate) overall_state_hash: u64,
    /// State fingerprint restricted to `dependencies`.
    pub(crate) minimal_state_hash: u64,
}

/// An open-addressed table from invocation fingerprint to [`ApplicationCache`].
///
/// Fingerprints are never zero (the hasher's offset basis guarantees a non-zero output for the
/// inputs we feed it), so zero marks an empty slot.
pub(crate) struct EvaluationCache {
    slots: Vec<(u64, Option<ApplicationCache>)>,
    occupied: usize,
}

impl EvaluationCache {
    pub(crate) fn new() -> Self {
        Self { slots: vec![(0, None); MIN_CAPACITY], occupied: 0 }
    }

    pub(crate) fn len(&self) -> usize {
        self.occupied
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.slots.resize(MIN_CAPACITY, (0, None));
        self.occupied = 0;
    }

    pub(crate) fn entry(&self, key: u64) -> Option<ApplicationCache> {
        debug_assert!(key != 0, "invocation fingerprints are non-zero");
        let mask = self.slots.len() - 1;
        let mut slot = (key as usize) & mask;
        loop {
            match self.slots[slot] {
                (0, _) => return None,
                (occupant, entry) if occupant == key => return entry,
                _ => slot = (slot + 1) & mask,
            }
        }
    }

    /// Inserts or overwrites the entry for `key`, growing at the load-factor threshold.
    pub(crate) fn insert(&mut self, key: u64, entry: ApplicationCache) {
        debug_assert!(key != 0, "invocation fingerprints are non-zero");
        if (self.occupied + 1) * MAX_LOAD_DENOMINATOR > self.slots.len() * MAX_LOAD_NUMERATOR {
            self.grow();
        }
        let mask = self.slots.len() - 1;
        let mut slot = (key as usize) & mask;
        loop {
            match self.slots[slot].0 {
                0 => {
                    self.slots[slot] = (key, Some(entry));
                    self.occupied += 1;
                    return;
                },
                occupant if occupant == key => {
                    self.slots[slot].1 = Some(entry);
                    return;
                },
                _ => slot = (slot + 1) & mask,
            }
        }
    }

    /// Refreshes the overall state hash of an existing entry after a minimal-hash match, so the
    /// next lookup against the same snapshot takes the fast path.
    pub(crate) fn refresh(&mut self, key: u64, overall_state_hash: u64) {
        let mask = self.slots.len() - 1;
        let mut slot = (key as usize) & mask;
        loop {
            match &mut self.slots[slot] {
                (0, _) => return,
                (occupant, Some(entry)) if *occupant == key => {
                    entry.overall_state_hash = overall_state_hash;
                    return;
                },
                _ => slot = (slot + 1) & mask,
            }
        }
    }

    /// Doubles the occupied capacity and rehashes every live entry.
    fn grow(&mut self) {
        let capacity = (self.slots.len() * 2).max(MIN_CAPACITY);
        log::debug!("application cache grown to {capacity} slots ({} occupied)", self.occupied);
        let old = std::mem::replace(&mut self.slots, vec![(0, None); capacity]);
        self.occupied = 0;
        for (key, entry) in old {
            if key != 0 {
                if let Some(entry) = entry {
                    self.insert(key, entry);
                }
            }
        }
    }
}

/// Computes the invocation fingerprint of applying `target` to `args`.
///
/// The function identity and every argument contribute their structural hashes, so two
/// invocations fingerprint identically exactly when target and arguments are structurally equal.
#[must_use]
pub(crate) fn invocation_fingerprint(target: Term, args: &[Term], arena: &Arena) -> u64 {
    let hasher = args
        .iter()
        .fold(Hasher::new().write_hash(target.hash(arena)), |hasher, &arg| hasher.write_hash(arg.hash(arena)));
    let fingerprint = hasher.finish();
    // Zero marks an empty slot; remap the (vanishingly unlikely) zero fingerprint.
    if fingerprint == 0 { 1 } else { fingerprint }
}

/// The outcome of consulting the cache for one invocation.
pub(crate) enum CacheOutcome {
    Hit { value: Term, dependencies: Dependencies },
    Miss,
}

/// Runs the lookup protocol for fingerprint `key` against the given snapshot.
///
/// On a minimal-hash revalidation the entry's overall hash is refreshed in place; on a subset
/// mismatch the entry is left to be overwritten by the recomputation's insert.
pub(crate) fn lookup(key: u64, state: State, arena: &mut Arena) -> CacheOutcome {
    let Some(entry) = arena.cache_entry(key) else {
        return CacheOutcome::Miss;
    };
    let overall = state.overall_hash(arena);
    if entry.overall_state_hash == overall {
        log::debug!("cache hit (overall) for {key:#018x}");
        return CacheOutcome::Hit { value: entry.value, dependencies: entry.dependencies };
    }
    let minimal = entry.dependencies.minimal_state_hash(state, arena);
    if minimal == entry.minimal_state_hash {
        log::debug!("cache hit (minimal) for {key:#018x}");
        arena.cache_refresh(key, overall);
        return CacheOutcome::Hit { value: entry.value, dependencies: entry.dependencies };
    }
    log::debug!("cache invalidated for {key:#018x}");
    CacheOutcome::Miss
}

/// Records a freshly computed application result.
pub(crate) fn record(key: u64, value: Term, dependencies: Dependencies, state: State, arena: &mut Arena) {
    let entry = ApplicationCache {
        value,
        dependencies,
        overall_state_hash: state.overall_hash(arena),
        minimal_state_hash: dependencies.minimal_state_hash(state, arena),
    };
    arena.cache_insert(key, entry);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(value: Term, overall: u64, minimal: u64) -> ApplicationCache {
        ApplicationCache {
            value,
            dependencies: Dependencies::none(),
            overall_state_hash: overall,
            minimal_state_hash: minimal,
        }
    }

    #[test]
    fn insert_then_lookup() {
        let mut arena = Arena::new();
        let value = Term::int(7, &mut arena);
        let mut cache = EvaluationCache::new();
        cache.insert(0xabcd, entry(value, 1, 2));
        let found = cache.entry(0xabcd).unwrap();
        assert_eq!(found.value, value);
        assert_eq!(found.overall_state_hash, 1);
        assert_eq!(cache.entry(0xdcba), None);
    }

    #[test]
    fn overwrite_replaces_in_place() {
        let mut arena = Arena::new();
        let first = Term::int(7, &mut arena);
        let second = Term::int(13, &mut arena);
        let mut cache = EvaluationCache::new();
        cache.insert(0xabcd, entry(first, 1, 2));
        cache.insert(0xabcd, entry(second, 3, 4));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.entry(0xabcd).unwrap().value, second);
    }

    #[test]
    fn refresh_updates_overall_hash_only() {
        let mut arena = Arena::new();
        let value = Term::int(7, &mut arena);
        let mut cache = EvaluationCache::new();
        cache.insert(0xabcd, entry(value, 1, 2));
        cache.refresh(0xabcd, 99);
        let found = cache.entry(0xabcd).unwrap();
        assert_eq!(found.overall_state_hash, 99);
        assert_eq!(found.minimal_state_hash, 2);
    }

    #[test]
    fn grows_past_the_load_factor() {
        let mut arena = Arena::new();
        let value = Term::int(7, &mut arena);
        let mut cache = EvaluationCache::new();
        for key in 1..=2000_u64 {
            cache.insert(key, entry(value, key, key));
        }
        assert_eq!(cache.len(), 2000);
        for key in 1..=2000_u64 {
            assert_eq!(cache.entry(key).unwrap().overall_state_hash, key);
        }
    }

    #[test]
    fn fingerprints_reflect_structure() {
        let mut arena = Arena::new();
        let add = Term::builtin(crate::builtins::BuiltinId::Add, &mut arena);
        let three = Term::int(3, &mut arena);
        let four = Term::int(4, &mut arena);

        let first = invocation_fingerprint(add, &[three, four], &arena);
        let second = invocation_fingerprint(add, &[three, four], &arena);
        let reversed = invocation_fingerprint(add, &[four, three], &arena);
        assert_eq!(first, second);
        assert_ne!(first, reversed);
    }
}

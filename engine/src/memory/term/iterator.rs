//! The iteration protocol and the lazy iterator term variants.
//!
//! Iterators are terms like everything else: constructing a map or filter allocates a small node
//! and nothing more. Work happens in [`iterator_next`](Term::iterator_next), which advances one
//! step given an opaque iteration-state term (an int or a small list, chosen per variant) and the
//! reactive state snapshot, returning the item, the successor iteration state and any
//! dependencies the step accumulated. Exhaustion is an absent item.

use crate::eval::evaluator::apply_and_evaluate;
use crate::eval::state::{Dependencies, State};
use crate::memory::arena::Arena;
use crate::memory::term::{Payload, Term};

/// One step of an iteration.
pub struct IterStep {
    /// The produced item; absent on exhaustion.
    pub item: Option<Term>,
    /// The iteration state to pass to the next step.
    pub state: Term,
    /// Dependencies accumulated while producing the item.
    pub dependencies: Dependencies,
}

impl IterStep {
    fn exhausted(arena: &Arena) -> Self {
        Self { item: None, state: Term::nil(arena), dependencies: Dependencies::none() }
    }

    fn item(item: Term, state: Term, dependencies: Dependencies) -> Self {
        Self { item: Some(item), state, dependencies }
    }
}

impl Term {
    /// The empty iterator singleton.
    #[inline]
    #[must_use]
    pub fn empty_iterator(arena: &Arena) -> Self {
        arena.singletons.empty_iterator
    }

    /// An iterator yielding a single value.
    #[must_use]
    pub fn once_iterator(value: Self, arena: &mut Arena) -> Self {
        arena.intern(Payload::OnceIterator { value })
    }

    /// An iterator yielding a value forever.
    #[must_use]
    pub fn repeat_iterator(value: Self, arena: &mut Arena) -> Self {
        arena.intern(Payload::RepeatIterator { value })
    }

    /// An iterator over `len` consecutive integers starting at `start`.
    #[must_use]
    pub fn range_iterator(start: i64, len: i64, arena: &mut Arena) -> Self {
        arena.intern(Payload::RangeIterator { start, len: len.max(0) })
    }

    /// The unbounded iterator over the non-negative integers.
    #[must_use]
    pub fn integers_iterator(arena: &mut Arena) -> Self {
        arena.intern(Payload::IntegersIterator)
    }

    /// A lazy map over `source`, applying `transform` to each item.
    #[must_use]
    pub fn map_iterator(source: Self, transform: Self, arena: &mut Arena) -> Self {
        arena.intern(Payload::MapIterator { source, transform })
    }

    /// A lazy filter over `source`, keeping items `predicate` accepts.
    #[must_use]
    pub fn filter_iterator(source: Self, predicate: Self, arena: &mut Arena) -> Self {
        arena.intern(Payload::FilterIterator { source, predicate })
    }

    /// A lazy flattening of an iterator of iterables.
    #[must_use]
    pub fn flatten_iterator(source: Self, arena: &mut Arena) -> Self {
        arena.intern(Payload::FlattenIterator { source })
    }

    /// A lazy pairwise zip, exhausting with the shorter side.
    #[must_use]
    pub fn zip_iterator(left: Self, right: Self, arena: &mut Arena) -> Self {
        arena.intern(Payload::ZipIterator { left, right })
    }

    /// A lazy skip of the first `count` items of `source`.
    #[must_use]
    pub fn skip_iterator(source: Self, count: u32, arena: &mut Arena) -> Self {
        arena.intern(Payload::SkipIterator { source, count })
    }

    /// A lazy truncation of `source` to `count` items.
    #[must_use]
    pub fn take_iterator(source: Self, count: u32, arena: &mut Arena) -> Self {
        arena.intern(Payload::TakeIterator { source, count })
    }

    /// A lazy evaluation of each item of `source` against the current state snapshot.
    #[must_use]
    pub fn evaluate_iterator(source: Self, arena: &mut Arena) -> Self {
        arena.intern(Payload::EvaluateIterator { source })
    }

    /// A lazy interspersal of `separator` between consecutive items of `source`.
    #[must_use]
    pub fn intersperse_iterator(source: Self, separator: Self, arena: &mut Arena) -> Self {
        arena.intern(Payload::IntersperseIterator { source, separator })
    }

    /// A lazy iterator over the keys of a hashmap.
    #[must_use]
    pub fn keys_iterator(source: Self, arena: &mut Arena) -> Self {
        arena.intern(Payload::KeysIterator { source })
    }

    /// A lazy iterator over the values of a hashmap.
    #[must_use]
    pub fn values_iterator(source: Self, arena: &mut Arena) -> Self {
        arena.intern(Payload::ValuesIterator { source })
    }

    /// Whether this term is one of the iterator variants.
    #[must_use]
    pub fn is_iterator(self, arena: &Arena) -> bool {
        matches!(
            arena.payload(self),
            Payload::EmptyIterator
                | Payload::OnceIterator { .. }
                | Payload::RepeatIterator { .. }
                | Payload::RangeIterator { .. }
                | Payload::IntegersIterator
                | Payload::MapIterator { .. }
                | Payload::FilterIterator { .. }
                | Payload::FlattenIterator { .. }
                | Payload::ZipIterator { .. }
                | Payload::SkipIterator { .. }
                | Payload::TakeIterator { .. }
                | Payload::EvaluateIterator { .. }
                | Payload::IntersperseIterator { .. }
                | Payload::KeysIterator { .. }
                | Payload::ValuesIterator { .. }
        )
    }

    /// Returns the iterator view of this term: iterators iterate as themselves, collections
    /// iterate over their contents. Non-iterable terms return nothing.
    #[must_use]
    pub fn iterate(self, arena: &Arena) -> Option<Self> {
        (self.is_iterator(arena)
            || matches!(
                arena.payload(self),
                Payload::List(_)
                    | Payload::Record { .. }
                    | Payload::Hashmap(_)
                    | Payload::Hashset { .. }
                    | Payload::Tree { .. }
            ))
        .then_some(self)
    }

    /// The number of items this iterable will yield, when statically known.
    #[must_use]
    pub fn size_hint(self, arena: &Arena) -> Option<u64> {
        match *arena.payload(self) {
            Payload::EmptyIterator => Some(0),
            Payload::OnceIterator { .. } => Some(1),
            Payload::RepeatIterator { .. } | Payload::IntegersIterator => None,
            Payload::RangeIterator { len, .. } => Some(u64::try_from(len).unwrap_or(0)),
            Payload::MapIterator { source, .. } | Payload::EvaluateIterator { source } => source.size_hint(arena),
            Payload::FilterIterator { .. } | Payload::FlattenIterator { .. } => None,
            Payload::ZipIterator { left, right } => Some(left.size_hint(arena)?.min(right.size_hint(arena)?)),
            Payload::SkipIterator { source, count } => {
                source.size_hint(arena).map(|hint| hint.saturating_sub(u64::from(count)))
            },
            Payload::TakeIterator { source, count } => match source.size_hint(arena) {
                Some(hint) => Some(hint.min(u64::from(count))),
                None => Some(u64::from(count)),
            },
            Payload::IntersperseIterator { source, .. } => {
                source.size_hint(arena).map(|hint| if hint == 0 { 0 } else { hint * 2 - 1 })
            },
            Payload::KeysIterator { source } | Payload::ValuesIterator { source } => {
                source.hashmap_len(arena).map(u64::from)
            },
            Payload::List(items) => Some(u64::from(items.len)),
            Payload::Record { keys, .. } => keys.list_len(arena).map(u64::from),
            Payload::Hashmap(buckets) => Some(u64::from(buckets.entries)),
            Payload::Hashset { entries } => entries.hashmap_len(arena).map(u64::from),
            Payload::Tree { len, .. } => Some(u64::from(len)),
            _ => None,
        }
    }

    /// Whether collecting this iterable can never terminate.
    #[must_use]
    pub fn is_unbounded(self, arena: &Arena) -> bool {
        match *arena.payload(self) {
            Payload::RepeatIterator { .. } | Payload::IntegersIterator => true,
            Payload::MapIterator { source, .. }
            | Payload::FilterIterator { source, .. }
            | Payload::EvaluateIterator { source }
            | Payload::IntersperseIterator { source, .. }
            | Payload::SkipIterator { source, .. }
            | Payload::FlattenIterator { source } => source.is_unbounded(arena),
            Payload::ZipIterator { left, right } => left.is_unbounded(arena) && right.is_unbounded(arena),
            _ => false,
        }
    }

    /// Advances an iteration by one step.
    ///
    /// `iteration_state` is the value returned by the previous step, or absent to begin. The
    /// reactive snapshot is threaded through because map, filter and evaluate steps run the
    /// evaluator and may therefore read state.
    #[must_use]
    pub fn iterator_next(self, iteration_state: Option<Self>, state: State, arena: &mut Arena) -> IterStep {
        match *arena.payload(self) {
            Payload::EmptyIterator => IterStep::exhausted(arena),

            Payload::OnceIterator { value } => match iteration_state {
                None => {
                    let done = Self::int(1, arena);
                    IterStep::item(value, done, Dependencies::none())
                },
                Some(_) => IterStep::exhausted(arena),
            },

            Payload::RepeatIterator { value } => {
                let state_term = Self::nil(arena);
                IterStep::item(value, state_term, Dependencies::none())
            },

            Payload::RangeIterator { start, len } => {
                let index = decode_index(iteration_state, arena);
                if index >= len {
                    return IterStep::exhausted(arena);
                }
                let item = Self::int(start + index, arena);
                let next = Self::int(index + 1, arena);
                IterStep::item(item, next, Dependencies::none())
            },

            Payload::IntegersIterator => {
                let index = decode_index(iteration_state, arena);
                let item = Self::int(index, arena);
                let next = Self::int(index + 1, arena);
                IterStep::item(item, next, Dependencies::none())
            },

            Payload::List(items) => {
                let index = decode_index(iteration_state, arena);
                let Ok(index_u32) = u32::try_from(index) else {
                    return IterStep::exhausted(arena);
                };
                if index_u32 >= items.len {
                    return IterStep::exhausted(arena);
                }
                let item = arena.item(items, index_u32);
                let next = Self::int(index + 1, arena);
                IterStep::item(item, next, Dependencies::none())
            },

            Payload::Record { keys, values, .. } => {
                let index = decode_index(iteration_state, arena);
                let Ok(index_u32) = u32::try_from(index) else {
                    return IterStep::exhausted(arena);
                };
                let (Some(key), Some(value)) =
                    (keys.list_item(index_u32, arena), values.list_item(index_u32, arena))
                else {
                    return IterStep::exhausted(arena);
                };
                let item = Self::list(&[key, value], arena);
                let next = Self::int(index + 1, arena);
                IterStep::item(item, next, Dependencies::none())
            },

            Payload::Hashmap(buckets) => next_bucket(buckets, iteration_state, BucketPart::Entry, arena),
            Payload::KeysIterator { source } => match *arena.payload(source) {
                Payload::Hashmap(buckets) => next_bucket(buckets, iteration_state, BucketPart::Key, arena),
                _ => IterStep::exhausted(arena),
            },
            Payload::ValuesIterator { source } => match *arena.payload(source) {
                Payload::Hashmap(buckets) => next_bucket(buckets, iteration_state, BucketPart::Value, arena),
                _ => IterStep::exhausted(arena),
            },
            Payload::Hashset { entries } => match *arena.payload(entries) {
                Payload::Hashmap(buckets) => next_bucket(buckets, iteration_state, BucketPart::Key, arena),
                _ => IterStep::exhausted(arena),
            },

            Payload::Tree { .. } => {
                let index = decode_index(iteration_state, arena);
                let Ok(index_u32) = u32::try_from(index) else {
                    return IterStep::exhausted(arena);
                };
                match self.tree_leaf(index_u32, arena) {
                    Some(item) => {
                        let next = Self::int(index + 1, arena);
                        IterStep::item(item, next, Dependencies::none())
                    },
                    None => IterStep::exhausted(arena),
                }
            },

            Payload::MapIterator { source, transform } => {
                let step = source.iterator_next(decode_state(iteration_state, arena), state, arena);
                let Some(item) = step.item else {
                    return IterStep::exhausted(arena);
                };
                let (mapped, dependencies) = apply_and_evaluate(transform, &[item], state, arena);
                let dependencies = step.dependencies.union(dependencies, arena);
                IterStep::item(mapped, step.state, dependencies)
            },

            Payload::FilterIterator { source, predicate } => {
                let mut inner = decode_state(iteration_state, arena);
                let mut dependencies = Dependencies::none();
                loop {
                    let step = source.iterator_next(inner, state, arena);
                    dependencies = dependencies.union(step.dependencies, arena);
                    let Some(item) = step.item else {
                        return IterStep { item: None, state: step.state, dependencies };
                    };
                    let (verdict, verdict_dependencies) = apply_and_evaluate(predicate, &[item], state, arena);
                    dependencies = dependencies.union(verdict_dependencies, arena);
                    if verdict.is_signal(arena) {
                        // A failing predicate surfaces as the item so the failure propagates.
                        return IterStep::item(verdict, step.state, dependencies);
                    }
                    if verdict.is_truthy(arena) {
                        return IterStep::item(item, step.state, dependencies);
                    }
                    inner = Some(step.state);
                }
            },

            Payload::FlattenIterator { source } => next_flattened(source, iteration_state, state, arena),

            Payload::ZipIterator { left, right } => {
                let (left_state, right_state) = match iteration_state {
                    None => (None, None),
                    Some(pair) => (
                        decode_state(pair.list_item(0, arena), arena),
                        decode_state(pair.list_item(1, arena), arena),
                    ),
                };
                let left_step = left.iterator_next(left_state, state, arena);
                let right_step = right.iterator_next(right_state, state, arena);
                let dependencies = left_step.dependencies.union(right_step.dependencies, arena);
                match (left_step.item, right_step.item) {
                    (Some(first), Some(second)) => {
                        let item = Self::list(&[first, second], arena);
                        let next = Self::list(&[left_step.state, right_step.state], arena);
                        IterStep::item(item, next, dependencies)
                    },
                    _ => IterStep { item: None, state: Self::nil(arena), dependencies },
                }
            },

            Payload::SkipIterator { source, count } => {
                let mut dependencies = Dependencies::none();
                let mut inner = decode_state(iteration_state, arena);
                if iteration_state.is_none() {
                    for _ in 0..count {
                        let step = source.iterator_next(inner, state, arena);
                        dependencies = dependencies.union(step.dependencies, arena);
                        if step.item.is_none() {
                            return IterStep { item: None, state: step.state, dependencies };
                        }
                        inner = Some(step.state);
                    }
                }
                let step = source.iterator_next(inner, state, arena);
                IterStep {
                    item: step.item,
                    state: step.state,
                    dependencies: dependencies.union(step.dependencies, arena),
                }
            },

            Payload::TakeIterator { source, count } => {
                let (consumed, inner) = match iteration_state {
                    None => (0, None),
                    Some(pair) => (
                        pair.list_item(0, arena).and_then(|term| term.as_int(arena)).unwrap_or(0),
                        decode_state(pair.list_item(1, arena), arena),
                    ),
                };
                if consumed >= i64::from(count) {
                    return IterStep::exhausted(arena);
                }
                let step = source.iterator_next(inner, state, arena);
                let Some(item) = step.item else {
                    return IterStep { item: None, state: step.state, dependencies: step.dependencies };
                };
                let consumed = Self::int(consumed + 1, arena);
                let next = Self::list(&[consumed, step.state], arena);
                IterStep::item(item, next, step.dependencies)
            },

            Payload::EvaluateIterator { source } => {
                let step = source.iterator_next(decode_state(iteration_state, arena), state, arena);
                let Some(item) = step.item else {
                    return IterStep { item: None, state: step.state, dependencies: step.dependencies };
                };
                let (evaluated, dependencies) = crate::eval::evaluate(item, state, arena);
                let dependencies = step.dependencies.union(dependencies, arena);
                IterStep::item(evaluated, step.state, dependencies)
            },

            Payload::IntersperseIterator { source, separator } => {
                next_interspersed(source, separator, iteration_state, state, arena)
            },

            _ => IterStep::exhausted(arena),
        }
    }

    /// The `index`-th leaf condition of a tree term, located through the precomputed lengths.
    #[must_use]
    pub(crate) fn tree_leaf(self, index: u32, arena: &Arena) -> Option<Self> {
        match *arena.payload(self) {
            Payload::Tree { left, right, len } => {
                if index >= len {
                    return None;
                }
                let left_len = left.map_or(0, |child| match *arena.payload(child) {
                    Payload::Tree { len, .. } => len,
                    _ => 1,
                });
                if index < left_len {
                    let left = left?;
                    match arena.payload(left) {
                        Payload::Tree { .. } => left.tree_leaf(index, arena),
                        _ => Some(left),
                    }
                } else {
                    let right = right?;
                    match arena.payload(right) {
                        Payload::Tree { .. } => right.tree_leaf(index - left_len, arena),
                        _ => (index == left_len).then_some(right),
                    }
                }
            },
            _ => None,
        }
    }
}

/// Which half of a bucket entry an iteration yields.
enum BucketPart {
    Key,
    Value,
    Entry,
}

/// Advances over the occupied slots of a bucket array; the iteration state is the next slot.
fn next_bucket(
    buckets: crate::memory::term::BucketsRef,
    iteration_state: Option<Term>,
    part: BucketPart,
    arena: &mut Arena,
) -> IterStep {
    let mut slot = decode_index(iteration_state, arena);
    while let Ok(slot_u32) = u32::try_from(slot) {
        if slot_u32 >= buckets.capacity {
            break;
        }
        let entry = arena.buckets(buckets).nth(slot_u32 as usize).flatten();
        if let Some((key, value)) = entry {
            let item = match part {
                BucketPart::Key => key,
                BucketPart::Value => value,
                BucketPart::Entry => Term::list(&[key, value], arena),
            };
            let next = Term::int(slot + 1, arena);
            return IterStep::item(item, next, Dependencies::none());
        }
        slot += 1;
    }
    IterStep::exhausted(arena)
}

/// Advances a flatten: the iteration state is `[outer_state, inner_or_nil, inner_state]`.
fn next_flattened(source: Term, iteration_state: Option<Term>, state: State, arena: &mut Arena) -> IterStep {
    let (mut outer_state, mut inner, mut inner_state) = match iteration_state {
        None => (None, None, None),
        Some(triple) => (
            decode_state(triple.list_item(0, arena), arena),
            triple.list_item(1, arena).filter(|term| !term.is_nil(arena)),
            decode_state(triple.list_item(2, arena), arena),
        ),
    };
    let mut dependencies = Dependencies::none();
    loop {
        if let Some(current) = inner {
            let step = current.iterator_next(inner_state, state, arena);
            dependencies = dependencies.union(step.dependencies, arena);
            if let Some(item) = step.item {
                let outer = encode_state(outer_state, arena);
                let next = Term::list(&[outer, current, step.state], arena);
                return IterStep::item(item, next, dependencies);
            }
            inner = None;
            inner_state = None;
        }
        let step = source.iterator_next(outer_state, state, arena);
        dependencies = dependencies.union(step.dependencies, arena);
        let Some(item) = step.item else {
            return IterStep { item: None, state: Term::nil(arena), dependencies };
        };
        outer_state = Some(step.state);
        match item.iterate(arena) {
            Some(iterable) => {
                inner = Some(iterable);
                inner_state = None;
            },
            // A non-iterable item passes through as a single element.
            None => {
                let outer = encode_state(outer_state, arena);
                let nil = Term::nil(arena);
                let next = Term::list(&[outer, nil, nil], arena);
                return IterStep::item(item, next, dependencies);
            },
        }
    }
}

/// Advances an intersperse: the iteration state is `[phase, inner_state, stashed_item]`.
///
/// Phase 0 fetches the next source item and, when one exists, yields the separator while
/// stashing the item; phase 1 yields the stashed item.
fn next_interspersed(
    source: Term,
    separator: Term,
    iteration_state: Option<Term>,
    state: State,
    arena: &mut Arena,
) -> IterStep {
    match iteration_state {
        None => {
            let step = source.iterator_next(None, state, arena);
            let Some(item) = step.item else {
                return IterStep { item: None, state: Term::nil(arena), dependencies: step.dependencies };
            };
            let phase = Term::int(0, arena);
            let nil = Term::nil(arena);
            let next = Term::list(&[phase, step.state, nil], arena);
            IterStep::item(item, next, step.dependencies)
        },
        Some(triple) => {
            let phase = triple.list_item(0, arena).and_then(|term| term.as_int(arena)).unwrap_or(0);
            let inner = decode_state(triple.list_item(1, arena), arena);
            if phase == 1 {
                let stashed = triple.list_item(2, arena).expect("intersperse stash missing");
                let phase = Term::int(0, arena);
                let inner = encode_state(inner, arena);
                let nil = Term::nil(arena);
                let next = Term::list(&[phase, inner, nil], arena);
                return IterStep::item(stashed, next, Dependencies::none());
            }
            let step = source.iterator_next(inner, state, arena);
            let Some(item) = step.item else {
                return IterStep { item: None, state: Term::nil(arena), dependencies: step.dependencies };
            };
            let phase = Term::int(1, arena);
            let next = Term::list(&[phase, step.state, item], arena);
            IterStep::item(separator, next, step.dependencies)
        },
    }
}

/// Decodes an optional inner iteration state; `nil` is the fresh-start marker.
fn decode_state(state: Option<Term>, arena: &Arena) -> Option<Term> {
    state.filter(|term| !term.is_nil(arena))
}

/// Encodes an optional inner iteration state as a term.
fn encode_state(state: Option<Term>, arena: &Arena) -> Term {
    state.unwrap_or_else(|| Term::nil(arena))
}

/// Decodes an integer iteration index; absent or non-integer means zero.
fn decode_index(state: Option<Term>, arena: &Arena) -> i64 {
    state.and_then(|term| term.as_int(arena)).unwrap_or(0)
}

/// Drains an iterable into a list term, accumulating dependencies.
///
/// Signal items collapse the collection: the result is the union of every signal encountered up
/// to the point of exhaustion of the remaining strict items. Unbounded iterators cannot be
/// drained and produce an error signal instead.
pub(crate) fn collect_iterable(term: Term, state: State, arena: &mut Arena) -> (Term, Dependencies) {
    if term.is_list(arena) {
        return (term, Dependencies::none());
    }
    let Some(iterator) = term.iterate(arena) else {
        return (term, Dependencies::none());
    };
    if iterator.is_unbounded(arena) {
        let message = Term::string("cannot collect an unbounded iterator", arena);
        let condition = Term::condition_error(message, arena);
        return (Term::signal_of(condition, arena), Dependencies::none());
    }
    let mut dependencies = Dependencies::none();
    let mut items = Vec::with_capacity(iterator.size_hint(arena).map_or(0, |hint| usize::try_from(hint).unwrap_or(0)));
    let mut signal: Option<Term> = None;
    let mut iteration_state = None;
    loop {
        let step = iterator.iterator_next(iteration_state, state, arena);
        dependencies = dependencies.union(step.dependencies, arena);
        let Some(item) = step.item else {
            break;
        };
        if item.is_signal(arena) {
            signal = Some(match signal {
                None => item,
                Some(accumulated) => accumulated.union_signals(item, arena),
            });
        } else {
            items.push(item);
        }
        iteration_state = Some(step.state);
    }
    match signal {
        Some(signal) => (signal, dependencies),
        None => (Term::list(&items, arena), dependencies),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::BuiltinId;

    fn drain(iterator: Term, arena: &mut Arena) -> Vec<Term> {
        let mut items = Vec::new();
        let mut iteration_state = None;
        loop {
            let step = iterator.iterator_next(iteration_state, State::empty(), arena);
            match step.item {
                Some(item) => items.push(item),
                None => return items,
            }
            iteration_state = Some(step.state);
        }
    }

    fn int_items(items: &[i64], arena: &mut Arena) -> Vec<Term> {
        items.iter().map(|&value| Term::int(value, arena)).collect()
    }

    #[test]
    fn empty_and_once() {
        let mut arena = Arena::new();
        let empty = Term::empty_iterator(&arena);
        assert!(drain(empty, &mut arena).is_empty());
        assert_eq!(empty.size_hint(&arena), Some(0));

        let value = Term::int(5, &mut arena);
        let once = Term::once_iterator(value, &mut arena);
        assert_eq!(drain(once, &mut arena), vec![value]);
        assert_eq!(once.size_hint(&arena), Some(1));
    }

    #[test]
    fn range_yields_consecutive_integers() {
        let mut arena = Arena::new();
        let range = Term::range_iterator(3, 4, &mut arena);
        let expected = int_items(&[3, 4, 5, 6], &mut arena);
        assert_eq!(drain(range, &mut arena), expected);
        assert_eq!(range.size_hint(&arena), Some(4));
    }

    #[test]
    fn list_iteration_preserves_order() {
        let mut arena = Arena::new();
        let items = int_items(&[10, 20, 30], &mut arena);
        let list = Term::list(&items, &mut arena);
        assert_eq!(drain(list, &mut arena), items);
    }

    #[test]
    fn map_applies_lazily() {
        let mut arena = Arena::new();
        let range = Term::range_iterator(1, 3, &mut arena);
        let add = Term::builtin(BuiltinId::Add, &mut arena);
        let ten = Term::int(10, &mut arena);
        let add_ten = Term::partial(add, &[ten], &mut arena);
        let mapped = Term::map_iterator(range, add_ten, &mut arena);

        // Construction does no work; draining does.
        assert_eq!(mapped.size_hint(&arena), Some(3));
        let expected = int_items(&[11, 12, 13], &mut arena);
        assert_eq!(drain(mapped, &mut arena), expected);
    }

    #[test]
    fn filter_keeps_accepted_items() {
        let mut arena = Arena::new();
        let range = Term::range_iterator(1, 6, &mut arena);
        let gt = Term::builtin(BuiltinId::Gt, &mut arena);
        let three = Term::int(3, &mut arena);
        // Gt applied partially: item > 3.
        let predicate = {
            let body = {
                let var = Term::variable(0, &mut arena);
                Term::application(gt, &[var, three], &mut arena)
            };
            Term::lambda(1, body, &mut arena)
        };
        let filtered = Term::filter_iterator(range, predicate, &mut arena);
        let expected = int_items(&[4, 5, 6], &mut arena);
        assert_eq!(drain(filtered, &mut arena), expected);
        assert_eq!(filtered.size_hint(&arena), None);
    }

    #[test]
    fn zip_stops_at_the_shorter_side() {
        let mut arena = Arena::new();
        let left = Term::range_iterator(0, 2, &mut arena);
        let right = Term::range_iterator(10, 5, &mut arena);
        let zipped = Term::zip_iterator(left, right, &mut arena);

        assert_eq!(zipped.size_hint(&arena), Some(2));
        let items = drain(zipped, &mut arena);
        assert_eq!(items.len(), 2);
        let zero = Term::int(0, &mut arena);
        let ten = Term::int(10, &mut arena);
        let first = Term::list(&[zero, ten], &mut arena);
        assert!(items[0].equals(first, &arena));
    }

    #[test]
    fn skip_and_take_compose() {
        let mut arena = Arena::new();
        let range = Term::range_iterator(0, 10, &mut arena);
        let skipped = Term::skip_iterator(range, 7, &mut arena);
        let expected = int_items(&[7, 8, 9], &mut arena);
        assert_eq!(drain(skipped, &mut arena), expected);
        assert_eq!(skipped.size_hint(&arena), Some(3));

        let taken = Term::take_iterator(range, 3, &mut arena);
        let expected = int_items(&[0, 1, 2], &mut arena);
        assert_eq!(drain(taken, &mut arena), expected);
        assert_eq!(taken.size_hint(&arena), Some(3));

        let integers = Term::integers_iterator(&mut arena);
        let bounded = Term::take_iterator(integers, 4, &mut arena);
        assert!(!bounded.is_unbounded(&arena));
        let expected = int_items(&[0, 1, 2, 3], &mut arena);
        assert_eq!(drain(bounded, &mut arena), expected);
    }

    #[test]
    fn flatten_concatenates_nested_iterables() {
        let mut arena = Arena::new();
        let first = {
            let items = int_items(&[1, 2], &mut arena);
            Term::list(&items, &mut arena)
        };
        let second = {
            let items = int_items(&[3], &mut arena);
            Term::list(&items, &mut arena)
        };
        let outer = Term::list(&[first, second], &mut arena);
        let flattened = Term::flatten_iterator(outer, &mut arena);
        let expected = int_items(&[1, 2, 3], &mut arena);
        assert_eq!(drain(flattened, &mut arena), expected);
    }

    #[test]
    fn intersperse_separates_items() {
        let mut arena = Arena::new();
        let range = Term::range_iterator(1, 3, &mut arena);
        let zero = Term::int(0, &mut arena);
        let interspersed = Term::intersperse_iterator(range, zero, &mut arena);
        let expected = int_items(&[1, 0, 2, 0, 3], &mut arena);
        assert_eq!(drain(interspersed, &mut arena), expected);
        assert_eq!(interspersed.size_hint(&arena), Some(5));

        let empty = Term::empty_iterator(&arena);
        let interspersed = Term::intersperse_iterator(empty, zero, &mut arena);
        assert!(drain(interspersed, &mut arena).is_empty());
    }

    #[test]
    fn hashmap_keys_and_values_iterate() {
        let mut arena = Arena::new();
        let key = Term::string("key", &mut arena);
        let value = Term::int(1, &mut arena);
        let map = Term::hashmap(&[(key, value)], &mut arena);

        let keys = Term::keys_iterator(map, &mut arena);
        assert_eq!(drain(keys, &mut arena), vec![key]);
        let values = Term::values_iterator(map, &mut arena);
        assert_eq!(drain(values, &mut arena), vec![value]);

        let entries = drain(map, &mut arena);
        assert_eq!(entries.len(), 1);
        let pair = Term::list(&[key, value], &mut arena);
        assert!(entries[0].equals(pair, &arena));
    }

    #[test]
    fn unbounded_iterators_refuse_to_collect() {
        let mut arena = Arena::new();
        let value = Term::int(1, &mut arena);
        let repeated = Term::repeat_iterator(value, &mut arena);
        assert!(repeated.is_unbounded(&arena));
        let (collected, _) = collect_iterable(repeated, State::empty(), &mut arena);
        assert!(collected.is_signal(&arena));
    }

    #[test]
    fn collect_drains_into_a_list() {
        let mut arena = Arena::new();
        let range = Term::range_iterator(5, 3, &mut arena);
        let (collected, dependencies) = collect_iterable(range, State::empty(), &mut arena);
        let expected_items = int_items(&[5, 6, 7], &mut arena);
        let expected = Term::list(&expected_items, &mut arena);
        assert!(collected.equals(expected, &arena));
        assert!(dependencies.is_empty());
    }

    #[test]
    fn tree_leaves_index_through_lengths() {
        let mut arena = Arena::new();
        let pending = Term::condition_pending(&arena);
        let invalid = Term::condition_invalid_pointer(&arena);
        let pair = Term::tree(Some(pending), Some(invalid), &mut arena);
        let nested = Term::tree(Some(pair), Some(pending), &mut arena);

        assert_eq!(nested.tree_leaf(0, &arena), Some(pending));
        assert_eq!(nested.tree_leaf(1, &arena), Some(invalid));
        assert_eq!(nested.tree_leaf(2, &arena), Some(pending));
        assert_eq!(nested.tree_leaf(3, &arena), None);
        assert_eq!(drain(nested, &mut arena), vec![pending, invalid, pending]);
    }
}

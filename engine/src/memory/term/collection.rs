//! Collection term variants: lists, records, hashmaps, hashsets and trees, plus the constructor,
//! cell and pointer meta-terms that share their storage shapes.
//!
//! All collections are immutable after construction (cells excepted) and content-addressed like
//! every other term. Records above a small field count carry a lookup table built at construction
//! so field access stays constant-time without changing the record's logical value.

use crate::memory::arena::Arena;
use crate::memory::hash::Hasher;
use crate::memory::term::{Payload, Term, TypeTag};

/// Field count above which records build a hashmap lookup table.
const RECORD_LOOKUP_THRESHOLD: u32 = 16;

/// Smallest hashmap bucket capacity.
const HASHMAP_MIN_CAPACITY: u32 = 8;

impl Term {
    /// A list term holding the given items.
    #[must_use]
    pub fn list(items: &[Self], arena: &mut Arena) -> Self {
        if items.is_empty() {
            return arena.singletons.empty_list;
        }
        let items = arena.store_items(items);
        arena.intern(Payload::List(items))
    }

    /// The empty list singleton.
    #[inline]
    #[must_use]
    pub fn empty_list(arena: &Arena) -> Self {
        arena.singletons.empty_list
    }

    /// A record term from parallel key and value slices.
    #[must_use]
    pub fn record(keys: &[Self], values: &[Self], arena: &mut Arena) -> Self {
        assert!(keys.len() == values.len(), "record keys and values must have equal length");
        let keys = Self::list(keys, arena);
        let values = Self::list(values, arena);
        Self::record_from_lists(keys, values, arena)
    }

    /// The empty record singleton.
    #[inline]
    #[must_use]
    pub fn empty_record(arena: &Arena) -> Self {
        arena.singletons.empty_record
    }

    /// A record term from existing key and value list terms.
    #[must_use]
    pub fn record_from_lists(keys: Self, values: Self, arena: &mut Arena) -> Self {
        let len = keys.list_len(arena).expect("record keys must be a list");
        assert!(values.list_len(arena) == Some(len), "record keys and values must have equal length");
        let lookup = (len > RECORD_LOOKUP_THRESHOLD).then(|| {
            let mut pairs = Vec::with_capacity(len as usize);
            for (index, key) in keys.list_items(arena).into_iter().enumerate() {
                let index = Self::int(i64::try_from(index).expect("record index fits i64"), arena);
                pairs.push((key, index));
            }
            Self::hashmap(&pairs, arena)
        });
        arena.intern(Payload::Record { keys, values, lookup })
    }

    /// A hashmap term from key/value pairs. A repeated key keeps its last value.
    #[must_use]
    pub fn hashmap(pairs: &[(Self, Self)], arena: &mut Arena) -> Self {
        let len = u32::try_from(pairs.len()).expect("hashmap entry count fits u32");
        let capacity = (len * 2).next_power_of_two().max(HASHMAP_MIN_CAPACITY);
        let mut buckets = arena.allocate_buckets(capacity);
        for &(key, value) in pairs {
            arena.bucket_insert(&mut buckets, key, value);
        }
        arena.intern(Payload::Hashmap(buckets))
    }

    /// A hashset term holding the given elements.
    #[must_use]
    pub fn hashset(elements: &[Self], arena: &mut Arena) -> Self {
        let nil = Self::nil(arena);
        let pairs: Vec<(Self, Self)> = elements.iter().map(|&element| (element, nil)).collect();
        let entries = Self::hashmap(&pairs, arena);
        arena.intern(Payload::Hashset { entries })
    }

    /// A tree node over the given children.
    ///
    /// Trees are the binary spines of signals and dependency sets: any non-tree child is a leaf
    /// and the leaf count is precomputed at construction.
    #[must_use]
    pub fn tree(left: Option<Self>, right: Option<Self>, arena: &mut Arena) -> Self {
        let len = Self::leaf_count(left, arena) + Self::leaf_count(right, arena);
        arena.intern(Payload::Tree { left, right, len })
    }

    fn leaf_count(child: Option<Self>, arena: &Arena) -> u32 {
        match child {
            None => 0,
            Some(term) => match *arena.payload(term) {
                Payload::Tree { len, .. } => len,
                _ => 1,
            },
        }
    }

    /// A constructor term describing the key layout of records it builds.
    #[must_use]
    pub fn constructor(keys: &[Self], arena: &mut Arena) -> Self {
        if keys.is_empty() {
            return arena.singletons.empty_constructor;
        }
        let keys = Self::list(keys, arena);
        arena.intern(Payload::Constructor { keys })
    }

    /// The empty constructor singleton.
    #[inline]
    #[must_use]
    pub fn empty_constructor(arena: &Arena) -> Self {
        arena.singletons.empty_constructor
    }

    /// A cell term: mutable storage hashing by identity, never interned.
    #[must_use]
    pub fn cell(fields: &[Self], arena: &mut Arena) -> Self {
        let fields = arena.store_items(fields);
        let hash = Hasher::new().write_byte(TypeTag::Cell as u8).write_u32(arena.next_index()).finish();
        arena.insert_unique(Payload::Cell(fields), hash)
    }

    /// A pointer term forwarding to `target`, never interned so the target stays rewritable.
    #[must_use]
    pub fn pointer(target: Option<Self>, arena: &mut Arena) -> Self {
        let payload = Payload::Pointer { target };
        let hash = super::hash_payload(&payload, arena);
        arena.insert_unique(payload, hash)
    }

    // ------------------------------------------------------------------
    // Predicates and accessors.
    // ------------------------------------------------------------------

    #[must_use]
    pub fn is_list(self, arena: &Arena) -> bool {
        matches!(arena.payload(self), Payload::List(_))
    }

    #[must_use]
    pub fn is_record(self, arena: &Arena) -> bool {
        matches!(arena.payload(self), Payload::Record { .. })
    }

    #[must_use]
    pub fn is_hashmap(self, arena: &Arena) -> bool {
        matches!(arena.payload(self), Payload::Hashmap(_))
    }

    #[must_use]
    pub fn is_hashset(self, arena: &Arena) -> bool {
        matches!(arena.payload(self), Payload::Hashset { .. })
    }

    #[must_use]
    pub fn is_tree(self, arena: &Arena) -> bool {
        matches!(arena.payload(self), Payload::Tree { .. })
    }

    #[must_use]
    pub fn is_constructor(self, arena: &Arena) -> bool {
        matches!(arena.payload(self), Payload::Constructor { .. })
    }

    #[must_use]
    pub fn is_cell(self, arena: &Arena) -> bool {
        matches!(arena.payload(self), Payload::Cell(_))
    }

    #[must_use]
    pub fn is_pointer(self, arena: &Arena) -> bool {
        matches!(arena.payload(self), Payload::Pointer { .. })
    }

    /// The length of a list term.
    #[must_use]
    pub fn list_len(self, arena: &Arena) -> Option<u32> {
        match *arena.payload(self) {
            Payload::List(items) => Some(items.len),
            _ => None,
        }
    }

    /// The `index`-th item of a list term.
    #[must_use]
    pub fn list_item(self, index: u32, arena: &Arena) -> Option<Self> {
        match *arena.payload(self) {
            Payload::List(items) if index < items.len => Some(arena.item(items, index)),
            _ => None,
        }
    }

    /// All items of a list term, copied out.
    #[must_use]
    pub fn list_items(self, arena: &Arena) -> Vec<Self> {
        match *arena.payload(self) {
            Payload::List(items) => arena.items(items).collect(),
            _ => Vec::new(),
        }
    }

    /// The field count of a record term.
    #[must_use]
    pub fn record_len(self, arena: &Arena) -> Option<u32> {
        match *arena.payload(self) {
            Payload::Record { keys, .. } => keys.list_len(arena),
            _ => None,
        }
    }

    /// The key list of a record or constructor term.
    #[must_use]
    pub fn record_keys(self, arena: &Arena) -> Option<Self> {
        match *arena.payload(self) {
            Payload::Record { keys, .. } | Payload::Constructor { keys } => Some(keys),
            _ => None,
        }
    }

    /// The value list of a record term.
    #[must_use]
    pub fn record_values(self, arena: &Arena) -> Option<Self> {
        match *arena.payload(self) {
            Payload::Record { values, .. } => Some(values),
            _ => None,
        }
    }

    /// Fetches a record field by key: linear scan below the lookup threshold, hashmap above.
    #[must_use]
    pub fn record_get(self, key: Self, arena: &Arena) -> Option<Self> {
        let Payload::Record { keys, values, lookup } = *arena.payload(self) else {
            return None;
        };
        if let Some(lookup) = lookup {
            let index = lookup.hashmap_get(key, arena)?;
            let index = u32::try_from(index.as_int(arena)?).ok()?;
            return values.list_item(index, arena);
        }
        let len = keys.list_len(arena)?;
        (0..len)
            .find(|&index| keys.list_item(index, arena).is_some_and(|candidate| candidate.equals(key, arena)))
            .and_then(|index| values.list_item(index, arena))
    }

    /// The entry count of a hashmap term.
    #[must_use]
    pub fn hashmap_len(self, arena: &Arena) -> Option<u32> {
        match *arena.payload(self) {
            Payload::Hashmap(buckets) => Some(buckets.entries),
            _ => None,
        }
    }

    /// Fetches a hashmap value by key.
    #[must_use]
    pub fn hashmap_get(self, key: Self, arena: &Arena) -> Option<Self> {
        match *arena.payload(self) {
            Payload::Hashmap(buckets) => arena.bucket_get(buckets, key),
            _ => None,
        }
    }

    /// All entries of a hashmap term in bucket order, copied out.
    #[must_use]
    pub fn hashmap_entries(self, arena: &Arena) -> Vec<(Self, Self)> {
        match *arena.payload(self) {
            Payload::Hashmap(buckets) => arena.buckets(buckets).flatten().collect(),
            _ => Vec::new(),
        }
    }

    /// The element count of a hashset term.
    #[must_use]
    pub fn hashset_len(self, arena: &Arena) -> Option<u32> {
        match *arena.payload(self) {
            Payload::Hashset { entries } => entries.hashmap_len(arena),
            _ => None,
        }
    }

    /// Whether a hashset term contains the given element.
    #[must_use]
    pub fn hashset_contains(self, element: Self, arena: &Arena) -> bool {
        match *arena.payload(self) {
            Payload::Hashset { entries } => entries.hashmap_get(element, arena).is_some(),
            _ => false,
        }
    }

    /// The elements of a hashset term in bucket order, copied out.
    #[must_use]
    pub fn hashset_elements(self, arena: &Arena) -> Vec<Self> {
        match *arena.payload(self) {
            Payload::Hashset { entries } => entries.hashmap_entries(arena).into_iter().map(|(key, _)| key).collect(),
            _ => Vec::new(),
        }
    }

    /// The leaf count of a tree term.
    #[must_use]
    pub fn tree_len(self, arena: &Arena) -> Option<u32> {
        match *arena.payload(self) {
            Payload::Tree { len, .. } => Some(len),
            _ => None,
        }
    }
}

//! The memory management unit for terms.
//!
//! An arena is the single owner of everything the engine mutates: the node slab terms live in,
//! the byte allocator backing variable-length payloads, the interning index that makes terms
//! content-addressed, the preallocated singletons, the application cache and the host bindings.
//! There is no process-global state; embedders create an [`Arena`] and thread it through every
//! operation, which is also what makes teardown trivial (drop it) and epochs cheap
//! ([`reset`](Arena::reset)).
//!
//! Terms stored here are syntactically unique for all immutable variants: construction hashes the
//! payload, looks the hash up in the interning index and deep-compares candidates before
//! allocating a fresh node. Mutable variants (cells, pointers) are never interned.

use std::collections::HashMap;

use crate::eval::cache::{ApplicationCache, EvaluationCache};
use crate::host::{HostBindings, SystemHost};
use crate::memory::allocator::Allocator;
use crate::memory::hash::Hasher;
use crate::memory::term::{deep_equals_for_interning, hash_payload, BucketsRef, ItemsRef, Payload, StringRef, Term, TypeTag};

/// An interned term: its precomputed structural hash and its payload.
pub(crate) struct Node {
    pub(crate) hash: u64,
    pub(crate) payload: Payload,
}

/// Preallocated singleton handles, created once in a deterministic order.
///
/// Interning alone would make repeated construction of these values cheap; the singleton table
/// makes it free, and guarantees reference equality across construction calls.
pub(crate) struct Singletons {
    pub(crate) nil: Term,
    pub(crate) false_: Term,
    pub(crate) true_: Term,
    /// The integers −1..=9, indexed by `value + 1`.
    pub(crate) integers: [Term; 11],
    pub(crate) empty_list: Term,
    pub(crate) empty_record: Term,
    pub(crate) empty_constructor: Term,
    pub(crate) empty_iterator: Term,
    pub(crate) pending: Term,
    pub(crate) invalid_pointer: Term,
    pub(crate) pending_signal: Term,
    pub(crate) invalid_pointer_signal: Term,
}

/// A comprehensive memory management unit for terms.
pub struct Arena {
    /// The node slab. Slot 0 is reserved so a zero handle is never a live term.
    nodes: Vec<Node>,

    /// Byte storage for string payloads, handle arrays, bucket arrays and scratch buffers.
    bytes: Allocator,

    /// Interning index: structural hash to candidate handles, deep-compared on lookup.
    interned: HashMap<u64, Vec<Term>>,

    /// The preallocated singleton handles.
    pub(crate) singletons: Singletons,

    /// The application cache, keyed by invocation fingerprint.
    pub(crate) cache: EvaluationCache,

    /// Host-provided imports: transcendentals, date handling, the debug byte sink.
    host: Box<dyn HostBindings>,

    /// Number of builtin implementations invoked so far; cache hits are observable through it.
    builtin_invocations: u64,
}

impl Arena {
    /// Creates an arena backed by the standard-library host bindings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_host(Box::new(SystemHost))
    }

    /// Creates an arena with the given host bindings.
    #[must_use]
    pub fn with_host(host: Box<dyn HostBindings>) -> Self {
        let mut arena = Self {
            nodes: Vec::new(),
            bytes: Allocator::new(),
            interned: HashMap::new(),
            singletons: Singletons::placeholder(),
            cache: EvaluationCache::new(),
            host,
            builtin_invocations: 0,
        };
        arena.initialize();
        arena
    }

    /// Seeds the reserved slot and the singleton table, in a fixed order.
    fn initialize(&mut self) {
        // Slot 0 is reserved; dereferencing it is a contract violation.
        self.nodes.push(Node { hash: 0, payload: Payload::Nil });
        self.singletons = Singletons::allocate(self);
    }

    /// Discards every term, scratch byte and cache entry, then reseeds the singletons.
    ///
    /// The caller guarantees that no handle created before the reset is used after it. Because
    /// initialization is deterministic, singleton handles coincide with those of a fresh arena.
    pub fn reset(&mut self) {
        log::debug!("arena reset, discarding {} terms", self.nodes.len() - 1);
        self.nodes.clear();
        self.bytes.reset();
        self.interned.clear();
        self.cache.clear();
        self.builtin_invocations = 0;
        self.initialize();
    }

    /// Number of live terms (excluding the reserved slot).
    #[must_use]
    pub fn term_count(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Total bytes held by the byte allocator's bump region.
    #[must_use]
    pub fn allocated_bytes(&self) -> u32 {
        self.bytes.offset()
    }

    /// The host bindings this arena was created with.
    #[must_use]
    pub fn host(&self) -> &dyn HostBindings {
        &*self.host
    }

    /// Number of builtin implementations invoked since creation or the last reset.
    ///
    /// A memoized application that hits the cache does not invoke its builtin, which makes cache
    /// behavior observable without instrumenting the cache itself.
    #[must_use]
    pub const fn builtin_invocations(&self) -> u64 {
        self.builtin_invocations
    }

    pub(crate) fn record_builtin_invocation(&mut self) {
        self.builtin_invocations += 1;
    }

    /// Dereferences a handle. Reserved or out-of-range handles are contract violations.
    pub(crate) fn node(&self, term: Term) -> &Node {
        let index = term.index() as usize;
        assert!(index != 0 && index < self.nodes.len(), "dereference of a reserved or dangling term handle");
        &self.nodes[index]
    }

    #[inline]
    pub(crate) fn payload(&self, term: Term) -> &Payload {
        &self.node(term).payload
    }

    #[inline]
    pub(crate) fn hash(&self, term: Term) -> u64 {
        self.node(term).hash
    }

    #[inline]
    pub(crate) fn bytes(&self) -> &Allocator {
        &self.bytes
    }

    /// Interns a payload, returning an existing handle whenever an equal term already lives here.
    pub(crate) fn intern(&mut self, payload: Payload) -> Term {
        let hash = hash_payload(&payload, self);
        let provisional = Term::from_index(u32::try_from(self.nodes.len()).expect("term slab exceeds u32 handles"));
        self.nodes.push(Node { hash, payload });
        let candidates = self.interned.get(&hash).cloned().unwrap_or_default();
        for candidate in candidates {
            if deep_equals_for_interning(candidate, provisional, self) {
                self.nodes.pop();
                return candidate;
            }
        }
        self.interned.entry(hash).or_default().push(provisional);
        provisional
    }

    /// Inserts a mutable term (cell or pointer) without interning it.
    pub(crate) fn insert_unique(&mut self, payload: Payload, hash: u64) -> Term {
        let term = Term::from_index(u32::try_from(self.nodes.len()).expect("term slab exceeds u32 handles"));
        self.nodes.push(Node { hash, payload });
        term
    }

    /// The slot index the next inserted term will occupy; cells fold it into their identity hash.
    pub(crate) fn next_index(&self) -> u32 {
        u32::try_from(self.nodes.len()).expect("term slab exceeds u32 handles")
    }

    // ------------------------------------------------------------------
    // Variable-length payload storage.
    // ------------------------------------------------------------------

    /// Copies a byte string into the allocator, length-prefixed and padded to alignment.
    pub(crate) fn store_string(&mut self, content: &[u8]) -> StringRef {
        let len = u32::try_from(content.len()).expect("string exceeds u32 length");
        let address = self.bytes.allocate(4 + len);
        self.bytes.write_word(address, len);
        self.bytes.write_bytes(address + 4, content);
        StringRef { address: address + 4, len }
    }

    /// Copies a handle array into the allocator.
    pub(crate) fn store_items(&mut self, items: &[Term]) -> ItemsRef {
        let len = u32::try_from(items.len()).expect("item array exceeds u32 length");
        let address = self.bytes.allocate(len * 4);
        for (index, item) in items.iter().enumerate() {
            self.bytes.write_word(address + u32::try_from(index).expect("index fits u32") * 4, item.index());
        }
        ItemsRef { address, len }
    }

    /// Begins an unsized handle array at the current bump offset.
    ///
    /// Until [`finish_unsized`](Self::finish_unsized) is called, no other allocation may touch
    /// the byte allocator; [`append_unsized`](Self::append_unsized) grows the region through
    /// [`Allocator::extend`], which enforces exactly that.
    pub(crate) fn begin_unsized(&mut self) -> ItemsRef {
        ItemsRef { address: self.bytes.allocate(0), len: 0 }
    }

    /// Appends one handle to an unsized array under construction.
    pub(crate) fn append_unsized(&mut self, items: &mut ItemsRef, item: Term) {
        self.bytes.extend(items.address + items.len * 4, 4);
        self.bytes.write_word(items.address + items.len * 4, item.index());
        items.len += 1;
    }

    /// Finalizes an unsized array, returning the storage reference.
    pub(crate) fn finish_unsized(&mut self, items: ItemsRef) -> ItemsRef {
        items
    }

    /// Reads the `index`-th handle of an array.
    pub(crate) fn item(&self, items: ItemsRef, index: u32) -> Term {
        assert!(index < items.len, "item index out of bounds");
        Term::from_index(self.bytes.read_word(items.address + index * 4))
    }

    /// Iterates the handles of an array.
    pub(crate) fn items(&self, items: ItemsRef) -> impl Iterator<Item = Term> + '_ {
        (0..items.len).map(move |index| self.item(items, index))
    }

    /// Allocates a bucket array of the given power-of-two capacity, all slots empty.
    pub(crate) fn allocate_buckets(&mut self, capacity: u32) -> BucketsRef {
        debug_assert!(capacity.is_power_of_two());
        let address = self.bytes.allocate(capacity * 8);
        for slot in 0..capacity {
            self.bytes.write_word(address + slot * 8, Term::ABSENT);
            self.bytes.write_word(address + slot * 8 + 4, Term::ABSENT);
        }
        BucketsRef { address, capacity, entries: 0 }
    }

    /// Inserts a key/value pair into a bucket array under construction. A duplicate key is
    /// overwritten (last write wins).
    pub(crate) fn bucket_insert(&mut self, buckets: &mut BucketsRef, key: Term, value: Term) {
        let mask = buckets.capacity - 1;
        let mut slot = u32::try_from(self.hash(key) & u64::from(mask)).expect("masked hash fits u32");
        loop {
            let address = buckets.address + slot * 8;
            let occupant = self.bytes.read_word(address);
            if occupant == Term::ABSENT {
                self.bytes.write_word(address, key.index());
                self.bytes.write_word(address + 4, value.index());
                buckets.entries += 1;
                return;
            }
            if Term::from_index(occupant).equals(key, self) {
                self.bytes.write_word(address + 4, value.index());
                return;
            }
            slot = (slot + 1) & mask;
        }
    }

    /// Looks a key up in a bucket array.
    pub(crate) fn bucket_get(&self, buckets: BucketsRef, key: Term) -> Option<Term> {
        if buckets.capacity == 0 {
            return None;
        }
        let mask = buckets.capacity - 1;
        let mut slot = u32::try_from(self.hash(key) & u64::from(mask)).expect("masked hash fits u32");
        loop {
            let address = buckets.address + slot * 8;
            let occupant = self.bytes.read_word(address);
            if occupant == Term::ABSENT {
                return None;
            }
            if Term::from_index(occupant).equals(key, self) {
                return Some(Term::from_index(self.bytes.read_word(address + 4)));
            }
            slot = (slot + 1) & mask;
        }
    }

    /// Iterates the occupied slots of a bucket array in bucket order.
    pub(crate) fn buckets(&self, buckets: BucketsRef) -> impl Iterator<Item = Option<(Term, Term)>> + '_ {
        (0..buckets.capacity).map(move |slot| {
            let address = buckets.address + slot * 8;
            let key = self.bytes.read_word(address);
            (key != Term::ABSENT)
                .then(|| (Term::from_index(key), Term::from_index(self.bytes.read_word(address + 4))))
        })
    }

    // ------------------------------------------------------------------
    // Mutable terms.
    // ------------------------------------------------------------------

    /// Rewrites a pointer term's target, recomputing the stored hash so it keeps reflecting the
    /// logical value.
    pub(crate) fn set_pointer_target(&mut self, pointer: Term, target: Option<Term>) {
        let Payload::Pointer { .. } = self.payload(pointer) else {
            panic!("retargeted term is not a pointer");
        };
        let payload = Payload::Pointer { target };
        let hash = hash_payload(&payload, self);
        let node = &mut self.nodes[pointer.index() as usize];
        node.payload = payload;
        node.hash = hash;
    }

    /// Reads a cell field.
    #[must_use]
    pub fn cell_field(&self, cell: Term, index: u32) -> Term {
        let Payload::Cell(fields) = *self.payload(cell) else {
            panic!("read field of a term that is not a cell");
        };
        self.item(fields, index)
    }

    /// Rewrites a cell field. Cells hash by identity, so the hash is untouched.
    pub fn cell_set_field(&mut self, cell: Term, index: u32, value: Term) {
        let Payload::Cell(fields) = *self.payload(cell) else {
            panic!("write field of a term that is not a cell");
        };
        assert!(index < fields.len, "cell field index out of bounds");
        self.bytes.write_word(fields.address + index * 4, value.index());
    }

    // ------------------------------------------------------------------
    // Application cache.
    // ------------------------------------------------------------------

    pub(crate) fn cache_entry(&self, key: u64) -> Option<ApplicationCache> {
        self.cache.entry(key)
    }

    pub(crate) fn cache_insert(&mut self, key: u64, entry: ApplicationCache) {
        self.cache.insert(key, entry);
    }

    pub(crate) fn cache_refresh(&mut self, key: u64, overall_state_hash: u64) {
        self.cache.refresh(key, overall_state_hash);
    }

    /// Number of live application-cache entries.
    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    // ------------------------------------------------------------------
    // Debug output.
    // ------------------------------------------------------------------

    /// Renders the lossless form of a term into an arena scratch buffer, hands the bytes to the
    /// host's debug sink, then releases the buffer.
    pub fn debug_print(&mut self, term: Term) {
        let text = format!("{}", crate::memory::term::pretty::Detail(term, self));
        let len = u32::try_from(text.len()).expect("debug output exceeds u32 length");
        let address = self.bytes.allocate(len);
        self.bytes.write_bytes(address, text.as_bytes());
        self.host.write_debug(self.bytes.bytes(address, len));
        self.bytes.shrink(address, len);
    }

    /// Looks an interned string up by content, without allocating.
    pub(crate) fn find_interned_string(&self, content: &[u8]) -> Option<Term> {
        let hash = Hasher::new()
            .write_byte(TypeTag::String as u8)
            .write_u32(u32::try_from(content.len()).expect("string exceeds u32 length"))
            .write_bytes(content)
            .finish();
        let candidates = self.interned.get(&hash)?;
        candidates
            .iter()
            .copied()
            .find(|&candidate| match *self.payload(candidate) {
                Payload::String(text) => self.bytes.bytes(text.address, text.len) == content,
                _ => false,
            })
    }

    /// Records a freshly stored string in the interning index.
    pub(crate) fn insert_string(&mut self, text: StringRef) -> Term {
        self.intern(Payload::String(text))
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl Singletons {
    /// A placeholder table used only during arena construction.
    fn placeholder() -> Self {
        let absent = Term::from_index(Term::ABSENT);
        Self {
            nil: absent,
            false_: absent,
            true_: absent,
            integers: [absent; 11],
            empty_list: absent,
            empty_record: absent,
            empty_constructor: absent,
            empty_iterator: absent,
            pending: absent,
            invalid_pointer: absent,
            pending_signal: absent,
            invalid_pointer_signal: absent,
        }
    }

    /// Allocates the singleton terms, in a fixed order so handles are deterministic.
    fn allocate(arena: &mut Arena) -> Self {
        use crate::memory::term::Condition;

        let nil = arena.intern(Payload::Nil);
        let false_ = arena.intern(Payload::Boolean(false));
        let true_ = arena.intern(Payload::Boolean(true));
        let integers = std::array::from_fn(|index| arena.intern(Payload::Int(index as i64 - 1)));
        let empty_items = arena.store_items(&[]);
        let empty_list = arena.intern(Payload::List(empty_items));
        let empty_record = arena.intern(Payload::Record { keys: empty_list, values: empty_list, lookup: None });
        let empty_constructor = arena.intern(Payload::Constructor { keys: empty_list });
        let empty_iterator = arena.intern(Payload::EmptyIterator);
        let pending = arena.intern(Payload::Condition(Condition::Pending));
        let invalid_pointer = arena.intern(Payload::Condition(Condition::InvalidPointer));
        let pending_signal = arena.intern(Payload::Signal { conditions: pending });
        let invalid_pointer_signal = arena.intern(Payload::Signal { conditions: invalid_pointer });

        Self {
            nil,
            false_,
            true_,
            integers,
            empty_list,
            empty_record,
            empty_constructor,
            empty_iterator,
            pending,
            invalid_pointer,
            pending_signal,
            invalid_pointer_signal,
        }
    }
}

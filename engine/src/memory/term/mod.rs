//! Terms, the dwellers of the arena.
//!
//! A [`Term`] is a cheap `Copy` handle into an [arena](crate::memory::arena::Arena). Its payload
//! is a closed union of variants: scalars, collections, functions, iterators and meta-terms. All
//! capabilities (equality, hashing, substitution, truthiness, …) dispatch by exhaustive matching
//! on the payload, so adding a variant is a compile-time checklist rather than a runtime hazard.
//!
//! Terms are immutable once interned. The two deliberate exceptions are [cells](Payload::Cell),
//! which are mutable storage and therefore hash by identity, and [pointers](Payload::Pointer),
//! whose target may be rewritten to forward a handle.

pub mod builder;
pub mod collection;
pub mod condition;
pub mod function;
pub mod iterator;
pub mod pretty;
pub mod scalar;

use crate::builtins::BuiltinId;
use crate::memory::arena::Arena;
use crate::memory::hash::Hasher;

/// A handle to a term living in an arena.
///
/// Handles are 32-bit indices; they are meaningful only together with the arena that produced
/// them, which is why every operation takes the arena as an explicit argument.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Term(u32);

impl Term {
    /// The reserved absent-handle encoding used inside raw storage (hashmap buckets).
    pub(crate) const ABSENT: u32 = 0xffff_ffff;

    pub(crate) const fn from_index(index: u32) -> Self {
        Self(index)
    }

    pub(crate) const fn index(self) -> u32 {
        self.0
    }
}

/// The type tag of a term variant.
///
/// Tags are stable: they participate in hashing, appear in type-error conditions and in the
/// lossless debug rendering.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(u32)]
pub enum TypeTag {
    Nil = 0,
    Boolean = 1,
    Int = 2,
    Float = 3,
    String = 4,
    Symbol = 5,
    Timestamp = 6,
    List = 7,
    Record = 8,
    Hashmap = 9,
    Hashset = 10,
    Tree = 11,
    Builtin = 12,
    Partial = 13,
    Lambda = 14,
    Variable = 15,
    Let = 16,
    Application = 17,
    Condition = 18,
    Signal = 19,
    Effect = 20,
    Constructor = 21,
    Cell = 22,
    Pointer = 23,
    EmptyIterator = 24,
    OnceIterator = 25,
    RepeatIterator = 26,
    RangeIterator = 27,
    IntegersIterator = 28,
    MapIterator = 29,
    FilterIterator = 30,
    FlattenIterator = 31,
    ZipIterator = 32,
    SkipIterator = 33,
    TakeIterator = 34,
    EvaluateIterator = 35,
    IntersperseIterator = 36,
    KeysIterator = 37,
    ValuesIterator = 38,
}

impl core::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A reference to raw bytes in the arena's byte allocator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StringRef {
    pub(crate) address: u32,
    pub(crate) len: u32,
}

/// A reference to a contiguous handle array in the arena's byte allocator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ItemsRef {
    pub(crate) address: u32,
    pub(crate) len: u32,
}

/// A reference to an open-addressed bucket array: `capacity` slots of two words (key, value).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BucketsRef {
    pub(crate) address: u32,
    pub(crate) capacity: u32,
    pub(crate) entries: u32,
}

/// The closed union of term variants.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Payload {
    // Scalars.
    Nil,
    Boolean(bool),
    Int(i64),
    Float(f64),
    String(StringRef),
    Symbol(u32),
    /// Milliseconds since the Unix epoch.
    Timestamp(i64),

    // Collections.
    List(ItemsRef),
    Record {
        keys: Term,
        values: Term,
        /// Hashmap from key to index, built at construction above the linear-scan threshold.
        lookup: Option<Term>,
    },
    Hashmap(BucketsRef),
    Hashset {
        entries: Term,
    },
    /// A binary spine over conditions; the backbone of signals and dependency sets.
    Tree {
        left: Option<Term>,
        right: Option<Term>,
        /// Number of leaves underneath, precomputed.
        len: u32,
    },

    // Functions.
    Builtin(BuiltinId),
    Partial {
        target: Term,
        args: Term,
    },
    Lambda {
        arity: u32,
        body: Term,
    },
    Variable(u32),
    Let {
        initializer: Term,
        body: Term,
    },
    Application {
        target: Term,
        args: Term,
    },

    // Meta-terms.
    Condition(Condition),
    Signal {
        /// A condition or a tree of conditions.
        conditions: Term,
    },
    Effect {
        condition: Term,
    },
    Constructor {
        keys: Term,
    },
    /// Mutable storage; hashes by identity.
    Cell(ItemsRef),
    /// Mutable indirection; the target may be rewritten to forward the handle.
    Pointer {
        target: Option<Term>,
    },

    // Iterators.
    EmptyIterator,
    OnceIterator {
        value: Term,
    },
    RepeatIterator {
        value: Term,
    },
    RangeIterator {
        start: i64,
        len: i64,
    },
    IntegersIterator,
    MapIterator {
        source: Term,
        transform: Term,
    },
    FilterIterator {
        source: Term,
        predicate: Term,
    },
    FlattenIterator {
        source: Term,
    },
    ZipIterator {
        left: Term,
        right: Term,
    },
    SkipIterator {
        source: Term,
        count: u32,
    },
    TakeIterator {
        source: Term,
        count: u32,
    },
    EvaluateIterator {
        source: Term,
    },
    IntersperseIterator {
        source: Term,
        separator: Term,
    },
    KeysIterator {
        source: Term,
    },
    ValuesIterator {
        source: Term,
    },
}

/// The unit of reactive dependency and error propagation.
///
/// Tags are part of the external surface and must stay stable; gaps are reserved.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Condition {
    Custom { effect_type: Term, payload: Term, token: Term },
    Pending,
    Error { payload: Term },
    TypeError { expected: TypeTag, received: Term },
    InvalidFunctionTarget { target: Term },
    InvalidFunctionArgs { target: Term, args: Term },
    InvalidPointer,
}

impl Condition {
    /// The stable wire tag of this condition kind.
    pub(crate) const fn tag(&self) -> u8 {
        match self {
            Self::Custom { .. } => 0,
            Self::Pending => 1,
            Self::Error { .. } => 2,
            Self::TypeError { .. } => 3,
            Self::InvalidFunctionTarget { .. } => 4,
            Self::InvalidFunctionArgs { .. } => 5,
            Self::InvalidPointer => 8,
        }
    }
}

impl Payload {
    /// The type tag of this payload.
    pub(crate) const fn type_tag(&self) -> TypeTag {
        match self {
            Self::Nil => TypeTag::Nil,
            Self::Boolean(_) => TypeTag::Boolean,
            Self::Int(_) => TypeTag::Int,
            Self::Float(_) => TypeTag::Float,
            Self::String(_) => TypeTag::String,
            Self::Symbol(_) => TypeTag::Symbol,
            Self::Timestamp(_) => TypeTag::Timestamp,
            Self::List(_) => TypeTag::List,
            Self::Record { .. } => TypeTag::Record,
            Self::Hashmap(_) => TypeTag::Hashmap,
            Self::Hashset { .. } => TypeTag::Hashset,
            Self::Tree { .. } => TypeTag::Tree,
            Self::Builtin(_) => TypeTag::Builtin,
            Self::Partial { .. } => TypeTag::Partial,
            Self::Lambda { .. } => TypeTag::Lambda,
            Self::Variable(_) => TypeTag::Variable,
            Self::Let { .. } => TypeTag::Let,
            Self::Application { .. } => TypeTag::Application,
            Self::Condition(_) => TypeTag::Condition,
            Self::Signal { .. } => TypeTag::Signal,
            Self::Effect { .. } => TypeTag::Effect,
            Self::Constructor { .. } => TypeTag::Constructor,
            Self::Cell(_) => TypeTag::Cell,
            Self::Pointer { .. } => TypeTag::Pointer,
            Self::EmptyIterator => TypeTag::EmptyIterator,
            Self::OnceIterator { .. } => TypeTag::OnceIterator,
            Self::RepeatIterator { .. } => TypeTag::RepeatIterator,
            Self::RangeIterator { .. } => TypeTag::RangeIterator,
            Self::IntegersIterator => TypeTag::IntegersIterator,
            Self::MapIterator { .. } => TypeTag::MapIterator,
            Self::FilterIterator { .. } => TypeTag::FilterIterator,
            Self::FlattenIterator { .. } => TypeTag::FlattenIterator,
            Self::ZipIterator { .. } => TypeTag::ZipIterator,
            Self::SkipIterator { .. } => TypeTag::SkipIterator,
            Self::TakeIterator { .. } => TypeTag::TakeIterator,
            Self::EvaluateIterator { .. } => TypeTag::EvaluateIterator,
            Self::IntersperseIterator { .. } => TypeTag::IntersperseIterator,
            Self::KeysIterator { .. } => TypeTag::KeysIterator,
            Self::ValuesIterator { .. } => TypeTag::ValuesIterator,
        }
    }
}

/// Computes the structural hash of a payload whose children are already interned.
///
/// The hash depends only on the logical value: child terms contribute their own precomputed
/// hashes, raw bytes contribute their content, never their address. Cells are the exception and
/// are hashed by identity at insertion instead (see [`Arena::insert_unique`]).
pub(crate) fn hash_payload(payload: &Payload, arena: &Arena) -> u64 {
    let hasher = Hasher::new().write_byte(payload.type_tag() as u8);
    let hasher = match *payload {
        Payload::Nil | Payload::EmptyIterator | Payload::IntegersIterator => hasher,
        Payload::Boolean(value) => hasher.write_byte(u8::from(value)),
        Payload::Int(value) | Payload::Timestamp(value) => hasher.write_i64(value),
        Payload::Float(value) => hasher.write_f64(value),
        Payload::String(text) => hasher.write_u32(text.len).write_bytes(arena.bytes().bytes(text.address, text.len)),
        Payload::Symbol(id) => hasher.write_u32(id),
        Payload::List(items) => arena
            .items(items)
            .fold(hasher.write_u32(items.len), |hasher, item| hasher.write_hash(arena.hash(item))),
        Payload::Record { keys, values, .. } => hasher.write_hash(arena.hash(keys)).write_hash(arena.hash(values)),
        Payload::Hashmap(buckets) => {
            let hasher = hasher.write_u32(buckets.entries);
            arena.buckets(buckets).fold(hasher, |hasher, slot| match slot {
                Some((key, value)) => hasher.write_hash(arena.hash(key)).write_hash(arena.hash(value)),
                None => hasher.write_byte(0),
            })
        },
        Payload::Hashset { entries } => hasher.write_hash(arena.hash(entries)),
        Payload::Tree { left, right, len } => hasher
            .write_u32(len)
            .write_hash(left.map_or(0, |term| arena.hash(term)))
            .write_hash(right.map_or(0, |term| arena.hash(term))),
        Payload::Builtin(id) => hasher.write_u32(id as u32),
        Payload::Partial { target, args } | Payload::Application { target, args } => {
            hasher.write_hash(arena.hash(target)).write_hash(arena.hash(args))
        },
        Payload::Lambda { arity, body } => hasher.write_u32(arity).write_hash(arena.hash(body)),
        Payload::Variable(offset) => hasher.write_u32(offset),
        Payload::Let { initializer, body } => hasher.write_hash(arena.hash(initializer)).write_hash(arena.hash(body)),
        Payload::Condition(condition) => {
            let hasher = hasher.write_byte(condition.tag());
            match condition {
                Condition::Custom { effect_type, payload, token } => hasher
                    .write_hash(arena.hash(effect_type))
                    .write_hash(arena.hash(payload))
                    .write_hash(arena.hash(token)),
                Condition::Pending | Condition::InvalidPointer => hasher,
                Condition::Error { payload } => hasher.write_hash(arena.hash(payload)),
                Condition::TypeError { expected, received } => {
                    hasher.write_u32(expected as u32).write_hash(arena.hash(received))
                },
                Condition::InvalidFunctionTarget { target } => hasher.write_hash(arena.hash(target)),
                Condition::InvalidFunctionArgs { target, args } => {
                    hasher.write_hash(arena.hash(target)).write_hash(arena.hash(args))
                },
            }
        },
        Payload::Signal { conditions } => hasher.write_hash(arena.hash(conditions)),
        Payload::Effect { condition } => hasher.write_hash(arena.hash(condition)),
        Payload::Constructor { keys } => hasher.write_hash(arena.hash(keys)),
        // Cells hash by identity; this path is only reached when rehashing is explicitly
        // requested, and folds the slot index written at insertion.
        Payload::Cell(fields) => hasher.write_u32(fields.address),
        Payload::Pointer { target } => hasher.write_hash(target.map_or(0, |term| arena.hash(term))),
        Payload::OnceIterator { value } | Payload::RepeatIterator { value } => hasher.write_hash(arena.hash(value)),
        Payload::RangeIterator { start, len } => hasher.write_i64(start).write_i64(len),
        Payload::MapIterator { source, transform } => hasher.write_hash(arena.hash(source)).write_hash(arena.hash(transform)),
        Payload::FilterIterator { source, predicate } => {
            hasher.write_hash(arena.hash(source)).write_hash(arena.hash(predicate))
        },
        Payload::FlattenIterator { source }
        | Payload::EvaluateIterator { source }
        | Payload::KeysIterator { source }
        | Payload::ValuesIterator { source } => hasher.write_hash(arena.hash(source)),
        Payload::ZipIterator { left, right } => hasher.write_hash(arena.hash(left)).write_hash(arena.hash(right)),
        Payload::SkipIterator { source, count } | Payload::TakeIterator { source, count } => {
            hasher.write_hash(arena.hash(source)).write_u32(count)
        },
        Payload::IntersperseIterator { source, separator } => {
            hasher.write_hash(arena.hash(source)).write_hash(arena.hash(separator))
        },
    };
    hasher.finish()
}

impl Term {
    /// The type tag of this term.
    #[inline]
    #[must_use]
    pub fn type_tag(self, arena: &Arena) -> TypeTag {
        arena.payload(self).type_tag()
    }

    /// The precomputed structural hash of this term.
    #[inline]
    #[must_use]
    pub fn hash(self, arena: &Arena) -> u64 {
        arena.hash(self)
    }

    /// Whether this term evaluates to itself.
    #[must_use]
    pub fn is_atomic(self, arena: &Arena) -> bool {
        !self.implements_evaluate(arena)
    }

    /// Whether evaluation dispatches on this term (applications, effects, lets and pointers).
    #[must_use]
    pub fn implements_evaluate(self, arena: &Arena) -> bool {
        matches!(
            arena.payload(self),
            Payload::Application { .. } | Payload::Effect { .. } | Payload::Let { .. } | Payload::Pointer { .. }
        )
    }

    /// Whether this term can be the target of an application.
    #[must_use]
    pub fn implements_apply(self, arena: &Arena) -> bool {
        matches!(
            arena.payload(self),
            Payload::Builtin(_) | Payload::Partial { .. } | Payload::Lambda { .. } | Payload::Signal { .. }
        )
    }

    /// Whether this term counts as true in a boolean position.
    ///
    /// Only `nil` and `false` are falsy.
    #[must_use]
    pub fn is_truthy(self, arena: &Arena) -> bool {
        !matches!(arena.payload(self), Payload::Nil | Payload::Boolean(false))
    }

    /// Structural equality.
    ///
    /// Handle identity and hash comparison short-circuit; on a hash match the comparison always
    /// falls back to a deep structural walk, so the 1/2⁶⁴ collision rate cannot produce a false
    /// positive.
    #[must_use]
    pub fn equals(self, other: Self, arena: &Arena) -> bool {
        if self == other {
            return true;
        }
        if arena.hash(self) != arena.hash(other) {
            return false;
        }
        deep_equals_for_interning(self, other, arena)
    }

    /// The storage footprint of this term in bytes, including out-of-line payload data.
    #[must_use]
    pub fn size_in_bytes(self, arena: &Arena) -> u32 {
        let header = 8 + 4;
        let payload = match *arena.payload(self) {
            Payload::String(text) => 4 + crate::memory::allocator::align(text.len),
            Payload::List(items) | Payload::Cell(items) => 4 + items.len * 4,
            Payload::Hashmap(buckets) => 8 + buckets.capacity * 8,
            _ => 8,
        };
        header + payload
    }
}

/// Deep structural comparison, entered only on a hash match between distinct handles.
pub(crate) fn deep_equals_for_interning(left: Term, right: Term, arena: &Arena) -> bool {
    match (*arena.payload(left), *arena.payload(right)) {
        (Payload::Nil, Payload::Nil)
        | (Payload::EmptyIterator, Payload::EmptyIterator)
        | (Payload::IntegersIterator, Payload::IntegersIterator) => true,
        (Payload::Boolean(a), Payload::Boolean(b)) => a == b,
        (Payload::Int(a), Payload::Int(b)) | (Payload::Timestamp(a), Payload::Timestamp(b)) => a == b,
        // Bit equality: NaN equals itself, 0.0 and -0.0 are distinct.
        (Payload::Float(a), Payload::Float(b)) => a.to_bits() == b.to_bits(),
        (Payload::String(a), Payload::String(b)) => {
            arena.bytes().bytes(a.address, a.len) == arena.bytes().bytes(b.address, b.len)
        },
        (Payload::Symbol(a), Payload::Symbol(b)) => a == b,
        (Payload::List(a), Payload::List(b)) => {
            a.len == b.len && arena.items(a).zip(arena.items(b)).all(|(x, y)| x.equals(y, arena))
        },
        (Payload::Record { keys: ka, values: va, .. }, Payload::Record { keys: kb, values: vb, .. }) => {
            ka.equals(kb, arena) && va.equals(vb, arena)
        },
        (Payload::Hashmap(a), Payload::Hashmap(b)) => {
            a.entries == b.entries
                && a.capacity == b.capacity
                && arena.buckets(a).zip(arena.buckets(b)).all(|(x, y)| match (x, y) {
                    (None, None) => true,
                    (Some((kx, vx)), Some((ky, vy))) => kx.equals(ky, arena) && vx.equals(vy, arena),
                    _ => false,
                })
        },
        (Payload::Hashset { entries: a }, Payload::Hashset { entries: b }) => a.equals(b, arena),
        (Payload::Tree { left: la, right: ra, len: na }, Payload::Tree { left: lb, right: rb, len: nb }) => {
            na == nb && option_equals(la, lb, arena) && option_equals(ra, rb, arena)
        },
        (Payload::Builtin(a), Payload::Builtin(b)) => a == b,
        (Payload::Partial { target: ta, args: aa }, Payload::Partial { target: tb, args: ab })
        | (Payload::Application { target: ta, args: aa }, Payload::Application { target: tb, args: ab }) => {
            ta.equals(tb, arena) && aa.equals(ab, arena)
        },
        (Payload::Lambda { arity: na, body: ba }, Payload::Lambda { arity: nb, body: bb }) => {
            na == nb && ba.equals(bb, arena)
        },
        (Payload::Variable(a), Payload::Variable(b)) => a == b,
        (Payload::Let { initializer: ia, body: ba }, Payload::Let { initializer: ib, body: bb }) => {
            ia.equals(ib, arena) && ba.equals(bb, arena)
        },
        (Payload::Condition(a), Payload::Condition(b)) => condition_equals(a, b, arena),
        (Payload::Signal { conditions: a }, Payload::Signal { conditions: b }) => a.equals(b, arena),
        (Payload::Effect { condition: a }, Payload::Effect { condition: b }) => a.equals(b, arena),
        (Payload::Constructor { keys: a }, Payload::Constructor { keys: b }) => a.equals(b, arena),
        // Cells are identity: distinct handles are distinct cells.
        (Payload::Cell(_), Payload::Cell(_)) => false,
        (Payload::Pointer { target: a }, Payload::Pointer { target: b }) => option_equals(a, b, arena),
        (Payload::OnceIterator { value: a }, Payload::OnceIterator { value: b })
        | (Payload::RepeatIterator { value: a }, Payload::RepeatIterator { value: b }) => a.equals(b, arena),
        (Payload::RangeIterator { start: sa, len: la }, Payload::RangeIterator { start: sb, len: lb }) => {
            sa == sb && la == lb
        },
        (Payload::MapIterator { source: sa, transform: ta }, Payload::MapIterator { source: sb, transform: tb })
        | (Payload::FilterIterator { source: sa, predicate: ta }, Payload::FilterIterator { source: sb, predicate: tb })
        | (
            Payload::IntersperseIterator { source: sa, separator: ta },
            Payload::IntersperseIterator { source: sb, separator: tb },
        ) => sa.equals(sb, arena) && ta.equals(tb, arena),
        (Payload::FlattenIterator { source: a }, Payload::FlattenIterator { source: b })
        | (Payload::EvaluateIterator { source: a }, Payload::EvaluateIterator { source: b })
        | (Payload::KeysIterator { source: a }, Payload::KeysIterator { source: b })
        | (Payload::ValuesIterator { source: a }, Payload::ValuesIterator { source: b }) => a.equals(b, arena),
        (Payload::ZipIterator { left: la, right: ra }, Payload::ZipIterator { left: lb, right: rb }) => {
            la.equals(lb, arena) && ra.equals(rb, arena)
        },
        (Payload::SkipIterator { source: sa, count: ca }, Payload::SkipIterator { source: sb, count: cb })
        | (Payload::TakeIterator { source: sa, count: ca }, Payload::TakeIterator { source: sb, count: cb }) => {
            ca == cb && sa.equals(sb, arena)
        },
        _ => false,
    }
}

fn option_equals(left: Option<Term>, right: Option<Term>, arena: &Arena) -> bool {
    match (left, right) {
        (None, None) => true,
        (Some(a), Some(b)) => a.equals(b, arena),
        _ => false,
    }
}

fn condition_equals(left: Condition, right: Condition, arena: &Arena) -> bool {
    match (left, right) {
        (Condition::Pending, Condition::Pending) | (Condition::InvalidPointer, Condition::InvalidPointer) => true,
        (
            Condition::Custom { effect_type: ea, payload: pa, token: ta },
            Condition::Custom { effect_type: eb, payload: pb, token: tb },
        ) => ea.equals(eb, arena) && pa.equals(pb, arena) && ta.equals(tb, arena),
        (Condition::Error { payload: a }, Condition::Error { payload: b }) => a.equals(b, arena),
        (Condition::TypeError { expected: xa, received: ra }, Condition::TypeError { expected: xb, received: rb }) => {
            xa == xb && ra.equals(rb, arena)
        },
        (Condition::InvalidFunctionTarget { target: a }, Condition::InvalidFunctionTarget { target: b }) => {
            a.equals(b, arena)
        },
        (
            Condition::InvalidFunctionArgs { target: ta, args: aa },
            Condition::InvalidFunctionArgs { target: tb, args: ab },
        ) => ta.equals(tb, arena) && aa.equals(ab, arena),
        _ => false,
    }
}

/// The operation a substitution pass performs on free variables.
#[derive(Clone, Copy)]
enum Substitution<'a> {
    /// Replace variables in `[offset, offset + variables.len())` with the reversed scope
    /// elements, and pull variables of enclosing scopes down by the scope length.
    Replace { variables: &'a [Term], offset: u32 },
    /// Push every variable free at `depth` up by `amount`.
    Shift { depth: u32, amount: u32 },
}

impl Substitution<'_> {
    /// Enters a binder of the given arity.
    const fn descend(self, arity: u32) -> Self {
        match self {
            Self::Replace { variables, offset } => Self::Replace { variables, offset: offset + arity },
            Self::Shift { depth, amount } => Self::Shift { depth: depth + arity, amount },
        }
    }
}

impl Term {
    /// Substitutes scope variables in this term.
    ///
    /// With `variables = Some(scope)`, variables in `[scope_offset, scope_offset + scope.len())`
    /// are replaced by the scope elements indexed in reverse (the last-pushed variable is offset
    /// zero), and variables of enclosing scopes are adjusted down by the scope length. With
    /// `variables = None`, every free variable is shifted up by `scope_offset` instead.
    ///
    /// Returns `None` when nothing changed; callers must then keep using the original term.
    #[must_use]
    pub fn substitute(self, variables: Option<&[Term]>, scope_offset: u32, arena: &mut Arena) -> Option<Term> {
        let substitution = match variables {
            Some(variables) => Substitution::Replace { variables, offset: scope_offset },
            None => Substitution::Shift { depth: 0, amount: scope_offset },
        };
        self.substitute_with(substitution, arena)
    }

    fn substitute_with(self, substitution: Substitution, arena: &mut Arena) -> Option<Term> {
        let payload = *arena.payload(self);
        match payload {
            Payload::Variable(index) => match substitution {
                Substitution::Replace { variables, offset } => {
                    let len = u32::try_from(variables.len()).expect("scope length exceeds u32");
                    if index < offset {
                        None
                    } else if index < offset + len {
                        // Scopes are indexed in reverse: the last-pushed variable is offset zero.
                        let replacement = variables[(len - 1 - (index - offset)) as usize];
                        if offset > 0 {
                            // The replacement crosses `offset` binders on its way in.
                            Some(replacement.substitute(None, offset, arena).unwrap_or(replacement))
                        } else {
                            Some(replacement)
                        }
                    } else {
                        Some(Term::variable(index - len, arena))
                    }
                },
                Substitution::Shift { depth, amount } => {
                    (amount > 0 && index >= depth).then(|| Term::variable(index + amount, arena))
                },
            },

            Payload::Lambda { arity, body } => body
                .substitute_with(substitution.descend(arity), arena)
                .map(|body| Term::lambda(arity, body, arena)),

            Payload::Let { initializer, body } => {
                let initializer2 = initializer.substitute_with(substitution, arena);
                let body2 = body.substitute_with(substitution.descend(1), arena);
                rebuild2(initializer, initializer2, body, body2, |initializer, body, arena| {
                    Term::let_term(initializer, body, arena)
                }, arena)
            },

            Payload::Application { target, args } => {
                let target2 = target.substitute_with(substitution, arena);
                let args2 = args.substitute_with(substitution, arena);
                rebuild2(target, target2, args, args2, |target, args, arena| {
                    Term::application_with_arg_list(target, args, arena)
                }, arena)
            },

            Payload::Partial { target, args } => {
                let target2 = target.substitute_with(substitution, arena);
                let args2 = args.substitute_with(substitution, arena);
                rebuild2(target, target2, args, args2, |target, args, arena| {
                    Term::partial_with_arg_list(target, args, arena)
                }, arena)
            },

            Payload::List(items) => {
                let items: Vec<Term> = arena.items(items).collect();
                let mut changed = false;
                let mut substituted = Vec::with_capacity(items.len());
                for item in &items {
                    match item.substitute_with(substitution, arena) {
                        Some(term) => {
                            changed = true;
                            substituted.push(term);
                        },
                        None => substituted.push(*item),
                    }
                }
                changed.then(|| Term::list(&substituted, arena))
            },

            Payload::Record { keys, values, .. } => {
                let keys2 = keys.substitute_with(substitution, arena);
                let values2 = values.substitute_with(substitution, arena);
                rebuild2(keys, keys2, values, values2, |keys, values, arena| {
                    Term::record_from_lists(keys, values, arena)
                }, arena)
            },

            Payload::Hashmap(buckets) => {
                let pairs: Vec<(Term, Term)> = arena.buckets(buckets).flatten().collect();
                let mut changed = false;
                let mut substituted = Vec::with_capacity(pairs.len());
                for (key, value) in &pairs {
                    let key2 = key.substitute_with(substitution, arena);
                    let value2 = value.substitute_with(substitution, arena);
                    changed |= key2.is_some() || value2.is_some();
                    substituted.push((key2.unwrap_or(*key), value2.unwrap_or(*value)));
                }
                changed.then(|| Term::hashmap(&substituted, arena))
            },

            Payload::Hashset { entries } => entries
                .substitute_with(substitution, arena)
                .map(|entries| arena.intern(Payload::Hashset { entries })),

            Payload::Tree { left, right, .. } => {
                let left2 = left.and_then(|term| term.substitute_with(substitution, arena));
                let right2 = right.and_then(|term| term.substitute_with(substitution, arena));
                (left2.is_some() || right2.is_some())
                    .then(|| Term::tree(left2.or(left), right2.or(right), arena))
            },

            Payload::Condition(condition) => substitute_condition(condition, substitution, arena),

            Payload::Signal { conditions } => conditions
                .substitute_with(substitution, arena)
                .map(|conditions| Term::signal(conditions, arena)),

            Payload::Effect { condition } => condition
                .substitute_with(substitution, arena)
                .map(|condition| Term::effect(condition, arena)),

            Payload::Constructor { keys } => keys
                .substitute_with(substitution, arena)
                .map(|keys| arena.intern(Payload::Constructor { keys })),

            Payload::OnceIterator { value } => value
                .substitute_with(substitution, arena)
                .map(|value| arena.intern(Payload::OnceIterator { value })),
            Payload::RepeatIterator { value } => value
                .substitute_with(substitution, arena)
                .map(|value| arena.intern(Payload::RepeatIterator { value })),
            Payload::MapIterator { source, transform } => {
                let source2 = source.substitute_with(substitution, arena);
                let transform2 = transform.substitute_with(substitution, arena);
                rebuild2(source, source2, transform, transform2, |source, transform, arena| {
                    arena.intern(Payload::MapIterator { source, transform })
                }, arena)
            },
            Payload::FilterIterator { source, predicate } => {
                let source2 = source.substitute_with(substitution, arena);
                let predicate2 = predicate.substitute_with(substitution, arena);
                rebuild2(source, source2, predicate, predicate2, |source, predicate, arena| {
                    arena.intern(Payload::FilterIterator { source, predicate })
                }, arena)
            },
            Payload::FlattenIterator { source } => source
                .substitute_with(substitution, arena)
                .map(|source| arena.intern(Payload::FlattenIterator { source })),
            Payload::ZipIterator { left, right } => {
                let left2 = left.substitute_with(substitution, arena);
                let right2 = right.substitute_with(substitution, arena);
                rebuild2(left, left2, right, right2, |left, right, arena| {
                    arena.intern(Payload::ZipIterator { left, right })
                }, arena)
            },
            Payload::SkipIterator { source, count } => source
                .substitute_with(substitution, arena)
                .map(|source| arena.intern(Payload::SkipIterator { source, count })),
            Payload::TakeIterator { source, count } => source
                .substitute_with(substitution, arena)
                .map(|source| arena.intern(Payload::TakeIterator { source, count })),
            Payload::EvaluateIterator { source } => source
                .substitute_with(substitution, arena)
                .map(|source| arena.intern(Payload::EvaluateIterator { source })),
            Payload::IntersperseIterator { source, separator } => {
                let source2 = source.substitute_with(substitution, arena);
                let separator2 = separator.substitute_with(substitution, arena);
                rebuild2(source, source2, separator, separator2, |source, separator, arena| {
                    arena.intern(Payload::IntersperseIterator { source, separator })
                }, arena)
            },
            Payload::KeysIterator { source } => source
                .substitute_with(substitution, arena)
                .map(|source| arena.intern(Payload::KeysIterator { source })),
            Payload::ValuesIterator { source } => source
                .substitute_with(substitution, arena)
                .map(|source| arena.intern(Payload::ValuesIterator { source })),

            // Scalars, builtins, cells and pointers bind nothing and contain no variables.
            Payload::Nil
            | Payload::Boolean(_)
            | Payload::Int(_)
            | Payload::Float(_)
            | Payload::String(_)
            | Payload::Symbol(_)
            | Payload::Timestamp(_)
            | Payload::Builtin(_)
            | Payload::Cell(_)
            | Payload::Pointer { .. }
            | Payload::EmptyIterator
            | Payload::IntegersIterator
            | Payload::RangeIterator { .. } => None,
        }
    }
}

/// Rebuilds a two-child node when either child changed.
fn rebuild2(
    first: Term,
    first2: Option<Term>,
    second: Term,
    second2: Option<Term>,
    build: impl FnOnce(Term, Term, &mut Arena) -> Term,
    arena: &mut Arena,
) -> Option<Term> {
    (first2.is_some() || second2.is_some()).then(|| build(first2.unwrap_or(first), second2.unwrap_or(second), arena))
}

fn substitute_condition(condition: Condition, substitution: Substitution, arena: &mut Arena) -> Option<Term> {
    match condition {
        Condition::Pending | Condition::InvalidPointer => None,
        Condition::Custom { effect_type, payload, token } => {
            let effect_type2 = effect_type.substitute_with(substitution, arena);
            let payload2 = payload.substitute_with(substitution, arena);
            let token2 = token.substitute_with(substitution, arena);
            (effect_type2.is_some() || payload2.is_some() || token2.is_some()).then(|| {
                Term::condition_custom(
                    effect_type2.unwrap_or(effect_type),
                    payload2.unwrap_or(payload),
                    token2.unwrap_or(token),
                    arena,
                )
            })
        },
        Condition::Error { payload } => payload
            .substitute_with(substitution, arena)
            .map(|payload| Term::condition_error(payload, arena)),
        Condition::TypeError { expected, received } => received
            .substitute_with(substitution, arena)
            .map(|received| Term::condition_type_error(expected, received, arena)),
        Condition::InvalidFunctionTarget { target } => target
            .substitute_with(substitution, arena)
            .map(|target| Term::condition_invalid_function_target(target, arena)),
        Condition::InvalidFunctionArgs { target, args } => {
            let target2 = target.substitute_with(substitution, arena);
            let args2 = args.substitute_with(substitution, arena);
            rebuild2(target, target2, args, args2, |target, args, arena| {
                Term::condition_invalid_function_args(target, args, arena)
            }, arena)
        },
    }
}

//! Conditions, signals and effects: the reactive meta-terms.
//!
//! A condition is the unit of reactive dependency and of error propagation. A signal wraps one
//! condition or a tree of conditions and represents an evaluation that could not complete; an
//! effect is a term whose evaluation is "look my condition up in the state snapshot". Dependency
//! sets share the tree spine of signal payloads.

use crate::memory::arena::Arena;
use crate::memory::term::{Condition, Payload, Term, TypeTag};

impl Term {
    /// A custom condition: the application-defined unit of reactive state.
    #[must_use]
    pub fn condition_custom(effect_type: Self, payload: Self, token: Self, arena: &mut Arena) -> Self {
        arena.intern(Payload::Condition(Condition::Custom { effect_type, payload, token }))
    }

    /// The pending condition singleton.
    #[inline]
    #[must_use]
    pub fn condition_pending(arena: &Arena) -> Self {
        arena.singletons.pending
    }

    /// An error condition carrying an arbitrary payload.
    #[must_use]
    pub fn condition_error(payload: Self, arena: &mut Arena) -> Self {
        arena.intern(Payload::Condition(Condition::Error { payload }))
    }

    /// A type-error condition: `expected` type tag, offending term.
    #[must_use]
    pub fn condition_type_error(expected: TypeTag, received: Self, arena: &mut Arena) -> Self {
        arena.intern(Payload::Condition(Condition::TypeError { expected, received }))
    }

    /// The condition raised when applying a term that is not a function.
    #[must_use]
    pub fn condition_invalid_function_target(target: Self, arena: &mut Arena) -> Self {
        arena.intern(Payload::Condition(Condition::InvalidFunctionTarget { target }))
    }

    /// The condition raised when applying a function to arguments it cannot accept.
    #[must_use]
    pub fn condition_invalid_function_args(target: Self, args: Self, arena: &mut Arena) -> Self {
        arena.intern(Payload::Condition(Condition::InvalidFunctionArgs { target, args }))
    }

    /// The invalid-pointer condition singleton.
    #[inline]
    #[must_use]
    pub fn condition_invalid_pointer(arena: &Arena) -> Self {
        arena.singletons.invalid_pointer
    }

    /// A signal wrapping a condition or a tree of conditions.
    #[must_use]
    pub fn signal(conditions: Self, arena: &mut Arena) -> Self {
        arena.intern(Payload::Signal { conditions })
    }

    /// A signal wrapping a single condition.
    #[must_use]
    pub fn signal_of(condition: Self, arena: &mut Arena) -> Self {
        Self::signal(condition, arena)
    }

    /// The pending signal singleton.
    #[inline]
    #[must_use]
    pub fn pending_signal(arena: &Arena) -> Self {
        arena.singletons.pending_signal
    }

    /// The invalid-pointer signal singleton.
    #[inline]
    #[must_use]
    pub fn invalid_pointer_signal(arena: &Arena) -> Self {
        arena.singletons.invalid_pointer_signal
    }

    /// An effect term: evaluation resolves the condition against the state snapshot.
    #[must_use]
    pub fn effect(condition: Self, arena: &mut Arena) -> Self {
        arena.intern(Payload::Effect { condition })
    }

    // ------------------------------------------------------------------
    // Predicates and accessors.
    // ------------------------------------------------------------------

    #[must_use]
    pub fn is_condition(self, arena: &Arena) -> bool {
        matches!(arena.payload(self), Payload::Condition(_))
    }

    #[must_use]
    pub fn is_signal(self, arena: &Arena) -> bool {
        matches!(arena.payload(self), Payload::Signal { .. })
    }

    #[must_use]
    pub fn is_effect(self, arena: &Arena) -> bool {
        matches!(arena.payload(self), Payload::Effect { .. })
    }

    /// The stable tag of a condition term (custom 0, pending 1, error 2, …).
    #[must_use]
    pub fn condition_tag(self, arena: &Arena) -> Option<u8> {
        match arena.payload(self) {
            Payload::Condition(condition) => Some(condition.tag()),
            _ => None,
        }
    }

    /// Whether this condition is pending (as opposed to an error kind).
    #[must_use]
    pub fn is_pending_condition(self, arena: &Arena) -> bool {
        matches!(arena.payload(self), Payload::Condition(Condition::Pending | Condition::Custom { .. }))
    }

    /// Whether this condition is an error kind.
    #[must_use]
    pub fn is_error_condition(self, arena: &Arena) -> bool {
        matches!(
            arena.payload(self),
            Payload::Condition(
                Condition::Error { .. }
                    | Condition::TypeError { .. }
                    | Condition::InvalidFunctionTarget { .. }
                    | Condition::InvalidFunctionArgs { .. }
                    | Condition::InvalidPointer
            )
        )
    }

    /// The `(effect_type, payload, token)` triple of a custom condition.
    #[must_use]
    pub fn custom_condition_parts(self, arena: &Arena) -> Option<(Self, Self, Self)> {
        match *arena.payload(self) {
            Payload::Condition(Condition::Custom { effect_type, payload, token }) => {
                Some((effect_type, payload, token))
            },
            _ => None,
        }
    }

    /// The payload of an error condition.
    #[must_use]
    pub fn error_condition_payload(self, arena: &Arena) -> Option<Self> {
        match *arena.payload(self) {
            Payload::Condition(Condition::Error { payload }) => Some(payload),
            _ => None,
        }
    }

    /// The condition tree of a signal term.
    #[must_use]
    pub fn signal_conditions(self, arena: &Arena) -> Option<Self> {
        match *arena.payload(self) {
            Payload::Signal { conditions } => Some(conditions),
            _ => None,
        }
    }

    /// The condition of an effect term.
    #[must_use]
    pub fn effect_condition(self, arena: &Arena) -> Option<Self> {
        match *arena.payload(self) {
            Payload::Effect { condition } => Some(condition),
            _ => None,
        }
    }

    /// The union of two signals: their condition trees concatenated.
    #[must_use]
    pub fn union_signals(self, other: Self, arena: &mut Arena) -> Self {
        let left = self.signal_conditions(arena).expect("union of a term that is not a signal");
        let right = other.signal_conditions(arena).expect("union of a term that is not a signal");
        let conditions = Self::join_condition_trees(Some(left), Some(right), arena).expect("non-empty union");
        Self::signal(conditions, arena)
    }

    /// Concatenates two condition trees. Either side may be a bare condition, a tree or absent.
    #[must_use]
    pub fn join_condition_trees(left: Option<Self>, right: Option<Self>, arena: &mut Arena) -> Option<Self> {
        match (left, right) {
            (None, tree) | (tree, None) => tree,
            (Some(left), Some(right)) => {
                if left == right {
                    Some(left)
                } else {
                    Some(Self::tree(Some(left), Some(right), arena))
                }
            },
        }
    }

    /// Collects the leaf conditions of a condition tree, in spine order.
    ///
    /// The handle array is built through the unsized construction protocol: nothing else may
    /// allocate while the walk runs, which holds because every collected condition already exists.
    #[must_use]
    pub fn collect_conditions(self, arena: &mut Arena) -> Self {
        let mut stack = vec![self];
        let mut items = arena.begin_unsized();
        while let Some(term) = stack.pop() {
            match *arena.payload(term) {
                Payload::Tree { left, right, .. } => {
                    // Right first so leaves pop in left-to-right order.
                    if let Some(right) = right {
                        stack.push(right);
                    }
                    if let Some(left) = left {
                        stack.push(left);
                    }
                },
                _ => arena.append_unsized(&mut items, term),
            }
        }
        let items = arena.finish_unsized(items);
        arena.intern(Payload::List(items))
    }

    /// Walks the leaf conditions of a condition tree in spine order, without allocating.
    pub fn walk_conditions(self, arena: &Arena, visit: &mut impl FnMut(Self)) {
        let mut stack = vec![self];
        while let Some(term) = stack.pop() {
            match *arena.payload(term) {
                Payload::Tree { left, right, .. } => {
                    if let Some(right) = right {
                        stack.push(right);
                    }
                    if let Some(left) = left {
                        stack.push(left);
                    }
                },
                _ => visit(term),
            }
        }
    }

    /// Collects the distinct leaf conditions of a condition tree, deduplicated structurally.
    #[must_use]
    pub fn distinct_conditions(self, arena: &Arena) -> Vec<Self> {
        let mut seen = std::collections::HashSet::new();
        let mut distinct = Vec::new();
        self.walk_conditions(arena, &mut |condition| {
            if seen.insert(condition.hash(arena)) {
                distinct.push(condition);
            }
        });
        distinct
    }
}

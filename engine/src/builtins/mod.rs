//! Builtin function terms and their application protocol.
//!
//! Every builtin declares an arity: a fixed run of argument slots, optionally followed by a
//! variadic tail, each slot marked strict, eager or lazy. Strict slots are reduced before
//! dispatch and short-circuit on signals; eager slots are additionally drained into lists when
//! they reduce to iterators; lazy slots pass through untouched, which is how the control family
//! (`If`, `IfPending`, `IfError`, `Sequence`) opts out of signal short-circuiting for the slots
//! it wants to inspect or skip.

pub mod arithmetic;
pub mod collection;
pub mod control;
pub mod logic;

use crate::eval::evaluator::evaluate;
use crate::eval::state::{Dependencies, State};
use crate::memory::arena::Arena;
use crate::memory::term::iterator::collect_iterable;
use crate::memory::term::{Term, TypeTag};

/// How an argument slot treats its value before the implementation runs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ArgKind {
    /// Reduced before dispatch; a signal short-circuits the application.
    Strict,
    /// Reduced, then drained into a list when it is an iterator; signals short-circuit.
    Eager,
    /// Passed through unreduced; signals flow into the implementation.
    Lazy,
}

/// The argument protocol of a builtin.
#[derive(Clone, Copy, Debug)]
pub struct Arity {
    required: &'static [ArgKind],
    variadic: Option<ArgKind>,
}

impl Arity {
    pub(crate) const fn exact(required: &'static [ArgKind]) -> Self {
        Self { required, variadic: None }
    }

    pub(crate) const fn variadic(required: &'static [ArgKind], tail: ArgKind) -> Self {
        Self { required, variadic: Some(tail) }
    }

    /// Whether an argument count satisfies this arity.
    #[must_use]
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.required.len() && (self.variadic.is_some() || count == self.required.len())
    }

    /// The kind of the `index`-th argument slot.
    #[must_use]
    pub fn kind(&self, index: usize) -> ArgKind {
        self.required.get(index).copied().or(self.variadic).unwrap_or(ArgKind::Strict)
    }
}

/// The identifiers of the builtin function terms.
///
/// Discriminants are stable: they participate in term hashing and serialized layouts.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(u32)]
pub enum BuiltinId {
    Add = 0,
    Subtract = 1,
    Multiply = 2,
    Divide = 3,
    Remainder = 4,
    Abs = 5,
    Min = 6,
    Max = 7,
    Pow = 8,
    Log = 9,
    Equal = 10,
    Lt = 11,
    Gt = 12,
    Not = 13,
    And = 14,
    Or = 15,
    If = 16,
    IfPending = 17,
    IfError = 18,
    Sequence = 19,
    Length = 20,
    Get = 21,
    Push = 22,
    Concat = 23,
    Keys = 24,
    Values = 25,
    CollectList = 26,
    CollectHashmap = 27,
    ResolveDeep = 28,
}

impl BuiltinId {
    /// Every builtin, in discriminant order.
    pub const ALL: [Self; 29] = [
        Self::Add,
        Self::Subtract,
        Self::Multiply,
        Self::Divide,
        Self::Remainder,
        Self::Abs,
        Self::Min,
        Self::Max,
        Self::Pow,
        Self::Log,
        Self::Equal,
        Self::Lt,
        Self::Gt,
        Self::Not,
        Self::And,
        Self::Or,
        Self::If,
        Self::IfPending,
        Self::IfError,
        Self::Sequence,
        Self::Length,
        Self::Get,
        Self::Push,
        Self::Concat,
        Self::Keys,
        Self::Values,
        Self::CollectList,
        Self::CollectHashmap,
        Self::ResolveDeep,
    ];
}

impl std::fmt::Display for BuiltinId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl BuiltinId {
    /// The argument protocol of this builtin.
    #[must_use]
    pub fn arity(self) -> Arity {
        use ArgKind::{Eager, Lazy, Strict};
        match self {
            Self::Add
            | Self::Subtract
            | Self::Multiply
            | Self::Divide
            | Self::Remainder
            | Self::Min
            | Self::Max
            | Self::Pow
            | Self::Equal
            | Self::Lt
            | Self::Gt
            | Self::And
            | Self::Or
            | Self::Get
            | Self::Push => Arity::exact(&[Strict, Strict]),
            Self::Abs | Self::Log | Self::Not | Self::Keys | Self::Values | Self::ResolveDeep => {
                Arity::exact(&[Strict])
            },
            Self::If => Arity::exact(&[Strict, Lazy, Lazy]),
            Self::IfPending | Self::IfError | Self::Sequence => Arity::exact(&[Lazy, Lazy]),
            Self::Length | Self::CollectList | Self::CollectHashmap => Arity::exact(&[Eager]),
            Self::Concat => Arity::variadic(&[], Strict),
        }
    }

    /// Whether signal terms may occupy this builtin's lazy argument slots.
    ///
    /// Only the control family that exists to inspect or discard failures accepts them; for
    /// every other builtin a signal argument short-circuits the application even in a lazy slot.
    #[must_use]
    pub const fn accepts_signal_args(self) -> bool {
        matches!(self, Self::IfPending | Self::IfError | Self::Sequence)
    }

    /// Dispatches to the implementation. Arguments have already been processed per the arity.
    fn invoke(self, args: &[Term], state: State, arena: &mut Arena) -> (Term, Dependencies) {
        match self {
            Self::Add => arithmetic::add(args, arena),
            Self::Subtract => arithmetic::subtract(args, arena),
            Self::Multiply => arithmetic::multiply(args, arena),
            Self::Divide => arithmetic::divide(args, arena),
            Self::Remainder => arithmetic::remainder(args, arena),
            Self::Abs => arithmetic::abs(args, arena),
            Self::Min => arithmetic::min(args, arena),
            Self::Max => arithmetic::max(args, arena),
            Self::Pow => arithmetic::pow(args, arena),
            Self::Log => arithmetic::log(args, arena),
            Self::Equal => logic::equal(args, arena),
            Self::Lt => logic::lt(args, arena),
            Self::Gt => logic::gt(args, arena),
            Self::Not => logic::not(args, arena),
            Self::And => logic::and(args, arena),
            Self::Or => logic::or(args, arena),
            Self::If => control::if_(args, arena),
            Self::IfPending => control::if_pending(args, state, arena),
            Self::IfError => control::if_error(args, state, arena),
            Self::Sequence => control::sequence(args, state, arena),
            Self::Length => collection::length(args, arena),
            Self::Get => collection::get(args, arena),
            Self::Push => collection::push(args, arena),
            Self::Concat => collection::concat(args, arena),
            Self::Keys => collection::keys(args, arena),
            Self::Values => collection::values(args, arena),
            Self::CollectList => collection::collect_list(args, arena),
            Self::CollectHashmap => collection::collect_hashmap(args, arena),
            Self::ResolveDeep => collection::resolve_deep(args, state, arena),
        }
    }
}

/// Applies a builtin to raw arguments, implementing the strict/eager/lazy protocol.
pub(crate) fn apply_builtin(
    id: BuiltinId,
    target: Term,
    args: &[Term],
    state: State,
    arena: &mut Arena,
) -> (Term, Dependencies) {
    let arity = id.arity();
    if !arity.accepts(args.len()) {
        let args = Term::list(args, arena);
        let condition = Term::condition_invalid_function_args(target, args, arena);
        return (Term::signal_of(condition, arena), Dependencies::none());
    }

    let mut dependencies = Dependencies::none();
    let mut values = Vec::with_capacity(args.len());
    let mut signal: Option<Term> = None;
    for (index, &arg) in args.iter().enumerate() {
        match arity.kind(index) {
            ArgKind::Lazy => {
                // A signal already sitting in a lazy slot short-circuits unless this builtin
                // exists to inspect failures.
                if arg.is_signal(arena) && !id.accepts_signal_args() {
                    signal = Some(match signal {
                        None => arg,
                        Some(accumulated) => accumulated.union_signals(arg, arena),
                    });
                }
                values.push(arg);
            },
            kind @ (ArgKind::Strict | ArgKind::Eager) => {
                let (value, value_dependencies) = evaluate(arg, state, arena);
                dependencies = dependencies.union(value_dependencies, arena);
                let value = if kind == ArgKind::Eager && !value.is_signal(arena) {
                    let (collected, collect_dependencies) = collect_iterable(value, state, arena);
                    dependencies = dependencies.union(collect_dependencies, arena);
                    collected
                } else {
                    value
                };
                if value.is_signal(arena) {
                    signal = Some(match signal {
                        None => value,
                        Some(accumulated) => accumulated.union_signals(value, arena),
                    });
                }
                values.push(value);
            },
        }
    }

    // A signal in any strict or eager slot short-circuits without invoking the implementation.
    if let Some(signal) = signal {
        return (signal, dependencies);
    }

    arena.record_builtin_invocation();
    let (value, invoke_dependencies) = id.invoke(&values, state, arena);
    (value, dependencies.union(invoke_dependencies, arena))
}

/// A type-error signal: the uniform failure of builtins handed the wrong variant.
pub(crate) fn type_error(expected: TypeTag, received: Term, arena: &mut Arena) -> (Term, Dependencies) {
    let condition = Term::condition_type_error(expected, received, arena);
    (Term::signal_of(condition, arena), Dependencies::none())
}

/// An error signal carrying a static message.
pub(crate) fn error(message: &str, arena: &mut Arena) -> (Term, Dependencies) {
    let payload = Term::string(message, arena);
    let condition = Term::condition_error(payload, arena);
    (Term::signal_of(condition, arena), Dependencies::none())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_accepts_exact_and_variadic_counts() {
        assert!(BuiltinId::Add.arity().accepts(2));
        assert!(!BuiltinId::Add.arity().accepts(1));
        assert!(!BuiltinId::Add.arity().accepts(3));
        assert!(BuiltinId::Concat.arity().accepts(0));
        assert!(BuiltinId::Concat.arity().accepts(5));
    }

    #[test]
    fn control_family_declares_lazy_slots() {
        assert_eq!(BuiltinId::If.arity().kind(0), ArgKind::Strict);
        assert_eq!(BuiltinId::If.arity().kind(1), ArgKind::Lazy);
        assert_eq!(BuiltinId::If.arity().kind(2), ArgKind::Lazy);
        assert_eq!(BuiltinId::IfPending.arity().kind(0), ArgKind::Lazy);
        assert_eq!(BuiltinId::Sequence.arity().kind(0), ArgKind::Lazy);
        assert_eq!(BuiltinId::Length.arity().kind(0), ArgKind::Eager);
    }

    #[test]
    fn lazy_slots_still_short_circuit_on_literal_signals() {
        let mut arena = Arena::new();
        let target = Term::builtin(BuiltinId::If, &mut arena);
        let yes = Term::boolean(true, &arena);
        let then = Term::pending_signal(&arena);
        let other = Term::int(1, &mut arena);
        let (value, _) = apply_builtin(BuiltinId::If, target, &[yes, then, other], State::empty(), &mut arena);
        assert_eq!(value, then);

        // The failure-inspecting family opts out.
        let target = Term::builtin(BuiltinId::IfError, &mut arena);
        let payload = Term::string("boom", &mut arena);
        let condition = Term::condition_error(payload, &mut arena);
        let failing = Term::signal_of(condition, &mut arena);
        let fallback = Term::int(0, &mut arena);
        let (value, _) =
            apply_builtin(BuiltinId::IfError, target, &[failing, fallback], State::empty(), &mut arena);
        assert_eq!(value, fallback);
    }

    #[test]
    fn wrong_argument_count_is_invalid_function_args() {
        let mut arena = Arena::new();
        let target = Term::builtin(BuiltinId::Add, &mut arena);
        let one = Term::int(1, &mut arena);
        let (value, _) = apply_builtin(BuiltinId::Add, target, &[one], State::empty(), &mut arena);
        let conditions = value.signal_conditions(&arena).unwrap().distinct_conditions(&arena);
        assert_eq!(conditions[0].condition_tag(&arena), Some(5));
    }

    #[test]
    fn discriminants_are_stable() {
        assert_eq!(BuiltinId::Add as u32, 0);
        assert_eq!(BuiltinId::If as u32, 16);
        assert_eq!(BuiltinId::ResolveDeep as u32, 28);
    }
}

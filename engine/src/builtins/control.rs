//! Control-flow builtins.
//!
//! This family declares lazy argument slots so that signals reach the implementation instead of
//! short-circuiting the application: `If` defers both branches, `IfPending` and `IfError`
//! inspect the signal their lazy subject reduced to, and `Sequence` runs its first slot purely
//! for its dependencies.

use crate::eval::evaluator::evaluate;
use crate::eval::state::{Dependencies, State};
use crate::memory::arena::Arena;
use crate::memory::term::Term;

/// `If(condition, consequent, alternative)`: picks a branch without reducing the other.
///
/// The chosen branch is returned unreduced; the application rule evaluates it.
pub(super) fn if_(args: &[Term], arena: &mut Arena) -> (Term, Dependencies) {
    let branch = if args[0].is_truthy(arena) { args[1] } else { args[2] };
    (branch, Dependencies::none())
}

/// `IfPending(subject, fallback)`: replaces a pending result with the fallback.
///
/// The subject is reduced here (its slot is lazy, so a signal survives to this point); when it
/// reduces to a signal carrying any pending-kind condition, the fallback is handed back for the
/// application rule to reduce. Error-kind signals propagate unchanged.
pub(super) fn if_pending(args: &[Term], state: State, arena: &mut Arena) -> (Term, Dependencies) {
    let (value, dependencies) = evaluate(args[0], state, arena);
    if signal_has(value, Term::is_pending_condition, arena) {
        return (args[1], dependencies);
    }
    (value, dependencies)
}

/// `IfError(subject, fallback)`: replaces a failed result with the fallback.
///
/// The dual of [`if_pending`]: triggers on error-kind conditions, lets pending signals propagate
/// so reactive re-evaluation still happens.
pub(super) fn if_error(args: &[Term], state: State, arena: &mut Arena) -> (Term, Dependencies) {
    let (value, dependencies) = evaluate(args[0], state, arena);
    if signal_has(value, Term::is_error_condition, arena) {
        return (args[1], dependencies);
    }
    (value, dependencies)
}

/// `Sequence(first, second)`: reduces `first` for its dependencies, then yields `second`.
///
/// A signal from `first` does not short-circuit; its dependencies are recorded so invalidation
/// keeps tracking the discarded computation.
pub(super) fn sequence(args: &[Term], state: State, arena: &mut Arena) -> (Term, Dependencies) {
    let (_, dependencies) = evaluate(args[0], state, arena);
    (args[1], dependencies)
}

/// Whether `value` is a signal and any of its conditions satisfies the predicate.
fn signal_has(value: Term, predicate: impl Fn(Term, &Arena) -> bool, arena: &Arena) -> bool {
    let Some(conditions) = value.signal_conditions(arena) else {
        return false;
    };
    let mut found = false;
    conditions.walk_conditions(arena, &mut |condition| found |= predicate(condition, arena));
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::BuiltinId;

    fn run(id: BuiltinId, args: &[Term], state: State, arena: &mut Arena) -> (Term, Dependencies) {
        let target = Term::builtin(id, arena);
        let expression = Term::application(target, args, arena);
        evaluate(expression, state, arena)
    }

    fn custom_condition(token: u32, arena: &mut Arena) -> Term {
        let effect_type = Term::symbol(token, arena);
        let payload = Term::nil(arena);
        let token = Term::nil(arena);
        Term::condition_custom(effect_type, payload, token, arena)
    }

    #[test]
    fn if_picks_branches_lazily() {
        let mut arena = Arena::new();
        let yes = Term::boolean(true, &arena);
        let no = Term::boolean(false, &arena);
        let then = Term::int(1, &mut arena);
        // The untaken branch would divide by zero if it were reduced.
        let divide = Term::builtin(BuiltinId::Divide, &mut arena);
        let one = Term::int(1, &mut arena);
        let zero = Term::int(0, &mut arena);
        let poison = Term::application(divide, &[one, zero], &mut arena);

        let (value, _) = run(BuiltinId::If, &[yes, then, poison], State::empty(), &mut arena);
        assert_eq!(value.as_int(&arena), Some(1));

        let (value, _) = run(BuiltinId::If, &[no, poison, then], State::empty(), &mut arena);
        assert_eq!(value.as_int(&arena), Some(1));
    }

    #[test]
    fn if_reduces_the_chosen_branch() {
        let mut arena = Arena::new();
        let yes = Term::boolean(true, &arena);
        let add = Term::builtin(BuiltinId::Add, &mut arena);
        let one = Term::int(1, &mut arena);
        let two = Term::int(2, &mut arena);
        let sum = Term::application(add, &[one, two], &mut arena);
        let other = Term::int(9, &mut arena);

        let (value, _) = run(BuiltinId::If, &[yes, sum, other], State::empty(), &mut arena);
        assert_eq!(value.as_int(&arena), Some(3));
    }

    #[test]
    fn if_pending_substitutes_unresolved_effects() {
        let mut arena = Arena::new();
        let condition = custom_condition(7, &mut arena);
        let effect = Term::effect(condition, &mut arena);
        let fallback = Term::int(0, &mut arena);

        // Unresolved: the fallback wins, and the dependency is still recorded.
        let (value, dependencies) = run(BuiltinId::IfPending, &[effect, fallback], State::empty(), &mut arena);
        assert_eq!(value.as_int(&arena), Some(0));
        assert!(dependencies.contains(condition, &arena));

        // Resolved: the subject wins.
        let resolved = Term::int(5, &mut arena);
        let state = State::from_entries(&[(condition, resolved)], &mut arena);
        let (value, _) = run(BuiltinId::IfPending, &[effect, fallback], state, &mut arena);
        assert_eq!(value.as_int(&arena), Some(5));
    }

    #[test]
    fn if_pending_lets_errors_through() {
        let mut arena = Arena::new();
        let divide = Term::builtin(BuiltinId::Divide, &mut arena);
        let one = Term::int(1, &mut arena);
        let zero = Term::int(0, &mut arena);
        let failing = Term::application(divide, &[one, zero], &mut arena);
        let fallback = Term::int(0, &mut arena);

        let (value, _) = run(BuiltinId::IfPending, &[failing, fallback], State::empty(), &mut arena);
        assert!(value.is_signal(&arena));
    }

    #[test]
    fn if_error_substitutes_failures_only() {
        let mut arena = Arena::new();
        let divide = Term::builtin(BuiltinId::Divide, &mut arena);
        let one = Term::int(1, &mut arena);
        let zero = Term::int(0, &mut arena);
        let failing = Term::application(divide, &[one, zero], &mut arena);
        let fallback = Term::int(0, &mut arena);

        let (value, _) = run(BuiltinId::IfError, &[failing, fallback], State::empty(), &mut arena);
        assert_eq!(value.as_int(&arena), Some(0));

        // Pending conditions propagate so the host can resolve them.
        let condition = custom_condition(7, &mut arena);
        let effect = Term::effect(condition, &mut arena);
        let (value, _) = run(BuiltinId::IfError, &[effect, fallback], State::empty(), &mut arena);
        assert!(value.is_signal(&arena));
    }

    #[test]
    fn sequence_discards_its_first_result_but_keeps_dependencies() {
        let mut arena = Arena::new();
        let condition = custom_condition(7, &mut arena);
        let effect = Term::effect(condition, &mut arena);
        let result = Term::int(11, &mut arena);

        let (value, dependencies) = run(BuiltinId::Sequence, &[effect, result], State::empty(), &mut arena);
        assert_eq!(value.as_int(&arena), Some(11));
        assert!(dependencies.contains(condition, &arena));
    }
}

//! The recursive reducer.
//!
//! Evaluation is a pure function of `(term, state)` modulo the application cache: atoms return
//! themselves, applications reduce their target and dispatch, effects resolve against the state
//! snapshot, lets substitute, pointers forward. Failure never unwinds through `Result`: it flows
//! as signal terms, unioned across strict argument positions, while dependency sets accumulate
//! regardless of success so reactive invalidation keeps working across failures.

use crate::eval::cache::{self, invocation_fingerprint, CacheOutcome};
use crate::eval::state::{Dependencies, State};
use crate::memory::arena::Arena;
use crate::memory::term::{Payload, Term};

/// Reduces a term against a state snapshot.
///
/// Returns the reduced term and the set of conditions the reduction depended on. The result is a
/// signal term when evaluation could not complete; the dependency set is meaningful either way.
#[must_use]
pub fn evaluate(term: Term, state: State, arena: &mut Arena) -> (Term, Dependencies) {
    match *arena.payload(term) {
        Payload::Application { target, args } => {
            let (function, target_dependencies) = evaluate(target, state, arena);
            let args = args.list_items(arena);
            let (value, dependencies) = apply_memoized(function, &args, state, arena);
            (value, target_dependencies.union(dependencies, arena))
        },

        Payload::Effect { condition } => {
            let dependencies = Dependencies::of(condition);
            match state.lookup(condition, arena) {
                Some(value) => (value, dependencies),
                None => (Term::signal_of(condition, arena), dependencies),
            }
        },

        Payload::Let { initializer, body } => {
            let substituted = body.substitute(Some(&[initializer]), 0, arena).unwrap_or(body);
            evaluate(substituted, state, arena)
        },

        Payload::Pointer { target } => match target {
            Some(target) => evaluate(target, state, arena),
            None => (Term::invalid_pointer_signal(arena), Dependencies::none()),
        },

        // Everything else, signals included, evaluates to itself.
        _ => (term, Dependencies::none()),
    }
}

/// Applies an already-reduced target to arguments through the memoization cache.
///
/// The application is the memoization boundary: the fingerprint folds the target's identity with
/// the structural hashes of the unreduced arguments, and the cached value is the fully evaluated
/// result.
fn apply_memoized(function: Term, args: &[Term], state: State, arena: &mut Arena) -> (Term, Dependencies) {
    let key = invocation_fingerprint(function, args, arena);
    match cache::lookup(key, state, arena) {
        CacheOutcome::Hit { value, dependencies } => (value, dependencies),
        CacheOutcome::Miss => {
            let (applied, apply_dependencies) = apply(function, args, state, arena);
            let (value, result_dependencies) = evaluate(applied, state, arena);
            let dependencies = apply_dependencies.union(result_dependencies, arena);
            cache::record(key, value, dependencies, state, arena);
            (value, dependencies)
        },
    }
}

/// Applies a function term to arguments.
///
/// Builtins dispatch through their argument protocol; partial applications prepend their bound
/// arguments; lambdas substitute their scope and hand the body back unevaluated (reduction of the
/// body is the caller's responsibility); signals absorb the application. Applying anything else
/// is an invalid-function-target signal.
#[must_use]
pub fn apply(target: Term, args: &[Term], state: State, arena: &mut Arena) -> (Term, Dependencies) {
    match *arena.payload(target) {
        Payload::Builtin(id) => crate::builtins::apply_builtin(id, target, args, state, arena),

        Payload::Partial { target: inner, args: bound } => {
            let mut combined = bound.list_items(arena);
            combined.extend_from_slice(args);
            apply(inner, &combined, state, arena)
        },

        Payload::Lambda { arity, body } => {
            if args.len() != arity as usize {
                let args = Term::list(args, arena);
                let condition = Term::condition_invalid_function_args(target, args, arena);
                return (Term::signal_of(condition, arena), Dependencies::none());
            }
            if arity == 0 {
                return (body, Dependencies::none());
            }
            (body.substitute(Some(args), 0, arena).unwrap_or(body), Dependencies::none())
        },

        Payload::Signal { .. } => (target, Dependencies::none()),

        _ => {
            let condition = Term::condition_invalid_function_target(target, arena);
            (Term::signal_of(condition, arena), Dependencies::none())
        },
    }
}

/// Applies and then reduces in one step; the shape iterator combinators and builtins need.
#[must_use]
pub(crate) fn apply_and_evaluate(target: Term, args: &[Term], state: State, arena: &mut Arena) -> (Term, Dependencies) {
    let (applied, apply_dependencies) = apply(target, args, state, arena);
    let (value, result_dependencies) = evaluate(applied, state, arena);
    (value, apply_dependencies.union(result_dependencies, arena))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::BuiltinId;

    fn custom_condition(token: u32, payload: i64, arena: &mut Arena) -> Term {
        let effect_type = Term::symbol(token, arena);
        let payload = Term::int(payload, arena);
        let token = Term::nil(arena);
        Term::condition_custom(effect_type, payload, token, arena)
    }

    #[test]
    fn atoms_evaluate_to_themselves() {
        let mut arena = Arena::new();
        let int = Term::int(42, &mut arena);
        let string = Term::string("still me", &mut arena);
        for term in [int, string, Term::nil(&arena)] {
            let (value, dependencies) = evaluate(term, State::empty(), &mut arena);
            assert_eq!(value, term);
            assert!(dependencies.is_empty());
        }
    }

    #[test]
    fn pure_arithmetic_application() {
        let mut arena = Arena::new();
        let add = Term::builtin(BuiltinId::Add, &mut arena);
        let three = Term::int(3, &mut arena);
        let four = Term::int(4, &mut arena);
        let expression = Term::application(add, &[three, four], &mut arena);

        let (value, dependencies) = evaluate(expression, State::empty(), &mut arena);
        assert_eq!(value.as_int(&arena), Some(7));
        assert!(dependencies.is_empty());
        assert_eq!(format!("{}", crate::memory::term::pretty::Term(value, &arena)), "7");
    }

    #[test]
    fn signal_argument_short_circuits() {
        let mut arena = Arena::new();
        let add = Term::builtin(BuiltinId::Add, &mut arena);
        let three = Term::int(3, &mut arena);
        let condition = {
            let effect_type = Term::symbol(123, &mut arena);
            let payload = Term::string("foo", &mut arena);
            let token = Term::nil(&arena);
            Term::condition_custom(effect_type, payload, token, &mut arena)
        };
        let signal = Term::signal_of(condition, &mut arena);
        let expression = Term::application(add, &[three, signal], &mut arena);

        let invocations = arena.builtin_invocations();
        let (value, dependencies) = evaluate(expression, State::empty(), &mut arena);
        assert!(value.is_signal(&arena));
        let conditions = value.signal_conditions(&arena).unwrap().distinct_conditions(&arena);
        assert_eq!(conditions, vec![condition]);
        assert!(dependencies.is_empty());
        // The implementation was never invoked.
        assert_eq!(arena.builtin_invocations(), invocations);
    }

    #[test]
    fn multiple_signal_arguments_union() {
        let mut arena = Arena::new();
        let add = Term::builtin(BuiltinId::Add, &mut arena);
        let first = custom_condition(1, 0, &mut arena);
        let second = custom_condition(2, 0, &mut arena);
        let left = Term::signal_of(first, &mut arena);
        let right = Term::signal_of(second, &mut arena);
        let expression = Term::application(add, &[left, right], &mut arena);

        let (value, _) = evaluate(expression, State::empty(), &mut arena);
        let conditions = value.signal_conditions(&arena).unwrap().distinct_conditions(&arena);
        assert_eq!(conditions, vec![first, second]);
    }

    #[test]
    fn effect_resolves_from_state() {
        let mut arena = Arena::new();
        let condition = custom_condition(123, 3, &mut arena);
        let effect = Term::effect(condition, &mut arena);
        let value = Term::int(42, &mut arena);
        let state = State::from_entries(&[(condition, value)], &mut arena);

        let (result, dependencies) = evaluate(effect, state, &mut arena);
        assert_eq!(result, value);
        assert_eq!(dependencies.conditions(&arena), vec![condition]);
    }

    #[test]
    fn unresolved_effect_signals_its_condition() {
        let mut arena = Arena::new();
        let condition = custom_condition(123, 3, &mut arena);
        let effect = Term::effect(condition, &mut arena);

        let (result, dependencies) = evaluate(effect, State::empty(), &mut arena);
        assert!(result.is_signal(&arena));
        let conditions = result.signal_conditions(&arena).unwrap().distinct_conditions(&arena);
        assert_eq!(conditions, vec![condition]);
        assert_eq!(dependencies.conditions(&arena), vec![condition]);
    }

    #[test]
    fn lambda_application_substitutes_in_scope_order() {
        let mut arena = Arena::new();
        // lambda(2, subtract(var(1), var(0))) applied to [3, 4] is 3 − 4.
        let subtract = Term::builtin(BuiltinId::Subtract, &mut arena);
        let var1 = Term::variable(1, &mut arena);
        let var0 = Term::variable(0, &mut arena);
        let body = Term::application(subtract, &[var1, var0], &mut arena);
        let lambda = Term::lambda(2, body, &mut arena);
        let three = Term::int(3, &mut arena);
        let four = Term::int(4, &mut arena);
        let expression = Term::application(lambda, &[three, four], &mut arena);

        let (value, dependencies) = evaluate(expression, State::empty(), &mut arena);
        assert_eq!(value.as_int(&arena), Some(-1));
        assert!(dependencies.is_empty());
    }

    #[test]
    fn let_substitutes_its_initializer_lazily() {
        let mut arena = Arena::new();
        let add = Term::builtin(BuiltinId::Add, &mut arena);
        let var0 = Term::variable(0, &mut arena);
        let one = Term::int(1, &mut arena);
        let body = Term::application(add, &[var0, one], &mut arena);
        let five = Term::int(5, &mut arena);
        let binding = Term::let_term(five, body, &mut arena);

        let (value, _) = evaluate(binding, State::empty(), &mut arena);
        assert_eq!(value.as_int(&arena), Some(6));
    }

    #[test]
    fn pointers_dereference_recursively() {
        let mut arena = Arena::new();
        let value = Term::int(9, &mut arena);
        let inner = Term::pointer(Some(value), &mut arena);
        let outer = Term::pointer(Some(inner), &mut arena);

        let (resolved, _) = evaluate(outer, State::empty(), &mut arena);
        assert_eq!(resolved, value);

        let dangling = Term::pointer(None, &mut arena);
        let (signal, _) = evaluate(dangling, State::empty(), &mut arena);
        assert_eq!(signal, Term::invalid_pointer_signal(&arena));
    }

    #[test]
    fn signals_evaluate_to_themselves_and_absorb_application() {
        let mut arena = Arena::new();
        let signal = Term::pending_signal(&arena);
        let (value, dependencies) = evaluate(signal, State::empty(), &mut arena);
        assert_eq!(value, signal);
        assert!(dependencies.is_empty());

        let arg = Term::int(1, &mut arena);
        let (applied, _) = apply(signal, &[arg], State::empty(), &mut arena);
        assert_eq!(applied, signal);
    }

    #[test]
    fn applying_a_non_function_is_an_invalid_target() {
        let mut arena = Arena::new();
        let three = Term::int(3, &mut arena);
        let four = Term::int(4, &mut arena);
        let expression = Term::application(three, &[four], &mut arena);

        let (value, _) = evaluate(expression, State::empty(), &mut arena);
        assert!(value.is_signal(&arena));
        let conditions = value.signal_conditions(&arena).unwrap().distinct_conditions(&arena);
        assert_eq!(conditions[0].condition_tag(&arena), Some(4));
    }

    #[test]
    fn wrong_arity_is_invalid_function_args() {
        let mut arena = Arena::new();
        let body = Term::variable(0, &mut arena);
        let lambda = Term::lambda(2, body, &mut arena);
        let one = Term::int(1, &mut arena);
        let expression = Term::application(lambda, &[one], &mut arena);

        let (value, _) = evaluate(expression, State::empty(), &mut arena);
        let conditions = value.signal_conditions(&arena).unwrap().distinct_conditions(&arena);
        assert_eq!(conditions[0].condition_tag(&arena), Some(5));
    }

    #[test]
    fn partial_applications_prepend_bound_args() {
        let mut arena = Arena::new();
        let subtract = Term::builtin(BuiltinId::Subtract, &mut arena);
        let ten = Term::int(10, &mut arena);
        let partial = Term::partial(subtract, &[ten], &mut arena);
        let three = Term::int(3, &mut arena);
        let expression = Term::application(partial, &[three], &mut arena);

        let (value, _) = evaluate(expression, State::empty(), &mut arena);
        assert_eq!(value.as_int(&arena), Some(7));
    }

    #[test]
    fn evaluation_is_deterministic_across_repeats() {
        let mut arena = Arena::new();
        let condition = custom_condition(9, 9, &mut arena);
        let effect = Term::effect(condition, &mut arena);
        let add = Term::builtin(BuiltinId::Add, &mut arena);
        let one = Term::int(1, &mut arena);
        let expression = Term::application(add, &[effect, one], &mut arena);
        let resolved = Term::int(41, &mut arena);
        let state = State::from_entries(&[(condition, resolved)], &mut arena);

        let (first, first_deps) = evaluate(expression, state, &mut arena);
        let (second, second_deps) = evaluate(expression, state, &mut arena);
        assert_eq!(first, second);
        assert_eq!(first_deps.conditions(&arena), second_deps.conditions(&arena));
        assert_eq!(first.as_int(&arena), Some(42));
    }

    mod memoization {
        use super::*;

        #[test]
        fn identical_snapshot_hits_the_fast_path() {
            let mut arena = Arena::new();
            let add = Term::builtin(BuiltinId::Add, &mut arena);
            let three = Term::int(3, &mut arena);
            let four = Term::int(4, &mut arena);
            let expression = Term::application(add, &[three, four], &mut arena);

            let (first, _) = evaluate(expression, State::empty(), &mut arena);
            let invocations = arena.builtin_invocations();
            let (second, _) = evaluate(expression, State::empty(), &mut arena);
            assert_eq!(first, second);
            assert_eq!(arena.builtin_invocations(), invocations, "cached call must not invoke the builtin");
        }

        #[test]
        fn unrelated_state_growth_hits_the_minimal_path() {
            let mut arena = Arena::new();
            let tracked = custom_condition(1, 1, &mut arena);
            let untracked = custom_condition(2, 2, &mut arena);
            let add = Term::builtin(BuiltinId::Add, &mut arena);
            let effect = Term::effect(tracked, &mut arena);
            let four = Term::int(4, &mut arena);
            let expression = Term::application(add, &[effect, four], &mut arena);

            let three = Term::int(3, &mut arena);
            let state1 = State::from_entries(&[(tracked, three)], &mut arena);
            let (first, _) = evaluate(expression, state1, &mut arena);
            assert_eq!(first.as_int(&arena), Some(7));

            // Same tracked value, different overall snapshot: cached result, no invocation.
            let other = Term::int(99, &mut arena);
            let state2 = State::from_entries(&[(tracked, three), (untracked, other)], &mut arena);
            let invocations = arena.builtin_invocations();
            let (second, dependencies) = evaluate(expression, state2, &mut arena);
            assert_eq!(second.as_int(&arena), Some(7));
            assert_eq!(arena.builtin_invocations(), invocations);
            assert!(dependencies.contains(tracked, &arena));
        }

        #[test]
        fn changed_dependency_invalidates() {
            let mut arena = Arena::new();
            let tracked = custom_condition(1, 1, &mut arena);
            let add = Term::builtin(BuiltinId::Add, &mut arena);
            let effect = Term::effect(tracked, &mut arena);
            let four = Term::int(4, &mut arena);
            let expression = Term::application(add, &[effect, four], &mut arena);

            let three = Term::int(3, &mut arena);
            let state1 = State::from_entries(&[(tracked, three)], &mut arena);
            let (first, _) = evaluate(expression, state1, &mut arena);
            assert_eq!(first.as_int(&arena), Some(7));

            let ten = Term::int(10, &mut arena);
            let state2 = State::from_entries(&[(tracked, ten)], &mut arena);
            let invocations = arena.builtin_invocations();
            let (second, _) = evaluate(expression, state2, &mut arena);
            assert_eq!(second.as_int(&arena), Some(14));
            assert!(arena.builtin_invocations() > invocations, "invalidation must recompute");
        }
    }
}

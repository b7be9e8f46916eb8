//! Equality, comparison and boolean builtins.

use crate::eval::state::Dependencies;
use crate::memory::arena::Arena;
use crate::memory::term::{Term, TypeTag};

use super::type_error;

pub(super) fn equal(args: &[Term], arena: &mut Arena) -> (Term, Dependencies) {
    let value = args[0].equals(args[1], arena);
    (Term::boolean(value, arena), Dependencies::none())
}

fn compare(
    args: &[Term],
    arena: &mut Arena,
    ints: impl FnOnce(i64, i64) -> bool,
    floats: impl FnOnce(f64, f64) -> bool,
) -> (Term, Dependencies) {
    let verdict = match (args[0].as_int(arena), args[1].as_int(arena)) {
        (Some(a), Some(b)) => ints(a, b),
        _ => {
            let Some(a) = args[0].as_number(arena) else {
                return type_error(TypeTag::Int, args[0], arena);
            };
            let Some(b) = args[1].as_number(arena) else {
                return type_error(TypeTag::Int, args[1], arena);
            };
            floats(a, b)
        },
    };
    (Term::boolean(verdict, arena), Dependencies::none())
}

pub(super) fn lt(args: &[Term], arena: &mut Arena) -> (Term, Dependencies) {
    compare(args, arena, |a, b| a < b, |a, b| a < b)
}

pub(super) fn gt(args: &[Term], arena: &mut Arena) -> (Term, Dependencies) {
    compare(args, arena, |a, b| a > b, |a, b| a > b)
}

pub(super) fn not(args: &[Term], arena: &mut Arena) -> (Term, Dependencies) {
    let value = !args[0].is_truthy(arena);
    (Term::boolean(value, arena), Dependencies::none())
}

pub(super) fn and(args: &[Term], arena: &mut Arena) -> (Term, Dependencies) {
    let value = args[0].is_truthy(arena) && args[1].is_truthy(arena);
    (Term::boolean(value, arena), Dependencies::none())
}

pub(super) fn or(args: &[Term], arena: &mut Arena) -> (Term, Dependencies) {
    let value = args[0].is_truthy(arena) || args[1].is_truthy(arena);
    (Term::boolean(value, arena), Dependencies::none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::BuiltinId;
    use crate::eval::evaluate;
    use crate::eval::state::State;

    fn run(id: BuiltinId, args: &[Term], arena: &mut Arena) -> Term {
        let target = Term::builtin(id, arena);
        let expression = Term::application(target, args, arena);
        evaluate(expression, State::empty(), arena).0
    }

    #[test]
    fn equality_is_structural() {
        let mut arena = Arena::new();
        let first = {
            let one = Term::int(1, &mut arena);
            let two = Term::int(2, &mut arena);
            Term::list(&[one, two], &mut arena)
        };
        let second = {
            let one = Term::int(1, &mut arena);
            let two = Term::int(2, &mut arena);
            Term::list(&[one, two], &mut arena)
        };
        assert_eq!(run(BuiltinId::Equal, &[first, second], &mut arena).as_bool(&arena), Some(true));
        let other = Term::int(3, &mut arena);
        assert_eq!(run(BuiltinId::Equal, &[first, other], &mut arena).as_bool(&arena), Some(false));
    }

    #[test]
    fn comparisons_mix_domains() {
        let mut arena = Arena::new();
        let three = Term::int(3, &mut arena);
        let pi = Term::float(3.14, &mut arena);
        assert_eq!(run(BuiltinId::Lt, &[three, pi], &mut arena).as_bool(&arena), Some(true));
        assert_eq!(run(BuiltinId::Gt, &[three, pi], &mut arena).as_bool(&arena), Some(false));
    }

    #[test]
    fn comparing_non_numbers_is_a_type_error() {
        let mut arena = Arena::new();
        let three = Term::int(3, &mut arena);
        let text = Term::string("three", &mut arena);
        let value = run(BuiltinId::Lt, &[three, text], &mut arena);
        assert!(value.is_signal(&arena));
    }

    #[test]
    fn boolean_operators_use_truthiness() {
        let mut arena = Arena::new();
        let yes = Term::boolean(true, &arena);
        let nil = Term::nil(&arena);
        let zero = Term::int(0, &mut arena);
        assert_eq!(run(BuiltinId::Not, &[nil], &mut arena).as_bool(&arena), Some(true));
        assert_eq!(run(BuiltinId::Not, &[zero], &mut arena).as_bool(&arena), Some(false));
        assert_eq!(run(BuiltinId::And, &[yes, zero], &mut arena).as_bool(&arena), Some(true));
        assert_eq!(run(BuiltinId::And, &[yes, nil], &mut arena).as_bool(&arena), Some(false));
        assert_eq!(run(BuiltinId::Or, &[nil, zero], &mut arena).as_bool(&arena), Some(true));
    }
}

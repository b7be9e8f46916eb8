//! Numeric builtins.
//!
//! Integer operations stay in the integer domain and fail loudly (as error signals) on overflow
//! and division by zero; as soon as a float is involved the operation widens to floats and IEEE
//! semantics take over. Transcendentals go through the host bindings.

use crate::eval::state::Dependencies;
use crate::memory::arena::Arena;
use crate::memory::term::{Term, TypeTag};

use super::{error, type_error};

/// The two numeric domains an operation can resolve to.
enum Operands {
    Ints(i64, i64),
    Floats(f64, f64),
}

/// Classifies a pair of arguments, or reports which one is not a number.
fn numeric_pair(left: Term, right: Term, arena: &Arena) -> Result<Operands, Term> {
    match (left.as_int(arena), right.as_int(arena)) {
        (Some(a), Some(b)) => Ok(Operands::Ints(a, b)),
        _ => {
            let a = left.as_number(arena).ok_or(left)?;
            let b = right.as_number(arena).ok_or(right)?;
            Ok(Operands::Floats(a, b))
        },
    }
}

fn binary(
    args: &[Term],
    arena: &mut Arena,
    ints: impl FnOnce(i64, i64) -> Option<i64>,
    floats: impl FnOnce(f64, f64) -> f64,
) -> (Term, Dependencies) {
    match numeric_pair(args[0], args[1], arena) {
        Ok(Operands::Ints(a, b)) => match ints(a, b) {
            Some(value) => (Term::int(value, arena), Dependencies::none()),
            None => error("integer overflow", arena),
        },
        Ok(Operands::Floats(a, b)) => (Term::float(floats(a, b), arena), Dependencies::none()),
        Err(received) => type_error(TypeTag::Int, received, arena),
    }
}

pub(super) fn add(args: &[Term], arena: &mut Arena) -> (Term, Dependencies) {
    binary(args, arena, i64::checked_add, |a, b| a + b)
}

pub(super) fn subtract(args: &[Term], arena: &mut Arena) -> (Term, Dependencies) {
    binary(args, arena, i64::checked_sub, |a, b| a - b)
}

pub(super) fn multiply(args: &[Term], arena: &mut Arena) -> (Term, Dependencies) {
    binary(args, arena, i64::checked_mul, |a, b| a * b)
}

pub(super) fn divide(args: &[Term], arena: &mut Arena) -> (Term, Dependencies) {
    match numeric_pair(args[0], args[1], arena) {
        Ok(Operands::Ints(_, 0)) => error("division by zero", arena),
        Ok(Operands::Ints(a, b)) => match a.checked_div(b) {
            Some(value) => (Term::int(value, arena), Dependencies::none()),
            None => error("integer overflow", arena),
        },
        Ok(Operands::Floats(a, b)) => (Term::float(a / b, arena), Dependencies::none()),
        Err(received) => type_error(TypeTag::Int, received, arena),
    }
}

pub(super) fn remainder(args: &[Term], arena: &mut Arena) -> (Term, Dependencies) {
    match numeric_pair(args[0], args[1], arena) {
        Ok(Operands::Ints(_, 0)) => error("division by zero", arena),
        Ok(Operands::Ints(a, b)) => match a.checked_rem(b) {
            Some(value) => (Term::int(value, arena), Dependencies::none()),
            None => error("integer overflow", arena),
        },
        Ok(Operands::Floats(a, b)) => (Term::float(a % b, arena), Dependencies::none()),
        Err(received) => type_error(TypeTag::Int, received, arena),
    }
}

pub(super) fn abs(args: &[Term], arena: &mut Arena) -> (Term, Dependencies) {
    if let Some(value) = args[0].as_int(arena) {
        return match value.checked_abs() {
            Some(value) => (Term::int(value, arena), Dependencies::none()),
            None => error("integer overflow", arena),
        };
    }
    match args[0].as_float(arena) {
        Some(value) => (Term::float(value.abs(), arena), Dependencies::none()),
        None => type_error(TypeTag::Int, args[0], arena),
    }
}

pub(super) fn min(args: &[Term], arena: &mut Arena) -> (Term, Dependencies) {
    binary(args, arena, |a, b| Some(a.min(b)), f64::min)
}

pub(super) fn max(args: &[Term], arena: &mut Arena) -> (Term, Dependencies) {
    binary(args, arena, |a, b| Some(a.max(b)), f64::max)
}

pub(super) fn pow(args: &[Term], arena: &mut Arena) -> (Term, Dependencies) {
    match numeric_pair(args[0], args[1], arena) {
        Ok(Operands::Ints(a, b)) => {
            let value = arena.host().pow(a as f64, b as f64);
            (Term::float(value, arena), Dependencies::none())
        },
        Ok(Operands::Floats(a, b)) => {
            let value = arena.host().pow(a, b);
            (Term::float(value, arena), Dependencies::none())
        },
        Err(received) => type_error(TypeTag::Float, received, arena),
    }
}

pub(super) fn log(args: &[Term], arena: &mut Arena) -> (Term, Dependencies) {
    match args[0].as_number(arena) {
        Some(value) => {
            let value = arena.host().log(value);
            (Term::float(value, arena), Dependencies::none())
        },
        None => type_error(TypeTag::Float, args[0], arena),
    }
}

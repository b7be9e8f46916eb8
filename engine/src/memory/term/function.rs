//! Function-shaped term variants: builtins, partial applications, lambdas, variables, lets and
//! applications.
//!
//! Lambdas carry no parameter names: bodies refer to their parameters through
//! [variable](Term::variable) offsets, last parameter at offset zero. The
//! [builder](super::builder) module provides a named surface on top of this layout.

use crate::builtins::BuiltinId;
use crate::memory::arena::Arena;
use crate::memory::term::{Payload, Term};

impl Term {
    /// A builtin function term.
    #[must_use]
    pub fn builtin(id: BuiltinId, arena: &mut Arena) -> Self {
        arena.intern(Payload::Builtin(id))
    }

    /// A partial application: `target` with `bound_args` already supplied.
    #[must_use]
    pub fn partial(target: Self, bound_args: &[Self], arena: &mut Arena) -> Self {
        let args = Self::list(bound_args, arena);
        Self::partial_with_arg_list(target, args, arena)
    }

    pub(crate) fn partial_with_arg_list(target: Self, args: Self, arena: &mut Arena) -> Self {
        arena.intern(Payload::Partial { target, args })
    }

    /// A lambda of the given arity.
    #[must_use]
    pub fn lambda(arity: u32, body: Self, arena: &mut Arena) -> Self {
        arena.intern(Payload::Lambda { arity, body })
    }

    /// A variable referring to the binder at the given scope offset.
    #[must_use]
    pub fn variable(offset: u32, arena: &mut Arena) -> Self {
        arena.intern(Payload::Variable(offset))
    }

    /// A let binding: `body` evaluates with `initializer` pushed as a one-element scope.
    #[must_use]
    pub fn let_term(initializer: Self, body: Self, arena: &mut Arena) -> Self {
        arena.intern(Payload::Let { initializer, body })
    }

    /// An application of `target` to `args`.
    #[must_use]
    pub fn application(target: Self, args: &[Self], arena: &mut Arena) -> Self {
        let args = Self::list(args, arena);
        Self::application_with_arg_list(target, args, arena)
    }

    pub(crate) fn application_with_arg_list(target: Self, args: Self, arena: &mut Arena) -> Self {
        arena.intern(Payload::Application { target, args })
    }

    // ------------------------------------------------------------------
    // Predicates and accessors.
    // ------------------------------------------------------------------

    #[must_use]
    pub fn is_builtin(self, arena: &Arena) -> bool {
        matches!(arena.payload(self), Payload::Builtin(_))
    }

    #[must_use]
    pub fn is_partial(self, arena: &Arena) -> bool {
        matches!(arena.payload(self), Payload::Partial { .. })
    }

    #[must_use]
    pub fn is_lambda(self, arena: &Arena) -> bool {
        matches!(arena.payload(self), Payload::Lambda { .. })
    }

    #[must_use]
    pub fn is_variable(self, arena: &Arena) -> bool {
        matches!(arena.payload(self), Payload::Variable(_))
    }

    #[must_use]
    pub fn is_let(self, arena: &Arena) -> bool {
        matches!(arena.payload(self), Payload::Let { .. })
    }

    #[must_use]
    pub fn is_application(self, arena: &Arena) -> bool {
        matches!(arena.payload(self), Payload::Application { .. })
    }

    #[must_use]
    pub fn builtin_id(self, arena: &Arena) -> Option<BuiltinId> {
        match *arena.payload(self) {
            Payload::Builtin(id) => Some(id),
            _ => None,
        }
    }

    #[must_use]
    pub fn lambda_arity(self, arena: &Arena) -> Option<u32> {
        match *arena.payload(self) {
            Payload::Lambda { arity, .. } => Some(arity),
            _ => None,
        }
    }

    #[must_use]
    pub fn lambda_body(self, arena: &Arena) -> Option<Self> {
        match *arena.payload(self) {
            Payload::Lambda { body, .. } => Some(body),
            _ => None,
        }
    }

    #[must_use]
    pub fn variable_offset(self, arena: &Arena) -> Option<u32> {
        match *arena.payload(self) {
            Payload::Variable(offset) => Some(offset),
            _ => None,
        }
    }

    /// The target of an application or partial application.
    #[must_use]
    pub fn application_target(self, arena: &Arena) -> Option<Self> {
        match *arena.payload(self) {
            Payload::Application { target, .. } | Payload::Partial { target, .. } => Some(target),
            _ => None,
        }
    }

    /// The argument list term of an application or partial application.
    #[must_use]
    pub fn application_args(self, arena: &Arena) -> Option<Self> {
        match *arena.payload(self) {
            Payload::Application { args, .. } | Payload::Partial { args, .. } => Some(args),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn application_accessors() {
        let mut arena = Arena::new();
        let target = Term::builtin(BuiltinId::Add, &mut arena);
        let three = Term::int(3, &mut arena);
        let four = Term::int(4, &mut arena);
        let application = Term::application(target, &[three, four], &mut arena);

        assert!(application.is_application(&arena));
        assert_eq!(application.application_target(&arena), Some(target));
        let args = application.application_args(&arena).unwrap();
        assert_eq!(args.list_items(&arena), vec![three, four]);
    }

    #[test]
    fn lambda_accessors() {
        let mut arena = Arena::new();
        let body = Term::variable(0, &mut arena);
        let lambda = Term::lambda(2, body, &mut arena);
        assert_eq!(lambda.lambda_arity(&arena), Some(2));
        assert_eq!(lambda.lambda_body(&arena), Some(body));
        assert_eq!(body.variable_offset(&arena), Some(0));
    }

    #[test]
    fn identical_lambdas_intern_to_one_handle() {
        let mut arena = Arena::new();
        let first = {
            let body = Term::variable(0, &mut arena);
            Term::lambda(1, body, &mut arena)
        };
        let second = {
            let body = Term::variable(0, &mut arena);
            Term::lambda(1, body, &mut arena)
        };
        assert_eq!(first, second);
    }
}

//! A collection of safe functions to build terms from named sources.
//!
//! Lambdas and lets in the arena carry no parameter names: bodies address their binders through
//! scope offsets, last binder at offset zero. This module provides closure builders that let
//! callers write terms with names anyway; the closures thread a persistent environment mapping
//! each name to the depth it was bound at and emit the offset layout on the way out.

use derive_more::Display;
use im_rc::hashmap::HashMap as ImHashMap;

use crate::builtins::BuiltinId;
use crate::error::{Error, ResultTerm};
use crate::memory::arena::Arena;
use crate::memory::term::Term;

/// The kind of errors that can occur when building a term.
#[non_exhaustive]
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum ErrorKind {
    /// Unknown identifier.
    #[display(fmt = "unknown identifier {_0}")]
    UnknownIdentifier(String),
}

/// Correspondence between locally-bound names and the depth at which they were bound.
pub type Environment<'build> = ImHashMap<&'build str, u32>;

/// The trait of closures which build terms with an adequate binding logic.
///
/// A closure receives the arena, the environment of known bindings and the current binder depth,
/// and yields a definite term.
pub trait BuilderTrait<'build>: FnOnce(&mut Arena, &Environment<'build>, u32) -> ResultTerm {}

impl<'build, F: FnOnce(&mut Arena, &Environment<'build>, u32) -> ResultTerm> BuilderTrait<'build> for F {}

/// A boxed builder, for variadic positions (application arguments, list items, record fields).
pub type BoxedBuilder<'build> = Box<dyn FnOnce(&mut Arena, &Environment<'build>, u32) -> ResultTerm + 'build>;

/// Boxes a builder for use in a variadic position.
pub fn boxed<'build>(builder: impl BuilderTrait<'build> + 'build) -> BoxedBuilder<'build> {
    Box::new(builder)
}

impl Arena {
    /// Returns the term built from the given closure, provided with an empty environment.
    ///
    /// # Errors
    /// If the term could not be built, yields an error indicating the reason.
    #[inline]
    pub fn build<'build, F: BuilderTrait<'build>>(&mut self, f: F) -> ResultTerm {
        f(self, &Environment::new(), 0)
    }
}

/// Returns a closure building a variable bound to `name`.
#[must_use]
pub const fn var(name: &str) -> impl BuilderTrait<'_> {
    move |arena, env, depth| {
        env.get(name)
            .map(|&bound_at| Term::variable(depth - bound_at - 1, arena))
            .ok_or_else(|| Error::from(ErrorKind::UnknownIdentifier(name.to_owned())))
    }
}

/// Returns a closure building the nil term.
#[must_use]
pub const fn nil<'build>() -> impl BuilderTrait<'build> {
    |arena, _, _| Ok(Term::nil(arena))
}

/// Returns a closure building a boolean term.
#[must_use]
pub const fn boolean<'build>(value: bool) -> impl BuilderTrait<'build> {
    move |arena, _, _| Ok(Term::boolean(value, arena))
}

/// Returns a closure building an integer term.
#[must_use]
pub const fn int<'build>(value: i64) -> impl BuilderTrait<'build> {
    move |arena, _, _| Ok(Term::int(value, arena))
}

/// Returns a closure building a float term.
#[must_use]
pub const fn float<'build>(value: f64) -> impl BuilderTrait<'build> {
    move |arena, _, _| Ok(Term::float(value, arena))
}

/// Returns a closure building a string term.
#[must_use]
pub const fn string(content: &str) -> impl BuilderTrait<'_> {
    move |arena, _, _| Ok(Term::string(content, arena))
}

/// Returns a closure building a symbol term.
#[must_use]
pub const fn symbol<'build>(id: u32) -> impl BuilderTrait<'build> {
    move |arena, _, _| Ok(Term::symbol(id, arena))
}

/// Returns a closure building a builtin function term.
#[must_use]
pub const fn builtin<'build>(id: BuiltinId) -> impl BuilderTrait<'build> {
    move |arena, _, _| Ok(Term::builtin(id, arena))
}

/// Returns a closure building a lambda binding the given parameter names.
#[must_use]
pub fn lam<'build, F: BuilderTrait<'build>>(names: &'build [&'build str], body: F) -> impl BuilderTrait<'build> {
    move |arena, env, depth| {
        let arity = u32::try_from(names.len()).expect("lambda arity fits u32");
        let mut env = env.clone();
        for (index, &name) in names.iter().enumerate() {
            if name != "_" {
                env.insert(name, depth + u32::try_from(index).expect("binder index fits u32"));
            }
        }
        let body = body(arena, &env, depth + arity)?;
        Ok(Term::lambda(arity, body, arena))
    }
}

/// Returns a closure building a let binding `name` to `initializer` within `body`.
#[must_use]
pub fn let_<'build, F1: BuilderTrait<'build>, F2: BuilderTrait<'build>>(
    name: &'build str,
    initializer: F1,
    body: F2,
) -> impl BuilderTrait<'build> {
    move |arena, env, depth| {
        let initializer = initializer(arena, env, depth)?;
        let body = if name == "_" {
            body(arena, env, depth + 1)?
        } else {
            let env = env.update(name, depth);
            body(arena, &env, depth + 1)?
        };
        Ok(Term::let_term(initializer, body, arena))
    }
}

/// Returns a closure building the application of `target` to `args`.
#[must_use]
pub fn app<'build, F: BuilderTrait<'build>>(target: F, args: Vec<BoxedBuilder<'build>>) -> impl BuilderTrait<'build> {
    move |arena, env, depth| {
        let target = target(arena, env, depth)?;
        let args = args
            .into_iter()
            .map(|arg| arg(arena, env, depth))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Term::application(target, &args, arena))
    }
}

/// Returns a closure building a list term from item builders.
#[must_use]
pub fn list<'build>(items: Vec<BoxedBuilder<'build>>) -> impl BuilderTrait<'build> {
    move |arena, env, depth| {
        let items = items
            .into_iter()
            .map(|item| item(arena, env, depth))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Term::list(&items, arena))
    }
}

/// Returns a closure building a record term from named field builders.
#[must_use]
pub fn record<'build>(fields: Vec<(&'build str, BoxedBuilder<'build>)>) -> impl BuilderTrait<'build> {
    move |arena, env, depth| {
        let mut keys = Vec::with_capacity(fields.len());
        let mut values = Vec::with_capacity(fields.len());
        for (name, value) in fields {
            values.push(value(arena, env, depth)?);
            keys.push(Term::string(name, arena));
        }
        Ok(Term::record(&keys, &values, arena))
    }
}

/// Returns a closure building an effect over a custom condition.
#[must_use]
pub fn effect<'build, F1: BuilderTrait<'build>, F2: BuilderTrait<'build>, F3: BuilderTrait<'build>>(
    effect_type: F1,
    payload: F2,
    token: F3,
) -> impl BuilderTrait<'build> {
    move |arena, env, depth| {
        let effect_type = effect_type(arena, env, depth)?;
        let payload = payload(arena, env, depth)?;
        let token = token(arena, env, depth)?;
        let condition = Term::condition_custom(effect_type, payload, token, arena);
        Ok(Term::effect(condition, arena))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{evaluate, State};

    #[test]
    fn named_variables_become_scope_offsets() {
        let mut arena = Arena::new();
        // λa b. subtract(a, b)
        let term = arena
            .build(lam(
                &["a", "b"],
                app(builtin(BuiltinId::Subtract), vec![boxed(var("a")), boxed(var("b"))]),
            ))
            .unwrap();

        let expected = {
            let var1 = Term::variable(1, &mut arena);
            let var0 = Term::variable(0, &mut arena);
            let subtract = Term::builtin(BuiltinId::Subtract, &mut arena);
            let body = Term::application(subtract, &[var1, var0], &mut arena);
            Term::lambda(2, body, &mut arena)
        };
        assert_eq!(term, expected);
    }

    #[test]
    fn built_lambdas_evaluate_correctly() {
        let mut arena = Arena::new();
        let term = arena
            .build(app(
                lam(&["a", "b"], app(builtin(BuiltinId::Subtract), vec![boxed(var("a")), boxed(var("b"))])),
                vec![boxed(int(3)), boxed(int(4))],
            ))
            .unwrap();
        let (value, _) = evaluate(term, State::empty(), &mut arena);
        assert_eq!(value.as_int(&arena), Some(-1));
    }

    #[test]
    fn nested_scopes_shadow() {
        let mut arena = Arena::new();
        // λx. λx. x — the inner binder wins.
        let term = arena.build(lam(&["x"], lam(&["x"], var("x")))).unwrap();
        let expected = {
            let var0 = Term::variable(0, &mut arena);
            let inner = Term::lambda(1, var0, &mut arena);
            Term::lambda(1, inner, &mut arena)
        };
        assert_eq!(term, expected);
    }

    #[test]
    fn let_binds_one_name() {
        let mut arena = Arena::new();
        let term = arena
            .build(let_("x", int(5), app(builtin(BuiltinId::Add), vec![boxed(var("x")), boxed(int(1))])))
            .unwrap();
        let (value, _) = evaluate(term, State::empty(), &mut arena);
        assert_eq!(value.as_int(&arena), Some(6));
    }

    #[test]
    fn unknown_identifiers_are_reported() {
        let mut arena = Arena::new();
        let result = arena.build(var("missing"));
        assert_eq!(result, Err(Error::from(ErrorKind::UnknownIdentifier("missing".to_owned()))));
    }

    #[test]
    fn underscore_binders_stay_anonymous() {
        let mut arena = Arena::new();
        let result = arena.build(lam(&["_"], var("_")));
        assert!(result.is_err());
    }

    #[test]
    fn records_and_lists_build_in_order() {
        let mut arena = Arena::new();
        let term = arena
            .build(record(vec![
                ("first", boxed(int(1))),
                ("rest", boxed(list(vec![boxed(boolean(true)), boxed(nil())]))),
            ]))
            .unwrap();
        let first = Term::string("first", &mut arena);
        let one = Term::int(1, &mut arena);
        assert_eq!(term.record_get(first, &arena), Some(one));
    }
}

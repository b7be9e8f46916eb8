//! Decoding JSON data into expression terms.
//!
//! The engine's JSON codec produces pure data. The toplevel layers a small convention on top so
//! expressions can be written inline: an object with a single `@`-prefixed key is an expression
//! form, everything else stays data. Forms:
//!
//! | Form | Meaning |
//! |------|---------|
//! | `{"@builtin": "Add"}` | builtin function by name |
//! | `{"@app": [target, arg…]}` | application |
//! | `{"@lambda": {"arity": n, "body": e}}` | lambda |
//! | `{"@var": n}` | variable at scope offset `n` |
//! | `{"@let": [initializer, body]}` | let binding |
//! | `{"@effect": {"type": t, "payload": p}}` | effect over a custom condition |

use anyhow::{anyhow, bail, Result};
use engine::{Arena, BuiltinId, Term};

/// Decodes a parsed JSON term, replacing expression forms with the terms they denote.
pub fn decode(term: Term, arena: &mut Arena) -> Result<Term> {
    if term.is_list(arena) {
        let items = term.list_items(arena);
        let mut decoded = Vec::with_capacity(items.len());
        for item in items {
            decoded.push(decode(item, arena)?);
        }
        return Ok(Term::list(&decoded, arena));
    }
    if !term.is_record(arena) {
        return Ok(term);
    }

    let keys = term.record_keys(arena).expect("record keys").list_items(arena);
    if let &[key] = keys.as_slice() {
        if let Some(form) = key.as_str(arena).filter(|name| name.starts_with('@')) {
            let form = form.to_owned();
            let body = term.record_get(key, arena).expect("form body");
            return decode_form(&form, body, arena);
        }
    }

    let values = term.record_values(arena).expect("record values").list_items(arena);
    let mut decoded = Vec::with_capacity(values.len());
    for value in values {
        decoded.push(decode(value, arena)?);
    }
    let keys = term.record_keys(arena).expect("record keys");
    let values = Term::list(&decoded, arena);
    Ok(Term::record_from_lists(keys, values, arena))
}

fn decode_form(form: &str, body: Term, arena: &mut Arena) -> Result<Term> {
    match form {
        "@builtin" => {
            let name = body.as_str(arena).ok_or_else(|| anyhow!("@builtin expects a name string"))?;
            let id = builtin_by_name(name).ok_or_else(|| anyhow!("unknown builtin {name}"))?;
            Ok(Term::builtin(id, arena))
        },
        "@app" => {
            let items = body.list_items(arena);
            let [target, args @ ..] = &items[..] else {
                bail!("@app expects [target, args...]");
            };
            let target = decode(*target, arena)?;
            let args = args.iter().map(|&arg| decode(arg, arena)).collect::<Result<Vec<_>>>()?;
            Ok(Term::application(target, &args, arena))
        },
        "@lambda" => {
            let arity = record_field(body, "arity", arena)?
                .as_int(arena)
                .and_then(|arity| u32::try_from(arity).ok())
                .ok_or_else(|| anyhow!("@lambda expects a non-negative arity"))?;
            let lambda_body = record_field(body, "body", arena)?;
            let lambda_body = decode(lambda_body, arena)?;
            Ok(Term::lambda(arity, lambda_body, arena))
        },
        "@var" => {
            let offset = body
                .as_int(arena)
                .and_then(|offset| u32::try_from(offset).ok())
                .ok_or_else(|| anyhow!("@var expects a non-negative offset"))?;
            Ok(Term::variable(offset, arena))
        },
        "@let" => {
            let items = body.list_items(arena);
            let &[initializer, let_body] = items.as_slice() else {
                bail!("@let expects [initializer, body]");
            };
            let initializer = decode(initializer, arena)?;
            let let_body = decode(let_body, arena)?;
            Ok(Term::let_term(initializer, let_body, arena))
        },
        "@effect" => {
            let condition = decode_condition(body, arena)?;
            Ok(Term::effect(condition, arena))
        },
        _ => bail!("unknown expression form {form}"),
    }
}

/// Decodes `{"type": t, "payload": p}` into a custom condition term.
///
/// The same decoding backs `:let` state entries, so effects and their resolutions agree on the
/// condition's structure.
pub fn decode_condition(body: Term, arena: &mut Arena) -> Result<Term> {
    let effect_type = record_field(body, "type", arena)?;
    let effect_type = decode(effect_type, arena)?;
    let payload = record_field(body, "payload", arena).unwrap_or_else(|_| Term::nil(arena));
    let payload = decode(payload, arena)?;
    let token = Term::nil(arena);
    Ok(Term::condition_custom(effect_type, payload, token, arena))
}

fn record_field(record: Term, name: &str, arena: &mut Arena) -> Result<Term> {
    let key = Term::string(name, arena);
    record.record_get(key, arena).ok_or_else(|| anyhow!("missing field {name:?}"))
}

fn builtin_by_name(name: &str) -> Option<BuiltinId> {
    BuiltinId::ALL.into_iter().find(|id| format!("{id}") == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::json::parse;
    use engine::{evaluate, State};

    fn eval_text(text: &str, arena: &mut Arena) -> Term {
        let data = parse(text, arena).unwrap();
        let expression = decode(data, arena).unwrap();
        evaluate(expression, State::empty(), arena).0
    }

    #[test]
    fn plain_json_stays_data() {
        let mut arena = Arena::new();
        let value = eval_text(r#"{"a":[1,2]}"#, &mut arena);
        assert!(value.is_record(&arena));
    }

    #[test]
    fn applications_decode_and_run() {
        let mut arena = Arena::new();
        let value = eval_text(r#"{"@app":[{"@builtin":"Add"},3,4]}"#, &mut arena);
        assert_eq!(value.as_int(&arena), Some(7));
    }

    #[test]
    fn lambdas_and_variables_decode() {
        let mut arena = Arena::new();
        let text = r#"{"@app":[{"@lambda":{"arity":2,"body":{"@app":[{"@builtin":"Subtract"},{"@var":1},{"@var":0}]}}},3,4]}"#;
        let value = eval_text(text, &mut arena);
        assert_eq!(value.as_int(&arena), Some(-1));
    }

    #[test]
    fn effects_signal_until_resolved() {
        let mut arena = Arena::new();
        let data = parse(r#"{"@effect":{"type":"now","payload":null}}"#, &mut arena).unwrap();
        let expression = decode(data, &mut arena).unwrap();
        let (value, dependencies) = evaluate(expression, State::empty(), &mut arena);
        assert!(value.is_signal(&arena));
        assert_eq!(dependencies.conditions(&arena).len(), 1);

        let condition_spec = parse(r#"{"type":"now","payload":null}"#, &mut arena).unwrap();
        let condition = decode_condition(condition_spec, &mut arena).unwrap();
        let resolved = Term::int(1234, &mut arena);
        let state = State::from_entries(&[(condition, resolved)], &mut arena);
        let (value, _) = evaluate(expression, state, &mut arena);
        assert_eq!(value.as_int(&arena), Some(1234));
    }

    #[test]
    fn unknown_forms_are_rejected() {
        let mut arena = Arena::new();
        let data = parse(r#"{"@nope":1}"#, &mut arena).unwrap();
        assert!(decode(data, &mut arena).is_err());
    }
}

//! Collection builtins.

use crate::eval::evaluator::evaluate;
use crate::eval::state::{Dependencies, State};
use crate::memory::arena::Arena;
use crate::memory::term::{Term, TypeTag};

use super::{error, type_error};

/// `Length(iterable)`: the number of items. The slot is eager, so iterators arrive drained.
pub(super) fn length(args: &[Term], arena: &mut Arena) -> (Term, Dependencies) {
    let subject = args[0];
    let length = subject
        .list_len(arena)
        .or_else(|| subject.record_len(arena))
        .or_else(|| subject.hashmap_len(arena))
        .or_else(|| subject.hashset_len(arena))
        .or_else(|| subject.string_bytes(arena).map(|bytes| u32::try_from(bytes.len()).unwrap_or(u32::MAX)));
    match length {
        Some(length) => (Term::int(i64::from(length), arena), Dependencies::none()),
        None => type_error(TypeTag::List, subject, arena),
    }
}

/// `Get(subject, key)`: list indexing, record field access or hashmap lookup.
pub(super) fn get(args: &[Term], arena: &mut Arena) -> (Term, Dependencies) {
    let (subject, key) = (args[0], args[1]);
    if subject.is_list(arena) {
        let Some(index) = key.as_int(arena) else {
            return type_error(TypeTag::Int, key, arena);
        };
        return match u32::try_from(index).ok().and_then(|index| subject.list_item(index, arena)) {
            Some(item) => (item, Dependencies::none()),
            None => error("list index out of bounds", arena),
        };
    }
    if subject.is_record(arena) {
        return match subject.record_get(key, arena) {
            Some(value) => (value, Dependencies::none()),
            None => error("no such record field", arena),
        };
    }
    if subject.is_hashmap(arena) {
        // Hashmap lookup misses resolve to nil, not to an error.
        let value = subject.hashmap_get(key, arena).unwrap_or_else(|| Term::nil(arena));
        return (value, Dependencies::none());
    }
    type_error(TypeTag::List, subject, arena)
}

/// `Push(list, item)`: a fresh list with `item` appended.
pub(super) fn push(args: &[Term], arena: &mut Arena) -> (Term, Dependencies) {
    let (subject, item) = (args[0], args[1]);
    if !subject.is_list(arena) {
        return type_error(TypeTag::List, subject, arena);
    }
    let mut items = subject.list_items(arena);
    items.push(item);
    (Term::list(&items, arena), Dependencies::none())
}

/// `Concat(values…)`: string concatenation or list concatenation, by the first argument's type.
pub(super) fn concat(args: &[Term], arena: &mut Arena) -> (Term, Dependencies) {
    if args.is_empty() {
        return (Term::empty_list(arena), Dependencies::none());
    }
    if args[0].is_string(arena) {
        let mut text = Vec::new();
        for &arg in args {
            let Some(bytes) = arg.string_bytes(arena) else {
                return type_error(TypeTag::String, arg, arena);
            };
            text.extend_from_slice(bytes);
        }
        return (Term::string_from_bytes(&text, arena), Dependencies::none());
    }
    let mut items = Vec::new();
    for &arg in args {
        if !arg.is_list(arena) {
            return type_error(TypeTag::List, arg, arena);
        }
        items.extend(arg.list_items(arena));
    }
    (Term::list(&items, arena), Dependencies::none())
}

/// `Keys(subject)`: the keys of a record or hashmap, or the elements of a hashset.
pub(super) fn keys(args: &[Term], arena: &mut Arena) -> (Term, Dependencies) {
    let subject = args[0];
    if let Some(keys) = subject.record_keys(arena) {
        return (keys, Dependencies::none());
    }
    if subject.is_hashmap(arena) {
        let keys: Vec<Term> = subject.hashmap_entries(arena).into_iter().map(|(key, _)| key).collect();
        return (Term::list(&keys, arena), Dependencies::none());
    }
    if subject.is_hashset(arena) {
        let elements = subject.hashset_elements(arena);
        return (Term::list(&elements, arena), Dependencies::none());
    }
    type_error(TypeTag::Record, subject, arena)
}

/// `Values(subject)`: the values of a record or hashmap.
pub(super) fn values(args: &[Term], arena: &mut Arena) -> (Term, Dependencies) {
    let subject = args[0];
    if let Some(values) = subject.record_values(arena) {
        return (values, Dependencies::none());
    }
    if subject.is_hashmap(arena) {
        let values: Vec<Term> = subject.hashmap_entries(arena).into_iter().map(|(_, value)| value).collect();
        return (Term::list(&values, arena), Dependencies::none());
    }
    type_error(TypeTag::Record, subject, arena)
}

/// `CollectList(iterable)`: the eager slot has already drained iterators; anything that is not a
/// list by now was never iterable.
pub(super) fn collect_list(args: &[Term], arena: &mut Arena) -> (Term, Dependencies) {
    if args[0].is_list(arena) {
        (args[0], Dependencies::none())
    } else {
        type_error(TypeTag::List, args[0], arena)
    }
}

/// `CollectHashmap(entries)`: builds a hashmap from an iterable of `[key, value]` pairs.
pub(super) fn collect_hashmap(args: &[Term], arena: &mut Arena) -> (Term, Dependencies) {
    if !args[0].is_list(arena) {
        return type_error(TypeTag::List, args[0], arena);
    }
    let mut pairs = Vec::new();
    for entry in args[0].list_items(arena) {
        let (Some(key), Some(value)) = (entry.list_item(0, arena), entry.list_item(1, arena)) else {
            return type_error(TypeTag::List, entry, arena);
        };
        pairs.push((key, value));
    }
    (Term::hashmap(&pairs, arena), Dependencies::none())
}

/// `ResolveDeep(value)`: recursively reduces the contents of nested collections, collapsing any
/// signals encountered into one union signal.
pub(super) fn resolve_deep(args: &[Term], state: State, arena: &mut Arena) -> (Term, Dependencies) {
    resolve_term(args[0], state, arena)
}

fn resolve_term(term: Term, state: State, arena: &mut Arena) -> (Term, Dependencies) {
    let (value, dependencies) = evaluate(term, state, arena);
    if value.is_list(arena) {
        let items = value.list_items(arena);
        let (resolved, item_dependencies) = resolve_items(&items, state, arena);
        let result = match resolved {
            Ok(items) => Term::list(&items, arena),
            Err(signal) => signal,
        };
        return (result, dependencies.union(item_dependencies, arena));
    }
    if value.is_record(arena) {
        let keys = value.record_keys(arena).expect("record keys");
        let values = value.record_values(arena).expect("record values");
        let items = values.list_items(arena);
        let (resolved, item_dependencies) = resolve_items(&items, state, arena);
        let result = match resolved {
            Ok(items) => {
                let values = Term::list(&items, arena);
                Term::record_from_lists(keys, values, arena)
            },
            Err(signal) => signal,
        };
        return (result, dependencies.union(item_dependencies, arena));
    }
    (value, dependencies)
}

type ResolvedItems = Result<Vec<Term>, Term>;

fn resolve_items(items: &[Term], state: State, arena: &mut Arena) -> (ResolvedItems, Dependencies) {
    let mut dependencies = Dependencies::none();
    let mut resolved = Vec::with_capacity(items.len());
    let mut signal: Option<Term> = None;
    for &item in items {
        let (value, value_dependencies) = resolve_term(item, state, arena);
        dependencies = dependencies.union(value_dependencies, arena);
        if value.is_signal(arena) {
            signal = Some(match signal {
                None => value,
                Some(accumulated) => accumulated.union_signals(value, arena),
            });
        } else {
            resolved.push(value);
        }
    }
    match signal {
        Some(signal) => (Err(signal), dependencies),
        None => (Ok(resolved), dependencies),
    }
}

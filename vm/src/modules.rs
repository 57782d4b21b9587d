//! The module registry and the on-demand module manager.
//!
//! Loaded modules are registered by name as lists of top-level values.
//! When a program imports one, its values are executed in a fresh
//! context and the resulting dictionary is snapshotted into an object,
//! which is memoized: the second import returns the same object without
//! re-execution.
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::interpreter;
use crate::value::Value;
use crate::{Context, Error, ErrorCode, Runtime};

pub(crate) enum CacheEntry {
    /// Materialization is running; a re-entrant import is a cycle.
    InProgress,
    Materialized(Value),
}

/// Registered source modules plus the import cache.
#[derive(Default)]
pub struct Modules {
    registered: IndexMap<String, Rc<Vec<Value>>>,
    cache: HashMap<String, CacheEntry>,
}

impl Modules {
    pub fn register(&mut self, name: &str, values: Vec<Value>) {
        self.registered.insert(name.to_owned(), Rc::new(values));
    }

    pub fn lookup(&self, name: &str) -> Option<Rc<Vec<Value>>> {
        self.registered.get(name).cloned()
    }
}

/// Materialize the module registered under `path` into a dictionary
/// object, memoized by `path`.
///
/// On failure the error lands on `context` and nothing is cached, so
/// the failure is an import failure from the caller's perspective.
/// Returns `None` (without touching `context.error`) when no module is
/// registered under `path`.
pub fn import(
    rt: &Rc<Runtime>,
    context: &mut Context,
    path: &str,
) -> Option<Value> {
    {
        let modules = rt.modules.borrow();
        match modules.cache.get(path) {
            Some(CacheEntry::Materialized(object)) => {
                return Some(object.clone());
            }
            Some(CacheEntry::InProgress) => {
                context.raise(Error::new(
                    ErrorCode::ImportCycle,
                    format!("cyclic import of module `{path}`"),
                ));
                return None;
            }
            None => {}
        }
    }

    let values = rt.modules.borrow().lookup(path)?;

    tracing::debug!(module = path, "materializing module");
    rt.modules
        .borrow_mut()
        .cache
        .insert(path.to_owned(), CacheEntry::InProgress);

    let mut module_context = Context::with_filename(path);
    for value in values.iter() {
        if !interpreter::execute(rt, &mut module_context, value) {
            let error = module_context.error.take().unwrap_or_else(|| {
                Error::new(
                    ErrorCode::ImportFailure,
                    format!("unable to import module `{path}`"),
                )
            });
            context.raise(error);
            rt.modules.borrow_mut().cache.remove(path);
            return None;
        }
    }

    // Snapshot the dictionary: one property per declared word, in
    // declaration order.
    let properties: IndexMap<String, Value> = module_context
        .dictionary
        .iter()
        .map(|(id, quote)| (id.clone(), quote.clone()))
        .collect();
    let object = Value::Object(Rc::new(properties));

    rt.modules.borrow_mut().cache.insert(
        path.to_owned(),
        CacheEntry::Materialized(object.clone()),
    );
    Some(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Symbol, Word};
    use bytecode::SourcePos;

    fn pos() -> SourcePos {
        SourcePos {
            file: "m.lk".into(),
            line: 1,
            column: 1,
        }
    }

    fn sym(id: &str) -> Value {
        Value::Symbol(Rc::new(Symbol {
            id: id.into(),
            position: pos(),
        }))
    }

    fn declaration(id: &str, body: Vec<Value>) -> Value {
        Value::Word(Rc::new(Word {
            symbol: Rc::new(Symbol {
                id: id.into(),
                position: pos(),
            }),
            quote: Value::Quote(Rc::new(body)),
        }))
    }

    #[test]
    fn registry_lookup_is_exact() {
        let rt = Runtime::new();
        rt.register_module("util.lk", vec![sym("1")]);
        assert!(rt.lookup_module("util.lk").is_some());
        assert!(rt.lookup_module("UTIL.LK").is_none());
        assert!(rt.lookup_module("./util.lk").is_none());
    }

    #[test]
    fn import_snapshots_the_dictionary_in_order() {
        let rt = Runtime::new();
        rt.register_module(
            "m",
            vec![
                declaration("second", vec![sym("2")]),
                declaration("first", vec![sym("1")]),
            ],
        );

        let mut context = Context::new();
        let object = import(&rt, &mut context, "m").expect("import failed");
        match object {
            Value::Object(properties) => {
                let keys: Vec<&str> =
                    properties.keys().map(String::as_str).collect();
                assert_eq!(keys, ["second", "first"]);
                assert!(matches!(properties["first"], Value::Quote(_)));
            }
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn import_is_memoized() {
        let rt = Runtime::new();
        rt.register_module("m", vec![declaration("w", vec![sym("1")])]);

        let mut context = Context::new();
        let first = import(&rt, &mut context, "m").unwrap();
        let second = import(&rt, &mut context, "m").unwrap();
        match (&first, &second) {
            (Value::Object(a), Value::Object(b)) => {
                assert!(Rc::ptr_eq(a, b), "expected the cached object");
            }
            other => panic!("expected objects, got {other:?}"),
        }
    }

    #[test]
    fn unknown_module_returns_none_without_error() {
        let rt = Runtime::new();
        let mut context = Context::new();
        assert!(import(&rt, &mut context, "missing").is_none());
        assert!(context.error.is_none());
    }

    #[test]
    fn failed_import_propagates_error_and_is_not_cached() {
        let rt = Runtime::new();
        rt.register_module("broken", vec![sym("no-such-word")]);

        let mut context = Context::new();
        assert!(import(&rt, &mut context, "broken").is_none());
        assert_eq!(
            context.error.as_ref().unwrap().code,
            ErrorCode::UnknownWord
        );

        // Not cached: the second attempt re-executes and fails again.
        context.error = None;
        assert!(import(&rt, &mut context, "broken").is_none());
        assert_eq!(
            context.error.as_ref().unwrap().code,
            ErrorCode::UnknownWord
        );
    }

    #[test]
    fn self_import_is_a_cycle_error() {
        let rt = Runtime::new();
        rt.register_module(
            "loop",
            vec![Value::String(Rc::from("loop")), sym("import")],
        );

        let mut context = Context::new();
        assert!(import(&rt, &mut context, "loop").is_none());
        assert_eq!(
            context.error.as_ref().unwrap().code,
            ErrorCode::ImportCycle
        );
        // The failed materialization left no cache entry behind.
        assert!(!rt.modules.borrow().cache.contains_key("loop"));
    }

    #[test]
    fn import_runs_in_a_fresh_context() {
        let rt = Runtime::new();
        rt.register_module("m", vec![declaration("w", vec![sym("1")])]);

        let mut context = Context::new();
        context.stack.push(sym("sentinel"));
        import(&rt, &mut context, "m").unwrap();
        // The importer's stack and dictionary are untouched.
        assert_eq!(context.stack.len(), 1);
        assert!(context.dictionary.is_empty());
    }
}

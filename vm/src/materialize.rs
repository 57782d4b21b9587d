//! Reconstructs runtime value graphs from decoded image terms.
use std::rc::Rc;

use bytecode::{LoadedModule, SymbolTerm, Term};

use crate::value::{Symbol, Value, Word};

fn materialize_symbol(symbol: &SymbolTerm) -> Rc<Symbol> {
    Rc::new(Symbol {
        id: symbol.id.clone(),
        position: symbol.position.clone(),
    })
}

/// Turn one decoded term into a runtime value.
pub fn materialize(term: &Term) -> Value {
    match term {
        Term::Array(elements) => {
            Value::Array(Rc::new(elements.iter().map(materialize).collect()))
        }
        Term::Quote(children) => {
            Value::Quote(Rc::new(children.iter().map(materialize).collect()))
        }
        Term::Object(properties) => Value::Object(Rc::new(
            properties
                .iter()
                .map(|(key, value)| (key.clone(), materialize(value)))
                .collect(),
        )),
        Term::Str(value) => Value::String(Rc::from(value.as_str())),
        Term::Symbol(symbol) => Value::Symbol(materialize_symbol(symbol)),
        Term::Word { symbol, quote } => Value::Word(Rc::new(Word {
            symbol: materialize_symbol(symbol),
            quote: Value::Quote(Rc::new(
                quote.iter().map(materialize).collect(),
            )),
        })),
    }
}

/// Materialize a loaded module's top-level instruction list.
pub fn materialize_module(module: &LoadedModule) -> Vec<Value> {
    module.terms.iter().map(materialize).collect()
}

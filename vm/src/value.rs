use core::fmt;
use std::rc::Rc;

use bytecode::{write_escaped, SourcePos};
use indexmap::IndexMap;

/// A symbol value: identifier plus the source position it was compiled
/// from. Executing it resolves and invokes a word.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub id: String,
    pub position: SourcePos,
}

/// A word declaration value: executing it installs `symbol → quote`
/// into the current dictionary.
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub symbol: Rc<Symbol>,
    /// Always a [`Value::Quote`].
    pub quote: Value,
}

/// A runtime value.
///
/// Values form shared directed acyclic graphs; `Rc` gives the cheap
/// clones the stack discipline needs and frees a graph when the last
/// reference drops. `Number` is runtime-only: the image has no numeric
/// opcode because number literals are symbols the interpreter resolves
/// at execution time.
#[derive(Debug, Clone)]
pub enum Value {
    Array(Rc<Vec<Value>>),
    Quote(Rc<Vec<Value>>),
    Object(Rc<IndexMap<String, Value>>),
    String(Rc<str>),
    Symbol(Rc<Symbol>),
    Word(Rc<Word>),
    Number(f64),
}

impl Value {
    /// The kind name used in type-mismatch messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Array(_) => "array",
            Self::Quote(_) => "quote",
            Self::Object(_) => "object",
            Self::String(_) => "string",
            Self::Symbol(_) => "symbol",
            Self::Word(_) => "word",
            Self::Number(_) => "number",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Quote(a), Self::Quote(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Symbol(a), Self::Symbol(b)) => a == b,
            (Self::Word(a), Self::Word(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            _ => false,
        }
    }
}

fn write_joined(
    f: &mut fmt::Formatter<'_>,
    values: &[Value],
    separator: &str,
) -> fmt::Result {
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{value}")?;
    }
    Ok(())
}

/// Canonical source rendering; matches the printing of the decoded
/// image terms so loaded values compare textually against compiled
/// instructions.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Array(elements) => {
                f.write_str("[")?;
                write_joined(f, elements, ", ")?;
                f.write_str("]")
            }
            Self::Quote(children) => {
                f.write_str("(")?;
                write_joined(f, children, " ")?;
                f.write_str(")")
            }
            Self::Object(properties) => {
                f.write_str("{")?;
                for (i, (key, value)) in properties.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_escaped(f, key)?;
                    write!(f, ": {value}")?;
                }
                f.write_str("}")
            }
            Self::String(value) => write_escaped(f, value),
            Self::Symbol(symbol) => f.write_str(&symbol.id),
            Self::Word(word) => {
                write!(f, ": {}", word.symbol.id)?;
                if let Value::Quote(children) = &word.quote {
                    if !children.is_empty() {
                        f.write_str(" ")?;
                        write_joined(f, children, " ")?;
                    }
                }
                f.write_str(" ;")
            }
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos() -> SourcePos {
        SourcePos {
            file: "test.lk".into(),
            line: 1,
            column: 1,
        }
    }

    #[test]
    fn display_is_canonical_source() {
        let quote = Value::Quote(Rc::new(vec![
            Value::Symbol(Rc::new(Symbol {
                id: "dup".into(),
                position: pos(),
            })),
            Value::Symbol(Rc::new(Symbol {
                id: "*".into(),
                position: pos(),
            })),
        ]));
        let word = Value::Word(Rc::new(Word {
            symbol: Rc::new(Symbol {
                id: "square".into(),
                position: pos(),
            }),
            quote,
        }));
        assert_eq!(word.to_string(), ": square dup * ;");

        let array = Value::Array(Rc::new(vec![
            Value::Number(1.0),
            Value::String(Rc::from("a\"b")),
        ]));
        assert_eq!(array.to_string(), r#"[1, "a\"b"]"#);
    }

    #[test]
    fn equality_is_structural() {
        let a = Value::Array(Rc::new(vec![Value::Number(1.0)]));
        let b = Value::Array(Rc::new(vec![Value::Number(1.0)]));
        assert_eq!(a, b);
        assert_ne!(a, Value::Array(Rc::new(vec![Value::Number(2.0)])));
        assert_ne!(a, Value::Number(1.0));
    }
}

//! Executes one value against a context.
//!
//! The execution rules are the concatenative ones: every value is a
//! program. Literals push themselves, a word declaration installs its
//! binding, and a symbol resolves (declared word first, then built-in,
//! then number literal) and runs.
use std::rc::Rc;

use crate::value::{Symbol, Value};
use crate::{modules, Context, Error, ErrorCode, Runtime};

/// Execute `value` against `context`. Returns `false` when execution
/// raised; the error is left on `context.error`.
pub fn execute(rt: &Rc<Runtime>, context: &mut Context, value: &Value) -> bool {
    match value {
        Value::Symbol(symbol) => execute_symbol(rt, context, symbol),
        Value::Word(word) => {
            context
                .dictionary
                .insert(word.symbol.id.clone(), word.quote.clone());
            true
        }
        other => {
            context.stack.push(other.clone());
            true
        }
    }
}

/// Run a quote: execute each child in order, stopping at the first
/// failure.
pub fn call_quote(
    rt: &Rc<Runtime>,
    context: &mut Context,
    quote: &Value,
) -> bool {
    let Value::Quote(children) = quote else {
        context.raise(Error::new(
            ErrorCode::TypeMismatch,
            format!("expected quote, got {}", quote.kind()),
        ));
        return false;
    };
    for child in children.iter() {
        if !execute(rt, context, child) {
            return false;
        }
    }
    true
}

fn execute_symbol(
    rt: &Rc<Runtime>,
    context: &mut Context,
    symbol: &Symbol,
) -> bool {
    tracing::trace!(word = %symbol.id, "execute symbol");

    // Declared words shadow built-ins; built-ins shadow number parsing.
    if let Some(quote) = context.dictionary.get(&symbol.id).cloned() {
        return call_quote(rt, context, &quote);
    }
    if let Some(result) = execute_builtin(rt, context, symbol) {
        return result;
    }
    if let Ok(n) = symbol.id.parse::<f64>() {
        context.stack.push(Value::Number(n));
        return true;
    }

    context.raise(
        Error::new(
            ErrorCode::UnknownWord,
            format!("unknown word `{}`", symbol.id),
        )
        .with_position(symbol.position.clone()),
    );
    false
}

fn pop(context: &mut Context, symbol: &Symbol) -> Option<Value> {
    match context.stack.pop() {
        Some(value) => Some(value),
        None => {
            context.raise(
                Error::new(
                    ErrorCode::StackUnderflow,
                    format!("`{}` needs more values on the stack", symbol.id),
                )
                .with_position(symbol.position.clone()),
            );
            None
        }
    }
}

fn pop_number(context: &mut Context, symbol: &Symbol) -> Option<f64> {
    match pop(context, symbol)? {
        Value::Number(n) => Some(n),
        other => {
            context.raise(
                Error::new(
                    ErrorCode::TypeMismatch,
                    format!(
                        "`{}` expected a number, got {}",
                        symbol.id,
                        other.kind()
                    ),
                )
                .with_position(symbol.position.clone()),
            );
            None
        }
    }
}

fn pop_string(context: &mut Context, symbol: &Symbol) -> Option<Rc<str>> {
    match pop(context, symbol)? {
        Value::String(s) => Some(s),
        other => {
            context.raise(
                Error::new(
                    ErrorCode::TypeMismatch,
                    format!(
                        "`{}` expected a string, got {}",
                        symbol.id,
                        other.kind()
                    ),
                )
                .with_position(symbol.position.clone()),
            );
            None
        }
    }
}

fn binary_op(
    context: &mut Context,
    symbol: &Symbol,
    op: impl FnOnce(f64, f64) -> Result<f64, ErrorCode>,
) -> Option<bool> {
    let b = match pop_number(context, symbol) {
        Some(n) => n,
        None => return Some(false),
    };
    let a = match pop_number(context, symbol) {
        Some(n) => n,
        None => return Some(false),
    };
    match op(a, b) {
        Ok(result) => {
            context.stack.push(Value::Number(result));
            Some(true)
        }
        Err(code) => {
            context.raise(
                Error::new(code, format!("`{}` by zero", symbol.id))
                    .with_position(symbol.position.clone()),
            );
            Some(false)
        }
    }
}

fn printable(value: &Value) -> String {
    // `print` shows string contents bare; everything else renders as
    // canonical source.
    match value {
        Value::String(s) => s.to_string(),
        other => other.to_string(),
    }
}

/// Unwrap a pop result inside a built-in, converting a raised error
/// (already on the context) into the built-in's failure return.
macro_rules! try_pop {
    ($e:expr) => {
        match $e {
            Some(value) => value,
            None => return Some(false),
        }
    };
}

/// Run a built-in word. `None` means `symbol` names no built-in.
fn execute_builtin(
    rt: &Rc<Runtime>,
    context: &mut Context,
    symbol: &Symbol,
) -> Option<bool> {
    match symbol.id.as_str() {
        "dup" => {
            let top = try_pop!(pop(context, symbol));
            context.stack.push(top.clone());
            context.stack.push(top);
            Some(true)
        }
        "drop" => Some(pop(context, symbol).is_some()),
        "swap" => {
            let b = try_pop!(pop(context, symbol));
            let a = try_pop!(pop(context, symbol));
            context.stack.push(b);
            context.stack.push(a);
            Some(true)
        }
        "over" => {
            let b = try_pop!(pop(context, symbol));
            let a = try_pop!(pop(context, symbol));
            context.stack.push(a.clone());
            context.stack.push(b);
            context.stack.push(a);
            Some(true)
        }
        "rot" => {
            let c = try_pop!(pop(context, symbol));
            let b = try_pop!(pop(context, symbol));
            let a = try_pop!(pop(context, symbol));
            context.stack.push(b);
            context.stack.push(c);
            context.stack.push(a);
            Some(true)
        }
        "+" => binary_op(context, symbol, |a, b| Ok(a + b)),
        "-" => binary_op(context, symbol, |a, b| Ok(a - b)),
        "*" => binary_op(context, symbol, |a, b| Ok(a * b)),
        "/" => binary_op(context, symbol, |a, b| {
            if b == 0.0 {
                Err(ErrorCode::DivisionByZero)
            } else {
                Ok(a / b)
            }
        }),
        "%" => binary_op(context, symbol, |a, b| {
            if b == 0.0 {
                Err(ErrorCode::DivisionByZero)
            } else {
                Ok(a % b)
            }
        }),
        "call" => {
            let quote = try_pop!(pop(context, symbol));
            Some(call_quote(rt, context, &quote))
        }
        "len" => {
            let value = try_pop!(pop(context, symbol));
            let len = match &value {
                Value::Array(elements) => elements.len(),
                Value::Quote(children) => children.len(),
                Value::Object(properties) => properties.len(),
                Value::String(s) => s.chars().count(),
                other => {
                    context.raise(
                        Error::new(
                            ErrorCode::TypeMismatch,
                            format!("`len` cannot measure {}", other.kind()),
                        )
                        .with_position(symbol.position.clone()),
                    );
                    return Some(false);
                }
            };
            context.stack.push(Value::Number(len as f64));
            Some(true)
        }
        "print" => {
            let value = try_pop!(pop(context, symbol));
            print!("{}", printable(&value));
            Some(true)
        }
        "println" => {
            let value = try_pop!(pop(context, symbol));
            println!("{}", printable(&value));
            Some(true)
        }
        "args" => {
            let arguments: Vec<Value> = rt
                .arguments
                .iter()
                .map(|a| Value::String(Rc::from(a.as_str())))
                .collect();
            context.stack.push(Value::Array(Rc::new(arguments)));
            Some(true)
        }
        "import" => {
            let path = try_pop!(pop_string(context, symbol));
            match modules::import(rt, context, &path) {
                Some(object) => {
                    context.stack.push(object);
                    Some(true)
                }
                None => {
                    if context.error.is_none() {
                        context.raise(
                            Error::new(
                                ErrorCode::ImportFailure,
                                format!("no such module `{path}`"),
                            )
                            .with_position(symbol.position.clone()),
                        );
                    }
                    Some(false)
                }
            }
        }
        _ => None,
    }
}

//! # VM
//!
//! The runtime half of the system: loads a bytecode image into runtime
//! values, executes them with a small concatenative interpreter, and
//! drives many lightweight routines with a cooperative round-robin
//! scheduler. Imported modules are materialized on demand into
//! dictionary objects and memoized.
pub mod interpreter;
pub mod materialize;
pub mod modules;
pub mod scheduler;
pub mod value;

use core::fmt;
use std::cell::RefCell;
use std::rc::Rc;

use bytecode::SourcePos;
use indexmap::IndexMap;

use crate::modules::Modules;
use crate::value::Value;

/// Machine-readable execution error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    UnknownWord,
    StackUnderflow,
    TypeMismatch,
    DivisionByZero,
    ImportFailure,
    ImportCycle,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UnknownWord => "unknown_word",
            Self::StackUnderflow => "stack_underflow",
            Self::TypeMismatch => "type_mismatch",
            Self::DivisionByZero => "division_by_zero",
            Self::ImportFailure => "import_failure",
            Self::ImportCycle => "import_cycle",
        })
    }
}

/// An execution error carried by a [`Context`]: code, message, and the
/// source position when one is known.
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub position: Option<SourcePos>,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            position: None,
        }
    }

    pub fn with_position(mut self, position: SourcePos) -> Self {
        self.position = Some(position);
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.code, self.message)
    }
}

impl std::error::Error for Error {}

/// Interpreter state belonging to one routine, or to a transient module
/// materialization.
#[derive(Default)]
pub struct Context {
    pub stack: Vec<Value>,
    /// Declared words, in declaration order: id → quote.
    pub dictionary: IndexMap<String, Value>,
    /// The error raised by the most recent failing execution, until the
    /// scheduler (or an importer) claims it.
    pub error: Option<Error>,
    pub filename: Option<Rc<str>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filename(filename: impl Into<Rc<str>>) -> Self {
        Self {
            filename: Some(filename.into()),
            ..Self::default()
        }
    }

    pub fn raise(&mut self, error: Error) {
        self.error = Some(error);
    }
}

/// The shared interpreter runtime: one per process, consulted by every
/// routine. Holds the program arguments and the module registry/cache.
pub struct Runtime {
    pub arguments: Vec<String>,
    pub(crate) modules: RefCell<Modules>,
}

impl Runtime {
    pub fn new() -> Rc<Self> {
        Self::with_arguments(Vec::new())
    }

    pub fn with_arguments(arguments: Vec<String>) -> Rc<Self> {
        Rc::new(Self {
            arguments,
            modules: RefCell::new(Modules::default()),
        })
    }

    /// Register a decoded module's top-level values under `name`.
    pub fn register_module(&self, name: &str, values: Vec<Value>) {
        self.modules.borrow_mut().register(name, values);
    }

    /// The registered top-level values for `name`, if any. No path
    /// normalization is performed.
    pub fn lookup_module(&self, name: &str) -> Option<Rc<Vec<Value>>> {
        self.modules.borrow().lookup(name)
    }
}

#[cfg(test)]
mod tests {
    //! End-to-end coverage: source text through the compiler, the image
    //! bytes, the loader, and the interpreter.
    use std::io::Cursor;
    use std::rc::Rc;

    use compiler::Unit;

    use crate::materialize::materialize_module;
    use crate::scheduler::Scheduler;
    use crate::value::Value;
    use crate::{interpreter, Context, Runtime};

    fn compile_image(sources: &[(&str, &str)]) -> Vec<u8> {
        let mut unit = Unit::new();
        for (name, source) in sources {
            unit.compile_source(name, source).expect("compile error");
        }
        let mut bytes = Vec::new();
        unit.write(&mut bytes).unwrap();
        bytes
    }

    fn load_values(bytes: &[u8]) -> Vec<Vec<Value>> {
        bytecode::load(&mut Cursor::new(bytes))
            .expect("load error")
            .iter()
            .map(materialize_module)
            .collect()
    }

    fn run_main(rt: &Rc<Runtime>, values: &[Value]) -> Context {
        let mut context = Context::new();
        for value in values {
            if !interpreter::execute(rt, &mut context, value) {
                break;
            }
        }
        context
    }

    #[test]
    fn compiled_image_round_trips_through_the_loader() {
        let source = concat!(
            ": square dup * ;\n",
            "[1, 2] square\n",
            "{ \"k\": \"v\" } \"a string big enough to stay inline\"\n",
        );
        let mut unit = Unit::new();
        unit.compile_source("main.lk", source).unwrap();
        let mut bytes = Vec::new();
        unit.write(&mut bytes).unwrap();

        let loaded = bytecode::load(&mut Cursor::new(&bytes)).unwrap();
        let values = materialize_module(&loaded[0]);

        let compiled: Vec<String> = unit.modules()[0]
            .instructions
            .iter()
            .map(|i| i.resolve(unit.pool()).unwrap().to_string())
            .collect();
        let materialized: Vec<String> =
            values.iter().map(|v| v.to_string()).collect();
        assert_eq!(materialized, compiled);
    }

    #[test]
    fn main_module_executes() {
        let bytes =
            compile_image(&[("main.lk", ": double 2 * ; 21 double")]);
        let modules = load_values(&bytes);
        let rt = Runtime::new();
        let context = run_main(&rt, &modules[0]);
        assert!(context.error.is_none());
        assert_eq!(context.stack, vec![Value::Number(42.0)]);
    }

    #[test]
    fn empty_unit_runs_to_completion() {
        let bytes = compile_image(&[("empty.lk", "")]);
        let modules = load_values(&bytes);
        assert_eq!(modules.len(), 1);
        assert!(modules[0].is_empty());

        let mut scheduler = Scheduler::new(Runtime::new());
        scheduler.spawn(modules[0].clone());
        let mut error = false;
        while !scheduler.is_finished() {
            error |= scheduler.step();
        }
        assert!(!error);
    }

    #[test]
    fn import_between_compiled_modules() {
        let bytes = compile_image(&[
            ("main.lk", "\"util.lk\" import"),
            ("util.lk", ": helper 1 ;"),
        ]);
        let modules = load_values(&bytes);

        let rt = Runtime::new();
        rt.register_module("util.lk", modules[1].clone());

        let context = run_main(&rt, &modules[0]);
        assert!(context.error.is_none());
        match &context.stack[0] {
            Value::Object(properties) => {
                assert!(properties.contains_key("helper"));
            }
            other => panic!("expected module object, got {other:?}"),
        }
    }

    #[test]
    fn scheduler_runs_a_compiled_program() {
        let bytes = compile_image(&[("main.lk", "1 2 + drop")]);
        let modules = load_values(&bytes);

        let mut scheduler = Scheduler::new(Runtime::new());
        scheduler.spawn(modules[0].clone());
        let mut error = false;
        let mut ticks = 0;
        while !scheduler.is_finished() {
            error |= scheduler.step();
            ticks += 1;
            assert!(ticks < 100, "scheduler did not terminate");
        }
        assert!(!error);
    }

    #[test]
    fn loader_error_from_corrupt_image_is_fatal_shaped() {
        let mut bytes = compile_image(&[("main.lk", "1")]);
        bytes[1] = b'x';
        assert!(bytecode::load(&mut Cursor::new(&bytes)).is_err());
    }
}

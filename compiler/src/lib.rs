//! # Compiler
//!
//! The back-end: walks a parsed syntax tree and emits the instruction
//! tree the bytecode image stores, deciding for every string and
//! identifier whether to inline it into the opcode stream or point at
//! the compilation-unit-wide string pool.
//!
//! A [`Unit`] aggregates the shared pool and the compiled modules of one
//! compilation; [`Unit::write`] produces the final image.
use std::fs;
use std::io::{self, Write};

use bytecode::{Instruction, Module, ObjectKey, StringPool};
use parser::{Ast, Lexer, ParseError, Parser, Symbol};

/// Strings and identifiers longer than this many code points are
/// inlined into the opcode stream; shorter ones are interned. Pool
/// entries cost one `u32` per use plus one copy in the pool, so short,
/// reused tokens win by interning while long, rare ones would only
/// bloat the pool.
const LONG_LITERAL_LENGTH: usize = 25;

fn is_long(s: &str) -> bool {
    s.chars().count() > LONG_LITERAL_LENGTH
}

/// Line and column are source metadata only; clamp instead of failing
/// on absurdly long files.
fn clamp(n: u32) -> u16 {
    n.min(u16::MAX as u32) as u16
}

/// Compile a sequence of syntax tree nodes into instructions, interning
/// into `pool` as needed. The emitted order is the source order.
pub fn compile(nodes: &[Ast], pool: &mut StringPool) -> Vec<Instruction> {
    nodes.iter().map(|node| compile_node(node, pool)).collect()
}

fn compile_node(node: &Ast, pool: &mut StringPool) -> Instruction {
    match node {
        Ast::Array(elements) => {
            Instruction::PushArray(compile(elements, pool))
        }
        Ast::Quote(children) => {
            Instruction::PushQuote(compile(children, pool))
        }
        Ast::Object(properties) => Instruction::PushObject(
            properties
                .iter()
                .map(|(key, value)| {
                    let key = if is_long(key) {
                        ObjectKey::Inline(key.clone())
                    } else {
                        ObjectKey::Pooled(pool.add(key))
                    };
                    (key, compile_node(value, pool))
                })
                .collect(),
        ),
        Ast::Str(value) => {
            if is_long(value) {
                Instruction::PushString(value.clone())
            } else {
                Instruction::PushStringConst(pool.add(value))
            }
        }
        Ast::Symbol(symbol) => compile_symbol(symbol, pool),
        Ast::Word { symbol, quote } => Instruction::DeclareWord {
            symbol: Box::new(compile_symbol(symbol, pool)),
            quote: Box::new(Instruction::PushQuote(compile(quote, pool))),
        },
    }
}

/// The interning choice applies to the identifier; the position's file
/// name is always interned. The identifier is interned before the file
/// name so pool order matches emission order.
fn compile_symbol(symbol: &Symbol, pool: &mut StringPool) -> Instruction {
    let line = clamp(symbol.position.line);
    let column = clamp(symbol.position.column);
    if is_long(&symbol.id) {
        Instruction::PushSymbol {
            id: symbol.id.clone(),
            file_idx: pool.add(&symbol.position.file),
            line,
            column,
        }
    } else {
        Instruction::PushSymbolConst {
            id_idx: pool.add(&symbol.id),
            file_idx: pool.add(&symbol.position.file),
            line,
            column,
        }
    }
}

#[derive(Debug)]
pub enum CompileError {
    /// The source file could not be read or decoded.
    Io { path: String, error: io::Error },
    /// The parser rejected the source.
    Parse(ParseError),
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, error } => write!(
                f,
                "unable to open file `{path}` for reading: {error}"
            ),
            Self::Parse(error) => write!(f, "{error}"),
        }
    }
}

impl std::error::Error for CompileError {}

/// One compilation: a shared string pool plus the modules compiled into
/// it, in order. The first module added is the main module.
#[derive(Default)]
pub struct Unit {
    pool: StringPool,
    modules: Vec<Module>,
}

impl Unit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pool(&self) -> &StringPool {
        &self.pool
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    /// Compile `source` as a module named `name` and append it. The
    /// module name is interned before the body is walked.
    pub fn compile_source(
        &mut self,
        name: &str,
        source: &str,
    ) -> Result<(), CompileError> {
        let _span =
            tracing::span!(tracing::Level::DEBUG, "compile", module = name)
                .entered();

        let nodes = Parser::new(Lexer::new(name, source))
            .collect::<Result<Vec<_>, _>>()
            .map_err(CompileError::Parse)?;

        let name_idx = self.pool.add(name);
        let instructions = compile(&nodes, &mut self.pool);
        tracing::debug!(
            instructions = instructions.len(),
            pool = self.pool.len(),
            "module compiled"
        );
        self.modules.push(Module {
            name_idx,
            instructions,
        });
        Ok(())
    }

    /// Read, parse, and compile one source file; the module is named by
    /// the path.
    pub fn compile_file(&mut self, path: &str) -> Result<(), CompileError> {
        let source = fs::read_to_string(path).map_err(|error| {
            CompileError::Io {
                path: path.to_owned(),
                error,
            }
        })?;
        self.compile_source(path, &source)
    }

    /// Write the complete image: header, pool, module table.
    pub fn write(&self, w: &mut dyn Write) -> io::Result<()> {
        bytecode::write(w, &self.pool, &self.modules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytecode::{LoadedModule, Op, Term};
    use std::io::Cursor;

    fn compile_one(source: &str) -> (StringPool, Vec<Instruction>) {
        let mut unit = Unit::new();
        unit.compile_source("test.lk", source).expect("compile error");
        let module = unit.modules()[0].clone();
        (unit.pool.clone(), module.instructions)
    }

    fn compile_and_load(source: &str) -> Vec<LoadedModule> {
        let mut unit = Unit::new();
        unit.compile_source("test.lk", source).expect("compile error");
        let mut bytes = Vec::new();
        unit.write(&mut bytes).unwrap();
        bytecode::load(&mut Cursor::new(&bytes)).expect("load error")
    }

    #[test]
    fn empty_source_yields_empty_module() {
        let mut unit = Unit::new();
        unit.compile_source("empty.lk", "").unwrap();
        assert_eq!(unit.pool().len(), 1);
        assert_eq!(unit.pool().get(0), Some("empty.lk"));
        assert_eq!(unit.modules().len(), 1);
        assert!(unit.modules()[0].instructions.is_empty());

        let mut bytes = Vec::new();
        unit.write(&mut bytes).unwrap();
        let loaded = bytecode::load(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded[0].terms.is_empty());
    }

    #[test]
    fn module_name_is_pool_entry_zero() {
        let (pool, instructions) = compile_one(r#""hi""#);
        assert_eq!(pool.get(0), Some("test.lk"));
        assert_eq!(pool.get(1), Some("hi"));
        assert_eq!(pool.len(), 2);
        assert_eq!(instructions, vec![Instruction::PushStringConst(1)]);
    }

    #[test]
    fn short_string_image_bytes() {
        let mut unit = Unit::new();
        unit.compile_source("test.lk", r#""hi""#).unwrap();
        let mut bytes = Vec::new();
        unit.write(&mut bytes).unwrap();

        // The instruction stream is the tail of the image:
        // push_string_const, pool index 1.
        assert_eq!(
            &bytes[bytes.len() - 5..],
            &[Op::PushStringConst as u8, 0x01, 0x00, 0x00, 0x00]
        );
        // And the module header before it: name_idx 0, instr_count 1.
        let header = &bytes[bytes.len() - 13..bytes.len() - 5];
        assert_eq!(header, &[0, 0, 0, 0, 1, 0, 0, 0]);
    }

    #[test]
    fn string_threshold_boundary() {
        let short = "a".repeat(25);
        let long = "a".repeat(26);

        let (pool, instructions) =
            compile_one(&format!("\"{short}\" \"{long}\""));
        assert_eq!(
            instructions[0],
            Instruction::PushStringConst(pool.len() as u32 - 1)
        );
        assert_eq!(instructions[1], Instruction::PushString(long.clone()));
        // Only the module name and the short literal were pooled.
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn threshold_counts_code_points_not_bytes() {
        // 25 two-byte code points: 50 bytes, still interned.
        let short = "ä".repeat(25);
        let (_, instructions) = compile_one(&format!("\"{short}\""));
        assert!(matches!(
            instructions[0],
            Instruction::PushStringConst(_)
        ));
    }

    #[test]
    fn symbol_interning() {
        let (pool, instructions) = compile_one("dup");
        assert_eq!(
            instructions[0],
            Instruction::PushSymbolConst {
                id_idx: 1,
                file_idx: 0,
                line: 1,
                column: 1,
            }
        );
        assert_eq!(pool.get(1), Some("dup"));
    }

    #[test]
    fn long_symbol_is_inlined_but_file_is_pooled() {
        let id = "a-word-name-longer-than-the-threshold";
        let (pool, instructions) = compile_one(id);
        match &instructions[0] {
            Instruction::PushSymbol { id: emitted, file_idx, .. } => {
                assert_eq!(emitted, id);
                assert_eq!(pool.get(*file_idx), Some("test.lk"));
            }
            other => panic!("expected inline symbol, got {other:?}"),
        }
        // The long identifier itself must not be pooled.
        assert!(pool.iter().all(|s| s != id));
    }

    #[test]
    fn symbol_positions_are_recorded() {
        let (_, instructions) = compile_one("\n  dup");
        match instructions[0] {
            Instruction::PushSymbolConst { line, column, .. } => {
                assert_eq!((line, column), (2, 3));
            }
            ref other => panic!("expected pooled symbol, got {other:?}"),
        }
    }

    #[test]
    fn word_declaration_shape() {
        let (pool, instructions) = compile_one(": double 2 * ;");
        match &instructions[0] {
            Instruction::DeclareWord { symbol, quote } => {
                match symbol.as_ref() {
                    Instruction::PushSymbolConst { id_idx, .. } => {
                        assert_eq!(pool.get(*id_idx), Some("double"));
                    }
                    other => panic!("expected pooled symbol, got {other:?}"),
                }
                match quote.as_ref() {
                    Instruction::PushQuote(children) => {
                        assert_eq!(children.len(), 2);
                    }
                    other => panic!("expected quote, got {other:?}"),
                }
            }
            other => panic!("expected word declaration, got {other:?}"),
        }
    }

    #[test]
    fn object_keys_follow_the_threshold() {
        let source = r#"{ "a": 1, "averylongkeynameover25chars!!!": 2 }"#;
        let (pool, instructions) = compile_one(source);
        match &instructions[0] {
            Instruction::PushObject(properties) => {
                match &properties[0].0 {
                    ObjectKey::Pooled(index) => {
                        assert_eq!(pool.get(*index), Some("a"));
                    }
                    other => panic!("expected pooled key, got {other:?}"),
                }
                assert_eq!(
                    properties[1].0,
                    ObjectKey::Inline(
                        "averylongkeynameover25chars!!!".into()
                    )
                );
            }
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn emission_order_is_source_order() {
        let loaded = compile_and_load("1 2 + [3] (4)");
        let printed: Vec<String> =
            loaded[0].terms.iter().map(|t| t.to_string()).collect();
        assert_eq!(printed, ["1", "2", "+", "[3]", "(4)"]);
    }

    #[test]
    fn round_trip_reproduces_canonical_source() {
        let source = concat!(
            ": square dup * ;\n",
            "[1, 2, 3] square\n",
            "{ \"name\": \"lanka\", \"tags\": [\"stack\" \"forth\"] }\n",
            "\"a string that is too long to intern\" println\n",
        );
        let mut unit = Unit::new();
        unit.compile_source("roundtrip.lk", source).unwrap();

        let mut bytes = Vec::new();
        unit.write(&mut bytes).unwrap();
        let loaded = bytecode::load(&mut Cursor::new(&bytes)).unwrap();

        let compiled: Vec<Term> = unit.modules()[0]
            .instructions
            .iter()
            .map(|i| i.resolve(unit.pool()).unwrap())
            .collect();
        assert_eq!(loaded[0].terms, compiled);
        assert_eq!(
            loaded[0]
                .terms
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(" "),
            concat!(
                ": square dup * ; ",
                "[1, 2, 3] square ",
                "{\"name\": \"lanka\", \"tags\": [\"stack\", \"forth\"]} ",
                "\"a string that is too long to intern\" println",
            )
        );
    }

    #[test]
    fn parse_errors_are_reported_with_position() {
        let mut unit = Unit::new();
        let err = unit.compile_source("bad.lk", "( unterminated").unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("bad.lk:"), "got: {message}");
    }

    #[test]
    fn shared_pool_across_modules() {
        let mut unit = Unit::new();
        unit.compile_source("a.lk", "shared-word").unwrap();
        unit.compile_source("b.lk", "shared-word").unwrap();
        // "shared-word" appears once in the pool even though both
        // modules reference it.
        assert_eq!(
            unit.pool().iter().filter(|s| *s == "shared-word").count(),
            1
        );
        assert_eq!(unit.modules().len(), 2);
    }
}

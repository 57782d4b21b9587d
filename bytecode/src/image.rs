//! The bytecode image container: header, string pool, module table.
//!
//! ```text
//! magic   'R' 'j' 'L'
//! version patch, minor, major        // note the order
//! pool    u32 count, count × string
//! modules u32 count, count × { u32 name_idx, u32 instr_count, instrs }
//! ```
//!
//! An image whose major version byte exceeds [`VERSION_MAJOR`] is
//! rejected; equal or older images are accepted.
use std::io::{self, Read, Write};

use crate::instruction::Instruction;
use crate::io::{read_string, read_u16, read_u32, read_u8, write_u32};
use crate::op::Op;
use crate::pool::StringPool;
use crate::term::{SourcePos, SymbolTerm, Term};

pub const MAGIC: [u8; 3] = *b"RjL";

pub const VERSION_MAJOR: u8 = 0;
pub const VERSION_MINOR: u8 = 1;
pub const VERSION_PATCH: u8 = 0;

/// A compiled module: its name (as a pool index) and its top-level
/// instruction sequence. Emission order is execution order.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub name_idx: u32,
    pub instructions: Vec<Instruction>,
}

/// A module reconstructed from an image, with every pool reference
/// resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedModule {
    pub name: String,
    pub terms: Vec<Term>,
}

/// Everything that can go wrong while loading an image.
#[derive(Debug)]
pub enum LoadError {
    /// The first three bytes are not `RjL`.
    BadMagic,
    /// The image's major version is newer than this implementation.
    IncompatibleVersion { major: u8 },
    /// The stream ended before a complete value could be read.
    Truncated,
    /// A string-pool index with no corresponding entry.
    BadPoolRef { index: u32 },
    /// A byte in opcode position that is not an opcode.
    BadOpcode { byte: u8 },
    /// An object key that is not `push_string`/`push_string_const`.
    BadObjectKey { byte: u8 },
    /// A `declare_word` whose symbol or quote part is the wrong shape.
    MalformedDeclaration,
    /// Any other I/O failure (including invalid UTF-8 in a string).
    Io(io::Error),
}

impl From<io::Error> for LoadError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            LoadError::Truncated
        } else {
            LoadError::Io(err)
        }
    }
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadMagic => write!(f, "magic number mismatch"),
            Self::IncompatibleVersion { major } => write!(
                f,
                "incompatible image version (major {major}, supported up to {VERSION_MAJOR})"
            ),
            Self::Truncated => write!(f, "unexpected end of image"),
            Self::BadPoolRef { index } => {
                write!(f, "string pool index {index} out of range")
            }
            Self::BadOpcode { byte } => {
                write!(f, "unknown opcode 0x{byte:02x}")
            }
            Self::BadObjectKey { byte } => {
                write!(f, "invalid object key opcode 0x{byte:02x}")
            }
            Self::MalformedDeclaration => {
                write!(f, "malformed word declaration")
            }
            Self::Io(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for LoadError {}

/// Write a complete image: header, pool, module table.
///
/// The pool must already contain every index the modules reference,
/// which holds by construction when both came out of the same
/// compilation unit.
pub fn write(
    w: &mut dyn Write,
    pool: &StringPool,
    modules: &[Module],
) -> io::Result<()> {
    w.write_all(&MAGIC)?;
    w.write_all(&[VERSION_PATCH, VERSION_MINOR, VERSION_MAJOR])?;
    pool.serialize(w)?;
    write_u32(w, modules.len() as u32)?;
    let mut body = Vec::new();
    for module in modules {
        body.clear();
        for instruction in &module.instructions {
            instruction.encode(&mut body);
        }
        write_u32(w, module.name_idx)?;
        write_u32(w, module.instructions.len() as u32)?;
        w.write_all(&body)?;
    }
    Ok(())
}

/// Load a complete image, resolving pool references as instructions are
/// decoded.
pub fn load(r: &mut dyn Read) -> Result<Vec<LoadedModule>, LoadError> {
    let mut magic = [0u8; 3];
    r.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(LoadError::BadMagic);
    }

    let mut version = [0u8; 3];
    r.read_exact(&mut version)?;
    if version[2] > VERSION_MAJOR {
        return Err(LoadError::IncompatibleVersion { major: version[2] });
    }

    let pool = StringPool::deserialize(r)?;

    let module_count = read_u32(r)?;
    let mut modules = Vec::with_capacity(module_count as usize);
    for _ in 0..module_count {
        let name_idx = read_u32(r)?;
        let name = resolve(&pool, name_idx)?.to_owned();
        let instr_count = read_u32(r)?;
        let mut terms = Vec::with_capacity(instr_count as usize);
        for _ in 0..instr_count {
            terms.push(decode_term(r, &pool)?);
        }
        modules.push(LoadedModule { name, terms });
    }

    Ok(modules)
}

fn resolve(pool: &StringPool, index: u32) -> Result<&str, LoadError> {
    pool.get(index).ok_or(LoadError::BadPoolRef { index })
}

fn decode_term(
    r: &mut dyn Read,
    pool: &StringPool,
) -> Result<Term, LoadError> {
    let byte = read_u8(r)?;
    let op = Op::try_from(byte)
        .map_err(|byte| LoadError::BadOpcode { byte })?;

    match op {
        Op::PushArray => Ok(Term::Array(decode_sequence(r, pool)?)),
        Op::PushQuote => Ok(Term::Quote(decode_sequence(r, pool)?)),
        Op::PushObject => {
            let count = read_u32(r)?;
            let mut properties = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let key = match read_u8(r)? {
                    b if b == Op::PushString as u8 => read_string(r)?,
                    b if b == Op::PushStringConst as u8 => {
                        let index = read_u32(r)?;
                        resolve(pool, index)?.to_owned()
                    }
                    byte => return Err(LoadError::BadObjectKey { byte }),
                };
                let value = decode_term(r, pool)?;
                properties.push((key, value));
            }
            Ok(Term::Object(properties))
        }
        Op::PushString => Ok(Term::Str(read_string(r)?)),
        Op::PushStringConst => {
            let index = read_u32(r)?;
            Ok(Term::Str(resolve(pool, index)?.to_owned()))
        }
        Op::PushSymbol => {
            let id = read_string(r)?;
            let position = decode_position(r, pool)?;
            Ok(Term::Symbol(SymbolTerm { id, position }))
        }
        Op::PushSymbolConst => {
            let index = read_u32(r)?;
            let id = resolve(pool, index)?.to_owned();
            let position = decode_position(r, pool)?;
            Ok(Term::Symbol(SymbolTerm { id, position }))
        }
        Op::DeclareWord => {
            let symbol = match read_u8(r)? {
                b if b == Op::PushSymbol as u8 => {
                    let id = read_string(r)?;
                    let position = decode_position(r, pool)?;
                    SymbolTerm { id, position }
                }
                b if b == Op::PushSymbolConst as u8 => {
                    let index = read_u32(r)?;
                    let id = resolve(pool, index)?.to_owned();
                    let position = decode_position(r, pool)?;
                    SymbolTerm { id, position }
                }
                _ => return Err(LoadError::MalformedDeclaration),
            };
            if read_u8(r)? != Op::PushQuote as u8 {
                return Err(LoadError::MalformedDeclaration);
            }
            let quote = decode_sequence(r, pool)?;
            Ok(Term::Word { symbol, quote })
        }
    }
}

fn decode_sequence(
    r: &mut dyn Read,
    pool: &StringPool,
) -> Result<Vec<Term>, LoadError> {
    let count = read_u32(r)?;
    let mut terms = Vec::with_capacity(count as usize);
    for _ in 0..count {
        terms.push(decode_term(r, pool)?);
    }
    Ok(terms)
}

fn decode_position(
    r: &mut dyn Read,
    pool: &StringPool,
) -> Result<SourcePos, LoadError> {
    let file_idx = read_u32(r)?;
    let file = resolve(pool, file_idx)?.to_owned();
    let line = read_u16(r)?;
    let column = read_u16(r)?;
    Ok(SourcePos { file, line, column })
}

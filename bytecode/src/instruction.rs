use crate::op::Op;
use crate::pool::StringPool;
use crate::term::{SourcePos, SymbolTerm, Term};

/// An object key as emitted by the compiler: either inlined into the
/// stream or a reference into the string pool. Keys are written bare:
/// just the `PushString`/`PushStringConst` byte sequence, no wrapper.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKey {
    Inline(String),
    Pooled(u32),
}

/// A compile-side instruction node.
///
/// The compiler back-end produces a tree of these; [`encode`] flattens
/// the tree into the opcode stream described by [`Op`]. String-pool
/// indices are resolved at walk time, so encoding is pure byte emission.
///
/// [`encode`]: Instruction::encode
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    PushArray(Vec<Instruction>),
    PushQuote(Vec<Instruction>),
    PushObject(Vec<(ObjectKey, Instruction)>),
    PushString(String),
    PushStringConst(u32),
    PushSymbol {
        id: String,
        file_idx: u32,
        line: u16,
        column: u16,
    },
    PushSymbolConst {
        id_idx: u32,
        file_idx: u32,
        line: u16,
        column: u16,
    },
    /// `symbol` must be a `PushSymbol`/`PushSymbolConst` and `quote` a
    /// `PushQuote`; the decoder rejects anything else.
    DeclareWord {
        symbol: Box<Instruction>,
        quote: Box<Instruction>,
    },
}

fn emit_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn emit_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn emit_string(out: &mut Vec<u8>, s: &str) {
    emit_u32(out, s.len() as u32);
    out.extend_from_slice(s.as_bytes());
}

impl Instruction {
    /// Append this instruction's byte encoding to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Self::PushArray(elements) => {
                out.push(Op::PushArray as u8);
                emit_u32(out, elements.len() as u32);
                for element in elements {
                    element.encode(out);
                }
            }
            Self::PushQuote(children) => {
                out.push(Op::PushQuote as u8);
                emit_u32(out, children.len() as u32);
                for child in children {
                    child.encode(out);
                }
            }
            Self::PushObject(properties) => {
                out.push(Op::PushObject as u8);
                emit_u32(out, properties.len() as u32);
                for (key, value) in properties {
                    match key {
                        ObjectKey::Inline(text) => {
                            out.push(Op::PushString as u8);
                            emit_string(out, text);
                        }
                        ObjectKey::Pooled(index) => {
                            out.push(Op::PushStringConst as u8);
                            emit_u32(out, *index);
                        }
                    }
                    value.encode(out);
                }
            }
            Self::PushString(text) => {
                out.push(Op::PushString as u8);
                emit_string(out, text);
            }
            Self::PushStringConst(index) => {
                out.push(Op::PushStringConst as u8);
                emit_u32(out, *index);
            }
            Self::PushSymbol {
                id,
                file_idx,
                line,
                column,
            } => {
                out.push(Op::PushSymbol as u8);
                emit_string(out, id);
                emit_u32(out, *file_idx);
                emit_u16(out, *line);
                emit_u16(out, *column);
            }
            Self::PushSymbolConst {
                id_idx,
                file_idx,
                line,
                column,
            } => {
                out.push(Op::PushSymbolConst as u8);
                emit_u32(out, *id_idx);
                emit_u32(out, *file_idx);
                emit_u16(out, *line);
                emit_u16(out, *column);
            }
            Self::DeclareWord { symbol, quote } => {
                out.push(Op::DeclareWord as u8);
                symbol.encode(out);
                quote.encode(out);
            }
        }
    }

    /// Resolve pool references, producing the decoded [`Term`] form.
    ///
    /// Returns `None` when a pool index is out of range or a
    /// `DeclareWord` holds the wrong node kinds, conditions the
    /// compiler never produces but a hand-built tree might.
    pub fn resolve(&self, pool: &StringPool) -> Option<Term> {
        match self {
            Self::PushArray(elements) => {
                let elements = elements
                    .iter()
                    .map(|e| e.resolve(pool))
                    .collect::<Option<Vec<_>>>()?;
                Some(Term::Array(elements))
            }
            Self::PushQuote(children) => {
                let children = children
                    .iter()
                    .map(|c| c.resolve(pool))
                    .collect::<Option<Vec<_>>>()?;
                Some(Term::Quote(children))
            }
            Self::PushObject(properties) => {
                let properties = properties
                    .iter()
                    .map(|(key, value)| {
                        let key = match key {
                            ObjectKey::Inline(text) => text.clone(),
                            ObjectKey::Pooled(index) => {
                                pool.get(*index)?.to_owned()
                            }
                        };
                        Some((key, value.resolve(pool)?))
                    })
                    .collect::<Option<Vec<_>>>()?;
                Some(Term::Object(properties))
            }
            Self::PushString(text) => Some(Term::Str(text.clone())),
            Self::PushStringConst(index) => {
                Some(Term::Str(pool.get(*index)?.to_owned()))
            }
            Self::PushSymbol {
                id,
                file_idx,
                line,
                column,
            } => Some(Term::Symbol(SymbolTerm {
                id: id.clone(),
                position: SourcePos {
                    file: pool.get(*file_idx)?.to_owned(),
                    line: *line,
                    column: *column,
                },
            })),
            Self::PushSymbolConst {
                id_idx,
                file_idx,
                line,
                column,
            } => Some(Term::Symbol(SymbolTerm {
                id: pool.get(*id_idx)?.to_owned(),
                position: SourcePos {
                    file: pool.get(*file_idx)?.to_owned(),
                    line: *line,
                    column: *column,
                },
            })),
            Self::DeclareWord { symbol, quote } => {
                let symbol = match symbol.resolve(pool)? {
                    Term::Symbol(symbol) => symbol,
                    _ => return None,
                };
                let quote = match quote.resolve(pool)? {
                    Term::Quote(children) => children,
                    _ => return None,
                };
                Some(Term::Word { symbol, quote })
            }
        }
    }
}

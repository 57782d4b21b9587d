//! # Bytecode
//!
//! The wire format shared by the compiler and the runtime: little-endian
//! byte codecs, the interning string pool, the eight opcodes, the
//! compile-side instruction tree with its encoder, and the image
//! container writer/loader.
//!
//! Both sides must agree on this format bit-for-bit; everything in this
//! crate is the single source of truth for it.
mod image;
mod instruction;
pub mod io;
mod op;
mod pool;
mod term;

pub use image::{
    load, write, LoadError, LoadedModule, Module, MAGIC, VERSION_MAJOR,
    VERSION_MINOR, VERSION_PATCH,
};
pub use instruction::{Instruction, ObjectKey};
pub use op::Op;
pub use pool::StringPool;
pub use term::{write_escaped, SourcePos, SymbolTerm, Term};

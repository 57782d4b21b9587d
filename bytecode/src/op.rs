/// Bytecode opcodes.
///
/// The numeric values are part of the wire format shared with every
/// previously produced image; they must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Op {
    /// `u32 N`, then N instructions. Produces an array value.
    PushArray = 1,

    /// `u32 N`, then N instructions. Produces a compiled quote.
    PushQuote = 2,

    /// `u32 N`, then N × (key, value). The key is a bare
    /// [`PushString`](Op::PushString) or
    /// [`PushStringConst`](Op::PushStringConst) byte sequence; the value
    /// is any instruction.
    PushObject = 3,

    /// A length-prefixed UTF-8 string, inlined into the stream.
    PushString = 4,

    /// `u32 idx`: a string fetched from the image's string pool.
    PushStringConst = 5,

    /// Inlined symbol: string id, then `u32 file_idx`, `u16 line`,
    /// `u16 column`. The file name is always pooled.
    PushSymbol = 6,

    /// Pooled symbol: `u32 id_idx`, then the same position payload as
    /// [`PushSymbol`](Op::PushSymbol).
    PushSymbolConst = 7,

    /// A symbol instruction followed by a quote instruction; binds the
    /// symbol to the quote in the executing dictionary.
    DeclareWord = 8,
}

impl TryFrom<u8> for Op {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        Ok(match byte {
            1 => Op::PushArray,
            2 => Op::PushQuote,
            3 => Op::PushObject,
            4 => Op::PushString,
            5 => Op::PushStringConst,
            6 => Op::PushSymbol,
            7 => Op::PushSymbolConst,
            8 => Op::DeclareWord,
            _ => return Err(byte),
        })
    }
}

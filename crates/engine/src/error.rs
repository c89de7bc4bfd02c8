use thiserror::Error;

/// Everything that can go wrong while turning a chunk blob (or a block string) into queryable
/// data. Any of these aborts construction of the value being decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("bits per entry must be in 1..=32, got {0}")]
    BitsPerEntry(u8),

    #[error("invalid bit array word count: got {actual} but expected {expected}")]
    WordCount { expected: usize, actual: usize },

    #[error("index {index} out of bounds for bit array of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("empty {0} palette")]
    EmptyPalette(&'static str),

    #[error("palette index {index} out of range for {kind} palette of size {size}")]
    PaletteIndex {
        kind: &'static str,
        index: u64,
        size: usize,
    },

    #[error("malformed chunk NBT: {0}")]
    Nbt(#[from] fastnbt::error::Error),

    #[error("failed to inflate chunk blob: {0}")]
    Decompress(#[from] std::io::Error),

    #[error("chunk blob contains no chunks")]
    NoChunks,

    #[error("chunk blob holds {actual} chunks but the requested area covers {expected}")]
    ChunkCount { expected: usize, actual: usize },

    #[error("malformed block entity: {0}")]
    BlockEntity(String),

    #[error("missing heightmap {0}")]
    Heightmap(String),

    #[error("malformed block string {input:?}: {reason}")]
    BlockSyntax { input: String, reason: &'static str },
}

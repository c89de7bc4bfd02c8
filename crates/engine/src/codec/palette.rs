//! Palette-compressed containers: a short list of distinct values plus a packed index array.

use crate::codec::bit_array::{BitPackedArray, PackingFormat};
use crate::error::DecodeError;

/// Number of block entries in a chunk section.
pub const SECTION_BLOCKS: usize = 16 * 16 * 16;
/// Number of 4x4x4 biome groups in a chunk section.
pub const SECTION_BIOMES: usize = 4 * 4 * 4;

/// What a container holds. Decides the minimum index width and the logical length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaletteKind {
    Blocks,
    Biomes,
}

impl PaletteKind {
    fn min_bits(self) -> u8 {
        match self {
            PaletteKind::Blocks => 4,
            PaletteKind::Biomes => 1,
        }
    }

    pub fn container_len(self) -> usize {
        match self {
            PaletteKind::Blocks => SECTION_BLOCKS,
            PaletteKind::Biomes => SECTION_BIOMES,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PaletteKind::Blocks => "block",
            PaletteKind::Biomes => "biome",
        }
    }

    /// Index width for a palette of `palette_len` entries: `max(min, ceil(log2(len)))`.
    pub fn bits_per_entry(self, palette_len: usize) -> u8 {
        ceil_log2(palette_len).max(self.min_bits())
    }
}

/// `ceil(log2(n))`, with `ceil_log2(0) == ceil_log2(1) == 0`.
pub fn ceil_log2(n: usize) -> u8 {
    if n <= 1 {
        0
    } else {
        (usize::BITS - (n - 1).leading_zeros()) as u8
    }
}

/// A palette plus the per-entry indices into it.
///
/// A single-entry palette carries no index array; every entry resolves to `palette[0]`.
#[derive(Debug, Clone)]
pub struct PalettedContainer<T> {
    kind: PaletteKind,
    palette: Vec<T>,
    indices: Option<BitPackedArray>,
}

impl<T> PalettedContainer<T> {
    /// Build a container from a decoded palette and the raw `data` long array, if present.
    pub fn decode(
        kind: PaletteKind,
        palette: Vec<T>,
        data: Option<&[i64]>,
        format: PackingFormat,
    ) -> Result<Self, DecodeError> {
        if palette.is_empty() {
            return Err(DecodeError::EmptyPalette(kind.name()));
        }
        let indices = match data {
            // A single-entry palette needs no indices, even if an empty array was written out.
            Some([]) if palette.len() == 1 => None,
            Some(longs) => {
                let bits = kind.bits_per_entry(palette.len());
                Some(BitPackedArray::from_longs(
                    bits,
                    kind.container_len(),
                    longs,
                    format,
                )?)
            }
            None => None,
        };
        Ok(Self {
            kind,
            palette,
            indices,
        })
    }

    /// A container where every entry is `value`.
    pub fn uniform(kind: PaletteKind, value: T) -> Self {
        Self {
            kind,
            palette: vec![value],
            indices: None,
        }
    }

    /// Resolve the entry at linear `index`.
    pub fn get(&self, index: usize) -> Result<&T, DecodeError> {
        let palette_index = match &self.indices {
            Some(indices) => indices.get(index)? as usize,
            None => {
                if index >= self.kind.container_len() {
                    return Err(DecodeError::IndexOutOfBounds {
                        index,
                        len: self.kind.container_len(),
                    });
                }
                0
            }
        };
        self.palette
            .get(palette_index)
            .ok_or(DecodeError::PaletteIndex {
                kind: self.kind.name(),
                index: palette_index as u64,
                size: self.palette.len(),
            })
    }

    pub fn palette(&self) -> &[T] {
        &self.palette
    }

    pub fn kind(&self) -> PaletteKind {
        self.kind
    }

    /// Resolve every entry, failing on the first index that points past the palette.
    pub fn validate(&self) -> Result<(), DecodeError> {
        if let Some(indices) = &self.indices {
            for index in indices.iter() {
                if index as usize >= self.palette.len() {
                    return Err(DecodeError::PaletteIndex {
                        kind: self.kind.name(),
                        index: index as u64,
                        size: self.palette.len(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Linear index of a block within its section: `(y%16)*256 + (z%16)*16 + (x%16)`.
#[inline]
pub const fn block_index(x: i64, y: i64, z: i64) -> usize {
    (y.rem_euclid(16) as usize) << 8 | (z.rem_euclid(16) as usize) << 4 | x.rem_euclid(16) as usize
}

/// Linear index of the 4x4x4 biome group containing a block within its section.
#[inline]
pub const fn biome_index(x: i64, y: i64, z: i64) -> usize {
    let gx = (x.rem_euclid(16) >> 2) as usize;
    let gy = (y.rem_euclid(16) >> 2) as usize;
    let gz = (z.rem_euclid(16) >> 2) as usize;
    (gy << 4) | (gz << 2) | gx
}

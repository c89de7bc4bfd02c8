use std::fmt;
use std::str::FromStr;

use crate::codec::bit_array::{BitPackedArray, PackingFormat};
use crate::codec::palette::ceil_log2;
use crate::error::DecodeError;
use crate::world::position::Rect;

/// Columns per chunk heightmap.
const CHUNK_COLUMNS: usize = 16 * 16;

/// The heightmap criteria the server tracks per chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeightmapKind {
    MotionBlocking,
    MotionBlockingNoLeaves,
    OceanFloor,
    WorldSurface,
}

impl HeightmapKind {
    pub const ALL: [HeightmapKind; 4] = [
        HeightmapKind::MotionBlocking,
        HeightmapKind::MotionBlockingNoLeaves,
        HeightmapKind::OceanFloor,
        HeightmapKind::WorldSurface,
    ];

    /// Key of this heightmap in the chunk's `Heightmaps` compound.
    pub fn nbt_name(self) -> &'static str {
        match self {
            HeightmapKind::MotionBlocking => "MOTION_BLOCKING",
            HeightmapKind::MotionBlockingNoLeaves => "MOTION_BLOCKING_NO_LEAVES",
            HeightmapKind::OceanFloor => "OCEAN_FLOOR",
            HeightmapKind::WorldSurface => "WORLD_SURFACE",
        }
    }
}

impl fmt::Display for HeightmapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.nbt_name())
    }
}

impl FromStr for HeightmapKind {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HeightmapKind::ALL
            .into_iter()
            .find(|kind| kind.nbt_name() == s)
            .ok_or_else(|| DecodeError::Heightmap(s.to_string()))
    }
}

/// Index width of a chunk heightmap for a world `y_size` blocks tall.
pub fn heightmap_bits(y_size: usize) -> u8 {
    ceil_log2(y_size).max(1)
}

/// One heightmap over a block rect, holding absolute y values.
#[derive(Debug, Clone)]
pub struct Heightmap {
    rect: Rect,
    /// x-major: `values[dx * size_z + dz]`.
    values: Vec<i64>,
}

impl Heightmap {
    pub fn new(rect: Rect) -> Self {
        Self {
            rect,
            values: vec![0; rect.area().max(0) as usize],
        }
    }

    /// Copy the columns of one chunk's packed heightmap that fall inside our rect.
    ///
    /// Stored values count up from the bottom of the world, so `y_begin` is added to make them
    /// absolute.
    pub(crate) fn fill_from_chunk(
        &mut self,
        chunk_x: i32,
        chunk_z: i32,
        longs: &[i64],
        y_size: usize,
        y_begin: i64,
    ) -> Result<(), DecodeError> {
        let packed = BitPackedArray::from_longs(
            heightmap_bits(y_size),
            CHUNK_COLUMNS,
            longs,
            PackingFormat::Aligned,
        )?;
        let origin_x = (chunk_x as i64) << 4;
        let origin_z = (chunk_z as i64) << 4;
        for lz in 0..16 {
            for lx in 0..16 {
                let (x, z) = (origin_x + lx, origin_z + lz);
                if let Some(slot) = self.slot(x, z) {
                    let raw = packed.get((lz * 16 + lx) as usize)?;
                    self.values[slot] = raw as i64 + y_begin;
                }
            }
        }
        Ok(())
    }

    fn slot(&self, x: i64, z: i64) -> Option<usize> {
        if !self.rect.contains(x, z) {
            return None;
        }
        Some(((x - self.rect.x) * self.rect.size_z + (z - self.rect.z)) as usize)
    }

    /// Height of the global column `(x, z)`, if it lies inside the rect.
    pub fn get(&self, x: i64, z: i64) -> Option<i64> {
        self.slot(x, z).map(|i| self.values[i])
    }

    /// Height of the column at `(dx, dz)` relative to the rect's offset.
    pub fn get_local(&self, dx: i64, dz: i64) -> Option<i64> {
        self.get(self.rect.x + dx, self.rect.z + dz)
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }
}

pub mod block;
pub mod chunk;
pub mod heightmap;
pub mod position;

use std::collections::HashMap;
use std::time::Instant;

use fastnbt::Value;
use indexmap::IndexMap;

use crate::codec::nbt::{self, ChunkBatchNbt, PaletteEntry};
use crate::error::DecodeError;
use block::Block;
use chunk::{ChunkSection, SECTION_SIZE};
use heightmap::{Heightmap, HeightmapKind};
use position::{BlockBox, BlockPos, Rect, SectionPos};

/// An immutable snapshot of a rectangular region of the world, decoded from one bulk chunk
/// fetch.
///
/// Lookups take global coordinates unless suffixed `_local`; local positions are relative to
/// the rect's xz-offset and keep their absolute y. The snapshot never observes later edits.
#[derive(Debug, Clone)]
pub struct WorldSlice {
    rect: Rect,
    chunk_rect: Rect,
    y_begin: i64,
    y_size: i64,
    sections: HashMap<SectionPos, ChunkSection>,
    heightmaps: HashMap<HeightmapKind, Heightmap>,
    block_entities: HashMap<BlockPos, HashMap<String, Value>>,
}

impl WorldSlice {
    /// Decode a raw (optionally gzipped) chunk blob covering `rect`.
    ///
    /// `heightmaps` selects which heightmaps to read; an empty slice reads all of them.
    pub fn decode(
        rect: Rect,
        bytes: &[u8],
        heightmaps: &[HeightmapKind],
    ) -> Result<Self, DecodeError> {
        let batch = nbt::decode_chunk_batch(bytes)?;
        Self::from_batch(rect, batch, heightmaps)
    }

    /// Build a slice from an already-parsed chunk batch.
    pub fn from_batch(
        rect: Rect,
        batch: ChunkBatchNbt,
        heightmaps: &[HeightmapKind],
    ) -> Result<Self, DecodeError> {
        let started = Instant::now();
        let chunk_rect = rect.chunk_rect();
        let kinds: &[HeightmapKind] = if heightmaps.is_empty() {
            &HeightmapKind::ALL
        } else {
            heightmaps
        };

        // All chunks share the build limits of the first one.
        let first = batch.chunks.first().ok_or(DecodeError::NoChunks)?;
        let expected = chunk_rect.area().max(0) as usize;
        if batch.chunks.len() != expected {
            return Err(DecodeError::ChunkCount {
                expected,
                actual: batch.chunks.len(),
            });
        }
        let y_begin = SECTION_SIZE * first.y_pos as i64;
        let y_size = SECTION_SIZE * first.sections.len() as i64;

        let mut slice = WorldSlice {
            rect,
            chunk_rect,
            y_begin,
            y_size,
            sections: HashMap::new(),
            heightmaps: kinds.iter().map(|&k| (k, Heightmap::new(rect))).collect(),
            block_entities: HashMap::new(),
        };

        for chunk in batch.chunks {
            for kind in kinds {
                let longs = chunk
                    .heightmaps
                    .get(kind.nbt_name())
                    .ok_or_else(|| DecodeError::Heightmap(kind.nbt_name().to_string()))?;
                if let Some(map) = slice.heightmaps.get_mut(kind) {
                    map.fill_from_chunk(chunk.x_pos, chunk.z_pos, longs, y_size as usize, y_begin)?;
                }
            }

            for section in chunk.sections {
                let key = SectionPos::new(chunk.x_pos, section.y as i32, chunk.z_pos);
                if let Some(decoded) = ChunkSection::decode(section)? {
                    slice.sections.insert(key, decoded);
                }
            }

            for entity in chunk.block_entities {
                let (pos, compound) = block_entity_position(entity)?;
                slice.block_entities.insert(pos, compound);
            }
        }

        tracing::debug!(
            chunks = expected,
            sections = slice.sections.len(),
            block_entities = slice.block_entities.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "decoded world slice {:?}",
            rect
        );
        Ok(slice)
    }

    // ── Geometry ────────────────────────────────────────────────

    /// The block rect this slice was requested for.
    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// The chunk-coordinate rect actually fetched.
    pub fn chunk_rect(&self) -> Rect {
        self.chunk_rect
    }

    /// Lowest block y.
    pub fn y_begin(&self) -> i64 {
        self.y_begin
    }

    /// One past the highest block y.
    pub fn y_end(&self) -> i64 {
        self.y_begin + self.y_size
    }

    pub fn y_size(&self) -> i64 {
        self.y_size
    }

    /// The rect extruded over the full build height.
    pub fn block_box(&self) -> BlockBox {
        self.rect.to_box(self.y_begin, self.y_size)
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    fn local_to_global(&self, pos: BlockPos) -> BlockPos {
        pos + BlockPos::new(self.rect.x, 0, self.rect.z)
    }

    fn section(&self, pos: BlockPos) -> Option<&ChunkSection> {
        self.sections.get(&pos.section())
    }

    // ── Blocks ──────────────────────────────────────────────────

    /// Raw palette entry at `pos`, or `None` if no loaded section contains it.
    pub fn block_state_entry(&self, pos: BlockPos) -> Option<&PaletteEntry> {
        self.section(pos)?.block_state(pos).ok()
    }

    /// Block entity compound stored at `pos`.
    pub fn block_entity(&self, pos: BlockPos) -> Option<&HashMap<String, Value>> {
        self.block_entities.get(&pos)
    }

    /// The block at `pos`, with its block entity merged in. Positions outside every loaded
    /// section read as `minecraft:void_air`.
    pub fn block(&self, pos: BlockPos) -> Block {
        match self.block_state_entry(pos) {
            Some(entry) => Block::from_palette_entry(entry, self.block_entity(pos)),
            None => Block::void_air(),
        }
    }

    pub fn block_local(&self, pos: BlockPos) -> Block {
        self.block(self.local_to_global(pos))
    }

    // ── Biomes ──────────────────────────────────────────────────

    /// Biome of the 4x4x4 group containing `pos`, or an empty string if unknown.
    pub fn biome(&self, pos: BlockPos) -> String {
        self.section(pos)
            .and_then(|section| section.biome(pos).ok().flatten())
            .unwrap_or_default()
            .to_string()
    }

    pub fn biome_local(&self, pos: BlockPos) -> String {
        self.biome(self.local_to_global(pos))
    }

    /// How many of the 64 biome groups of the section containing `pos` have each biome, in
    /// first-seen order.
    pub fn biome_counts_in_chunk(&self, pos: BlockPos) -> Option<IndexMap<String, usize>> {
        let section = self.section(pos)?;
        let mut counts = IndexMap::new();
        for biome in section.biome_groups() {
            *counts.entry(biome.to_string()).or_insert(0) += 1;
        }
        Some(counts)
    }

    /// The most common biome around `pos`. Ties go to the biome seen first.
    pub fn primary_biome_in_chunk(&self, pos: BlockPos) -> Option<String> {
        let counts = self.biome_counts_in_chunk(pos)?;
        let mut best: Option<(String, usize)> = None;
        for (biome, count) in counts {
            if best.as_ref().is_none_or(|(_, top)| count > *top) {
                best = Some((biome, count));
            }
        }
        best.map(|(biome, _)| biome)
    }

    // ── Heightmaps ──────────────────────────────────────────────

    pub fn heightmap(&self, kind: HeightmapKind) -> Option<&Heightmap> {
        self.heightmaps.get(&kind)
    }
}

fn block_entity_position(entity: Value) -> Result<(BlockPos, HashMap<String, Value>), DecodeError> {
    let Value::Compound(compound) = entity else {
        return Err(DecodeError::BlockEntity("not a compound".into()));
    };
    let coord = |key: &str| {
        nbt::int_field(&compound, key)
            .ok_or_else(|| DecodeError::BlockEntity(format!("missing integer field {key:?}")))
    };
    let pos = BlockPos::new(coord("x")?, coord("y")?, coord("z")?);
    Ok((pos, compound))
}

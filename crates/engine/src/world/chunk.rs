use crate::codec::bit_array::PackingFormat;
use crate::codec::nbt::{PaletteEntry, SectionNbt};
use crate::codec::palette::{PaletteKind, PalettedContainer, biome_index, block_index};
use crate::error::DecodeError;
use crate::world::position::BlockPos;

/// Side length of a chunk section.
pub const SECTION_SIZE: i64 = 16;

/// A decoded 16x16x16 cube: block states at full resolution, biomes in 4x4x4 groups.
#[derive(Debug, Clone)]
pub struct ChunkSection {
    blocks: PalettedContainer<PaletteEntry>,
    biomes: Option<PalettedContainer<String>>,
}

impl ChunkSection {
    /// Decode one section compound. Sections without block states hold nothing and yield
    /// `None`; anything malformed is an error.
    pub fn decode(section: SectionNbt) -> Result<Option<Self>, DecodeError> {
        let Some(states) = section.block_states else {
            return Ok(None);
        };
        if states.palette.is_empty() && states.data.is_none() {
            return Ok(None);
        }
        let blocks = PalettedContainer::decode(
            PaletteKind::Blocks,
            states.palette,
            states.data.as_deref(),
            PackingFormat::Aligned,
        )?;
        blocks.validate()?;

        let biomes = match section.biomes {
            Some(biomes) => {
                let container = PalettedContainer::decode(
                    PaletteKind::Biomes,
                    biomes.palette,
                    biomes.data.as_deref(),
                    PackingFormat::Aligned,
                )?;
                container.validate()?;
                Some(container)
            }
            None => None,
        };
        Ok(Some(Self { blocks, biomes }))
    }

    /// Palette entry of the block at `pos`; only the in-section part of `pos` is used.
    pub fn block_state(&self, pos: BlockPos) -> Result<&PaletteEntry, DecodeError> {
        self.blocks.get(block_index(pos.x, pos.y, pos.z))
    }

    /// Biome of the group containing `pos`, if this section carries biomes.
    pub fn biome(&self, pos: BlockPos) -> Result<Option<&str>, DecodeError> {
        match &self.biomes {
            Some(biomes) => Ok(Some(
                biomes.get(biome_index(pos.x, pos.y, pos.z))?.as_str(),
            )),
            None => Ok(None),
        }
    }

    /// Every biome group in storage order.
    pub fn biome_groups(&self) -> impl Iterator<Item = &str> + '_ {
        self.biomes.iter().flat_map(|biomes| {
            (0..PaletteKind::Biomes.container_len())
                .filter_map(move |i| biomes.get(i).ok().map(String::as_str))
        })
    }
}

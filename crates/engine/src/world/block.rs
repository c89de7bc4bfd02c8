use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use fastnbt::Value;
use indexmap::IndexMap;
use rand::Rng;

use crate::codec::nbt::PaletteEntry;
use crate::codec::snbt;
use crate::error::DecodeError;
use crate::transform::{Flip, orientation};

/// Block entity keys that describe *where* the entity is rather than what it holds.
const POSITIONAL_ENTITY_KEYS: [&str; 5] = ["x", "y", "z", "id", "keepPacked"];

/// A block as the remote world understands it: a namespaced id, its block states, and optional
/// block entity data in SNBT form.
///
/// An empty `id` means "nothing": placing it is a no-op. This differs from air, which does
/// replace whatever is there.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Block {
    pub id: String,
    pub states: IndexMap<String, String>,
    pub data: Option<String>,
}

impl Block {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            states: IndexMap::new(),
            data: None,
        }
    }

    /// The placeholder returned for positions outside every loaded section.
    pub fn void_air() -> Self {
        Self::new("minecraft:void_air")
    }

    /// The "place nothing" marker.
    pub fn nothing() -> Self {
        Self::default()
    }

    pub fn with_state(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.states.insert(key.into(), value.into());
        self
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn is_nothing(&self) -> bool {
        self.id.is_empty()
    }

    /// Build a block from a section palette entry, merging the block entity stored at the same
    /// position if there is one.
    pub fn from_palette_entry(
        entry: &PaletteEntry,
        block_entity: Option<&HashMap<String, Value>>,
    ) -> Self {
        Self {
            id: entry.name.clone(),
            states: entry.properties.clone().unwrap_or_default(),
            data: block_entity.map(|nbt| snbt::compound_to_snbt(nbt, &POSITIONAL_ENTITY_KEYS)),
        }
    }

    /// Mirror, then rotate, the orientation states in place. Other states are left untouched.
    pub fn transform(&mut self, rotation: u8, flip: Flip) {
        if let Some(axis) = self.states.get_mut("axis") {
            *axis = orientation::transform_axis(axis, rotation).to_string();
        }
        if let Some(facing) = self.states.get_mut("facing") {
            *facing = orientation::transform_facing(facing, rotation, flip).to_string();
        }
        if let Some(value) = self.states.get_mut("rotation") {
            *value = orientation::transform_rotation(value, rotation, flip);
        }
        if let Some(half) = self.states.get_mut("half") {
            *half = orientation::transform_half(half, flip).to_string();
        }
    }

    pub fn transformed(&self, rotation: u8, flip: Flip) -> Self {
        let mut block = self.clone();
        block.transform(rotation, flip);
        block
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.id.is_empty() {
            return Ok(());
        }
        f.write_str(&self.id)?;
        if !self.states.is_empty() {
            f.write_str("[")?;
            for (i, (key, value)) in self.states.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{key}={value}")?;
            }
            f.write_str("]")?;
        }
        if let Some(data) = &self.data {
            f.write_str(data)?;
        }
        Ok(())
    }
}

impl FromStr for Block {
    type Err = DecodeError;

    /// Parse `id[key=value,...]{snbt}`. Both the state list and the data payload are optional.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let syntax = |reason| DecodeError::BlockSyntax {
            input: input.to_string(),
            reason,
        };
        let text = input.trim();
        let id_end = text.find(['[', '{']).unwrap_or(text.len());
        if text[..id_end].contains(char::is_whitespace) {
            return Err(syntax("whitespace in block id"));
        }
        let mut block = Block::new(&text[..id_end]);
        let mut rest = &text[id_end..];

        if let Some(states) = rest.strip_prefix('[') {
            let close = states.find(']').ok_or_else(|| syntax("unclosed state list"))?;
            for pair in states[..close].split(',').filter(|p| !p.trim().is_empty()) {
                let (key, value) = pair
                    .split_once('=')
                    .ok_or_else(|| syntax("state without '='"))?;
                block
                    .states
                    .insert(key.trim().to_string(), value.trim().to_string());
            }
            rest = &states[close + 1..];
        }

        if !rest.is_empty() {
            if !(rest.starts_with('{') && rest.ends_with('}')) {
                return Err(syntax("trailing characters after block id"));
            }
            block.data = Some(rest.to_string());
        }

        if block.id.is_empty() && (!block.states.is_empty() || block.data.is_some()) {
            return Err(syntax("states or data without a block id"));
        }
        Ok(block)
    }
}

/// What to place: one block, or a palette to draw from uniformly at random per placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockSource {
    Single(Block),
    Palette(Vec<Block>),
}

impl BlockSource {
    /// Resolve to one concrete block. An empty palette resolves to nothing.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Block> {
        match self {
            BlockSource::Single(block) => Some(block),
            BlockSource::Palette(blocks) if blocks.is_empty() => None,
            BlockSource::Palette(blocks) => blocks.get(rng.random_range(0..blocks.len())),
        }
    }

    pub fn transformed(&self, rotation: u8, flip: Flip) -> Self {
        match self {
            BlockSource::Single(block) => BlockSource::Single(block.transformed(rotation, flip)),
            BlockSource::Palette(blocks) => BlockSource::Palette(
                blocks.iter().map(|b| b.transformed(rotation, flip)).collect(),
            ),
        }
    }
}

impl From<Block> for BlockSource {
    fn from(block: Block) -> Self {
        BlockSource::Single(block)
    }
}

impl From<Vec<Block>> for BlockSource {
    fn from(blocks: Vec<Block>) -> Self {
        BlockSource::Palette(blocks)
    }
}

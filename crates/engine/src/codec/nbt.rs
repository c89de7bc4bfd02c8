//! Serde mirror of the bulk chunk blob returned by the `/chunks` endpoint.
//!
//! The blob is an unnamed root compound holding a `Chunks` list; each entry follows the
//! vanilla chunk format (https://minecraft.wiki/w/Chunk_format) for the fields we read.

use std::collections::HashMap;
use std::io::Read;

use fastnbt::{LongArray, Value};
use flate2::read::GzDecoder;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct ChunkBatchNbt {
    #[serde(rename = "Chunks")]
    pub chunks: Vec<ChunkNbt>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ChunkNbt {
    #[serde(rename = "xPos")]
    pub x_pos: i32,
    #[serde(rename = "zPos")]
    pub z_pos: i32,
    /// Lowest section index of the chunk.
    #[serde(rename = "yPos")]
    pub y_pos: i32,
    #[serde(default)]
    pub sections: Vec<SectionNbt>,
    #[serde(rename = "Heightmaps", default)]
    pub heightmaps: HashMap<String, LongArray>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub block_entities: Vec<Value>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SectionNbt {
    #[serde(rename = "Y")]
    pub y: i8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_states: Option<BlockStatesNbt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub biomes: Option<BiomesNbt>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct BlockStatesNbt {
    #[serde(default)]
    pub palette: Vec<PaletteEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<LongArray>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct BiomesNbt {
    #[serde(default)]
    pub palette: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<LongArray>,
}

/// A block-state palette entry: namespaced id plus its state properties, in stored order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PaletteEntry {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Properties", default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, String>>,
}

impl PaletteEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: None,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties
            .get_or_insert_with(IndexMap::new)
            .insert(key.into(), value.into());
        self
    }
}

/// Parse a chunk blob, inflating it first if it is gzip-compressed.
pub fn decode_chunk_batch(bytes: &[u8]) -> Result<ChunkBatchNbt, DecodeError> {
    if bytes.starts_with(&GZIP_MAGIC) {
        let mut raw = Vec::with_capacity(bytes.len() * 4);
        GzDecoder::new(bytes).read_to_end(&mut raw)?;
        Ok(fastnbt::from_bytes(&raw)?)
    } else {
        Ok(fastnbt::from_bytes(bytes)?)
    }
}

/// Read an integer coordinate field out of a block entity compound.
pub(crate) fn int_field(compound: &HashMap<String, Value>, key: &str) -> Option<i64> {
    match compound.get(key)? {
        Value::Byte(v) => Some(*v as i64),
        Value::Short(v) => Some(*v as i64),
        Value::Int(v) => Some(*v as i64),
        Value::Long(v) => Some(*v),
        _ => None,
    }
}

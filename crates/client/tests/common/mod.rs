//! An in-memory [`Transport`] that records every request, for driving the editor in tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, ThreadId};

use fastnbt::LongArray;
use gdmc_client::{
    Block, BlockBox, BlockPos, EditorConfig, InterfaceError, ItemStatus, Rect, RequestPolicy,
    Transport, WriteOptions,
};
use gdmc_engine::codec::bit_array::{BitPackedArray, PackingFormat};
use gdmc_engine::codec::nbt::{BiomesNbt, BlockStatesNbt, ChunkBatchNbt, ChunkNbt, PaletteEntry, SectionNbt};
use gdmc_engine::HeightmapKind;
use gdmc_engine::world::heightmap::heightmap_bits;

// ---------------------------------------------------------------------------
// Memory transport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    FetchChunks(Rect),
    ReadBlocks(BlockBox),
    ReadBiomes(BlockBox),
    Write(Vec<(BlockPos, Block)>, WriteOptions),
    Commands(String),
    BuildArea,
    Version,
}

#[derive(Default)]
pub struct MemoryWorld {
    pub blocks: HashMap<BlockPos, Block>,
    pub biomes: HashMap<BlockPos, String>,
    /// Positions whose writes the server refuses.
    pub reject: HashSet<BlockPos>,
    pub chunks: Option<Vec<u8>>,
    pub build_area: Option<BlockBox>,
    /// Answer writes with one status fewer than the blocks sent.
    pub short_statuses: bool,
    pub log: Vec<Request>,
}

#[derive(Default)]
pub struct MemoryTransport {
    world: Mutex<MemoryWorld>,
}

impl MemoryTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn world(&self) -> MutexGuard<'_, MemoryWorld> {
        self.world.lock().unwrap()
    }

    pub fn set_block(&self, pos: BlockPos, block: Block) {
        self.world().blocks.insert(pos, block);
    }

    pub fn block(&self, pos: BlockPos) -> Block {
        self.world()
            .blocks
            .get(&pos)
            .cloned()
            .unwrap_or_else(|| Block::new("minecraft:air"))
    }

    pub fn requests(&self) -> Vec<Request> {
        self.world().log.clone()
    }

    pub fn writes(&self) -> Vec<Vec<(BlockPos, Block)>> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r {
                Request::Write(blocks, _) => Some(blocks),
                _ => None,
            })
            .collect()
    }

    pub fn block_reads(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| matches!(r, Request::ReadBlocks(_)))
            .count()
    }
}

impl Transport for MemoryTransport {
    fn endpoint(&self) -> String {
        "memory".into()
    }

    fn fetch_chunks(
        &self,
        chunks: Rect,
        _dimension: Option<&str>,
        _policy: &RequestPolicy,
    ) -> Result<Vec<u8>, InterfaceError> {
        let mut world = self.world();
        world.log.push(Request::FetchChunks(chunks));
        world.chunks.clone().ok_or(InterfaceError::Status {
            endpoint: "memory/chunks".into(),
            status: 404,
        })
    }

    fn read_blocks(
        &self,
        area: BlockBox,
        _dimension: Option<&str>,
        _policy: &RequestPolicy,
    ) -> Result<Vec<(BlockPos, Block)>, InterfaceError> {
        self.world().log.push(Request::ReadBlocks(area));
        Ok(area.iter().map(|pos| (pos, self.block(pos))).collect())
    }

    fn read_biomes(
        &self,
        area: BlockBox,
        _dimension: Option<&str>,
        _policy: &RequestPolicy,
    ) -> Result<Vec<(BlockPos, String)>, InterfaceError> {
        let mut world = self.world();
        world.log.push(Request::ReadBiomes(area));
        Ok(area
            .iter()
            .map(|pos| {
                let biome = world.biomes.get(&pos).cloned().unwrap_or_default();
                (pos, biome)
            })
            .collect())
    }

    fn write_blocks(
        &self,
        blocks: &[(BlockPos, Block)],
        options: &WriteOptions,
        _policy: &RequestPolicy,
    ) -> Result<Vec<ItemStatus>, InterfaceError> {
        let mut world = self.world();
        world.log.push(Request::Write(blocks.to_vec(), options.clone()));
        let mut statuses = Vec::with_capacity(blocks.len());
        for (pos, block) in blocks {
            if world.reject.contains(pos) {
                statuses.push(ItemStatus::failed("refused"));
            } else {
                world.blocks.insert(*pos, block.clone());
                statuses.push(ItemStatus::ok());
            }
        }
        if world.short_statuses {
            statuses.pop();
        }
        Ok(statuses)
    }

    fn run_commands(
        &self,
        commands: &str,
        _dimension: Option<&str>,
        _policy: &RequestPolicy,
    ) -> Result<Vec<ItemStatus>, InterfaceError> {
        let mut world = self.world();
        world.log.push(Request::Commands(commands.to_string()));
        let mut statuses = Vec::new();
        for line in commands.lines() {
            let mut words = line.split_whitespace();
            if words.next() == Some("setbuildarea") {
                let c: Vec<i64> = words.filter_map(|w| w.parse().ok()).collect();
                if c.len() != 6 {
                    statuses.push(ItemStatus::failed("bad coordinates"));
                    continue;
                }
                world.build_area = Some(BlockBox::between(
                    BlockPos::new(c[0], c[1], c[2]),
                    BlockPos::new(c[3], c[4], c[5]),
                ));
            }
            statuses.push(ItemStatus {
                success: true,
                detail: Some("1".into()),
            });
        }
        Ok(statuses)
    }

    fn build_area(&self, _policy: &RequestPolicy) -> Result<BlockBox, InterfaceError> {
        let mut world = self.world();
        world.log.push(Request::BuildArea);
        world.build_area.ok_or(InterfaceError::BuildAreaNotSet)
    }

    fn version(&self, _policy: &RequestPolicy) -> Result<String, InterfaceError> {
        self.world().log.push(Request::Version);
        Ok("1.20.2".into())
    }
}

// ---------------------------------------------------------------------------
// Gated transport
// ---------------------------------------------------------------------------

/// Wraps a [`MemoryTransport`] and holds every block write until [`GatedTransport::open`].
pub struct GatedTransport {
    pub inner: Arc<MemoryTransport>,
    open: Mutex<bool>,
    opened: Condvar,
    writer_threads: Mutex<Vec<ThreadId>>,
}

impl GatedTransport {
    pub fn closed(inner: Arc<MemoryTransport>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            open: Mutex::new(false),
            opened: Condvar::new(),
            writer_threads: Mutex::new(Vec::new()),
        })
    }

    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.opened.notify_all();
    }

    /// Threads that performed each write, in order.
    pub fn writer_threads(&self) -> Vec<ThreadId> {
        self.writer_threads.lock().unwrap().clone()
    }
}

impl Transport for GatedTransport {
    fn endpoint(&self) -> String {
        self.inner.endpoint()
    }

    fn fetch_chunks(
        &self,
        chunks: Rect,
        dimension: Option<&str>,
        policy: &RequestPolicy,
    ) -> Result<Vec<u8>, InterfaceError> {
        self.inner.fetch_chunks(chunks, dimension, policy)
    }

    fn read_blocks(
        &self,
        area: BlockBox,
        dimension: Option<&str>,
        policy: &RequestPolicy,
    ) -> Result<Vec<(BlockPos, Block)>, InterfaceError> {
        self.inner.read_blocks(area, dimension, policy)
    }

    fn read_biomes(
        &self,
        area: BlockBox,
        dimension: Option<&str>,
        policy: &RequestPolicy,
    ) -> Result<Vec<(BlockPos, String)>, InterfaceError> {
        self.inner.read_biomes(area, dimension, policy)
    }

    fn write_blocks(
        &self,
        blocks: &[(BlockPos, Block)],
        options: &WriteOptions,
        policy: &RequestPolicy,
    ) -> Result<Vec<ItemStatus>, InterfaceError> {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.opened.wait(open).unwrap();
        }
        drop(open);
        self.writer_threads.lock().unwrap().push(thread::current().id());
        self.inner.write_blocks(blocks, options, policy)
    }

    fn run_commands(
        &self,
        commands: &str,
        dimension: Option<&str>,
        policy: &RequestPolicy,
    ) -> Result<Vec<ItemStatus>, InterfaceError> {
        self.inner.run_commands(commands, dimension, policy)
    }

    fn build_area(&self, policy: &RequestPolicy) -> Result<BlockBox, InterfaceError> {
        self.inner.build_area(policy)
    }

    fn version(&self, policy: &RequestPolicy) -> Result<String, InterfaceError> {
        self.inner.version(policy)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Seeded config with no retries or backoff, everything else at defaults.
pub fn config() -> EditorConfig {
    EditorConfig {
        retries: 0,
        backoff_ms: 0,
        seed: Some(7),
        ..EditorConfig::new()
    }
}

pub fn pos(x: i64, y: i64, z: i64) -> BlockPos {
    BlockPos::new(x, y, z)
}

/// Chunk (0, 0), sections 0..8 with section 4 (y 64..80) solid `block`, all heightmaps at 80.
pub fn chunk_blob(block: &str) -> Vec<u8> {
    let bits = heightmap_bits(8 * 16);
    let packed = BitPackedArray::pack(bits, &[80; 256], PackingFormat::Aligned).unwrap();
    let heightmaps = HeightmapKind::ALL
        .iter()
        .map(|k| (k.nbt_name().to_string(), LongArray::new(packed.to_longs())))
        .collect();
    let sections = (0..8)
        .map(|y| SectionNbt {
            y,
            block_states: (y == 4).then(|| BlockStatesNbt {
                palette: vec![PaletteEntry::new(block)],
                data: None,
            }),
            biomes: (y == 4).then(|| BiomesNbt {
                palette: vec!["minecraft:plains".to_string()],
                data: None,
            }),
        })
        .collect();
    let chunk = ChunkNbt {
        x_pos: 0,
        z_pos: 0,
        y_pos: 0,
        sections,
        heightmaps,
        block_entities: Vec::new(),
    };
    fastnbt::to_bytes(&ChunkBatchNbt {
        chunks: vec![chunk],
    })
    .unwrap()
}

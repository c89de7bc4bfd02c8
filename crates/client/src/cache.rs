use std::num::NonZeroUsize;

use gdmc_engine::{Block, BlockPos};
use lru::LruCache;

/// Bounded global-position -> block store.
///
/// Reads and writes both count as use; when full, inserting evicts the entry that was used
/// least recently, not the one inserted first.
pub struct BlockCache {
    entries: LruCache<BlockPos, Block>,
}

fn capacity(limit: usize) -> NonZeroUsize {
    NonZeroUsize::new(limit).unwrap_or(NonZeroUsize::MIN)
}

impl BlockCache {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: LruCache::new(capacity(limit)),
        }
    }

    /// Look up `pos`, marking it most recently used.
    pub fn get(&mut self, pos: BlockPos) -> Option<&Block> {
        self.entries.get(&pos)
    }

    /// Look up without touching recency.
    pub fn peek(&self, pos: BlockPos) -> Option<&Block> {
        self.entries.peek(&pos)
    }

    /// Insert or overwrite, returning the entry evicted to make room, if any.
    pub fn insert(&mut self, pos: BlockPos, block: Block) -> Option<(BlockPos, Block)> {
        self.entries
            .push(pos, block)
            .filter(|(evicted, _)| *evicted != pos)
    }

    pub fn remove(&mut self, pos: BlockPos) -> Option<Block> {
        self.entries.pop(&pos)
    }

    pub fn contains(&self, pos: BlockPos) -> bool {
        self.entries.contains(&pos)
    }

    /// Shrinking drops the least recently used entries.
    pub fn set_limit(&mut self, limit: usize) {
        self.entries.resize(capacity(limit));
    }

    pub fn limit(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

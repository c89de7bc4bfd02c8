use gdmc_engine::{Block, BlockPos};
use indexmap::IndexMap;

/// Writes and commands waiting to be sent in one batch.
///
/// Blocks are keyed by global position. Rewriting a position keeps only the newest block and
/// moves it to the end, so a flush sends entries in last-touch order.
#[derive(Debug, Default)]
pub struct WriteBuffer {
    blocks: IndexMap<BlockPos, Block>,
    /// Commands deferred until after the next block batch.
    commands: Vec<String>,
}

/// The contents of a buffer at the moment it was swapped out for flushing.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PendingBatch {
    pub blocks: Vec<(BlockPos, Block)>,
    pub commands: Vec<String>,
}

impl PendingBatch {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.commands.is_empty()
    }
}

impl WriteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pos: BlockPos, block: Block) {
        self.blocks.shift_remove(&pos);
        self.blocks.insert(pos, block);
    }

    pub fn get(&self, pos: BlockPos) -> Option<&Block> {
        self.blocks.get(&pos)
    }

    pub fn push_command(&mut self, command: String) {
        self.commands.push(command);
    }

    /// Number of pending block writes.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.commands.is_empty()
    }

    /// Swap the contents out for an empty buffer.
    pub fn take(&mut self) -> PendingBatch {
        let taken = std::mem::take(self);
        PendingBatch {
            blocks: taken.blocks.into_iter().collect(),
            commands: taken.commands,
        }
    }
}

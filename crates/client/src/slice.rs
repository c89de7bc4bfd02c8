use gdmc_engine::{BlockPos, HeightmapKind, Rect, WorldSlice};

use crate::config::RequestPolicy;
use crate::error::InterfaceError;
use crate::transport::Transport;

/// Fetch every chunk touching `rect` in one request and decode it into a [`WorldSlice`].
///
/// Decode failures abort the load; no partial slice is returned.
pub fn load_world_slice(
    transport: &dyn Transport,
    rect: Rect,
    dimension: Option<&str>,
    heightmaps: &[HeightmapKind],
    policy: &RequestPolicy,
) -> Result<WorldSlice, InterfaceError> {
    let chunks = rect.chunk_rect();
    tracing::debug!("Fetching {} chunks for world slice {:?}", chunks.area(), rect);
    let bytes = transport.fetch_chunks(chunks, dimension, policy)?;
    Ok(WorldSlice::decode(rect, &bytes, heightmaps)?)
}

/// A world slice plus the cells known to have changed since it was taken.
pub struct DecayingSlice {
    slice: WorldSlice,
    /// The heightmap kinds the slice was loaded with, for reloading.
    heightmaps: Vec<HeightmapKind>,
    /// One flag per voxel of `slice.block_box()`, `true` once we've written there.
    decayed: Vec<bool>,
}

impl DecayingSlice {
    pub fn new(slice: WorldSlice, heightmaps: Vec<HeightmapKind>) -> Self {
        let decayed = vec![false; slice.block_box().volume()];
        Self {
            slice,
            heightmaps,
            decayed,
        }
    }

    pub fn slice(&self) -> &WorldSlice {
        &self.slice
    }

    pub fn heightmaps(&self) -> &[HeightmapKind] {
        &self.heightmaps
    }

    /// Whether the snapshot can still be trusted at `pos`. Positions outside the slice never
    /// can.
    pub fn is_fresh(&self, pos: BlockPos) -> bool {
        self.slice
            .block_box()
            .index_of(pos)
            .is_some_and(|i| !self.decayed[i])
    }

    /// `None` outside the slice.
    pub fn is_decayed(&self, pos: BlockPos) -> Option<bool> {
        self.slice
            .block_box()
            .index_of(pos)
            .map(|i| self.decayed[i])
    }

    /// Mark `pos` stale. Returns whether it was inside the slice.
    pub fn decay(&mut self, pos: BlockPos) -> bool {
        match self.slice.block_box().index_of(pos) {
            Some(i) => {
                self.decayed[i] = true;
                true
            }
            None => false,
        }
    }
}

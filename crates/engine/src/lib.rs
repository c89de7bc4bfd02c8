//! Network-free core of the GDMC client: the chunk codecs, the immutable world snapshot, and
//! the coordinate transform.

pub mod codec;
pub mod error;
pub mod transform;
pub mod world;

pub use error::DecodeError;
pub use transform::{Flip, Transform};
pub use world::WorldSlice;
pub use world::block::{Block, BlockSource};
pub use world::heightmap::{Heightmap, HeightmapKind};
pub use world::position::{BlockBox, BlockPos, ChunkPos, Rect, SectionPos};

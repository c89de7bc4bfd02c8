//! Client for the GDMC HTTP interface: a transform-aware [`Editor`] with a write buffer, a block
//! cache and cached world slices, over a pluggable [`Transport`].

pub mod buffer;
pub mod cache;
pub mod config;
pub mod editor;
pub mod error;
pub mod flush_pool;
pub mod slice;
pub mod transport;

pub use config::{EditorConfig, RequestPolicy};
pub use editor::{Editor, FlushOutcome, TransformGuard};
pub use error::{InterfaceError, Rejection};
pub use flush_pool::{FlushId, FlushReport};
pub use transport::{HttpTransport, ItemStatus, Transport, WriteOptions};

pub use gdmc_engine::{
    Block, BlockBox, BlockPos, BlockSource, DecodeError, Flip, HeightmapKind, Rect, Transform,
    WorldSlice,
};

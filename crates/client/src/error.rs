use gdmc_engine::{BlockPos, DecodeError};
use thiserror::Error;

/// Failures surfaced by the transport or the editor. Per-block rejections inside a batch are not
/// errors; they come back as [`Rejection`]s.
#[derive(Debug, Error)]
pub enum InterfaceError {
    #[error(
        "could not connect to {endpoint} after {attempts} attempt(s): {reason}. \
         Is the world open and the GDMC HTTP interface running?"
    )]
    Connection {
        endpoint: String,
        attempts: u32,
        reason: String,
    },

    #[error("{endpoint} reported an internal server error")]
    RemoteInternal { endpoint: String },

    #[error("{endpoint} answered with HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error(transparent)]
    Validation(#[from] DecodeError),

    #[error("no build area has been set; use /setbuildarea in the world")]
    BuildAreaNotSet,

    #[error("unexpected response from {endpoint}: {reason}")]
    Malformed { endpoint: String, reason: String },

    #[error("no world slice is loaded")]
    NoWorldSlice,

    #[error("failed to start flush workers: {0}")]
    PoolBuild(String),
}

/// The remote refused one item of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// `None` for commands, which have no position.
    pub position: Option<BlockPos>,
    pub message: String,
}

//! The request/response boundary to the remote world.
//!
//! [`Transport`] is what the editor and world slice loader talk to. [`HttpTransport`] speaks the
//! GDMC HTTP interface; tests plug in an in-memory implementation.

pub mod http;

use std::thread;

use gdmc_engine::{Block, BlockBox, BlockPos, Rect};

use crate::config::RequestPolicy;
use crate::error::InterfaceError;

pub use http::HttpTransport;

/// How a batch of block writes should behave on the server.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WriteOptions {
    pub dimension: Option<String>,
    pub do_block_updates: bool,
    pub spawn_drops: bool,
}

/// Outcome of one item in a batched write or command run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemStatus {
    pub success: bool,
    /// The server's message: an error for failures, a return value for successful commands.
    pub detail: Option<String>,
}

impl ItemStatus {
    pub fn ok() -> Self {
        Self {
            success: true,
            detail: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            detail: Some(message.into()),
        }
    }
}

/// Blocking access to the remote world. Every call carries its own retry and timeout budget.
pub trait Transport: Send + Sync {
    /// Human-readable address used in error messages and logs.
    fn endpoint(&self) -> String;

    /// Raw chunk blob for the chunks in `chunks` (chunk coordinates).
    fn fetch_chunks(
        &self,
        chunks: Rect,
        dimension: Option<&str>,
        policy: &RequestPolicy,
    ) -> Result<Vec<u8>, InterfaceError>;

    /// Every block in `area`, with states and block entity data.
    fn read_blocks(
        &self,
        area: BlockBox,
        dimension: Option<&str>,
        policy: &RequestPolicy,
    ) -> Result<Vec<(BlockPos, Block)>, InterfaceError>;

    fn read_biomes(
        &self,
        area: BlockBox,
        dimension: Option<&str>,
        policy: &RequestPolicy,
    ) -> Result<Vec<(BlockPos, String)>, InterfaceError>;

    /// Place `blocks` in one request. The result has one status per input, in order.
    fn write_blocks(
        &self,
        blocks: &[(BlockPos, Block)],
        options: &WriteOptions,
        policy: &RequestPolicy,
    ) -> Result<Vec<ItemStatus>, InterfaceError>;

    /// Run newline-separated commands. The result has one status per command.
    fn run_commands(
        &self,
        commands: &str,
        dimension: Option<&str>,
        policy: &RequestPolicy,
    ) -> Result<Vec<ItemStatus>, InterfaceError>;

    fn build_area(&self, policy: &RequestPolicy) -> Result<BlockBox, InterfaceError>;

    fn version(&self, policy: &RequestPolicy) -> Result<String, InterfaceError>;
}

/// Why a single attempt failed.
#[derive(Debug)]
pub enum AttemptError {
    /// Worth retrying: the server could not be reached.
    Transient(String),
    /// Retrying cannot help.
    Fatal(InterfaceError),
}

impl From<InterfaceError> for AttemptError {
    fn from(err: InterfaceError) -> Self {
        AttemptError::Fatal(err)
    }
}

/// Run `attempt` until it succeeds, fails fatally, or the policy's retry budget is spent.
///
/// Transient failures sleep with exponential backoff between attempts. Running out of retries
/// turns the last transient failure into [`InterfaceError::Connection`].
pub fn with_retries<T>(
    endpoint: &str,
    policy: &RequestPolicy,
    mut attempt: impl FnMut() -> Result<T, AttemptError>,
) -> Result<T, InterfaceError> {
    let mut tries = 0;
    loop {
        tries += 1;
        match attempt() {
            Ok(value) => return Ok(value),
            Err(AttemptError::Fatal(err)) => return Err(err),
            Err(AttemptError::Transient(reason)) => {
                let left = (policy.retries + 1).saturating_sub(tries);
                if left == 0 {
                    return Err(InterfaceError::Connection {
                        endpoint: endpoint.to_string(),
                        attempts: tries,
                        reason,
                    });
                }
                let delay = policy.delay(tries);
                tracing::warn!(
                    "Request to {} failed ({}); retrying in {:?}, {} retries left",
                    endpoint,
                    reason,
                    delay,
                    left
                );
                thread::sleep(delay);
            }
        }
    }
}

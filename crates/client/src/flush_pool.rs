//! Sending buffered writes, on the calling thread or on a pool of flush workers.
//!
//! With one worker, flushes reach the server in submission order. With more, they complete in
//! any order; the editor's cache and world slice may briefly disagree with the world.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::buffer::PendingBatch;
use crate::config::RequestPolicy;
use crate::error::{InterfaceError, Rejection};
use crate::transport::{Transport, WriteOptions};

/// What one flush achieved. Per-item failures are collected here rather than failing the flush.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FlushReport {
    pub placed: usize,
    pub commands: usize,
    pub rejections: Vec<Rejection>,
}

impl FlushReport {
    /// Everything in the batch was accepted.
    pub fn is_clean(&self) -> bool {
        self.rejections.is_empty()
    }
}

/// Send one swapped-out batch: the blocks as a single request, then the deferred commands.
///
/// Only transport-level failures are errors. Rejected items are logged and reported.
pub fn send_batch(
    transport: &dyn Transport,
    batch: PendingBatch,
    options: &WriteOptions,
    policy: &RequestPolicy,
) -> Result<FlushReport, InterfaceError> {
    let mut report = FlushReport::default();

    if !batch.blocks.is_empty() {
        tracing::debug!("Flushing {} buffered blocks", batch.blocks.len());
        let statuses = transport.write_blocks(&batch.blocks, options, policy)?;
        if statuses.len() != batch.blocks.len() {
            return Err(InterfaceError::Malformed {
                endpoint: transport.endpoint(),
                reason: format!(
                    "{} placement results for {} blocks",
                    statuses.len(),
                    batch.blocks.len()
                ),
            });
        }
        for ((pos, _), status) in batch.blocks.iter().zip(statuses) {
            if status.success {
                report.placed += 1;
            } else {
                let message = status.detail.unwrap_or_default();
                tracing::error!("Server rejected buffered block at {:?}: {}", pos, message);
                report.rejections.push(Rejection {
                    position: Some(*pos),
                    message,
                });
            }
        }
    }

    if !batch.commands.is_empty() {
        tracing::debug!("Running {} deferred commands", batch.commands.len());
        let statuses = transport.run_commands(
            &batch.commands.join("\n"),
            options.dimension.as_deref(),
            policy,
        )?;
        report.commands = batch.commands.len();
        for status in statuses.into_iter().filter(|s| !s.success) {
            let message = status.detail.unwrap_or_default();
            tracing::error!("Server returned error upon running buffered command: {}", message);
            report.rejections.push(Rejection {
                position: None,
                message,
            });
        }
    }

    Ok(report)
}

pub type FlushId = u64;

/// How many finished results a pool holds on to. Older ones are dropped once logged.
pub const RETAINED_RESULTS: usize = 256;

type Completion = (FlushId, Result<FlushReport, InterfaceError>);

/// Fixed-size worker pool for buffer flushes.
pub struct FlushPool {
    pool: ThreadPool,
    done_tx: Sender<Completion>,
    done_rx: Receiver<Completion>,
    pending: BTreeSet<FlushId>,
    finished: VecDeque<Completion>,
    next_id: FlushId,
}

impl FlushPool {
    /// A pool of `workers` threads whose flush ids start at `first_id`.
    pub fn new(workers: usize, first_id: FlushId) -> Result<Self, InterfaceError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("gdmc-flush-{i}"))
            .build()
            .map_err(|err| InterfaceError::PoolBuild(err.to_string()))?;
        let (done_tx, done_rx) = crossbeam_channel::unbounded();
        Ok(Self {
            pool,
            done_tx,
            done_rx,
            pending: BTreeSet::new(),
            finished: VecDeque::new(),
            next_id: first_id,
        })
    }

    /// Queue `batch` for sending. Jobs start in submission order.
    pub fn submit(
        &mut self,
        transport: Arc<dyn Transport>,
        batch: PendingBatch,
        options: WriteOptions,
        policy: RequestPolicy,
    ) -> FlushId {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.insert(id);

        let done = self.done_tx.clone();
        self.pool.spawn_fifo(move || {
            let result = send_batch(transport.as_ref(), batch, &options, &policy);
            let _ = done.send((id, result));
        });
        id
    }

    fn record(&mut self, (id, result): Completion) {
        self.pending.remove(&id);
        match &result {
            Ok(report) => tracing::debug!(
                "Flush {} finished: {} placed, {} rejected",
                id,
                report.placed,
                report.rejections.len()
            ),
            Err(err) => tracing::error!("Flush {} failed: {}", id, err),
        }
        self.finished.push_back((id, result));
        if self.finished.len() > RETAINED_RESULTS {
            if let Some((dropped, _)) = self.finished.pop_front() {
                tracing::debug!("Discarding uncollected result of flush {}", dropped);
            }
        }
    }

    /// Collect whatever has finished without blocking.
    pub fn poll(&mut self) {
        while let Ok(done) = self.done_rx.try_recv() {
            self.record(done);
        }
    }

    /// Block until every submitted flush has finished, or until `timeout` elapses. Returns the
    /// ids still outstanding, in submission order.
    pub fn await_flushes(&mut self, timeout: Option<Duration>) -> Vec<FlushId> {
        self.poll();
        let deadline = timeout.map(|t| Instant::now() + t);
        while !self.pending.is_empty() {
            let received = match deadline {
                Some(deadline) => self.done_rx.recv_deadline(deadline),
                None => self.done_rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok(done) => self.record(done),
                Err(_) => break,
            }
        }
        self.pending.iter().copied().collect()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Id the next submitted flush will get.
    pub fn next_id(&self) -> FlushId {
        self.next_id
    }

    /// Results of finished flushes not yet handed out, oldest first. At most
    /// [`RETAINED_RESULTS`] are kept.
    pub fn take_finished(&mut self) -> Vec<(FlushId, Result<FlushReport, InterfaceError>)> {
        self.finished.drain(..).collect()
    }
}

impl Drop for FlushPool {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            let left = self.await_flushes(None);
            if !left.is_empty() {
                tracing::warn!("{} buffer flushes did not finish", left.len());
            }
        }
    }
}

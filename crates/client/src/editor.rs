use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;

use gdmc_engine::{Block, BlockBox, BlockPos, BlockSource, HeightmapKind, Rect, Transform, WorldSlice};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::buffer::WriteBuffer;
use crate::cache::BlockCache;
use crate::config::{EditorConfig, RequestPolicy};
use crate::error::InterfaceError;
use crate::flush_pool::{self, FlushId, FlushPool, FlushReport};
use crate::slice::{self, DecayingSlice};
use crate::transport::{HttpTransport, ItemStatus, Transport, WriteOptions};

/// Result of asking the editor to flush its buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The buffer was empty.
    Nothing,
    /// Sent on the calling thread.
    Sent(FlushReport),
    /// Handed to the flush workers; see [`Editor::await_flushes`].
    Queued(FlushId),
}

/// Reads and writes blocks in a remote world through a local coordinate frame.
///
/// Positions passed to the plain methods are local to [`Editor::transform`]; the `_global`
/// variants bypass it. Reads are served from, in order: the write buffer, the block cache, the
/// cached world slice (where no write has touched it since loading), and finally the network.
///
/// Dropping the editor sends anything still buffered. Use [`Editor::close`] to see errors from
/// that final flush.
pub struct Editor {
    transport: Arc<dyn Transport>,
    config: EditorConfig,
    transform: Transform,
    buffer: WriteBuffer,
    cache: BlockCache,
    world_slice: Option<DecayingSlice>,
    pool: Option<FlushPool>,
    /// First flush id for the next pool, so ids stay unique across worker changes.
    next_flush_id: FlushId,
    rng: ChaCha8Rng,
    closed: bool,
}

impl Editor {
    /// An editor talking HTTP to `config.host`.
    pub fn new(config: EditorConfig) -> Result<Self, InterfaceError> {
        let transport = Arc::new(HttpTransport::new(config.host.clone()));
        Self::with_transport(config, transport)
    }

    pub fn with_transport(
        config: EditorConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, InterfaceError> {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_rng(&mut rand::rng()),
        };
        let pool = match config.flush_workers {
            Some(workers) => Some(Self::start_pool(workers, 0)?),
            None => None,
        };
        Ok(Self {
            transport,
            cache: BlockCache::new(config.cache_limit),
            config,
            transform: Transform::IDENTITY,
            buffer: WriteBuffer::new(),
            world_slice: None,
            pool,
            next_flush_id: 0,
            rng,
            closed: false,
        })
    }

    fn start_pool(workers: usize, first_id: FlushId) -> Result<FlushPool, InterfaceError> {
        if workers > 1 {
            tracing::warn!(
                "Flushing with {} workers: flushes may reach the world out of order, and cached \
                 blocks may briefly disagree with it",
                workers
            );
        }
        FlushPool::new(workers, first_id)
    }

    // ── Settings ────────────────────────────────────────────────

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    fn policy(&self) -> RequestPolicy {
        self.config.request_policy()
    }

    fn write_options(&self) -> WriteOptions {
        WriteOptions {
            dimension: self.config.dimension.clone(),
            do_block_updates: self.config.do_block_updates,
            spawn_drops: self.config.spawn_drops,
        }
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
    }

    /// Enter `transform` on top of the current one until the guard is dropped.
    pub fn push_transform(&mut self, transform: Transform) -> TransformGuard<'_> {
        let saved = self.transform;
        self.transform.push(&transform);
        TransformGuard {
            editor: self,
            saved,
        }
    }

    pub fn buffering(&self) -> bool {
        self.config.buffering
    }

    /// Turning buffering off sends whatever is pending.
    pub fn set_buffering(&mut self, buffering: bool) -> Result<(), InterfaceError> {
        if self.config.buffering && !buffering {
            self.flush_buffer()?;
        }
        self.config.buffering = buffering;
        Ok(())
    }

    /// Flushes right away if the buffer already holds `limit` writes or more.
    pub fn set_buffer_limit(&mut self, limit: usize) -> Result<(), InterfaceError> {
        self.config.buffer_limit = limit;
        if self.buffer.len() >= limit {
            self.flush_buffer()?;
        }
        Ok(())
    }

    pub fn caching(&self) -> bool {
        self.config.caching
    }

    /// Turning caching off drops every cached block.
    pub fn set_caching(&mut self, caching: bool) {
        if !caching {
            self.cache.clear();
        }
        self.config.caching = caching;
    }

    pub fn set_cache_limit(&mut self, limit: usize) {
        self.config.cache_limit = limit;
        self.cache.set_limit(limit);
    }

    /// `None` flushes on the calling thread. Changing the worker count waits for running
    /// flushes first and hands back the results not yet collected with
    /// [`Editor::take_flush_results`].
    pub fn set_flush_workers(
        &mut self,
        workers: Option<usize>,
    ) -> Result<Vec<(FlushId, Result<FlushReport, InterfaceError>)>, InterfaceError> {
        if workers == self.config.flush_workers {
            return Ok(Vec::new());
        }
        let mut uncollected = Vec::new();
        if let Some(mut old) = self.pool.take() {
            old.await_flushes(None);
            self.next_flush_id = old.next_id();
            uncollected = old.take_finished();
        }
        self.pool = match workers {
            Some(n) => Some(Self::start_pool(n, self.next_flush_id)?),
            None => None,
        };
        self.config.flush_workers = workers;
        Ok(uncollected)
    }

    pub fn set_do_block_updates(&mut self, enabled: bool) -> Result<(), InterfaceError> {
        if enabled != self.config.do_block_updates {
            self.flush_buffer()?;
            self.config.do_block_updates = enabled;
        }
        Ok(())
    }

    pub fn set_spawn_drops(&mut self, enabled: bool) -> Result<(), InterfaceError> {
        if enabled != self.config.spawn_drops {
            self.flush_buffer()?;
            self.config.spawn_drops = enabled;
        }
        Ok(())
    }

    pub fn dimension(&self) -> Option<&str> {
        self.config.dimension.as_deref()
    }

    /// Switching dimension flushes and forgets everything cached about the old one.
    pub fn set_dimension(&mut self, dimension: Option<String>) -> Result<(), InterfaceError> {
        if dimension != self.config.dimension {
            self.flush_buffer()?;
            self.invalidate();
            self.config.dimension = dimension;
        }
        Ok(())
    }

    /// Point the editor at another world. Flushes and drops cached state first.
    pub fn set_transport(&mut self, transport: Arc<dyn Transport>) -> Result<(), InterfaceError> {
        self.flush_buffer()?;
        self.invalidate();
        self.transport = transport;
        Ok(())
    }

    /// [`Editor::set_transport`] with an HTTP transport to `host`.
    pub fn set_host(&mut self, host: impl Into<String>) -> Result<(), InterfaceError> {
        let host = host.into();
        self.set_transport(Arc::new(HttpTransport::new(host.clone())))?;
        self.config.host = host;
        Ok(())
    }

    pub fn set_retries(&mut self, retries: u32) {
        self.config.retries = retries;
    }

    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.config.timeout_ms = timeout.map(|t| t.as_millis() as u64);
    }

    fn invalidate(&mut self) {
        self.cache.clear();
        self.world_slice = None;
    }

    // ── Reading ─────────────────────────────────────────────────

    /// The block at local `pos`, oriented as seen from the local frame.
    pub fn get_block(&mut self, pos: BlockPos) -> Result<Block, InterfaceError> {
        let mut block = self.get_block_global(self.transform.apply(pos))?;
        let inverse = self.transform.invert();
        block.transform(inverse.rotation(), inverse.flip);
        Ok(block)
    }

    pub fn get_block_global(&mut self, pos: BlockPos) -> Result<Block, InterfaceError> {
        if let Some(block) = self.buffer.get(pos) {
            return Ok(block.clone());
        }
        if self.config.caching {
            if let Some(block) = self.cache.get(pos) {
                return Ok(block.clone());
            }
        }

        let block = match &self.world_slice {
            Some(slice) if slice.is_fresh(pos) => slice.slice().block(pos),
            _ => self.fetch_block(pos)?,
        };
        if self.config.caching {
            self.cache.insert(pos, block.clone());
        }
        Ok(block)
    }

    fn fetch_block(&self, pos: BlockPos) -> Result<Block, InterfaceError> {
        let area = BlockBox::new(pos, BlockPos::new(1, 1, 1));
        let blocks = self
            .transport
            .read_blocks(area, self.dimension(), &self.policy())?;
        blocks
            .into_iter()
            .next()
            .map(|(_, block)| block)
            .ok_or_else(|| InterfaceError::Malformed {
                endpoint: self.transport.endpoint(),
                reason: format!("no block returned for {pos:?}"),
            })
    }

    /// Biome at local `pos`; empty if the server doesn't know.
    pub fn get_biome(&mut self, pos: BlockPos) -> Result<String, InterfaceError> {
        self.get_biome_global(self.transform.apply(pos))
    }

    pub fn get_biome_global(&mut self, pos: BlockPos) -> Result<String, InterfaceError> {
        if let Some(slice) = &self.world_slice {
            if slice.is_fresh(pos) {
                return Ok(slice.slice().biome(pos));
            }
        }
        let area = BlockBox::new(pos, BlockPos::new(1, 1, 1));
        let biomes = self
            .transport
            .read_biomes(area, self.dimension(), &self.policy())?;
        Ok(biomes.into_iter().next().map(|(_, id)| id).unwrap_or_default())
    }

    // ── Writing ─────────────────────────────────────────────────

    /// Place `source` at local `pos`. Both position and block orientation go through the
    /// transform.
    ///
    /// With `replace`, only overwrites blocks whose id is listed. Returns whether the placement
    /// succeeded; skipped placements count as success.
    pub fn place_block(
        &mut self,
        pos: BlockPos,
        source: impl Into<BlockSource>,
        replace: Option<&[&str]>,
    ) -> Result<bool, InterfaceError> {
        let global = self.transform.apply(pos);
        let source = source
            .into()
            .transformed(self.transform.rotation(), self.transform.flip);
        self.place_block_global(global, &source, replace)
    }

    pub fn place_block_global(
        &mut self,
        pos: BlockPos,
        source: &BlockSource,
        replace: Option<&[&str]>,
    ) -> Result<bool, InterfaceError> {
        if let Some(allowed) = replace {
            let current = self.get_block_global(pos)?;
            if !allowed.contains(&current.id.as_str()) {
                return Ok(true);
            }
        }

        let Some(block) = source.sample(&mut self.rng).cloned() else {
            return Ok(true);
        };
        if block.is_nothing() {
            return Ok(true);
        }

        let placed = if self.config.buffering {
            if self.buffer.len() >= self.config.buffer_limit {
                self.flush_buffer()?;
            }
            self.buffer.insert(pos, block.clone());
            true
        } else {
            self.place_direct(pos, &block)?
        };
        if !placed {
            return Ok(false);
        }

        if self.config.caching {
            self.cache.insert(pos, block);
        }
        if let Some(slice) = &mut self.world_slice {
            slice.decay(pos);
        }
        Ok(true)
    }

    fn place_direct(&self, pos: BlockPos, block: &Block) -> Result<bool, InterfaceError> {
        let statuses = self.transport.write_blocks(
            &[(pos, block.clone())],
            &self.write_options(),
            &self.policy(),
        )?;
        match statuses.into_iter().next() {
            Some(ItemStatus { success: true, .. }) => Ok(true),
            Some(ItemStatus { detail, .. }) => {
                tracing::error!(
                    "Server returned error upon placing block at {:?}: {}",
                    pos,
                    detail.unwrap_or_default()
                );
                Ok(false)
            }
            None => Err(InterfaceError::Malformed {
                endpoint: self.transport.endpoint(),
                reason: "empty placement response".into(),
            }),
        }
    }

    /// Place `source` at every local position, buffering for the duration. Returns whether
    /// every placement succeeded.
    pub fn place_blocks(
        &mut self,
        positions: impl IntoIterator<Item = BlockPos>,
        source: impl Into<BlockSource>,
        replace: Option<&[&str]>,
    ) -> Result<bool, InterfaceError> {
        let source = source
            .into()
            .transformed(self.transform.rotation(), self.transform.flip);
        let was_buffering = self.config.buffering;
        self.config.buffering = true;

        let mut all_placed = true;
        let mut outcome = Ok(());
        for pos in positions {
            let global = self.transform.apply(pos);
            match self.place_block_global(global, &source, replace) {
                Ok(placed) => all_placed &= placed,
                Err(err) => {
                    outcome = Err(err);
                    break;
                }
            }
        }

        let restored = self.set_buffering(was_buffering);
        outcome?;
        restored?;
        Ok(all_placed)
    }

    // ── Commands ────────────────────────────────────────────────

    /// Run one or more newline-separated commands (without the leading `/`).
    ///
    /// With `position`, the commands execute at that local position. Only the position goes
    /// through the transform, not rotation or mirroring. With `sync_with_buffer` while buffering,
    /// the commands wait until after the next flush and an empty status list is returned.
    pub fn run_command(
        &mut self,
        command: &str,
        position: Option<BlockPos>,
        sync_with_buffer: bool,
    ) -> Result<Vec<ItemStatus>, InterfaceError> {
        let position = position.map(|p| self.transform.apply(p));
        self.run_command_global(command, position, sync_with_buffer)
    }

    pub fn run_command_global(
        &mut self,
        command: &str,
        position: Option<BlockPos>,
        sync_with_buffer: bool,
    ) -> Result<Vec<ItemStatus>, InterfaceError> {
        let command = match position {
            Some(p) => format!("execute positioned {} {} {} run {}", p.x, p.y, p.z, command),
            None => command.to_string(),
        };
        if self.config.buffering && sync_with_buffer {
            self.buffer.push_command(command);
            return Ok(Vec::new());
        }
        let statuses = self
            .transport
            .run_commands(&command, self.dimension(), &self.policy())?;
        for status in statuses.iter().filter(|s| !s.success) {
            tracing::error!(
                "Server returned error upon running command: {}",
                status.detail.as_deref().unwrap_or_default()
            );
        }
        Ok(statuses)
    }

    // ── Build area & server info ────────────────────────────────

    /// The build area set in-game with `/setbuildarea`, in global coordinates.
    pub fn get_build_area(&self) -> Result<BlockBox, InterfaceError> {
        self.transport.build_area(&self.policy())
    }

    /// Set the build area (global coordinates) and return what the server reports back.
    pub fn set_build_area(&mut self, area: BlockBox) -> Result<BlockBox, InterfaceError> {
        let last = area.last();
        self.run_command_global(
            &format!(
                "setbuildarea {} {} {} {} {} {}",
                area.offset.x, area.offset.y, area.offset.z, last.x, last.y, last.z
            ),
            None,
            false,
        )?;
        self.get_build_area()
    }

    pub fn minecraft_version(&self) -> Result<String, InterfaceError> {
        self.transport.version(&self.policy())
    }

    /// Fails with [`InterfaceError::Connection`] if the server is unreachable. Never retries.
    pub fn check_connection(&self) -> Result<(), InterfaceError> {
        self.transport.version(&self.policy().with_retries(0))?;
        Ok(())
    }

    // ── World slices ────────────────────────────────────────────

    fn slice_rect(&self, rect: Option<Rect>) -> Result<Rect, InterfaceError> {
        match rect {
            Some(rect) => Ok(rect),
            None => Ok(self.get_build_area()?.to_rect()),
        }
    }

    /// Load a world slice (global coordinates) without caching it. `None` loads the build area.
    pub fn load_world_slice(
        &self,
        rect: Option<Rect>,
        heightmaps: &[HeightmapKind],
    ) -> Result<WorldSlice, InterfaceError> {
        let rect = self.slice_rect(rect)?;
        slice::load_world_slice(
            self.transport.as_ref(),
            rect,
            self.dimension(),
            heightmaps,
            &self.policy(),
        )
    }

    /// Load a world slice and keep it for serving reads, replacing any cached one.
    ///
    /// The editor assumes nothing else changes the area. Call
    /// [`Editor::update_world_slice`] if something does.
    pub fn cache_world_slice(
        &mut self,
        rect: Option<Rect>,
        heightmaps: &[HeightmapKind],
    ) -> Result<&WorldSlice, InterfaceError> {
        let slice = self.load_world_slice(rect, heightmaps)?;
        let cached = self
            .world_slice
            .insert(DecayingSlice::new(slice, heightmaps.to_vec()));
        Ok(cached.slice())
    }

    /// Reload the cached slice's area with the same heightmaps.
    pub fn update_world_slice(&mut self) -> Result<&WorldSlice, InterfaceError> {
        let (rect, heightmaps) = match &self.world_slice {
            Some(cached) => (cached.slice().rect(), cached.heightmaps().to_vec()),
            None => return Err(InterfaceError::NoWorldSlice),
        };
        self.cache_world_slice(Some(rect), &heightmaps)
    }

    pub fn world_slice(&self) -> Option<&WorldSlice> {
        self.world_slice.as_ref().map(DecayingSlice::slice)
    }

    /// Whether the cached slice is known stale at global `pos`; `None` without a slice or
    /// outside it.
    pub fn decay_at(&self, pos: BlockPos) -> Option<bool> {
        self.world_slice.as_ref()?.is_decayed(pos)
    }

    // ── Flushing ────────────────────────────────────────────────

    /// Number of buffered block writes.
    pub fn pending_writes(&self) -> usize {
        self.buffer.len()
    }

    /// Send everything buffered. With flush workers the batch is queued and the buffer is
    /// immediately free for new writes.
    pub fn flush_buffer(&mut self) -> Result<FlushOutcome, InterfaceError> {
        if self.buffer.is_empty() {
            return Ok(FlushOutcome::Nothing);
        }
        let batch = self.buffer.take();
        let options = self.write_options();
        let policy = self.policy();
        match &mut self.pool {
            Some(pool) => {
                pool.poll();
                let id = pool.submit(Arc::clone(&self.transport), batch, options, policy);
                Ok(FlushOutcome::Queued(id))
            }
            None => {
                let report =
                    flush_pool::send_batch(self.transport.as_ref(), batch, &options, &policy)?;
                Ok(FlushOutcome::Sent(report))
            }
        }
    }

    /// Wait for queued flushes, at most `timeout` if given. Returns the ids still running.
    pub fn await_flushes(&mut self, timeout: Option<Duration>) -> Vec<FlushId> {
        match &mut self.pool {
            Some(pool) => pool.await_flushes(timeout),
            None => Vec::new(),
        }
    }

    /// Queued flushes that have not finished yet.
    pub fn pending_flushes(&mut self) -> usize {
        match &mut self.pool {
            Some(pool) => {
                pool.poll();
                pool.pending()
            }
            None => 0,
        }
    }

    /// Results of queued flushes that have finished since the last call, oldest first. Only the
    /// newest [`RETAINED_RESULTS`](crate::flush_pool::RETAINED_RESULTS) are kept between calls.
    pub fn take_flush_results(&mut self) -> Vec<(FlushId, Result<FlushReport, InterfaceError>)> {
        match &mut self.pool {
            Some(pool) => {
                pool.poll();
                pool.take_finished()
            }
            None => Vec::new(),
        }
    }

    // ── Teardown ────────────────────────────────────────────────

    /// Wait for queued flushes, then send the rest of the buffer on this thread.
    fn shutdown(&mut self) -> Result<FlushReport, InterfaceError> {
        self.closed = true;
        if let Some(pool) = &mut self.pool {
            pool.await_flushes(None);
        }
        let batch = self.buffer.take();
        if batch.is_empty() {
            return Ok(FlushReport::default());
        }
        flush_pool::send_batch(
            self.transport.as_ref(),
            batch,
            &self.write_options(),
            &self.policy(),
        )
    }

    /// Flush everything and release the editor, reporting what the final flush did.
    pub fn close(mut self) -> Result<FlushReport, InterfaceError> {
        self.shutdown()
    }
}

impl Drop for Editor {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(err) = self.shutdown() {
            tracing::error!("Failed to flush block buffer on drop: {}", err);
        }
    }
}

/// Restores the editor's previous transform when dropped. Derefs to the editor.
pub struct TransformGuard<'a> {
    editor: &'a mut Editor,
    saved: Transform,
}

impl Deref for TransformGuard<'_> {
    type Target = Editor;

    fn deref(&self) -> &Editor {
        self.editor
    }
}

impl DerefMut for TransformGuard<'_> {
    fn deref_mut(&mut self) -> &mut Editor {
        self.editor
    }
}

impl Drop for TransformGuard<'_> {
    fn drop(&mut self) {
        self.editor.transform = self.saved;
    }
}

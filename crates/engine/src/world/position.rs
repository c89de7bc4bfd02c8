use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Absolute block position in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct BlockPos {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl BlockPos {
    pub const ZERO: BlockPos = BlockPos::new(0, 0, 0);

    pub const fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    /// The chunk column this block belongs to.
    pub const fn chunk(&self) -> ChunkPos {
        ChunkPos {
            x: (self.x >> 4) as i32,
            z: (self.z >> 4) as i32,
        }
    }

    /// The 16x16x16 section this block belongs to.
    pub const fn section(&self) -> SectionPos {
        SectionPos {
            x: (self.x >> 4) as i32,
            y: (self.y >> 4) as i32,
            z: (self.z >> 4) as i32,
        }
    }
}

impl Add for BlockPos {
    type Output = BlockPos;
    fn add(self, rhs: BlockPos) -> BlockPos {
        BlockPos::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for BlockPos {
    fn add_assign(&mut self, rhs: BlockPos) {
        *self = *self + rhs;
    }
}

impl Sub for BlockPos {
    type Output = BlockPos;
    fn sub(self, rhs: BlockPos) -> BlockPos {
        BlockPos::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl SubAssign for BlockPos {
    fn sub_assign(&mut self, rhs: BlockPos) {
        *self = *self - rhs;
    }
}

impl Neg for BlockPos {
    type Output = BlockPos;
    fn neg(self) -> BlockPos {
        BlockPos::new(-self.x, -self.y, -self.z)
    }
}

impl From<(i64, i64, i64)> for BlockPos {
    fn from((x, y, z): (i64, i64, i64)) -> Self {
        Self::new(x, y, z)
    }
}

/// Chunk column position (each chunk is 16x16 blocks horizontally).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

/// Chunk section position: chunk column plus vertical section index (y >> 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectionPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl SectionPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

/// Axis-aligned rectangle in the XZ-plane: `offset` plus `size`, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i64,
    pub z: i64,
    pub size_x: i64,
    pub size_z: i64,
}

impl Rect {
    pub const fn new(x: i64, z: i64, size_x: i64, size_z: i64) -> Self {
        Self {
            x,
            z,
            size_x,
            size_z,
        }
    }

    pub const fn contains(&self, x: i64, z: i64) -> bool {
        x >= self.x && x < self.x + self.size_x && z >= self.z && z < self.z + self.size_z
    }

    /// The last (inclusive) corner.
    pub const fn last(&self) -> (i64, i64) {
        (self.x + self.size_x - 1, self.z + self.size_z - 1)
    }

    pub const fn area(&self) -> i64 {
        self.size_x * self.size_z
    }

    /// The rect of chunk coordinates needed to cover every block of this rect.
    pub const fn chunk_rect(&self) -> Rect {
        let (last_x, last_z) = self.last();
        let cx = self.x >> 4;
        let cz = self.z >> 4;
        Rect::new(cx, cz, (last_x >> 4) - cx + 1, (last_z >> 4) - cz + 1)
    }

    /// Extrude into a box spanning `y .. y + size_y`.
    pub const fn to_box(&self, y: i64, size_y: i64) -> BlockBox {
        BlockBox::new(
            BlockPos::new(self.x, y, self.z),
            BlockPos::new(self.size_x, size_y, self.size_z),
        )
    }
}

/// Axis-aligned box of blocks: `offset` plus `size`, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlockBox {
    pub offset: BlockPos,
    pub size: BlockPos,
}

impl BlockBox {
    pub const fn new(offset: BlockPos, size: BlockPos) -> Self {
        Self { offset, size }
    }

    /// The smallest box containing both corners (inclusive).
    pub fn between(a: BlockPos, b: BlockPos) -> Self {
        let offset = BlockPos::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z));
        let last = BlockPos::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z));
        Self::new(offset, last - offset + BlockPos::new(1, 1, 1))
    }

    /// One past the last block on every axis.
    pub fn end(&self) -> BlockPos {
        self.offset + self.size
    }

    /// The last (inclusive) corner.
    pub fn last(&self) -> BlockPos {
        self.end() - BlockPos::new(1, 1, 1)
    }

    pub fn contains(&self, pos: BlockPos) -> bool {
        let end = self.end();
        pos.x >= self.offset.x
            && pos.x < end.x
            && pos.y >= self.offset.y
            && pos.y < end.y
            && pos.z >= self.offset.z
            && pos.z < end.z
    }

    pub fn volume(&self) -> usize {
        (self.size.x.max(0) * self.size.y.max(0) * self.size.z.max(0)) as usize
    }

    pub const fn to_rect(&self) -> Rect {
        Rect::new(self.offset.x, self.offset.z, self.size.x, self.size.z)
    }

    /// Dense row-major index of `pos` (x outermost, then y, then z), or `None` outside the box.
    pub fn index_of(&self, pos: BlockPos) -> Option<usize> {
        if !self.contains(pos) {
            return None;
        }
        let d = pos - self.offset;
        Some(((d.x * self.size.y + d.y) * self.size.z + d.z) as usize)
    }

    /// Every position in the box, in `index_of` order.
    pub fn iter(&self) -> impl Iterator<Item = BlockPos> + '_ {
        let end = self.end();
        (self.offset.x..end.x).flat_map(move |x| {
            (self.offset.y..end.y)
                .flat_map(move |y| (self.offset.z..end.z).map(move |z| BlockPos::new(x, y, z)))
        })
    }
}

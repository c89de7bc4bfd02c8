//! Composable coordinate transforms: translation, quarter turns about the vertical axis, and
//! per-axis mirroring.
//!
//! A transform maps a *local* frame onto the *global* one. Applying it mirrors first, then
//! rotates, then translates. Mirroring and rotation do not commute, so that order is fixed.

pub mod orientation;

use std::ops::Mul;

use crate::world::position::{BlockBox, BlockPos};

/// Which axes are mirrored through the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Flip {
    pub x: bool,
    pub y: bool,
    pub z: bool,
}

impl Flip {
    pub const NONE: Flip = Flip::new(false, false, false);

    pub const fn new(x: bool, y: bool, z: bool) -> Self {
        Self { x, y, z }
    }

    /// Mirroring twice across the same axis cancels out.
    pub const fn xor(self, other: Flip) -> Flip {
        Flip::new(self.x ^ other.x, self.y ^ other.y, self.z ^ other.z)
    }

    fn scale(self, v: BlockPos) -> BlockPos {
        BlockPos::new(
            if self.x { -v.x } else { v.x },
            if self.y { -v.y } else { v.y },
            if self.z { -v.z } else { v.z },
        )
    }

    /// A horizontal mirror reverses the sense of rotation; mirroring both x and z does not.
    const fn reverses_rotation(self) -> bool {
        self.x ^ self.z
    }

    fn as_offsets(self) -> BlockPos {
        BlockPos::new(self.x as i64, self.y as i64, self.z as i64)
    }
}

/// Rotate `v` by `rotation` quarter turns. One turn maps +z onto -x and +x onto +z, which takes
/// north to east.
pub fn rotate(v: BlockPos, rotation: u8) -> BlockPos {
    match rotation % 4 {
        0 => v,
        1 => BlockPos::new(-v.z, v.y, v.x),
        2 => BlockPos::new(-v.x, v.y, -v.z),
        _ => BlockPos::new(v.z, v.y, -v.x),
    }
}

const fn mirrored_rotation(rotation: u8, flip: Flip) -> u8 {
    if flip.reverses_rotation() {
        (4 - rotation % 4) % 4
    } else {
        rotation % 4
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Transform {
    pub translation: BlockPos,
    /// Quarter turns, always in `0..4`.
    rotation: u8,
    pub flip: Flip,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: BlockPos::ZERO,
        rotation: 0,
        flip: Flip::NONE,
    };

    pub const fn new(translation: BlockPos, rotation: u8, flip: Flip) -> Self {
        Self {
            translation,
            rotation: rotation % 4,
            flip,
        }
    }

    pub const fn translate(translation: BlockPos) -> Self {
        Self::new(translation, 0, Flip::NONE)
    }

    pub const fn rotation(&self) -> u8 {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: u8) {
        self.rotation = rotation % 4;
    }

    pub fn apply(&self, pos: BlockPos) -> BlockPos {
        rotate(self.flip.scale(pos), self.rotation) + self.translation
    }

    pub fn apply_inverse(&self, pos: BlockPos) -> BlockPos {
        self.flip
            .scale(rotate(pos - self.translation, (4 - self.rotation) % 4))
    }

    /// `self.then(other)` applies `other` first and `self` second.
    pub fn then(&self, other: &Transform) -> Transform {
        Transform::new(
            self.apply(other.translation),
            self.rotation + mirrored_rotation(other.rotation, self.flip),
            self.flip.xor(other.flip),
        )
    }

    pub fn invert(&self) -> Transform {
        let rotation = mirrored_rotation((4 - self.rotation) % 4, self.flip);
        Transform::new(
            -rotate(self.flip.scale(self.translation), rotation),
            rotation,
            self.flip,
        )
    }

    /// Enter the frame described by `other`: `self = self.then(other)`.
    pub fn push(&mut self, other: &Transform) {
        *self = self.then(other);
    }

    /// Leave a frame previously entered with `push(other)`.
    pub fn pop(&mut self, other: &Transform) {
        *self = self.then(&other.invert());
    }

    /// Transform that rotates the box `(0,0,0)..size` in place so it lands on `area`.
    pub fn rotated_box_transform(area: BlockBox, rotation: u8) -> Transform {
        let rotation = rotation % 4;
        let shift = BlockPos::new(
            if matches!(rotation, 1 | 2) { area.size.x - 1 } else { 0 },
            0,
            if matches!(rotation, 2 | 3) { area.size.z - 1 } else { 0 },
        );
        Transform::new(area.offset + shift, rotation, Flip::NONE)
    }

    /// Transform that mirrors the box `(0,0,0)..size` in place so it lands on `area`.
    pub fn flipped_box_transform(area: BlockBox, flip: Flip) -> Transform {
        let last = area.size - BlockPos::new(1, 1, 1);
        let offsets = flip.as_offsets();
        let shift = BlockPos::new(last.x * offsets.x, last.y * offsets.y, last.z * offsets.z);
        Transform::new(area.offset + shift, 0, flip)
    }
}

impl Mul for Transform {
    type Output = Transform;

    fn mul(self, rhs: Transform) -> Transform {
        self.then(&rhs)
    }
}

impl From<BlockPos> for Transform {
    fn from(translation: BlockPos) -> Self {
        Transform::translate(translation)
    }
}

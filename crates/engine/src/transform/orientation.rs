//! Lookup tables for the orientation-carrying block states.
//!
//! Every function flips first and rotates second, matching `Transform::apply`. States we
//! don't recognise are passed through untouched.

use super::Flip;

const HORIZONTAL_AXES: [&str; 2] = ["x", "z"];
/// Clockwise order seen from above; one step is one 90° turn.
const HORIZONTAL_FACINGS: [&str; 4] = ["north", "east", "south", "west"];

/// `axis`: odd rotations swap x and z. Flipping never changes an axis.
pub fn transform_axis(axis: &str, rotation: u8) -> &str {
    match HORIZONTAL_AXES.iter().position(|a| *a == axis) {
        Some(i) => HORIZONTAL_AXES[(i + rotation as usize) % 2],
        None => axis,
    }
}

fn flip_facing(facing: &str, flip: Flip) -> &str {
    match facing {
        "east" if flip.x => "west",
        "west" if flip.x => "east",
        "up" if flip.y => "down",
        "down" if flip.y => "up",
        "north" if flip.z => "south",
        "south" if flip.z => "north",
        other => other,
    }
}

fn rotate_facing(facing: &str, rotation: u8) -> &str {
    match HORIZONTAL_FACINGS.iter().position(|f| *f == facing) {
        Some(i) => HORIZONTAL_FACINGS[(i + rotation as usize) % 4],
        None => facing,
    }
}

/// `facing`: mirror across the flipped axes, then turn horizontally.
pub fn transform_facing(facing: &str, rotation: u8, flip: Flip) -> &str {
    rotate_facing(flip_facing(facing, flip), rotation)
}

/// Granular `rotation` (0..16, sixteenths of a turn, 0 = south). Non-numeric values pass through.
pub fn transform_rotation(value: &str, rotation: u8, flip: Flip) -> String {
    let Ok(mut r) = value.parse::<i32>() else {
        return value.to_string();
    };
    if flip.x {
        r = 16 - r;
    }
    if flip.z {
        r = 8 - r;
    }
    (r + 4 * rotation as i32).rem_euclid(16).to_string()
}

/// `half`: only top/bottom are vertical; `upper`/`lower` (doors) are left alone.
pub fn transform_half(half: &str, flip: Flip) -> &str {
    match half {
        "top" if flip.y => "bottom",
        "bottom" if flip.y => "top",
        other => other,
    }
}

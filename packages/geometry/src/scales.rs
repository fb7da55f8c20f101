//! World extent and scale constants.

use geo::{Coord, Rect};

/// Lower bound of the projected world extent on both axes.
pub const WORLD_MIN: f64 = -180.0;

/// Upper bound of the projected world extent on both axes.
pub const WORLD_MAX: f64 = 180.0;

/// Side length of the projected world extent.
pub const WORLD_SIZE: f64 = WORLD_MAX - WORLD_MIN;

/// Finest map scale a query can ask for.
pub const UPPER_SCALE: u8 = 17;

/// Finest quadtree level. Feature keys are always stored at this level.
pub const MAX_CELL_LEVEL: u8 = 24;

/// The whole projected world as a rectangle.
#[must_use]
pub fn world_rect() -> Rect<f64> {
    Rect::new(
        Coord {
            x: WORLD_MIN,
            y: WORLD_MIN,
        },
        Coord {
            x: WORLD_MAX,
            y: WORLD_MAX,
        },
    )
}

/// Quadtree level used to cover a viewport at `scale`.
#[must_use]
pub const fn cell_level_for_scale(scale: u8) -> u8 {
    if scale > MAX_CELL_LEVEL {
        MAX_CELL_LEVEL
    } else {
        scale
    }
}

/// Clamps a requested scale into a partition's supported `(min, max)`
/// range. The upper bound wins if the range is inverted.
#[must_use]
pub fn clamp_scale(scale: u8, (min, max): (u8, u8)) -> u8 {
    scale.max(min).min(max)
}

//! Quadtree cells over the projected world.
//!
//! A cell at level `l` is one square of a `2^l x 2^l` grid laid over the
//! world extent. Cells are ordered by their Morton (Z-order) code, so a
//! cell and all of its descendants occupy one contiguous range of
//! finest-level keys.

use geo::{Coord, Rect};

use crate::scales::{MAX_CELL_LEVEL, WORLD_MIN, WORLD_SIZE};

/// A quadtree cell identified by its level and grid position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId {
    level: u8,
    x: u32,
    y: u32,
}

impl CellId {
    /// The single level-0 cell spanning the whole world.
    #[must_use]
    pub const fn root() -> Self {
        Self {
            level: 0,
            x: 0,
            y: 0,
        }
    }

    /// Creates a cell, or `None` if the level is too deep or the grid
    /// position falls outside the level's grid.
    #[must_use]
    pub const fn new(level: u8, x: u32, y: u32) -> Option<Self> {
        if level > MAX_CELL_LEVEL {
            return None;
        }
        let side = 1u32 << level;
        if x >= side || y >= side {
            return None;
        }
        Some(Self { level, x, y })
    }

    /// Returns the cell of `level` containing `point`. Points outside
    /// the world extent snap to the nearest border cell.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_point(point: Coord<f64>, level: u8) -> Self {
        let level = level.min(MAX_CELL_LEVEL);
        let side = 1u32 << level;
        let max_index = f64::from(side - 1);

        let to_index = |value: f64| -> u32 {
            let scaled = ((value - WORLD_MIN) / WORLD_SIZE * f64::from(side)).floor();
            scaled.clamp(0.0, max_index) as u32
        };

        Self {
            level,
            x: to_index(point.x),
            y: to_index(point.y),
        }
    }

    /// Finest-level key of the cell containing `point`.
    #[must_use]
    pub fn key_for_point(point: Coord<f64>) -> u64 {
        Self::from_point(point, MAX_CELL_LEVEL).morton()
    }

    #[must_use]
    pub const fn level(&self) -> u8 {
        self.level
    }

    #[must_use]
    pub const fn x(&self) -> u32 {
        self.x
    }

    #[must_use]
    pub const fn y(&self) -> u32 {
        self.y
    }

    /// Side length of the cell in projected units.
    #[must_use]
    pub fn side(&self) -> f64 {
        WORLD_SIZE / f64::from(1u32 << self.level)
    }

    /// The cell's extent as a rectangle.
    #[must_use]
    pub fn rect(&self) -> Rect<f64> {
        let side = self.side();
        let min_x = f64::from(self.x).mul_add(side, WORLD_MIN);
        let min_y = f64::from(self.y).mul_add(side, WORLD_MIN);
        Rect::new(
            Coord { x: min_x, y: min_y },
            Coord {
                x: min_x + side,
                y: min_y + side,
            },
        )
    }

    /// The four children in Morton order, or `None` at the finest level.
    #[must_use]
    pub const fn children(&self) -> Option<[Self; 4]> {
        if self.level >= MAX_CELL_LEVEL {
            return None;
        }
        let level = self.level + 1;
        let x = self.x << 1;
        let y = self.y << 1;
        Some([
            Self { level, x, y },
            Self { level, x: x + 1, y },
            Self { level, x, y: y + 1 },
            Self {
                level,
                x: x + 1,
                y: y + 1,
            },
        ])
    }

    #[must_use]
    pub const fn parent(&self) -> Option<Self> {
        if self.level == 0 {
            return None;
        }
        Some(Self {
            level: self.level - 1,
            x: self.x >> 1,
            y: self.y >> 1,
        })
    }

    /// Morton code of the cell within its own level (x on even bits,
    /// y on odd bits).
    #[must_use]
    pub const fn morton(&self) -> u64 {
        spread_bits(self.x) | (spread_bits(self.y) << 1)
    }

    /// Half-open range of finest-level keys covered by this cell.
    #[must_use]
    pub const fn key_range(&self) -> (u64, u64) {
        let shift = 2 * (MAX_CELL_LEVEL - self.level) as u32;
        let code = self.morton();
        (code << shift, (code + 1) << shift)
    }
}

/// Spreads the low 32 bits of `value` so that bit `i` lands on bit `2i`.
const fn spread_bits(value: u32) -> u64 {
    let mut v = value as u64;
    v = (v | (v << 16)) & 0x0000_FFFF_0000_FFFF;
    v = (v | (v << 8)) & 0x00FF_00FF_00FF_00FF;
    v = (v | (v << 4)) & 0x0F0F_0F0F_0F0F_0F0F;
    v = (v | (v << 2)) & 0x3333_3333_3333_3333;
    v = (v | (v << 1)) & 0x5555_5555_5555_5555;
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_spans_every_key() {
        assert_eq!(CellId::root().key_range(), (0, 1 << 48));
    }

    #[test]
    fn rejects_out_of_grid_positions() {
        assert!(CellId::new(2, 3, 3).is_some());
        assert!(CellId::new(2, 4, 0).is_none());
        assert!(CellId::new(MAX_CELL_LEVEL + 1, 0, 0).is_none());
    }

    #[test]
    fn children_nest_inside_parent_range() {
        let cell = CellId::new(3, 5, 2).unwrap();
        let (begin, end) = cell.key_range();
        let children = cell.children().unwrap();

        assert_eq!(children[0].key_range().0, begin);
        assert_eq!(children[3].key_range().1, end);
        for pair in children.windows(2) {
            assert_eq!(pair[0].key_range().1, pair[1].key_range().0);
        }
        for child in children {
            assert_eq!(child.parent(), Some(cell));
        }
    }

    #[test]
    fn point_keys_fall_inside_their_cells() {
        let point = Coord { x: 5.0, y: 3.0 };
        let key = CellId::key_for_point(point);
        let cell = CellId::from_point(point, 6);
        let (begin, end) = cell.key_range();
        assert!(begin <= key && key < end);
        assert_eq!((cell.x(), cell.y()), (32, 32));
    }

    #[test]
    fn points_outside_world_snap_to_border() {
        let cell = CellId::from_point(Coord { x: 1000.0, y: -1000.0 }, 4);
        assert_eq!((cell.x(), cell.y()), (15, 0));
    }

    #[test]
    fn cell_rect_matches_grid() {
        let rect = CellId::new(6, 32, 31).unwrap().rect();
        assert!((rect.min().x - 0.0).abs() < 1e-9);
        assert!((rect.max().x - 5.625).abs() < 1e-9);
        assert!((rect.min().y + 5.625).abs() < 1e-9);
    }
}

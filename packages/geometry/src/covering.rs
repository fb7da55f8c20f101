//! Rectangle coverings.
//!
//! A covering is the sorted list of finest-level key intervals whose
//! cells touch a rectangle. Lookups in the scale index are driven by
//! these intervals.

use geo::Rect;

use crate::cell_id::CellId;
use crate::rect::RectExt;
use crate::scales::MAX_CELL_LEVEL;

/// Half-open `[begin, end)` range of finest-level cell keys.
pub type Interval = (u64, u64);

/// Covers `rect` with the cells of `level` that intersect it.
///
/// Cells entirely inside `rect` are emitted as soon as they are found,
/// without descending further, so the result stays small for large
/// viewports. Adjacent intervals are merged. The result is sorted.
#[must_use]
pub fn cover(rect: &Rect<f64>, level: u8) -> Vec<Interval> {
    let level = level.min(MAX_CELL_LEVEL);
    let mut intervals = Vec::new();
    cover_cell(CellId::root(), rect, level, &mut intervals);
    let merged = merge(intervals);
    log::trace!("cover: level={level} intervals={}", merged.len());
    merged
}

fn cover_cell(cell: CellId, rect: &Rect<f64>, level: u8, out: &mut Vec<Interval>) {
    let cell_rect = cell.rect();
    if !rect.intersects_rect(&cell_rect) {
        return;
    }

    if cell.level() >= level || rect.contains_rect(&cell_rect) {
        out.push(cell.key_range());
        return;
    }

    if let Some(children) = cell.children() {
        for child in children {
            cover_cell(child, rect, level, out);
        }
    }
}

fn merge(mut intervals: Vec<Interval>) -> Vec<Interval> {
    intervals.sort_unstable();

    let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
    for (begin, end) in intervals {
        match merged.last_mut() {
            Some(last) if begin <= last.1 => last.1 = last.1.max(end),
            _ => merged.push((begin, end)),
        }
    }
    merged
}

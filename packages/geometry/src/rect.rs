//! Rectangle predicates used by the viewport search.
//!
//! `geo`'s relate-based predicates treat boundaries according to
//! DE-9IM, which makes a zero-area partition (a single point) neither
//! "inside" nor "intersecting" in the way the search loop needs. These
//! helpers use plain closed-interval comparisons instead.

use geo::{BoundingRect, Coord, MultiPoint, Point, Rect};

/// Extension methods for [`Rect<f64>`].
pub trait RectExt: Sized {
    /// Returns a rectangle with the same centre whose width and height
    /// are multiplied by `factor`.
    #[must_use]
    fn scaled(&self, factor: f64) -> Self;

    /// Returns `true` if the two closed rectangles share at least one point.
    fn intersects_rect(&self, other: &Self) -> bool;

    /// Returns `true` if `other` lies entirely inside `self`, boundary
    /// included.
    fn contains_rect(&self, other: &Self) -> bool;

    /// Returns `true` if `point` lies inside `self`, boundary included.
    fn contains_coord(&self, point: Coord<f64>) -> bool;
}

impl RectExt for Rect<f64> {
    fn scaled(&self, factor: f64) -> Self {
        let center = self.center();
        let half_width = self.width() * factor / 2.0;
        let half_height = self.height() * factor / 2.0;

        Self::new(
            Coord {
                x: center.x - half_width,
                y: center.y - half_height,
            },
            Coord {
                x: center.x + half_width,
                y: center.y + half_height,
            },
        )
    }

    fn intersects_rect(&self, other: &Self) -> bool {
        self.min().x <= other.max().x
            && other.min().x <= self.max().x
            && self.min().y <= other.max().y
            && other.min().y <= self.max().y
    }

    fn contains_rect(&self, other: &Self) -> bool {
        self.min().x <= other.min().x
            && other.max().x <= self.max().x
            && self.min().y <= other.min().y
            && other.max().y <= self.max().y
    }

    fn contains_coord(&self, point: Coord<f64>) -> bool {
        self.min().x <= point.x
            && point.x <= self.max().x
            && self.min().y <= point.y
            && point.y <= self.max().y
    }
}

/// Computes the bounding rectangle of a set of points.
///
/// Returns `None` when `points` is empty.
#[must_use]
pub fn bounding_rect(points: impl IntoIterator<Item = Coord<f64>>) -> Option<Rect<f64>> {
    let multi: MultiPoint<f64> = points.into_iter().map(Point::from).collect();
    multi.bounding_rect()
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Planar geometry shared by the map search packages.
//!
//! All coordinates are projected (x, y) values inside a fixed square
//! world extent. The crate provides:
//!
//! - [`RectExt`]: closed-boundary rectangle predicates and viewport
//!   scaling on top of [`geo::Rect`].
//! - [`CellId`]: quadtree cells addressed by Morton (Z-order) keys.
//! - [`cover`]: turns a rectangle into the key intervals of every cell
//!   of a given level that touches it. This is how a viewport is
//!   translated into spatial index lookups.

pub mod cell_id;
pub mod covering;
pub mod rect;
pub mod scales;

pub use cell_id::CellId;
pub use covering::{Interval, cover};
pub use geo::{Coord, Rect};
pub use rect::{RectExt, bounding_rect};
pub use scales::{MAX_CELL_LEVEL, UPPER_SCALE, WORLD_MAX, WORLD_MIN, WORLD_SIZE};

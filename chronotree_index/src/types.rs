// Copyright 2025 the Chronotree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Primitive geometry types and helpers.
//!
//! Space is two `f32` axes (`x`, `y`) plus a wider `f64` time axis `t`, so long
//! recording sessions keep sub-millisecond resolution.

use core::cmp::Ordering;

use kurbo::{Point, Rect};

/// Number of octant slots produced by one bisection.
pub const OCTANT_COUNT: usize = 8;

/// Which half of each axis a slot covers, as `(upper_x, upper_y, upper_t)`.
///
/// Time is halved first: slots `0..4` cover the lower time half and `4..8` the
/// upper one. Within a time half the `(x, y)` quadrants follow the usual
/// mathematical order: `+x+y`, `-x+y`, `-x-y`, `+x-y`.
const SLOT_HALVES: [(bool, bool, bool); OCTANT_COUNT] = [
    (true, true, false),
    (false, true, false),
    (false, false, false),
    (true, false, false),
    (true, true, true),
    (false, true, true),
    (false, false, true),
    (true, false, true),
];

/// A point in (x, y, time).
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Point3 {
    /// Horizontal canvas coordinate.
    pub x: f32,
    /// Vertical canvas coordinate.
    pub y: f32,
    /// Time coordinate, typically seconds since the recording started.
    pub t: f64,
}

impl Point3 {
    /// Create a point from its three coordinates.
    pub const fn new(x: f32, y: f32, t: f64) -> Self {
        Self { x, y, t }
    }

    /// Lift a 2D canvas point into (x, y, time).
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Canvas coordinates are stored as f32; the narrowing is part of the format."
    )]
    pub fn from_point(point: Point, t: f64) -> Self {
        Self {
            x: point.x as f32,
            y: point.y as f32,
            t,
        }
    }

    /// The spatial part of this point as a Kurbo point.
    pub fn spatial(self) -> Point {
        Point::new(f64::from(self.x), f64::from(self.y))
    }

    /// Component-wise midpoint between `self` and `other`.
    pub fn midpoint(self, other: Self) -> Self {
        Self {
            x: 0.5 * (self.x + other.x),
            y: 0.5 * (self.y + other.y),
            t: 0.5 * (self.t + other.t),
        }
    }
}

/// Axis-aligned box over (x, y, time).
///
/// Used both as the extent of an octree node and as a query filter. All bounds
/// are inclusive.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Cube {
    /// Minimum corner.
    pub min: Point3,
    /// Maximum corner.
    pub max: Point3,
}

impl Cube {
    /// Create a cube from its min/max corners.
    pub const fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// Create a cube from a Kurbo rectangle and a time range.
    pub fn from_rect(rect: Rect, t_min: f64, t_max: f64) -> Self {
        let rect = rect.abs();
        Self {
            min: Point3::from_point(Point::new(rect.x0, rect.y0), t_min),
            max: Point3::from_point(Point::new(rect.x1, rect.y1), t_max),
        }
    }

    /// The spatial footprint of this cube, ignoring time.
    pub fn spatial_rect(&self) -> Rect {
        Rect::from_points(self.min.spatial(), self.max.spatial())
    }

    /// Whether the point lies inside this cube (inclusive on every axis).
    pub fn contains(&self, p: Point3) -> bool {
        le(self.min.x, p.x)
            && le(p.x, self.max.x)
            && le(self.min.y, p.y)
            && le(p.y, self.max.y)
            && le(self.min.t, p.t)
            && le(p.t, self.max.t)
    }

    /// Whether the two cubes overlap on all three axes (touching counts).
    pub fn intersects(&self, other: &Self) -> bool {
        le(self.min.x, other.max.x)
            && le(other.min.x, self.max.x)
            && le(self.min.y, other.max.y)
            && le(other.min.y, self.max.y)
            && le(self.min.t, other.max.t)
            && le(other.min.t, self.max.t)
    }

    /// Return true if the cube is inverted on any axis. Assumes no NaN.
    pub fn is_empty(&self) -> bool {
        lt(self.max.x, self.min.x) || lt(self.max.y, self.min.y) || lt(self.max.t, self.min.t)
    }

    /// Center of the cube.
    pub fn center(&self) -> Point3 {
        self.min.midpoint(self.max)
    }

    /// The sub-cube covered by octant `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= OCTANT_COUNT`.
    pub fn octant(&self, slot: usize) -> Self {
        let mid = self.center();
        let (upper_x, upper_y, upper_t) = SLOT_HALVES[slot];
        let (x0, x1) = if upper_x {
            (mid.x, self.max.x)
        } else {
            (self.min.x, mid.x)
        };
        let (y0, y1) = if upper_y {
            (mid.y, self.max.y)
        } else {
            (self.min.y, mid.y)
        };
        let (t0, t1) = if upper_t {
            (mid.t, self.max.t)
        } else {
            (self.min.t, mid.t)
        };
        Self::new(Point3::new(x0, y0, t0), Point3::new(x1, y1, t1))
    }

    /// Split the cube at its center into the eight octants, in slot order.
    pub fn bisect(&self) -> [Self; OCTANT_COUNT] {
        core::array::from_fn(|slot| self.octant(slot))
    }

    /// The first slot whose octant contains `p`, or `None` if `p` is outside.
    ///
    /// Points on a split plane belong to both neighbouring octants; the lower
    /// slot number wins, so insertion and lookup always agree.
    pub fn octant_of(&self, p: Point3) -> Option<usize> {
        if !self.contains(p) {
            return None;
        }
        (0..OCTANT_COUNT).find(|&slot| self.octant(slot).contains(p))
    }
}

pub(crate) fn le<T: PartialOrd>(a: T, b: T) -> bool {
    a.partial_cmp(&b)
        .map(|o| o != Ordering::Greater)
        .unwrap_or(false)
}

pub(crate) fn lt<T: PartialOrd>(a: T, b: T) -> bool {
    a.partial_cmp(&b)
        .map(|o| o == Ordering::Less)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> Cube {
        Cube::new(Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 10.0, 10.0))
    }

    #[test]
    fn contains_is_inclusive_on_every_axis() {
        let c = unit();
        assert!(c.contains(Point3::new(0.0, 0.0, 0.0)));
        assert!(c.contains(Point3::new(10.0, 10.0, 10.0)));
        assert!(c.contains(Point3::new(5.0, 0.0, 10.0)));
        assert!(!c.contains(Point3::new(10.5, 5.0, 5.0)));
        assert!(!c.contains(Point3::new(5.0, -0.1, 5.0)));
        assert!(!c.contains(Point3::new(5.0, 5.0, 10.000_001)));
    }

    #[test]
    fn intersection_is_symmetric() {
        let a = unit();
        let touching = Cube::new(Point3::new(10.0, 10.0, 10.0), Point3::new(20.0, 20.0, 20.0));
        let disjoint_in_time =
            Cube::new(Point3::new(2.0, 2.0, 11.0), Point3::new(3.0, 3.0, 12.0));
        let inside = Cube::new(Point3::new(2.0, 2.0, 2.0), Point3::new(3.0, 3.0, 3.0));
        for other in [touching, disjoint_in_time, inside] {
            assert_eq!(a.intersects(&other), other.intersects(&a));
        }
        assert!(a.intersects(&touching));
        assert!(!a.intersects(&disjoint_in_time));
        assert!(a.intersects(&inside));
    }

    #[test]
    fn bisect_covers_parent_without_gaps() {
        let c = unit();
        let parts = c.bisect();
        for part in &parts {
            assert!(c.contains(part.min) && c.contains(part.max));
            assert_eq!(part.max.x - part.min.x, 5.0);
            assert_eq!(part.max.t - part.min.t, 5.0);
        }
        // The all-low and all-high octants share the parent's corners.
        assert_eq!(parts[2].min, c.min);
        assert_eq!(parts[4].max, c.max);
    }

    #[test]
    fn slot_order_halves_time_first() {
        let c = unit();
        assert_eq!(c.octant_of(Point3::new(1.0, 1.0, 1.0)), Some(2));
        assert_eq!(c.octant_of(Point3::new(9.0, 9.0, 9.0)), Some(4));
        assert_eq!(c.octant_of(Point3::new(9.0, 9.0, 1.0)), Some(0));
        assert_eq!(c.octant_of(Point3::new(1.0, 9.0, 1.0)), Some(1));
        assert_eq!(c.octant_of(Point3::new(9.0, 1.0, 1.0)), Some(3));
        assert_eq!(c.octant_of(Point3::new(1.0, 9.0, 9.0)), Some(5));
        assert_eq!(c.octant_of(Point3::new(1.0, 1.0, 9.0)), Some(6));
        assert_eq!(c.octant_of(Point3::new(9.0, 1.0, 9.0)), Some(7));
    }

    #[test]
    fn split_plane_goes_to_lowest_slot() {
        let c = unit();
        // On the x split plane: slots 0 and 1 both contain it.
        assert_eq!(c.octant_of(Point3::new(5.0, 9.0, 1.0)), Some(0));
        assert_eq!(c.octant_of(c.center()), Some(0));
        assert_eq!(c.octant_of(Point3::new(11.0, 1.0, 1.0)), None);
    }

    #[test]
    fn kurbo_round_trip() {
        let rect = Rect::new(20.0, 10.0, 0.0, 0.0);
        let c = Cube::from_rect(rect, 1.0, 2.0);
        assert_eq!(c.min, Point3::new(0.0, 0.0, 1.0));
        assert_eq!(c.spatial_rect(), Rect::new(0.0, 0.0, 20.0, 10.0));
        assert!(!c.is_empty());
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::{Point2D, Point3D};

/// An axis-aligned bounding box.
///
/// `BoundingBox` is used both as the minimum bounding rectangle (MBR) of tree
/// nodes and entries, and as a query window. Every box carries a z-range; boxes
/// built with [`BoundingBox::new`] are planar and span the whole z axis, so a
/// planar window selects 3D points by their projection onto the xy plane.
///
/// All tests are inclusive: boxes that only touch on an edge overlap, and a
/// point on the boundary is contained.
///
/// # Examples
///
/// ```rust
/// use spatial_index::{BoundingBox, Point2D};
///
/// let window = BoundingBox::new(0.0, 0.0, 15.0, 15.0);
/// assert!(window.contains_point_2d(&Point2D::new(15.0, 0.0)));
/// assert!(window.overlaps(&BoundingBox::new(15.0, 15.0, 20.0, 20.0)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Minimum X coordinate
    pub min_x: f64,
    /// Minimum Y coordinate
    pub min_y: f64,
    /// Maximum X coordinate
    pub max_x: f64,
    /// Maximum Y coordinate
    pub max_y: f64,
    /// Minimum Z coordinate (`-inf` for planar boxes)
    pub min_z: f64,
    /// Maximum Z coordinate (`+inf` for planar boxes)
    pub max_z: f64,
}

impl BoundingBox {
    /// Creates a planar bounding box spanning the whole z axis.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
            min_z: f64::NEG_INFINITY,
            max_z: f64::INFINITY,
        }
    }

    /// Creates a bounding box with explicit z bounds.
    pub fn new_3d(
        min_x: f64,
        min_y: f64,
        min_z: f64,
        max_x: f64,
        max_y: f64,
        max_z: f64,
    ) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
            min_z,
            max_z,
        }
    }

    /// Degenerate planar box around a single 2D point.
    pub fn from_point_2d(p: &Point2D) -> Self {
        Self::new(p.x, p.y, p.x, p.y)
    }

    /// Degenerate box around a single 3D point.
    pub fn from_point_3d(p: &Point3D) -> Self {
        Self::new_3d(p.x, p.y, p.z, p.x, p.y, p.z)
    }

    /// The identity for [`BoundingBox::union`]: contains nothing.
    pub fn empty() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
            min_z: f64::INFINITY,
            max_z: f64::NEG_INFINITY,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y || self.min_z > self.max_z
    }

    /// True when the box spans the whole z axis.
    pub fn is_planar(&self) -> bool {
        self.min_z == f64::NEG_INFINITY && self.max_z == f64::INFINITY
    }

    /// True iff the projections of both boxes intersect on every axis.
    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        !(self.max_x < other.min_x
            || self.min_x > other.max_x
            || self.max_y < other.min_y
            || self.min_y > other.max_y
            || self.max_z < other.min_z
            || self.min_z > other.max_z)
    }

    /// True iff the point lies within the x and y bounds.
    pub fn contains_point_2d(&self, p: &Point2D) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    /// True iff the point lies within all three axis bounds.
    pub fn contains_point_3d(&self, p: &Point3D) -> bool {
        p.x >= self.min_x
            && p.x <= self.max_x
            && p.y >= self.min_y
            && p.y <= self.max_y
            && p.z >= self.min_z
            && p.z <= self.max_z
    }

    /// True iff `other` lies entirely within this box.
    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.min_x
            && self.min_y <= other.min_y
            && self.min_z <= other.min_z
            && self.max_x >= other.max_x
            && self.max_y >= other.max_y
            && self.max_z >= other.max_z
    }

    /// Smallest box enclosing both boxes.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
            min_z: self.min_z.min(other.min_z),
            max_z: self.max_z.max(other.max_z),
        }
    }

    pub fn expand(&mut self, other: &BoundingBox) {
        *self = self.union(other);
    }

    /// Planar area. The tree organizes entries by their xy footprint.
    pub fn area(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        (self.max_x - self.min_x) * (self.max_y - self.min_y)
    }

    /// Area increase needed for this box to also enclose `other`.
    pub fn enlargement(&self, other: &BoundingBox) -> f64 {
        self.union(other).area() - self.area()
    }

    pub fn center(&self) -> Point2D {
        Point2D::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Minimum planar distance from a point to this box; zero when inside.
    pub fn min_distance_2d(&self, p: &Point2D) -> f64 {
        let dx = axis_gap(p.x, self.min_x, self.max_x);
        let dy = axis_gap(p.y, self.min_y, self.max_y);
        (dx * dx + dy * dy).sqrt()
    }

    /// Minimum distance from a 3D point to this box; zero when inside.
    pub fn min_distance_3d(&self, p: &Point3D) -> f64 {
        let dx = axis_gap(p.x, self.min_x, self.max_x);
        let dy = axis_gap(p.y, self.min_y, self.max_y);
        let dz = axis_gap(p.z, self.min_z, self.max_z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Distance from `v` to the interval `[min, max]` along one axis.
fn axis_gap(v: f64, min: f64, max: f64) -> f64 {
    (min - v).max(0.0).max(v - max)
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_planar() {
            write!(
                f,
                "BoundingBox({}, {}, {}, {})",
                self.min_x, self.min_y, self.max_x, self.max_y
            )
        } else {
            write!(
                f,
                "BoundingBox({}, {}, {}, {}, {}, {})",
                self.min_x, self.min_y, self.min_z, self.max_x, self.max_y, self.max_z
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlaps_is_inclusive() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let touching = BoundingBox::new(10.0, 10.0, 20.0, 20.0);
        let apart = BoundingBox::new(10.1, 0.0, 20.0, 10.0);

        assert!(a.overlaps(&touching));
        assert!(touching.overlaps(&a));
        assert!(!a.overlaps(&apart));
    }

    #[test]
    fn test_overlaps_respects_z() {
        let low = BoundingBox::new_3d(0.0, 0.0, 0.0, 1.0, 1.0, 1.0);
        let high = BoundingBox::new_3d(0.0, 0.0, 5.0, 1.0, 1.0, 6.0);
        let planar = BoundingBox::new(0.0, 0.0, 1.0, 1.0);

        assert!(!low.overlaps(&high));
        assert!(planar.overlaps(&low));
        assert!(planar.overlaps(&high));
    }

    #[test]
    fn test_contains_point_boundaries() {
        let b = BoundingBox::new(0.0, 0.0, 15.0, 15.0);
        assert!(b.contains_point_2d(&Point2D::new(0.0, 0.0)));
        assert!(b.contains_point_2d(&Point2D::new(15.0, 15.0)));
        assert!(b.contains_point_2d(&Point2D::new(10.0, 10.0)));
        assert!(!b.contains_point_2d(&Point2D::new(20.0, 20.0)));
        assert!(!b.contains_point_2d(&Point2D::new(-0.0001, 5.0)));
    }

    #[test]
    fn test_contains_point_3d() {
        let b = BoundingBox::new_3d(0.0, 0.0, 0.0, 1.0, 1.0, 1.0);
        assert!(b.contains_point_3d(&Point3D::new(1.0, 1.0, 1.0)));
        assert!(!b.contains_point_3d(&Point3D::new(0.5, 0.5, 1.5)));

        let planar = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        assert!(planar.contains_point_3d(&Point3D::new(0.5, 0.5, 1000.0)));
    }

    #[test]
    fn test_union_and_empty_identity() {
        let a = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let b = BoundingBox::new(2.0, -1.0, 3.0, 0.5);

        assert_eq!(BoundingBox::empty().union(&a), a);
        assert!(BoundingBox::empty().is_empty());

        let u = a.union(&b);
        assert_eq!(u, BoundingBox::new(0.0, -1.0, 3.0, 1.0));
        assert!(u.contains(&a));
        assert!(u.contains(&b));
    }

    #[test]
    fn test_area_and_enlargement() {
        let a = BoundingBox::new(0.0, 0.0, 2.0, 2.0);
        assert_eq!(a.area(), 4.0);
        assert_eq!(a.enlargement(&BoundingBox::new(1.0, 1.0, 1.5, 1.5)), 0.0);
        assert_eq!(a.enlargement(&BoundingBox::new(2.0, 0.0, 4.0, 2.0)), 4.0);
        assert_eq!(BoundingBox::empty().area(), 0.0);
    }

    #[test]
    fn test_min_distance() {
        let b = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(b.min_distance_2d(&Point2D::new(5.0, 5.0)), 0.0);
        assert_eq!(b.min_distance_2d(&Point2D::new(13.0, 14.0)), 5.0);
        assert_eq!(b.min_distance_2d(&Point2D::new(-3.0, 5.0)), 3.0);

        let cube = BoundingBox::new_3d(0.0, 0.0, 0.0, 1.0, 1.0, 1.0);
        assert_eq!(cube.min_distance_3d(&Point3D::new(0.5, 0.5, 3.0)), 2.0);
        assert_eq!(b.min_distance_3d(&Point3D::new(5.0, 5.0, -100.0)), 0.0);
    }

    #[test]
    fn test_display() {
        let b = BoundingBox::new(0.0, 1.0, 2.0, 3.0);
        assert_eq!(b.to_string(), "BoundingBox(0, 1, 2, 3)");
        let c = BoundingBox::new_3d(0.0, 1.0, 2.0, 3.0, 4.0, 5.0);
        assert_eq!(c.to_string(), "BoundingBox(0, 1, 2, 3, 4, 5)");
    }
}

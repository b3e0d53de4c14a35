//! Geometry primitives stored in and returned by the indexes.
//!
//! Points are plain coordinate tuples with no identity beyond their
//! coordinates. A polygon is indexed by its MBR only; the engine keeps its
//! vertices so queries can hand the shape back, but it never evaluates exact
//! point-in-polygon containment.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::bounding_box::BoundingBox;
use crate::errors::{SpatialError, SpatialResult};

/// A 2D point (x, y).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Calculates the Euclidean distance to another point.
    pub fn distance(&self, other: &Point2D) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f64, f64)> for Point2D {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

impl Display for Point2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A 3D point (x, y, z).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3D {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Calculates the Euclidean distance to another point.
    pub fn distance(&self, other: &Point3D) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Projection onto the xy plane.
    pub fn to_2d(&self) -> Point2D {
        Point2D::new(self.x, self.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl From<(f64, f64, f64)> for Point3D {
    fn from((x, y, z): (f64, f64, f64)) -> Self {
        Self::new(x, y, z)
    }
}

impl Display for Point3D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Euclidean distance between two 2D points.
pub fn distance_2d(a: &Point2D, b: &Point2D) -> f64 {
    a.distance(b)
}

/// Euclidean distance between two 3D points.
pub fn distance_3d(a: &Point3D, b: &Point3D) -> f64 {
    a.distance(b)
}

/// A simple polygon given by its ordered vertices.
///
/// ## Example
///
/// ```rust
/// use spatial_index::{Point2D, Polygon};
///
/// let triangle = Polygon::new(vec![
///     Point2D::new(10.0, 10.0),
///     Point2D::new(30.0, 10.0),
///     Point2D::new(20.0, 30.0),
/// ])
/// .unwrap();
/// assert_eq!(triangle.bounding_box().max_y, 30.0);
///
/// assert!(Polygon::new(vec![Point2D::new(0.0, 0.0), Point2D::new(1.0, 1.0)]).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    vertices: Vec<Point2D>,
    mbr: BoundingBox,
}

impl Polygon {
    /// Creates a polygon, failing with `InvalidGeometry` when fewer than three
    /// vertices are supplied or any coordinate is non-finite.
    pub fn new(vertices: Vec<Point2D>) -> SpatialResult<Self> {
        if vertices.len() < 3 {
            return Err(SpatialError::invalid_geometry(format!(
                "polygon needs at least 3 vertices, got {}",
                vertices.len()
            )));
        }
        if let Some(bad) = vertices.iter().find(|v| !v.is_finite()) {
            return Err(SpatialError::invalid_geometry(format!(
                "polygon vertex {} is not finite",
                bad
            )));
        }

        let mbr = vertices
            .iter()
            .fold(BoundingBox::empty(), |acc, v| acc.union(&BoundingBox::from_point_2d(v)));

        Ok(Self { vertices, mbr })
    }

    pub fn vertices(&self) -> &[Point2D] {
        &self.vertices
    }

    /// Componentwise min/max of the vertices.
    pub fn bounding_box(&self) -> BoundingBox {
        self.mbr
    }

    /// Recomputes the MBR from the vertices. Used to validate decoded data.
    pub(crate) fn computed_bounding_box(&self) -> BoundingBox {
        self.vertices
            .iter()
            .fold(BoundingBox::empty(), |acc, v| acc.union(&BoundingBox::from_point_2d(v)))
    }
}

impl Display for Polygon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "POLYGON(")?;
        for (i, v) in self.vertices.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} {}", v.x, v.y)?;
        }
        write!(f, ")")
    }
}

/// Everything an index can hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Point2D(Point2D),
    Point3D(Point3D),
    Polygon(Polygon),
}

impl Geometry {
    pub fn bounding_box(&self) -> BoundingBox {
        match self {
            Geometry::Point2D(p) => BoundingBox::from_point_2d(p),
            Geometry::Point3D(p) => BoundingBox::from_point_3d(p),
            Geometry::Polygon(poly) => poly.bounding_box(),
        }
    }

    /// Whether this geometry is reported by a planar window query.
    ///
    /// Points must lie inside the window; a polygon matches when its MBR
    /// overlaps it.
    pub fn matches_window(&self, window: &BoundingBox) -> bool {
        match self {
            Geometry::Point2D(p) => window.contains_point_2d(p),
            Geometry::Point3D(p) => window.contains_point_2d(&p.to_2d()),
            Geometry::Polygon(poly) => {
                let mbr = poly.bounding_box();
                mbr.min_x <= window.max_x
                    && mbr.max_x >= window.min_x
                    && mbr.min_y <= window.max_y
                    && mbr.max_y >= window.min_y
            }
        }
    }

    /// Planar distance from `query`. 3D points are measured by their
    /// projection, polygons by their MBR.
    pub fn distance_2d(&self, query: &Point2D) -> f64 {
        match self {
            Geometry::Point2D(p) => p.distance(query),
            Geometry::Point3D(p) => p.to_2d().distance(query),
            Geometry::Polygon(poly) => poly.bounding_box().min_distance_2d(query),
        }
    }

    /// Spatial distance from `query`; only 3D points have one.
    pub fn distance_3d(&self, query: &Point3D) -> Option<f64> {
        match self {
            Geometry::Point3D(p) => Some(p.distance(query)),
            _ => None,
        }
    }

    pub fn is_point(&self) -> bool {
        matches!(self, Geometry::Point2D(_) | Geometry::Point3D(_))
    }

    pub fn as_point_2d(&self) -> Option<&Point2D> {
        match self {
            Geometry::Point2D(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_point_3d(&self) -> Option<&Point3D> {
        match self {
            Geometry::Point3D(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_polygon(&self) -> Option<&Polygon> {
        match self {
            Geometry::Polygon(p) => Some(p),
            _ => None,
        }
    }
}

impl From<Point2D> for Geometry {
    fn from(p: Point2D) -> Self {
        Geometry::Point2D(p)
    }
}

impl From<Point3D> for Geometry {
    fn from(p: Point3D) -> Self {
        Geometry::Point3D(p)
    }
}

impl From<Polygon> for Geometry {
    fn from(p: Polygon) -> Self {
        Geometry::Polygon(p)
    }
}

impl Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Geometry::Point2D(p) => write!(f, "POINT{}", p),
            Geometry::Point3D(p) => write!(f, "POINT Z{}", p),
            Geometry::Polygon(p) => write!(f, "{}", p),
        }
    }
}

/// Rejects a batch of 2D points if any coordinate is non-finite.
pub(crate) fn validate_points_2d(points: &[Point2D]) -> SpatialResult<()> {
    match points.iter().position(|p| !p.is_finite()) {
        Some(i) => Err(SpatialError::invalid_geometry(format!(
            "point #{} {} is not finite",
            i, points[i]
        ))),
        None => Ok(()),
    }
}

/// Rejects a batch of 3D points if any coordinate is non-finite.
pub(crate) fn validate_points_3d(points: &[Point3D]) -> SpatialResult<()> {
    match points.iter().position(|p| !p.is_finite()) {
        Some(i) => Err(SpatialError::invalid_geometry(format!(
            "point #{} {} is not finite",
            i, points[i]
        ))),
        None => Ok(()),
    }
}

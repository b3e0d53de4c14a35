//! Read-only introspection shared by all index variants.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::Geometry;

/// Snapshot of an index's shape and contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Variant name: `grid`, `rtree` or `disk-rtree`
    pub kind: String,
    /// Tree nodes, or occupied cells for the grid
    pub node_count: u64,
    /// Stored geometries of every kind
    pub entry_count: u64,
    /// Levels from root to leaves; 0 when empty
    pub height: u32,
    /// Stored 2D and 3D points
    pub point_count: u64,
    pub point_2d_count: u64,
    pub point_3d_count: u64,
    pub polygon_count: u64,
    /// Used slots over available slots across all nodes, in `[0, 1]`
    pub fill_factor: f64,
    /// Node cache counters, present for the disk variant only
    pub cache: Option<CacheStats>,
}

/// Node cache and I/O counters of a disk-backed index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub cached_nodes: u64,
    pub cache_capacity: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub disk_reads: u64,
    pub disk_writes: u64,
}

impl CacheStats {
    /// Fraction of node reads served from memory.
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

/// Per-kind entry counters kept by every variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct EntryCounts {
    pub point_2d: u64,
    pub point_3d: u64,
    pub polygon: u64,
}

impl EntryCounts {
    pub fn total(&self) -> u64 {
        self.point_2d + self.point_3d + self.polygon
    }

    pub fn points(&self) -> u64 {
        self.point_2d + self.point_3d
    }

    pub fn record(&mut self, geometry: &Geometry) {
        match geometry {
            Geometry::Point2D(_) => self.point_2d += 1,
            Geometry::Point3D(_) => self.point_3d += 1,
            Geometry::Polygon(_) => self.polygon += 1,
        }
    }
}

impl fmt::Display for IndexStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Index: {}", self.kind)?;
        writeln!(f, "Nodes: {}", self.node_count)?;
        writeln!(f, "Entries: {}", self.entry_count)?;
        writeln!(f, "Height: {}", self.height)?;
        writeln!(f, "2D Points: {}", self.point_2d_count)?;
        writeln!(f, "3D Points: {}", self.point_3d_count)?;
        writeln!(f, "Polygons: {}", self.polygon_count)?;
        write!(f, "Fill Factor: {:.1}%", self.fill_factor * 100.0)?;
        if let Some(cache) = &self.cache {
            writeln!(f)?;
            writeln!(f, "Cached Nodes: {}/{}", cache.cached_nodes, cache.cache_capacity)?;
            writeln!(f, "Disk Reads: {}", cache.disk_reads)?;
            writeln!(f, "Disk Writes: {}", cache.disk_writes)?;
            write!(f, "Cache Hit Rate: {:.1}%", cache.hit_rate() * 100.0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point2D, Point3D};

    fn sample() -> IndexStats {
        IndexStats {
            kind: "rtree".into(),
            node_count: 3,
            entry_count: 5,
            height: 2,
            point_count: 5,
            point_2d_count: 4,
            point_3d_count: 1,
            polygon_count: 0,
            fill_factor: 0.5,
            cache: None,
        }
    }

    #[test]
    fn test_entry_counts() {
        let mut counts = EntryCounts::default();
        counts.record(&Geometry::Point2D(Point2D::new(0.0, 0.0)));
        counts.record(&Geometry::Point3D(Point3D::new(0.0, 0.0, 0.0)));
        counts.record(&Geometry::Point2D(Point2D::new(1.0, 0.0)));
        assert_eq!(counts.total(), 3);
        assert_eq!(counts.points(), 3);
        assert_eq!(counts.point_2d, 2);
    }

    #[test]
    fn test_hit_rate() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
        let cache = CacheStats {
            cache_hits: 3,
            cache_misses: 1,
            ..Default::default()
        };
        assert_eq!(cache.hit_rate(), 0.75);
    }

    #[test]
    fn test_stats_serialize_to_json() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["kind"], "rtree");
        assert_eq!(json["node_count"], 3);
        assert_eq!(json["height"], 2);
        assert!(json["cache"].is_null());
    }

    #[test]
    fn test_display_includes_cache_section() {
        let mut stats = sample();
        assert!(!stats.to_string().contains("Disk Reads"));

        stats.kind = "disk-rtree".into();
        stats.cache = Some(CacheStats {
            cached_nodes: 2,
            cache_capacity: 8,
            disk_reads: 4,
            ..Default::default()
        });
        let text = stats.to_string();
        assert!(text.contains("Cached Nodes: 2/8"));
        assert!(text.contains("Disk Reads: 4"));
    }
}

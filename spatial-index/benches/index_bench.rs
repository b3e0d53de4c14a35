//! Index benchmarks

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use spatial_index::{
    construct, BoundingBox, IndexConfig, IndexHandle, IndexKind, Point2D, SpatialIndex,
};
use std::hint::black_box;
use tempfile::tempdir;

fn grid_points(size: usize) -> Vec<Point2D> {
    (0..size)
        .map(|i| Point2D::new((i % 100) as f64, (i / 100) as f64))
        .collect()
}

fn populated(kind: IndexKind, size: usize) -> IndexHandle {
    let mut index = construct(kind, &IndexConfig::default()).unwrap();
    index.insert_2d(&grid_points(size)).unwrap();
    index
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("Insert");

    for size in [100, 1000, 10000].iter() {
        for name in ["grid", "rtree", "disk-rtree"] {
            group.bench_with_input(BenchmarkId::new(name, size), size, |b, &size| {
                let points = grid_points(size);
                b.iter_with_setup(
                    || {
                        let dir = tempdir().unwrap();
                        let kind = match name {
                            "grid" => IndexKind::Grid,
                            "rtree" => IndexKind::RTree,
                            _ => IndexKind::DiskRTree {
                                path: dir.path().join("bench.sidx"),
                            },
                        };
                        (construct(kind, &IndexConfig::default()).unwrap(), dir)
                    },
                    |(mut index, _dir)| {
                        index.insert_2d(&points).unwrap();
                        black_box(index.len())
                    },
                );
            });
        }
    }

    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("Query 10k");

    let dir = tempdir().unwrap();
    let indexes = vec![
        ("grid", populated(IndexKind::Grid, 10000)),
        ("rtree", populated(IndexKind::RTree, 10000)),
        (
            "disk-rtree",
            populated(
                IndexKind::DiskRTree {
                    path: dir.path().join("bench.sidx"),
                },
                10000,
            ),
        ),
    ];

    for (name, index) in &indexes {
        group.bench_function(format!("range_{}", name), |b| {
            b.iter(|| {
                let window = BoundingBox::new(25.0, 25.0, 75.0, 75.0);
                black_box(index.range_query_2d(&window).unwrap())
            });
        });

        group.bench_function(format!("knn10_{}", name), |b| {
            b.iter(|| black_box(index.knn_query_2d(Point2D::new(50.5, 50.5), 10).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_insert, bench_queries);
criterion_main!(benches);

//! Randomized checks of query results against a linear scan.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use spatial_index::{
    BoundingBox, GridIndex, IndexConfig, Point2D, Polygon, RTree, SpatialIndex,
};
use spatial_index_int_test::test_util::{
    cleanup, create_test_context, point_keys, random_points_2d, run_test,
};

#[ctor::ctor]
fn init() {
    colog::init();
}

fn random_window(rng: &mut StdRng, extent: f64) -> BoundingBox {
    let x = rng.gen_range(-extent..extent);
    let y = rng.gen_range(-extent..extent);
    let w = rng.gen_range(0.0..extent);
    let h = rng.gen_range(0.0..extent);
    BoundingBox::new(x, y, x + w, y + h)
}

fn inside(window: &BoundingBox, p: &Point2D) -> bool {
    p.x >= window.min_x && p.x <= window.max_x && p.y >= window.min_y && p.y <= window.max_y
}

#[test]
fn test_range_queries_match_linear_scan() {
    run_test(
        || create_test_context(),
        |ctx| {
            let points = random_points_2d(11, 3000, 500.0);
            let mut rng = StdRng::seed_from_u64(12);

            for kind in ctx.all_kinds("range_scan") {
                let mut index = ctx.open(kind, &IndexConfig::default().capacity(7).cell_size(25.0))?;
                index.insert_2d(&points)?;

                for _ in 0..50 {
                    let window = random_window(&mut rng, 500.0);
                    let expected: Vec<Point2D> =
                        points.iter().filter(|p| inside(&window, p)).copied().collect();
                    let found: Vec<Point2D> = index
                        .range_query_2d(&window)?
                        .iter()
                        .filter_map(|g| g.as_point_2d().copied())
                        .collect();
                    assert_eq!(point_keys(&found), point_keys(&expected));
                }
                index.flush()?;
            }
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_window_edges_are_inclusive() {
    run_test(
        || create_test_context(),
        |ctx| {
            let points: Vec<Point2D> = (0..10)
                .flat_map(|x| (0..10).map(move |y| Point2D::new(x as f64, y as f64)))
                .collect();

            for kind in ctx.all_kinds("edges") {
                let mut index = ctx.open(kind, &IndexConfig::default().capacity(4).cell_size(3.0))?;
                index.insert_2d(&points)?;

                // Corners and edges of the window sit exactly on grid points.
                let hits = index.range_query_2d(&BoundingBox::new(2.0, 3.0, 5.0, 7.0))?;
                assert_eq!(hits.len(), 4 * 5);

                let point = index.range_query_2d(&BoundingBox::new(9.0, 9.0, 9.0, 9.0))?;
                assert_eq!(point.len(), 1);

                let gap = index.range_query_2d(&BoundingBox::new(2.1, 2.1, 2.9, 2.9))?;
                assert!(gap.is_empty());
                index.flush()?;
            }
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_knn_matches_brute_force() {
    run_test(
        || create_test_context(),
        |ctx| {
            let points = random_points_2d(21, 2000, 300.0);
            let queries = random_points_2d(22, 40, 400.0);

            for kind in ctx.all_kinds("knn_scan") {
                let mut index = ctx.open(kind, &IndexConfig::default().capacity(9).cell_size(15.0))?;
                index.insert_2d(&points)?;

                for (i, q) in queries.iter().enumerate() {
                    let k = 1 + i % 12;
                    let result = index.knn_query_2d(*q, k)?;
                    assert_eq!(result.len(), k);
                    assert!(result.windows(2).all(|w| w[0].1 <= w[1].1));

                    let mut brute: Vec<f64> = points.iter().map(|p| p.distance(q)).collect();
                    brute.sort_by(f64::total_cmp);
                    let distances: Vec<f64> = result.iter().map(|(_, d)| *d).collect();
                    assert_eq!(distances, brute[..k].to_vec());
                }
                index.flush()?;
            }
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_knn_returns_everything_when_k_exceeds_size() {
    run_test(
        || create_test_context(),
        |ctx| {
            for kind in ctx.all_kinds("small") {
                let mut index = ctx.open(kind, &IndexConfig::default())?;
                index.insert_2d(&random_points_2d(31, 5, 10.0))?;
                assert_eq!(index.knn_query_2d(Point2D::new(0.0, 0.0), 50)?.len(), 5);
                assert!(index.knn_query_2d(Point2D::new(0.0, 0.0), 0)?.is_empty());
                index.flush()?;
            }
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_tree_shape_holds_under_mixed_inserts() {
    run_test(
        || create_test_context(),
        |_ctx| {
            let mut rng = StdRng::seed_from_u64(41);
            for capacity in [2, 3, 5, 8, 13] {
                let mut tree = RTree::new(capacity)?;
                for round in 0..30 {
                    let batch = random_points_2d(round, rng.gen_range(1..40), 200.0);
                    tree.insert_points_2d(&batch)?;

                    let x = rng.gen_range(-200.0..200.0);
                    let y = rng.gen_range(-200.0..200.0);
                    tree.insert_polygon(Polygon::new(vec![
                        Point2D::new(x, y),
                        Point2D::new(x + rng.gen_range(0.1..20.0), y),
                        Point2D::new(x, y + rng.gen_range(0.1..20.0)),
                    ])?)?;
                    tree.check_invariants()?;
                }
            }
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_wide_polygons_in_grid() {
    run_test(
        || create_test_context(),
        |_ctx| {
            let mut grid = GridIndex::new(1.0)?;
            // Far larger than any sensible number of cells.
            grid.insert_polygon(Polygon::new(vec![
                Point2D::new(-1e6, -1e6),
                Point2D::new(1e6, -1e6),
                Point2D::new(0.0, 1e6),
            ])?)?;
            grid.insert_points_2d(&[Point2D::new(0.5, 0.5)])?;

            let hits = grid.range_query(&BoundingBox::new(0.0, 0.0, 1.0, 1.0));
            assert_eq!(hits.len(), 2);
            assert_eq!(grid.range_query_polygons(&BoundingBox::new(5e5, 5e5, 6e5, 6e5)).len(), 1);

            let nearest = grid.nearest_2d(&Point2D::new(100.0, 100.0), 1)?;
            assert_eq!(nearest[0].1, 0.0);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

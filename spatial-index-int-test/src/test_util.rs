use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use spatial_index::{
    construct, BoundingBox, IndexConfig, IndexHandle, IndexKind, Point2D, Point3D, SpatialResult,
};
use std::backtrace::Backtrace;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;
use tempfile::TempDir;

/// Runs a test between its setup and teardown steps.
///
/// `after` runs even when the test fails. Failures and panics are reported
/// with the elapsed time before the test is failed.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> SpatialResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> SpatialResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> SpatialResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    let start_time = Instant::now();

    let result = std::panic::catch_unwind(|| {
        let backtrace = Backtrace::capture();
        match before() {
            Ok(ctx) => match test(ctx.clone()) {
                Ok(_) => after(ctx)
                    .map_err(|e| (format!("After run failed: {:?}", e), backtrace.to_string())),
                Err(e) => {
                    let _ = after(ctx);
                    Err((format!("Test failed: {:?}", e), backtrace.to_string()))
                }
            },
            Err(e) => Err((format!("Before run failed: {:?}", e), backtrace.to_string())),
        }
    });

    let elapsed = start_time.elapsed();
    let (error, backtrace) = match result {
        Ok(Ok(_)) => return,
        Ok(Err((e, bt))) => (e, bt),
        Err(panic_err) => {
            let err_msg = if let Some(s) = panic_err.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_err.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };
            (format!("Panic: {}", err_msg), String::new())
        }
    };

    log::error!("Test failed after {:?}: {}", elapsed, error);
    if !backtrace.is_empty() && !backtrace.contains("disabled") {
        log::error!("Backtrace:\n{}", backtrace);
    }

    panic!("Test failed: {}", error);
}

/// Scratch directory shared by one test's setup, body and teardown.
///
/// The directory is removed when the last clone is dropped.
#[derive(Clone)]
pub struct TestContext {
    dir: Rc<TempDir>,
}

impl TestContext {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of an index file inside the scratch directory.
    pub fn index_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(format!("{}.sidx", name))
    }

    /// Every index kind, the disk one backed by `name` in the scratch
    /// directory.
    pub fn all_kinds(&self, name: &str) -> Vec<IndexKind> {
        vec![
            IndexKind::Grid,
            IndexKind::RTree,
            IndexKind::DiskRTree {
                path: self.index_path(name),
            },
        ]
    }

    pub fn open(&self, kind: IndexKind, config: &IndexConfig) -> SpatialResult<IndexHandle> {
        construct(kind, config)
    }
}

pub fn create_test_context() -> SpatialResult<TestContext> {
    let dir = tempfile::Builder::new().prefix("spatial_index_").tempdir()?;
    Ok(TestContext { dir: Rc::new(dir) })
}

pub fn cleanup(ctx: TestContext) -> SpatialResult<()> {
    if let Ok(dir) = Rc::try_unwrap(ctx.dir) {
        if let Err(e) = dir.close() {
            log::warn!("Failed to remove test directory: {:?}", e);
        }
    }
    Ok(())
}

pub fn random_points_2d(seed: u64, count: usize, extent: f64) -> Vec<Point2D> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| Point2D::new(rng.gen_range(-extent..extent), rng.gen_range(-extent..extent)))
        .collect()
}

pub fn random_points_3d(seed: u64, count: usize, extent: f64) -> Vec<Point3D> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            Point3D::new(
                rng.gen_range(-extent..extent),
                rng.gen_range(-extent..extent),
                rng.gen_range(-extent..extent),
            )
        })
        .collect()
}

/// A window that covers every generated coordinate.
pub fn full_domain() -> BoundingBox {
    BoundingBox::new(-1e9, -1e9, 1e9, 1e9)
}

/// Bit patterns of planar points, for set comparisons.
pub fn point_keys<'a>(points: impl IntoIterator<Item = &'a Point2D>) -> Vec<(u64, u64)> {
    let mut keys: Vec<(u64, u64)> = points
        .into_iter()
        .map(|p| (p.x.to_bits(), p.y.to_bits()))
        .collect();
    keys.sort_unstable();
    keys
}

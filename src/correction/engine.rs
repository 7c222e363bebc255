use super::units::PixelParameters;
use crate::error::Result;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Memory-mapped files produced by one correction call, one per input file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrectionOutput {
    pub mmap_files: Vec<PathBuf>,
}

/// External motion-correction engine with a worker pool lifecycle.
pub trait CorrectionEngine {
    fn start_pool(&mut self, processes: usize) -> Result<()>;

    fn correct(&mut self, files: &[PathBuf], params: &PixelParameters) -> Result<CorrectionOutput>;

    fn stop_pool(&mut self) -> Result<()>;
}

/// Running worker pool; stopped by `stop` or, on any early return, by `Drop`.
pub struct PoolGuard<'a, E: CorrectionEngine + ?Sized> {
    engine: &'a mut E,
    running: bool,
}

impl<'a, E: CorrectionEngine + ?Sized> PoolGuard<'a, E> {
    pub fn start(engine: &'a mut E, processes: usize) -> Result<Self> {
        engine.start_pool(processes)?;
        debug!("Engine pool started with {} process(es)", processes);
        Ok(Self {
            engine,
            running: true,
        })
    }

    pub fn correct(
        &mut self,
        files: &[PathBuf],
        params: &PixelParameters,
    ) -> Result<CorrectionOutput> {
        self.engine.correct(files, params)
    }

    /// Stop the pool and report teardown failures
    pub fn stop(mut self) -> Result<()> {
        self.running = false;
        self.engine.stop_pool()
    }
}

impl<E: CorrectionEngine + ?Sized> Drop for PoolGuard<'_, E> {
    fn drop(&mut self) {
        if self.running {
            debug!("Stopping engine pool after an interrupted run");
            if let Err(e) = self.engine.stop_pool() {
                warn!("Failed to stop engine pool: {}", e);
            }
        }
    }
}

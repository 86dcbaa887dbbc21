use crossbeam_channel::{RecvTimeoutError, bounded};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::{EngineError, Reducer, ReductionEngine};
use crate::raster::Raster;
use crate::region::Region;

/// One blocking round trip to the reduction engine.
#[derive(Debug, Clone)]
pub enum PullJob {
    Reduce {
        region: Arc<Region>,
        raster: Arc<Raster>,
        reducer: Reducer,
        scale_m: f64,
    },
    PixelCount {
        region: Arc<Region>,
        scale_m: f64,
    },
}

impl PullJob {
    fn run(&self, engine: &dyn ReductionEngine) -> Result<Option<f64>, EngineError> {
        match self {
            PullJob::Reduce {
                region,
                raster,
                reducer,
                scale_m,
            } => engine.reduce(region, raster, *reducer, *scale_m),
            PullJob::PixelCount { region, scale_m } => engine
                .pixel_count(region, *scale_m)
                .map(|count| Some(count as f64)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Per attempt deadline. `None` runs the pull on the calling thread.
    pub timeout: Option<Duration>,
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            max_retries: 3,
            initial_backoff: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

fn attempt(
    engine: &Arc<dyn ReductionEngine>,
    job: &PullJob,
    timeout: Option<Duration>,
) -> Result<Option<f64>, EngineError> {
    let Some(timeout) = timeout else {
        return job.run(engine.as_ref());
    };

    let (tx, rx) = bounded(1);
    let engine = Arc::clone(engine);
    let worker_job = job.clone();

    // A timed out worker is abandoned; its late result is dropped with the channel.
    thread::Builder::new()
        .name("hydrosight-pull".to_owned())
        .spawn(move || {
            let _ = tx.send(worker_job.run(engine.as_ref()));
        })
        .map_err(|e| EngineError::Unavailable(format!("failed to spawn pull worker: {}", e)))?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(EngineError::Timeout(timeout)),
        Err(RecvTimeoutError::Disconnected) => Err(EngineError::WorkerLost),
    }
}

/// Runs `job`, retrying transient failures with exponential backoff.
pub fn pull(
    engine: &Arc<dyn ReductionEngine>,
    job: &PullJob,
    policy: &RetryPolicy,
) -> Result<Option<f64>, EngineError> {
    let mut tries = 0;
    loop {
        match attempt(engine, job, policy.timeout) {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && tries < policy.max_retries => {
                let wait = policy.backoff(tries);
                log::warn!(
                    "Pull failed ({}), retry {}/{} in {:?}",
                    e,
                    tries + 1,
                    policy.max_retries,
                    wait
                );
                thread::sleep(wait);
                tries += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

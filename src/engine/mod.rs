//! Raster reduction engine.
//!
//! The engine is the only blocking collaborator of the pipeline: every
//! scalar value or coverage fraction is "pulled" from it. `LocalEngine`
//! evaluates reductions in-process on the region grid; remote engines
//! implement the same trait.

use std::time::Duration;
use thiserror::Error;

use crate::raster::Raster;
use crate::region::Region;

pub mod pull;

pub use pull::{PullJob, RetryPolicy, pull};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    Mean,
    Median,
    Mode,
    Count,
    Sum,
}

impl Reducer {
    /// Reduces a list of valid (non `NaN`) values.
    pub fn apply(self, mut values: Vec<f64>) -> Option<f64> {
        match self {
            Reducer::Count => return Some(values.len() as f64),
            Reducer::Sum => return Some(values.iter().sum()),
            _ => {}
        }

        if values.is_empty() {
            return None;
        }

        match self {
            Reducer::Mean => Some(values.iter().sum::<f64>() / values.len() as f64),
            Reducer::Median => {
                values.sort_by(f64::total_cmp);
                let mid = values.len() / 2;
                if values.len() % 2 == 0 {
                    Some((values[mid - 1] + values[mid]) / 2.0)
                } else {
                    Some(values[mid])
                }
            }
            Reducer::Mode => {
                // Ties resolve to the smallest value.
                values.sort_by(f64::total_cmp);
                let mut best = (values[0], 0usize);
                let mut run = (values[0], 0usize);
                for &v in &values {
                    if v == run.0 {
                        run.1 += 1;
                    } else {
                        run = (v, 1);
                    }
                    if run.1 > best.1 {
                        best = run;
                    }
                }
                Some(best.0)
            }
            Reducer::Count | Reducer::Sum => None,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("reduction timed out after {0:?}")]
    Timeout(Duration),

    #[error("engine unavailable: {0}")]
    Unavailable(String),

    #[error("engine quota exceeded: {0}")]
    Quota(String),

    #[error("raster grid {actual:?} does not match region grid {expected:?}")]
    GridMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("reduction needs {requested} pixels, budget is {budget}")]
    TooManyPixels { requested: f64, budget: f64 },

    #[error("invalid reduction scale: {0}")]
    InvalidScale(f64),

    #[error("reduction worker terminated unexpectedly")]
    WorkerLost,
}

impl EngineError {
    /// Errors worth retrying: the same read-only pull may succeed later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::Timeout(_) | EngineError::Unavailable(_) | EngineError::Quota(_)
        )
    }
}

pub trait ReductionEngine: Send + Sync {
    fn reduce(
        &self,
        region: &Region,
        raster: &Raster,
        reducer: Reducer,
        scale_m: f64,
    ) -> Result<Option<f64>, EngineError>;

    fn pixel_count(&self, region: &Region, scale_m: f64) -> Result<usize, EngineError>;
}

/// Evaluates reductions on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalEngine;

impl ReductionEngine for LocalEngine {
    fn reduce(
        &self,
        region: &Region,
        raster: &Raster,
        reducer: Reducer,
        scale_m: f64,
    ) -> Result<Option<f64>, EngineError> {
        region.reduce(raster, reducer, scale_m)
    }

    fn pixel_count(&self, region: &Region, scale_m: f64) -> Result<usize, EngineError> {
        region.pixel_count(scale_m)
    }
}

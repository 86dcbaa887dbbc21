//! Temporal aggregation of index rasters into scalar time series points.
//!
//! Aggregation is split into a pure planning step, which turns a bucket
//! into the list of blocking pulls it needs, and a resolution step, which
//! turns the pull results back into an [`AggregateResult`]. The pipeline
//! runs the pulls of all buckets and indicators in between.

use serde::Serialize;
use std::sync::Arc;

use crate::config::{AggregationMode, CompositeReducer, Config};
use crate::engine::{EngineError, PullJob, Reducer};
use crate::indices::Indicator;
use crate::raster::Raster;
use crate::region::Region;
use crate::water_mask::per_pixel;

pub mod buckets;

pub use buckets::{Period, TemporalBucket, annual_bucket, assign, monthly_buckets, year_range};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "LOW_COVERAGE")]
    LowCoverage,
    #[serde(rename = "NO_DATA")]
    NoData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    pub period: Period,
    pub value: Option<f64>,
    pub coverage_pct: f64,
    pub status: Status,
}

impl AggregateResult {
    pub fn no_data(period: Period) -> Self {
        Self {
            period,
            value: None,
            coverage_pct: 0.0,
            status: Status::NoData,
        }
    }
}

/// Aggregation settings of a request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregationPolicy {
    pub mode: AggregationMode,
    pub composite_reducer: CompositeReducer,
    pub min_scenes: usize,
    pub coverage_threshold_pct: f64,
    pub scale_m: f64,
}

impl Default for AggregationPolicy {
    fn default() -> Self {
        Self {
            mode: AggregationMode::Composite,
            composite_reducer: CompositeReducer::Mean,
            min_scenes: 1,
            coverage_threshold_pct: 20.0,
            scale_m: 20.0,
        }
    }
}

impl From<&Config> for AggregationPolicy {
    fn from(config: &Config) -> Self {
        Self {
            mode: config.aggregation,
            composite_reducer: config.composite_reducer,
            min_scenes: config.min_scenes,
            coverage_threshold_pct: config.coverage_threshold_pct,
            scale_m: config.scale_m,
        }
    }
}

/// Percentage rounded to two decimals.
pub fn round_pct(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn status(coverage_pct: f64, threshold_pct: f64) -> Status {
    if coverage_pct >= threshold_pct {
        Status::Ok
    } else {
        Status::LowCoverage
    }
}

/// Pulls needed to aggregate one bucket of one indicator.
#[derive(Debug, Clone)]
pub struct Plan {
    pub indicator: Indicator,
    pub period: Period,
    kind: PlanKind,
}

#[derive(Debug, Clone)]
enum PlanKind {
    NoData,
    Pull {
        /// One job in composite mode, one per scene in scene-wise mode.
        values: Vec<PullJob>,
        /// Reduction of the per-scene scalars.
        combine: Reducer,
        valid: PullJob,
        total: PullJob,
        threshold_pct: f64,
    },
}

impl AggregationPolicy {
    /// Builds the pulls for one bucket. Pure, nothing blocks here.
    pub fn plan(&self, indicator: Indicator, bucket: TemporalBucket, region: &Arc<Region>) -> Plan {
        let period = bucket.period;
        let bucket = bucket.sorted();

        if bucket.scenes.is_empty() || bucket.scenes.len() < self.min_scenes {
            return Plan {
                indicator,
                period,
                kind: PlanKind::NoData,
            };
        }

        let spatial = if indicator.is_ordinal() {
            Reducer::Mode
        } else {
            Reducer::Mean
        };
        let reduce = |raster: Arc<Raster>, reducer: Reducer| PullJob::Reduce {
            region: Arc::clone(region),
            raster,
            reducer,
            scale_m: self.scale_m,
        };

        let (values, coverage_raster) = match self.mode {
            AggregationMode::Composite => {
                let per_pixel_reducer = if indicator.is_ordinal() {
                    Reducer::Mode
                } else {
                    self.composite_reducer.reducer()
                };
                let stack: Vec<&Raster> = bucket.scenes.iter().map(|s| &s.raster).collect();
                let composite = Arc::new(per_pixel(&stack, per_pixel_reducer));
                (
                    vec![reduce(Arc::clone(&composite), spatial)],
                    composite,
                )
            }
            AggregationMode::SceneWise => {
                let rasters: Vec<Arc<Raster>> = bucket
                    .scenes
                    .iter()
                    .map(|s| Arc::new(s.raster.clone()))
                    .collect();
                // Most recent scene with at least one valid pixel
                let latest = rasters
                    .iter()
                    .rev()
                    .find(|r| r.valid_count() > 0)
                    .or_else(|| rasters.last())
                    .map(Arc::clone)
                    .unwrap_or_else(|| Arc::new(region.blank_raster(f64::NAN)));
                (
                    rasters.into_iter().map(|r| reduce(r, spatial)).collect(),
                    latest,
                )
            }
        };

        Plan {
            indicator,
            period,
            kind: PlanKind::Pull {
                values,
                combine: spatial,
                valid: reduce(coverage_raster, Reducer::Count),
                total: PullJob::PixelCount {
                    region: Arc::clone(region),
                    scale_m: self.scale_m,
                },
                threshold_pct: self.coverage_threshold_pct,
            },
        }
    }
}

impl Plan {
    /// Jobs in the order `resolve` expects their results.
    pub fn jobs(&self) -> Vec<PullJob> {
        match &self.kind {
            PlanKind::NoData => Vec::new(),
            PlanKind::Pull {
                values,
                valid,
                total,
                ..
            } => {
                let mut jobs = values.clone();
                jobs.push(valid.clone());
                jobs.push(total.clone());
                jobs
            }
        }
    }

    pub fn resolve(&self, results: &[Result<Option<f64>, EngineError>]) -> AggregateResult {
        let PlanKind::Pull {
            values,
            combine,
            threshold_pct,
            ..
        } = &self.kind
        else {
            return AggregateResult::no_data(self.period);
        };

        let failed = AggregateResult {
            period: self.period,
            value: None,
            coverage_pct: 0.0,
            status: Status::LowCoverage,
        };

        if results.len() != values.len() + 2 {
            log::warn!(
                "{} {}: expected {} pull results, got {}",
                self.indicator,
                self.period,
                values.len() + 2,
                results.len()
            );
            return failed;
        }

        let (value_results, coverage_results) = results.split_at(values.len());

        let mut scalars = Vec::with_capacity(value_results.len());
        let mut errors = 0;
        for result in value_results {
            match result {
                Ok(Some(v)) if v.is_finite() => scalars.push(*v),
                Ok(_) => {}
                Err(e) => {
                    errors += 1;
                    log::warn!("{} {}: value pull failed: {}", self.indicator, self.period, e);
                }
            }
        }
        if errors == value_results.len() {
            return failed;
        }
        let value = combine.apply(scalars);

        let coverage_pct = match (&coverage_results[0], &coverage_results[1]) {
            (Ok(valid), Ok(Some(total))) if *total > 0.0 => {
                round_pct(100.0 * valid.unwrap_or(0.0) / total)
            }
            (Ok(_), Ok(_)) => 0.0,
            (Err(e), _) | (_, Err(e)) => {
                log::warn!("{} {}: coverage pull failed: {}", self.indicator, self.period, e);
                0.0
            }
        };

        AggregateResult {
            period: self.period,
            value,
            coverage_pct,
            status: status(coverage_pct, *threshold_pct),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{LocalEngine, ReductionEngine};
    use crate::raster::IndexRaster;
    use crate::region::tests::rectangle;
    use crate::scene::DateRange;
    use chrono::NaiveDate;

    fn scene(indicator: Indicator, day: u32, values: &[f64]) -> IndexRaster {
        IndexRaster {
            indicator,
            timestamp: NaiveDate::from_ymd_opt(2023, 3, day)
                .unwrap()
                .and_hms_opt(3, 50, 0)
                .unwrap(),
            raster: Raster::from_vec(2, 2, 20.0, values.to_vec()).unwrap(),
        }
    }

    fn bucket(scenes: Vec<IndexRaster>) -> TemporalBucket {
        let mut bucket = TemporalBucket::new(
            Period::Month(3),
            DateRange::new(
                NaiveDate::from_ymd_opt(2023, 3, 1).unwrap(),
                NaiveDate::from_ymd_opt(2023, 4, 1).unwrap(),
            ),
        );
        bucket.scenes = scenes;
        bucket
    }

    fn run(plan: &Plan) -> AggregateResult {
        let engine = LocalEngine;
        let results: Vec<_> = plan
            .jobs()
            .iter()
            .map(|job| match job {
                PullJob::Reduce {
                    region,
                    raster,
                    reducer,
                    scale_m,
                } => engine.reduce(region, raster, *reducer, *scale_m),
                PullJob::PixelCount { region, scale_m } => engine
                    .pixel_count(region, *scale_m)
                    .map(|c| Some(c as f64)),
            })
            .collect();
        plan.resolve(&results)
    }

    fn policy(mode: AggregationMode) -> AggregationPolicy {
        AggregationPolicy {
            mode,
            ..AggregationPolicy::default()
        }
    }

    const NAN: f64 = f64::NAN;

    #[test]
    fn test_empty_bucket_is_no_data() {
        let region = Arc::new(rectangle("R", 2, 2));
        let plan = policy(AggregationMode::Composite).plan(Indicator::Tsi, bucket(vec![]), &region);
        assert!(plan.jobs().is_empty());
        assert_eq!(run(&plan), AggregateResult::no_data(Period::Month(3)));
    }

    #[test]
    fn test_below_min_scenes_is_no_data() {
        let region = Arc::new(rectangle("R", 2, 2));
        let policy = AggregationPolicy {
            min_scenes: 2,
            ..AggregationPolicy::default()
        };
        let plan = policy.plan(
            Indicator::ChlorophyllA,
            bucket(vec![scene(Indicator::ChlorophyllA, 3, &[1.0; 4])]),
            &region,
        );
        assert_eq!(run(&plan).status, Status::NoData);
    }

    #[test]
    fn test_composite_and_scene_wise_diverge() {
        // Scene 1 covers one pixel, scene 2 covers all four.
        let scenes = || {
            vec![
                scene(Indicator::ChlorophyllA, 5, &[10.0, NAN, NAN, NAN]),
                scene(Indicator::ChlorophyllA, 20, &[2.0, 4.0, 6.0, 8.0]),
            ]
        };
        let region = Arc::new(rectangle("R", 2, 2));

        // Composite: [6, 4, 6, 8] -> mean 6, coverage 100
        let composite = run(&policy(AggregationMode::Composite).plan(
            Indicator::ChlorophyllA,
            bucket(scenes()),
            &region,
        ));
        assert_eq!(composite.value, Some(6.0));
        assert_eq!(composite.coverage_pct, 100.0);
        assert_eq!(composite.status, Status::Ok);

        // Scene-wise: means 10 and 5 -> 7.5, coverage from the 20th
        let scene_wise = run(&policy(AggregationMode::SceneWise).plan(
            Indicator::ChlorophyllA,
            bucket(scenes()),
            &region,
        ));
        assert_eq!(scene_wise.value, Some(7.5));
        assert_eq!(scene_wise.coverage_pct, 100.0);
    }

    #[test]
    fn test_median_composite() {
        let region = Arc::new(rectangle("R", 2, 2));
        let policy = AggregationPolicy {
            composite_reducer: CompositeReducer::Median,
            ..AggregationPolicy::default()
        };
        let scenes = vec![
            scene(Indicator::Turbidity, 1, &[1.0, 1.0, 1.0, 1.0]),
            scene(Indicator::Turbidity, 2, &[2.0, 2.0, 2.0, 2.0]),
            scene(Indicator::Turbidity, 3, &[9.0, 9.0, 9.0, 9.0]),
        ];
        let result = run(&policy.plan(Indicator::Turbidity, bucket(scenes), &region));
        assert_eq!(result.value, Some(2.0));
    }

    #[test]
    fn test_trophic_class_uses_majority() {
        let region = Arc::new(rectangle("R", 2, 2));
        let scenes = || {
            vec![
                scene(Indicator::TrophicClass, 2, &[3.0, 3.0, 4.0, 4.0]),
                scene(Indicator::TrophicClass, 9, &[3.0, 3.0, 3.0, 4.0]),
                scene(Indicator::TrophicClass, 16, &[5.0, 5.0, 5.0, NAN]),
            ]
        };

        // Per-pixel majority [3, 3, 3, 4] -> class 3
        let composite = run(&policy(AggregationMode::Composite).plan(
            Indicator::TrophicClass,
            bucket(scenes()),
            &region,
        ));
        assert_eq!(composite.value, Some(3.0));

        // Scene modes 3, 3, 5 -> class 3, coverage from the last scene
        let scene_wise = run(&policy(AggregationMode::SceneWise).plan(
            Indicator::TrophicClass,
            bucket(scenes()),
            &region,
        ));
        assert_eq!(scene_wise.value, Some(3.0));
        assert_eq!(scene_wise.coverage_pct, 75.0);
    }

    #[test]
    fn test_coverage_rounding_and_threshold() {
        // One valid pixel out of 6 -> 16.666.. -> 16.67 < 20
        let region = Arc::new(rectangle("R", 3, 2));
        let raster = IndexRaster {
            indicator: Indicator::SecchiDepth,
            timestamp: NaiveDate::from_ymd_opt(2023, 3, 4)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            raster: Raster::from_vec(3, 2, 20.0, vec![1.5, NAN, NAN, NAN, NAN, NAN]).unwrap(),
        };
        let result = run(&policy(AggregationMode::Composite).plan(
            Indicator::SecchiDepth,
            bucket(vec![raster]),
            &region,
        ));
        assert_eq!(result.value, Some(1.5));
        assert_eq!(result.coverage_pct, 16.67);
        assert_eq!(result.status, Status::LowCoverage);

        assert_eq!(status(20.0, 20.0), Status::Ok);
        assert_eq!(status(19.99, 20.0), Status::LowCoverage);
    }

    #[test]
    fn test_fully_masked_scenes() {
        let region = Arc::new(rectangle("R", 2, 2));
        let result = run(&policy(AggregationMode::SceneWise).plan(
            Indicator::Ph,
            bucket(vec![scene(Indicator::Ph, 3, &[NAN; 4])]),
            &region,
        ));
        assert_eq!(result.value, None);
        assert_eq!(result.coverage_pct, 0.0);
        assert_eq!(result.status, Status::LowCoverage);
    }

    #[test]
    fn test_failed_value_pull() {
        let region = Arc::new(rectangle("R", 2, 2));
        let plan = policy(AggregationMode::Composite).plan(
            Indicator::Salinity,
            bucket(vec![scene(Indicator::Salinity, 3, &[1.0; 4])]),
            &region,
        );
        let results = vec![
            Err(EngineError::Timeout(std::time::Duration::from_secs(30))),
            Ok(Some(4.0)),
            Ok(Some(4.0)),
        ];
        let result = plan.resolve(&results);
        assert_eq!(result.value, None);
        assert_eq!(result.coverage_pct, 0.0);
        assert_eq!(result.status, Status::LowCoverage);
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&Status::LowCoverage).unwrap(), r#""LOW_COVERAGE""#);
        assert_eq!(serde_json::to_string(&Status::NoData).unwrap(), r#""NO_DATA""#);
        assert_eq!(serde_json::to_string(&Status::Ok).unwrap(), r#""OK""#);
    }
}

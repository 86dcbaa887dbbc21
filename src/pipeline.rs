//! Request orchestration.
//!
//! `region -> water mask -> scenes -> scale + mask -> correction ->
//! indices -> buckets -> pulls -> report`
//!
//! Everything up to the pulls is pure and runs on the calling thread. The
//! pulls of all buckets and indicators are independent and run on the
//! pipeline's bounded worker pool; results come back in job order.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::aggregate::{
    AggregateResult, AggregationPolicy, Plan, TemporalBucket, annual_bucket, assign,
    monthly_buckets, year_range,
};
use crate::atmcorr::{
    CorrectionMode, Corrector, Elevation, FullAtmosphericCorrection, Identity, scale_and_mask,
};
use crate::catalog::SceneCatalog;
use crate::config::Config;
use crate::engine::{ReductionEngine, RetryPolicy, pull};
use crate::error::PipelineError;
use crate::indices::{self, IndexOptions, Indicator};
use crate::raster::{IndexRaster, WaterMask};
use crate::region::{GeometryProvider, Region, StationRegistry};
use crate::report::{AnnualSummary, MonthlySeries};
use crate::scene::Scene;
use crate::water_mask::WaterMaskBuilder;

pub struct Pipeline {
    config: Config,
    registry: StationRegistry,
    catalog: Arc<dyn SceneCatalog>,
    reference_catalog: Arc<dyn SceneCatalog>,
    engine: Arc<dyn ReductionEngine>,
    corrector: Box<dyn Corrector>,
    pool: ThreadPool,
    policy: AggregationPolicy,
    retry: RetryPolicy,
    indicators: Vec<Indicator>,
}

impl Pipeline {
    pub fn new(
        config: Config,
        catalog: Arc<dyn SceneCatalog>,
        reference_catalog: Arc<dyn SceneCatalog>,
        engine: Arc<dyn ReductionEngine>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;

        let registry = StationRegistry::new(&config.stations, config.scale_m, config.max_pixels)?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("hydrosight-worker-{}", i))
            .build()?;

        let corrector: Box<dyn Corrector> = match config.correction {
            CorrectionMode::Identity => Box::new(Identity),
            CorrectionMode::Full => Box::new(FullAtmosphericCorrection::new(
                config.band_set,
                Elevation::Constant(config.elevation_m),
                config.default_ozone_du,
            )?),
        };

        log::info!(
            "Pipeline ready: {} stations, {} workers, {:?} correction, {} aggregation",
            config.stations.len(),
            config.workers,
            config.correction,
            config.aggregation
        );

        Ok(Self {
            policy: AggregationPolicy::from(&config),
            retry: config.retry_policy(),
            registry,
            catalog,
            reference_catalog,
            engine,
            corrector,
            pool,
            indicators: Indicator::ALL.to_vec(),
            config,
        })
    }

    /// Replaces the corrector selected from the configuration, e.g. to use a
    /// per-pixel elevation model.
    pub fn with_corrector(mut self, corrector: Box<dyn Corrector>) -> Self {
        self.corrector = corrector;
        self
    }

    /// Restricts the indicators computed per request.
    pub fn with_indicators(mut self, indicators: &[Indicator]) -> Self {
        self.indicators = indicators.to_vec();
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stations(&self) -> impl Iterator<Item = &str> {
        self.registry.codes()
    }

    pub fn monthly(
        &self,
        station: &str,
        year: i32,
        cloud: Option<f64>,
    ) -> Result<MonthlySeries, PipelineError> {
        let cloud = self.request(year, cloud)?;
        let results = self.aggregate(station, year, cloud, &monthly_buckets(year))?;
        Ok(MonthlySeries::assemble(station, year, cloud, &results))
    }

    pub fn annual(
        &self,
        station: &str,
        year: i32,
        cloud: Option<f64>,
    ) -> Result<AnnualSummary, PipelineError> {
        let cloud = self.request(year, cloud)?;
        let buckets: Vec<TemporalBucket> = annual_bucket(year).into_iter().collect();
        let results = self.aggregate(station, year, cloud, &buckets)?;
        Ok(AnnualSummary::assemble(station, year, cloud, &results))
    }

    /// Checks the requested year and resolves the cloud ceiling.
    fn request(&self, year: i32, cloud: Option<f64>) -> Result<f64, PipelineError> {
        let (first, last) = (self.config.min_year, self.config.max_year);
        if !(first..=last).contains(&year) {
            return Err(PipelineError::InvalidRequest(format!(
                "year {} is outside {}..={}",
                year, first, last
            )));
        }

        let cloud = cloud.unwrap_or(self.config.cloud_ceiling_pct);
        if !(0.0..=100.0).contains(&cloud) {
            return Err(PipelineError::InvalidRequest(format!(
                "cloud ceiling {} is outside 0..=100",
                cloud
            )));
        }
        Ok(cloud)
    }

    fn aggregate(
        &self,
        station: &str,
        year: i32,
        cloud: f64,
        buckets: &[TemporalBucket],
    ) -> Result<BTreeMap<Indicator, Vec<AggregateResult>>, PipelineError> {
        let region = Arc::new(self.registry.region(station)?);
        let Some(range) = year_range(year) else {
            return Ok(self.no_data(buckets));
        };

        let mask = WaterMaskBuilder::from_config(&self.config.water_mask)
            .build(self.reference_catalog.as_ref(), &region)?;
        let scenes = self.catalog.query(&region, range, cloud)?;
        log::info!(
            "{} {}: {} scenes below {}% cloud",
            station,
            year,
            scenes.len(),
            cloud
        );

        let rasters = self.index_rasters(&scenes, &mask);
        let plans = self.plan(&region, buckets, rasters);
        Ok(self.execute(&plans))
    }

    /// Per-scene processing. A scene that fails still counts towards its
    /// bucket, as an all-masked raster for the affected indicators.
    fn index_rasters(
        &self,
        scenes: &[Scene],
        mask: &WaterMask,
    ) -> BTreeMap<Indicator, Vec<IndexRaster>> {
        let options = IndexOptions {
            tsi_upper_bound: self.config.tsi_upper_bound,
        };
        let masked = |indicator: Indicator, scene: &Scene| IndexRaster {
            indicator,
            timestamp: scene.timestamp,
            raster: mask.raster().map(|_| f64::NAN),
        };
        let mut rasters: BTreeMap<Indicator, Vec<IndexRaster>> = self
            .indicators
            .iter()
            .map(|&i| (i, Vec::new()))
            .collect();

        for scene in scenes {
            let reflectance = match scale_and_mask(scene, mask, self.config.dn_scale)
                .and_then(|scaled| self.corrector.correct(scene, &scaled))
            {
                Ok(reflectance) => reflectance,
                Err(e) => {
                    log::warn!("No valid pixels from scene: {}", e);
                    for (&indicator, out) in rasters.iter_mut() {
                        out.push(masked(indicator, scene));
                    }
                    continue;
                }
            };

            for (&indicator, out) in rasters.iter_mut() {
                match indices::compute(
                    indicator,
                    &scene.id,
                    &reflectance.bands,
                    reflectance.timestamp,
                    &options,
                ) {
                    Ok(raster) => out.push(raster),
                    Err(e) => {
                        log::warn!("No valid {} pixels from scene: {}", indicator, e);
                        out.push(masked(indicator, scene));
                    }
                }
            }
            log::debug!("Processed scene {}", scene.id);
        }

        rasters
    }

    fn plan(
        &self,
        region: &Arc<Region>,
        buckets: &[TemporalBucket],
        rasters: BTreeMap<Indicator, Vec<IndexRaster>>,
    ) -> Vec<Plan> {
        let mut plans = Vec::new();
        for (indicator, rasters) in rasters {
            let mut filled = buckets.to_vec();
            assign(&mut filled, rasters);
            plans.extend(
                filled
                    .into_iter()
                    .map(|bucket| self.policy.plan(indicator, bucket, region)),
            );
        }
        plans
    }

    /// Runs every pull of every plan on the worker pool.
    fn execute(&self, plans: &[Plan]) -> BTreeMap<Indicator, Vec<AggregateResult>> {
        let jobs: Vec<_> = plans.iter().map(Plan::jobs).collect();
        let flat: Vec<_> = jobs.iter().flatten().collect();

        log::debug!("Running {} pulls for {} buckets", flat.len(), plans.len());
        let results: Vec<_> = self.pool.install(|| {
            flat.par_iter()
                .map(|job| pull(&self.engine, job, &self.retry))
                .collect()
        });

        let mut out: BTreeMap<Indicator, Vec<AggregateResult>> = BTreeMap::new();
        let mut offset = 0;
        for (plan, jobs) in plans.iter().zip(&jobs) {
            let end = offset + jobs.len();
            out.entry(plan.indicator)
                .or_default()
                .push(plan.resolve(&results[offset..end]));
            offset = end;
        }
        out
    }

    fn no_data(&self, buckets: &[TemporalBucket]) -> BTreeMap<Indicator, Vec<AggregateResult>> {
        self.indicators
            .iter()
            .map(|&i| {
                let results = buckets
                    .iter()
                    .map(|b| AggregateResult::no_data(b.period))
                    .collect();
                (i, results)
            })
            .collect()
    }
}


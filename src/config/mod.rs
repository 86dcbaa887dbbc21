use serde::Deserialize;
use serde::Deserializer;
use serde::de::Error;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::atmcorr::CorrectionMode;
use crate::engine::RetryPolicy;
use crate::sat_bands::BandSet;

pub mod error;
pub use error::ConfigError;

pub mod modes;
pub use modes::{AggregationMode, CompositeReducer};

/// Reference window and threshold of the water mask.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WaterMaskConfig {
    pub band: String,
    pub threshold: f64,
    pub cloud_ceiling_pct: f64,
    pub reference_years: Vec<i32>,
    pub reference_months: Vec<u32>,
}

impl Default for WaterMaskConfig {
    fn default() -> Self {
        Self {
            band: "SR_B6".to_string(),
            threshold: 300.0,
            cloud_ceiling_pct: 30.0,
            reference_years: Vec::new(),
            reference_months: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub scene_directory: Option<PathBuf>,
    pub reference_directory: Option<PathBuf>,
    pub stations: BTreeMap<String, Vec<[f64; 2]>>,
    pub scale_m: f64,
    pub max_pixels: f64,
    pub cloud_ceiling_pct: f64,
    pub min_year: i32,
    pub max_year: i32,
    pub coverage_threshold_pct: f64,
    pub min_scenes: usize,
    pub aggregation: AggregationMode,
    pub composite_reducer: CompositeReducer,
    pub correction: CorrectionMode,
    pub band_set: BandSet,
    pub dn_scale: f64,
    pub elevation_m: f64,
    pub default_ozone_du: f64,
    pub water_mask: WaterMaskConfig,
    pub tsi_upper_bound: Option<f64>,
    pub workers: usize,
    pub pull_timeout_ms: u64,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
}

// Deserializes a Config through a helper struct carrying the defaults, then
// checks every numeric setting against its valid range.
impl<'de> Deserialize<'de> for Config {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(default)]
        struct ConfigHelper {
            scene_directory: Option<PathBuf>,
            reference_directory: Option<PathBuf>,
            stations: BTreeMap<String, Vec<[f64; 2]>>,
            scale_m: f64,
            max_pixels: f64,
            cloud_ceiling_pct: f64,
            min_year: i32,
            max_year: i32,
            coverage_threshold_pct: f64,
            min_scenes: usize,
            aggregation: AggregationMode,
            composite_reducer: CompositeReducer,
            correction: CorrectionMode,
            band_set: BandSet,
            dn_scale: f64,
            elevation_m: f64,
            default_ozone_du: f64,
            water_mask: WaterMaskConfig,
            tsi_upper_bound: Option<f64>,
            workers: usize,
            pull_timeout_ms: u64,
            max_retries: u32,
            initial_backoff_ms: u64,
        }

        impl Default for ConfigHelper {
            fn default() -> Self {
                let c = Config::new(BTreeMap::new());
                Self {
                    scene_directory: c.scene_directory,
                    reference_directory: c.reference_directory,
                    stations: c.stations,
                    scale_m: c.scale_m,
                    max_pixels: c.max_pixels,
                    cloud_ceiling_pct: c.cloud_ceiling_pct,
                    min_year: c.min_year,
                    max_year: c.max_year,
                    coverage_threshold_pct: c.coverage_threshold_pct,
                    min_scenes: c.min_scenes,
                    aggregation: c.aggregation,
                    composite_reducer: c.composite_reducer,
                    correction: c.correction,
                    band_set: c.band_set,
                    dn_scale: c.dn_scale,
                    elevation_m: c.elevation_m,
                    default_ozone_du: c.default_ozone_du,
                    water_mask: c.water_mask,
                    tsi_upper_bound: c.tsi_upper_bound,
                    workers: c.workers,
                    pull_timeout_ms: c.pull_timeout_ms,
                    max_retries: c.max_retries,
                    initial_backoff_ms: c.initial_backoff_ms,
                }
            }
        }

        // Deserialize into the helper struct
        let h = ConfigHelper::deserialize(deserializer)?;

        let config = Config {
            scene_directory: h.scene_directory,
            reference_directory: h.reference_directory,
            stations: h.stations,
            scale_m: h.scale_m,
            max_pixels: h.max_pixels,
            cloud_ceiling_pct: h.cloud_ceiling_pct,
            min_year: h.min_year,
            max_year: h.max_year,
            coverage_threshold_pct: h.coverage_threshold_pct,
            min_scenes: h.min_scenes,
            aggregation: h.aggregation,
            composite_reducer: h.composite_reducer,
            correction: h.correction,
            band_set: h.band_set,
            dn_scale: h.dn_scale,
            elevation_m: h.elevation_m,
            default_ozone_du: h.default_ozone_du,
            water_mask: h.water_mask,
            tsi_upper_bound: h.tsi_upper_bound,
            workers: h.workers,
            pull_timeout_ms: h.pull_timeout_ms,
            max_retries: h.max_retries,
            initial_backoff_ms: h.initial_backoff_ms,
        };

        if config.stations.is_empty() {
            return Err(D::Error::custom(ConfigError::NoStations));
        }
        config.validate().map_err(D::Error::custom)?;

        Ok(config)
    }
}

fn check(field: &'static str, expected: &'static str, value: f64, ok: bool) -> Result<(), ConfigError> {
    if ok && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            expected,
            value,
        })
    }
}

impl Config {
    /// Configuration with default settings for the given stations.
    pub fn new(stations: BTreeMap<String, Vec<[f64; 2]>>) -> Self {
        Self {
            scene_directory: None,
            reference_directory: None,
            stations,
            scale_m: 20.0,
            max_pixels: 1e13,
            cloud_ceiling_pct: 30.0,
            min_year: 2017,
            max_year: 2025,
            coverage_threshold_pct: 20.0,
            min_scenes: 1,
            aggregation: AggregationMode::default(),
            composite_reducer: CompositeReducer::default(),
            correction: CorrectionMode::default(),
            band_set: BandSet::default(),
            dn_scale: 10000.0,
            elevation_m: 0.0,
            default_ozone_du: 300.0,
            water_mask: WaterMaskConfig::default(),
            tsi_upper_bound: None,
            workers: 8,
            pull_timeout_ms: 30_000,
            max_retries: 3,
            initial_backoff_ms: 200,
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let config: Config = serde_json::from_reader(reader).map_err(ConfigError::from)?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let pct = |v: f64| (0.0..=100.0).contains(&v);

        check("scale_m", "positive", self.scale_m, self.scale_m > 0.0)?;
        check("max_pixels", "positive", self.max_pixels, self.max_pixels > 0.0)?;
        check("cloud_ceiling_pct", "within 0..=100", self.cloud_ceiling_pct, pct(self.cloud_ceiling_pct))?;
        check(
            "max_year",
            "not below min_year",
            self.max_year as f64,
            self.max_year >= self.min_year,
        )?;
        check(
            "coverage_threshold_pct",
            "within 0..=100",
            self.coverage_threshold_pct,
            pct(self.coverage_threshold_pct),
        )?;
        check("min_scenes", "at least 1", self.min_scenes as f64, self.min_scenes >= 1)?;
        check("dn_scale", "positive", self.dn_scale, self.dn_scale > 0.0)?;
        check("elevation_m", "finite", self.elevation_m, true)?;
        check("default_ozone_du", "positive", self.default_ozone_du, self.default_ozone_du > 0.0)?;
        check("workers", "at least 1", self.workers as f64, self.workers >= 1)?;
        check(
            "water_mask.cloud_ceiling_pct",
            "within 0..=100",
            self.water_mask.cloud_ceiling_pct,
            pct(self.water_mask.cloud_ceiling_pct),
        )?;
        check("water_mask.threshold", "finite", self.water_mask.threshold, true)?;

        if let Some(bound) = self.tsi_upper_bound {
            check("tsi_upper_bound", "finite", bound, true)?;
        }

        if let Some(&month) = self
            .water_mask
            .reference_months
            .iter()
            .find(|m| !(1..=12).contains(*m))
        {
            return Err(ConfigError::Month(month));
        }

        Ok(())
    }

    /// Timeout and retry settings of the scalar pulls.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: (self.pull_timeout_ms > 0).then(|| Duration::from_millis(self.pull_timeout_ms)),
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
        }
    }
}

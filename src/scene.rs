use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::raster::Raster;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SceneError {
    #[error("scene {scene} is missing metadata field {field}")]
    MissingMetadata { scene: String, field: String },

    #[error("scene {scene} has no band {band}")]
    MissingBand { scene: String, band: String },

    #[error("scene {scene} band {band} is not on the region grid")]
    GridMismatch { scene: String, band: String },
}

/// Half-open date window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, timestamp: &NaiveDateTime) -> bool {
        let date = timestamp.date();
        date >= self.start && date < self.end
    }
}

/// Acquisition metadata as delivered by the catalog. Any field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SceneMetadata {
    pub solar_zenith: Option<f64>,
    pub solar_azimuth: Option<f64>,
    pub sensor_zenith: Option<f64>,
    pub sensor_azimuth: Option<f64>,
    #[serde(default)]
    pub irradiance: BTreeMap<String, f64>,
    pub ozone_du: Option<f64>,
}

/// Complete sun/sensor geometry of a scene, angles in degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub timestamp: NaiveDateTime,
    pub solar_zenith: f64,
    pub solar_azimuth: f64,
    pub sensor_zenith: f64,
    pub sensor_azimuth: f64,
    pub irradiance: BTreeMap<String, f64>,
    pub ozone_du: f64,
}

impl Geometry {
    pub fn day_of_year(&self) -> u32 {
        self.timestamp.ordinal()
    }

    pub fn esun(&self, band: &str) -> Option<f64> {
        self.irradiance.get(band).copied()
    }
}

#[derive(Debug, Clone)]
pub struct Scene {
    pub id: String,
    pub timestamp: NaiveDateTime,
    pub cloud_pct: f64,
    pub metadata: SceneMetadata,
    pub bands: BTreeMap<String, Raster>,
}

impl Scene {
    pub fn band(&self, name: &str) -> Result<&Raster, SceneError> {
        self.bands.get(name).ok_or_else(|| SceneError::MissingBand {
            scene: self.id.clone(),
            band: name.to_string(),
        })
    }

    /// Validated geometry. Irradiance is required for every band in
    /// `bands`; a missing ozone column falls back to `default_ozone_du`.
    pub fn metadata<'a, I>(&self, bands: I, default_ozone_du: f64) -> Result<Geometry, SceneError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let missing = |field: &str| SceneError::MissingMetadata {
            scene: self.id.clone(),
            field: field.to_string(),
        };

        let m = &self.metadata;
        let solar_zenith = m.solar_zenith.ok_or_else(|| missing("solar_zenith"))?;
        let solar_azimuth = m.solar_azimuth.ok_or_else(|| missing("solar_azimuth"))?;
        let sensor_zenith = m.sensor_zenith.ok_or_else(|| missing("sensor_zenith"))?;
        let sensor_azimuth = m.sensor_azimuth.ok_or_else(|| missing("sensor_azimuth"))?;

        let mut irradiance = BTreeMap::new();
        for band in bands {
            let esun = m
                .irradiance
                .get(band)
                .copied()
                .ok_or_else(|| missing(&format!("irradiance.{}", band)))?;
            irradiance.insert(band.to_string(), esun);
        }

        Ok(Geometry {
            timestamp: self.timestamp,
            solar_zenith,
            solar_azimuth,
            sensor_zenith,
            sensor_azimuth,
            irradiance,
            ozone_du: m.ozone_du.unwrap_or(default_ozone_du),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(metadata: SceneMetadata) -> Scene {
        Scene {
            id: "S2_TEST".to_string(),
            timestamp: NaiveDate::from_ymd_opt(2023, 3, 10)
                .unwrap()
                .and_hms_opt(3, 50, 0)
                .unwrap(),
            cloud_pct: 5.0,
            metadata,
            bands: BTreeMap::new(),
        }
    }

    fn complete() -> SceneMetadata {
        SceneMetadata {
            solar_zenith: Some(30.0),
            solar_azimuth: Some(120.0),
            sensor_zenith: Some(5.0),
            sensor_azimuth: Some(100.0),
            irradiance: BTreeMap::from([("B4".to_string(), 1512.0)]),
            ozone_du: None,
        }
    }

    #[test]
    fn test_metadata_defaults_ozone() {
        let geometry = scene(complete()).metadata(["B4"], 300.0).unwrap();
        assert_eq!(geometry.ozone_du, 300.0);
        assert_eq!(geometry.day_of_year(), 69);
        assert_eq!(geometry.esun("B4"), Some(1512.0));
    }

    #[test]
    fn test_missing_irradiance_is_reported() {
        let err = scene(complete()).metadata(["B4", "B5"], 300.0).unwrap_err();
        assert_eq!(
            err,
            SceneError::MissingMetadata {
                scene: "S2_TEST".to_string(),
                field: "irradiance.B5".to_string()
            }
        );
    }

    #[test]
    fn test_missing_angle_is_reported() {
        let mut metadata = complete();
        metadata.sensor_zenith = None;
        let err = scene(metadata).metadata(["B4"], 300.0).unwrap_err();
        assert!(matches!(err, SceneError::MissingMetadata { field, .. } if field == "sensor_zenith"));
    }

    #[test]
    fn test_date_range_is_half_open() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2023, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 4, 1).unwrap(),
        );
        let at = |d: u32, m: u32| {
            NaiveDate::from_ymd_opt(2023, m, d)
                .unwrap()
                .and_hms_opt(23, 59, 0)
                .unwrap()
        };
        assert!(range.contains(&at(1, 3)));
        assert!(range.contains(&at(31, 3)));
        assert!(!range.contains(&at(1, 4)));
        assert!(!range.contains(&at(28, 2)));
    }
}

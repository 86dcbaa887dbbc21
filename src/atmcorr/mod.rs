//! Atmospheric correction
//!
//! Converts scaled top-of-atmosphere digital numbers into remote sensing
//! reflectance (Rrs). Every scene goes through `scale_and_mask` first; the
//! configured `Corrector` is then applied uniformly to all scenes of a
//! request:
//!
//! * `Identity` keeps the scaled reflectance as is.
//! * `FullAtmosphericCorrection` removes ozone absorption, Rayleigh path
//!   radiance and an aerosol/glint estimate derived from the SWIR bands.
//!
//! Both are pure functions of their inputs; repeated evaluation gives
//! bit-identical rasters.

use chrono::NaiveDateTime;
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::raster::{Raster, WaterMask};
use crate::scene::{Scene, SceneError};

pub mod constants;
pub mod full;

pub use full::{Elevation, FullAtmosphericCorrection};

/// Per-band reflectance of one scene.
#[derive(Debug, Clone)]
pub struct Reflectance {
    pub scene: String,
    pub timestamp: NaiveDateTime,
    pub bands: BTreeMap<String, Raster>,
}

pub trait Corrector: Send + Sync {
    fn correct(&self, scene: &Scene, scaled: &Reflectance) -> Result<Reflectance, SceneError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Corrector for Identity {
    fn correct(&self, _scene: &Scene, scaled: &Reflectance) -> Result<Reflectance, SceneError> {
        Ok(scaled.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionMode {
    #[default]
    Identity,
    Full,
}

/// Rescales digital numbers to reflectance and applies the water mask.
pub fn scale_and_mask(
    scene: &Scene,
    mask: &WaterMask,
    dn_scale: f64,
) -> Result<Reflectance, SceneError> {
    let mut bands = BTreeMap::new();
    for (name, raster) in &scene.bands {
        let scaled = raster
            .map(|dn| dn / dn_scale)
            .update_mask(mask.raster())
            .ok_or_else(|| SceneError::GridMismatch {
                scene: scene.id.clone(),
                band: name.clone(),
            })?;
        bands.insert(name.clone(), scaled);
    }

    Ok(Reflectance {
        scene: scene.id.clone(),
        timestamp: scene.timestamp,
        bands,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::scene::SceneMetadata;
    use chrono::NaiveDate;

    /// Two pixel scene with plausible Sentinel-2 metadata.
    pub(crate) fn sample_scene(dn: &[(&str, [f64; 2])]) -> Scene {
        let irradiance = [
            ("B1", 1884.69),
            ("B2", 1959.72),
            ("B3", 1823.24),
            ("B4", 1512.06),
            ("B5", 1424.64),
            ("B6", 1287.61),
            ("B7", 1162.08),
            ("B8", 1041.28),
            ("B8A", 955.32),
            ("B9", 812.92),
            ("B11", 247.08),
            ("B12", 87.75),
        ]
        .into_iter()
        .map(|(b, e)| (b.to_string(), e))
        .collect();

        Scene {
            id: "S2A_20230315".to_string(),
            timestamp: NaiveDate::from_ymd_opt(2023, 3, 15)
                .unwrap()
                .and_hms_opt(3, 52, 0)
                .unwrap(),
            cloud_pct: 4.0,
            metadata: SceneMetadata {
                solar_zenith: Some(30.0),
                solar_azimuth: Some(120.0),
                sensor_zenith: Some(5.0),
                sensor_azimuth: Some(100.0),
                irradiance,
                ozone_du: Some(280.0),
            },
            bands: dn
                .iter()
                .map(|(b, v)| {
                    (
                        b.to_string(),
                        Raster::from_vec(2, 1, 20.0, v.to_vec()).unwrap(),
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn test_scale_and_mask() {
        let scene = sample_scene(&[("B4", [800.0, 1200.0])]);
        let mask = WaterMask::from_raster(Raster::from_vec(2, 1, 20.0, vec![1.0, 0.0]).unwrap());
        let scaled = scale_and_mask(&scene, &mask, 10000.0).unwrap();
        let b4 = &scaled.bands["B4"];
        assert_eq!(b4.buffer[0], 0.08);
        assert!(b4.buffer[1].is_nan());
        assert_eq!(scaled.timestamp, scene.timestamp);
    }

    #[test]
    fn test_scale_and_mask_grid_mismatch() {
        let scene = sample_scene(&[("B4", [800.0, 1200.0])]);
        let mask = WaterMask::from_raster(Raster::filled(3, 1, 20.0, 1.0));
        assert!(matches!(
            scale_and_mask(&scene, &mask, 10000.0),
            Err(SceneError::GridMismatch { .. })
        ));
    }

    #[test]
    fn test_identity_keeps_reflectance() {
        let scene = sample_scene(&[("B4", [800.0, 1200.0])]);
        let mask = WaterMask::from_raster(Raster::filled(2, 1, 20.0, 1.0));
        let scaled = scale_and_mask(&scene, &mask, 10000.0).unwrap();
        let out = Identity.correct(&scene, &scaled).unwrap();
        assert_eq!(out.bands["B4"], scaled.bands["B4"]);
    }
}

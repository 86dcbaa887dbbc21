//! Water quality indicators computed pixel by pixel from reflectance bands.
//!
//! The regression coefficients are empirical constants and are reproduced
//! exactly. Out of range pixels are masked (`NaN`), never clamped.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::raster::{IndexRaster, Raster};
use crate::scene::SceneError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    #[serde(rename = "chl_a")]
    ChlorophyllA,
    #[serde(rename = "secchi_m")]
    SecchiDepth,
    Tsi,
    TrophicClass,
    Ph,
    Turbidity,
    Salinity,
    #[serde(rename = "do_mg_l")]
    DissolvedOxygen,
}

impl Indicator {
    pub const ALL: [Indicator; 8] = [
        Indicator::ChlorophyllA,
        Indicator::SecchiDepth,
        Indicator::Tsi,
        Indicator::TrophicClass,
        Indicator::Ph,
        Indicator::Turbidity,
        Indicator::Salinity,
        Indicator::DissolvedOxygen,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Indicator::ChlorophyllA => "chl_a",
            Indicator::SecchiDepth => "secchi_m",
            Indicator::Tsi => "tsi",
            Indicator::TrophicClass => "trophic_class",
            Indicator::Ph => "ph",
            Indicator::Turbidity => "turbidity",
            Indicator::Salinity => "salinity",
            Indicator::DissolvedOxygen => "do_mg_l",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.name() == name)
    }

    /// Ordinal indicators are aggregated by majority, never averaged.
    pub fn is_ordinal(&self) -> bool {
        matches!(self, Indicator::TrophicClass)
    }

    /// Bands read by the formula.
    pub fn bands(&self) -> &'static [&'static str] {
        match self {
            Indicator::ChlorophyllA | Indicator::Tsi | Indicator::TrophicClass => &["B4", "B5"],
            Indicator::SecchiDepth => &["B2", "B4"],
            Indicator::Ph => &["B1", "B8"],
            Indicator::Turbidity => &["B4", "B8"],
            Indicator::Salinity => &["B11", "B12"],
            Indicator::DissolvedOxygen => &["B8", "B9", "B11"],
        }
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IndexOptions {
    /// TSI pixels at or above this bound are masked.
    pub tsi_upper_bound: Option<f64>,
}

/// `(x - y) / (x + y)`, `NaN` when the denominator vanishes.
pub fn norm_diff(x: f64, y: f64) -> f64 {
    let sum = x + y;
    if sum == 0.0 { f64::NAN } else { (x - y) / sum }
}

pub fn chlorophyll_a(b4: f64, b5: f64) -> f64 {
    let ndci = norm_diff(b5, b4);
    14.039 + 86.115 * ndci + 194.325 * ndci.powi(2)
}

pub fn secchi_depth(b2: f64, b4: f64) -> f64 {
    let ln_mosd = 1.4856 * (b2 / b4).ln() + 0.2734;
    0.1777 * 10_f64.powf(ln_mosd) + 1.0813
}

pub fn tsi(chl_a: f64) -> f64 {
    30.6 + 9.81 * chl_a.ln()
}

/// Trophic class 1..=7 on `[lower, upper)` buckets bounded at
/// 30, 40, 50, 60, 70 and 80. `NaN` stays `NaN`.
pub fn trophic_class(tsi: f64) -> f64 {
    const BOUNDS: [f64; 6] = [30.0, 40.0, 50.0, 60.0, 70.0, 80.0];
    if tsi.is_nan() {
        return f64::NAN;
    }
    (BOUNDS.iter().take_while(|&&b| tsi >= b).count() + 1) as f64
}

pub fn ph(b1: f64, b8: f64) -> f64 {
    8.339 - 0.827 * (b1 / b8)
}

pub fn turbidity(b4: f64, b8: f64) -> f64 {
    100.0 * (1.0 - norm_diff(b8, b4))
}

pub fn salinity(b11: f64, b12: f64) -> f64 {
    norm_diff(b11, b12)
}

pub fn dissolved_oxygen(b8: f64, b9: f64, b11: f64) -> f64 {
    -0.0167 * b8 + 0.0067 * b9 + 0.0083 * b11 + 9.577
}

fn band<'a>(
    bands: &'a BTreeMap<String, Raster>,
    scene: &str,
    name: &str,
) -> Result<&'a Raster, SceneError> {
    bands.get(name).ok_or_else(|| SceneError::MissingBand {
        scene: scene.to_string(),
        band: name.to_string(),
    })
}

fn combine<F>(a: &Raster, b: &Raster, scene: &str, band: &str, f: F) -> Result<Raster, SceneError>
where
    F: Fn(f64, f64) -> f64,
{
    a.zip_with(b, f).ok_or_else(|| SceneError::GridMismatch {
        scene: scene.to_string(),
        band: band.to_string(),
    })
}

/// Computes one indicator raster from a scene's reflectance bands.
pub fn compute(
    indicator: Indicator,
    scene: &str,
    bands: &BTreeMap<String, Raster>,
    timestamp: NaiveDateTime,
    options: &IndexOptions,
) -> Result<IndexRaster, SceneError> {
    let get = |name: &str| band(bands, scene, name);

    let raster = match indicator {
        Indicator::ChlorophyllA => combine(get("B4")?, get("B5")?, scene, "B5", chlorophyll_a)?,
        Indicator::SecchiDepth => combine(get("B2")?, get("B4")?, scene, "B4", secchi_depth)?
            .mask_where(|v| v > 0.0 && v <= 10.0),
        Indicator::Tsi | Indicator::TrophicClass => {
            let chl = combine(get("B4")?, get("B5")?, scene, "B5", chlorophyll_a)?;
            let index = chl.map(tsi);
            let index = match options.tsi_upper_bound {
                Some(bound) => index.mask_where(|v| v < bound),
                None => index,
            };
            if indicator == Indicator::Tsi {
                index
            } else {
                index.map(trophic_class)
            }
        }
        Indicator::Ph => combine(get("B1")?, get("B8")?, scene, "B8", ph)?.mask_where(|v| v < 14.0),
        Indicator::Turbidity => {
            combine(get("B4")?, get("B8")?, scene, "B8", turbidity)?.mask_where(|v| v < 100.0)
        }
        Indicator::Salinity => combine(get("B11")?, get("B12")?, scene, "B12", salinity)?
            .mask_where(|v| v.abs() < 1.0),
        Indicator::DissolvedOxygen => {
            let (b8, b9, b11) = (get("B8")?, get("B9")?, get("B11")?);
            for (other, name) in [(b9, "B9"), (b11, "B11")] {
                if !b8.same_grid(other) {
                    return Err(SceneError::GridMismatch {
                        scene: scene.to_string(),
                        band: name.to_string(),
                    });
                }
            }
            let buffer = b8
                .buffer
                .iter()
                .zip(b9.buffer.iter().zip(b11.buffer.iter()))
                .map(|(&b8, (&b9, &b11))| dissolved_oxygen(b8, b9, b11))
                .collect();
            Raster {
                width: b8.width,
                height: b8.height,
                scale_m: b8.scale_m,
                buffer,
            }
            .mask_where(|v| v < 20.0)
        }
    };

    // ln of a non positive chlorophyll value gives NaN or -inf.
    let raster = raster.map(|v| if v.is_finite() { v } else { f64::NAN });

    Ok(IndexRaster {
        indicator,
        timestamp,
        raster,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn row(values: &[f64]) -> Raster {
        Raster::from_vec(values.len() as u32, 1, 20.0, values.to_vec()).unwrap()
    }

    fn timestamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 3, 5)
            .unwrap()
            .and_hms_opt(3, 48, 0)
            .unwrap()
    }

    #[test]
    fn test_chlorophyll_at_zero_ndci() {
        assert!(close(chlorophyll_a(0.05, 0.05), 14.039));
    }

    #[test]
    fn test_chlorophyll_grows_with_positive_ndci() {
        let mut previous = chlorophyll_a(0.05, 0.05);
        for b5 in [0.055, 0.06, 0.08, 0.1, 0.2] {
            let value = chlorophyll_a(0.05, b5);
            assert!(value > previous, "{value} <= {previous}");
            previous = value;
        }
    }

    #[test]
    fn test_trophic_class_partition() {
        assert_eq!(trophic_class(-5.0), 1.0);
        assert_eq!(trophic_class(29.9), 1.0);
        assert_eq!(trophic_class(30.0), 2.0);
        assert_eq!(trophic_class(39.999), 2.0);
        assert_eq!(trophic_class(40.0), 3.0);
        assert_eq!(trophic_class(50.0), 4.0);
        assert_eq!(trophic_class(60.0), 5.0);
        assert_eq!(trophic_class(70.0), 6.0);
        assert_eq!(trophic_class(79.99), 6.0);
        assert_eq!(trophic_class(80.0), 7.0);
        assert_eq!(trophic_class(1e6), 7.0);
        assert!(trophic_class(f64::NAN).is_nan());
    }

    #[test]
    fn test_trophic_class_is_total_over_a_sweep() {
        let mut previous = 1.0;
        for step in 0..2000 {
            let class = trophic_class(step as f64 * 0.05);
            assert!((1.0..=7.0).contains(&class));
            assert!(class >= previous);
            previous = class;
        }
    }

    #[test]
    fn test_secchi_depth_mask() {
        // b2 == b4 gives 0.1777 * 10^0.2734 + 1.0813
        let expected = 0.1777 * 10_f64.powf(0.2734) + 1.0813;
        let bands = BTreeMap::from([
            ("B2".to_string(), row(&[0.05, 0.5, 0.02, 0.05])),
            ("B4".to_string(), row(&[0.05, 0.01, 0.05, 0.0])),
        ]);
        let out = compute(
            Indicator::SecchiDepth,
            "s",
            &bands,
            timestamp(),
            &IndexOptions::default(),
        )
        .unwrap();
        assert!(close(out.raster.buffer[0], expected));
        // ratio 50 pushes the depth far above 10 m
        assert!(out.raster.buffer[1].is_nan());
        assert!(out.raster.buffer[2] > 0.0 && out.raster.buffer[2] <= 10.0);
        // division by zero is invalid, not infinite
        assert!(out.raster.buffer[3].is_nan());
        assert!(
            out.raster
                .buffer
                .iter()
                .all(|v| v.is_nan() || (*v > 0.0 && *v <= 10.0))
        );
        assert_eq!(out.timestamp, timestamp());
    }

    #[test]
    fn test_range_masks() {
        assert!(close(ph(0.02, 0.04), 8.339 - 0.827 * 0.5));
        assert!(close(turbidity(0.05, 0.05), 100.0));
        assert!(close(salinity(0.3, 0.1), 0.5));
        assert!(close(dissolved_oxygen(0.0, 0.0, 0.0), 9.577));

        let bands = BTreeMap::from([
            ("B4".to_string(), row(&[0.05, 0.10])),
            ("B8".to_string(), row(&[0.05, 0.02])),
        ]);
        let out = compute(
            Indicator::Turbidity,
            "s",
            &bands,
            timestamp(),
            &IndexOptions::default(),
        )
        .unwrap();
        // exactly 100 is outside the `< 100` range
        assert!(out.raster.buffer[0].is_nan());
        assert!(out.raster.buffer[1].is_nan());
    }

    #[test]
    fn test_tsi_and_class_from_bands() {
        let bands = BTreeMap::from([
            ("B4".to_string(), row(&[0.05, 0.05])),
            ("B5".to_string(), row(&[0.05, 0.10])),
        ]);
        let tsi_out = compute(
            Indicator::Tsi,
            "s",
            &bands,
            timestamp(),
            &IndexOptions::default(),
        )
        .unwrap();
        assert!(close(tsi_out.raster.buffer[0], 30.6 + 9.81 * 14.039_f64.ln()));

        let class_out = compute(
            Indicator::TrophicClass,
            "s",
            &bands,
            timestamp(),
            &IndexOptions::default(),
        )
        .unwrap();
        for (t, c) in tsi_out.raster.buffer.iter().zip(class_out.raster.buffer.iter()) {
            assert_eq!(trophic_class(*t), *c);
        }

        let capped = compute(
            Indicator::Tsi,
            "s",
            &bands,
            timestamp(),
            &IndexOptions {
                tsi_upper_bound: Some(60.0),
            },
        )
        .unwrap();
        assert!(!capped.raster.buffer[0].is_nan());
        assert!(capped.raster.buffer[1].is_nan());
    }

    #[test]
    fn test_missing_band() {
        let bands = BTreeMap::from([("B8".to_string(), row(&[0.01]))]);
        let err = compute(
            Indicator::DissolvedOxygen,
            "scene-1",
            &bands,
            timestamp(),
            &IndexOptions::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            SceneError::MissingBand {
                scene: "scene-1".to_string(),
                band: "B9".to_string()
            }
        );
    }

    #[test]
    fn test_indicator_names_round_trip() {
        for indicator in Indicator::ALL {
            assert_eq!(Indicator::from_name(indicator.name()), Some(indicator));
        }
        assert_eq!(
            serde_json::to_string(&Indicator::DissolvedOxygen).unwrap(),
            "\"do_mg_l\""
        );
        assert_eq!(
            serde_json::to_string(&Indicator::TrophicClass).unwrap(),
            "\"trophic_class\""
        );
    }
}

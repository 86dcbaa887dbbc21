//! Open water mask from a reference sensor.
//!
//! Water strongly absorbs in the short-wave infrared, so the per-pixel
//! median of a SWIR band over a calm reference window separates open water
//! (low values) from land and vegetation. The mask is built once per region
//! and reused for every scene of a request; water extent is assumed stable
//! over the analysis horizon.

use chrono::{Datelike, NaiveDate};

use crate::catalog::{CatalogError, SceneCatalog};
use crate::config::WaterMaskConfig;
use crate::engine::Reducer;
use crate::raster::{Raster, WaterMask};
use crate::region::Region;
use crate::scene::{DateRange, Scene};

#[derive(Debug, Clone)]
pub struct WaterMaskBuilder {
    band: String,
    threshold: f64,
    cloud_ceiling: f64,
    years: Vec<i32>,
    months: Vec<u32>,
}

impl WaterMaskBuilder {
    pub fn new(band: &str, threshold: f64, cloud_ceiling: f64) -> Self {
        Self {
            band: band.to_string(),
            threshold,
            cloud_ceiling,
            years: Vec::new(),
            months: Vec::new(),
        }
    }

    pub fn from_config(config: &WaterMaskConfig) -> Self {
        Self::new(&config.band, config.threshold, config.cloud_ceiling_pct)
            .years(&config.reference_years)
            .months(&config.reference_months)
    }

    /// Restricts the reference window to these years. Empty means all years.
    pub fn years(mut self, years: &[i32]) -> Self {
        self.years = years.to_vec();
        self
    }

    /// Restricts the reference window to these calendar months. Empty means
    /// all months.
    pub fn months(mut self, months: &[u32]) -> Self {
        self.months = months.to_vec();
        self
    }

    fn window(&self) -> DateRange {
        let first = self.years.iter().min();
        let last = self.years.iter().max();
        match (first, last) {
            (Some(&first), Some(&last)) => DateRange::new(
                NaiveDate::from_ymd_opt(first, 1, 1).unwrap_or(NaiveDate::MIN),
                NaiveDate::from_ymd_opt(last + 1, 1, 1).unwrap_or(NaiveDate::MAX),
            ),
            _ => DateRange::new(NaiveDate::MIN, NaiveDate::MAX),
        }
    }

    fn in_window(&self, scene: &Scene) -> bool {
        let date = scene.timestamp.date();
        (self.years.is_empty() || self.years.contains(&date.year()))
            && (self.months.is_empty() || self.months.contains(&date.month()))
    }

    pub fn build(
        &self,
        catalog: &dyn SceneCatalog,
        region: &Region,
    ) -> Result<WaterMask, CatalogError> {
        let grid = region.grid();
        let scenes: Vec<Scene> = catalog
            .query(region, self.window(), self.cloud_ceiling)?
            .into_iter()
            .filter(|s| self.in_window(s))
            .collect();

        let bands: Vec<&Raster> = scenes
            .iter()
            .filter_map(|scene| match scene.band(&self.band) {
                Ok(raster) if raster.width == grid.width && raster.height == grid.height => {
                    Some(raster)
                }
                Ok(_) => {
                    log::warn!("Reference scene {} is not on the region grid", scene.id);
                    None
                }
                Err(e) => {
                    log::warn!("Ignoring reference scene: {}", e);
                    None
                }
            })
            .collect();

        if bands.is_empty() {
            log::warn!(
                "No reference scenes for station {}, every pixel is excluded",
                region.code()
            );
            return Ok(WaterMask::excluding_all(
                grid.width,
                grid.height,
                region.scale_m(),
            ));
        }

        let median = per_pixel_median(&bands);
        log::debug!("Reference median for {}:\n{}", region.code(), median);
        let water = median.map(|v| {
            if v.is_nan() {
                f64::NAN
            } else if v < self.threshold {
                1.0
            } else {
                0.0
            }
        });
        let mask = WaterMask::from_raster(water);

        log::info!(
            "Water mask for {}: {} of {} pixels from {} reference scenes",
            region.code(),
            mask.water_pixels(),
            grid.pixel_count(),
            bands.len()
        );

        Ok(mask)
    }
}

/// Median across rasters of the same grid, skipping `NaN` samples.
pub(crate) fn per_pixel_median(rasters: &[&Raster]) -> Raster {
    per_pixel(rasters, Reducer::Median)
}

/// Per-pixel reduction across a stack of rasters on one grid. A pixel with
/// no valid sample is `NaN`.
pub(crate) fn per_pixel(rasters: &[&Raster], reducer: Reducer) -> Raster {
    let Some(first) = rasters.first() else {
        return Raster::filled(0, 0, 0.0, f64::NAN);
    };

    let buffer = (0..first.len())
        .map(|i| {
            let samples: Vec<f64> = rasters
                .iter()
                .map(|r| r.buffer[i])
                .filter(|v| !v.is_nan())
                .collect();
            if samples.is_empty() {
                f64::NAN
            } else {
                reducer.apply(samples).unwrap_or(f64::NAN)
            }
        })
        .collect();

    Raster {
        width: first.width,
        height: first.height,
        scale_m: first.scale_m,
        buffer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::region::tests::rectangle;
    use crate::scene::SceneMetadata;
    use std::collections::BTreeMap;

    fn reference(id: &str, year: i32, month: u32, cloud_pct: f64, swir: [f64; 4]) -> Scene {
        Scene {
            id: id.to_string(),
            timestamp: NaiveDate::from_ymd_opt(year, month, 12)
                .unwrap()
                .and_hms_opt(3, 40, 0)
                .unwrap(),
            cloud_pct,
            metadata: SceneMetadata::default(),
            bands: BTreeMap::from([(
                "SR_B6".to_string(),
                Raster::from_vec(2, 2, 20.0, swir.to_vec()).unwrap(),
            )]),
        }
    }

    #[test]
    fn test_median_threshold() {
        let catalog = MemoryCatalog::new()
            .with_scene("LS01", reference("r1", 2016, 2, 5.0, [100.0, 250.0, 900.0, f64::NAN]))
            .with_scene("LS01", reference("r2", 2017, 2, 5.0, [120.0, 400.0, 800.0, f64::NAN]))
            .with_scene("LS01", reference("r3", 2018, 2, 5.0, [500.0, 350.0, 200.0, 150.0]));
        let region = rectangle("LS01", 2, 2);

        let mask = WaterMaskBuilder::new("SR_B6", 300.0, 30.0)
            .build(&catalog, &region)
            .unwrap();
        let values = &mask.raster().buffer;

        // Medians: 120, 350, 800, 150
        assert_eq!(values[0], 1.0);
        assert!(values[1].is_nan());
        assert!(values[2].is_nan());
        assert_eq!(values[3], 1.0);
        assert_eq!(mask.water_pixels(), 2);
    }

    #[test]
    fn test_reference_window_and_clouds() {
        let catalog = MemoryCatalog::new()
            .with_scene("LS01", reference("feb", 2016, 2, 5.0, [100.0; 4]))
            .with_scene("LS01", reference("july", 2016, 7, 5.0, [900.0; 4]))
            .with_scene("LS01", reference("cloudy", 2017, 2, 80.0, [900.0; 4]))
            .with_scene("LS01", reference("recent", 2022, 2, 5.0, [900.0; 4]));
        let region = rectangle("LS01", 2, 2);

        let mask = WaterMaskBuilder::new("SR_B6", 300.0, 30.0)
            .years(&[2016, 2017, 2018])
            .months(&[2])
            .build(&catalog, &region)
            .unwrap();

        assert_eq!(mask.water_pixels(), 4);
    }

    #[test]
    fn test_no_reference_scenes_excludes_everything() {
        let region = rectangle("LS01", 3, 2);
        let mask = WaterMaskBuilder::new("SR_B6", 300.0, 30.0)
            .build(&MemoryCatalog::new(), &region)
            .unwrap();

        assert_eq!(mask.water_pixels(), 0);
        assert_eq!(mask.raster().len(), 6);
    }

    #[test]
    fn test_per_pixel_mean_skips_nan() {
        let a = Raster::from_vec(2, 1, 20.0, vec![1.0, f64::NAN]).unwrap();
        let b = Raster::from_vec(2, 1, 20.0, vec![3.0, f64::NAN]).unwrap();
        let c = Raster::from_vec(2, 1, 20.0, vec![f64::NAN, f64::NAN]).unwrap();
        let mean = per_pixel(&[&a, &b, &c], Reducer::Mean);
        assert_eq!(mean.buffer[0], 2.0);
        assert!(mean.buffer[1].is_nan());
    }
}

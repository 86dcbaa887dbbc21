//! Station regions and their pixel grids.
//!
//! A region is a lon/lat polygon rasterised onto a regular grid whose cells
//! are `scale` metres wide. Row 0 is the northern edge of the bounding box.
//! A cell belongs to the region when its centre lies inside the polygon.

use std::collections::BTreeMap;

use crate::bbox::Bbox;
use crate::engine::{EngineError, Reducer};
use crate::error::PipelineError;
use crate::raster::Raster;

/// Metres per degree of latitude (and of longitude at the equator).
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Tolerance used when snapping the bounding box extent to whole cells.
const GRID_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct Footprint {
    pub width: u32,
    pub height: u32,
    pub inside: Vec<bool>,
}

impl Footprint {
    pub fn pixel_count(&self) -> usize {
        self.inside.iter().filter(|&&inside| inside).count()
    }
}

#[derive(Debug, Clone)]
pub struct Region {
    code: String,
    polygon: Vec<[f64; 2]>,
    bbox: Bbox,
    scale_m: f64,
    max_pixels: f64,
    footprint: Footprint,
}

impl Region {
    pub fn new(
        code: &str,
        polygon: Vec<[f64; 2]>,
        scale_m: f64,
        max_pixels: f64,
    ) -> Result<Self, PipelineError> {
        let invalid = |reason: String| PipelineError::InvalidGeometry {
            station: code.to_string(),
            reason,
        };

        let mut distinct: Vec<[f64; 2]> = Vec::with_capacity(polygon.len());
        for vertex in &polygon {
            if !distinct.contains(vertex) {
                distinct.push(*vertex);
            }
        }
        if distinct.len() < 3 {
            return Err(invalid(format!(
                "polygon needs at least 3 distinct vertices, got {}",
                distinct.len()
            )));
        }
        if !(scale_m.is_finite() && scale_m > 0.0) {
            return Err(invalid(format!("scale must be positive, got {}", scale_m)));
        }

        let bbox = Bbox::from_ring(&polygon).map_err(invalid)?;
        let footprint = rasterize(&polygon, &bbox, scale_m);

        if footprint.width as f64 * footprint.height as f64 > max_pixels {
            return Err(invalid(format!(
                "{}x{} grid exceeds the pixel budget of {}",
                footprint.width, footprint.height, max_pixels
            )));
        }

        Ok(Self {
            code: code.to_string(),
            polygon,
            bbox,
            scale_m,
            max_pixels,
            footprint,
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn polygon(&self) -> &[[f64; 2]] {
        &self.polygon
    }

    pub fn bbox(&self) -> &Bbox {
        &self.bbox
    }

    pub fn scale_m(&self) -> f64 {
        self.scale_m
    }

    pub fn max_pixels(&self) -> f64 {
        self.max_pixels
    }

    /// Grid at the region's native scale.
    pub fn grid(&self) -> &Footprint {
        &self.footprint
    }

    /// Blank raster on the native grid.
    pub fn blank_raster(&self, value: f64) -> Raster {
        Raster::filled(
            self.footprint.width,
            self.footprint.height,
            self.scale_m,
            value,
        )
    }

    pub fn footprint(&self, scale_m: f64) -> Result<Footprint, EngineError> {
        if scale_m == self.scale_m {
            return Ok(self.footprint.clone());
        }
        if !(scale_m.is_finite() && scale_m > 0.0) {
            return Err(EngineError::InvalidScale(scale_m));
        }

        let footprint = rasterize(&self.polygon, &self.bbox, scale_m);
        let requested = footprint.width as f64 * footprint.height as f64;
        if requested > self.max_pixels {
            return Err(EngineError::TooManyPixels {
                requested,
                budget: self.max_pixels,
            });
        }
        Ok(footprint)
    }

    pub fn pixel_count(&self, scale_m: f64) -> Result<usize, EngineError> {
        if scale_m == self.scale_m {
            return Ok(self.footprint.pixel_count());
        }
        Ok(self.footprint(scale_m)?.pixel_count())
    }

    /// Spatial reduction of `raster` over the cells inside the polygon.
    ///
    /// `NaN` cells are skipped. Returns `None` when no valid cell is left,
    /// except for `Count` and `Sum` which yield zero.
    pub fn reduce(
        &self,
        raster: &Raster,
        reducer: Reducer,
        scale_m: f64,
    ) -> Result<Option<f64>, EngineError> {
        let owned;
        let footprint = if scale_m == self.scale_m {
            &self.footprint
        } else {
            owned = self.footprint(scale_m)?;
            &owned
        };

        if raster.width != footprint.width || raster.height != footprint.height {
            return Err(EngineError::GridMismatch {
                expected: (footprint.width, footprint.height),
                actual: (raster.width, raster.height),
            });
        }

        let values: Vec<f64> = raster
            .buffer
            .iter()
            .zip(footprint.inside.iter())
            .filter(|&(v, &inside)| inside && !v.is_nan())
            .map(|(&v, _)| v)
            .collect();

        Ok(reducer.apply(values))
    }
}

fn cell_size_degrees(bbox: &Bbox, scale_m: f64) -> (f64, f64) {
    let dlat = scale_m / METERS_PER_DEGREE;
    let dlon = scale_m / (METERS_PER_DEGREE * bbox.center_lat().to_radians().cos());
    (dlon, dlat)
}

fn cells(extent: f64, cell: f64) -> u32 {
    ((extent / cell) - GRID_EPSILON).ceil().max(1.0) as u32
}

fn rasterize(polygon: &[[f64; 2]], bbox: &Bbox, scale_m: f64) -> Footprint {
    let (dlon, dlat) = cell_size_degrees(bbox, scale_m);
    let width = cells(bbox.width(), dlon);
    let height = cells(bbox.height(), dlat);

    let mut inside = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        let lat = bbox.ymax - (y as f64 + 0.5) * dlat;
        for x in 0..width {
            let lon = bbox.xmin + (x as f64 + 0.5) * dlon;
            inside.push(point_in_polygon(lon, lat, polygon));
        }
    }

    Footprint {
        width,
        height,
        inside,
    }
}

// Even-odd ray casting.
fn point_in_polygon(x: f64, y: f64, polygon: &[[f64; 2]]) -> bool {
    let mut inside = false;
    let n = polygon.len();
    let mut j = n - 1;
    for i in 0..n {
        let [xi, yi] = polygon[i];
        let [xj, yj] = polygon[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Supplies the polygon region of a station.
pub trait GeometryProvider {
    fn region(&self, station: &str) -> Result<Region, PipelineError>;
}

/// Fixed set of station regions, validated once at construction.
#[derive(Debug, Clone, Default)]
pub struct StationRegistry {
    regions: BTreeMap<String, Region>,
}

impl StationRegistry {
    pub fn new(
        stations: &BTreeMap<String, Vec<[f64; 2]>>,
        scale_m: f64,
        max_pixels: f64,
    ) -> Result<Self, PipelineError> {
        let regions = stations
            .iter()
            .map(|(code, ring)| {
                Region::new(code, ring.clone(), scale_m, max_pixels).map(|r| (code.clone(), r))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(Self { regions })
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.regions.keys().map(String::as_str)
    }
}

impl GeometryProvider for StationRegistry {
    fn region(&self, station: &str) -> Result<Region, PipelineError> {
        self.regions
            .get(station)
            .cloned()
            .ok_or_else(|| PipelineError::UnknownStation(station.to_string()))
    }
}

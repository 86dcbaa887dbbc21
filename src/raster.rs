use chrono::NaiveDateTime;
use std::fmt;

use crate::indices::Indicator;

/// Single band grid. Masked or invalid pixels hold `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub scale_m: f64,
    pub buffer: Vec<f64>,
}

impl Raster {
    pub fn filled(width: u32, height: u32, scale_m: f64, value: f64) -> Self {
        Self {
            width,
            height,
            scale_m,
            buffer: vec![value; width as usize * height as usize],
        }
    }

    pub fn from_vec(width: u32, height: u32, scale_m: f64, buffer: Vec<f64>) -> Option<Self> {
        if buffer.len() != width as usize * height as usize {
            return None;
        }
        Some(Self {
            width,
            height,
            scale_m,
            buffer,
        })
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn same_grid(&self, other: &Raster) -> bool {
        self.width == other.width && self.height == other.height
    }

    pub fn get(&self, x: u32, y: u32) -> Option<f64> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.buffer
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    pub fn map<F>(&self, f: F) -> Raster
    where
        F: Fn(f64) -> f64,
    {
        Raster {
            width: self.width,
            height: self.height,
            scale_m: self.scale_m,
            buffer: self.buffer.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Pixel-wise combination of two rasters on the same grid.
    ///
    /// Returns `None` when the grids differ.
    pub fn zip_with<F>(&self, other: &Raster, f: F) -> Option<Raster>
    where
        F: Fn(f64, f64) -> f64,
    {
        if !self.same_grid(other) {
            return None;
        }
        Some(Raster {
            width: self.width,
            height: self.height,
            scale_m: self.scale_m,
            buffer: self
                .buffer
                .iter()
                .zip(other.buffer.iter())
                .map(|(&a, &b)| f(a, b))
                .collect(),
        })
    }

    /// Keeps pixels where `keep` holds, everything else becomes `NaN`.
    /// Values are never clamped.
    pub fn mask_where<F>(&self, keep: F) -> Raster
    where
        F: Fn(f64) -> bool,
    {
        self.map(|v| if keep(v) { v } else { f64::NAN })
    }

    /// Masks every pixel that is `NaN` in `mask`.
    pub fn update_mask(&self, mask: &Raster) -> Option<Raster> {
        self.zip_with(mask, |v, m| if m.is_nan() { f64::NAN } else { v })
    }

    pub fn valid_count(&self) -> usize {
        self.buffer.iter().filter(|v| !v.is_nan()).count()
    }
}

impl fmt::Display for Raster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let valid = self.buffer.iter().copied().filter(|v| !v.is_nan());
        let (min, max) = valid.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });

        write!(
            f,
            "Width: {}\nHeight: {}\nScale: {} m\nValid pixels: {} / {}\nMin value: {}\nMax value: {}",
            self.width,
            self.height,
            self.scale_m,
            self.valid_count(),
            self.len(),
            min,
            max,
        )
    }
}

/// Derived single band raster tagged with its source scene timestamp.
#[derive(Debug, Clone)]
pub struct IndexRaster {
    pub indicator: Indicator,
    pub timestamp: NaiveDateTime,
    pub raster: Raster,
}

/// Open water mask: 1.0 for water, `NaN` for excluded pixels.
#[derive(Debug, Clone)]
pub struct WaterMask {
    raster: Raster,
}

impl WaterMask {
    pub fn from_raster(raster: Raster) -> Self {
        let raster = raster.map(|v| if v.is_nan() || v == 0.0 { f64::NAN } else { 1.0 });
        Self { raster }
    }

    pub fn excluding_all(width: u32, height: u32, scale_m: f64) -> Self {
        Self {
            raster: Raster::filled(width, height, scale_m, f64::NAN),
        }
    }

    pub fn raster(&self) -> &Raster {
        &self.raster
    }

    pub fn water_pixels(&self) -> usize {
        self.raster.valid_count()
    }
}

use thiserror::Error;

use crate::raster::Raster;

pub trait DataReader {
    fn read_data(&self) -> Result<Data, ReadError>;
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("GeoTIFF error: {0}")]
    GeoTiff(String),

    #[error("unknown raster file type: {0}")]
    UnknownFileType(String),
}

#[derive(Debug)]
pub struct Data {
    pub width: u32,
    pub height: u32,
    pub buffer: Vec<f32>,
}

pub enum FileType {
    GeoTiff,
}

impl Data {
    /// Converts to a raster; `nodata` samples become `NaN`.
    pub fn into_raster(self, scale_m: f64, nodata: Option<f32>) -> Raster {
        let buffer = self
            .buffer
            .into_iter()
            .map(|v| {
                if nodata.is_some_and(|nd| v == nd) {
                    f64::NAN
                } else {
                    v as f64
                }
            })
            .collect();

        Raster {
            width: self.width,
            height: self.height,
            scale_m,
            buffer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_raster_masks_nodata() {
        let data = Data {
            width: 3,
            height: 1,
            buffer: vec![0.0, 812.0, 1034.0],
        };
        let raster = data.into_raster(20.0, Some(0.0));
        assert!(raster.buffer[0].is_nan());
        assert_eq!(raster.buffer[1], 812.0);
        assert_eq!(raster.valid_count(), 2);
    }
}

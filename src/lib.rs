pub mod aggregate;
pub mod atmcorr;
pub mod bbox;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod indices;
pub mod pipeline;
pub mod raster;
pub mod readers;
pub mod region;
pub mod report;
pub mod sat_bands;
pub mod scene;
pub mod solar;
pub mod water_mask;

pub use config::Config;
pub use error::PipelineError;
pub use pipeline::Pipeline;

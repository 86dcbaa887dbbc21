use clap::Parser;
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::path::PathBuf;
use std::sync::Arc;

use hydrosight::Config;
use hydrosight::Pipeline;
use hydrosight::catalog::{DirectoryCatalog, MemoryCatalog, SceneCatalog};
use hydrosight::engine::LocalEngine;

#[derive(Debug, Parser)]
#[clap(bin_name = "hydrosight")]
#[clap(author, version, about)]
struct Options {
    /// The path to the JSON configuration file.
    ///
    /// If this is not specified, then the program will check for it in the
    /// "HYDROSIGHT_CONFIG" environment variable.
    #[clap(short, long)]
    #[clap(env = "HYDROSIGHT_CONFIG")]
    config: PathBuf,

    /// Station code, as configured in the stations table.
    #[clap(short, long)]
    station: String,

    /// Calendar year to summarise.
    #[clap(short, long)]
    year: i32,

    /// Print the annual summary instead of the monthly series.
    #[clap(long)]
    annual: bool,

    /// Cloud cover ceiling in percent, overriding the configured value.
    #[clap(long)]
    cloud: Option<f64>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env()
        .init()?;

    let opts = Options::parse();
    let config = Config::from_file(&opts.config)?;

    let Some(scene_directory) = config.scene_directory.clone() else {
        return Err("scene_directory is not set in the configuration".into());
    };
    let catalog: Arc<dyn SceneCatalog> = Arc::new(DirectoryCatalog::new(scene_directory));
    let reference: Arc<dyn SceneCatalog> = match config.reference_directory.clone() {
        Some(dir) => Arc::new(DirectoryCatalog::new(dir)),
        None => {
            log::warn!("No reference_directory configured, the water mask will be empty");
            Arc::new(MemoryCatalog::new())
        }
    };

    let pipeline = Pipeline::new(config, catalog, reference, Arc::new(LocalEngine))?;
    log::debug!(
        "Configured stations: {}",
        pipeline.stations().collect::<Vec<_>>().join(", ")
    );

    let json = if opts.annual {
        serde_json::to_string_pretty(&pipeline.annual(&opts.station, opts.year, opts.cloud)?)?
    } else {
        serde_json::to_string_pretty(&pipeline.monthly(&opts.station, opts.year, opts.cloud)?)?
    };
    println!("{}", json);

    Ok(())
}

use chrono::NaiveDateTime;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::{CatalogError, SceneCatalog, accepts};
use crate::raster::Raster;
use crate::readers::create_reader;
use crate::region::Region;
use crate::scene::{DateRange, Scene, SceneMetadata};

const SCENE_FILE: &str = "scene.json";

/// Contents of a `scene.json` file.
#[derive(Debug, Deserialize)]
struct SceneRecord {
    id: Option<String>,
    station: String,
    timestamp: NaiveDateTime,
    cloud_pct: f64,
    nodata: Option<f32>,
    #[serde(flatten)]
    metadata: SceneMetadata,
}

/// Scenes stored on disk, one directory per scene:
///
/// ```text
/// <root>/<scene>/scene.json
/// <root>/<scene>/B1.tif
/// <root>/<scene>/B2.tif
/// ...
/// ```
///
/// Band rasters must already be resampled onto the region grid.
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    root: PathBuf,
}

impl DirectoryCatalog {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_record(path: &Path) -> Result<SceneRecord, CatalogError> {
        let reader = BufReader::new(File::open(path)?);
        serde_json::from_reader(reader).map_err(|source| CatalogError::Json {
            path: path.display().to_string(),
            source,
        })
    }

    fn read_bands(
        dir: &Path,
        scale_m: f64,
        nodata: Option<f32>,
    ) -> Result<BTreeMap<String, Raster>, CatalogError> {
        let pattern = Path::new(&glob::Pattern::escape(&dir.to_string_lossy())).join("*.tif");
        let mut bands = BTreeMap::new();

        for entry in glob::glob(&pattern.to_string_lossy())? {
            let path = entry.map_err(|e| CatalogError::Io(e.into_error()))?;
            let Some(name) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else {
                continue;
            };
            let data = create_reader(&path)?.read_data()?;
            bands.insert(name, data.into_raster(scale_m, nodata));
        }

        Ok(bands)
    }
}

impl SceneCatalog for DirectoryCatalog {
    fn query(
        &self,
        region: &Region,
        range: DateRange,
        cloud_ceiling: f64,
    ) -> Result<Vec<Scene>, CatalogError> {
        let grid = region.grid();
        let mut scenes = Vec::new();

        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() > 0 => {
                    log::warn!("Skipping catalog entry: {}", e);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if !entry.file_type().is_file() || entry.file_name() != SCENE_FILE {
                continue;
            }

            let record = match Self::read_record(entry.path()) {
                Ok(record) => record,
                Err(e) => {
                    log::warn!("Skipping scene at {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            if record.station != region.code() {
                continue;
            }

            let Some(dir) = entry.path().parent() else {
                continue;
            };
            let id = record.id.clone().unwrap_or_else(|| {
                dir.file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default()
            });

            let mut scene = Scene {
                id,
                timestamp: record.timestamp,
                cloud_pct: record.cloud_pct,
                metadata: record.metadata,
                bands: BTreeMap::new(),
            };
            if !accepts(&scene, &range, cloud_ceiling) {
                continue;
            }

            scene.bands = match Self::read_bands(dir, region.scale_m(), record.nodata) {
                Ok(bands) => bands,
                Err(e) => {
                    log::warn!("Skipping scene {}: {}", scene.id, e);
                    continue;
                }
            };

            if let Some((band, raster)) = scene
                .bands
                .iter()
                .find(|(_, r)| r.width != grid.width || r.height != grid.height)
            {
                log::warn!(
                    "Skipping scene {}: band {} is {}x{}, region grid is {}x{}",
                    scene.id,
                    band,
                    raster.width,
                    raster.height,
                    grid.width,
                    grid.height
                );
                continue;
            }

            log::debug!("Found scene {} ({} bands)", scene.id, scene.bands.len());
            scenes.push(scene);
        }

        scenes.sort_by_key(|s| s.timestamp);
        Ok(scenes)
    }
}

//! Scene catalogs.
//!
//! A catalog answers one question: which scenes of a region were acquired
//! inside a date window with a cloud cover strictly below a ceiling.
//! Results are ordered by acquisition time.

use thiserror::Error;

use crate::readers::ReadError;
use crate::region::Region;
use crate::scene::{DateRange, Scene};

pub mod directory;

pub use directory::DirectoryCatalog;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse scene metadata {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Read(#[from] ReadError),

    #[error("failed to walk scene directory: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("invalid band file pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

pub trait SceneCatalog: Send + Sync {
    fn query(
        &self,
        region: &Region,
        range: DateRange,
        cloud_ceiling: f64,
    ) -> Result<Vec<Scene>, CatalogError>;
}

/// Whether a scene passes the date and cloud filters of a query.
pub(crate) fn accepts(scene: &Scene, range: &DateRange, cloud_ceiling: f64) -> bool {
    range.contains(&scene.timestamp) && scene.cloud_pct < cloud_ceiling
}

/// Scenes held in memory, keyed by station code.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    scenes: Vec<(String, Scene)>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, station: &str, scene: Scene) {
        self.scenes.push((station.to_string(), scene));
    }

    pub fn with_scene(mut self, station: &str, scene: Scene) -> Self {
        self.insert(station, scene);
        self
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}

impl SceneCatalog for MemoryCatalog {
    fn query(
        &self,
        region: &Region,
        range: DateRange,
        cloud_ceiling: f64,
    ) -> Result<Vec<Scene>, CatalogError> {
        let mut scenes: Vec<Scene> = self
            .scenes
            .iter()
            .filter(|(station, scene)| {
                station == region.code() && accepts(scene, &range, cloud_ceiling)
            })
            .map(|(_, scene)| scene.clone())
            .collect();

        scenes.sort_by_key(|s| s.timestamp);
        Ok(scenes)
    }
}

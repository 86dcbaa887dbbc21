use serde::Deserialize;
use std::fmt;

use crate::engine::Reducer;

/// How per-scene index rasters are turned into one scalar per bucket.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    /// Per-pixel composite across scenes, then one spatial reduction.
    #[default]
    Composite,
    /// One spatial reduction per scene, then a reduction of the scalars.
    SceneWise,
}

/// Per-pixel reducer used to build composites.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompositeReducer {
    #[default]
    Mean,
    Median,
}

impl CompositeReducer {
    pub fn reducer(self) -> Reducer {
        match self {
            CompositeReducer::Mean => Reducer::Mean,
            CompositeReducer::Median => Reducer::Median,
        }
    }
}

impl fmt::Display for AggregationMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AggregationMode::Composite => write!(f, "composite"),
            AggregationMode::SceneWise => write!(f, "scene_wise"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modes_from_json() {
        let mode: AggregationMode = serde_json::from_str(r#""scene_wise""#).unwrap();
        assert_eq!(mode, AggregationMode::SceneWise);
        assert_eq!(mode.to_string(), "scene_wise");

        let reducer: CompositeReducer = serde_json::from_str(r#""median""#).unwrap();
        assert_eq!(reducer.reducer(), Reducer::Median);

        assert!(serde_json::from_str::<AggregationMode>(r#""weekly""#).is_err());
    }
}

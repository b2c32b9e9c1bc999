use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::error::{BulletpointerError, BulletpointerResult};

/// One annotated source SVG and the slides derived from it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageDescriptor {
    /// Source path, relative to the directory holding the config file.
    pub filename: String,
    /// Slides in processing order. Toggles accumulate from one layer to the next.
    #[serde(default)]
    pub layers: Vec<LayerDescriptor>,
}

/// One slide of an image: a file-name suffix plus the element ids to hide and show.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayerDescriptor {
    pub suffix: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hide_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub show_ids: Vec<String>,
}

pub fn parse_config(text: &str) -> BulletpointerResult<Vec<ImageDescriptor>> {
    serde_yaml::from_str(text).map_err(|e| BulletpointerError::config(e.to_string()))
}

/// Read and parse the whole configuration. Nothing is returned unless every entry parses.
pub fn load_config(path: &Path) -> BulletpointerResult<Vec<ImageDescriptor>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config '{}'", path.display()))?;
    let images = parse_config(&text).map_err(|e| match e {
        BulletpointerError::Config(msg) => {
            BulletpointerError::config(format!("'{}': {msg}", path.display()))
        }
        other => other,
    })?;
    tracing::debug!(path = %path.display(), images = images.len(), "loaded config");
    Ok(images)
}

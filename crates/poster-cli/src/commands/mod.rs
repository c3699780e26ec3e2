//! Subcommands and the helpers they share.

pub mod config;
pub mod extract;
pub mod serve;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use poster_core::{PosterConfig, PureOcrEngine, RecognitionEngine};

/// Default location of the configuration file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("poster")
        .join("config.json")
}

/// Load the config from `-c`, else the default path, else built-in defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<PosterConfig> {
    if let Some(path) = config_path {
        return PosterConfig::from_file(Path::new(path))
            .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path, e));
    }

    let default_path = default_config_path();
    if default_path.exists() {
        debug!("Loading config from {}", default_path.display());
        Ok(PosterConfig::from_file(&default_path)?)
    } else {
        Ok(PosterConfig::default())
    }
}

/// Load the recognition engine, or `None` when the models are missing.
///
/// Without an engine every request runs on the vision route.
pub fn load_engine(config: &PosterConfig) -> Option<Arc<dyn RecognitionEngine>> {
    match PureOcrEngine::from_config(config) {
        Ok(engine) => Some(Arc::new(engine)),
        Err(e) => {
            warn!(
                "Recognition models unavailable in {} ({}), using vision only",
                config.models.model_dir.display(),
                e
            );
            None
        }
    }
}

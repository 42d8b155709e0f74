/// Shell configuration
use anyhow::{Context, Result};
use encore_playback::PlaybackConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CliConfig {
    #[serde(default)]
    pub library: LibrarySettings,

    #[serde(default)]
    pub state: StateSettings,

    #[serde(default)]
    pub playback: PlaybackConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibrarySettings {
    /// JSON array of tracks
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StateSettings {
    /// Queue snapshot file
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
}

impl CliConfig {
    /// Load configuration from file and environment
    ///
    /// Without an explicit path `encore.toml` in the working directory is
    /// used when it exists. Environment variables override file values, with
    /// `__` between nesting levels: `ENCORE_PLAYBACK__IDLE_TIMEOUT_MS=60000`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path.to_path_buf()));
            }
            None => {
                let default_path = PathBuf::from("encore.toml");
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        // Override with environment variables (prefixed with ENCORE_)
        settings = settings.add_source(
            config::Environment::with_prefix("ENCORE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = settings
            .build()
            .context("Failed to read configuration")?;

        config
            .try_deserialize()
            .context("Invalid configuration")
    }
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            manifest: default_manifest(),
        }
    }
}

impl Default for StateSettings {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

// Default values
fn default_manifest() -> PathBuf {
    PathBuf::from("library.json")
}

fn default_state_path() -> PathBuf {
    PathBuf::from("./data/queue.json")
}

//! Arguments and setup shared by the procedure binaries.
use anyhow::Result;
use serde::de::DeserializeOwned;
use std::path::PathBuf;

use crate::config::{load_json, SessionConfig};

/// `--subject --stimulus --segment --base-path [--config params.json]`.
#[derive(clap::Args, Debug, Clone)]
pub struct SessionArgs {
    /// Subject id
    #[arg(long, default_value = "pilot-2")]
    pub subject: String,

    /// Stimulus name
    #[arg(long, default_value = "Jobs1")]
    pub stimulus: String,

    /// Segment label
    #[arg(long, default_value = "segment_1")]
    pub segment: String,

    /// Project root holding segmented_data/, annotations/ and vis/
    #[arg(long, default_value = ".")]
    pub base_path: PathBuf,

    /// JSON file overriding the procedure parameters
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl SessionArgs {
    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            subject: self.subject.clone(),
            stimulus: self.stimulus.clone(),
            segment: self.segment.clone(),
            base_path: self.base_path.clone(),
        }
    }

    /// Procedure parameters from `--config`, or their defaults.
    pub fn params<T: DeserializeOwned + Default>(&self) -> Result<T> {
        match &self.config {
            Some(path) => load_json(path),
            None => Ok(T::default()),
        }
    }
}

/// `env_logger` at `info` unless `RUST_LOG` says otherwise.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();
}

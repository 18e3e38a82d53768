//! Errors returned while loading configuration.

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to load config file {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: config::ConfigError,
    },
}

//! Resolver configuration.
//!
//! Configuration is an explicit value threaded through every call; there is
//! no ambient "current configuration". It is usually loaded from a
//! `weave.toml`:
//!
//! ```toml
//! strict_dependencies = true
//! suppress_generic_definitions = true
//!
//! [batch]
//! parallel = true
//! deadline_ms = 250
//! threads = 4
//! ```

use crate::hash::ContentHash;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "weave.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverConfig {
    /// Report a dependency on a type that is neither a present mixin, an
    /// interface, nor a present generic definition as unsatisfied. When off,
    /// such dependencies are ignored with a warning.
    pub strict_dependencies: bool,

    /// Let a suppression naming a generic definition remove every closed
    /// application of it.
    pub suppress_generic_definitions: bool,

    pub batch: BatchConfig,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            strict_dependencies: true,
            suppress_generic_definitions: true,
            batch: BatchConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    /// Resolve independent targets on the rayon pool.
    pub parallel: bool,

    /// Stop scheduling new targets once this much time has passed since the
    /// batch started. Targets already running finish normally.
    pub deadline_ms: Option<u64>,

    /// Size of a dedicated thread pool; the global pool when unset.
    pub threads: Option<usize>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            deadline_ms: None,
            threads: None,
        }
    }
}

impl BatchConfig {
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }
}

impl ResolverConfig {
    /// Parse configuration text. `origin` only labels errors.
    pub fn from_toml_str(text: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::ParseToml {
            path: origin.to_string(),
            source,
        })
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text, &path.display().to_string())
    }

    /// Load configuration if the file exists, defaults otherwise.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Digest of the settings that change resolution results.
    ///
    /// Batch scheduling settings are excluded: they never change a plan.
    pub fn semantic_digest(&self) -> ContentHash {
        ContentHash::builder()
            .field(
                "strict_dependencies",
                if self.strict_dependencies { "true" } else { "false" },
            )
            .field(
                "suppress_generic_definitions",
                if self.suppress_generic_definitions {
                    "true"
                } else {
                    "false"
                },
            )
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid toml at {path}: {source}")]
    ParseToml {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

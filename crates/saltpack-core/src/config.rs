use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CoreError, CoreResult};

/// Default chunk size for encryption and attached signing (1 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Top-level configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SaltpackConfig {
    pub encrypt: EncryptConfig,
    pub sign: SignConfig,
    pub armor: ArmorConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EncryptConfig {
    /// Plaintext bytes per chunk frame (default: 1 MiB)
    pub chunk_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SignConfig {
    /// Message bytes per signed chunk for attached signatures (default: 1 MiB)
    pub chunk_size: usize,
}

/// ASCII armor layout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ArmorConfig {
    /// Characters per word (default: 15)
    pub word_size: usize,
    /// Words per line (default: 5)
    pub words_per_line: usize,
    /// Omit the BEGIN/END framing lines
    pub raw: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for EncryptConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Default for SignConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Default for ArmorConfig {
    fn default() -> Self {
        Self {
            word_size: 15,
            words_per_line: 5,
            raw: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl SaltpackConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> CoreResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file does not exist.
    ///
    /// A missing file is not reported here; logging is usually not set up yet.
    pub fn load(path: &Path) -> CoreResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.encrypt.chunk_size == 0 {
            return Err(CoreError::Config("encrypt.chunk_size must be positive".into()));
        }
        if self.sign.chunk_size == 0 {
            return Err(CoreError::Config("sign.chunk_size must be positive".into()));
        }
        if self.armor.word_size == 0 || self.armor.words_per_line == 0 {
            return Err(CoreError::Config(
                "armor.word_size and armor.words_per_line must be positive".into(),
            ));
        }
        match self.logging.format.as_str() {
            "json" | "text" => Ok(()),
            other => Err(CoreError::Config(format!(
                "logging.format must be \"json\" or \"text\", got {other:?}"
            ))),
        }
    }
}

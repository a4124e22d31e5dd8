//! Engine configuration
//!
//! Settings can come from a TOML file or be built in code:
//!
//! ```toml
//! concurrency_cap = 100
//! poll_interval_ms = 50
//! block_size = 131072
//! cache_extension = "tfc"
//! low_memory = false
//! chunk_codec = "lzo"
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_CACHE_EXTENSION;
use crate::chunk::{DEFAULT_BLOCK_SIZE, MAX_BLOCK_SIZE};
use crate::compression::BlockCodec;
use crate::error::{Error, Result};

/// Settings shared by the codec and the batch engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Most jobs running at once
    pub concurrency_cap: usize,
    /// Status poll interval for batch waiters
    pub poll_interval_ms: u64,
    /// Block size for newly encoded chunks
    pub block_size: u32,
    /// Extension of texture cache files
    pub cache_extension: String,
    /// Drop compressed chunk bodies once decoded
    pub low_memory: bool,
    /// Codec for newly encoded chunks
    pub chunk_codec: BlockCodec,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency_cap: 100,
            poll_interval_ms: 50,
            block_size: DEFAULT_BLOCK_SIZE,
            cache_extension: DEFAULT_CACHE_EXTENSION.to_string(),
            low_memory: false,
            chunk_codec: BlockCodec::Lzo,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document
    ///
    /// # Errors
    /// Returns [`Error::ConfigParse`] for malformed TOML or
    /// [`Error::InvalidConfig`] for out-of-range values.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is invalid.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    /// Serialize to TOML
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] describing the first bad value.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency_cap == 0 {
            return Err(Error::InvalidConfig("concurrency_cap must be at least 1".to_string()));
        }
        if self.block_size == 0 || self.block_size > MAX_BLOCK_SIZE {
            return Err(Error::InvalidConfig(format!(
                "block_size must be between 1 and {MAX_BLOCK_SIZE}, got {}",
                self.block_size
            )));
        }
        if self.cache_extension.trim_start_matches('.').is_empty() {
            return Err(Error::InvalidConfig("cache_extension must not be empty".to_string()));
        }
        Ok(())
    }

    #[must_use]
    pub fn with_concurrency_cap(mut self, cap: usize) -> Self {
        self.concurrency_cap = cap;
        self
    }

    #[must_use]
    pub fn with_poll_interval_ms(mut self, millis: u64) -> Self {
        self.poll_interval_ms = millis;
        self
    }

    #[must_use]
    pub fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    #[must_use]
    pub fn with_cache_extension(mut self, extension: impl Into<String>) -> Self {
        self.cache_extension = extension.into();
        self
    }

    #[must_use]
    pub fn with_low_memory(mut self, low_memory: bool) -> Self {
        self.low_memory = low_memory;
        self
    }

    #[must_use]
    pub fn with_chunk_codec(mut self, codec: BlockCodec) -> Self {
        self.chunk_codec = codec;
        self
    }
}

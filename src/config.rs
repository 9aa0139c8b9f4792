//! Protocol configuration threaded through packet and frame constructors.
//!
//! The protocol sub-version decides which reserved bits carry meaning (pad-bit
//! counts, ephemeris adjuncts) and therefore what the validity checks accept.
//! A configuration is a plain `Copy` value: it is chosen once at the boundary
//! (CLI, service startup, test) and handed to every packet that needs it.
//!
//! ```rust
//! use vrtkit::{ProtocolVersion, VrtConfig};
//!
//! let config = VrtConfig::from_yaml_str("version: V49\nstrict: true\n").unwrap();
//! assert_eq!(config.version, ProtocolVersion::V49);
//! assert!(config.strict);
//! ```

use crate::{Result, VrtError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Largest legal VRL frame in bytes (20-bit word count).
pub const MAX_FRAME_LENGTH: usize = 0x000F_FFFF * 4;

/// VITA-49 protocol sub-version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProtocolVersion {
    /// Strict VITA-49.0: all reserved bits must be zero.
    V49,
    /// VITA-49.0b: pad-bit counts in the class identifier, ephemeris adjuncts.
    #[default]
    V49b,
}

impl ProtocolVersion {
    /// Whether the VITA-49.0b extensions are enabled.
    pub fn is_v49b(self) -> bool {
        self == ProtocolVersion::V49b
    }
}

/// Configuration for packet validation and encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VrtConfig {
    /// Protocol sub-version used for reserved-bit checks and optional encodings.
    pub version: ProtocolVersion,
    /// Strict validation: buffers must match declared lengths exactly.
    pub strict: bool,
    /// Upper bound used when packing packets into VRL frames.
    pub max_frame_length: usize,
    /// Whether VRL frames written by this crate carry a CRC.
    pub crc: bool,
}

impl Default for VrtConfig {
    fn default() -> Self {
        Self {
            version: ProtocolVersion::default(),
            strict: false,
            max_frame_length: MAX_FRAME_LENGTH,
            crc: true,
        }
    }
}

impl VrtConfig {
    /// Configuration for strict VITA-49.0 handling.
    pub fn v49() -> Self {
        Self { version: ProtocolVersion::V49, ..Self::default() }
    }

    /// Configuration for VITA-49.0b handling.
    pub fn v49b() -> Self {
        Self { version: ProtocolVersion::V49b, ..Self::default() }
    }

    /// Parse a configuration from YAML. Missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: VrtConfig = serde_yaml_ng::from_str(yaml).map_err(|e| VrtError::Config {
            details: "Failed to parse VRT configuration".to_string(),
            source: Some(e),
        })?;
        config.validate()?;
        debug!(?config, "Loaded VRT configuration");
        Ok(config)
    }

    /// Load a configuration from a YAML file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(&path)
            .map_err(|e| VrtError::File { path: path.as_ref().to_path_buf(), source: e })?;
        Self::from_yaml_str(&text)
    }

    /// Check that the configured bounds are legal.
    pub fn validate(&self) -> Result<()> {
        if self.max_frame_length < crate::frame::MIN_FRAME_LENGTH
            || self.max_frame_length > MAX_FRAME_LENGTH
            || self.max_frame_length % 4 != 0
        {
            return Err(VrtError::Config {
                details: format!(
                    "max_frame_length {} must be a multiple of 4 in [{}, {}]",
                    self.max_frame_length,
                    crate::frame::MIN_FRAME_LENGTH,
                    MAX_FRAME_LENGTH
                ),
                source: None,
            });
        }
        Ok(())
    }
}

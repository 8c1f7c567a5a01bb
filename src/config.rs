//! Ambient configuration layer.
//!
//! Extraction parameters (tuning reference, duration, pattern grouping) are
//! not part of the notation format itself, but still need a place to live
//! between the CLI and the library. Mirrors the TOML-plus-defaults approach
//! used elsewhere in this codebase: a baked-in default document merged with
//! anything the caller supplies.

use serde::{Deserialize, Serialize};

use crate::error::{NotationError, Result};

pub const DEFAULT_CONFIG: &str = r###"
[extraction]
tuning_hz = 440.0
duration_seconds = 120
pattern_length = 256
"###;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// A4 reference frequency used to build the pitch tables.
    pub tuning_hz: f64,
    /// Seconds of audio to emulate per track.
    pub duration_seconds: u32,
    /// Advisory grouping width recorded on each `SongData`.
    pub pattern_length: u32,
}

#[derive(Debug, Deserialize)]
struct ConfigDoc {
    extraction: ExtractionConfig,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        toml::from_str::<ConfigDoc>(DEFAULT_CONFIG)
            .expect("built-in default config is valid TOML")
            .extraction
    }
}

impl ExtractionConfig {
    /// Loads config from a TOML document. The document must supply every
    /// field of `[extraction]`; a partial document fails to parse rather
    /// than falling back to defaults field-by-field.
    pub fn from_toml_str(doc: &str) -> Result<ExtractionConfig> {
        let parsed: ConfigDoc = toml::from_str(doc)
            .map_err(|e| NotationError::EncodingError(format!("invalid config: {e}")))?;
        Ok(parsed.extraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_parses() {
        let cfg = ExtractionConfig::default();
        assert_eq!(cfg.tuning_hz, 440.0);
        assert_eq!(cfg.duration_seconds, 120);
        assert_eq!(cfg.pattern_length, 256);
    }

    #[test]
    fn overrides_apply() {
        let cfg = ExtractionConfig::from_toml_str(
            "[extraction]\ntuning_hz = 432.0\nduration_seconds = 30\npattern_length = 64\n",
        )
        .unwrap();
        assert_eq!(cfg.tuning_hz, 432.0);
        assert_eq!(cfg.duration_seconds, 30);
        assert_eq!(cfg.pattern_length, 64);
    }

    #[test]
    fn partial_document_is_rejected() {
        let err = ExtractionConfig::from_toml_str("[extraction]\ntuning_hz = 432.0\n").unwrap_err();
        assert!(matches!(err, NotationError::EncodingError(_)));
    }
}

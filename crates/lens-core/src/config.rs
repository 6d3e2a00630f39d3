//! Extractor configuration.
//!
//! Stored as a JSON file; every field is optional on disk.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::disasm::UnknownOpcodePolicy;
use crate::opcodes::Fork;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Opcode table to decode with.
    pub fork: Fork,
    /// Handling of bytes with no opcode-table entry.
    pub unknown_opcodes: UnknownOpcodePolicy,
    /// Fill the memory access columns instead of leaving them at zero.
    pub memory_features: bool,
    /// Batch worker count. `None` or 0 picks the machine default.
    pub workers: Option<usize>,
}

impl ExtractorConfig {
    /// Load a configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let config: ExtractorConfig = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        Ok(config)
    }

    /// Save the configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Effective number of batch workers (always at least 1).
    pub fn worker_count(&self) -> usize {
        match self.workers {
            Some(n) if n > 0 => n,
            _ => default_worker_count(),
        }
    }
}

/// Available hardware parallelism minus one, never below 1.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

/// Errors that can occur while loading or saving a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "I/O error: {}", e),
            ConfigError::ParseError(e) => write!(f, "Parse error: {}", e),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = ExtractorConfig::default();
        assert_eq!(config.fork, Fork::London);
        assert_eq!(config.unknown_opcodes, UnknownOpcodePolicy::Stop);
        assert!(!config.memory_features);
        assert!(config.worker_count() >= 1);
    }

    #[test]
    fn test_worker_count() {
        let mut config = ExtractorConfig::default();
        config.workers = Some(3);
        assert_eq!(config.worker_count(), 3);

        config.workers = Some(0);
        assert_eq!(config.worker_count(), default_worker_count());
        assert!(default_worker_count() >= 1);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ExtractorConfig =
            serde_json::from_str(r#"{"fork": "istanbul", "unknown_opcodes": "invalid"}"#).unwrap();
        assert_eq!(config.fork, Fork::Istanbul);
        assert_eq!(config.unknown_opcodes, UnknownOpcodePolicy::Invalid);
        assert_eq!(config.workers, None);
        assert!(!config.memory_features);
    }

    #[test]
    fn test_save_and_load() {
        let file = NamedTempFile::new().unwrap();
        let config = ExtractorConfig {
            fork: Fork::Byzantium,
            unknown_opcodes: UnknownOpcodePolicy::Invalid,
            memory_features: true,
            workers: Some(2),
        };
        config.save(file.path()).unwrap();

        let loaded = ExtractorConfig::load(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_errors() {
        let missing = ExtractorConfig::load(Path::new("/nonexistent/evm-lens.json"));
        assert!(matches!(missing, Err(ConfigError::IoError(_))));

        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "{ not json").unwrap();
        let bad = ExtractorConfig::load(file.path());
        assert!(matches!(bad, Err(ConfigError::ParseError(_))));
    }
}

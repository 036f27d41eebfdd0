//! Shields configuration

use crate::channel::DEFAULT_MESSAGE_HANDLER;
use crate::utils::{Result, ShieldsError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Policy knobs for tracker statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShieldsConfig {
    /// Host handler name reports are posted under
    pub message_handler: String,
    /// Treat images with zero natural width at page load as blocked
    pub report_unrendered_images: bool,
}

impl Default for ShieldsConfig {
    fn default() -> Self {
        Self {
            message_handler: DEFAULT_MESSAGE_HANDLER.to_string(),
            report_unrendered_images: true,
        }
    }
}

impl ShieldsConfig {
    /// Parse a JSON configuration; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.message_handler.trim().is_empty() {
            return Err(ShieldsError::Config("message_handler must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ShieldsConfig::default();
        assert_eq!(config.message_handler, "trackingProtectionStats");
        assert!(config.report_unrendered_images);
    }

    #[test]
    fn test_partial_json() {
        let config = ShieldsConfig::from_json(r#"{ "report_unrendered_images": false }"#).unwrap();
        assert_eq!(config.message_handler, DEFAULT_MESSAGE_HANDLER);
        assert!(!config.report_unrendered_images);
    }

    #[test]
    fn test_rejects_empty_handler() {
        let result = ShieldsConfig::from_json(r#"{ "message_handler": " " }"#);
        assert!(matches!(result, Err(ShieldsError::Config(_))));
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let result = ShieldsConfig::from_json(r#"{ "poll_interval_ms": 500 }"#);
        assert!(matches!(result, Err(ShieldsError::Encoding(_))));
    }
}

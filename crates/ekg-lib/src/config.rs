use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Tunables for parsing, flagging and prompt construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Header key (case-insensitive) carrying the sampling rate.
    pub rate_label: String,
    /// Multiple of the population standard deviation a sample-to-sample jump
    /// must exceed to be flagged.
    pub threshold_factor: f64,
    pub prompt: PromptConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            rate_label: "Messrate".into(),
            threshold_factor: 1.5,
            prompt: PromptConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PromptConfig {
    pub model: String,
    /// Number of leading samples quoted in the prompt.
    pub preview_samples: usize,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".into(),
            preview_samples: 100,
            temperature: 0.2,
            max_tokens: 500,
            template: None,
        }
    }
}

pub fn read_config(path: &Path) -> Result<AnalysisConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: AnalysisConfig =
        toml::from_str(&contents).with_context(|| format!("parsing config {}", path.display()))?;
    if !(config.threshold_factor.is_finite() && config.threshold_factor >= 0.0) {
        anyhow::bail!(
            "threshold_factor must be a non-negative number, got {}",
            config.threshold_factor
        );
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ekg.toml");
        fs::write(&path, "threshold_factor = 2.0\n[prompt]\npreview_samples = 10\n").unwrap();
        let config = read_config(&path).unwrap();
        assert_eq!(config.threshold_factor, 2.0);
        assert_eq!(config.rate_label, "Messrate");
        assert_eq!(config.prompt.preview_samples, 10);
        assert_eq!(config.prompt.model, "gpt-4o");
        assert!(config.prompt.template.is_none());
    }

    #[test]
    fn rejects_negative_threshold() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ekg.toml");
        fs::write(&path, "threshold_factor = -1.0\n").unwrap();
        assert!(read_config(&path).is_err());
    }

    #[test]
    fn reads_shared_fixture() {
        let manifest_dir = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        let path = manifest_dir
            .parent()
            .and_then(|p| p.parent())
            .expect("workspace")
            .join("test_data/ekg.toml");
        let config = read_config(&path).unwrap();
        assert_eq!(config.rate_label, "Sample Rate");
        assert!(config.prompt.template.is_some());
    }
}

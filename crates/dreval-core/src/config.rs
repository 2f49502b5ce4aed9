//! Run configuration.
//!
//! Loaded from a YAML document with two sections: `evaluator` (orchestrator
//! knobs) and `modules` (per-role bindings). Unrecognized keys are ignored,
//! so configs written for newer harness versions still load.

use crate::record::RecordField;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Which phases a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvalMode {
    /// Fused per-batch inference + analysis.
    #[serde(rename = "one step", alias = "one-step")]
    OneStep,
    /// Inference phase, then analysis phase.
    #[serde(rename = "two step", alias = "two-step")]
    TwoStep,
    #[serde(rename = "only inference", alias = "only-inference")]
    OnlyInference,
    #[serde(rename = "only analysis", alias = "only-analysis")]
    OnlyAnalysis,
}

/// Verbosity of the per-version `log.txt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    pub(crate) fn rank(self) -> u8 {
        match self {
            LogLevel::Error => 0,
            LogLevel::Warn => 1,
            LogLevel::Info => 2,
            LogLevel::Debug => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Case-insensitive so both `info` and the original `INFO` spelling load.
impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        match raw.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            other => Err(serde::de::Error::custom(format!(
                "unknown log level `{other}`"
            ))),
        }
    }
}

/// Orchestrator settings. Everything except `output_path` has a default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    pub output_path: PathBuf,
    #[serde(default = "defaults::mode")]
    pub mode: EvalMode,
    #[serde(default = "defaults::one")]
    pub batch_size: usize,
    #[serde(default = "defaults::one")]
    pub inference_batch_size: usize,
    #[serde(default = "defaults::one")]
    pub analysis_batch_size: usize,
    #[serde(default = "defaults::one")]
    pub threads: usize,
    #[serde(default = "defaults::one")]
    pub inference_threads: usize,
    #[serde(default = "defaults::one")]
    pub analysis_threads: usize,
    /// When set, each execution opens a fresh version directory instead of
    /// continuing the newest one.
    #[serde(default)]
    pub resume: bool,
    #[serde(default = "defaults::max_version")]
    pub max_version: usize,
    /// When false, inference records live only in memory for this process.
    #[serde(default = "defaults::enabled")]
    pub record_inference: bool,
    #[serde(default = "defaults::enabled")]
    pub record_analysis: bool,
    #[serde(default = "defaults::enabled")]
    pub summary: bool,
    #[serde(default = "defaults::inference_record_key")]
    pub inference_record_key: Vec<RecordField>,
    #[serde(default = "defaults::analysis_record_key")]
    pub analysis_record_key: Vec<RecordField>,
    #[serde(default = "defaults::enabled")]
    pub save_log: bool,
    #[serde(default = "defaults::log_level")]
    pub log_level: LogLevel,
}

impl EvaluatorConfig {
    /// A config with every knob at its default.
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            mode: defaults::mode(),
            batch_size: 1,
            inference_batch_size: 1,
            analysis_batch_size: 1,
            threads: 1,
            inference_threads: 1,
            analysis_threads: 1,
            resume: false,
            max_version: defaults::max_version(),
            record_inference: true,
            record_analysis: true,
            summary: true,
            inference_record_key: defaults::inference_record_key(),
            analysis_record_key: defaults::analysis_record_key(),
            save_log: true,
            log_level: defaults::log_level(),
        }
    }
}

mod defaults {
    use super::{EvalMode, LogLevel};
    use crate::record::RecordField;

    pub(super) fn mode() -> EvalMode {
        EvalMode::OneStep
    }

    pub(super) fn one() -> usize {
        1
    }

    pub(super) fn max_version() -> usize {
        10
    }

    pub(super) fn enabled() -> bool {
        true
    }

    pub(super) fn log_level() -> LogLevel {
        LogLevel::Info
    }

    pub(super) fn inference_record_key() -> Vec<RecordField> {
        vec![
            RecordField::Index,
            RecordField::Mark,
            RecordField::Input,
            RecordField::Output,
        ]
    }

    pub(super) fn analysis_record_key() -> Vec<RecordField> {
        vec![
            RecordField::Index,
            RecordField::Mark,
            RecordField::Output,
            RecordField::Label,
            RecordField::Analysis,
        ]
    }
}

/// One role binding: implementation name plus constructor arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleBinding {
    pub cls: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// The four role bindings of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleBindings {
    pub dataset: ModuleBinding,
    /// The scorable method under evaluation.
    pub method: ModuleBinding,
    pub analyzer: ModuleBinding,
    pub summarizer: ModuleBinding,
}

/// Full configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub evaluator: EvaluatorConfig,
    pub modules: ModuleBindings,
}

impl Config {
    pub fn from_yaml_str(text: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(text).context("failed to parse configuration")
    }

    pub fn from_yaml_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration {}", path.display()))?;
        Self::from_yaml_str(&text)
            .with_context(|| format!("in configuration {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
evaluator:
  output_path: out/run
  mode: two-step
  inference_batch_size: 4
  inference_threads: 8
  resume: true
  max_version: 3
  log_level: INFO
  some_future_knob: 42
modules:
  dataset:
    cls: jsonl
    args:
      data_path: data/items.jsonl
  method:
    cls: openai_api
    args:
      api_key: sk-test
      base_url: https://example.invalid/v1
  analyzer:
    cls: exact_match
  summarizer:
    cls: qa
"#;

    #[test]
    fn sample_config_loads_with_unknown_keys_ignored() {
        let config = Config::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.evaluator.mode, EvalMode::TwoStep);
        assert_eq!(config.evaluator.inference_batch_size, 4);
        assert_eq!(config.evaluator.inference_threads, 8);
        assert!(config.evaluator.resume);
        assert_eq!(config.evaluator.max_version, 3);
        assert_eq!(config.evaluator.log_level, LogLevel::Info);
        assert_eq!(config.modules.dataset.cls, "jsonl");
        assert_eq!(config.modules.analyzer.args, serde_json::Value::Null);
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = EvaluatorConfig::new("out");
        assert_eq!(config.mode, EvalMode::OneStep);
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.max_version, 10);
        assert!(config.record_inference);
        assert!(config.summary);
        assert_eq!(config.inference_record_key.len(), 4);
        assert_eq!(config.analysis_record_key.len(), 5);
    }

    #[test]
    fn mode_accepts_spaced_and_hyphenated_spellings() {
        #[derive(Deserialize)]
        struct Holder {
            mode: EvalMode,
        }
        let spaced: Holder = serde_yaml::from_str("mode: one step").unwrap();
        assert_eq!(spaced.mode, EvalMode::OneStep);
        let hyphenated: Holder = serde_yaml::from_str("mode: only-inference").unwrap();
        assert_eq!(hyphenated.mode, EvalMode::OnlyInference);
    }
}

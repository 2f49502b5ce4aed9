//! Built-in module implementations and their registry.

pub mod analyzer;
pub mod dataset;
pub mod method;
pub mod summarizer;

use anyhow::Context;
use dreval_core::ModuleRegistry;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// Deserialize constructor arguments; a missing `args` section means "no
/// arguments", not an error.
pub(crate) fn parse_args<T: DeserializeOwned>(args: &Value) -> anyhow::Result<T> {
    let args = match args {
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other.clone(),
    };
    serde_json::from_value(args).context("invalid module arguments")
}

/// Registry with every built-in registered under its configuration name.
pub fn builtin_registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    registry.register_dataset("jsonl", |args| {
        let args: dataset::JsonlArgs = parse_args(args)?;
        Ok(Arc::new(dataset::JsonlDataset::load(&args.data_path)?))
    });
    registry.register_inference("openai_api", |args| {
        let args: method::OpenAiArgs = parse_args(args)?;
        Ok(Arc::new(method::OpenAiCompatible::new(args)))
    });
    registry.register_analyzer("exact_match", |args| {
        let _: analyzer::NoArgs = parse_args(args)?;
        Ok(Arc::new(analyzer::ExactMatchAnalyzer))
    });
    registry.register_summarizer("qa", |args| {
        let _: analyzer::NoArgs = parse_args(args)?;
        Ok(Arc::new(summarizer::QaSummarizer))
    });
    registry
}

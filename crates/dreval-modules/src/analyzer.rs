//! Exact-match answer analyzer.

use async_trait::async_trait;
use dreval_core::Analyzer;
use serde::Deserialize;
use serde_json::{json, Value};

/// Placeholder for modules constructed without arguments.
#[derive(Debug, Deserialize)]
pub struct NoArgs {}

/// Scores `output.answer` against `label.answer`: EM 1.0 on an exact match
/// (strings are compared after trimming), 0.0 otherwise.
pub struct ExactMatchAnalyzer;

fn exact_match(output: &Value, label: &Value) -> f64 {
    let out = &output["answer"];
    let gold = &label["answer"];
    let matched = match (out.as_str(), gold.as_str()) {
        (Some(out), Some(gold)) => out.trim() == gold.trim(),
        _ => out == gold,
    };
    if matched {
        1.0
    } else {
        0.0
    }
}

#[async_trait]
impl Analyzer for ExactMatchAnalyzer {
    async fn analyze(&self, outputs: Vec<Value>, labels: Vec<Value>) -> anyhow::Result<Vec<Value>> {
        anyhow::ensure!(
            outputs.len() == labels.len(),
            "got {} outputs for {} labels",
            outputs.len(),
            labels.len()
        );
        Ok(outputs
            .iter()
            .zip(&labels)
            .map(|(output, label)| json!({"EM": exact_match(output, label)}))
            .collect())
    }
}

//! Full pipeline over the built-in modules: JSONL dataset in, grouped
//! summary artifact out. The method role is a local echo implementation so
//! no network is involved.

use async_trait::async_trait;
use dreval_core::config::{Config, EvalMode, EvaluatorConfig, ModuleBinding, ModuleBindings};
use dreval_core::{Evaluator, Inference};
use dreval_modules::builtin_registry;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

struct EchoMethod;

#[async_trait]
impl Inference for EchoMethod {
    async fn infer(&self, inputs: Vec<Value>) -> anyhow::Result<Vec<Value>> {
        Ok(inputs
            .into_iter()
            .map(|input| json!({"answer": input["question"]}))
            .collect())
    }
}

fn write_dataset(path: &Path) {
    let lines = [
        json!({"mark": {"category": "A"}, "input": {"question": "x"}, "label": {"answer": "x"}}),
        json!({"mark": {"category": "A"}, "input": {"question": "y"}, "label": {"answer": "y"}}),
        json!({"mark": {"category": "B"}, "input": {"question": "z"}, "label": {"answer": "wrong"}}),
    ];
    let text: String = lines.iter().map(|l| format!("{l}\n")).collect();
    std::fs::write(path, text).unwrap();
}

#[tokio::test]
async fn jsonl_to_grouped_summary() {
    let dir = tempfile::tempdir().unwrap();
    let data_path = dir.path().join("data.jsonl");
    write_dataset(&data_path);

    let mut registry = builtin_registry();
    registry.register_inference("echo", |_| Ok(Arc::new(EchoMethod)));

    let binding = |cls: &str, args: Value| ModuleBinding {
        cls: cls.to_string(),
        args,
    };
    let mut evaluator_config = EvaluatorConfig::new(dir.path().join("out"));
    evaluator_config.mode = EvalMode::TwoStep;
    evaluator_config.inference_batch_size = 2;
    let config = Config {
        evaluator: evaluator_config,
        modules: ModuleBindings {
            dataset: binding("jsonl", json!({"data_path": data_path})),
            method: binding("echo", Value::Null),
            analyzer: binding("exact_match", Value::Null),
            summarizer: binding("qa", Value::Null),
        },
    };

    let evaluator = Evaluator::from_config(config, &registry).unwrap();
    let version = evaluator.version().clone();
    let all = evaluator.eval().await.unwrap();

    assert_eq!(all["count"], json!(3));

    let text = std::fs::read_to_string(version.summary_path()).unwrap();
    let summary: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(summary["groups"], json!(["all", "category_A", "category_B"]));
    assert_eq!(summary["category_A"]["count"], json!(2));
    assert_eq!(summary["category_A"]["metrics"]["EM"], json!(1.0));
    assert_eq!(summary["category_B"]["count"], json!(1));
    assert_eq!(summary["category_B"]["metrics"]["EM"], json!(0.0));

    // Echo answers "x"/"y" match their labels, "z" does not: mean 2/3.
    let em = summary["all"]["metrics"]["EM"].as_f64().unwrap();
    assert!((em - 2.0 / 3.0).abs() < 1e-9);

    // log.txt is written alongside the records.
    assert!(version.log_path().is_file());
}

//! Checkpointed batch evaluation harness.
//!
//! Scores a method against a labeled dataset through a pluggable
//! inference → analysis → summarization pipeline. Progress is checkpointed
//! per batch into append-only JSONL files under versioned run directories,
//! so an interrupted run picks up exactly where it stopped.

pub mod config;
pub mod errors;
pub mod evaluator;
pub mod executor;
pub mod logging;
pub mod progress;
pub mod record;
pub mod recorder;
pub mod registry;
pub mod versions;

pub use config::{Config, EvalMode, EvaluatorConfig, LogLevel, ModuleBinding, ModuleBindings};
pub use errors::EvalError;
pub use evaluator::Evaluator;
pub use record::{AnalysisRecord, DatasetItem, InferenceRecord, Mark, RecordField};
pub use registry::{Analyzer, Dataset, Inference, ModuleRegistry, Modules, Summarizer};

//! Role traits and the module registry.
//!
//! The four pluggable roles are explicit trait abstractions, enforced when a
//! binding is resolved rather than at first call. Implementations register
//! under a name at startup; configuration then binds each role by name plus
//! constructor arguments. There is no runtime code loading.

use crate::config::ModuleBindings;
use crate::errors::EvalError;
use crate::record::{AnalysisRecord, DatasetItem};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

/// A finite, random-access labeled dataset.
pub trait Dataset: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, index: usize) -> anyhow::Result<DatasetItem>;
}

/// The scorable method under evaluation. Outputs must align positionally
/// with inputs and have the same length.
#[async_trait]
pub trait Inference: Send + Sync {
    async fn infer(&self, inputs: Vec<Value>) -> anyhow::Result<Vec<Value>>;
}

/// Scores aligned batches of outputs against labels. Results must align
/// positionally and have the same length.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, outputs: Vec<Value>, labels: Vec<Value>) -> anyhow::Result<Vec<Value>>;
}

/// Aggregates the full analysis record set into a summary artifact written
/// under `dest`, returning the all-group summary (Null for an empty set).
pub trait Summarizer: Send + Sync {
    fn summarize(
        &self,
        records: &BTreeMap<usize, AnalysisRecord>,
        dest: &Path,
    ) -> anyhow::Result<Value>;
}

pub type DatasetFactory = Arc<dyn Fn(&Value) -> anyhow::Result<Arc<dyn Dataset>> + Send + Sync>;
pub type InferenceFactory = Arc<dyn Fn(&Value) -> anyhow::Result<Arc<dyn Inference>> + Send + Sync>;
pub type AnalyzerFactory = Arc<dyn Fn(&Value) -> anyhow::Result<Arc<dyn Analyzer>> + Send + Sync>;
pub type SummarizerFactory =
    Arc<dyn Fn(&Value) -> anyhow::Result<Arc<dyn Summarizer>> + Send + Sync>;

/// Name → factory tables for the four roles.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    datasets: HashMap<String, DatasetFactory>,
    methods: HashMap<String, InferenceFactory>,
    analyzers: HashMap<String, AnalyzerFactory>,
    summarizers: HashMap<String, SummarizerFactory>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_dataset<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Value) -> anyhow::Result<Arc<dyn Dataset>> + Send + Sync + 'static,
    {
        self.datasets.insert(name.into(), Arc::new(factory));
    }

    pub fn register_inference<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Value) -> anyhow::Result<Arc<dyn Inference>> + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Arc::new(factory));
    }

    pub fn register_analyzer<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Value) -> anyhow::Result<Arc<dyn Analyzer>> + Send + Sync + 'static,
    {
        self.analyzers.insert(name.into(), Arc::new(factory));
    }

    pub fn register_summarizer<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Value) -> anyhow::Result<Arc<dyn Summarizer>> + Send + Sync + 'static,
    {
        self.summarizers.insert(name.into(), Arc::new(factory));
    }
}

/// Resolved bindings: factory plus arguments per role. Construction stays
/// lazy so the orchestrator controls when each instance exists.
pub struct Modules {
    dataset: (DatasetFactory, Value),
    inference: (InferenceFactory, Value),
    analyzer: (AnalyzerFactory, Value),
    summarizer: (SummarizerFactory, Value),
}

impl std::fmt::Debug for Modules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Modules").finish_non_exhaustive()
    }
}

impl Modules {
    /// Look up all four bindings. An unknown name fails here, at binding
    /// time, not on first use.
    pub fn resolve(registry: &ModuleRegistry, bindings: &ModuleBindings) -> Result<Self, EvalError> {
        fn lookup<T: Clone>(
            table: &HashMap<String, T>,
            role: &'static str,
            name: &str,
        ) -> Result<T, EvalError> {
            table.get(name).cloned().ok_or_else(|| EvalError::UnknownModule {
                role,
                name: name.to_string(),
            })
        }

        Ok(Self {
            dataset: (
                lookup(&registry.datasets, "dataset", &bindings.dataset.cls)?,
                bindings.dataset.args.clone(),
            ),
            inference: (
                lookup(&registry.methods, "method", &bindings.method.cls)?,
                bindings.method.args.clone(),
            ),
            analyzer: (
                lookup(&registry.analyzers, "analyzer", &bindings.analyzer.cls)?,
                bindings.analyzer.args.clone(),
            ),
            summarizer: (
                lookup(&registry.summarizers, "summarizer", &bindings.summarizer.cls)?,
                bindings.summarizer.args.clone(),
            ),
        })
    }

    pub fn create_dataset(&self) -> anyhow::Result<Arc<dyn Dataset>> {
        (self.dataset.0)(&self.dataset.1)
    }

    pub fn create_inference(&self) -> anyhow::Result<Arc<dyn Inference>> {
        (self.inference.0)(&self.inference.1)
    }

    pub fn create_analyzer(&self) -> anyhow::Result<Arc<dyn Analyzer>> {
        (self.analyzer.0)(&self.analyzer.1)
    }

    pub fn create_summarizer(&self) -> anyhow::Result<Arc<dyn Summarizer>> {
        (self.summarizer.0)(&self.summarizer.1)
    }
}

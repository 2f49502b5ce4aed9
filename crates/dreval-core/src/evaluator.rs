//! The evaluation orchestrator.
//!
//! Drives a run end to end: picks the version directory, loads checkpointed
//! records, computes the remaining work per phase, hands phase task
//! functions to the batch executor and finally triggers summarization.
//!
//! Checkpoint maps are read-only snapshots for the duration of a phase;
//! workers only read them to decide what to skip. All appends funnel through
//! the record sink, which serializes disk writes.

use crate::config::{Config, EvalMode, EvaluatorConfig};
use crate::errors::EvalError;
use crate::executor;
use crate::logging::RunLog;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::record::{AnalysisRecord, InferenceRecord, PhaseRecord, RecordField};
use crate::recorder::{self, Recorder};
use crate::registry::{Analyzer, Dataset, Inference, ModuleRegistry, Modules};
use crate::versions::{ActiveVersion, VersionManager};
use anyhow::Context;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Destination for completed records: the version's checkpoint file, or a
/// process-local map when persistence is disabled for the phase.
enum RecordSink<T> {
    Disk {
        recorder: Arc<Recorder>,
        path: PathBuf,
        fields: Vec<RecordField>,
    },
    Memory(Arc<Mutex<BTreeMap<usize, T>>>),
}

impl<T: PhaseRecord> RecordSink<T> {
    fn append(&self, records: Vec<T>) -> anyhow::Result<()> {
        match self {
            RecordSink::Disk {
                recorder,
                path,
                fields,
            } => {
                for record in &records {
                    recorder.add_record(path, &record.retain(fields))?;
                }
                Ok(())
            }
            RecordSink::Memory(map) => {
                let mut map = map.lock().expect("record map lock poisoned");
                for record in records {
                    map.insert(record.index(), record);
                }
                Ok(())
            }
        }
    }
}

struct InferencePhase {
    dataset: Arc<dyn Dataset>,
    method: Arc<dyn Inference>,
    completed: BTreeMap<usize, InferenceRecord>,
    sink: RecordSink<InferenceRecord>,
}

impl InferencePhase {
    async fn run_batch(self: Arc<Self>, indices: Vec<usize>) -> anyhow::Result<()> {
        let mut records = Vec::new();
        for index in indices {
            if self.completed.contains_key(&index) {
                continue;
            }
            let item = self.dataset.get(index)?;
            records.push(InferenceRecord {
                index,
                mark: item.mark,
                input: Some(item.input),
                label: Some(item.label),
                output: Value::Null,
            });
        }
        if records.is_empty() {
            return Ok(());
        }

        let inputs: Vec<Value> = records
            .iter()
            .map(|r| r.input.clone().unwrap_or(Value::Null))
            .collect();
        let outputs = self.method.infer(inputs).await.context("inference failed")?;
        anyhow::ensure!(
            outputs.len() == records.len(),
            "inference returned {} outputs for {} inputs",
            outputs.len(),
            records.len()
        );
        for (record, output) in records.iter_mut().zip(outputs) {
            record.output = output;
        }
        self.sink.append(records)
    }
}

struct AnalysisPhase {
    dataset: Arc<dyn Dataset>,
    analyzer: Arc<dyn Analyzer>,
    /// Inference results this phase depends on. An index with no entry here
    /// is silently left unprocessed; re-running the inference phase
    /// reconciles it.
    inference: BTreeMap<usize, InferenceRecord>,
    completed: BTreeMap<usize, AnalysisRecord>,
    sink: RecordSink<AnalysisRecord>,
    deferred: AtomicUsize,
}

impl AnalysisPhase {
    async fn run_batch(self: Arc<Self>, indices: Vec<usize>) -> anyhow::Result<()> {
        let mut records = Vec::new();
        for index in indices {
            if self.completed.contains_key(&index) {
                continue;
            }
            let Some(inference) = self.inference.get(&index) else {
                self.deferred.fetch_add(1, Ordering::Relaxed);
                continue;
            };
            let item = self.dataset.get(index)?;
            // Fields persisted with the inference record win over the
            // dataset's; anything the persisted subset dropped is rebuilt
            // from the dataset.
            records.push(AnalysisRecord {
                index,
                mark: if inference.mark.is_empty() {
                    item.mark
                } else {
                    inference.mark.clone()
                },
                input: inference.input.clone().or(Some(item.input)),
                label: inference.label.clone().or(Some(item.label)),
                output: Some(inference.output.clone()),
                analysis: Value::Null,
            });
        }
        if records.is_empty() {
            return Ok(());
        }

        let outputs: Vec<Value> = records
            .iter()
            .map(|r| r.output.clone().unwrap_or(Value::Null))
            .collect();
        let labels: Vec<Value> = records
            .iter()
            .map(|r| r.label.clone().unwrap_or(Value::Null))
            .collect();
        let analyses = self
            .analyzer
            .analyze(outputs, labels)
            .await
            .context("analysis failed")?;
        anyhow::ensure!(
            analyses.len() == records.len(),
            "analyzer returned {} results for {} records",
            analyses.len(),
            records.len()
        );
        for (record, analysis) in records.iter_mut().zip(analyses) {
            record.analysis = analysis;
        }
        self.sink.append(records)
    }
}

/// Fused inference + analysis for one-step mode.
struct FusedPhase {
    dataset: Arc<dyn Dataset>,
    method: Arc<dyn Inference>,
    analyzer: Arc<dyn Analyzer>,
    completed: BTreeMap<usize, AnalysisRecord>,
    inference_sink: RecordSink<InferenceRecord>,
    analysis_sink: RecordSink<AnalysisRecord>,
}

impl FusedPhase {
    async fn run_batch(self: Arc<Self>, indices: Vec<usize>) -> anyhow::Result<()> {
        let mut records = Vec::new();
        for index in indices {
            if self.completed.contains_key(&index) {
                continue;
            }
            let item = self.dataset.get(index)?;
            records.push(InferenceRecord {
                index,
                mark: item.mark,
                input: Some(item.input),
                label: Some(item.label),
                output: Value::Null,
            });
        }
        if records.is_empty() {
            return Ok(());
        }

        let inputs: Vec<Value> = records
            .iter()
            .map(|r| r.input.clone().unwrap_or(Value::Null))
            .collect();
        let outputs = self.method.infer(inputs).await.context("inference failed")?;
        anyhow::ensure!(
            outputs.len() == records.len(),
            "inference returned {} outputs for {} inputs",
            outputs.len(),
            records.len()
        );
        for (record, output) in records.iter_mut().zip(outputs) {
            record.output = output;
        }
        self.inference_sink.append(records.clone())?;

        let outputs: Vec<Value> = records.iter().map(|r| r.output.clone()).collect();
        let labels: Vec<Value> = records
            .iter()
            .map(|r| r.label.clone().unwrap_or(Value::Null))
            .collect();
        let analyses = self
            .analyzer
            .analyze(outputs, labels)
            .await
            .context("analysis failed")?;
        anyhow::ensure!(
            analyses.len() == records.len(),
            "analyzer returned {} results for {} records",
            analyses.len(),
            records.len()
        );
        let analysis_records = records
            .into_iter()
            .zip(analyses)
            .map(|(record, analysis)| AnalysisRecord {
                index: record.index,
                mark: record.mark,
                input: record.input,
                label: record.label,
                output: Some(record.output),
                analysis,
            })
            .collect();
        self.analysis_sink.append(analysis_records)
    }
}

pub struct Evaluator {
    config: EvaluatorConfig,
    modules: Modules,
    version: ActiveVersion,
    recorder: Arc<Recorder>,
    log: Arc<RunLog>,
    dataset: Arc<dyn Dataset>,
    all_tasks: Vec<usize>,
    mem_inference: Arc<Mutex<BTreeMap<usize, InferenceRecord>>>,
    mem_analysis: Arc<Mutex<BTreeMap<usize, AnalysisRecord>>>,
}

impl Evaluator {
    /// Resolve module bindings against `registry` and set up the run.
    pub fn from_config(config: Config, registry: &ModuleRegistry) -> anyhow::Result<Self> {
        let Config {
            evaluator: config,
            modules: bindings,
        } = config;
        let modules = Modules::resolve(registry, &bindings)?;
        Self::new(config, modules)
    }

    /// Set up the run: version directory, run log, dataset, work list.
    pub fn new(config: EvaluatorConfig, modules: Modules) -> anyhow::Result<Self> {
        let manager = VersionManager::new(&config.output_path)?;
        let version = manager.activate(config.resume, config.max_version)?;

        let log = if config.save_log {
            RunLog::open(&version.log_path(), config.log_level)?
        } else {
            RunLog::console_only(config.log_level)
        };
        log.info(format!("active version: {}", version.path.display()));
        if let Ok(rendered) = serde_json::to_string_pretty(&config) {
            log.debug(format!("config:\n{rendered}"));
        }

        let dataset = modules
            .create_dataset()
            .context("failed to construct dataset module")?;
        let all_tasks: Vec<usize> = (0..dataset.len()).collect();

        Ok(Self {
            config,
            modules,
            version,
            recorder: Arc::new(Recorder::new()),
            log: Arc::new(log),
            dataset,
            all_tasks,
            mem_inference: Arc::new(Mutex::new(BTreeMap::new())),
            mem_analysis: Arc::new(Mutex::new(BTreeMap::new())),
        })
    }

    pub fn version(&self) -> &ActiveVersion {
        &self.version
    }

    /// Run the configured phases, then summarize. Returns the all-group
    /// summary, or Null when summarization is disabled or there is nothing
    /// to summarize.
    pub async fn eval(self) -> anyhow::Result<Value> {
        match self.config.mode {
            EvalMode::OneStep => {
                self.log.info("starting evaluation");
                self.run_fused_phase().await?;
            }
            EvalMode::TwoStep => {
                self.log.info("starting inference step");
                self.run_inference_phase().await?;
                self.log.info("starting analysis step");
                self.run_analysis_phase().await?;
            }
            EvalMode::OnlyInference => {
                self.log.info("starting inference step");
                self.run_inference_phase().await?;
            }
            EvalMode::OnlyAnalysis => {
                self.log.info("starting analysis step");
                self.run_analysis_phase().await?;
            }
        }

        if self.config.summary {
            return self.run_summary();
        }
        Ok(Value::Null)
    }

    async fn run_inference_phase(&self) -> anyhow::Result<()> {
        let method = self
            .modules
            .create_inference()
            .context("failed to construct method module")?;
        let completed = self.load_inference_records()?;
        self.log.info(format!(
            "dataset size: {} inference completed: {}",
            self.dataset.len(),
            completed.len()
        ));

        let phase = Arc::new(InferencePhase {
            dataset: self.dataset.clone(),
            method,
            completed,
            sink: self.inference_sink(),
        });
        let task = {
            let phase = phase.clone();
            move |batch| InferencePhase::run_batch(phase.clone(), batch)
        };
        executor::run_batches(
            task,
            &self.all_tasks,
            self.config.inference_batch_size,
            self.config.inference_threads,
            Some(self.progress_sink("inference")),
        )
        .await
        // The method instance (and any client it holds) is released here,
        // before the analysis phase constructs the analyzer.
    }

    async fn run_analysis_phase(&self) -> anyhow::Result<()> {
        let analyzer = self
            .modules
            .create_analyzer()
            .context("failed to construct analyzer module")?;
        let inference = self.load_inference_records()?;
        let completed = self.load_analysis_records()?;
        self.log.info(format!(
            "dataset size: {} analysis completed: {}",
            self.dataset.len(),
            completed.len()
        ));

        let phase = Arc::new(AnalysisPhase {
            dataset: self.dataset.clone(),
            analyzer,
            inference,
            completed,
            sink: self.analysis_sink(),
            deferred: AtomicUsize::new(0),
        });
        let task = {
            let phase = phase.clone();
            move |batch| AnalysisPhase::run_batch(phase.clone(), batch)
        };
        executor::run_batches(
            task,
            &self.all_tasks,
            self.config.analysis_batch_size,
            self.config.analysis_threads,
            Some(self.progress_sink("analysis")),
        )
        .await?;

        let deferred = phase.deferred.load(Ordering::Relaxed);
        if deferred > 0 {
            self.log.debug(format!(
                "{deferred} indices deferred: no inference record yet"
            ));
        }
        Ok(())
    }

    async fn run_fused_phase(&self) -> anyhow::Result<()> {
        let method = self
            .modules
            .create_inference()
            .context("failed to construct method module")?;
        let analyzer = self
            .modules
            .create_analyzer()
            .context("failed to construct analyzer module")?;
        let completed = self.load_analysis_records()?;
        self.log.info(format!(
            "dataset size: {} analysis completed: {}",
            self.dataset.len(),
            completed.len()
        ));

        let phase = Arc::new(FusedPhase {
            dataset: self.dataset.clone(),
            method,
            analyzer,
            completed,
            inference_sink: self.inference_sink(),
            analysis_sink: self.analysis_sink(),
        });
        let task = {
            let phase = phase.clone();
            move |batch| FusedPhase::run_batch(phase.clone(), batch)
        };
        executor::run_batches(
            task,
            &self.all_tasks,
            self.config.batch_size,
            self.config.threads,
            Some(self.progress_sink("evaluation")),
        )
        .await
    }

    fn run_summary(&self) -> anyhow::Result<Value> {
        let summarizer = self
            .modules
            .create_summarizer()
            .context("failed to construct summarizer module")?;
        let records = self.load_analysis_records()?;
        self.log
            .info(format!("summarizing {} analysis records", records.len()));
        summarizer
            .summarize(&records, &self.version.path)
            .context("summarization failed")
    }

    fn inference_sink(&self) -> RecordSink<InferenceRecord> {
        if self.config.record_inference {
            RecordSink::Disk {
                recorder: self.recorder.clone(),
                path: self.version.inference_records_path(),
                fields: self.config.inference_record_key.clone(),
            }
        } else {
            RecordSink::Memory(self.mem_inference.clone())
        }
    }

    fn analysis_sink(&self) -> RecordSink<AnalysisRecord> {
        if self.config.record_analysis {
            RecordSink::Disk {
                recorder: self.recorder.clone(),
                path: self.version.analysis_records_path(),
                fields: self.config.analysis_record_key.clone(),
            }
        } else {
            RecordSink::Memory(self.mem_analysis.clone())
        }
    }

    fn load_inference_records(&self) -> Result<BTreeMap<usize, InferenceRecord>, EvalError> {
        if self.config.record_inference {
            let mut map = BTreeMap::new();
            for record in
                recorder::read_records::<InferenceRecord>(&self.version.inference_records_path())?
            {
                map.insert(record.index, record);
            }
            Ok(map)
        } else {
            Ok(self
                .mem_inference
                .lock()
                .expect("record map lock poisoned")
                .clone())
        }
    }

    fn load_analysis_records(&self) -> Result<BTreeMap<usize, AnalysisRecord>, EvalError> {
        if self.config.record_analysis {
            let mut map = BTreeMap::new();
            for record in
                recorder::read_records::<AnalysisRecord>(&self.version.analysis_records_path())?
            {
                map.insert(record.index, record);
            }
            Ok(map)
        } else {
            Ok(self
                .mem_analysis
                .lock()
                .expect("record map lock poisoned")
                .clone())
        }
    }

    fn progress_sink(&self, phase: &'static str) -> ProgressSink {
        let log = self.log.clone();
        Arc::new(move |event: ProgressEvent| {
            log.info(format!("{phase}: {}/{} batches", event.done, event.total));
        })
    }
}

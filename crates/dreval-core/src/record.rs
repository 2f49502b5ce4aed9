//! Per-phase record types.
//!
//! Each dataset item moves through the pipeline as a typed record keyed by
//! its dataset position. Records are immutable once appended to a checkpoint
//! file; every field except `index` and the phase payload is optional on the
//! way back in, because the configured persisted subset may have dropped it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Grouping metadata attached to a dataset item, used for summary
/// stratification (one group per distinct key/value pair).
pub type Mark = Map<String, Value>;

/// What a [`Dataset`](crate::registry::Dataset) returns for one position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetItem {
    #[serde(default)]
    pub mark: Mark,
    pub input: Value,
    pub label: Value,
}

/// One field of a persisted record. Configuration selects which of these
/// survive into the checkpoint files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordField {
    Index,
    Mark,
    Input,
    Label,
    Output,
    Analysis,
}

impl RecordField {
    pub fn key(self) -> &'static str {
        match self {
            RecordField::Index => "index",
            RecordField::Mark => "mark",
            RecordField::Input => "input",
            RecordField::Label => "label",
            RecordField::Output => "output",
            RecordField::Analysis => "analysis",
        }
    }
}

/// Result of the inference phase for one index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceRecord {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub mark: Mark,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<Value>,
    pub output: Value,
}

/// Result of the analysis phase for one index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub mark: Mark,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    pub analysis: Value,
}

/// A record that can be checkpointed: it knows its dataset position and how
/// to project itself down to the configured persisted subset.
pub trait PhaseRecord: Serialize + Send + Sync + Clone + 'static {
    fn index(&self) -> usize;

    /// Keep only the listed fields. `index` is always retained; dropping it
    /// would make the record useless for resume.
    fn retain(&self, fields: &[RecordField]) -> Value {
        let full = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            // Records are plain structs; anything else is a bug in the impl.
            _ => Map::new(),
        };
        let mut out = Map::new();
        if let Some(index) = full.get("index") {
            out.insert("index".into(), index.clone());
        }
        for field in fields {
            if let Some(value) = full.get(field.key()) {
                out.insert(field.key().into(), value.clone());
            }
        }
        Value::Object(out)
    }
}

impl PhaseRecord for InferenceRecord {
    fn index(&self) -> usize {
        self.index
    }
}

impl PhaseRecord for AnalysisRecord {
    fn index(&self) -> usize {
        self.index
    }
}

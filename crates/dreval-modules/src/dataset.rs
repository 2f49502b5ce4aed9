//! JSONL-backed dataset.

use anyhow::Context;
use dreval_core::{Dataset, DatasetItem};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct JsonlArgs {
    pub data_path: PathBuf,
}

/// Loads a JSONL file where each line carries `mark`, `input` and `label`.
/// The whole file is held in memory; datasets here are evaluation-sized.
#[derive(Debug)]
pub struct JsonlDataset {
    items: Vec<DatasetItem>,
}

impl JsonlDataset {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open dataset {}", path.display()))?;
        let reader = BufReader::new(file);
        let mut items = Vec::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line
                .with_context(|| format!("failed to read dataset {}", path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            let item: DatasetItem = serde_json::from_str(&line).with_context(|| {
                format!("malformed dataset item at {}:{}", path.display(), lineno + 1)
            })?;
            items.push(item);
        }
        Ok(Self { items })
    }
}

impl Dataset for JsonlDataset {
    fn len(&self) -> usize {
        self.items.len()
    }

    fn get(&self, index: usize) -> anyhow::Result<DatasetItem> {
        self.items
            .get(index)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("dataset index {index} out of range"))
    }
}

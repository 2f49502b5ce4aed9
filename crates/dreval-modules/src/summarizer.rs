//! Grouped metric summarizer.
//!
//! Produces the summary artifact: an `all` group over every analysis record
//! plus one group per distinct mark key/value pair, each with its record
//! count and the mean of every numeric metric in the analysis payloads.

use dreval_core::{AnalysisRecord, Summarizer};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

pub struct QaSummarizer;

fn group_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Mean of every numeric field across the group's analysis payloads. A
/// metric missing from some records is averaged over the records that
/// carry it.
fn metric_means<'a>(records: impl Iterator<Item = &'a AnalysisRecord>) -> Map<String, Value> {
    let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for record in records {
        let Some(metrics) = record.analysis.as_object() else {
            continue;
        };
        for (name, value) in metrics {
            if let Some(number) = value.as_f64() {
                let entry = sums.entry(name.clone()).or_insert((0.0, 0));
                entry.0 += number;
                entry.1 += 1;
            }
        }
    }
    sums.into_iter()
        .map(|(name, (sum, count))| (name, json!(sum / count as f64)))
        .collect()
}

impl Summarizer for QaSummarizer {
    fn summarize(
        &self,
        records: &BTreeMap<usize, AnalysisRecord>,
        dest: &Path,
    ) -> anyhow::Result<Value> {
        if records.is_empty() {
            return Ok(Value::Null);
        }

        // "all" first, then one group per mark key/value, sorted by name.
        let mut groups: BTreeMap<String, Vec<&AnalysisRecord>> = BTreeMap::new();
        for record in records.values() {
            for (key, value) in &record.mark {
                groups
                    .entry(format!("{key}_{}", group_label(value)))
                    .or_default()
                    .push(record);
            }
        }

        let mut names = vec!["all".to_string()];
        names.extend(groups.keys().cloned());

        let mut summary = Map::new();
        summary.insert("groups".into(), json!(names));
        summary.insert(
            "all".into(),
            json!({
                "count": records.len(),
                "metrics": metric_means(records.values()),
            }),
        );
        for (name, members) in &groups {
            summary.insert(
                name.clone(),
                json!({
                    "count": members.len(),
                    "metrics": metric_means(members.iter().copied()),
                }),
            );
        }

        let path = dest.join("summary.json");
        let file = File::create(&path)
            .map_err(|e| anyhow::anyhow!("failed to create {}: {e}", path.display()))?;
        serde_json::to_writer_pretty(file, &summary)?;

        Ok(summary["all"].clone())
    }
}

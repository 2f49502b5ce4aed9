//! Append-only JSONL record store.
//!
//! One JSON document per line, loaded wholesale at phase start and appended
//! to as batches complete. There is no update or delete; resume semantics
//! come from the caller never re-appending an index it has already seen.

use crate::errors::EvalError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::Mutex;

/// Parse every line of a record file. A missing file is an empty record set;
/// a malformed line fails the whole load so a corrupted checkpoint is never
/// silently partially consumed.
pub fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, EvalError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(EvalError::io("open", path, e)),
    };
    let reader = BufReader::new(file);
    let mut records = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| EvalError::io("read", path, e))?;
        let record = serde_json::from_str(&line).map_err(|e| EvalError::MalformedRecord {
            path: path.to_path_buf(),
            line: lineno + 1,
            source: e,
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Serializes appends from concurrent batch workers. The file is opened in
/// append mode per call; the internal lock guarantees whole-line writes.
#[derive(Debug, Default)]
pub struct Recorder {
    append_lock: Mutex<()>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one record as a new line.
    pub fn add_record<T: Serialize>(&self, path: &Path, record: &T) -> Result<(), EvalError> {
        let mut line = serde_json::to_string(record).map_err(|e| EvalError::Serialize {
            path: path.to_path_buf(),
            source: e,
        })?;
        line.push('\n');

        let _guard = self.append_lock.lock().expect("recorder lock poisoned");
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| EvalError::io("open", path, e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| EvalError::io("append to", path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::sync::Arc;

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let records: Vec<Value> = read_records(&dir.path().join("none.jsonl")).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn append_then_read_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        let recorder = Recorder::new();
        for i in 0..3 {
            recorder.add_record(&path, &json!({"index": i})).unwrap();
        }
        let records: Vec<Value> = read_records(&path).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0]["index"], json!(0));
        assert_eq!(records[2]["index"], json!(2));
    }

    #[test]
    fn malformed_line_fails_with_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        std::fs::write(&path, "{\"index\": 0}\nnot json\n").unwrap();
        let err = read_records::<Value>(&path).unwrap_err();
        match err {
            crate::errors::EvalError::MalformedRecord { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn concurrent_appends_never_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        let recorder = Arc::new(Recorder::new());
        let mut handles = Vec::new();
        for t in 0..4 {
            let recorder = recorder.clone();
            let path = path.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..25 {
                    let payload = "x".repeat(200);
                    recorder
                        .add_record(&path, &json!({"index": t * 25 + i, "payload": payload}))
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        let records: Vec<Value> = read_records(&path).unwrap();
        assert_eq!(records.len(), 100);
        let mut indices: Vec<i64> = records
            .iter()
            .map(|r| r["index"].as_i64().unwrap())
            .collect();
        indices.sort_unstable();
        assert_eq!(indices, (0..100).collect::<Vec<_>>());
    }
}

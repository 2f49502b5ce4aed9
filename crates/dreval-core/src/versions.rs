//! Versioned run directories.
//!
//! A run is a base directory holding `version_<n>` subdirectories. Each
//! execution either continues the newest version (checkpoint resume) or, when
//! `resume` is set, opens a fresh version and prunes the oldest ones beyond
//! the retention limit. This is the only module with delete authority.

use crate::errors::EvalError;
use std::fs;
use std::path::{Path, PathBuf};

/// The version directory the current execution writes into.
#[derive(Debug, Clone)]
pub struct ActiveVersion {
    pub number: u64,
    pub path: PathBuf,
}

impl ActiveVersion {
    pub fn inference_records_path(&self) -> PathBuf {
        self.path.join("inference.jsonl")
    }

    pub fn analysis_records_path(&self) -> PathBuf {
        self.path.join("analysis.jsonl")
    }

    pub fn log_path(&self) -> PathBuf {
        self.path.join("log.txt")
    }

    pub fn summary_path(&self) -> PathBuf {
        self.path.join("summary.json")
    }
}

/// A directory qualifies as a version iff its name is exactly
/// `version_<non-negative integer>`. Extra underscores disqualify it, so
/// `version_1_2` is not a version.
fn parse_version_name(name: &str) -> Option<u64> {
    let digits = name.strip_prefix("version_")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[derive(Debug)]
pub struct VersionManager {
    base: PathBuf,
}

impl VersionManager {
    /// Ensure the run's base directory exists.
    pub fn new(base: impl Into<PathBuf>) -> Result<Self, EvalError> {
        let base = base.into();
        fs::create_dir_all(&base).map_err(|e| EvalError::io("create", &base, e))?;
        Ok(Self { base })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Existing versions, sorted by number ascending.
    fn scan(&self) -> Result<Vec<ActiveVersion>, EvalError> {
        let entries = fs::read_dir(&self.base).map_err(|e| EvalError::io("scan", &self.base, e))?;
        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| EvalError::io("scan", &self.base, e))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(number) = parse_version_name(name) {
                versions.push(ActiveVersion { number, path });
            }
        }
        versions.sort_by_key(|v| v.number);
        Ok(versions)
    }

    /// Pick (and create, if needed) the version directory to write into.
    ///
    /// No versions yet: `version_0`. `resume = false`: the highest existing
    /// version, so checkpointed work is continued in place. `resume = true`:
    /// a fresh version one past the current maximum, then the oldest versions
    /// beyond `max_version` are deleted. The retention floor is 1: the
    /// directory being written to is never deleted, whatever `max_version`
    /// says.
    pub fn activate(&self, resume: bool, max_version: usize) -> Result<ActiveVersion, EvalError> {
        let mut versions = self.scan()?;

        let active = if versions.is_empty() {
            ActiveVersion {
                number: 0,
                path: self.base.join("version_0"),
            }
        } else if resume {
            let next = versions.last().map(|v| v.number + 1).unwrap_or(0);
            versions.push(ActiveVersion {
                number: next,
                path: self.base.join(format!("version_{next}")),
            });
            let keep = max_version.max(1);
            if versions.len() > keep {
                let overflow = versions.len() - keep;
                for stale in versions.drain(..overflow) {
                    tracing::info!("pruning version directory {}", stale.path.display());
                    fs::remove_dir_all(&stale.path)
                        .map_err(|e| EvalError::io("delete", &stale.path, e))?;
                }
            }
            versions.last().cloned().expect("active version present")
        } else {
            versions.last().cloned().expect("versions non-empty")
        };

        fs::create_dir_all(&active.path).map_err(|e| EvalError::io("create", &active.path, e))?;
        Ok(active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version_numbers(base: &Path) -> Vec<u64> {
        let mut numbers: Vec<u64> = fs::read_dir(base)
            .unwrap()
            .filter_map(|e| {
                let name = e.unwrap().file_name();
                parse_version_name(name.to_str().unwrap())
            })
            .collect();
        numbers.sort_unstable();
        numbers
    }

    #[test]
    fn parse_accepts_only_exact_shape() {
        assert_eq!(parse_version_name("version_0"), Some(0));
        assert_eq!(parse_version_name("version_007"), Some(7));
        assert_eq!(parse_version_name("version_"), None);
        assert_eq!(parse_version_name("version_x"), None);
        assert_eq!(parse_version_name("version_1_2"), None);
        assert_eq!(parse_version_name("checkpoint_1"), None);
    }

    #[test]
    fn fresh_run_creates_version_zero() {
        let dir = tempfile::tempdir().unwrap();
        let manager = VersionManager::new(dir.path().join("out")).unwrap();
        let active = manager.activate(false, 10).unwrap();
        assert_eq!(active.number, 0);
        assert!(active.path.is_dir());
    }

    #[test]
    fn non_resume_reuses_highest_version() {
        let dir = tempfile::tempdir().unwrap();
        let manager = VersionManager::new(dir.path()).unwrap();
        fs::create_dir_all(dir.path().join("version_0")).unwrap();
        fs::create_dir_all(dir.path().join("version_4")).unwrap();
        fs::create_dir_all(dir.path().join("not_a_version")).unwrap();
        let active = manager.activate(false, 10).unwrap();
        assert_eq!(active.number, 4);
        assert_eq!(version_numbers(dir.path()), vec![0, 4]);
    }

    #[test]
    fn resume_increments_past_highest() {
        let dir = tempfile::tempdir().unwrap();
        let manager = VersionManager::new(dir.path()).unwrap();
        fs::create_dir_all(dir.path().join("version_2")).unwrap();
        let active = manager.activate(true, 10).unwrap();
        assert_eq!(active.number, 3);
        assert_eq!(version_numbers(dir.path()), vec![2, 3]);
    }

    #[test]
    fn retention_never_exceeds_limit() {
        let dir = tempfile::tempdir().unwrap();
        let manager = VersionManager::new(dir.path()).unwrap();
        for _ in 0..6 {
            manager.activate(true, 3).unwrap();
        }
        let numbers = version_numbers(dir.path());
        assert_eq!(numbers.len(), 3);
        assert_eq!(numbers, vec![3, 4, 5]);
    }

    #[test]
    fn retention_zero_keeps_active_version() {
        let dir = tempfile::tempdir().unwrap();
        let manager = VersionManager::new(dir.path()).unwrap();
        fs::create_dir_all(dir.path().join("version_0")).unwrap();
        let active = manager.activate(true, 0).unwrap();
        assert_eq!(active.number, 1);
        assert!(active.path.is_dir());
        assert_eq!(version_numbers(dir.path()), vec![1]);
    }

    #[test]
    fn pruned_versions_are_removed_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let manager = VersionManager::new(dir.path()).unwrap();
        let old = dir.path().join("version_0");
        fs::create_dir_all(&old).unwrap();
        fs::write(old.join("inference.jsonl"), "{}\n").unwrap();
        manager.activate(true, 1).unwrap();
        assert!(!old.exists());
        assert_eq!(version_numbers(dir.path()), vec![1]);
    }
}

//! Decision Logger Contract (spec.md §4, §6, invariant 5).
//!
//! One `similarity_computed` event per similarity computation, plus
//! `auto_merge_triggered`/`auto_merge_skipped` terminal-action events.
//! The JSONL sink is guarded by a single mutex and created with 0600
//! permissions, matching the "append-only decision log file handle guarded
//! by a mutex" note in spec.md §9.

use crate::behavior::SimilarityMethod;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

pub trait DecisionLogger: Send + Sync {
    fn log_similarity(&self, event: &SimilarityEvent);
    fn log_merge_triggered(&self, event: &MergeEvent);
    fn log_merge_skipped(&self, event: &MergeEvent);
}

#[derive(Debug, Clone, Serialize)]
pub struct SimilarityEvent {
    pub behavior_a: String,
    pub behavior_b: String,
    pub score: f64,
    pub method: SimilarityMethod,
    pub threshold: f64,
    pub is_duplicate: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeEvent {
    pub behavior_id: String,
    pub merge_target: String,
    pub similarity: f64,
    pub threshold: f64,
    pub reason: Option<String>,
}

/// A `DecisionLogger` that discards every event. Used when no logger is
/// supplied — the Similarity Engine still has something to call.
#[derive(Default)]
pub struct NullDecisionLogger;

impl DecisionLogger for NullDecisionLogger {
    fn log_similarity(&self, _event: &SimilarityEvent) {}
    fn log_merge_triggered(&self, _event: &MergeEvent) {}
    fn log_merge_skipped(&self, _event: &MergeEvent) {}
}

/// Append-only JSONL sink at `decisions.jsonl`.
pub struct JsonlDecisionLogger {
    file: Mutex<File>,
}

impl JsonlDecisionLogger {
    /// Opens (creating if absent) the log file with 0600 permissions on
    /// unix, matching spec.md §6's persisted-state contract.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let mut opts = OpenOptions::new();
        opts.create(true).append(true);

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.mode(0o600);
        }

        let file = opts.open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    fn write_line(&self, value: serde_json::Value) {
        let line = value.to_string();
        let mut file = self.file.lock().unwrap();
        let _ = writeln!(file, "{line}");
    }
}

impl DecisionLogger for JsonlDecisionLogger {
    fn log_similarity(&self, event: &SimilarityEvent) {
        self.write_line(json!({
            "event": "similarity_computed",
            "behavior_a": event.behavior_a,
            "behavior_b": event.behavior_b,
            "score": event.score,
            "method": event.method.as_str(),
            "threshold": event.threshold,
            "is_duplicate": event.is_duplicate,
            "time": Utc::now().to_rfc3339(),
        }));
    }

    fn log_merge_triggered(&self, event: &MergeEvent) {
        self.write_line(json!({
            "event": "auto_merge_triggered",
            "behavior_id": event.behavior_id,
            "merge_target": event.merge_target,
            "similarity": event.similarity,
            "threshold": event.threshold,
            "reason": event.reason,
            "time": Utc::now().to_rfc3339(),
        }));
    }

    fn log_merge_skipped(&self, event: &MergeEvent) {
        self.write_line(json!({
            "event": "auto_merge_skipped",
            "behavior_id": event.behavior_id,
            "merge_target": event.merge_target,
            "similarity": event.similarity,
            "threshold": event.threshold,
            "reason": event.reason,
            "time": Utc::now().to_rfc3339(),
        }));
    }
}

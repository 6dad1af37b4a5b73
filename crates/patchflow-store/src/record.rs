//! Run-history artifact persistence.
//!
//! A [`RunHistoryRecord`] is a self-contained, content-verified record of one
//! pipeline invocation: every patch attempt in order plus the terminal
//! outcome. Records are written to `<dir>/<instance_id>/history.json` with a
//! companion `<dir>/<instance_id>/history.digest` file for integrity checks.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

/// Content digest (SHA-256 hex string) over a serialized record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordDigest(String);

impl RecordDigest {
    /// Compute the SHA-256 digest of the given bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        use sha2::Digest;
        let mut hasher = sha2::Sha256::new();
        hasher.update(data);
        RecordDigest(hex::encode(hasher.finalize()))
    }

    /// Return the full hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One drafted candidate patch and the verdict it received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 1-based position in the run's attempt sequence.
    pub attempt_number: u32,
    /// The candidate patch text as drafted.
    pub candidate_patch: String,
    /// Verdict string (`accepted`, `rejected`, or `unparseable`).
    pub verdict: String,
}

/// Full attempt history for one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunHistoryRecord {
    /// Unique identifier for this run.
    pub run_id: Uuid,
    /// The issue instance this run resolved.
    pub instance_id: String,
    /// All attempts in draft order.
    pub attempts: Vec<AttemptRecord>,
    /// Terminal outcome string (`success` or `escalated`).
    pub outcome: String,
    /// When the record was finalized.
    pub recorded_at: DateTime<Utc>,
}

impl RunHistoryRecord {
    /// Create a record with a fresh run id, stamped now.
    pub fn new(
        instance_id: impl Into<String>,
        attempts: Vec<AttemptRecord>,
        outcome: impl Into<String>,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            instance_id: instance_id.into(),
            attempts,
            outcome: outcome.into(),
            recorded_at: Utc::now(),
        }
    }
}

/// Write a `RunHistoryRecord` to `<dir>/<instance_id>/history.json`.
///
/// Also writes `<dir>/<instance_id>/history.digest` containing the SHA-256
/// digest of the serialized record for out-of-band verification.
///
/// Returns the path to `history.json`.
pub fn write_history_artifact(record: &RunHistoryRecord, dir: &Path) -> StoreResult<PathBuf> {
    let run_dir = dir.join(&record.instance_id);
    std::fs::create_dir_all(&run_dir)?;

    let history_path = run_dir.join("history.json");
    let digest_path = run_dir.join("history.digest");

    let json = serde_json::to_vec_pretty(record)?;
    let digest = RecordDigest::from_bytes(&json);

    std::fs::write(&history_path, &json)?;
    std::fs::write(&digest_path, digest.as_str().as_bytes())?;

    Ok(history_path)
}

/// Read and integrity-verify a `RunHistoryRecord` from `<dir>/<instance_id>/history.json`.
///
/// Recomputes the digest of the stored bytes and compares it to the companion
/// digest file. Returns `StoreError::DigestMismatch` if they differ.
pub fn read_history_artifact(instance_id: &str, dir: &Path) -> StoreResult<RunHistoryRecord> {
    let run_dir = dir.join(instance_id);
    let history_path = run_dir.join("history.json");
    let digest_path = run_dir.join("history.digest");

    if !history_path.exists() {
        return Err(StoreError::NotFound(instance_id.to_string()));
    }

    let json = std::fs::read(&history_path)?;
    let stored = std::fs::read_to_string(&digest_path)?;
    let actual = RecordDigest::from_bytes(&json);
    if stored.trim() != actual.as_str() {
        return Err(StoreError::DigestMismatch {
            expected: stored.trim().to_string(),
            actual: actual.as_str().to_string(),
        });
    }

    Ok(serde_json::from_slice(&json)?)
}

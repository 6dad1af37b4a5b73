//! Append-only working-memory log.
//!
//! Every drafted candidate is appended here before critique, so the full
//! attempt trail is recoverable even if the process dies mid-loop. The log is
//! strictly append-only; entries are never rewritten.
//!
//! Two implementations are provided: [`FsWorkingMemory`] (newline-delimited
//! JSON on disk) and [`MemoryWorkingMemory`] (in-process, for tests).

use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;

/// One working-memory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// The issue instance the entry belongs to.
    pub instance_id: String,
    /// Message role (`assistant` for drafted candidates, `user` for guidance).
    pub role: String,
    /// Entry text.
    pub content: String,
    /// When the entry was appended.
    pub recorded_at: DateTime<Utc>,
}

impl MemoryEntry {
    /// Entry for a drafted candidate.
    pub fn assistant(instance_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            role: "assistant".to_string(),
            content: content.into(),
            recorded_at: Utc::now(),
        }
    }

    /// Entry for human guidance injected through the review gate.
    pub fn user(instance_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            role: "user".to_string(),
            content: content.into(),
            recorded_at: Utc::now(),
        }
    }
}

/// Append-only working-memory log.
#[async_trait]
pub trait WorkingMemoryLog: Send + Sync {
    /// Append an entry. Entries are never mutated or removed.
    async fn append(&self, entry: MemoryEntry) -> StoreResult<()>;

    /// The most recently appended entry, if any.
    async fn latest(&self) -> StoreResult<Option<MemoryEntry>>;

    /// All entries in append order.
    async fn entries(&self) -> StoreResult<Vec<MemoryEntry>>;
}

// ---------------------------------------------------------------------------
// FsWorkingMemory
// ---------------------------------------------------------------------------

/// File-backed log: one JSON entry per line, opened in append mode per write.
pub struct FsWorkingMemory {
    path: PathBuf,
}

impl FsWorkingMemory {
    /// Log backed by `<dir>/<instance_id>/working_memory.jsonl`.
    pub fn new(dir: impl Into<PathBuf>, instance_id: &str) -> Self {
        let path = dir.into().join(instance_id).join("working_memory.jsonl");
        Self { path }
    }

    fn read_all(&self) -> StoreResult<Vec<MemoryEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        let mut entries = Vec::new();
        for line in raw.lines().filter(|l| !l.trim().is_empty()) {
            entries.push(serde_json::from_str(line)?);
        }
        Ok(entries)
    }
}

#[async_trait]
impl WorkingMemoryLog for FsWorkingMemory {
    async fn append(&self, entry: MemoryEntry) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(&entry)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    async fn latest(&self) -> StoreResult<Option<MemoryEntry>> {
        Ok(self.read_all()?.pop())
    }

    async fn entries(&self) -> StoreResult<Vec<MemoryEntry>> {
        self.read_all()
    }
}

// ---------------------------------------------------------------------------
// MemoryWorkingMemory
// ---------------------------------------------------------------------------

/// In-memory log backed by a `Mutex<Vec<_>>`. Intended for tests.
#[derive(Debug, Default)]
pub struct MemoryWorkingMemory {
    entries: Mutex<Vec<MemoryEntry>>,
}

impl MemoryWorkingMemory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkingMemoryLog for MemoryWorkingMemory {
    async fn append(&self, entry: MemoryEntry) -> StoreResult<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    async fn latest(&self) -> StoreResult<Option<MemoryEntry>> {
        Ok(self.entries.lock().unwrap().last().cloned())
    }

    async fn entries(&self) -> StoreResult<Vec<MemoryEntry>> {
        Ok(self.entries.lock().unwrap().clone())
    }
}

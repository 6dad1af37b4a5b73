//! Capability traits for the pipeline's external collaborators.
//!
//! Everything network- or human-shaped sits behind one of these traits so a
//! pipeline invocation can be driven end-to-end by substitutable stubs:
//!
//! - `TextService`: the opaque text-generation service (locator prompts,
//!   drafting, critique)
//! - `SymbolChangeIndex`: read-only precomputed candidate locations keyed by
//!   instance id
//! - `ScriptCorpus`: read-only original script text, ground truth for the
//!   critic
//! - `ReviewGate`: the blocking human boundary consulted on escalation

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{PatchAttempt, ServiceError};

// ---------------------------------------------------------------------------
// TextService
// ---------------------------------------------------------------------------

/// Opaque text-in/text-out generation service.
///
/// Treated as fallible and slow; callers make no assumption about latency
/// beyond "retry-worthy".
#[async_trait]
pub trait TextService: Send + Sync {
    async fn ask(&self, prompt: &str, system: Option<&str>) -> Result<String, ServiceError>;
}

/// OpenAI-style chat-completions client over HTTP.
pub struct HttpTextService {
    endpoint: String,
    api_key: String,
    model: String,
    http_client: reqwest::Client,
}

impl HttpTextService {
    /// Build a client with a 300-second request timeout.
    ///
    /// Fails with [`ServiceError::Transport`] if the underlying client
    /// cannot be constructed; the timeout is part of the service contract
    /// and is never silently dropped.
    pub fn new(endpoint: &str, api_key: &str, model: &str) -> Result<Self, ServiceError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            http_client,
        })
    }
}

#[async_trait]
impl TextService for HttpTextService {
    async fn ask(&self, prompt: &str, system: Option<&str>) -> Result<String, ServiceError> {
        let mut messages = Vec::new();
        if let Some(system) = system {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        messages.push(serde_json::json!({"role": "user", "content": prompt}));

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "messages": messages,
            }))
            .send()
            .await?
            .error_for_status()?;

        let body: serde_json::Value = response.json().await?;
        body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                ServiceError::MalformedResponse("completion without message content".to_string())
            })
    }
}

// ---------------------------------------------------------------------------
// SymbolChangeIndex
// ---------------------------------------------------------------------------

/// Read-only index of precomputed candidate code locations.
///
/// Keyed by instance id; each entry is an ordered sequence of groups, each
/// group an ordered sequence of fully-qualified symbol descriptors
/// (`path/to/file.py.symbol_name`).
pub trait SymbolChangeIndex: Send + Sync {
    /// Candidate groups for the instance, or `None` when unindexed.
    fn changes_for(&self, instance_id: &str) -> Option<Vec<Vec<String>>>;
}

/// File-backed index: a JSON list of `{instance_id: [[descriptor, …], …]}`
/// maps, loaded once at construction.
pub struct JsonSymbolIndex {
    entries: Vec<BTreeMap<String, Vec<Vec<String>>>>,
}

impl JsonSymbolIndex {
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, ServiceError> {
        let raw = std::fs::read_to_string(path.into())?;
        let entries = serde_json::from_str(&raw)
            .map_err(|e| ServiceError::MalformedResponse(format!("symbol index: {e}")))?;
        Ok(Self { entries })
    }

    pub fn from_entries(entries: Vec<BTreeMap<String, Vec<Vec<String>>>>) -> Self {
        Self { entries }
    }
}

impl SymbolChangeIndex for JsonSymbolIndex {
    fn changes_for(&self, instance_id: &str) -> Option<Vec<Vec<String>>> {
        // First map carrying a non-empty entry for the id wins.
        self.entries
            .iter()
            .filter_map(|m| m.get(instance_id))
            .find(|groups| !groups.is_empty())
            .cloned()
    }
}

// ---------------------------------------------------------------------------
// ScriptCorpus
// ---------------------------------------------------------------------------

/// Read-only access to original script text by file name.
pub trait ScriptCorpus: Send + Sync {
    fn read_script(&self, name: &str) -> Result<String, ServiceError>;
}

/// Scripts resolved relative to a repository root on disk.
pub struct FsScriptCorpus {
    root: PathBuf,
}

impl FsScriptCorpus {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ScriptCorpus for FsScriptCorpus {
    fn read_script(&self, name: &str) -> Result<String, ServiceError> {
        let path = self.root.join(name);
        if !path.exists() {
            return Err(ServiceError::ScriptNotFound(name.to_string()));
        }
        Ok(std::fs::read_to_string(path)?)
    }
}

// ---------------------------------------------------------------------------
// ReviewGate
// ---------------------------------------------------------------------------

/// Reviewer's decision at the escalation boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    /// Retry with added guidance; the attempt budget resets.
    Change,
    /// Accept the escalation and move on.
    Continue,
    /// Stop the run entirely.
    Exit,
}

/// Structured signal returned by the human review gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSignal {
    pub decision: ReviewDecision,
    /// Free-text guidance; only meaningful for `Change`.
    pub guidance: String,
}

/// Blocking interactive boundary consulted when automated retries are spent.
///
/// Abstracted as a synchronous-looking call so scripted implementations can
/// stand in during tests without touching the loop's contract.
#[async_trait]
pub trait ReviewGate: Send + Sync {
    async fn present(&self, history: &[PatchAttempt]) -> Result<ReviewSignal, ServiceError>;
}

/// Per-iteration planning/tool context for the drafting prompt.
///
/// Recomputed on every loop entry because available tools and plan state may
/// change between iterations; the issue/code excerpt stays fixed.
pub trait ContextProvider: Send + Sync {
    fn context(&self, iteration: u32) -> String;
}

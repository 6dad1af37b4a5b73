//! Patchflow Core Library
//!
//! The range-location and patch-acceptance pipeline: turns a natural-language
//! issue report plus an embedded source snapshot into a validated candidate
//! patch, or a deliberate escalation to human judgment.
//!
//! The chain for one invocation:
//!
//! 1. extract the issue and code sub-documents from the composite input
//! 2. narrow the issue to candidate ranges (model-driven or retrieval-driven)
//! 3. resolve ranges to literal snippets
//! 4. drive the bounded generate/critique loop to a terminal outcome
//!
//! with the whole chain wrapped in jittered exponential backoff against
//! transient service failures.

pub mod backoff;
pub mod config;
pub mod domain;
pub mod extract;
pub mod locate;
pub mod obs;
pub mod patch_loop;
pub mod pipeline;
pub mod prompt;
pub mod retrieve;
pub mod services;
pub mod snippet;
pub mod telemetry;

pub use backoff::BackoffSchedule;
pub use config::PipelineConfig;
pub use domain::{
    is_patch_shaped, ExtractedDocument, ExtractionError, IssueContext, LineRange, LocatedRanges,
    PatchAttempt, PipelineError, PipelineOutcome, Result, ServiceError, Snippet, Verdict,
};
pub use extract::extract;
pub use locate::{
    LocatingMode, ModelDrivenLocator, RangeLocator, RetrievalLocator, RetrievalScoring,
};
pub use patch_loop::PatchLoop;
pub use pipeline::Pipeline;
pub use retrieve::rank;
pub use services::{
    ContextProvider, FsScriptCorpus, HttpTextService, JsonSymbolIndex, ReviewDecision, ReviewGate,
    ReviewSignal, ScriptCorpus, SymbolChangeIndex, TextService,
};
pub use snippet::{assemble_excerpt, isolate_file, line_window, map_ranges};

pub use patchflow_store::{
    read_history_artifact, write_history_artifact, AttemptRecord, FsWorkingMemory, MemoryEntry,
    MemoryWorkingMemory, RunHistoryRecord, WorkingMemoryLog,
};

pub use telemetry::init_tracing;

/// Patchflow version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

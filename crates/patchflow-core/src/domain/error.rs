//! Error taxonomy for the patch pipeline.
//!
//! The split matters for retry policy:
//!
//! - [`ExtractionError`] — malformed mandatory input, never retried
//! - [`PipelineError::Locating`] — locator parse budget spent, retried by the
//!   outer controller as a transient failure
//! - [`PipelineError::Service`] — opaque service failure, transient
//! - [`PipelineError::Exhausted`] — outer retry budget spent, fatal
//!
//! An unparseable candidate patch is a verdict, not an error; escalation is a
//! terminal outcome, not an error.

use thiserror::Error;

/// A required delimited region is absent from the composite input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("missing <{region}> region in input")]
    MissingRegion { region: &'static str },

    #[error("input has no body after the system header line")]
    EmptyBody,
}

/// Failure raised by an opaque external collaborator.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("text service error: {0}")]
    Text(String),

    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed service response: {0}")]
    MalformedResponse(String),

    #[error("script not found: {0}")]
    ScriptNotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Pipeline errors surfaced to the invocation's caller.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("range locating produced unparseable output after {attempts} attempts")]
    Locating { attempts: u32 },

    #[error("service failure: {0}")]
    Service(#[from] ServiceError),

    #[error("storage error: {0}")]
    Storage(#[from] patchflow_store::StoreError),

    #[error("pipeline retry budget exhausted after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

impl PipelineError {
    /// Whether the failure is eligible for a whole-invocation retry.
    ///
    /// Malformed mandatory input and a spent retry budget are fatal;
    /// everything else is assumed to be service-latency noise.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PipelineError::Locating { .. }
                | PipelineError::Service(_)
                | PipelineError::Storage(_)
        )
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

//! Domain types for the patch pipeline.

mod attempt;
mod error;
mod issue;
mod range;

pub use attempt::{is_patch_shaped, PatchAttempt, PipelineOutcome, Verdict};
pub use error::{ExtractionError, PipelineError, Result, ServiceError};
pub use issue::{ExtractedDocument, IssueContext};
pub use range::{LineRange, LocatedRanges, Snippet};

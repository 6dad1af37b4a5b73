//! Patchflow-Store: persistence layer for the patch pipeline.
//!
//! This crate owns the two write paths of a pipeline invocation:
//!
//! - the append-only working-memory log, written before every critique so the
//!   attempt trail survives interruption
//! - the final run-history artifact, a digest-verified JSON record of every
//!   attempt plus the terminal outcome
//!
//! Both are scoped to a single invocation keyed by `instance_id`; nothing
//! here is shared across concurrent invocations.

mod error;
mod record;
mod working_memory;

pub use error::{StoreError, StoreResult};
pub use record::{
    read_history_artifact, write_history_artifact, AttemptRecord, RecordDigest, RunHistoryRecord,
};
pub use working_memory::{FsWorkingMemory, MemoryEntry, MemoryWorkingMemory, WorkingMemoryLog};

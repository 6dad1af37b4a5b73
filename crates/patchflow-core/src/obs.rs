//! Structured observability hooks for pipeline lifecycle events.
//!
//! Emission functions for key lifecycle events: start, locating, attempt
//! drafting/verdicts, escalation, finish. The invocation-scoped span itself
//! lives on [`Pipeline::run`](crate::pipeline::Pipeline::run) via
//! `#[tracing::instrument]`, so it follows the future across awaits instead
//! of being held on one thread.
//!
//! Events are emitted at `info!` level; filtering is configured through
//! [`crate::telemetry::init_tracing`].

use tracing::info;

/// Emit event: pipeline invocation started.
pub fn emit_pipeline_started(instance_id: &str, invocation_attempt: u32) {
    info!(
        event = "pipeline.started",
        instance_id = %instance_id,
        invocation_attempt = invocation_attempt,
    );
}

/// Emit event: range locating finished with the number of located entries.
pub fn emit_locating_finished(instance_id: &str, mode: &str, entries: usize) {
    info!(
        event = "locating.finished",
        instance_id = %instance_id,
        mode = %mode,
        entries = entries,
    );
}

/// Emit event: one candidate patch drafted.
pub fn emit_attempt_drafted(instance_id: &str, attempt_number: u32) {
    info!(
        event = "attempt.drafted",
        instance_id = %instance_id,
        attempt_number = attempt_number,
    );
}

/// Emit event: a verdict was recorded for an attempt.
pub fn emit_attempt_verdict(instance_id: &str, attempt_number: u32, verdict: &str) {
    info!(
        event = "attempt.verdict",
        instance_id = %instance_id,
        attempt_number = attempt_number,
        verdict = %verdict,
    );
}

/// Emit event: automated retries spent, history surfaced to the review gate.
pub fn emit_escalated(instance_id: &str, attempts: usize) {
    info!(
        event = "pipeline.escalated",
        instance_id = %instance_id,
        attempts = attempts,
    );
}

/// Emit event: invocation reached a terminal outcome.
pub fn emit_pipeline_finished(instance_id: &str, outcome: &str, attempts: usize) {
    info!(
        event = "pipeline.finished",
        instance_id = %instance_id,
        outcome = %outcome,
        attempts = attempts,
    );
}

/// Emit event: transient failure, invocation will be retried (warning level).
pub fn emit_pipeline_retry(instance_id: &str, invocation_attempt: u32, error: &dyn std::fmt::Display) {
    tracing::warn!(
        event = "pipeline.retry",
        instance_id = %instance_id,
        invocation_attempt = invocation_attempt,
        error = %error,
    );
}

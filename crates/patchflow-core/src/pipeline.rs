//! Pipeline orchestration and the outer retry/backoff controller.
//!
//! One invocation is a single logical task: extract → locate → map →
//! generate/critique, with sequential awaits and no internal parallelism.
//! The controller wraps the whole chain: transient failures (service errors,
//! a spent locator parse budget) retry the invocation with jittered backoff;
//! malformed mandatory input fails immediately. The caller always observes
//! either a [`PipelineOutcome`] or a [`PipelineError`] — nothing is
//! swallowed.

use std::sync::Arc;

use patchflow_store::{write_history_artifact, AttemptRecord, RunHistoryRecord, WorkingMemoryLog};
use tracing::debug;

use crate::config::PipelineConfig;
use crate::domain::{
    IssueContext, LocatedRanges, PipelineError, PipelineOutcome, Result,
};
use crate::extract::extract;
use crate::locate::{
    LocatingMode, ModelDrivenLocator, RangeLocator, RetrievalLocator, RetrievalScoring,
};
use crate::obs;
use crate::patch_loop::PatchLoop;
use crate::prompt::describe_snippets;
use crate::services::{ContextProvider, ReviewGate, ScriptCorpus, SymbolChangeIndex, TextService};
use crate::snippet::{assemble_excerpt, map_ranges};

/// A fully wired pipeline, ready to resolve issue instances.
///
/// Collaborator handles are explicitly constructed and passed in by the
/// caller; concurrent invocations sharing a `Pipeline` share nothing mutable.
pub struct Pipeline {
    text: Arc<dyn TextService>,
    index: Arc<dyn SymbolChangeIndex>,
    scripts: Arc<dyn ScriptCorpus>,
    gate: Arc<dyn ReviewGate>,
    memory: Arc<dyn WorkingMemoryLog>,
    context: Option<Arc<dyn ContextProvider>>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        text: Arc<dyn TextService>,
        index: Arc<dyn SymbolChangeIndex>,
        scripts: Arc<dyn ScriptCorpus>,
        gate: Arc<dyn ReviewGate>,
        memory: Arc<dyn WorkingMemoryLog>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            text,
            index,
            scripts,
            gate,
            memory,
            context: None,
            config,
        }
    }

    /// Attach a per-iteration plan/tool context provider for drafting.
    pub fn with_context(mut self, context: Arc<dyn ContextProvider>) -> Self {
        self.context = Some(context);
        self
    }

    /// Resolve one issue instance, retrying the whole invocation on
    /// transient failures.
    ///
    /// The instrumented span follows the future across awaits, so `run` can
    /// be spawned as an independent task.
    #[tracing::instrument(
        name = "patchflow.run",
        skip(self, ctx),
        fields(instance_id = %ctx.instance_id)
    )]
    pub async fn run(&self, ctx: &IssueContext) -> Result<PipelineOutcome> {
        let budget = self.config.max_invocation_attempts.max(1);

        for attempt in 1..=budget {
            obs::emit_pipeline_started(&ctx.instance_id, attempt);
            match self.run_once(ctx).await {
                Ok(outcome) => return Ok(outcome),
                Err(err) if err.is_transient() => {
                    obs::emit_pipeline_retry(&ctx.instance_id, attempt, &err);
                    if attempt == budget {
                        return Err(PipelineError::Exhausted { attempts: budget });
                    }
                    // Suspension point: sleeping here must not block other
                    // concurrent invocations.
                    tokio::time::sleep(self.config.backoff.wait_for(attempt)).await;
                }
                Err(err) => return Err(err),
            }
        }

        Err(PipelineError::Exhausted { attempts: budget })
    }

    /// One un-retried pass through the pipeline.
    async fn run_once(&self, ctx: &IssueContext) -> Result<PipelineOutcome> {
        let doc = extract(&ctx.raw_text).map_err(PipelineError::Extraction)?;

        let excerpt = match self.config.locating {
            Some(mode) => {
                let located = self
                    .locator_for(mode)
                    .locate(&doc, &ctx.script_names, &ctx.instance_id)
                    .await?;
                self.render_excerpt(ctx, mode, &located, &doc.code_body)
            }
            None => None,
        };

        let looper = PatchLoop::new(
            self.text.clone(),
            self.text.clone(),
            self.scripts.clone(),
            self.gate.clone(),
            self.memory.clone(),
            self.config.max_retries,
        );
        let looper = match &self.context {
            Some(context) => looper.with_context(context.clone()),
            None => looper,
        };

        let outcome = looper.run(ctx, &doc, excerpt.as_deref()).await?;

        if let Some(dir) = &self.config.history_dir {
            let record = RunHistoryRecord::new(
                &ctx.instance_id,
                outcome
                    .history()
                    .iter()
                    .map(|a| AttemptRecord {
                        attempt_number: a.attempt_number,
                        candidate_patch: a.candidate_patch.clone(),
                        verdict: a.verdict.as_str().to_string(),
                    })
                    .collect(),
                outcome.as_str(),
            );
            write_history_artifact(&record, dir)?;
        }

        obs::emit_pipeline_finished(&ctx.instance_id, outcome.as_str(), outcome.history().len());
        Ok(outcome)
    }

    fn locator_for(&self, mode: LocatingMode) -> Box<dyn RangeLocator> {
        match mode {
            LocatingMode::ModelDriven => Box::new(ModelDrivenLocator::new(self.text.clone())),
            LocatingMode::Jaccard => Box::new(RetrievalLocator::new(
                self.index.clone(),
                RetrievalScoring::Jaccard,
            )),
            LocatingMode::Bm25 => Box::new(RetrievalLocator::new(
                self.index.clone(),
                RetrievalScoring::Bm25,
            )),
        }
    }

    fn render_excerpt(
        &self,
        ctx: &IssueContext,
        mode: LocatingMode,
        located: &LocatedRanges,
        code_body: &str,
    ) -> Option<String> {
        let snippets = map_ranges(located, code_body);
        obs::emit_locating_finished(&ctx.instance_id, mode.as_str(), snippets.len());
        debug!(
            event = "locating.ranges",
            instance_id = %ctx.instance_id,
            ranges = %describe_snippets(&snippets),
        );

        let excerpt = assemble_excerpt(&snippets);
        (!excerpt.trim().is_empty()).then_some(excerpt)
    }
}

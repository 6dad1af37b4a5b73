//! End-to-end pipeline scenarios with scripted collaborators.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use patchflow_core::{
    extract, map_ranges, IssueContext, JsonSymbolIndex, LocatingMode, MemoryWorkingMemory,
    ModelDrivenLocator, PatchAttempt, Pipeline, PipelineConfig, PipelineError, PipelineOutcome,
    RangeLocator, RetrievalLocator, RetrievalScoring, ReviewDecision, ReviewGate, ReviewSignal,
    ScriptCorpus, ServiceError, TextService, Verdict,
};

const COMPOSITE_INPUT: &str = "SYS\n<issue>Bug: off-by-one in parse()</issue>\n<code>[start of a.py]\ndef parse():\n  return 1\n[end of a.py]</code>";

const PATCH: &str = "\
--- a.py
+++ a.py
@@ -1,2 +1,2 @@
 def parse():
-  return 1
+  return 0
";

/// Text service that answers by prompt role: locator prompts get a range
/// mapping, critique prompts get queued verdicts, everything else gets a
/// drafted patch. Records every prompt it sees.
struct RoleAwareText {
    locator_reply: String,
    draft_reply: String,
    verdicts: Mutex<VecDeque<String>>,
    fallback_verdict: String,
    prompts: Mutex<Vec<String>>,
}

impl RoleAwareText {
    fn new(locator_reply: &str, draft_reply: &str, verdicts: &[&str], fallback: &str) -> Arc<Self> {
        Arc::new(Self {
            locator_reply: locator_reply.to_string(),
            draft_reply: draft_reply.to_string(),
            verdicts: Mutex::new(verdicts.iter().map(|s| s.to_string()).collect()),
            fallback_verdict: fallback.to_string(),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextService for RoleAwareText {
    async fn ask(&self, prompt: &str, _system: Option<&str>) -> Result<String, ServiceError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if prompt.contains("return a boolean value") {
            return Ok(self
                .verdicts
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.fallback_verdict.clone()));
        }
        if prompt.contains("# Instruction") {
            return Ok(self.locator_reply.clone());
        }
        Ok(self.draft_reply.clone())
    }
}

/// Text service that fails a fixed number of times, then delegates.
struct FlakyText {
    remaining_failures: Mutex<u32>,
    inner: Arc<dyn TextService>,
}

#[async_trait]
impl TextService for FlakyText {
    async fn ask(&self, prompt: &str, system: Option<&str>) -> Result<String, ServiceError> {
        {
            let mut remaining = self.remaining_failures.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ServiceError::Text("gateway timeout".to_string()));
            }
        }
        self.inner.ask(prompt, system).await
    }
}

struct StubCorpus;
impl ScriptCorpus for StubCorpus {
    fn read_script(&self, name: &str) -> Result<String, ServiceError> {
        Ok(format!("# original contents of {name}\ndef parse():\n  return 1\n"))
    }
}

struct StaticGate(ReviewDecision);

#[async_trait]
impl ReviewGate for StaticGate {
    async fn present(&self, _history: &[PatchAttempt]) -> Result<ReviewSignal, ServiceError> {
        Ok(ReviewSignal {
            decision: self.0,
            guidance: String::new(),
        })
    }
}

fn issue_context() -> IssueContext {
    IssueContext::new(COMPOSITE_INPUT, vec!["a.py".to_string()], "inst-e2e")
}

fn pipeline_with(text: Arc<dyn TextService>, config: PipelineConfig) -> Pipeline {
    Pipeline::new(
        text,
        Arc::new(JsonSymbolIndex::from_entries(Vec::new())),
        Arc::new(StubCorpus),
        Arc::new(StaticGate(ReviewDecision::Continue)),
        Arc::new(MemoryWorkingMemory::new()),
        config,
    )
}

// Scenario A: a stubbed model-driven locator mapping resolves to the literal
// first two lines of the isolated file block.
#[tokio::test]
async fn scenario_a_model_driven_range_maps_to_lines() {
    let text = RoleAwareText::new("```json\n{\"a.py\": [\"1-2\"]}\n```", PATCH, &[], "true");
    let locator = ModelDrivenLocator::new(text);

    let doc = extract(COMPOSITE_INPUT).unwrap();
    let located = locator
        .locate(&doc, &["a.py".to_string()], "inst-e2e")
        .await
        .unwrap();

    let snippets = map_ranges(&located, &doc.code_body);
    assert_eq!(snippets.len(), 1);
    assert_eq!(snippets[0].file, "a.py");
    assert_eq!(snippets[0].text, "def parse():\n  return 1");
}

// Scenario B: a critic that always rejects drives exactly max_retries drafts
// and then escalates, with every attempt recorded as rejected.
#[tokio::test]
async fn scenario_b_always_rejected_escalates() {
    let history_dir = tempfile::tempdir().unwrap();
    let text = RoleAwareText::new("", PATCH, &[], "false");
    let pipeline = pipeline_with(
        text,
        PipelineConfig {
            locating: None,
            history_dir: Some(history_dir.path().to_path_buf()),
            ..Default::default()
        },
    );

    let outcome = pipeline.run(&issue_context()).await.unwrap();
    let PipelineOutcome::Escalated { history } = outcome else {
        panic!("expected escalation, got {outcome:?}");
    };
    assert_eq!(history.len(), 3);
    assert!(history.iter().all(|a| a.verdict == Verdict::Rejected));

    // Run history was persisted and verifies against its digest.
    let record = patchflow_core::read_history_artifact("inst-e2e", history_dir.path()).unwrap();
    assert_eq!(record.attempts.len(), 3);
    assert_eq!(record.outcome, "escalated");
    assert!(record
        .attempts
        .iter()
        .all(|a| a.verdict == "rejected"));
}

// Scenario C: acceptance on the second attempt ends the run with a
// two-entry history whose first record is rejected.
#[tokio::test]
async fn scenario_c_accept_on_second_attempt() {
    let text = RoleAwareText::new("", PATCH, &["false"], "true");
    let pipeline = pipeline_with(
        text,
        PipelineConfig {
            locating: None,
            ..Default::default()
        },
    );

    let outcome = pipeline.run(&issue_context()).await.unwrap();
    let PipelineOutcome::Success { patch, history } = outcome else {
        panic!("expected success, got {outcome:?}");
    };
    assert_eq!(patch, PATCH);
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].verdict, Verdict::Rejected);
    assert_eq!(history[0].attempt_number, 1);
    assert_eq!(history[1].verdict, Verdict::Accepted);
}

// Scenario D: an instance with no symbol-change entry locates nothing and
// does not raise.
#[tokio::test]
async fn scenario_d_unindexed_instance_locates_nothing() {
    let index = Arc::new(JsonSymbolIndex::from_entries(vec![BTreeMap::from([(
        "some-other-instance".to_string(),
        vec![vec!["pkg/mod.py.parse".to_string()]],
    )])]));
    let locator = RetrievalLocator::new(index, RetrievalScoring::Jaccard);

    let doc = extract(COMPOSITE_INPUT).unwrap();
    let located = locator.locate(&doc, &[], "inst-e2e").await.unwrap();
    assert!(located.is_empty());
}

// Full chain with model-driven locating: the mapped excerpt reaches the
// drafting prompt.
#[tokio::test]
async fn model_driven_excerpt_flows_into_drafting_prompt() {
    let text = RoleAwareText::new("```json\n{\"a.py\": [\"1-2\"]}\n```", PATCH, &[], "true");
    let pipeline = pipeline_with(
        text.clone(),
        PipelineConfig {
            locating: Some(LocatingMode::ModelDriven),
            ..Default::default()
        },
    );

    let outcome = pipeline.run(&issue_context()).await.unwrap();
    assert!(matches!(outcome, PipelineOutcome::Success { .. }));

    let draft_prompt = text
        .prompts()
        .into_iter()
        .find(|p| p.contains("git apply"))
        .expect("a drafting prompt was sent");
    assert!(draft_prompt.contains("--- a.py"));
    assert!(draft_prompt.contains("def parse():\n  return 1"));
}

// Property: fewer than five consecutive transient failures still converge on
// an outcome; the backoff sleeps run on a paused clock.
#[tokio::test(start_paused = true)]
async fn transient_failures_below_budget_recover() {
    let behaving = RoleAwareText::new("", PATCH, &[], "true");
    let flaky = Arc::new(FlakyText {
        remaining_failures: Mutex::new(4),
        inner: behaving,
    });
    let pipeline = pipeline_with(
        flaky,
        PipelineConfig {
            locating: None,
            ..Default::default()
        },
    );

    let outcome = pipeline.run(&issue_context()).await.unwrap();
    assert!(matches!(outcome, PipelineOutcome::Success { .. }));
}

// Property: five consecutive transient failures exhaust the controller.
#[tokio::test(start_paused = true)]
async fn five_transient_failures_exhaust_controller() {
    let behaving = RoleAwareText::new("", PATCH, &[], "true");
    let flaky = Arc::new(FlakyText {
        remaining_failures: Mutex::new(5),
        inner: behaving,
    });
    let pipeline = pipeline_with(
        flaky,
        PipelineConfig {
            locating: None,
            ..Default::default()
        },
    );

    let err = pipeline.run(&issue_context()).await.unwrap_err();
    assert!(matches!(err, PipelineError::Exhausted { attempts: 5 }));
}

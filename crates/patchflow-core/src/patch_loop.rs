//! Bounded patch generation/critique loop.
//!
//! An explicit state machine, `Drafting → Reviewing → {Accepted | Retrying |
//! Escalated}`, so retry, escalate, and fail are distinct typed transitions
//! rather than caught exceptions:
//!
//! - Drafting asks the generator once; non-patch-shaped output records an
//!   `Unparseable` attempt without reaching the critic
//! - every drafted candidate is appended to working memory before critique,
//!   so the attempt trail survives interruption mid-loop
//! - Reviewing reduces the critic's reply to an accept/reject verdict
//! - on budget exhaustion the full history goes to the human review gate; a
//!   `Change` signal resets the budget and carries the guidance forward

use std::sync::Arc;

use patchflow_store::{MemoryEntry, WorkingMemoryLog};

use crate::domain::{
    is_patch_shaped, ExtractedDocument, IssueContext, PatchAttempt, PipelineOutcome, Result,
    Verdict,
};
use crate::obs;
use crate::prompt::{build_draft_prompt, build_review_prompt, decode_verdict, DraftPrompt};
use crate::services::{ContextProvider, ReviewDecision, ReviewGate, ScriptCorpus, TextService};

enum LoopState {
    Drafting,
    Reviewing { candidate: String },
    Escalating,
}

/// The generation/critique loop and its collaborators.
pub struct PatchLoop {
    generator: Arc<dyn TextService>,
    critic: Arc<dyn TextService>,
    scripts: Arc<dyn ScriptCorpus>,
    gate: Arc<dyn ReviewGate>,
    memory: Arc<dyn WorkingMemoryLog>,
    context: Option<Arc<dyn ContextProvider>>,
    max_retries: u32,
}

impl PatchLoop {
    pub fn new(
        generator: Arc<dyn TextService>,
        critic: Arc<dyn TextService>,
        scripts: Arc<dyn ScriptCorpus>,
        gate: Arc<dyn ReviewGate>,
        memory: Arc<dyn WorkingMemoryLog>,
        max_retries: u32,
    ) -> Self {
        Self {
            generator,
            critic,
            scripts,
            gate,
            memory,
            context: None,
            max_retries,
        }
    }

    /// Attach a per-iteration plan/tool context provider.
    pub fn with_context(mut self, context: Arc<dyn ContextProvider>) -> Self {
        self.context = Some(context);
        self
    }

    /// Drive the loop to a terminal outcome.
    ///
    /// `excerpt` is the mapped code excerpt; it stays fixed across
    /// iterations while guidance and iteration context vary.
    pub async fn run(
        &self,
        ctx: &IssueContext,
        doc: &ExtractedDocument,
        excerpt: Option<&str>,
    ) -> Result<PipelineOutcome> {
        let issue_and_code = doc.issue_and_code();
        let mut history: Vec<PatchAttempt> = Vec::new();
        let mut budget_used = 0u32;
        let mut guidance: Option<String> = None;
        let mut state = LoopState::Drafting;

        loop {
            state = match state {
                LoopState::Drafting => {
                    let attempt_number = history.len() as u32 + 1;
                    let iteration_context =
                        self.context.as_ref().map(|c| c.context(attempt_number));
                    let prompt = build_draft_prompt(&DraftPrompt {
                        script_names: &ctx.script_names,
                        issue_and_code: &issue_and_code,
                        excerpt,
                        guidance: guidance.as_deref(),
                        iteration_context: iteration_context.as_deref(),
                    });

                    let candidate = self
                        .generator
                        .ask(&prompt, Some(&doc.system_header))
                        .await?;
                    // Appended before critique so the trail is recoverable
                    // even if the process dies mid-loop.
                    self.memory
                        .append(MemoryEntry::assistant(&ctx.instance_id, &candidate))
                        .await?;
                    obs::emit_attempt_drafted(&ctx.instance_id, attempt_number);

                    if is_patch_shaped(&candidate) {
                        LoopState::Reviewing { candidate }
                    } else {
                        self.record(&mut history, candidate, Verdict::Unparseable, ctx);
                        budget_used += 1;
                        if budget_used >= self.max_retries {
                            LoopState::Escalating
                        } else {
                            LoopState::Drafting
                        }
                    }
                }

                LoopState::Reviewing { candidate } => {
                    let accepted = self.review(ctx, &candidate).await?;
                    let verdict = if accepted {
                        Verdict::Accepted
                    } else {
                        Verdict::Rejected
                    };
                    self.record(&mut history, candidate.clone(), verdict, ctx);

                    if accepted {
                        return Ok(PipelineOutcome::Success {
                            patch: candidate,
                            history,
                        });
                    }
                    budget_used += 1;
                    if budget_used >= self.max_retries {
                        LoopState::Escalating
                    } else {
                        LoopState::Drafting
                    }
                }

                LoopState::Escalating => {
                    obs::emit_escalated(&ctx.instance_id, history.len());
                    let signal = self.gate.present(&history).await?;
                    match signal.decision {
                        ReviewDecision::Change => {
                            self.memory
                                .append(MemoryEntry::user(&ctx.instance_id, &signal.guidance))
                                .await?;
                            guidance = Some(signal.guidance);
                            budget_used = 0;
                            LoopState::Drafting
                        }
                        ReviewDecision::Continue | ReviewDecision::Exit => {
                            return Ok(PipelineOutcome::Escalated { history });
                        }
                    }
                }
            };
        }
    }

    fn record(
        &self,
        history: &mut Vec<PatchAttempt>,
        candidate_patch: String,
        verdict: Verdict,
        ctx: &IssueContext,
    ) {
        let attempt_number = history.len() as u32 + 1;
        obs::emit_attempt_verdict(&ctx.instance_id, attempt_number, verdict.as_str());
        history.push(PatchAttempt {
            attempt_number,
            candidate_patch,
            verdict,
        });
    }

    /// One critique call: candidate, per-script ground truth, and the latest
    /// working-memory entry, decoded to a boolean.
    async fn review(&self, ctx: &IssueContext, candidate: &str) -> Result<bool> {
        let mut scripts = Vec::with_capacity(ctx.script_names.len());
        for name in &ctx.script_names {
            scripts.push((name.clone(), self.scripts.read_script(name)?));
        }
        let memory = self
            .memory
            .latest()
            .await?
            .map(|e| e.content)
            .unwrap_or_default();

        let prompt = build_review_prompt(candidate, &scripts, &memory);
        let reply = self.critic.ask(&prompt, None).await?;
        Ok(decode_verdict(&reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ServiceError;
    use crate::services::ReviewSignal;
    use async_trait::async_trait;
    use patchflow_store::MemoryWorkingMemory;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    const PATCH: &str = "--- a.py\n+++ a.py\n@@ -1,1 +1,1 @@\n-x\n+y\n";

    struct ScriptedText {
        replies: Mutex<VecDeque<String>>,
        fallback: String,
    }

    impl ScriptedText {
        fn new(replies: &[&str], fallback: &str) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().map(|s| s.to_string()).collect()),
                fallback: fallback.to_string(),
            })
        }
    }

    #[async_trait]
    impl TextService for ScriptedText {
        async fn ask(
            &self,
            _p: &str,
            _s: Option<&str>,
        ) -> std::result::Result<String, ServiceError> {
            Ok(self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone()))
        }
    }

    struct EmptyCorpus;
    impl ScriptCorpus for EmptyCorpus {
        fn read_script(&self, name: &str) -> std::result::Result<String, ServiceError> {
            Ok(format!("# original {name}\n"))
        }
    }

    struct ScriptedGate {
        signals: Mutex<VecDeque<ReviewSignal>>,
    }

    impl ScriptedGate {
        fn always(decision: ReviewDecision) -> Arc<Self> {
            Arc::new(Self {
                signals: Mutex::new(VecDeque::from([ReviewSignal {
                    decision,
                    guidance: String::new(),
                }])),
            })
        }

        fn sequence(signals: Vec<ReviewSignal>) -> Arc<Self> {
            Arc::new(Self {
                signals: Mutex::new(signals.into()),
            })
        }
    }

    #[async_trait]
    impl ReviewGate for ScriptedGate {
        async fn present(
            &self,
            _h: &[PatchAttempt],
        ) -> std::result::Result<ReviewSignal, ServiceError> {
            Ok(self
                .signals
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(ReviewSignal {
                    decision: ReviewDecision::Exit,
                    guidance: String::new(),
                }))
        }
    }

    fn fixture() -> (IssueContext, ExtractedDocument) {
        let ctx = IssueContext::new("raw", vec!["a.py".to_string()], "inst-1");
        let doc = ExtractedDocument {
            system_header: "SYS".into(),
            issue_body: "bug".into(),
            code_body: "def parse(): pass".into(),
            cleaned_user_message: String::new(),
        };
        (ctx, doc)
    }

    fn make_loop(
        generator: Arc<dyn TextService>,
        critic: Arc<dyn TextService>,
        gate: Arc<dyn ReviewGate>,
        memory: Arc<MemoryWorkingMemory>,
    ) -> PatchLoop {
        PatchLoop::new(generator, critic, Arc::new(EmptyCorpus), gate, memory, 3)
    }

    #[tokio::test]
    async fn test_always_rejected_escalates_after_budget() {
        let (ctx, doc) = fixture();
        let memory = Arc::new(MemoryWorkingMemory::new());
        let looper = make_loop(
            ScriptedText::new(&[], PATCH),
            ScriptedText::new(&[], "false"),
            ScriptedGate::always(ReviewDecision::Continue),
            memory.clone(),
        );

        let outcome = looper.run(&ctx, &doc, None).await.unwrap();
        let PipelineOutcome::Escalated { history } = outcome else {
            panic!("expected escalation");
        };
        assert_eq!(history.len(), 3);
        assert!(history.iter().all(|a| a.verdict == Verdict::Rejected));
        let numbers: Vec<u32> = history.iter().map(|a| a.attempt_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        // Every draft was logged before critique.
        assert_eq!(memory.entries().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_accept_on_second_attempt() {
        let (ctx, doc) = fixture();
        let memory = Arc::new(MemoryWorkingMemory::new());
        let looper = make_loop(
            ScriptedText::new(&[], PATCH),
            ScriptedText::new(&["false"], "true"),
            ScriptedGate::always(ReviewDecision::Exit),
            memory,
        );

        let outcome = looper.run(&ctx, &doc, None).await.unwrap();
        let PipelineOutcome::Success { history, .. } = outcome else {
            panic!("expected success");
        };
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].verdict, Verdict::Rejected);
        assert_eq!(history[1].verdict, Verdict::Accepted);
    }

    #[tokio::test]
    async fn test_unparseable_draft_skips_critic() {
        let (ctx, doc) = fixture();
        let memory = Arc::new(MemoryWorkingMemory::new());
        let looper = make_loop(
            ScriptedText::new(&["not a patch at all"], PATCH),
            ScriptedText::new(&[], "true"),
            ScriptedGate::always(ReviewDecision::Exit),
            memory,
        );

        let outcome = looper.run(&ctx, &doc, None).await.unwrap();
        let PipelineOutcome::Success { history, .. } = outcome else {
            panic!("expected success");
        };
        assert_eq!(history[0].verdict, Verdict::Unparseable);
        assert_eq!(history[1].verdict, Verdict::Accepted);
    }

    #[tokio::test]
    async fn test_change_signal_resets_budget_and_carries_guidance() {
        let (ctx, doc) = fixture();
        let memory = Arc::new(MemoryWorkingMemory::new());
        let gate = ScriptedGate::sequence(vec![
            ReviewSignal {
                decision: ReviewDecision::Change,
                guidance: "focus on parse()".to_string(),
            },
            ReviewSignal {
                decision: ReviewDecision::Continue,
                guidance: String::new(),
            },
        ]);
        // Reject 3, then accept on the first post-guidance attempt.
        let looper = make_loop(
            ScriptedText::new(&[], PATCH),
            ScriptedText::new(&["false", "false", "false"], "true"),
            gate,
            memory.clone(),
        );

        let outcome = looper.run(&ctx, &doc, None).await.unwrap();
        let PipelineOutcome::Success { history, .. } = outcome else {
            panic!("expected success after guidance");
        };
        assert_eq!(history.len(), 4);
        assert_eq!(history[3].attempt_number, 4);
        assert_eq!(history[3].verdict, Verdict::Accepted);

        // The human guidance was appended to working memory.
        let entries = memory.entries().await.unwrap();
        assert!(entries
            .iter()
            .any(|e| e.role == "user" && e.content == "focus on parse()"));
    }
}

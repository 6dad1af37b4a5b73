//! Prompt assembly for drafting and critique.
//!
//! Fixed templates keep the wire contract with the generation service
//! strict: drafting always demands a single `git apply`-able patch in
//! unified-diff form, and critique always ends with a boolean request so the
//! reply can be decoded mechanically.

use crate::domain::Snippet;

/// The patch shape the generator must produce.
pub const PATCH_FORMAT: &str = r#"
```diff
--- original_file.py
+++ modified_file.py
@@ -line_number,context_lines +line_number,context_lines @@
- original line of code to be replaced or removed
+ new line of code to be added or to replace the original
```
"#;

/// Standing requirement prepended to every drafting prompt.
pub const REQUIREMENT: &str = "Please rewrite the code to address the issues.";

/// Inputs assembled once per loop entry; the excerpt stays fixed across
/// iterations while guidance and iteration context vary.
pub struct DraftPrompt<'a> {
    pub script_names: &'a [String],
    pub issue_and_code: &'a str,
    pub excerpt: Option<&'a str>,
    pub guidance: Option<&'a str>,
    pub iteration_context: Option<&'a str>,
}

/// Build the drafting prompt.
pub fn build_draft_prompt(parts: &DraftPrompt<'_>) -> String {
    let mut sections = vec![
        REQUIREMENT.to_string(),
        format!(
            "You only need to modify the code files listed here {:?}.\n\
             Notice:\n\
             1. Analyse the located range and issue, especially for ValueError, and identify the influenced code lines.\n\
             2. Only change a few lines, and make sure the result can be applied with git apply.\n\
             3. Solve this issue by generating a single patch file that can be applied directly to the repository.\n\
             4. Use the format: {}",
            parts.script_names, PATCH_FORMAT
        ),
        parts.issue_and_code.to_string(),
    ];

    if let Some(excerpt) = parts.excerpt {
        sections.push(format!(
            "The located range of code to be modified is:\n'''\n{excerpt}\n'''"
        ));
    }
    if let Some(context) = parts.iteration_context {
        sections.push(format!("Current plan and tool context:\n{context}"));
    }
    if let Some(guidance) = parts.guidance {
        sections.push(format!("Reviewer guidance for this attempt:\n{guidance}"));
    }

    sections.join("\n\n")
}

/// Build the critique prompt: candidate patch, per-script ground truth, and
/// the latest working-memory entry, ending with an explicit boolean request.
pub fn build_review_prompt(
    candidate_patch: &str,
    scripts: &[(String, String)],
    memory: &str,
) -> String {
    let mut sections = vec![format!(
        "Please ensure that the candidate patch below fixes the reported issue \
         and is in valid patch format.\n\nCandidate patch:\n{candidate_patch}"
    )];

    for (name, content) in scripts {
        sections.push(format!("Original script {name}:\n{content}"));
    }
    sections.push(format!("Most recent working context:\n{memory}"));
    sections.push(
        "Finally, return a boolean value (true or false) to indicate the result of the review. \
         If the patch plausibly resolves the issue, return true; otherwise, return false."
            .to_string(),
    );

    sections.join("\n\n")
}

/// Decode the critic's reply into an accept/reject verdict.
///
/// The first `true`/`false` word (case-insensitive) decides. A reply with
/// neither counts as a rejection — the contract asked for a boolean and the
/// loop must stay bounded.
pub fn decode_verdict(reply: &str) -> bool {
    for word in reply.split(|c: char| !c.is_alphanumeric()) {
        if word.eq_ignore_ascii_case("true") {
            return true;
        }
        if word.eq_ignore_ascii_case("false") {
            return false;
        }
    }
    false
}

/// Render snippets as the located-range block embedded in drafting prompts.
pub fn describe_snippets(snippets: &[Snippet]) -> String {
    snippets
        .iter()
        .map(|s| format!("{} {}", s.file, s.range))
        .collect::<Vec<_>>()
        .join(", ")
}

//! Model-driven range location.
//!
//! Sends a fixed instruction template to the text service and parses the
//! reply as a strict JSON mapping of `file → ["start-end", …]`. The
//! instruction constrains the output shape so parsing can be strict: any
//! reply not matching the literal mapping shape is a parse failure, never
//! coerced. Parse failures are retried with `2^attempt`-second backoff
//! before surfacing a locating error, which the outer controller treats as
//! transient.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::warn;

use crate::domain::{ExtractedDocument, LineRange, LocatedRanges, PipelineError, Result};
use crate::services::TextService;

const LOCATING_RANGES_INSTRUCTION: &str = r#"
# Instruction
Locate the code files to be modified and their line ranges in the provided <code>code</code> blocks based on the given <issue>issue</issue>. The accessible code files are {script_names}. If the code is extremely long, focus on the <issue>issue</issue> description to narrow down the areas of concern. Each line range should span 50-300 lines and there may be more than one range per file.

# Think about it by following these steps:
1. Locate the files containing errors based on the <issue>issue</issue> by using a single class or function as the basic unit of investigation.
2. For each located file:
   a. Locate the relevant code section(s) based on the <issue>issue</issue> description.
   b. Determine the line range(s) within those code sections that need to be modified.
   c. Ensure the line range(s) fall within the 50-300 line limit, adjusting as necessary.
3. Output the files and line ranges as a single JSON object and nothing else.

# Examples:
1. If file1.py has an error with line range 20-50, output:
```json
{{"file1.py": ["20-50"]}}
```
2. If file1.py has errors with line ranges 20-50 and 100-120, output:
```json
{{"file1.py": ["20-50", "100-120"]}}
```
3. If file1.py has an error with line range 20-50 and file2.py has errors with line ranges 20-50 and 100-120, output:
```json
{{"file1.py": ["20-50"], "file2.py": ["20-50", "100-120"]}}
```

# Issues and Codes
{issues_and_codes}
"#;

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:json|python)?\s*(.*?)```").expect("valid regex"))
}

fn range_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+-\d+$").expect("valid regex"))
}

/// Strict parse of the model reply into a range mapping.
///
/// Accepts a fenced code block or a bare JSON object. Every value must be a
/// list of `"start-end"` tokens with `start ≤ end`. Returns `None` on any
/// deviation from that shape.
fn parse_range_map(response: &str) -> Option<BTreeMap<String, Vec<LineRange>>> {
    let body = fence_re()
        .captures(response)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| response.trim().to_string());

    let raw: BTreeMap<String, Vec<String>> = serde_json::from_str(body.trim()).ok()?;

    let mut files = BTreeMap::new();
    for (file, tokens) in raw {
        let mut ranges = Vec::with_capacity(tokens.len());
        for token in tokens {
            if !range_token_re().is_match(&token) {
                return None;
            }
            let (start, end) = token.split_once('-')?;
            let range = LineRange::new(start.parse().ok()?, end.parse().ok()?)?;
            ranges.push(range);
        }
        files.insert(file, ranges);
    }
    Some(files)
}

/// Locator that derives ranges from the text service's structured reply.
pub struct ModelDrivenLocator {
    text: Arc<dyn TextService>,
    max_parse_retries: u32,
}

impl ModelDrivenLocator {
    pub fn new(text: Arc<dyn TextService>) -> Self {
        Self {
            text,
            max_parse_retries: 3,
        }
    }

    fn build_prompt(&self, doc: &ExtractedDocument, script_names: &[String]) -> String {
        // Unescape example braces before splicing user content in, so code
        // bodies are never rewritten.
        LOCATING_RANGES_INSTRUCTION
            .replace("{{", "{")
            .replace("}}", "}")
            .replace("{script_names}", &format!("{script_names:?}"))
            .replace("{issues_and_codes}", &doc.issue_and_code())
    }
}

#[async_trait]
impl super::RangeLocator for ModelDrivenLocator {
    async fn locate(
        &self,
        doc: &ExtractedDocument,
        script_names: &[String],
        _instance_id: &str,
    ) -> Result<LocatedRanges> {
        let prompt = self.build_prompt(doc, script_names);

        for attempt in 1..=self.max_parse_retries {
            let response = self.text.ask(&prompt, None).await?;
            if let Some(files) = parse_range_map(&response) {
                return Ok(LocatedRanges::Lines { files });
            }

            warn!(
                event = "locating.parse_failed",
                attempt = attempt,
                "locator reply did not match the expected mapping shape"
            );
            if attempt < self.max_parse_retries {
                tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
            }
        }

        Err(PipelineError::Locating {
            attempts: self.max_parse_retries,
        })
    }
}

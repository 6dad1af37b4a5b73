//! RangeText extraction from composite issue-plus-code blobs.
//!
//! Input shape: a first-line system header, then free text interleaving an
//! `<issue>…</issue>` region and a `<code>…</code>` region. Before either
//! region is located, URL-shaped substrings and any embedded
//! `<patch>…</patch>` block are removed, so a ground-truth patch in the input
//! can never leak into downstream prompts.
//!
//! Issue-body narrowing:
//! - a `###`/`####` `Versions` sub-section is stripped as boilerplate
//! - a `###`/`####` `Actual Results` sub-section, when present, supersedes
//!   the whole issue body (concrete failure evidence beats narrative)
//!
//! Pure function of its input; no side effects.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::{ExtractedDocument, ExtractionError};

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://\S+").expect("valid regex"))
}

fn patch_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<patch>.*?</patch>").expect("valid regex"))
}

fn issue_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<issue>(.*?)</issue>").expect("valid regex"))
}

fn code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<code>(.*?)</code>").expect("valid regex"))
}

fn versions_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#{3,4} Versions").expect("valid regex"))
}

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#{3,4}").expect("valid regex"))
}

fn actual_results_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)#{3,4} Actual Results.*").expect("valid regex"))
}

/// Remove every `Versions` sub-section: from its heading up to the next
/// heading, or to the end of text when it is the last section.
fn strip_versions_sections(issue: &str) -> String {
    let mut out = issue.to_string();
    while let Some(m) = versions_heading_re().find(&out) {
        let tail_start = m.end();
        let cut_end = match heading_re().find(&out[tail_start..]) {
            Some(next) => tail_start + next.start(),
            None => out.len(),
        };
        out.replace_range(m.start()..cut_end, "");
    }
    out
}

/// Split the composite input into its sub-documents.
///
/// Fails with [`ExtractionError`] when the input has no body after the
/// header line, or when either required delimited region is absent or empty.
pub fn extract(raw_text: &str) -> Result<ExtractedDocument, ExtractionError> {
    let (system_header, body) = raw_text
        .split_once('\n')
        .ok_or(ExtractionError::EmptyBody)?;

    let without_urls = url_re().replace_all(body, "");
    let cleaned_user_message = patch_re().replace_all(&without_urls, "").into_owned();

    let issue_raw = issue_re()
        .captures(&cleaned_user_message)
        .map(|c| c[1].to_string())
        .ok_or(ExtractionError::MissingRegion { region: "issue" })?;

    let code_body = code_re()
        .captures(&cleaned_user_message)
        .map(|c| c[1].to_string())
        .ok_or(ExtractionError::MissingRegion { region: "code" })?;

    let narrowed = strip_versions_sections(&issue_raw);
    let issue_body = match actual_results_re().find(&narrowed) {
        Some(m) => m.as_str().to_string(),
        None => narrowed,
    };

    if issue_body.trim().is_empty() {
        return Err(ExtractionError::MissingRegion { region: "issue" });
    }
    if code_body.trim().is_empty() {
        return Err(ExtractionError::MissingRegion { region: "code" });
    }

    Ok(ExtractedDocument {
        system_header: system_header.to_string(),
        issue_body,
        code_body,
        cleaned_user_message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn composite(issue: &str, code: &str) -> String {
        format!("SYSTEM HEADER\n<issue>{issue}</issue>\n<code>{code}</code>\n")
    }

    #[test]
    fn test_extract_well_formed() {
        let input = composite("Bug: off-by-one in parse()", "[start of a.py]\nx = 1\n[end of a.py]");
        let doc = extract(&input).unwrap();
        assert_eq!(doc.system_header, "SYSTEM HEADER");
        assert_eq!(doc.issue_body, "Bug: off-by-one in parse()");
        assert!(doc.code_body.contains("[start of a.py]"));
    }

    #[test]
    fn test_extract_missing_issue() {
        let err = extract("SYS\n<code>x</code>").unwrap_err();
        assert_eq!(err, ExtractionError::MissingRegion { region: "issue" });
    }

    #[test]
    fn test_extract_missing_code() {
        let err = extract("SYS\n<issue>broken</issue>").unwrap_err();
        assert_eq!(err, ExtractionError::MissingRegion { region: "code" });
    }

    #[test]
    fn test_extract_no_body() {
        let err = extract("only a header line").unwrap_err();
        assert_eq!(err, ExtractionError::EmptyBody);
    }

    #[test]
    fn test_urls_removed() {
        let input = composite("see https://example.com/report for details", "code here");
        let doc = extract(&input).unwrap();
        assert!(!doc.issue_body.contains("https://"));
        assert!(doc.issue_body.contains("see"));
    }

    #[test]
    fn test_embedded_patch_cannot_leak() {
        let input = format!(
            "SYS\n<patch>--- a.py\n+++ a.py\n@@ -1,1 +1,1 @@\n-x\n+y\n</patch>\n{}",
            composite("broken parse", "code").split_once('\n').unwrap().1
        );
        let doc = extract(&input).unwrap();
        assert!(!doc.cleaned_user_message.contains("<patch>"));
        assert!(!doc.cleaned_user_message.contains("+++ a.py"));
    }

    #[test]
    fn test_versions_section_stripped() {
        let issue = "Crash on load\n### Versions\nnumpy 1.19\npython 3.8\n### Context\nmore text";
        let doc = extract(&composite(issue, "code")).unwrap();
        assert!(!doc.issue_body.contains("numpy 1.19"));
        assert!(doc.issue_body.contains("Crash on load"));
        assert!(doc.issue_body.contains("more text"));
    }

    #[test]
    fn test_trailing_versions_section_stripped() {
        let issue = "Crash on load\n#### Versions\nnumpy 1.19";
        let doc = extract(&composite(issue, "code")).unwrap();
        assert_eq!(doc.issue_body.trim(), "Crash on load");
    }

    #[test]
    fn test_actual_results_supersedes_issue() {
        let issue = "Long narrative about the bug\n### Actual Results\nTraceback (most recent call last):\n  ValueError";
        let doc = extract(&composite(issue, "code")).unwrap();
        assert!(doc.issue_body.starts_with("### Actual Results"));
        assert!(!doc.issue_body.contains("narrative"));
    }

    #[test]
    fn test_extract_is_deterministic() {
        let input = composite("Bug text", "code body");
        assert_eq!(extract(&input).unwrap(), extract(&input).unwrap());
    }
}

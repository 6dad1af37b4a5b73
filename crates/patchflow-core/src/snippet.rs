//! Range-to-snippet mapping.
//!
//! Converts located ranges into literal source text:
//!
//! - line-range mappings are resolved against per-file content isolated
//!   between `[start of <file>]` / `[end of <file>]` anchor markers, using an
//!   explicit line-window function (1-based, inclusive)
//! - already-resolved snippets from the retrieval path pass through untouched
//!
//! Idempotent and pure: identical input always yields byte-identical output.
//! A range that cannot be resolved yields an empty snippet, never an error.

use crate::domain::{LineRange, LocatedRanges, Snippet};

/// Isolate one file's content between its anchor markers, trimmed.
///
/// Returns `None` when either anchor is absent.
pub fn isolate_file<'a>(code_body: &'a str, file: &str) -> Option<&'a str> {
    let start_marker = format!("[start of {file}]");
    let end_marker = format!("[end of {file}]");

    let start = code_body.find(&start_marker)? + start_marker.len();
    let rel_end = code_body[start..].find(&end_marker)?;
    Some(code_body[start..start + rel_end].trim_matches('\n'))
}

/// The literal text of a 1-based inclusive line window.
///
/// Returns `None` when the window does not fully exist — a zero start or an
/// end past the last line. Partial windows are treated as "not found" rather
/// than clamped, so a too-short file yields an empty snippet downstream.
pub fn line_window(content: &str, range: LineRange) -> Option<String> {
    if range.start == 0 {
        return None;
    }
    let lines: Vec<&str> = content.lines().collect();
    if range.end as usize > lines.len() {
        return None;
    }
    Some(lines[range.start as usize - 1..range.end as usize].join("\n"))
}

/// Resolve located ranges into snippets, in deterministic order.
///
/// For line mappings, files are visited in key order and ranges in sequence;
/// every range yields exactly one snippet, empty when unresolvable.
pub fn map_ranges(located: &LocatedRanges, code_body: &str) -> Vec<Snippet> {
    match located {
        LocatedRanges::Resolved { snippets } => snippets.clone(),
        LocatedRanges::Lines { files } => {
            let mut out = Vec::new();
            for (file, ranges) in files {
                let content = isolate_file(code_body, file);
                for &range in ranges {
                    let text = content
                        .and_then(|c| line_window(c, range))
                        .unwrap_or_default();
                    out.push(Snippet {
                        file: file.clone(),
                        range,
                        text,
                    });
                }
            }
            out
        }
    }
}

/// Assemble the final code excerpt handed to generation.
///
/// Snippets for the same file are concatenated in range order under a single
/// `--- <file>` marker line.
pub fn assemble_excerpt(snippets: &[Snippet]) -> String {
    let mut blocks: Vec<String> = Vec::new();
    let mut current_file: Option<&str> = None;

    for snippet in snippets {
        if current_file != Some(snippet.file.as_str()) {
            blocks.push(format!("--- {}", snippet.file));
            current_file = Some(snippet.file.as_str());
        }
        blocks.push(snippet.text.clone());
    }
    blocks.join("\n")
}

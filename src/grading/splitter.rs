//! Submission splitting
//!
//! A submission is one blob of SQL with a `# number N` comment line before
//! each question's query. The marker is what delimits questions; the integer
//! in it is decoration and does not affect numbering.

use regex::Regex;
use std::sync::OnceLock;

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)#\s*number\s*\d+").unwrap())
}

/// Split a raw submission into per-question query texts.
///
/// Text before the first marker is discarded. Segments are trimmed and
/// empty ones dropped, so two adjacent markers do not produce a phantom
/// question. Question numbers are assigned by position in the returned
/// list, starting at 1.
pub fn split_submission(submission: &str) -> Vec<String> {
    let re = marker_regex();
    let Some(first) = re.find(submission) else {
        return Vec::new();
    };

    re.split(&submission[first.start()..])
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(String::from)
        .collect()
}

//! Strict-containment text query

use super::geometry::{PageRect, TextRun};

/// Runs lying fully inside `rect`, in their original page order.
///
/// Partial overlap does not count; a run touching the rectangle's edge
/// does.
pub fn contained_runs<'a>(
    rect: &'a PageRect,
    runs: &'a [TextRun],
) -> impl Iterator<Item = &'a TextRun> + 'a {
    runs.iter().filter(move |run| rect.contains(run))
}

/// Text of every run fully inside `rect`, joined by single spaces in page
/// order and trimmed. Returns an empty string when nothing is enclosed,
/// which is a valid answer rather than a failure.
#[must_use]
pub fn find_contained_text(rect: &PageRect, runs: &[TextRun]) -> String {
    let parts: Vec<&str> = contained_runs(rect, runs)
        .map(|run| run.text.as_str())
        .filter(|text| !text.trim().is_empty())
        .collect();
    parts.join(" ").trim().to_string()
}

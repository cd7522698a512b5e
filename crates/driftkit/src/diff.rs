//! Text normalization and diff payloads

use similar::TextDiff;

/// Normalize declaration text for comparison.
///
/// Line endings are unified, every line is trimmed, runs of whitespace inside
/// a line collapse to one space and blank lines are dropped. Re-export and
/// re-compilation reformat freely, so only differences that survive this are
/// treated as drift. Normalizing twice is a no-op.
pub fn normalize(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Whether two declaration texts are equal after normalization.
pub fn equivalent(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

/// Unified diff from the baseline text to the live text, on normalized lines.
pub fn unified_diff(baseline: &str, live: &str, baseline_label: &str, live_label: &str) -> String {
    let old = normalize(baseline) + "\n";
    let new = normalize(live) + "\n";
    TextDiff::from_lines(&old, &new)
        .unified_diff()
        .context_radius(2)
        .header(baseline_label, live_label)
        .to_string()
}

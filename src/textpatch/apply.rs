// Hunk placement.
//
// Hunks apply in order. Each is tried at its header position shifted by the
// drift of the hunks before it, then at increasing distance in both
// directions, never overlapping the previous hunk. Failing that, up to
// `max_fuzz` leading and trailing context lines are dropped and the search
// repeats. Context lines keep the target's own text; only removals and
// additions come from the patch.

use std::fmt::Write as _;

use super::model::{FilePatch, Hunk, HunkLine};
use super::split_lines;

/// How strictly hunk lines must match the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOptions {
    /// Context lines that may be ignored at each end of a hunk.
    pub max_fuzz: usize,
    /// Furthest a hunk may move from its expected line; `None` searches the
    /// whole file.
    pub max_offset: Option<usize>,
    /// Treat runs of spaces and tabs as one space.
    pub ignore_whitespace: bool,
    /// Skip access modifiers and treat decompiler `label*` tokens as equal.
    pub ignore_access: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            max_fuzz: 0,
            max_offset: None,
            ignore_whitespace: true,
            ignore_access: true,
        }
    }
}

impl MatchOptions {
    /// Byte-exact matching with no fuzz.
    pub fn strict() -> Self {
        Self {
            max_fuzz: 0,
            max_offset: None,
            ignore_whitespace: false,
            ignore_access: false,
        }
    }

    pub(crate) fn lines_match(&self, target: &str, hunk: &str) -> bool {
        if target == hunk {
            return true;
        }
        match (self.ignore_whitespace, self.ignore_access) {
            (false, false) => false,
            (true, false) => collapse(target) == collapse(hunk),
            (ws, true) => {
                if ws {
                    access_similar(&collapse(target), &collapse(hunk))
                } else {
                    access_similar(target, hunk)
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HunkStatus {
    Exact,
    /// Applied this many lines away from its header position.
    Offset(isize),
    Fuzzed { fuzz: usize, offset: isize },
    Failed,
}

impl HunkStatus {
    pub fn is_success(&self) -> bool {
        !matches!(self, HunkStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HunkReport {
    /// 1-based position of the hunk in its patch.
    pub index: usize,
    pub status: HunkStatus,
    /// 1-based line in the result where the hunk landed, if it applied.
    pub line: Option<usize>,
}

/// Outcome of applying one file patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub target: String,
    pub hunks: Vec<HunkReport>,
}

impl FileReport {
    pub fn failed(&self) -> usize {
        self.hunks.iter().filter(|h| !h.status.is_success()).count()
    }

    pub fn fuzzed(&self) -> usize {
        self.hunks
            .iter()
            .filter(|h| matches!(h.status, HunkStatus::Fuzzed { .. }))
            .count()
    }

    pub fn is_clean(&self) -> bool {
        self.failed() == 0
    }

    /// Reject text for the failed hunks, or `None` when every hunk applied.
    pub fn reject_text(&self, patch: &FilePatch) -> Option<String> {
        let mut out = String::new();
        for report in self.hunks.iter().filter(|h| !h.status.is_success()) {
            let Some(hunk) = patch.hunks.get(report.index - 1) else {
                continue;
            };
            out.push_str(&reject_block(report.index, hunk));
        }
        (!out.is_empty()).then_some(out)
    }
}

fn reject_block(index: usize, hunk: &Hunk) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "++++ REJECTED PATCH {index}");
    let body: Vec<String> = hunk.lines.iter().map(HunkLine::render).collect();
    out.push_str(&body.join("\n"));
    out.push_str("\n++++ END PATCH\n");
    out
}

/// Apply `patch` to `source`. Failed hunks leave their region untouched.
///
/// The result uses `\n` line endings. It ends with a newline when `source`
/// did, or when `source` was empty and the patch added lines.
pub fn apply_file_patch(
    target: &str,
    source: &str,
    patch: &FilePatch,
    options: &MatchOptions,
) -> (String, FileReport) {
    let (lines, trailing_newline) = split_lines(source);
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut cursor = 0usize;
    let mut drift = 0isize;
    let mut reports = Vec::with_capacity(patch.hunks.len());

    for (i, hunk) in patch.hunks.iter().enumerate() {
        let index = i + 1;
        let Some(placement) = place(hunk, &lines, cursor, drift, options) else {
            log::debug!("{target}: hunk {index} failed");
            reports.push(HunkReport {
                index,
                status: HunkStatus::Failed,
                line: None,
            });
            continue;
        };

        out.extend(lines[cursor..placement.at].iter().cloned());
        let line = out.len() + 1;
        let mut pos = placement.at;
        let body = &hunk.lines[placement.lead..hunk.lines.len() - placement.trail];
        for hl in body {
            match hl {
                HunkLine::Context(_) => {
                    out.push(lines[pos].clone());
                    pos += 1;
                }
                HunkLine::Remove(_) => pos += 1,
                HunkLine::Add(text) => out.push(text.clone()),
            }
        }
        cursor = pos;
        drift = placement.offset;

        let status = match (placement.fuzz, placement.offset) {
            (0, 0) => HunkStatus::Exact,
            (0, offset) => HunkStatus::Offset(offset),
            (fuzz, offset) => HunkStatus::Fuzzed { fuzz, offset },
        };
        if placement.fuzz > 0 {
            log::debug!("{target}: hunk {index} fuzzed {}", placement.fuzz);
        }
        reports.push(HunkReport {
            index,
            status,
            line: Some(line),
        });
    }
    out.extend(lines[cursor..].iter().cloned());

    let mut text = out.join("\n");
    if !out.is_empty() && (trailing_newline || lines.is_empty()) {
        text.push('\n');
    }
    (
        text,
        FileReport {
            target: target.to_owned(),
            hunks: reports,
        },
    )
}

struct Placement {
    /// Index into the target lines where the matched region starts.
    at: usize,
    /// Context lines dropped from each end.
    lead: usize,
    trail: usize,
    fuzz: usize,
    /// Distance from the header position.
    offset: isize,
}

fn place(
    hunk: &Hunk,
    lines: &[String],
    cursor: usize,
    drift: isize,
    options: &MatchOptions,
) -> Option<Placement> {
    let old = hunk.old_lines();
    // Header start is the line before the hunk when it has no old lines.
    let header_at = if hunk.old_count == 0 {
        hunk.old_start
    } else {
        hunk.old_start.saturating_sub(1)
    };
    let leading = hunk.leading_context();
    let trailing = hunk.trailing_context();

    for fuzz in 0..=options.max_fuzz {
        let lead = fuzz.min(leading);
        let trail = fuzz.min(trailing);
        if fuzz > 0 && lead + trail == 0 {
            break;
        }
        if lead + trail > old.len() {
            break;
        }
        let pattern = &old[lead..old.len() - trail];
        let base = header_at.saturating_add(lead).min(isize::MAX as usize / 2) as isize;
        let expected = base + drift;

        if let Some(at) = search(pattern, lines, expected, cursor, options) {
            return Some(Placement {
                at,
                lead,
                trail,
                fuzz,
                offset: at as isize - base,
            });
        }
        if fuzz >= leading.max(trailing) {
            break;
        }
    }
    None
}

/// Nearest position to `expected`, at or after `floor`, where `pattern`
/// matches.
fn search(
    pattern: &[&str],
    lines: &[String],
    expected: isize,
    floor: usize,
    options: &MatchOptions,
) -> Option<usize> {
    let fits = |at: isize| -> Option<usize> {
        if at < floor as isize {
            return None;
        }
        let at = at as usize;
        let end = at.checked_add(pattern.len())?;
        if end > lines.len() {
            return None;
        }
        pattern
            .iter()
            .zip(&lines[at..end])
            .all(|(p, l)| options.lines_match(l, p))
            .then_some(at)
    };

    let limit = options.max_offset.unwrap_or(lines.len() + 1);
    if let Some(at) = fits(expected) {
        return Some(at);
    }
    for distance in 1..=limit as isize {
        let before = expected - distance;
        let after = expected + distance;
        if let Some(at) = fits(after) {
            return Some(at);
        }
        if let Some(at) = fits(before) {
            return Some(at);
        }
        if before < floor as isize && after as usize > lines.len() {
            break;
        }
    }
    None
}

fn collapse(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_run = false;
    for c in line.chars() {
        if c == ' ' || c == '\t' {
            if !in_run {
                out.push(' ');
            }
            in_run = true;
        } else {
            out.push(c);
            in_run = false;
        }
    }
    out
}

fn access_similar(target: &str, hunk: &str) -> bool {
    let t = tokens(target);
    let h = tokens(hunk);
    let (mut ti, mut hi) = (0, 0);
    while ti < t.len() && hi < h.len() {
        let t_access = is_access(t[ti]);
        let h_access = is_access(h[hi]);
        if t_access || h_access {
            ti += usize::from(t_access);
            hi += usize::from(h_access);
            continue;
        }
        let labels = t[ti].starts_with("label") && h[hi].starts_with("label");
        if !labels && t[ti] != h[hi] {
            return false;
        }
        ti += 1;
        hi += 1;
    }
    ti == t.len() && hi == h.len()
}

/// Space separated tokens with trailing empty tokens dropped.
fn tokens(line: &str) -> Vec<&str> {
    let mut parts: Vec<&str> = line.split(' ').collect();
    while parts.last().is_some_and(|p| p.is_empty()) {
        parts.pop();
    }
    parts
}

fn is_access(token: &str) -> bool {
    ["public", "private", "protected", "final"]
        .iter()
        .any(|a| token.eq_ignore_ascii_case(a))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::textpatch::diff_texts;

    fn numbered(n: usize) -> String {
        (1..=n).map(|i| format!("line {i}\n")).collect()
    }

    fn patch(old: &str, new: &str) -> FilePatch {
        diff_texts("a/f", "b/f", old, new, 3).unwrap()
    }

    #[test]
    fn exact_application() {
        let old = numbered(10);
        let new = old.replace("line 5\n", "five\n");
        let (out, report) = apply_file_patch("f", &old, &patch(&old, &new), &MatchOptions::strict());
        assert_eq!(out, new);
        assert_eq!(report.hunks[0].status, HunkStatus::Exact);
        assert!(report.is_clean());
    }

    #[test]
    fn offset_when_lines_were_inserted_above() {
        let old = numbered(20);
        let new = old.replace("line 15\n", "fifteen\n");
        let p = patch(&old, &new);
        let shifted = format!("extra 1\nextra 2\n{old}");
        let (out, report) = apply_file_patch("f", &shifted, &p, &MatchOptions::strict());
        assert_eq!(out, format!("extra 1\nextra 2\n{new}"));
        assert_eq!(report.hunks[0].status, HunkStatus::Offset(2));
    }

    #[test]
    fn later_hunks_follow_earlier_drift() {
        let old = numbered(40);
        let new = old.replace("line 5\n", "five\n").replace("line 30\n", "thirty\n");
        let p = patch(&old, &new);
        assert_eq!(p.hunks.len(), 2);
        let shifted = format!("x\n{old}");
        let (_, report) = apply_file_patch("f", &shifted, &p, &MatchOptions::strict());
        assert_eq!(report.hunks[0].status, HunkStatus::Offset(1));
        assert_eq!(report.hunks[1].status, HunkStatus::Offset(1));
    }

    #[test]
    fn fuzz_ignores_changed_context() {
        let old = numbered(10);
        let new = old.replace("line 5\n", "five\n");
        let p = patch(&old, &new);
        let drifted = old.replace("line 2\n", "line two\n");

        let (_, strict) = apply_file_patch("f", &drifted, &p, &MatchOptions::strict());
        assert_eq!(strict.hunks[0].status, HunkStatus::Failed);

        let fuzzy = MatchOptions {
            max_fuzz: 2,
            ..MatchOptions::strict()
        };
        let (out, report) = apply_file_patch("f", &drifted, &p, &fuzzy);
        assert_eq!(out, drifted.replace("line 5\n", "five\n"));
        assert_eq!(report.hunks[0].status, HunkStatus::Fuzzed { fuzz: 1, offset: 0 });
        assert_eq!(report.fuzzed(), 1);
    }

    #[test]
    fn failed_hunk_leaves_text_and_builds_reject() {
        let old = "a\nb\nc\n";
        let p = patch(old, "a\nB\nc\n");
        let (out, report) = apply_file_patch("f", "x\ny\nz\n", &p, &MatchOptions::strict());
        assert_eq!(out, "x\ny\nz\n");
        assert_eq!(report.failed(), 1);
        assert_eq!(
            report.reject_text(&p).unwrap(),
            "++++ REJECTED PATCH 1\n a\n-b\n+B\n c\n++++ END PATCH\n"
        );
    }

    #[test]
    fn canonical_matching_keeps_target_context() {
        let p = FilePatch::parse(
            "--- a/f\n+++ b/f\n@@ -1,3 +1,3 @@\n public class Foo {\n-    int x;\n+    long x;\n     label12: for (;;) {}\n",
            "f.patch",
        )
        .unwrap();
        let source = "class  Foo {\n\tprivate int x;\n    label7: for (;;) {}\n";
        let (out, _) = apply_file_patch("f", source, &p, &MatchOptions::strict());
        assert_eq!(out, source);

        let (out, report) = apply_file_patch("f", source, &p, &MatchOptions::default());
        assert!(report.is_clean());
        assert_eq!(out, "class  Foo {\n    long x;\n    label7: for (;;) {}\n");
    }

    #[test]
    fn access_comparison_rules() {
        assert!(access_similar("public static void f()", "static void f()"));
        assert!(access_similar("final int x", "private int x"));
        assert!(access_similar("label3:", "label9:"));
        assert!(!access_similar("int x", "int x y"));
        assert!(!access_similar("int x", "long x"));
        assert_eq!(collapse("a \t  b\tc"), "a b c");
    }

    #[test]
    fn empty_source_gains_trailing_newline() {
        let p = patch("", "one\ntwo\n");
        let (out, report) = apply_file_patch("f", "", &p, &MatchOptions::strict());
        assert_eq!(out, "one\ntwo\n");
        assert!(report.is_clean());
    }

    #[test]
    fn missing_final_newline_is_preserved() {
        let p = patch("a\nb\n", "a\nc\n");
        let (out, _) = apply_file_patch("f", "a\nb", &p, &MatchOptions::strict());
        assert_eq!(out, "a\nc");
    }

    #[test]
    fn max_offset_bounds_the_search() {
        let old = numbered(20);
        let new = old.replace("line 15\n", "fifteen\n");
        let p = patch(&old, &new);
        let shifted = format!("1\n2\n3\n4\n5\n{old}");
        let near = MatchOptions {
            max_offset: Some(2),
            ..MatchOptions::strict()
        };
        let (_, report) = apply_file_patch("f", &shifted, &p, &near);
        assert_eq!(report.failed(), 1);
    }
}

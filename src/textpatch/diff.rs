// Line diff and hunk grouping.
//
// Myers' O(ND) algorithm over lines in its linear-space form: trim the
// common prefix and suffix, split at the middle snake, recurse. Edits are
// grouped into hunks with `context` lines around each change; changes closer
// than 2 * context share a hunk.

use super::model::{FilePatch, Hunk, HunkLine};
use super::split_lines;

/// One step of an edit script, indices into the old/new line arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edit {
    Keep { old: usize, new: usize },
    Delete { old: usize },
    Insert { new: usize },
}

/// Shortest edit script turning `a` into `b`.
pub fn diff_lines<T: PartialEq>(a: &[T], b: &[T]) -> Vec<Edit> {
    let mut edits = Vec::with_capacity(a.len().max(b.len()));
    conquer(a, 0, b, 0, &mut edits);
    edits
}

/// Diff `a` against `b`, whose first lines sit at `a_at` / `b_at` in the
/// full inputs, appending to `out`.
fn conquer<T: PartialEq>(a: &[T], a_at: usize, b: &[T], b_at: usize, out: &mut Vec<Edit>) {
    let prefix = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    out.extend((0..prefix).map(|i| Edit::Keep {
        old: a_at + i,
        new: b_at + i,
    }));
    let (a, b) = (&a[prefix..], &b[prefix..]);
    let (a_at, b_at) = (a_at + prefix, b_at + prefix);

    let suffix = a
        .iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    let (a, b) = (&a[..a.len() - suffix], &b[..b.len() - suffix]);

    if a.is_empty() || b.is_empty() {
        out.extend((0..a.len()).map(|i| Edit::Delete { old: a_at + i }));
        out.extend((0..b.len()).map(|j| Edit::Insert { new: b_at + j }));
    } else if let Some((x, y)) = middle_snake(a, b) {
        conquer(&a[..x], a_at, &b[..y], b_at, out);
        conquer(&a[x..], a_at + x, &b[y..], b_at + y, out);
    } else {
        out.extend((0..a.len()).map(|i| Edit::Delete { old: a_at + i }));
        out.extend((0..b.len()).map(|j| Edit::Insert { new: b_at + j }));
    }

    out.extend((0..suffix).map(|i| Edit::Keep {
        old: a_at + a.len() + i,
        new: b_at + b.len() + i,
    }));
}

/// Split point of an optimal path through `a` x `b`, found by running
/// Myers' greedy search from both corners until the paths overlap.
///
/// Only two diagonal vectors are kept, so memory is linear in the input.
/// Inputs must share no common prefix or suffix, which makes the split
/// point strictly inside the grid.
fn middle_snake<T: PartialEq>(a: &[T], b: &[T]) -> Option<(usize, usize)> {
    let (n, m) = (a.len() as isize, b.len() as isize);
    let delta = n - m;
    let odd = delta & 1 == 1;
    let d_max = (n + m + 1) / 2;
    let offset = d_max + 1;
    let mut vf = vec![0isize; (2 * offset + 1) as usize];
    let mut vb = vec![0isize; (2 * offset + 1) as usize];

    for d in 0..=d_max {
        let mut k = -d;
        while k <= d {
            let i = (k + offset) as usize;
            let mut x = if k == -d || (k != d && vf[i - 1] < vf[i + 1]) {
                vf[i + 1]
            } else {
                vf[i - 1] + 1
            };
            let mut y = x - k;
            let (x0, y0) = (x, y);
            while x < n && y < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            vf[i] = x;
            let kb = delta - k;
            let inside = x0 <= n && y0 <= m;
            if odd && inside && kb.abs() < d && x + vb[(kb + offset) as usize] >= n {
                return Some((x0 as usize, y0 as usize));
            }
            k += 2;
        }

        // Same search over the reversed inputs.
        let mut k = -d;
        while k <= d {
            let i = (k + offset) as usize;
            let mut x = if k == -d || (k != d && vb[i - 1] < vb[i + 1]) {
                vb[i + 1]
            } else {
                vb[i - 1] + 1
            };
            let mut y = x - k;
            while x < n && y < m && a[(n - 1 - x) as usize] == b[(m - 1 - y) as usize] {
                x += 1;
                y += 1;
            }
            vb[i] = x;
            let kf = delta - k;
            let inside = x <= n && y <= m;
            if !odd && inside && kf.abs() <= d && x + vf[(kf + offset) as usize] >= n {
                return Some(((n - x) as usize, (m - y) as usize));
            }
            k += 2;
        }
    }
    None
}

/// Group an edit script into unified diff hunks.
pub fn make_hunks(old: &[String], new: &[String], edits: &[Edit], context: usize) -> Vec<Hunk> {
    // Old/new line positions before each edit.
    let mut positions = Vec::with_capacity(edits.len() + 1);
    let (mut o, mut n) = (0usize, 0usize);
    for e in edits {
        positions.push((o, n));
        match e {
            Edit::Keep { .. } => {
                o += 1;
                n += 1;
            }
            Edit::Delete { .. } => o += 1,
            Edit::Insert { .. } => n += 1,
        }
    }
    positions.push((o, n));

    let changes: Vec<usize> = edits
        .iter()
        .enumerate()
        .filter(|(_, e)| !matches!(e, Edit::Keep { .. }))
        .map(|(i, _)| i)
        .collect();

    let mut hunks = Vec::new();
    let mut i = 0;
    while i < changes.len() {
        let first = changes[i];
        let mut last = first;
        let mut j = i + 1;
        while j < changes.len() && changes[j] - last - 1 <= 2 * context {
            last = changes[j];
            j += 1;
        }
        let start = first.saturating_sub(context);
        let end = (last + 1 + context).min(edits.len());

        let lines: Vec<HunkLine> = edits[start..end]
            .iter()
            .map(|e| match *e {
                Edit::Keep { old: oi, .. } => HunkLine::Context(old[oi].clone()),
                Edit::Delete { old: oi } => HunkLine::Remove(old[oi].clone()),
                Edit::Insert { new: ni } => HunkLine::Add(new[ni].clone()),
            })
            .collect();
        let (o0, n0) = positions[start];
        let (o1, n1) = positions[end];
        let (old_count, new_count) = (o1 - o0, n1 - n0);
        hunks.push(Hunk {
            old_start: if old_count == 0 { o0 } else { o0 + 1 },
            old_count,
            new_start: if new_count == 0 { n0 } else { n0 + 1 },
            new_count,
            lines,
        });
        i = j;
    }
    hunks
}

/// Diff two texts. `None` when they have the same lines.
///
/// Line endings are normalised first, and a missing final newline is not a
/// difference.
pub fn diff_texts(
    old_label: &str,
    new_label: &str,
    old: &str,
    new: &str,
    context: usize,
) -> Option<FilePatch> {
    let (old_lines, _) = split_lines(old);
    let (new_lines, _) = split_lines(new);
    let edits = diff_lines(&old_lines, &new_lines);
    let hunks = make_hunks(&old_lines, &new_lines, &edits, context);
    if hunks.is_empty() {
        return None;
    }
    Some(FilePatch {
        old_label: old_label.to_owned(),
        new_label: new_label.to_owned(),
        hunks,
    })
}

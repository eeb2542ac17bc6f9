// Unified diff model.
//
//   --- <old label>
//   +++ <new label>
//   @@ -<old start>,<old count> +<new start>,<new count> @@
//    context
//   -removed
//   +added
//
// Counts are always written. "\ No newline at end of file" markers are
// dropped when parsing and never rendered.

use std::fmt::Write as _;

use super::TextPatchError;

/// One line of a hunk body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HunkLine {
    Context(String),
    Remove(String),
    Add(String),
}

impl HunkLine {
    pub fn text(&self) -> &str {
        match self {
            HunkLine::Context(s) | HunkLine::Remove(s) | HunkLine::Add(s) => s,
        }
    }

    fn prefix(&self) -> char {
        match self {
            HunkLine::Context(_) => ' ',
            HunkLine::Remove(_) => '-',
            HunkLine::Add(_) => '+',
        }
    }

    /// The line as it appears in patch text.
    pub fn render(&self) -> String {
        format!("{}{}", self.prefix(), self.text())
    }
}

/// A contiguous group of changes with surrounding context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    /// 1-based; the line before the hunk when `old_count` is 0.
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    pub lines: Vec<HunkLine>,
}

impl Hunk {
    /// Lines the hunk expects in the original (context and removals).
    pub fn old_lines(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|l| !matches!(l, HunkLine::Add(_)))
            .map(HunkLine::text)
            .collect()
    }

    /// Lines the hunk produces (context and additions).
    pub fn new_lines(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|l| !matches!(l, HunkLine::Remove(_)))
            .map(HunkLine::text)
            .collect()
    }

    /// Number of leading context lines.
    pub fn leading_context(&self) -> usize {
        self.lines
            .iter()
            .take_while(|l| matches!(l, HunkLine::Context(_)))
            .count()
    }

    /// Number of trailing context lines.
    pub fn trailing_context(&self) -> usize {
        self.lines
            .iter()
            .rev()
            .take_while(|l| matches!(l, HunkLine::Context(_)))
            .count()
    }

    pub fn header(&self) -> String {
        format!(
            "@@ -{},{} +{},{} @@",
            self.old_start, self.old_count, self.new_start, self.new_count
        )
    }
}

/// All hunks for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePatch {
    pub old_label: String,
    pub new_label: String,
    pub hunks: Vec<Hunk>,
}

impl FilePatch {
    /// Render as unified diff text with `\n` line endings.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "--- {}", self.old_label);
        let _ = writeln!(out, "+++ {}", self.new_label);
        for hunk in &self.hunks {
            out.push_str(&hunk.header());
            out.push('\n');
            for line in &hunk.lines {
                out.push(line.prefix());
                out.push_str(line.text());
                out.push('\n');
            }
        }
        out
    }

    /// Parse every file patch in `text`. `name` labels errors.
    ///
    /// Text before the first `---` header (e.g. `diff` or `Index:` lines) is
    /// skipped.
    pub fn parse_all(text: &str, name: &str) -> Result<Vec<FilePatch>, TextPatchError> {
        Parser::new(text, name).parse()
    }

    /// Parse text holding exactly one file patch.
    pub fn parse(text: &str, name: &str) -> Result<FilePatch, TextPatchError> {
        let mut all = Self::parse_all(text, name)?;
        match all.len() {
            1 => Ok(all.remove(0)),
            n => Err(TextPatchError::Parse {
                patch: name.to_owned(),
                line: 1,
                message: format!("expected one file patch, found {n}"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser<'a> {
    lines: Vec<&'a str>,
    pos: usize,
    name: &'a str,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str, name: &'a str) -> Self {
        let lines = text
            .split('\n')
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
            .collect();
        Self {
            lines,
            pos: 0,
            name,
        }
    }

    fn error(&self, message: impl Into<String>) -> TextPatchError {
        TextPatchError::Parse {
            patch: self.name.to_owned(),
            line: self.pos + 1,
            message: message.into(),
        }
    }

    fn parse(mut self) -> Result<Vec<FilePatch>, TextPatchError> {
        let mut patches = Vec::new();
        while self.pos < self.lines.len() {
            let line = self.lines[self.pos];
            if let Some(old) = line.strip_prefix("--- ") {
                let old_label = label(old);
                self.pos += 1;
                let new_label = match self.lines.get(self.pos).and_then(|l| l.strip_prefix("+++ ")) {
                    Some(new) => label(new),
                    None => return Err(self.error("expected +++ header after ---")),
                };
                self.pos += 1;
                let mut hunks = Vec::new();
                while self
                    .lines
                    .get(self.pos)
                    .is_some_and(|l| l.starts_with("@@"))
                {
                    hunks.push(self.parse_hunk()?);
                }
                patches.push(FilePatch {
                    old_label,
                    new_label,
                    hunks,
                });
            } else {
                self.pos += 1;
            }
        }
        Ok(patches)
    }

    fn parse_hunk(&mut self) -> Result<Hunk, TextPatchError> {
        let header = self.lines[self.pos];
        let (old_start, old_count, new_start, new_count) =
            parse_range_header(header).ok_or_else(|| self.error(format!("bad hunk header {header:?}")))?;
        self.pos += 1;

        let mut lines = Vec::new();
        let (mut old_seen, mut new_seen) = (0usize, 0usize);
        while old_seen < old_count || new_seen < new_count {
            let Some(&line) = self.lines.get(self.pos) else {
                return Err(self.error("hunk ends early"));
            };
            self.pos += 1;
            let body = || line.get(1..).unwrap_or("").to_owned();
            match line.chars().next() {
                Some(' ') => {
                    lines.push(HunkLine::Context(body()));
                    old_seen += 1;
                    new_seen += 1;
                }
                // Some tools strip the single space from empty context lines.
                None => {
                    lines.push(HunkLine::Context(String::new()));
                    old_seen += 1;
                    new_seen += 1;
                }
                Some('-') => {
                    lines.push(HunkLine::Remove(body()));
                    old_seen += 1;
                }
                Some('+') => {
                    lines.push(HunkLine::Add(body()));
                    new_seen += 1;
                }
                Some('\\') => {}
                Some(_) => {
                    self.pos -= 1;
                    return Err(self.error(format!("unexpected line in hunk: {line:?}")));
                }
            }
        }
        if old_seen != old_count || new_seen != new_count {
            return Err(self.error("hunk line counts do not match its header"));
        }
        // A marker may follow the last line of the hunk.
        while self.lines.get(self.pos).is_some_and(|l| l.starts_with('\\')) {
            self.pos += 1;
        }
        Ok(Hunk {
            old_start,
            old_count,
            new_start,
            new_count,
            lines,
        })
    }
}

/// Header label up to the first tab (timestamps follow a tab).
fn label(raw: &str) -> String {
    raw.split('\t').next().unwrap_or(raw).trim_end().to_owned()
}

/// `@@ -a[,b] +c[,d] @@ ...` -> (a, b, c, d); omitted counts are 1.
fn parse_range_header(header: &str) -> Option<(usize, usize, usize, usize)> {
    let rest = header.strip_prefix("@@ -")?;
    let (ranges, _) = rest.split_once(" @@")?;
    let (old, new) = ranges.split_once(" +")?;
    let range = |s: &str| -> Option<(usize, usize)> {
        match s.split_once(',') {
            Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
            None => Some((s.parse().ok()?, 1)),
        }
    };
    let (a, b) = range(old)?;
    let (c, d) = range(new)?;
    Some((a, b, c, d))
}

//! Text matching shared by the provider adapters.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ansi;
use crate::domain::{Activity, AdapterError, AdapterErrorKind, PromptInfo, PromptOption};

/// Longest escape sequence held back waiting for its terminator.
const MAX_CARRY: usize = 512;

/// Numbered menu entry, optionally preceded by a selection cursor.
static OPTION_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[❯>›]\s*)?(\d{1,2})[.)]\s+(.+?)$").expect("valid option regex")
});

/// Rolling window of recent plain text.
///
/// Escape sequences split across chunks are carried over, so a spinner line
/// that arrives as `"\x1b[3"` + `"8;5;1m✻ Working… (esc to interrupt)"` is
/// still seen as one piece of text.
#[derive(Debug)]
pub(crate) struct DetectionWindow {
    carry: String,
    text: String,
    limit: usize,
}

impl DetectionWindow {
    pub fn new(limit: usize) -> Self {
        Self {
            carry: String::new(),
            text: String::new(),
            limit,
        }
    }

    /// Feed a raw chunk and return the current window as plain text.
    pub fn push(&mut self, chunk: &str) -> &str {
        let mut combined = std::mem::take(&mut self.carry);
        combined.push_str(chunk);

        if let Some(idx) = ansi::incomplete_escape_start(&combined) {
            if combined.len() - idx <= MAX_CARRY {
                self.carry = combined.split_off(idx);
            }
        }

        self.text.push_str(&ansi::strip(&combined));

        if self.text.len() > self.limit {
            let mut cut = self.text.len() - self.limit;
            while !self.text.is_char_boundary(cut) {
                cut += 1;
            }
            self.text.drain(..cut);
        }

        &self.text
    }

    /// Forget everything up to `end`, so a pattern is never matched twice.
    pub fn consume_through(&mut self, end: usize) {
        let end = end.min(self.text.len());
        self.text.drain(..end);
    }
}

/// Output patterns that tell an adapter whether the CLI is busy or idle.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ActivityPatterns {
    /// Shown only while the CLI works (spinners, "esc to interrupt")
    pub working: &'static [&'static str],
    /// Shown when the CLI waits for input
    pub attention: &'static [&'static str],
}

/// Stateful activity detector built on a [`DetectionWindow`].
#[derive(Debug)]
pub(crate) struct ActivityDetector {
    window: DetectionWindow,
    patterns: ActivityPatterns,
}

impl ActivityDetector {
    pub fn new(patterns: ActivityPatterns) -> Self {
        Self {
            window: DetectionWindow::new(2048),
            patterns,
        }
    }

    /// Returns the newest signal in the window, or `None` if it equals `current`.
    ///
    /// When both kinds of pattern are present the one printed last wins.
    pub fn detect(&mut self, chunk: &str, current: Activity) -> Option<Activity> {
        // ASCII lowercasing keeps byte offsets intact
        let text = self.window.push(chunk).to_ascii_lowercase();
        let working = find_last(&text, self.patterns.working);
        let attention = find_last(&text, self.patterns.attention);

        let (activity, end) = match (working, attention) {
            (Some(w), Some(a)) if w.0 > a.0 => (Activity::Working, w.1),
            (_, Some(a)) => (Activity::Attention, a.1),
            (Some(w), None) => (Activity::Working, w.1),
            (None, None) => return None,
        };

        self.window.consume_through(end);
        (activity != current).then_some(activity)
    }
}

/// Start and end byte offsets of the rightmost occurrence of any pattern.
fn find_last(text: &str, patterns: &[&str]) -> Option<(usize, usize)> {
    patterns
        .iter()
        .filter_map(|p| text.rfind(p).map(|start| (start, start + p.len())))
        .max_by_key(|(start, _)| *start)
}

/// Error detector. A message split across reads is matched once complete.
#[derive(Debug)]
pub(crate) struct ErrorDetector {
    window: DetectionWindow,
    patterns: &'static [(&'static str, AdapterErrorKind)],
}

impl ErrorDetector {
    pub fn new(patterns: &'static [(&'static str, AdapterErrorKind)]) -> Self {
        Self {
            window: DetectionWindow::new(1024),
            patterns,
        }
    }

    pub fn detect(&mut self, chunk: &str) -> Option<AdapterError> {
        let text = self.window.push(chunk);
        let (error, end) = match_error(text, self.patterns)?;
        self.window.consume_through(end);
        Some(error)
    }
}

/// Match plain text line by line against known error patterns.
///
/// Returns the error and the byte offset just past the matching line.
pub(crate) fn match_error(
    text: &str,
    patterns: &[(&str, AdapterErrorKind)],
) -> Option<(AdapterError, usize)> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let end = offset + line.len();
        let lower = line.to_ascii_lowercase();
        if let Some((_, kind)) = patterns.iter().find(|(pattern, _)| lower.contains(*pattern)) {
            return Some((AdapterError::new(*kind, line.trim()), end));
        }
        offset = end;
    }
    None
}

/// Prompt detector. A question split across reads is matched once its line
/// is complete, and every prompt is reported once.
#[derive(Debug)]
pub(crate) struct PromptDetector {
    window: DetectionWindow,
    questions: &'static [&'static str],
}

impl PromptDetector {
    pub fn new(questions: &'static [&'static str]) -> Self {
        Self {
            window: DetectionWindow::new(4096),
            questions,
        }
    }

    pub fn detect(&mut self, chunk: &str) -> Option<PromptInfo> {
        let text = settled(self.window.push(chunk));
        let prompt = match_prompt(text, self.questions)?;
        let end = text.len();
        self.window.consume_through(end);
        Some(prompt)
    }
}

/// `text` without its trailing partial line, unless that line already looks
/// like a finished question (`?`, `]` or `)` at the end).
fn settled(text: &str) -> &str {
    let tail_start = text.rfind('\n').map_or(0, |i| i + 1);
    if text[tail_start..].trim_end().ends_with(['?', ']', ')']) {
        text
    } else {
        &text[..tail_start]
    }
}

/// Detect a confirmation prompt introduced by one of `questions` in plain text.
///
/// A numbered menu following the question becomes a [`PromptKind::Choice`];
/// otherwise the prompt is treated as yes/no.
///
/// [`PromptKind::Choice`]: crate::domain::PromptKind::Choice
pub(crate) fn match_prompt(text: &str, questions: &[&str]) -> Option<PromptInfo> {
    let lines: Vec<&str> = text.lines().map(trim_box).collect();

    let question_idx = lines.iter().position(|line| {
        let lower = line.to_ascii_lowercase();
        questions.iter().any(|q| lower.contains(q))
    })?;
    let message = lines[question_idx].to_string();

    let options: Vec<PromptOption> = lines[question_idx + 1..]
        .iter()
        .filter_map(|line| OPTION_LINE.captures(line))
        .map(|caps| PromptOption::new(caps[2].trim(), &caps[1]))
        .collect();

    if options.is_empty() {
        Some(PromptInfo::yes_no(message))
    } else {
        Some(PromptInfo::choice(message, options))
    }
}

/// Trim whitespace and box-drawing borders around a line.
fn trim_box(line: &str) -> &str {
    line.trim_matches(|c: char| c.is_whitespace() || matches!(c, '│' | '┃' | '║' | '╭' | '╰'))
}

/// Quote a string for a POSIX shell.
///
/// Wraps the string in single quotes and escapes embedded single quotes
/// using the `'\''` technique.
pub(crate) fn shell_escape(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

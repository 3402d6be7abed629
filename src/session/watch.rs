//! Conversation-id extraction from status-query replies.
//!
//! When the user types the provider's status command (e.g. `/status`) and
//! presses Enter, the manager starts watching output for a UUID-shaped token
//! for a bounded time. The first match is reported as the session's
//! conversation id.

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::time::{Duration, Instant};

use crate::ansi;

/// Cap on text accumulated while watching.
const MAX_WATCH_BYTES: usize = 64 * 1024;

/// Cap on the typed-input line kept for command detection.
const MAX_INPUT_CHARS: usize = 256;

static UUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\b")
        .expect("valid uuid regex")
});

/// Tracks what the user is typing to spot a known command followed by Enter.
#[derive(Debug, Default)]
pub struct InputTracker {
    line: String,
}

impl InputTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed written input. Returns `true` if `command` was submitted.
    pub fn feed(&mut self, data: &str, command: &str) -> bool {
        // Arrow keys and other escape sequences are not part of a typed command
        if data.starts_with('\x1b') {
            return false;
        }

        let mut submitted = false;
        for c in data.chars() {
            match c {
                '\r' | '\n' => {
                    if self.line.trim() == command {
                        submitted = true;
                    }
                    self.line.clear();
                }
                // Backspace / DEL
                '\x7f' | '\x08' => {
                    self.line.pop();
                }
                // Ctrl+C / Ctrl+U discard the line
                '\x03' | '\x15' => self.line.clear(),
                c if c.is_control() => {}
                c => {
                    if self.line.chars().count() >= MAX_INPUT_CHARS {
                        self.line.clear();
                    }
                    self.line.push(c);
                }
            }
        }
        submitted
    }
}

/// Active watch for a conversation id in output.
#[derive(Debug)]
pub struct SessionIdWatch {
    deadline: Instant,
    seen: String,
}

impl SessionIdWatch {
    pub fn new(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            seen: String::new(),
        }
    }

    /// Whether the watch ran out of time.
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    /// Feed output and return the first UUID found so far.
    ///
    /// Output is accumulated so a UUID split across chunks still matches.
    pub fn feed(&mut self, chunk: &str) -> Option<String> {
        self.seen.push_str(&ansi::strip(chunk));
        if self.seen.len() > MAX_WATCH_BYTES {
            let mut cut = self.seen.len() - MAX_WATCH_BYTES;
            while !self.seen.is_char_boundary(cut) {
                cut += 1;
            }
            self.seen.drain(..cut);
        }
        UUID.find(&self.seen).map(|m| m.as_str().to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_command_with_enter() {
        let mut tracker = InputTracker::new();
        assert!(!tracker.feed("/sta", "/status"));
        assert!(tracker.feed("tus\r", "/status"));
    }

    #[test]
    fn test_backspace_edits_line() {
        let mut tracker = InputTracker::new();
        assert!(tracker.feed("/statux\x7fs\r", "/status"));
    }

    #[test]
    fn test_other_commands_and_escape_keys_do_not_match() {
        let mut tracker = InputTracker::new();
        assert!(!tracker.feed("/status please\r", "/status"));
        assert!(!tracker.feed("\x1b[A", "/status"));
        assert!(!tracker.feed("\r", "/status"));
    }

    #[test]
    fn test_finds_uuid_split_across_chunks() {
        let mut watch = SessionIdWatch::new(Duration::from_secs(5));
        assert_eq!(watch.feed("Session ID: 3F2504E0-4F89-11D3"), None);
        assert_eq!(
            watch.feed("-9A0C-0305E82C3301\r\n").as_deref(),
            Some("3f2504e0-4f89-11d3-9a0c-0305e82c3301")
        );
    }

    #[test]
    fn test_expiry() {
        let watch = SessionIdWatch::new(Duration::from_secs(5));
        let now = Instant::now();
        assert!(!watch.is_expired(now));
        assert!(watch.is_expired(now + Duration::from_secs(6)));
    }
}

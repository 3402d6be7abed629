//! Output filter for escape sequences that corrupt terminal rendering.
//!
//! Three families are removed before output is stored or forwarded:
//! - OSC 52 clipboard writes
//! - OSC 0/1/2 window and icon title changes
//! - underline SGR parameters (`4`, `4:n`, `21`, `58;...`, `59`)
//!
//! Everything else passes through untouched.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;

use crate::ansi;

/// Longest incomplete sequence carried to the next chunk. Clipboard writes can
/// be large, but anything beyond this is passed through rather than held.
const MAX_CARRY: usize = 64 * 1024;

static OSC_STRIPPED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1b\](?:0|1|2|52);[^\x07\x1b]*(?:\x07|\x1b\\)").expect("valid OSC regex")
});

static SGR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\x1b\[([0-9;:]*)m").expect("valid SGR regex"));

/// Per-session escape filter.
///
/// Holds back an unterminated escape sequence at the end of a chunk so that
/// sequences split across reads are still recognized.
#[derive(Debug, Default)]
pub struct EscapeFilter {
    carry: String,
}

impl EscapeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter one chunk of output.
    pub fn filter(&mut self, chunk: &str) -> String {
        let mut combined = std::mem::take(&mut self.carry);
        combined.push_str(chunk);

        if let Some(idx) = ansi::incomplete_escape_start(&combined) {
            if combined.len() - idx <= MAX_CARRY {
                self.carry = combined.split_off(idx);
            }
        }

        filter_complete(&combined).into_owned()
    }
}

/// Filter text that contains no partial sequences.
pub fn filter_complete(text: &str) -> Cow<'_, str> {
    if !text.contains('\x1b') {
        return Cow::Borrowed(text);
    }

    let without_osc = OSC_STRIPPED.replace_all(text, "");
    let filtered = SGR.replace_all(&without_osc, |caps: &Captures| {
        rewrite_sgr(&caps[1]).unwrap_or_default()
    });
    Cow::Owned(filtered.into_owned())
}

/// Rebuild an SGR sequence without underline parameters.
///
/// Returns `None` when nothing is left, because an empty `ESC[m` would mean
/// "reset everything" rather than "do nothing".
fn rewrite_sgr(body: &str) -> Option<String> {
    if body.is_empty() {
        return Some("\x1b[m".to_string());
    }

    let params: Vec<&str> = body.split(';').collect();
    let mut kept: Vec<&str> = Vec::with_capacity(params.len());
    let mut i = 0;

    while i < params.len() {
        let param = params[i];
        let head = param.split(':').next().unwrap_or_default();
        match head {
            // Extended colors carry their arguments as separate params unless colon-form
            "38" | "48" | "58" => {
                let span = if param.contains(':') {
                    1
                } else {
                    match params.get(i + 1) {
                        Some(&"5") => 3,
                        Some(&"2") => 5,
                        _ => 1,
                    }
                };
                let end = (i + span).min(params.len());
                if head != "58" {
                    kept.extend_from_slice(&params[i..end]);
                }
                i = end;
            }
            "4" | "21" | "59" => i += 1,
            _ => {
                kept.push(param);
                i += 1;
            }
        }
    }

    if kept.is_empty() {
        None
    } else {
        Some(format!("\x1b[{}m", kept.join(";")))
    }
}

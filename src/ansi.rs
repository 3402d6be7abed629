//! Small helpers for ANSI escape sequences.

const ESC: char = '\x1b';
const BEL: char = '\x07';

/// SGR reset. Prepended to replayed output whose beginning was evicted so no
/// dangling style state leaks into the replay.
pub const RESET: &str = "\x1b[0m";

/// Strip ANSI escape codes from a string.
///
/// Handles CSI (`ESC [ ... final`), OSC (`ESC ] ... BEL|ST`) and two-byte escapes.
/// Carriage returns become newlines so redrawn status lines stay separate.
pub fn strip(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == ESC {
            match chars.next() {
                Some('[') => {
                    // Parameters and intermediates, then one final byte in 0x40..=0x7e
                    for next in chars.by_ref() {
                        if ('\x40'..='\x7e').contains(&next) {
                            break;
                        }
                    }
                }
                Some(']') => {
                    while let Some(next) = chars.next() {
                        if next == BEL {
                            break;
                        }
                        if next == ESC {
                            if chars.peek() == Some(&'\\') {
                                chars.next();
                            }
                            break;
                        }
                    }
                }
                _ => {}
            }
        } else if c == '\r' {
            result.push('\n');
        } else if c.is_control() && c != '\n' && c != '\t' {
            // Skip other control characters
        } else {
            result.push(c);
        }
    }

    result
}

/// Byte index where an unterminated escape sequence at the end of `s` begins.
///
/// Returns `None` when `s` ends in plain text or a complete sequence. Callers
/// hold the returned suffix back until the next chunk completes it.
pub fn incomplete_escape_start(s: &str) -> Option<usize> {
    let start = s.rfind(ESC)?;
    let rest = &s[start + ESC.len_utf8()..];
    let mut chars = rest.chars();

    match chars.next() {
        // A lone ESC may be the first half of the ST closing an earlier OSC
        None => Some(open_osc_before(s, start).unwrap_or(start)),
        Some('[') => {
            if chars.any(|c| ('\x40'..='\x7e').contains(&c)) {
                None
            } else {
                Some(start)
            }
        }
        // An ST would have put its ESC after this one, so only BEL closes here
        Some(']') => {
            if chars.any(|c| c == BEL) {
                None
            } else {
                Some(start)
            }
        }
        Some(_) => None,
    }
}

/// Start of an OSC that is still open at byte `end`.
fn open_osc_before(s: &str, end: usize) -> Option<usize> {
    let start = s[..end].rfind(ESC)?;
    let body = s[start + ESC.len_utf8()..end].strip_prefix(']')?;
    (!body.contains(BEL)).then_some(start)
}

//! Log range selection.
//!
//! Backends return timestamped lines and may over-fetch; the exact bounds
//! are applied here so every backend behaves the same:
//!
//! 1. `since` keeps lines with `timestamp >= since`
//! 2. `tail` then keeps the last N of those, in log order

use crate::runtime::LogLine;
use chrono::{DateTime, Utc};

/// Applies the `since` and `tail` bounds to lines in log order.
pub fn select(lines: Vec<LogLine>, tail: Option<usize>, since: Option<DateTime<Utc>>) -> Vec<LogLine> {
    let mut lines: Vec<LogLine> = match since {
        Some(since) => lines.into_iter().filter(|l| l.timestamp >= since).collect(),
        None => lines,
    };

    if let Some(tail) = tail {
        let excess = lines.len().saturating_sub(tail);
        lines.drain(..excess);
    }
    lines
}

/// Renders lines as text, one `\n`-terminated line each.
pub fn render(lines: &[LogLine]) -> String {
    let mut out = String::with_capacity(lines.iter().map(|l| l.text.len() + 1).sum());
    for line in lines {
        out.push_str(&line.text);
        out.push('\n');
    }
    out
}

//! Best-effort extraction of a scoping result from a session transcript.
//!
//! The agent is prompted to answer with an `ACTION PLAN:` block followed by
//! a `CONFIDENCE SCORE: <n>%` line, but nothing enforces that shape. The
//! scan is line-oriented and case-insensitive; only agent-authored messages
//! are considered, and the most recent plan and score each win on their own.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::models::session::ScopingResult;
use crate::models::transcript::{AuthorKind, TranscriptMessage};

const PLAN_MARKER: &str = "ACTION PLAN:";
const CONFIDENCE_MARKERS: [&str; 2] = ["CONFIDENCE SCORE:", "CONFIDENCE:"];

static DIGITS: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)] // literal pattern
    Regex::new(r"\d+").expect("digit pattern compiles")
});

/// Raw extraction outcome; either half may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Trimmed non-blank plan lines joined with `\n`.
    pub plan: Option<String>,
    /// Last confidence parsed from a message carrying the plan marker.
    pub confidence: Option<u8>,
}

impl Extraction {
    /// The complete pair, or `None` if either half is missing.
    #[must_use]
    pub fn into_complete(self) -> Option<ScopingResult> {
        match (self.plan, self.confidence) {
            (Some(plan), Some(confidence)) => Some(ScopingResult { plan, confidence }),
            _ => None,
        }
    }
}

/// Scan a transcript forward, keeping the last plan and the last score found.
///
/// The two halves are tracked independently: a revised plan without a score
/// keeps the earlier score, and a score-only reply updates it.
#[must_use]
pub fn extract(messages: &[TranscriptMessage]) -> Extraction {
    messages
        .iter()
        .filter(|m| m.author == AuthorKind::Agent)
        .map(|m| scan_message(&m.text))
        .fold(Extraction::default(), |acc, found| Extraction {
            plan: found.plan.or(acc.plan),
            confidence: found.confidence.or(acc.confidence),
        })
}

/// Shortcut for callers that only accept a complete result.
#[must_use]
pub fn extract_complete(messages: &[TranscriptMessage]) -> Option<ScopingResult> {
    extract(messages).into_complete()
}

/// Scan one message; only messages carrying the plan marker contribute.
fn scan_message(text: &str) -> Extraction {
    if !text.to_ascii_uppercase().contains(PLAN_MARKER) {
        return Extraction::default();
    }

    let mut in_plan = false;
    let mut plan_lines: Vec<&str> = Vec::new();
    let mut confidence = None;

    for line in text.lines() {
        let upper = line.to_ascii_uppercase();
        if upper.contains(PLAN_MARKER) {
            in_plan = true;
        } else if CONFIDENCE_MARKERS.iter().any(|m| upper.contains(m)) {
            in_plan = false;
            if let Some(value) = parse_confidence(line) {
                confidence = Some(value);
            }
        } else if in_plan {
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                plan_lines.push(trimmed);
            }
        }
    }

    if plan_lines.is_empty() {
        debug!("plan marker present but plan block is empty");
    }

    Extraction {
        plan: (!plan_lines.is_empty()).then(|| plan_lines.join("\n")),
        confidence,
    }
}

/// First digit run after the line's last colon, if it fits `0..=100`.
fn parse_confidence(line: &str) -> Option<u8> {
    let tail = line.rsplit(':').next().unwrap_or(line).trim();
    let value = DIGITS
        .find(tail)
        .and_then(|m| m.as_str().parse::<u8>().ok())
        .filter(|v| *v <= 100);
    if value.is_none() {
        debug!(text = tail, "could not parse confidence score");
    }
    value
}

//! Presence interval model
//!
//! One party may produce many intervals for a single call (reconnects).
//! An interval with no `left_at` means the party is still present; it is
//! resolved against "now" only at computation time, never stored closed
//! while the call is live.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A continuous span during which one party was connected to the call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PresenceInterval {
    #[serde(with = "time::serde::rfc3339")]
    pub joined_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub left_at: Option<OffsetDateTime>,
}

impl PresenceInterval {
    pub fn closed(joined_at: OffsetDateTime, left_at: OffsetDateTime) -> Self {
        Self {
            joined_at,
            left_at: Some(left_at),
        }
    }

    pub fn open(joined_at: OffsetDateTime) -> Self {
        Self {
            joined_at,
            left_at: None,
        }
    }
}

/// A closed, merged span; produced by [`merge_intervals`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

/// Merge one party's raw intervals into non-overlapping spans
///
/// Open intervals are closed at `now`, inverted or degenerate segments are
/// dropped, and touching or overlapping segments are coalesced so reconnect
/// churn never double-counts presence.
pub fn merge_intervals(intervals: &[PresenceInterval], now: OffsetDateTime) -> Vec<Span> {
    let mut spans: Vec<Span> = intervals
        .iter()
        .filter_map(|iv| {
            let end = iv.left_at.unwrap_or(now);
            (end > iv.joined_at).then_some(Span {
                start: iv.joined_at,
                end,
            })
        })
        .collect();

    spans.sort_by_key(|s| s.start);

    let mut merged: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            // Touching counts as continuous: [0,30] + [30,60] → [0,60]
            Some(last) if span.start <= last.end => {
                if span.end > last.end {
                    last.end = span.end;
                }
            }
            _ => merged.push(span),
        }
    }
    merged
}

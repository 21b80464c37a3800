//! Billable overlap calculator
//!
//! Pure function over both parties' presence timelines. Each side is merged
//! first (see [`crate::interval::merge_intervals`]), so spans within one
//! party are non-overlapping by construction and the pairwise intersection
//! sum cannot double-count.

use time::{Duration, OffsetDateTime};

use crate::interval::{merge_intervals, PresenceInterval};

/// Total overlapping presence of both parties, in whole seconds
///
/// Truncated (not rounded) to whole seconds once at the end, then capped at
/// `cap_seconds`; a consultation never bills beyond the duration the payer
/// paid for, even if raw overlap exceeds it. Either side empty → 0.
pub fn overlap_seconds(
    party_a: &[PresenceInterval],
    party_b: &[PresenceInterval],
    cap_seconds: i64,
    now: OffsetDateTime,
) -> i64 {
    if party_a.is_empty() || party_b.is_empty() {
        return 0;
    }

    let merged_a = merge_intervals(party_a, now);
    let merged_b = merge_intervals(party_b, now);

    let mut total = Duration::ZERO;
    for a in &merged_a {
        for b in &merged_b {
            let start = a.start.max(b.start);
            let end = a.end.min(b.end);
            if end > start {
                total += end - start;
            }
        }
    }

    total.whole_seconds().clamp(0, cap_seconds.max(0))
}

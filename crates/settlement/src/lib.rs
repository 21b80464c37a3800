//! TalkTime Consultation Settlement Engine
//!
//! Converts a finished pay-per-minute consultation call into a finalized
//! charge, expert credit, and closed order, exactly once, no matter how
//! many times the triggering webhook or reconciliation sweep fires.
//!
//! The math lives in pure modules (`interval`, `overlap`, `pricing`); all
//! side effects are confined to the orchestrator in `settle`, which applies
//! them inside a single database transaction guarded by the order status.

pub mod error;
pub mod interval;
pub mod ledger;
pub mod overlap;
pub mod pricing;
pub mod settle;
pub mod timeline;
pub mod wallet;

pub use error::{SettlementError, SettlementResult};
pub use interval::PresenceInterval;
pub use overlap::overlap_seconds;
pub use pricing::{
    call_cost, payout_breakdown, platform_fee, real_balance_after_debit, real_credit_for,
    real_ratio, round2, PayoutBreakdown,
};
pub use settle::{SettlementOutcome, SettlementService, SkipReason};
pub use timeline::{CallTimeline, HttpTimelineClient, ParticipantTimeline, TimelineConfig,
    TimelineError, TimelineProvider};

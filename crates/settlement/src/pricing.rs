//! Pricing, fee, and payout functions
//!
//! All pure. Amounts are plain floats rounded half-up to two decimal places
//! exactly once, at the end of each computation; the real-balance clamp in
//! [`real_balance_after_debit`] absorbs the drift that float math leaves
//! behind.
//!
//! The "real-money ratio" exists because promotional wallet credit
//! ("pay X, get 2X") is not revenue: platform commission and expert payout
//! are computed on the cash-backed portion of a wallet deduction, not its
//! face value.

use serde::Serialize;

use talktime_shared::TransactionKind;

/// Round half-up to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Cost of a consultation: fractional minutes billed proportionally
pub fn call_cost(billable_seconds: i64, rate_per_minute: f64) -> f64 {
    round2(billable_seconds as f64 / 60.0 * rate_per_minute)
}

/// Platform commission on a cost
pub fn platform_fee(cost: f64, fee_percent: f64) -> f64 {
    round2(cost * fee_percent / 100.0)
}

/// Fraction of a wallet's face-value balance backed by actual cash
///
/// Legacy wallets with no real-balance tracking get 1.0; no retroactive
/// penalty. A non-positive total balance also yields 1.0 to guard the
/// division.
pub fn real_ratio(balance: f64, real_balance: Option<f64>) -> f64 {
    match real_balance {
        Some(real) if balance > 0.0 => (real / balance).clamp(0.0, 1.0),
        _ => 1.0,
    }
}

/// Derived payout figures for one settlement; never stored
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PayoutBreakdown {
    pub gateway_amount: f64,
    pub wallet_deduction: f64,
    pub real_ratio: f64,
    pub effective_real_amount: f64,
    pub fee_percent: f64,
    pub fee_amount: f64,
    pub expert_earnings: f64,
}

/// Compute commission and expert payout on the real-cash portion of a charge
///
/// `gateway_amount` is cash paid directly through the payment gateway;
/// `wallet_deduction` is face value taken from the wallet, discounted by the
/// wallet's real-money ratio.
pub fn payout_breakdown(
    gateway_amount: f64,
    wallet_deduction: f64,
    real_ratio: f64,
    fee_percent: f64,
) -> PayoutBreakdown {
    let ratio = real_ratio.clamp(0.0, 1.0);
    let effective_real = gateway_amount + wallet_deduction * ratio;
    let fee_amount = round2(effective_real * fee_percent / 100.0);
    let expert_earnings = round2(effective_real - fee_amount);

    PayoutBreakdown {
        gateway_amount,
        wallet_deduction,
        real_ratio: ratio,
        effective_real_amount: effective_real,
        fee_percent,
        fee_amount,
        expert_earnings,
    }
}

/// New real balance after debiting a wallet
///
/// The real balance shrinks proportionally to the pre-debit ratio, then is
/// clamped to `[0, balance - debit]`: it must never exceed the new total.
/// Legacy wallets stay untracked (`None`).
pub fn real_balance_after_debit(
    balance: f64,
    real_balance: Option<f64>,
    debit_amount: f64,
) -> Option<f64> {
    let real = real_balance?;
    let ratio = real_ratio(balance, Some(real));
    let reduced = real - debit_amount * ratio;
    let new_total = (balance - debit_amount).max(0.0);
    Some(reduced.clamp(0.0, new_total))
}

/// Portion of a wallet credit that counts as real cash
///
/// Cash-equivalent kinds (recharge, refund) carry full real value;
/// promotional kinds (bonus, cashback, referral) carry none.
pub fn real_credit_for(kind: TransactionKind, amount: f64) -> f64 {
    if kind.is_cash_equivalent() {
        amount
    } else {
        0.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_round2_half_up() {
        // 0.125 is exactly representable; a true half rounds up
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(1.004), 1.0);
        assert_eq!(round2(1.006), 1.01);
        assert_eq!(round2(15.0), 15.0);
    }

    #[test]
    fn test_cost_90s_at_10_per_minute() {
        // 1.5 minutes × 10 = 15.00 exactly
        assert_eq!(call_cost(90, 10.0), 15.0);
    }

    #[test]
    fn test_cost_fractional_minute() {
        // 100s at 7/min = 11.666... → 11.67
        assert_eq!(call_cost(100, 7.0), 11.67);
    }

    #[test]
    fn test_cost_four_minutes() {
        // 240s at 5/min = 4 min × 5 = 20.00
        assert_eq!(call_cost(240, 5.0), 20.0);
    }

    #[test]
    fn test_cost_zero_seconds() {
        assert_eq!(call_cost(0, 50.0), 0.0);
    }

    #[test]
    fn test_platform_fee() {
        assert_eq!(platform_fee(20.0, 10.0), 2.0);
        assert_eq!(platform_fee(33.33, 15.0), 5.0);
    }

    #[test]
    fn test_real_ratio_legacy_wallet_defaults_to_one() {
        assert_eq!(real_ratio(500.0, None), 1.0);
        assert_eq!(real_ratio(0.0, None), 1.0);
    }

    #[test]
    fn test_real_ratio_zero_balance_guard() {
        assert_eq!(real_ratio(0.0, Some(0.0)), 1.0);
        assert_eq!(real_ratio(-5.0, Some(10.0)), 1.0);
    }

    #[test]
    fn test_real_ratio_clamped() {
        assert_eq!(real_ratio(100.0, Some(50.0)), 0.5);
        // Drifted real balance above total is clamped
        assert_eq!(real_ratio(100.0, Some(120.0)), 1.0);
        assert_eq!(real_ratio(100.0, Some(-3.0)), 0.0);
    }

    #[test]
    fn test_payout_half_cash_wallet() {
        // gateway 0, wallet 100, ratio 0.5, fee 10% → real 50, fee 5, earnings 45
        let b = payout_breakdown(0.0, 100.0, 0.5, 10.0);
        assert_eq!(b.effective_real_amount, 50.0);
        assert_eq!(b.fee_amount, 5.0);
        assert_eq!(b.expert_earnings, 45.0);
    }

    #[test]
    fn test_payout_full_cash_wallet() {
        let b = payout_breakdown(0.0, 20.0, 1.0, 10.0);
        assert_eq!(b.effective_real_amount, 20.0);
        assert_eq!(b.fee_amount, 2.0);
        assert_eq!(b.expert_earnings, 18.0);
    }

    #[test]
    fn test_payout_gateway_portion_always_real() {
        let b = payout_breakdown(30.0, 100.0, 0.0, 10.0);
        assert_eq!(b.effective_real_amount, 30.0);
        assert_eq!(b.fee_amount, 3.0);
        assert_eq!(b.expert_earnings, 27.0);
    }

    #[test]
    fn test_payout_ratio_clamped() {
        let b = payout_breakdown(0.0, 100.0, 1.7, 10.0);
        assert_eq!(b.real_ratio, 1.0);
        assert_eq!(b.effective_real_amount, 100.0);
    }

    #[test]
    fn test_real_balance_after_debit_proportional() {
        // balance 100, real 50, debit 40 → real shrinks by 40×0.5 = 20 → 30
        assert_eq!(real_balance_after_debit(100.0, Some(50.0), 40.0), Some(30.0));
    }

    #[test]
    fn test_real_balance_after_debit_clamped_to_new_total() {
        // Drifted real above total: clamp to balance - debit
        let new_real = real_balance_after_debit(100.0, Some(110.0), 40.0).unwrap();
        assert_eq!(new_real, 60.0);
    }

    #[test]
    fn test_real_balance_after_debit_never_negative() {
        assert_eq!(real_balance_after_debit(10.0, Some(10.0), 10.0), Some(0.0));
        assert_eq!(real_balance_after_debit(10.0, Some(0.0), 10.0), Some(0.0));
    }

    #[test]
    fn test_real_balance_after_debit_legacy_stays_untracked() {
        assert_eq!(real_balance_after_debit(100.0, None, 40.0), None);
    }

    #[test]
    fn test_real_credit_classification() {
        assert_eq!(real_credit_for(TransactionKind::Recharge, 100.0), 100.0);
        assert_eq!(real_credit_for(TransactionKind::Refund, 25.0), 25.0);
        assert_eq!(real_credit_for(TransactionKind::Bonus, 100.0), 0.0);
        assert_eq!(real_credit_for(TransactionKind::Cashback, 10.0), 0.0);
        assert_eq!(real_credit_for(TransactionKind::Referral, 50.0), 0.0);
    }
}

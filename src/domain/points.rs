//! Loyalty points ledger.
//!
//! The ledger is append-only: earnings are positive entries (optionally
//! with an expiry), redemptions are negative USED entries. The spendable
//! balance nets redemptions against earnings oldest-first (FIFO), so a
//! redemption always draws down the earliest earnings; only what remains
//! of non-expired earnings is spendable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PointsReason {
    Earned,
    Used,
    Expired,
}

impl PointsReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            PointsReason::Earned => "EARNED",
            PointsReason::Used => "USED",
            PointsReason::Expired => "EXPIRED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "EARNED" => Some(PointsReason::Earned),
            "USED" => Some(PointsReason::Used),
            "EXPIRED" => Some(PointsReason::Expired),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointsLedgerEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Positive for EARNED, negative for USED/EXPIRED.
    pub amount: i64,
    pub reason: PointsReason,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PointsLedgerEntry {
    pub fn earned(user_id: Uuid, amount: i64, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            amount,
            reason: PointsReason::Earned,
            expires_at,
            created_at: Utc::now(),
        }
    }

    /// Negative entry recording a redemption against a confirmed purchase.
    pub fn used(user_id: Uuid, amount: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            amount: -amount,
            reason: PointsReason::Used,
            expires_at: None,
            created_at: Utc::now(),
        }
    }
}

/// Spendable balance at `now`.
///
/// Redeemed totals are consumed from earnings in creation order, then the
/// remainder of each earning counts only while unexpired. Never negative.
pub fn spendable_balance(entries: &[PointsLedgerEntry], now: DateTime<Utc>) -> i64 {
    let mut earnings: Vec<(&PointsLedgerEntry, i64)> = entries
        .iter()
        .filter(|e| e.reason == PointsReason::Earned && e.amount > 0)
        .map(|e| (e, e.amount))
        .collect();
    earnings.sort_by_key(|(e, _)| e.created_at);

    let mut used: i64 = entries
        .iter()
        .filter(|e| e.reason == PointsReason::Used)
        .map(|e| e.amount.abs())
        .sum();

    let mut balance = 0;
    for (entry, mut remaining) in earnings {
        if used > 0 {
            let drawn = used.min(remaining);
            remaining -= drawn;
            used -= drawn;
        }
        let expired = entry.expires_at.map_or(false, |at| at <= now);
        if !expired {
            balance += remaining;
        }
    }
    balance
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(amount: i64, reason: PointsReason, age_days: i64, ttl_days: Option<i64>) -> PointsLedgerEntry {
        let created = Utc::now() - Duration::days(age_days);
        PointsLedgerEntry {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            amount,
            reason,
            expires_at: ttl_days.map(|d| created + Duration::days(d)),
            created_at: created,
        }
    }

    #[test]
    fn balance_sums_unexpired_earnings() {
        let entries = vec![
            entry(10_000, PointsReason::Earned, 10, None),
            entry(5_000, PointsReason::Earned, 5, Some(365)),
        ];
        assert_eq!(spendable_balance(&entries, Utc::now()), 15_000);
    }

    #[test]
    fn expired_earnings_do_not_count() {
        let entries = vec![
            entry(10_000, PointsReason::Earned, 10, Some(3)),
            entry(5_000, PointsReason::Earned, 1, None),
        ];
        assert_eq!(spendable_balance(&entries, Utc::now()), 5_000);
    }

    #[test]
    fn usage_draws_from_oldest_earning_first() {
        // 10k earned long ago (expired by now), 5k earned recently.
        // The 8k redemption happened against the old earning first, so its
        // later expiry only removes the 2k that was left of it.
        let entries = vec![
            entry(10_000, PointsReason::Earned, 30, Some(20)),
            entry(5_000, PointsReason::Earned, 2, None),
            entry(-8_000, PointsReason::Used, 25, None),
        ];
        assert_eq!(spendable_balance(&entries, Utc::now()), 5_000);
    }

    #[test]
    fn balance_never_negative() {
        let entries = vec![
            entry(1_000, PointsReason::Earned, 5, None),
            entry(-9_000, PointsReason::Used, 1, None),
        ];
        assert_eq!(spendable_balance(&entries, Utc::now()), 0);
    }

    #[test]
    fn empty_ledger_is_zero() {
        assert_eq!(spendable_balance(&[], Utc::now()), 0);
    }
}

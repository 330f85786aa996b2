//! Event-scoped promotional vouchers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "PERCENTAGE",
            DiscountType::Fixed => "FIXED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "PERCENTAGE" => Some(DiscountType::Percentage),
            "FIXED" => Some(DiscountType::Fixed),
            _ => None,
        }
    }
}

/// A voucher is scoped to one event and shared across buyers up to its
/// usage limit. `used_count` is incremented when a transaction carrying
/// the voucher is confirmed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voucher {
    pub code: String,
    pub event_id: Uuid,
    pub discount_type: DiscountType,
    pub discount_amount: i64,
    pub usage_limit: i32,
    pub used_count: i32,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl Voucher {
    /// Eligibility check, distinct from the numeric clamping done by the
    /// pricing engine. Returns the reason the voucher cannot be applied.
    pub fn eligibility(&self, event_id: Uuid, now: DateTime<Utc>) -> Result<(), &'static str> {
        if self.event_id != event_id {
            return Err("voucher is not valid for this event");
        }
        if now < self.valid_from {
            return Err("voucher is not yet valid");
        }
        if now > self.valid_until {
            return Err("voucher has expired");
        }
        if self.used_count >= self.usage_limit {
            return Err("voucher usage limit reached");
        }
        Ok(())
    }
}

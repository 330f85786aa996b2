//! Personal single-use coupons.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unlike vouchers, coupons belong to a single user, carry a fixed
/// discount and can be redeemed once. `redeemed_at` is set in the same
/// commit that confirms the transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coupon {
    pub code: String,
    pub owner_id: Uuid,
    pub discount_amount: i64,
    pub expires_at: DateTime<Utc>,
    pub redeemed_at: Option<DateTime<Utc>>,
}

impl Coupon {
    pub fn eligibility(&self, buyer_id: Uuid, now: DateTime<Utc>) -> Result<(), &'static str> {
        if self.owner_id != buyer_id {
            return Err("coupon belongs to another user");
        }
        if self.redeemed_at.is_some() {
            return Err("coupon has already been redeemed");
        }
        if now > self.expires_at {
            return Err("coupon has expired");
        }
        Ok(())
    }
}

//! Pricing engine.
//!
//! Single authority for discount stacking. The order of application is
//! fixed: voucher, then coupon, then points. Eligibility failures are
//! reported as errors; numeric amounts are clamped so the final price
//! stays within `[0, subtotal]`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use super::coupon::Coupon;
use super::voucher::{DiscountType, Voucher};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("invalid voucher: {0}")]
    InvalidVoucher(&'static str),

    #[error("invalid coupon: {0}")]
    InvalidCoupon(&'static str),

    #[error("insufficient points: requested {requested}, available {available}")]
    InsufficientPoints { requested: i64, available: i64 },
}

/// Deterministic breakdown of a priced cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub subtotal: i64,
    pub voucher_discount: i64,
    pub coupon_discount: i64,
    pub points_used: i64,
    pub final_price: i64,
}

/// Computes the final price for a cart.
///
/// Percentage vouchers floor toward the buyer's benefit. Requesting more
/// points than the buyer holds is an eligibility error; the clamp of
/// `points_used` down to the amount still payable is a numeric one.
pub fn price(
    subtotal: i64,
    event_id: Uuid,
    buyer_id: Uuid,
    voucher: Option<&Voucher>,
    coupon: Option<&Coupon>,
    points_requested: i64,
    points_available: i64,
    now: DateTime<Utc>,
) -> Result<Quote, PricingError> {
    let voucher_discount = match voucher {
        Some(v) => {
            v.eligibility(event_id, now)
                .map_err(PricingError::InvalidVoucher)?;
            match v.discount_type {
                DiscountType::Percentage => subtotal * v.discount_amount / 100,
                DiscountType::Fixed => v.discount_amount.min(subtotal),
            }
        }
        None => 0,
    };
    let after_voucher = subtotal - voucher_discount;

    let coupon_discount = match coupon {
        Some(c) => {
            c.eligibility(buyer_id, now)
                .map_err(PricingError::InvalidCoupon)?;
            c.discount_amount.min(after_voucher)
        }
        None => 0,
    };
    let after_coupon = after_voucher - coupon_discount;

    if points_requested > points_available {
        return Err(PricingError::InsufficientPoints {
            requested: points_requested,
            available: points_available,
        });
    }
    let points_used = points_requested.min(after_coupon);

    Ok(Quote {
        subtotal,
        voucher_discount,
        coupon_discount,
        points_used,
        final_price: (after_coupon - points_used).max(0),
    })
}

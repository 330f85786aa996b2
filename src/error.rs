use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::domain::{PricingError, TransactionStatus};
use crate::ports::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not enough seats remaining")]
    OutOfStock,

    #[error("Invalid voucher: {0}")]
    InvalidVoucher(String),

    #[error("Invalid coupon: {0}")]
    InvalidCoupon(String),

    #[error("Insufficient points: requested {requested}, available {available}")]
    InsufficientPoints { requested: i64, available: i64 },

    #[error("Transition not allowed from state {current}")]
    InvalidState { current: TransactionStatus },

    #[error("Payment deadline has passed")]
    Expired,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unknown check-in token")]
    TokenNotFound,

    #[error("Tickets are not available until the transaction is confirmed")]
    NotReady,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code; callers branch on this, not on the
    /// message text.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION",
            AppError::OutOfStock => "OUT_OF_STOCK",
            AppError::InvalidVoucher(_) => "INVALID_VOUCHER",
            AppError::InvalidCoupon(_) => "INVALID_COUPON",
            AppError::InsufficientPoints { .. } => "INSUFFICIENT_POINTS",
            AppError::InvalidState { .. } => "INVALID_STATE",
            AppError::Expired => "EXPIRED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::TokenNotFound => "TOKEN_NOT_FOUND",
            AppError::NotReady => "NOT_READY",
            AppError::Database(_) => "STORAGE",
            AppError::Internal(_) => "INTERNAL",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidVoucher(_)
            | AppError::InvalidCoupon(_)
            | AppError::InsufficientPoints { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::OutOfStock
            | AppError::InvalidState { .. }
            | AppError::Expired
            | AppError::NotReady => StatusCode::CONFLICT,
            AppError::NotFound(_) | AppError::TokenNotFound => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "code": self.code(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AppError::NotFound(what),
            StoreError::TokenNotFound => AppError::TokenNotFound,
            StoreError::OutOfStock => AppError::OutOfStock,
            StoreError::InvalidState { current } => AppError::InvalidState { current },
            StoreError::DeadlinePassed => AppError::Expired,
            StoreError::VoucherExhausted => {
                AppError::InvalidVoucher("voucher usage limit reached".into())
            }
            StoreError::CouponConsumed => {
                AppError::InvalidCoupon("coupon has already been redeemed".into())
            }
            StoreError::Database(e) => AppError::Database(e),
        }
    }
}

impl From<PricingError> for AppError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::InvalidVoucher(reason) => AppError::InvalidVoucher(reason.into()),
            PricingError::InvalidCoupon(reason) => AppError::InvalidCoupon(reason.into()),
            PricingError::InsufficientPoints { requested, available } => {
                AppError::InsufficientPoints { requested, available }
            }
        }
    }
}

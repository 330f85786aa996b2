//! Storage port for the order lifecycle core.
//!
//! Every lifecycle transition is a single trait method and MUST commit
//! atomically: a conditional update against the currently persisted
//! status plus whatever side effects belong to that transition (seat
//! release, ticket minting, points debit, voucher/coupon consumption).
//! Racing callers lose with `InvalidState` or `DeadlinePassed` and never
//! overwrite a winner's result.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    Coupon, PointsLedgerEntry, Ticket, TicketType, Transaction, TransactionStatus, Voucher,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("unknown check-in token")]
    TokenNotFound,

    #[error("insufficient seats remaining")]
    OutOfStock,

    #[error("transition not allowed from state {current}")]
    InvalidState { current: TransactionStatus },

    #[error("payment deadline has passed")]
    DeadlinePassed,

    #[error("voucher is no longer usable")]
    VoucherExhausted,

    #[error("coupon has already been redeemed")]
    CouponConsumed,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of the atomic read-then-mark on a ticket row. `first_use`
/// tells the two racing gate scanners apart.
#[derive(Debug, Clone)]
pub struct CheckInRecord {
    pub ticket: Ticket,
    pub event_id: Uuid,
    pub first_use: bool,
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    // Reference reads used while validating a cart.
    async fn ticket_type(&self, id: Uuid) -> StoreResult<TicketType>;
    async fn voucher(&self, code: &str) -> StoreResult<Option<Voucher>>;
    async fn coupon(&self, code: &str) -> StoreResult<Option<Coupon>>;
    async fn points_entries(&self, user_id: Uuid) -> StoreResult<Vec<PointsLedgerEntry>>;

    /// Persists a new WAITING_PAYMENT transaction, decrementing
    /// `seats_remaining` with a floor check in the same commit. Fails
    /// with `OutOfStock` when fewer than `quantity` seats remain.
    async fn insert_transaction(&self, tx: &Transaction) -> StoreResult<Transaction>;

    async fn transaction(&self, id: Uuid) -> StoreResult<Transaction>;

    /// WAITING_PAYMENT -> WAITING_CONFIRMATION, guarded by
    /// `expired_at > now` re-checked at the commit boundary.
    async fn commit_proof(
        &self,
        id: Uuid,
        proof: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Transaction>;

    /// WAITING_CONFIRMATION -> DONE. Inserts the minted tickets, the
    /// points debit entry (when present), increments the voucher's
    /// `used_count` and marks the coupon redeemed, all in one commit.
    async fn commit_confirmation(
        &self,
        id: Uuid,
        tickets: &[Ticket],
        points_debit: Option<&PointsLedgerEntry>,
        now: DateTime<Utc>,
    ) -> StoreResult<Transaction>;

    /// WAITING_CONFIRMATION -> REJECTED, releasing the reserved seats.
    async fn commit_rejection(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<Transaction>;

    /// WAITING_PAYMENT -> CANCELLED, releasing the reserved seats.
    async fn commit_cancellation(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<Transaction>;

    /// Moves every WAITING_PAYMENT row with `expired_at < now` to
    /// EXPIRED and releases its seats. Idempotent; safe to race with
    /// `commit_proof` on the same row.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> StoreResult<Vec<Transaction>>;

    async fn tickets_for(&self, transaction_id: Uuid) -> StoreResult<Vec<Ticket>>;

    /// Atomic read-then-mark of `checked_in` keyed by QR token. Exactly
    /// one of two concurrent calls observes `first_use = true`.
    async fn mark_checked_in(&self, qr_token: &str, now: DateTime<Utc>) -> StoreResult<CheckInRecord>;

    // Fixture writes: catalog and promotion rows are owned by out-of-scope
    // collaborators, but tests and seeding need a way in.
    async fn insert_ticket_type(&self, ticket_type: &TicketType) -> StoreResult<()>;
    async fn insert_voucher(&self, voucher: &Voucher) -> StoreResult<()>;
    async fn insert_coupon(&self, coupon: &Coupon) -> StoreResult<()>;
    async fn insert_points_entry(&self, entry: &PointsLedgerEntry) -> StoreResult<()>;
}

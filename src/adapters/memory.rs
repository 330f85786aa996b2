//! In-memory implementation of the ledger store.
//!
//! One `RwLock` over the whole ledger: a write guard spans every
//! transition, which gives the same atomicity the Postgres adapter gets
//! from a SQL transaction. Used by the test suites and for local runs
//! without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    Coupon, PointsLedgerEntry, Ticket, TicketType, Transaction, TransactionStatus, Voucher,
};
use crate::ports::{CheckInRecord, LedgerStore, StoreError, StoreResult};

#[derive(Default)]
struct Inner {
    ticket_types: HashMap<Uuid, TicketType>,
    transactions: HashMap<Uuid, Transaction>,
    tickets: HashMap<Uuid, Ticket>,
    tokens: HashMap<String, Uuid>,
    vouchers: HashMap<String, Voucher>,
    coupons: HashMap<String, Coupon>,
    points: Vec<PointsLedgerEntry>,
}

#[derive(Default, Clone)]
pub struct MemoryLedgerStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(id: Uuid) -> StoreError {
    StoreError::NotFound(format!("transaction {id}"))
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn ticket_type(&self, id: Uuid) -> StoreResult<TicketType> {
        let inner = self.inner.read().await;
        inner
            .ticket_types
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("ticket type {id}")))
    }

    async fn voucher(&self, code: &str) -> StoreResult<Option<Voucher>> {
        Ok(self.inner.read().await.vouchers.get(code).cloned())
    }

    async fn coupon(&self, code: &str) -> StoreResult<Option<Coupon>> {
        Ok(self.inner.read().await.coupons.get(code).cloned())
    }

    async fn points_entries(&self, user_id: Uuid) -> StoreResult<Vec<PointsLedgerEntry>> {
        let inner = self.inner.read().await;
        Ok(inner
            .points
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert_transaction(&self, tx: &Transaction) -> StoreResult<Transaction> {
        let mut inner = self.inner.write().await;
        let tt = inner
            .ticket_types
            .get_mut(&tx.ticket_type_id)
            .ok_or_else(|| StoreError::NotFound(format!("ticket type {}", tx.ticket_type_id)))?;
        if tt.seats_remaining < tx.quantity {
            return Err(StoreError::OutOfStock);
        }
        tt.seats_remaining -= tx.quantity;
        inner.transactions.insert(tx.id, tx.clone());
        Ok(tx.clone())
    }

    async fn transaction(&self, id: Uuid) -> StoreResult<Transaction> {
        let inner = self.inner.read().await;
        inner.transactions.get(&id).cloned().ok_or_else(|| not_found(id))
    }

    async fn commit_proof(
        &self,
        id: Uuid,
        proof: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Transaction> {
        let mut inner = self.inner.write().await;
        let tx = inner.transactions.get_mut(&id).ok_or_else(|| not_found(id))?;
        if tx.status != TransactionStatus::WaitingPayment {
            return Err(StoreError::InvalidState { current: tx.status });
        }
        if now >= tx.expired_at {
            return Err(StoreError::DeadlinePassed);
        }
        tx.status = TransactionStatus::WaitingConfirmation;
        tx.payment_proof = Some(proof.to_string());
        Ok(tx.clone())
    }

    async fn commit_confirmation(
        &self,
        id: Uuid,
        tickets: &[Ticket],
        points_debit: Option<&PointsLedgerEntry>,
        now: DateTime<Utc>,
    ) -> StoreResult<Transaction> {
        let mut inner = self.inner.write().await;

        let (current, voucher_code, coupon_code) = {
            let tx = inner.transactions.get(&id).ok_or_else(|| not_found(id))?;
            (tx.status, tx.voucher_code.clone(), tx.coupon_code.clone())
        };
        if current != TransactionStatus::WaitingConfirmation {
            return Err(StoreError::InvalidState { current });
        }

        // Validate promotion consumption before touching anything so a
        // failure leaves no partial effect.
        if let Some(code) = &voucher_code {
            let v = inner
                .vouchers
                .get(code)
                .ok_or_else(|| StoreError::NotFound(format!("voucher {code}")))?;
            if v.used_count >= v.usage_limit {
                return Err(StoreError::VoucherExhausted);
            }
        }
        if let Some(code) = &coupon_code {
            let c = inner
                .coupons
                .get(code)
                .ok_or_else(|| StoreError::NotFound(format!("coupon {code}")))?;
            if c.redeemed_at.is_some() {
                return Err(StoreError::CouponConsumed);
            }
        }

        if let Some(code) = &voucher_code {
            if let Some(v) = inner.vouchers.get_mut(code) {
                v.used_count += 1;
            }
        }
        if let Some(code) = &coupon_code {
            if let Some(c) = inner.coupons.get_mut(code) {
                c.redeemed_at = Some(now);
            }
        }
        for ticket in tickets {
            inner.tokens.insert(ticket.qr_token.clone(), ticket.id);
            inner.tickets.insert(ticket.id, ticket.clone());
        }
        if let Some(entry) = points_debit {
            inner.points.push(entry.clone());
        }

        let tx = inner
            .transactions
            .get_mut(&id)
            .ok_or_else(|| not_found(id))?;
        tx.status = TransactionStatus::Done;
        tx.confirmed_at = Some(now);
        Ok(tx.clone())
    }

    async fn commit_rejection(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<Transaction> {
        let mut inner = self.inner.write().await;
        let tx = inner.transactions.get(&id).ok_or_else(|| not_found(id))?;
        if tx.status != TransactionStatus::WaitingConfirmation {
            return Err(StoreError::InvalidState { current: tx.status });
        }
        let (ticket_type_id, quantity) = (tx.ticket_type_id, tx.quantity);
        if let Some(tt) = inner.ticket_types.get_mut(&ticket_type_id) {
            tt.seats_remaining = (tt.seats_remaining + quantity).min(tt.total_seats);
        }
        let tx = inner.transactions.get_mut(&id).ok_or_else(|| not_found(id))?;
        tx.status = TransactionStatus::Rejected;
        tx.rejected_at = Some(now);
        Ok(tx.clone())
    }

    async fn commit_cancellation(&self, id: Uuid, _now: DateTime<Utc>) -> StoreResult<Transaction> {
        let mut inner = self.inner.write().await;
        let tx = inner.transactions.get(&id).ok_or_else(|| not_found(id))?;
        if tx.status != TransactionStatus::WaitingPayment {
            return Err(StoreError::InvalidState { current: tx.status });
        }
        let (ticket_type_id, quantity) = (tx.ticket_type_id, tx.quantity);
        if let Some(tt) = inner.ticket_types.get_mut(&ticket_type_id) {
            tt.seats_remaining = (tt.seats_remaining + quantity).min(tt.total_seats);
        }
        let tx = inner.transactions.get_mut(&id).ok_or_else(|| not_found(id))?;
        tx.status = TransactionStatus::Cancelled;
        Ok(tx.clone())
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> StoreResult<Vec<Transaction>> {
        let mut inner = self.inner.write().await;
        let expired_ids: Vec<Uuid> = inner
            .transactions
            .values()
            .filter(|tx| tx.status == TransactionStatus::WaitingPayment && tx.expired_at < now)
            .map(|tx| tx.id)
            .collect();

        let mut swept = Vec::with_capacity(expired_ids.len());
        for id in expired_ids {
            let (ticket_type_id, quantity, snapshot) = {
                let tx = inner.transactions.get_mut(&id).ok_or_else(|| not_found(id))?;
                tx.status = TransactionStatus::Expired;
                (tx.ticket_type_id, tx.quantity, tx.clone())
            };
            if let Some(tt) = inner.ticket_types.get_mut(&ticket_type_id) {
                tt.seats_remaining = (tt.seats_remaining + quantity).min(tt.total_seats);
            }
            swept.push(snapshot);
        }
        Ok(swept)
    }

    async fn tickets_for(&self, transaction_id: Uuid) -> StoreResult<Vec<Ticket>> {
        let inner = self.inner.read().await;
        Ok(inner
            .tickets
            .values()
            .filter(|t| t.transaction_id == transaction_id)
            .cloned()
            .collect())
    }

    async fn mark_checked_in(
        &self,
        qr_token: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<CheckInRecord> {
        let mut inner = self.inner.write().await;
        let ticket_id = *inner.tokens.get(qr_token).ok_or(StoreError::TokenNotFound)?;
        let ticket = inner
            .tickets
            .get_mut(&ticket_id)
            .ok_or(StoreError::TokenNotFound)?;

        let first_use = !ticket.checked_in;
        if first_use {
            ticket.checked_in = true;
            ticket.checked_in_at = Some(now);
        }
        let ticket = ticket.clone();

        let event_id = inner
            .transactions
            .get(&ticket.transaction_id)
            .map(|tx| tx.event_id)
            .ok_or_else(|| not_found(ticket.transaction_id))?;

        Ok(CheckInRecord { ticket, event_id, first_use })
    }

    async fn insert_ticket_type(&self, ticket_type: &TicketType) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .ticket_types
            .insert(ticket_type.id, ticket_type.clone());
        Ok(())
    }

    async fn insert_voucher(&self, voucher: &Voucher) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .vouchers
            .insert(voucher.code.clone(), voucher.clone());
        Ok(())
    }

    async fn insert_coupon(&self, coupon: &Coupon) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .coupons
            .insert(coupon.code.clone(), coupon.clone());
        Ok(())
    }

    async fn insert_points_entry(&self, entry: &PointsLedgerEntry) -> StoreResult<()> {
        self.inner.write().await.points.push(entry.clone());
        Ok(())
    }
}

//! Transaction lifecycle orchestration.
//!
//! All writes go through the ledger store's atomic transition commits;
//! this service owns validation, pricing and the ordering of side
//! effects around those commits.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{
    points, pricing, Attendee, PointsLedgerEntry, Ticket, Transaction, TransactionStatus,
};
use crate::error::AppError;
use crate::ports::LedgerStore;
use crate::services::notifier::{LifecycleEvent, NotificationDispatcher};

/// Cart submitted by a buyer for one ticket type.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub buyer_id: Uuid,
    pub ticket_type_id: Uuid,
    pub quantity: i32,
    pub attendees: Vec<Attendee>,
    pub voucher_code: Option<String>,
    pub coupon_code: Option<String>,
    pub points_requested: i64,
}

#[derive(Clone)]
pub struct TransactionLifecycle {
    store: Arc<dyn LedgerStore>,
    notifier: Arc<dyn NotificationDispatcher>,
    payment_window: Duration,
}

impl TransactionLifecycle {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        notifier: Arc<dyn NotificationDispatcher>,
        payment_window: Duration,
    ) -> Self {
        Self { store, notifier, payment_window }
    }

    /// Validates the cart, prices it and persists a WAITING_PAYMENT
    /// transaction with the seats reserved. Eligibility failures happen
    /// before any state is touched; the seat floor check happens inside
    /// the insert commit.
    pub async fn create(&self, event_id: Uuid, order: CreateOrder) -> Result<Transaction, AppError> {
        if order.quantity <= 0 {
            return Err(AppError::Validation("quantity must be positive".into()));
        }
        if order.attendees.len() != order.quantity as usize {
            return Err(AppError::Validation(format!(
                "expected {} attendee(s), got {}",
                order.quantity,
                order.attendees.len()
            )));
        }
        if order.points_requested < 0 {
            return Err(AppError::Validation("points_requested must not be negative".into()));
        }

        let ticket_type = self.store.ticket_type(order.ticket_type_id).await?;
        if ticket_type.event_id != event_id {
            return Err(AppError::Validation(
                "ticket type does not belong to this event".into(),
            ));
        }

        let now = Utc::now();

        let voucher = match &order.voucher_code {
            Some(code) => Some(
                self.store
                    .voucher(code)
                    .await?
                    .ok_or_else(|| AppError::InvalidVoucher("unknown voucher code".into()))?,
            ),
            None => None,
        };
        let coupon = match &order.coupon_code {
            Some(code) => Some(
                self.store
                    .coupon(code)
                    .await?
                    .ok_or_else(|| AppError::InvalidCoupon("unknown coupon code".into()))?,
            ),
            None => None,
        };

        let points_available = if order.points_requested > 0 {
            let entries = self.store.points_entries(order.buyer_id).await?;
            points::spendable_balance(&entries, now)
        } else {
            0
        };

        let subtotal = ticket_type.unit_price * i64::from(order.quantity);
        let quote = pricing::price(
            subtotal,
            event_id,
            order.buyer_id,
            voucher.as_ref(),
            coupon.as_ref(),
            order.points_requested,
            points_available,
            now,
        )?;

        let tx = Transaction::new(
            order.buyer_id,
            event_id,
            &ticket_type,
            order.quantity,
            order.attendees,
            order.voucher_code,
            order.coupon_code,
            &quote,
            self.payment_window,
        );

        let persisted = self.store.insert_transaction(&tx).await?;
        info!(
            transaction_id = %persisted.id,
            buyer_id = %persisted.buyer_id,
            final_price = persisted.final_price,
            expired_at = %persisted.expired_at,
            "transaction created"
        );
        Ok(persisted)
    }

    /// Attaches a payment proof and advances to WAITING_CONFIRMATION.
    /// The deadline is re-checked at the commit boundary, not trusted to
    /// the sweeper.
    pub async fn submit_proof(&self, id: Uuid, proof: &str) -> Result<Transaction, AppError> {
        if proof.trim().is_empty() {
            return Err(AppError::Validation("payment proof must not be empty".into()));
        }
        let tx = self.store.commit_proof(id, proof, Utc::now()).await?;
        info!(transaction_id = %tx.id, "payment proof submitted");
        Ok(tx)
    }

    /// Organizer confirmation: mints one ticket per attendee, debits
    /// points and consumes the promotions, all in one store commit. A
    /// lost race (already DONE, rejected meanwhile) surfaces as
    /// `InvalidState` and mints nothing.
    pub async fn confirm(&self, id: Uuid) -> Result<Transaction, AppError> {
        let pending = self.store.transaction(id).await?;
        if pending.status != TransactionStatus::WaitingConfirmation {
            return Err(AppError::InvalidState { current: pending.status });
        }

        let tickets: Vec<Ticket> = pending
            .attendees
            .iter()
            .map(|a| Ticket::issue(pending.id, a.name.clone(), a.email.clone()))
            .collect();
        let points_debit = (pending.points_used > 0)
            .then(|| PointsLedgerEntry::used(pending.buyer_id, pending.points_used));

        let confirmed = self
            .store
            .commit_confirmation(id, &tickets, points_debit.as_ref(), Utc::now())
            .await?;

        self.notifier
            .dispatch(LifecycleEvent::TransactionConfirmed {
                transaction_id: confirmed.id,
                buyer_id: confirmed.buyer_id,
                tickets_minted: tickets.len(),
            })
            .await;
        info!(transaction_id = %confirmed.id, tickets = tickets.len(), "transaction confirmed");
        Ok(confirmed)
    }

    /// Organizer rejection: releases the reserved seats.
    pub async fn reject(&self, id: Uuid) -> Result<Transaction, AppError> {
        let rejected = self.store.commit_rejection(id, Utc::now()).await?;
        self.notifier
            .dispatch(LifecycleEvent::TransactionRejected {
                transaction_id: rejected.id,
                buyer_id: rejected.buyer_id,
            })
            .await;
        info!(transaction_id = %rejected.id, "transaction rejected");
        Ok(rejected)
    }

    /// Buyer-initiated cancellation while still unpaid.
    pub async fn cancel(&self, id: Uuid) -> Result<Transaction, AppError> {
        let cancelled = self.store.commit_cancellation(id, Utc::now()).await?;
        info!(transaction_id = %cancelled.id, "transaction cancelled");
        Ok(cancelled)
    }

    /// Expires every overdue WAITING_PAYMENT transaction. Idempotent:
    /// already-expired rows no longer match the guard.
    pub async fn sweep_expired(&self) -> Result<Vec<Uuid>, AppError> {
        let swept = self.store.sweep_expired(Utc::now()).await?;
        for tx in &swept {
            self.notifier
                .dispatch(LifecycleEvent::TransactionExpired {
                    transaction_id: tx.id,
                    buyer_id: tx.buyer_id,
                })
                .await;
        }
        if !swept.is_empty() {
            info!(count = swept.len(), "expired overdue transactions");
        }
        Ok(swept.into_iter().map(|tx| tx.id).collect())
    }

    pub async fn get(&self, id: Uuid) -> Result<Transaction, AppError> {
        Ok(self.store.transaction(id).await?)
    }

    /// Minted tickets, only once the transaction is DONE.
    pub async fn tickets(&self, id: Uuid) -> Result<Vec<Ticket>, AppError> {
        let tx = self.store.transaction(id).await?;
        if tx.status != TransactionStatus::Done {
            return Err(AppError::NotReady);
        }
        Ok(self.store.tickets_for(id).await?)
    }
}

//! Postgres implementation of the ledger store.
//!
//! Transitions are conditional UPDATEs on the persisted status; when the
//! guarded update matches no row the current row is re-read to tell the
//! caller why it lost (missing, wrong state, or past the deadline).
//! Multi-statement commits run inside a single SQL transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{
    Attendee, Coupon, DiscountType, PointsLedgerEntry, PointsReason, Ticket, TicketType,
    Transaction, TransactionStatus, Voucher,
};
use crate::ports::{CheckInRecord, LedgerStore, StoreError, StoreResult};

#[derive(Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Classifies a failed guarded transition on `id` by re-reading the
    /// row outside the aborted update.
    async fn classify_loss(
        &self,
        id: Uuid,
        expected: TransactionStatus,
        now: Option<DateTime<Utc>>,
    ) -> StoreError {
        let row = sqlx::query_as::<_, TransactionRow>("SELECT * FROM transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await;

        match row {
            Ok(Some(raw)) => match raw.into_domain() {
                Ok(tx) => {
                    if tx.status == expected {
                        match now {
                            Some(now) if now >= tx.expired_at => StoreError::DeadlinePassed,
                            // Guard matched on re-read: the racing writer
                            // won between our UPDATE and this SELECT.
                            _ => StoreError::InvalidState { current: tx.status },
                        }
                    } else {
                        StoreError::InvalidState { current: tx.status }
                    }
                }
                Err(e) => e,
            },
            Ok(None) => StoreError::NotFound(format!("transaction {id}")),
            Err(e) => StoreError::Database(e),
        }
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn ticket_type(&self, id: Uuid) -> StoreResult<TicketType> {
        let row = sqlx::query_as::<_, TicketTypeRow>("SELECT * FROM ticket_types WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TicketTypeRow::into_domain)
            .ok_or_else(|| StoreError::NotFound(format!("ticket type {id}")))
    }

    async fn voucher(&self, code: &str) -> StoreResult<Option<Voucher>> {
        let row = sqlx::query_as::<_, VoucherRow>("SELECT * FROM vouchers WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        row.map(VoucherRow::into_domain).transpose()
    }

    async fn coupon(&self, code: &str) -> StoreResult<Option<Coupon>> {
        let row = sqlx::query_as::<_, CouponRow>("SELECT * FROM coupons WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(CouponRow::into_domain))
    }

    async fn points_entries(&self, user_id: Uuid) -> StoreResult<Vec<PointsLedgerEntry>> {
        let rows = sqlx::query_as::<_, PointsRow>(
            "SELECT * FROM points_ledger WHERE user_id = $1 ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(PointsRow::into_domain).collect()
    }

    async fn insert_transaction(&self, tx: &Transaction) -> StoreResult<Transaction> {
        let mut db_tx = self.pool.begin().await?;

        // Seat reservation with floor check; the WHERE clause is the
        // oversell guard.
        let reserved = sqlx::query(
            "UPDATE ticket_types SET seats_remaining = seats_remaining - $2 \
             WHERE id = $1 AND seats_remaining >= $2",
        )
        .bind(tx.ticket_type_id)
        .bind(tx.quantity)
        .execute(&mut *db_tx)
        .await?;

        if reserved.rows_affected() == 0 {
            let exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM ticket_types WHERE id = $1")
                .bind(tx.ticket_type_id)
                .fetch_optional(&mut *db_tx)
                .await?;
            return Err(match exists {
                Some(_) => StoreError::OutOfStock,
                None => StoreError::NotFound(format!("ticket type {}", tx.ticket_type_id)),
            });
        }

        let attendees = attendees_json(&tx.attendees)?;
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            INSERT INTO transactions (
                id, buyer_id, event_id, ticket_type_id, quantity, unit_price, subtotal,
                voucher_code, coupon_code, points_used, final_price, status, attendees,
                payment_proof, created_at, expired_at, confirmed_at, rejected_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING *
            "#,
        )
        .bind(tx.id)
        .bind(tx.buyer_id)
        .bind(tx.event_id)
        .bind(tx.ticket_type_id)
        .bind(tx.quantity)
        .bind(tx.unit_price)
        .bind(tx.subtotal)
        .bind(&tx.voucher_code)
        .bind(&tx.coupon_code)
        .bind(tx.points_used)
        .bind(tx.final_price)
        .bind(tx.status.as_str())
        .bind(attendees)
        .bind(&tx.payment_proof)
        .bind(tx.created_at)
        .bind(tx.expired_at)
        .bind(tx.confirmed_at)
        .bind(tx.rejected_at)
        .fetch_one(&mut *db_tx)
        .await?;

        db_tx.commit().await?;
        row.into_domain()
    }

    async fn transaction(&self, id: Uuid) -> StoreResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>("SELECT * FROM transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.ok_or_else(|| StoreError::NotFound(format!("transaction {id}")))?
            .into_domain()
    }

    async fn commit_proof(
        &self,
        id: Uuid,
        proof: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(
            "UPDATE transactions SET status = 'WAITING_CONFIRMATION', payment_proof = $2 \
             WHERE id = $1 AND status = 'WAITING_PAYMENT' AND expired_at > $3 \
             RETURNING *",
        )
        .bind(id)
        .bind(proof)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(raw) => raw.into_domain(),
            None => Err(self
                .classify_loss(id, TransactionStatus::WaitingPayment, Some(now))
                .await),
        }
    }

    async fn commit_confirmation(
        &self,
        id: Uuid,
        tickets: &[Ticket],
        points_debit: Option<&PointsLedgerEntry>,
        now: DateTime<Utc>,
    ) -> StoreResult<Transaction> {
        let mut db_tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, TransactionRow>(
            "UPDATE transactions SET status = 'DONE', confirmed_at = $2 \
             WHERE id = $1 AND status = 'WAITING_CONFIRMATION' \
             RETURNING *",
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&mut *db_tx)
        .await?;

        let confirmed = match row {
            Some(raw) => raw.into_domain()?,
            None => {
                db_tx.rollback().await?;
                return Err(self
                    .classify_loss(id, TransactionStatus::WaitingConfirmation, None)
                    .await);
            }
        };

        if let Some(code) = &confirmed.voucher_code {
            let bumped = sqlx::query(
                "UPDATE vouchers SET used_count = used_count + 1 \
                 WHERE code = $1 AND used_count < usage_limit",
            )
            .bind(code)
            .execute(&mut *db_tx)
            .await?;
            if bumped.rows_affected() == 0 {
                db_tx.rollback().await?;
                return Err(StoreError::VoucherExhausted);
            }
        }

        if let Some(code) = &confirmed.coupon_code {
            let redeemed = sqlx::query(
                "UPDATE coupons SET redeemed_at = $2 \
                 WHERE code = $1 AND redeemed_at IS NULL",
            )
            .bind(code)
            .bind(now)
            .execute(&mut *db_tx)
            .await?;
            if redeemed.rows_affected() == 0 {
                db_tx.rollback().await?;
                return Err(StoreError::CouponConsumed);
            }
        }

        for ticket in tickets {
            sqlx::query(
                r#"
                INSERT INTO tickets (
                    id, transaction_id, attendee_name, attendee_email,
                    qr_token, checked_in, checked_in_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(ticket.id)
            .bind(ticket.transaction_id)
            .bind(&ticket.attendee_name)
            .bind(&ticket.attendee_email)
            .bind(&ticket.qr_token)
            .bind(ticket.checked_in)
            .bind(ticket.checked_in_at)
            .execute(&mut *db_tx)
            .await?;
        }

        if let Some(entry) = points_debit {
            sqlx::query(
                r#"
                INSERT INTO points_ledger (id, user_id, amount, reason, expires_at, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(entry.id)
            .bind(entry.user_id)
            .bind(entry.amount)
            .bind(entry.reason.as_str())
            .bind(entry.expires_at)
            .bind(entry.created_at)
            .execute(&mut *db_tx)
            .await?;
        }

        db_tx.commit().await?;
        Ok(confirmed)
    }

    async fn commit_rejection(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<Transaction> {
        let mut db_tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, TransactionRow>(
            "UPDATE transactions SET status = 'REJECTED', rejected_at = $2 \
             WHERE id = $1 AND status = 'WAITING_CONFIRMATION' \
             RETURNING *",
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&mut *db_tx)
        .await?;

        let rejected = match row {
            Some(raw) => raw.into_domain()?,
            None => {
                db_tx.rollback().await?;
                return Err(self
                    .classify_loss(id, TransactionStatus::WaitingConfirmation, None)
                    .await);
            }
        };

        release_seats(&mut db_tx, rejected.ticket_type_id, rejected.quantity).await?;
        db_tx.commit().await?;
        Ok(rejected)
    }

    async fn commit_cancellation(&self, id: Uuid, _now: DateTime<Utc>) -> StoreResult<Transaction> {
        let mut db_tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, TransactionRow>(
            "UPDATE transactions SET status = 'CANCELLED' \
             WHERE id = $1 AND status = 'WAITING_PAYMENT' \
             RETURNING *",
        )
        .bind(id)
        .fetch_optional(&mut *db_tx)
        .await?;

        let cancelled = match row {
            Some(raw) => raw.into_domain()?,
            None => {
                db_tx.rollback().await?;
                return Err(self
                    .classify_loss(id, TransactionStatus::WaitingPayment, None)
                    .await);
            }
        };

        release_seats(&mut db_tx, cancelled.ticket_type_id, cancelled.quantity).await?;
        db_tx.commit().await?;
        Ok(cancelled)
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> StoreResult<Vec<Transaction>> {
        let mut db_tx = self.pool.begin().await?;

        let rows = sqlx::query_as::<_, TransactionRow>(
            "UPDATE transactions SET status = 'EXPIRED' \
             WHERE status = 'WAITING_PAYMENT' AND expired_at < $1 \
             RETURNING *",
        )
        .bind(now)
        .fetch_all(&mut *db_tx)
        .await?;

        let mut swept = Vec::with_capacity(rows.len());
        for raw in rows {
            let tx = raw.into_domain()?;
            release_seats(&mut db_tx, tx.ticket_type_id, tx.quantity).await?;
            swept.push(tx);
        }

        db_tx.commit().await?;
        Ok(swept)
    }

    async fn tickets_for(&self, transaction_id: Uuid) -> StoreResult<Vec<Ticket>> {
        let rows = sqlx::query_as::<_, TicketRow>(
            "SELECT * FROM tickets WHERE transaction_id = $1",
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(TicketRow::into_domain).collect())
    }

    async fn mark_checked_in(
        &self,
        qr_token: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<CheckInRecord> {
        // First scanner wins the conditional update; everyone else falls
        // through to the plain read.
        let won = sqlx::query_as::<_, TicketRow>(
            "UPDATE tickets SET checked_in = TRUE, checked_in_at = $2 \
             WHERE qr_token = $1 AND checked_in = FALSE \
             RETURNING *",
        )
        .bind(qr_token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        let (ticket, first_use) = match won {
            Some(raw) => (raw.into_domain(), true),
            None => {
                let raw = sqlx::query_as::<_, TicketRow>(
                    "SELECT * FROM tickets WHERE qr_token = $1",
                )
                .bind(qr_token)
                .fetch_optional(&self.pool)
                .await?
                .ok_or(StoreError::TokenNotFound)?;
                (raw.into_domain(), false)
            }
        };

        let event_id: Uuid = sqlx::query_scalar("SELECT event_id FROM transactions WHERE id = $1")
            .bind(ticket.transaction_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(CheckInRecord { ticket, event_id, first_use })
    }

    async fn insert_ticket_type(&self, ticket_type: &TicketType) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ticket_types (id, event_id, name, unit_price, total_seats, seats_remaining)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(ticket_type.id)
        .bind(ticket_type.event_id)
        .bind(&ticket_type.name)
        .bind(ticket_type.unit_price)
        .bind(ticket_type.total_seats)
        .bind(ticket_type.seats_remaining)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_voucher(&self, voucher: &Voucher) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO vouchers (
                code, event_id, discount_type, discount_amount,
                usage_limit, used_count, valid_from, valid_until
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&voucher.code)
        .bind(voucher.event_id)
        .bind(voucher.discount_type.as_str())
        .bind(voucher.discount_amount)
        .bind(voucher.usage_limit)
        .bind(voucher.used_count)
        .bind(voucher.valid_from)
        .bind(voucher.valid_until)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_coupon(&self, coupon: &Coupon) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO coupons (code, owner_id, discount_amount, expires_at, redeemed_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&coupon.code)
        .bind(coupon.owner_id)
        .bind(coupon.discount_amount)
        .bind(coupon.expires_at)
        .bind(coupon.redeemed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_points_entry(&self, entry: &PointsLedgerEntry) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO points_ledger (id, user_id, amount, reason, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.id)
        .bind(entry.user_id)
        .bind(entry.amount)
        .bind(entry.reason.as_str())
        .bind(entry.expires_at)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

async fn release_seats(
    db_tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ticket_type_id: Uuid,
    quantity: i32,
) -> StoreResult<()> {
    sqlx::query(
        "UPDATE ticket_types \
         SET seats_remaining = LEAST(seats_remaining + $2, total_seats) \
         WHERE id = $1",
    )
    .bind(ticket_type_id)
    .bind(quantity)
    .execute(&mut **db_tx)
    .await?;
    Ok(())
}

fn attendees_json(attendees: &[Attendee]) -> StoreResult<serde_json::Value> {
    serde_json::to_value(attendees)
        .map_err(|e| StoreError::Database(sqlx::Error::Decode(Box::new(e))))
}

fn decode_err(msg: String) -> StoreError {
    StoreError::Database(sqlx::Error::Decode(msg.into()))
}

/// Internal row types for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    buyer_id: Uuid,
    event_id: Uuid,
    ticket_type_id: Uuid,
    quantity: i32,
    unit_price: i64,
    subtotal: i64,
    voucher_code: Option<String>,
    coupon_code: Option<String>,
    points_used: i64,
    final_price: i64,
    status: String,
    attendees: serde_json::Value,
    payment_proof: Option<String>,
    created_at: DateTime<Utc>,
    expired_at: DateTime<Utc>,
    confirmed_at: Option<DateTime<Utc>>,
    rejected_at: Option<DateTime<Utc>>,
}

impl TransactionRow {
    fn into_domain(self) -> StoreResult<Transaction> {
        let status = TransactionStatus::parse(&self.status)
            .ok_or_else(|| decode_err(format!("unknown transaction status '{}'", self.status)))?;
        let attendees: Vec<Attendee> = serde_json::from_value(self.attendees)
            .map_err(|e| decode_err(format!("bad attendees payload: {e}")))?;
        Ok(Transaction {
            id: self.id,
            buyer_id: self.buyer_id,
            event_id: self.event_id,
            ticket_type_id: self.ticket_type_id,
            quantity: self.quantity,
            unit_price: self.unit_price,
            subtotal: self.subtotal,
            voucher_code: self.voucher_code,
            coupon_code: self.coupon_code,
            points_used: self.points_used,
            final_price: self.final_price,
            status,
            attendees,
            payment_proof: self.payment_proof,
            created_at: self.created_at,
            expired_at: self.expired_at,
            confirmed_at: self.confirmed_at,
            rejected_at: self.rejected_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TicketTypeRow {
    id: Uuid,
    event_id: Uuid,
    name: String,
    unit_price: i64,
    total_seats: i32,
    seats_remaining: i32,
}

impl TicketTypeRow {
    fn into_domain(self) -> TicketType {
        TicketType {
            id: self.id,
            event_id: self.event_id,
            name: self.name,
            unit_price: self.unit_price,
            total_seats: self.total_seats,
            seats_remaining: self.seats_remaining,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TicketRow {
    id: Uuid,
    transaction_id: Uuid,
    attendee_name: String,
    attendee_email: String,
    qr_token: String,
    checked_in: bool,
    checked_in_at: Option<DateTime<Utc>>,
}

impl TicketRow {
    fn into_domain(self) -> Ticket {
        Ticket {
            id: self.id,
            transaction_id: self.transaction_id,
            attendee_name: self.attendee_name,
            attendee_email: self.attendee_email,
            qr_token: self.qr_token,
            checked_in: self.checked_in,
            checked_in_at: self.checked_in_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VoucherRow {
    code: String,
    event_id: Uuid,
    discount_type: String,
    discount_amount: i64,
    usage_limit: i32,
    used_count: i32,
    valid_from: DateTime<Utc>,
    valid_until: DateTime<Utc>,
}

impl VoucherRow {
    fn into_domain(self) -> StoreResult<Voucher> {
        let discount_type = DiscountType::parse(&self.discount_type)
            .ok_or_else(|| decode_err(format!("unknown discount type '{}'", self.discount_type)))?;
        Ok(Voucher {
            code: self.code,
            event_id: self.event_id,
            discount_type,
            discount_amount: self.discount_amount,
            usage_limit: self.usage_limit,
            used_count: self.used_count,
            valid_from: self.valid_from,
            valid_until: self.valid_until,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CouponRow {
    code: String,
    owner_id: Uuid,
    discount_amount: i64,
    expires_at: DateTime<Utc>,
    redeemed_at: Option<DateTime<Utc>>,
}

impl CouponRow {
    fn into_domain(self) -> Coupon {
        Coupon {
            code: self.code,
            owner_id: self.owner_id,
            discount_amount: self.discount_amount,
            expires_at: self.expires_at,
            redeemed_at: self.redeemed_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PointsRow {
    id: Uuid,
    user_id: Uuid,
    amount: i64,
    reason: String,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl PointsRow {
    fn into_domain(self) -> StoreResult<PointsLedgerEntry> {
        let reason = PointsReason::parse(&self.reason)
            .ok_or_else(|| decode_err(format!("unknown points reason '{}'", self.reason)))?;
        Ok(PointsLedgerEntry {
            id: self.id,
            user_id: self.user_id,
            amount: self.amount,
            reason,
            expires_at: self.expires_at,
            created_at: self.created_at,
        })
    }
}

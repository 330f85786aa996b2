//! Gate check-in.
//!
//! A repeat scan is an expected outcome, not an error: the scanner gets
//! `already_used = true` plus the original check-in metadata so gate
//! staff can see who used the ticket and when.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::ports::LedgerStore;

#[derive(Debug, Clone, Serialize)]
pub struct CheckInResult {
    pub success: bool,
    pub already_used: bool,
    pub ticket_id: Uuid,
    pub attendee_name: String,
    pub event_id: Uuid,
    pub checked_in_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct CheckInService {
    store: Arc<dyn LedgerStore>,
}

impl CheckInService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Resolves a scanned token to exactly one successful check-in. Two
    /// concurrent calls with the same token see exactly one
    /// `success = true`; the store's read-then-mark decides the winner.
    pub async fn check_in(&self, qr_token: &str) -> Result<CheckInResult, AppError> {
        let record = self.store.mark_checked_in(qr_token, Utc::now()).await?;

        if record.first_use {
            info!(ticket_id = %record.ticket.id, event_id = %record.event_id, "ticket checked in");
        } else {
            info!(ticket_id = %record.ticket.id, "repeat scan of used ticket");
        }

        Ok(CheckInResult {
            success: record.first_use,
            already_used: !record.first_use,
            ticket_id: record.ticket.id,
            attendee_name: record.ticket.attendee_name,
            event_id: record.event_id,
            checked_in_at: record.ticket.checked_in_at,
        })
    }
}

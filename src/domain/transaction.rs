//! Transaction domain entity and its state machine.
//! Framework-agnostic representation of a ticket purchase.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a purchase. The four escape/terminal states are
/// immutable once entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    WaitingPayment,
    WaitingConfirmation,
    Done,
    Expired,
    Rejected,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::WaitingPayment => "WAITING_PAYMENT",
            TransactionStatus::WaitingConfirmation => "WAITING_CONFIRMATION",
            TransactionStatus::Done => "DONE",
            TransactionStatus::Expired => "EXPIRED",
            TransactionStatus::Rejected => "REJECTED",
            TransactionStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "WAITING_PAYMENT" => Some(TransactionStatus::WaitingPayment),
            "WAITING_CONFIRMATION" => Some(TransactionStatus::WaitingConfirmation),
            "DONE" => Some(TransactionStatus::Done),
            "EXPIRED" => Some(TransactionStatus::Expired),
            "REJECTED" => Some(TransactionStatus::Rejected),
            "CANCELLED" => Some(TransactionStatus::Cancelled),
            _ => None,
        }
    }

    /// DONE, EXPIRED, REJECTED and CANCELLED admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            TransactionStatus::WaitingPayment | TransactionStatus::WaitingConfirmation
        )
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (WaitingPayment, WaitingConfirmation)
                | (WaitingPayment, Expired)
                | (WaitingPayment, Cancelled)
                | (WaitingConfirmation, Done)
                | (WaitingConfirmation, Rejected)
        )
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A seat category for an event. `seats_remaining` is decremented when a
/// transaction reserves seats and restored on every escape transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketType {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub unit_price: i64,
    pub total_seats: i32,
    pub seats_remaining: i32,
}

/// One attendee slot on a purchase; a Ticket is minted per attendee when
/// the transaction is confirmed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attendee {
    pub name: String,
    pub email: String,
}

/// Domain entity representing a ticket purchase. Owned by the ledger
/// store; mutated only through lifecycle transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub event_id: Uuid,
    pub ticket_type_id: Uuid,
    pub quantity: i32,
    pub unit_price: i64,
    pub subtotal: i64,
    pub voucher_code: Option<String>,
    pub coupon_code: Option<String>,
    pub points_used: i64,
    pub final_price: i64,
    pub status: TransactionStatus,
    pub attendees: Vec<Attendee>,
    pub payment_proof: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
}

impl Transaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        buyer_id: Uuid,
        event_id: Uuid,
        ticket_type: &TicketType,
        quantity: i32,
        attendees: Vec<Attendee>,
        voucher_code: Option<String>,
        coupon_code: Option<String>,
        quote: &super::pricing::Quote,
        payment_window: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            buyer_id,
            event_id,
            ticket_type_id: ticket_type.id,
            quantity,
            unit_price: ticket_type.unit_price,
            subtotal: quote.subtotal,
            voucher_code,
            coupon_code,
            points_used: quote.points_used,
            final_price: quote.final_price,
            status: TransactionStatus::WaitingPayment,
            attendees,
            payment_proof: None,
            created_at: now,
            expired_at: now + payment_window,
            confirmed_at: None,
            rejected_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [TransactionStatus; 6] = [
        TransactionStatus::WaitingPayment,
        TransactionStatus::WaitingConfirmation,
        TransactionStatus::Done,
        TransactionStatus::Expired,
        TransactionStatus::Rejected,
        TransactionStatus::Cancelled,
    ];

    #[test]
    fn terminal_states_admit_no_transitions() {
        use TransactionStatus::*;
        for terminal in [Done, Expired, Rejected, Cancelled] {
            assert!(terminal.is_terminal());
            for next in ALL {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn waiting_payment_transitions() {
        use TransactionStatus::*;
        assert!(WaitingPayment.can_transition_to(WaitingConfirmation));
        assert!(WaitingPayment.can_transition_to(Expired));
        assert!(WaitingPayment.can_transition_to(Cancelled));
        assert!(!WaitingPayment.can_transition_to(Done));
        assert!(!WaitingPayment.can_transition_to(Rejected));
    }

    #[test]
    fn waiting_confirmation_transitions() {
        use TransactionStatus::*;
        assert!(WaitingConfirmation.can_transition_to(Done));
        assert!(WaitingConfirmation.can_transition_to(Rejected));
        assert!(!WaitingConfirmation.can_transition_to(Expired));
        assert!(!WaitingConfirmation.can_transition_to(Cancelled));
        assert!(!WaitingConfirmation.can_transition_to(WaitingPayment));
    }

    #[test]
    fn status_round_trips_through_wire_string() {
        for status in ALL {
            assert_eq!(TransactionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TransactionStatus::parse("PAID"), None);
    }
}

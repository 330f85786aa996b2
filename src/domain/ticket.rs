//! Minted tickets and their check-in tokens.

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A confirmed seat. One row per purchased seat, minted when the owning
/// transaction reaches DONE. The `qr_token` is the sole check-in
/// credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub attendee_name: String,
    pub attendee_email: String,
    pub qr_token: String,
    pub checked_in: bool,
    pub checked_in_at: Option<DateTime<Utc>>,
}

impl Ticket {
    pub fn issue(transaction_id: Uuid, attendee_name: String, attendee_email: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            transaction_id,
            attendee_name,
            attendee_email,
            qr_token: new_qr_token(),
            checked_in: false,
            checked_in_at: None,
        }
    }
}

/// 256 bits from the OS RNG, hex-encoded. A capability, not a derivable
/// identifier.
pub fn new_qr_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_long_and_unique() {
        let a = new_qr_token();
        let b = new_qr_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn issued_tickets_start_unchecked() {
        let t = Ticket::issue(Uuid::new_v4(), "Ada".into(), "ada@example.com".into());
        assert!(!t.checked_in);
        assert!(t.checked_in_at.is_none());
    }
}

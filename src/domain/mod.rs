pub mod coupon;
pub mod points;
pub mod pricing;
pub mod ticket;
pub mod transaction;
pub mod voucher;

pub use coupon::Coupon;
pub use points::{PointsLedgerEntry, PointsReason};
pub use pricing::{PricingError, Quote};
pub use ticket::Ticket;
pub use transaction::{Attendee, TicketType, Transaction, TransactionStatus};
pub use voucher::{DiscountType, Voucher};

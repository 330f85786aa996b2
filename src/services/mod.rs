pub mod checkin;
pub mod lifecycle;
pub mod notifier;
pub mod sweeper;

pub use checkin::{CheckInResult, CheckInService};
pub use lifecycle::{CreateOrder, TransactionLifecycle};
pub use notifier::{LifecycleEvent, LogDispatcher, NotificationDispatcher};
pub use sweeper::run_sweeper;

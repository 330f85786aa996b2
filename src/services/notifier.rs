//! Lifecycle event emission.
//!
//! Delivery mechanics (email, push) live outside this core; the engine
//! only promises well-defined events after each committed transition.

use async_trait::async_trait;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    TransactionConfirmed {
        transaction_id: Uuid,
        buyer_id: Uuid,
        tickets_minted: usize,
    },
    TransactionRejected {
        transaction_id: Uuid,
        buyer_id: Uuid,
    },
    TransactionExpired {
        transaction_id: Uuid,
        buyer_id: Uuid,
    },
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, event: LifecycleEvent);
}

/// Default dispatcher: structured log lines, nothing else.
#[derive(Default, Clone)]
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn dispatch(&self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::TransactionConfirmed { transaction_id, buyer_id, tickets_minted } => {
                tracing::info!(%transaction_id, %buyer_id, tickets_minted, "transaction confirmed");
            }
            LifecycleEvent::TransactionRejected { transaction_id, buyer_id } => {
                tracing::info!(%transaction_id, %buyer_id, "transaction rejected");
            }
            LifecycleEvent::TransactionExpired { transaction_id, buyer_id } => {
                tracing::info!(%transaction_id, %buyer_id, "transaction expired");
            }
        }
    }
}

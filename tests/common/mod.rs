#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use tixcore::adapters::MemoryLedgerStore;
use tixcore::domain::{Attendee, Coupon, DiscountType, TicketType, Voucher};
use tixcore::ports::LedgerStore;
use tixcore::services::{
    CheckInService, CreateOrder, LifecycleEvent, NotificationDispatcher, TransactionLifecycle,
};

/// Dispatcher that records emitted events for assertions.
#[derive(Default, Clone)]
pub struct RecordingDispatcher {
    events: Arc<Mutex<Vec<LifecycleEvent>>>,
}

impl RecordingDispatcher {
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn dispatch(&self, event: LifecycleEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub struct Harness {
    pub store: MemoryLedgerStore,
    pub lifecycle: TransactionLifecycle,
    pub checkin: CheckInService,
    pub dispatcher: RecordingDispatcher,
    pub event_id: Uuid,
    pub ticket_type: TicketType,
}

/// In-memory service stack with one seeded ticket type.
pub async fn harness_with_window(
    seats: i32,
    unit_price: i64,
    payment_window: Duration,
) -> Harness {
    let store = MemoryLedgerStore::new();
    let dispatcher = RecordingDispatcher::default();
    let event_id = Uuid::new_v4();
    let ticket_type = TicketType {
        id: Uuid::new_v4(),
        event_id,
        name: "General Admission".to_string(),
        unit_price,
        total_seats: seats,
        seats_remaining: seats,
    };
    store.insert_ticket_type(&ticket_type).await.unwrap();

    let shared: Arc<dyn LedgerStore> = Arc::new(store.clone());
    let lifecycle = TransactionLifecycle::new(
        shared.clone(),
        Arc::new(dispatcher.clone()),
        payment_window,
    );
    let checkin = CheckInService::new(shared);

    Harness { store, lifecycle, checkin, dispatcher, event_id, ticket_type }
}

pub async fn harness(seats: i32, unit_price: i64) -> Harness {
    harness_with_window(seats, unit_price, Duration::minutes(120)).await
}

pub fn order(harness: &Harness, quantity: i32) -> CreateOrder {
    order_for_buyer(harness, Uuid::new_v4(), quantity)
}

pub fn order_for_buyer(harness: &Harness, buyer_id: Uuid, quantity: i32) -> CreateOrder {
    let attendees = (0..quantity)
        .map(|i| Attendee {
            name: format!("Attendee {i}"),
            email: format!("attendee{i}@example.com"),
        })
        .collect();
    CreateOrder {
        buyer_id,
        ticket_type_id: harness.ticket_type.id,
        quantity,
        attendees,
        voucher_code: None,
        coupon_code: None,
        points_requested: 0,
    }
}

pub fn percentage_voucher(event_id: Uuid, code: &str, percent: i64) -> Voucher {
    Voucher {
        code: code.to_string(),
        event_id,
        discount_type: DiscountType::Percentage,
        discount_amount: percent,
        usage_limit: 10,
        used_count: 0,
        valid_from: Utc::now() - Duration::hours(1),
        valid_until: Utc::now() + Duration::hours(24),
    }
}

pub fn coupon(owner_id: Uuid, code: &str, amount: i64) -> Coupon {
    Coupon {
        code: code.to_string(),
        owner_id,
        discount_amount: amount,
        expires_at: Utc::now() + Duration::days(7),
        redeemed_at: None,
    }
}

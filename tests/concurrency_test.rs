mod common;

use chrono::Duration;

use common::{harness, harness_with_window, order};
use tixcore::domain::TransactionStatus;
use tixcore::error::AppError;
use tixcore::ports::LedgerStore;

#[tokio::test]
async fn last_seat_goes_to_exactly_one_buyer() {
    let h = harness(10, 10_000).await;
    // Burn down to a single remaining seat.
    h.lifecycle.create(h.event_id, order(&h, 9)).await.unwrap();

    let a = {
        let (lifecycle, event_id, o) = (h.lifecycle.clone(), h.event_id, order(&h, 1));
        tokio::spawn(async move { lifecycle.create(event_id, o).await })
    };
    let b = {
        let (lifecycle, event_id, o) = (h.lifecycle.clone(), h.event_id, order(&h, 1));
        tokio::spawn(async move { lifecycle.create(event_id, o).await })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    let wins = results.iter().filter(|r| r.is_ok()).count();
    let out_of_stock = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::OutOfStock)))
        .count();

    assert_eq!(wins, 1);
    assert_eq!(out_of_stock, 1);
    assert_eq!(h.store.ticket_type(h.ticket_type.id).await.unwrap().seats_remaining, 0);
}

#[tokio::test]
async fn seat_count_is_conserved_under_contention() {
    let seats = 5;
    let contenders = 20;
    let h = harness(seats, 10_000).await;

    let mut tasks = Vec::new();
    for _ in 0..contenders {
        let (lifecycle, event_id, o) = (h.lifecycle.clone(), h.event_id, order(&h, 1));
        tasks.push(tokio::spawn(async move { lifecycle.create(event_id, o).await }));
    }

    let mut created = Vec::new();
    let mut rejected = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(tx) => created.push(tx),
            Err(AppError::OutOfStock) => rejected += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(created.len(), seats as usize);
    assert_eq!(rejected, contenders - seats as usize);
    assert_eq!(h.store.ticket_type(h.ticket_type.id).await.unwrap().seats_remaining, 0);

    // Releasing every reservation restores the full inventory, never more.
    for tx in created {
        h.lifecycle.cancel(tx.id).await.unwrap();
    }
    let tt = h.store.ticket_type(h.ticket_type.id).await.unwrap();
    assert_eq!(tt.seats_remaining, seats);
    assert_eq!(tt.total_seats, seats);
}

#[tokio::test]
async fn racing_proof_submissions_have_one_winner() {
    let h = harness(10, 10_000).await;
    let tx = h.lifecycle.create(h.event_id, order(&h, 1)).await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..4 {
        let lifecycle = h.lifecycle.clone();
        let id = tx.id;
        tasks.push(tokio::spawn(async move {
            lifecycle.submit_proof(id, &format!("receipt-{i}")).await
        }));
    }

    let mut wins = 0;
    let mut conflicts = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(tx) => {
                assert_eq!(tx.status, TransactionStatus::WaitingConfirmation);
                wins += 1;
            }
            Err(AppError::InvalidState { current }) => {
                assert_eq!(current, TransactionStatus::WaitingConfirmation);
                conflicts += 1;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(wins, 1);
    assert_eq!(conflicts, 3);
}

#[tokio::test]
async fn proof_and_sweep_racing_at_the_deadline_produce_one_outcome() {
    let h = harness_with_window(10, 10_000, Duration::milliseconds(-1)).await;
    let tx = h.lifecycle.create(h.event_id, order(&h, 1)).await.unwrap();

    let sweeper = {
        let lifecycle = h.lifecycle.clone();
        tokio::spawn(async move { lifecycle.sweep_expired().await })
    };
    let prover = {
        let lifecycle = h.lifecycle.clone();
        let id = tx.id;
        tokio::spawn(async move { lifecycle.submit_proof(id, "at the wire").await })
    };

    let swept = sweeper.await.unwrap().unwrap();
    let proof = prover.await.unwrap();

    // Past the deadline the prover can never win; it must observe why it
    // lost rather than overwrite the sweep, whichever committed first.
    match proof {
        Err(AppError::Expired) => {}
        Err(AppError::InvalidState { current }) => {
            assert_eq!(current, TransactionStatus::Expired)
        }
        other => panic!("proof must lose at the deadline, got {other:?}"),
    }

    // Whether this pass or the next one sweeps it, the row ends EXPIRED.
    if swept.is_empty() {
        h.lifecycle.sweep_expired().await.unwrap();
    }
    assert_eq!(
        h.lifecycle.get(tx.id).await.unwrap().status,
        TransactionStatus::Expired
    );
}

#[tokio::test]
async fn racing_confirm_and_reject_have_one_winner() {
    let h = harness(10, 10_000).await;
    let tx = h.lifecycle.create(h.event_id, order(&h, 1)).await.unwrap();
    h.lifecycle.submit_proof(tx.id, "proof").await.unwrap();

    let confirmer = {
        let lifecycle = h.lifecycle.clone();
        let id = tx.id;
        tokio::spawn(async move { lifecycle.confirm(id).await })
    };
    let rejecter = {
        let lifecycle = h.lifecycle.clone();
        let id = tx.id;
        tokio::spawn(async move { lifecycle.reject(id).await })
    };

    let outcomes = [
        confirmer.await.unwrap().map(|tx| tx.status),
        rejecter.await.unwrap().map(|tx| tx.status),
    ];
    let wins = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1);

    let terminal = h.lifecycle.get(tx.id).await.unwrap().status;
    assert!(terminal == TransactionStatus::Done || terminal == TransactionStatus::Rejected);

    // Seats reflect exactly the winner's effect.
    let tt = h.store.ticket_type(h.ticket_type.id).await.unwrap();
    match terminal {
        TransactionStatus::Done => assert_eq!(tt.seats_remaining, 9),
        TransactionStatus::Rejected => assert_eq!(tt.seats_remaining, 10),
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn concurrent_scans_of_one_ticket_admit_once() {
    let h = harness(10, 10_000).await;
    let tx = h.lifecycle.create(h.event_id, order(&h, 1)).await.unwrap();
    h.lifecycle.submit_proof(tx.id, "proof").await.unwrap();
    h.lifecycle.confirm(tx.id).await.unwrap();
    let token = h.lifecycle.tickets(tx.id).await.unwrap()[0].qr_token.clone();

    let mut scans = Vec::new();
    for _ in 0..8 {
        let checkin = h.checkin.clone();
        let token = token.clone();
        scans.push(tokio::spawn(async move { checkin.check_in(&token).await }));
    }

    let mut results = Vec::new();
    for scan in scans {
        results.push(scan.await.unwrap().unwrap());
    }

    let admitted = results.iter().filter(|r| r.success).count();
    assert_eq!(admitted, 1);
    for r in &results {
        assert_eq!(r.success, !r.already_used);
        // Every scanner sees the same attendee and event metadata.
        assert_eq!(r.attendee_name, results[0].attendee_name);
        assert_eq!(r.event_id, h.event_id);
        assert!(r.checked_in_at.is_some());
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Concurrent checkout tests.
//!
//! Many buyers race for the same ticket pools through one shared
//! [`BoxOffice`]. parking_lot's deadlock detector (enabled through the
//! `deadlock_detection` feature in dev-dependencies) watches the lock graph
//! while they run.

use concert_checkout_rs::{
    BoxOffice, CheckoutError, CheckoutRequest, ConcertDetails, ConcertId, FakePaymentGateway,
    PaymentGateway, TicketCounts,
};
use parking_lot::deadlock;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Starts a background thread that checks for deadlocks every 100ms.
fn start_deadlock_detector() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();

    thread::spawn(move || {
        while running_clone.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(100));
            let deadlocks = deadlock::check_deadlock();
            if !deadlocks.is_empty() {
                eprintln!("\n=== DEADLOCK DETECTED ===");
                for (i, threads) in deadlocks.iter().enumerate() {
                    eprintln!("\nDeadlock #{}", i + 1);
                    for t in threads {
                        eprintln!("Thread ID: {:?}", t.thread_id());
                        eprintln!("Backtrace:\n{:#?}", t.backtrace());
                    }
                }
                panic!("Deadlock detected! See output above for details.");
            }
        }
    });

    running
}

fn stop_deadlock_detector(running: Arc<AtomicBool>) {
    running.store(false, Ordering::SeqCst);
    thread::sleep(Duration::from_millis(150));
}

fn published_concert(box_office: &BoxOffice, title: &str, quantity: usize) -> ConcertId {
    let concert_id = box_office.create_concert(ConcertDetails::new(title, 1000, quantity));
    box_office.publish(concert_id).unwrap();
    concert_id
}

fn buy(
    box_office: &BoxOffice,
    concert_id: ConcertId,
    email: String,
    quantity: usize,
) -> Result<concert_checkout_rs::Order, CheckoutError> {
    let payment_token = box_office.gateway().valid_test_token(None);
    box_office.purchase(&CheckoutRequest {
        concert_id,
        email,
        ticket_quantity: quantity,
        payment_token,
    })
}

#[test]
fn many_buyers_never_oversell_a_concert() {
    let detector = start_deadlock_detector();
    let gateway = Arc::new(FakePaymentGateway::new());
    let box_office = Arc::new(BoxOffice::new(gateway.clone()));
    let concert_id = published_concert(&box_office, "Sold Out Show", 100);

    const NUM_THREADS: usize = 50;
    const ATTEMPTS_PER_THREAD: usize = 10;

    let mut handles = Vec::with_capacity(NUM_THREADS);
    for thread_id in 0..NUM_THREADS {
        let box_office = box_office.clone();
        handles.push(thread::spawn(move || {
            let mut bought = 0;
            for attempt in 0..ATTEMPTS_PER_THREAD {
                let quantity = attempt % 3 + 1;
                let email = format!("buyer{thread_id}@example.com");
                match buy(&box_office, concert_id, email, quantity) {
                    Ok(order) => bought += order.ticket_quantity(),
                    Err(CheckoutError::NotEnoughTickets { .. }) => {}
                    Err(e) => panic!("unexpected checkout error: {e}"),
                }
            }
            bought
        }));
    }

    let bought: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    stop_deadlock_detector(detector);

    assert!(bought <= 100, "oversold: {bought} tickets for a pool of 100");
    assert_eq!(
        box_office.ticket_counts(concert_id).unwrap(),
        TicketCounts {
            available: 100 - bought,
            reserved: 0,
            sold: bought
        }
    );
    assert_eq!(gateway.total_charges(), bought as u64 * 1000);

    let orders = box_office.concert_orders(concert_id);
    let mut seen = HashSet::new();
    for order in &orders {
        for ticket in order.tickets() {
            assert!(seen.insert(ticket.id()), "ticket {} sold twice", ticket.id());
        }
    }
    assert_eq!(seen.len(), bought);
}

#[test]
fn declined_payments_under_contention_release_their_tickets() {
    let detector = start_deadlock_detector();
    let gateway = Arc::new(FakePaymentGateway::new());
    let box_office = Arc::new(BoxOffice::new(gateway.clone()));
    let concert_id = published_concert(&box_office, "Flaky Cards", 30);

    const NUM_THREADS: usize = 20;
    const ATTEMPTS_PER_THREAD: usize = 20;

    let mut handles = Vec::with_capacity(NUM_THREADS);
    for thread_id in 0..NUM_THREADS {
        let box_office = box_office.clone();
        handles.push(thread::spawn(move || {
            for attempt in 0..ATTEMPTS_PER_THREAD {
                let email = format!("buyer{thread_id}@example.com");
                let result = if attempt % 2 == 0 {
                    box_office.purchase(&CheckoutRequest {
                        concert_id,
                        email,
                        ticket_quantity: 1,
                        payment_token: "declined".to_string(),
                    })
                } else {
                    buy(&box_office, concert_id, email, 1)
                };
                match result {
                    Ok(_)
                    | Err(CheckoutError::PaymentFailed)
                    | Err(CheckoutError::NotEnoughTickets { .. }) => {}
                    Err(e) => panic!("unexpected checkout error: {e}"),
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
    stop_deadlock_detector(detector);

    let counts = box_office.ticket_counts(concert_id).unwrap();
    assert_eq!(counts.reserved, 0);
    assert_eq!(counts.total(), 30);
    assert_eq!(gateway.total_charges(), counts.sold as u64 * 1000);
}

#[test]
fn concerts_sell_independently() {
    let detector = start_deadlock_detector();
    let gateway = Arc::new(FakePaymentGateway::new());
    let box_office = Arc::new(BoxOffice::new(gateway.clone()));

    const NUM_CONCERTS: usize = 5;
    const TICKETS_PER_CONCERT: usize = 20;
    const NUM_THREADS: usize = 20;

    let concert_ids: Vec<ConcertId> = (0..NUM_CONCERTS)
        .map(|i| published_concert(&box_office, &format!("Show {i}"), TICKETS_PER_CONCERT))
        .collect();
    let concert_ids = Arc::new(concert_ids);

    let mut handles = Vec::with_capacity(NUM_THREADS);
    for thread_id in 0..NUM_THREADS {
        let box_office = box_office.clone();
        let concert_ids = concert_ids.clone();
        handles.push(thread::spawn(move || {
            // Five single-ticket purchases per concert, spread across threads.
            for i in 0..NUM_CONCERTS {
                let concert_id = concert_ids[(thread_id + i) % NUM_CONCERTS];
                let email = format!("buyer{thread_id}@example.com");
                buy(&box_office, concert_id, email, 1).unwrap();
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
    stop_deadlock_detector(detector);

    for &concert_id in concert_ids.iter() {
        assert_eq!(
            box_office.ticket_counts(concert_id).unwrap(),
            TicketCounts {
                available: 0,
                reserved: 0,
                sold: TICKETS_PER_CONCERT
            }
        );
        assert_eq!(box_office.concert_orders(concert_id).len(), TICKETS_PER_CONCERT);
    }
    assert_eq!(
        gateway.total_charges(),
        (NUM_CONCERTS * TICKETS_PER_CONCERT) as u64 * 1000
    );
}

#[test]
fn cancellations_racing_purchases_keep_counts_consistent() {
    let detector = start_deadlock_detector();
    let gateway = Arc::new(FakePaymentGateway::new());
    let box_office = Arc::new(BoxOffice::new(gateway));
    let concert_id = published_concert(&box_office, "Churn", 10);

    const NUM_THREADS: usize = 16;
    const ROUNDS: usize = 25;

    let mut handles = Vec::with_capacity(NUM_THREADS);
    for thread_id in 0..NUM_THREADS {
        let box_office = box_office.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..ROUNDS {
                let email = format!("buyer{thread_id}@example.com");
                if let Ok(order) = buy(&box_office, concert_id, email, 2) {
                    box_office.cancel_order(order.confirmation_number()).unwrap();
                }
                let counts = box_office.ticket_counts(concert_id).unwrap();
                assert_eq!(counts.total(), 10);
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
    stop_deadlock_detector(detector);

    assert_eq!(
        box_office.ticket_counts(concert_id).unwrap(),
        TicketCounts {
            available: 10,
            reserved: 0,
            sold: 0
        }
    );
    assert!(box_office.concert_orders(concert_id).is_empty());
}

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


//! Ticket reservations.
//!
//! A [`Reservation`] is the in-memory hold a single checkout attempt has on a
//! set of tickets. It ends in exactly one of two ways: [`Reservation::complete`]
//! charges the purchaser and turns the tickets into an [`Order`], or
//! [`Reservation::cancel`] puts them back in the pool.

use crate::base::HoldId;
use crate::concert::Concert;
use crate::error::CheckoutError;
use crate::gateway::PaymentGateway;
use crate::order::{Order, OrderFactory};
use crate::ticket::Ticket;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReservationState {
    Pending,
    /// A charge is in flight; the state lock is not held meanwhile.
    Completing,
    Completed,
    Cancelled,
}

/// Tickets held for one purchaser during checkout.
#[derive(Debug)]
pub struct Reservation {
    concert: Arc<Concert>,
    hold: HoldId,
    tickets: Vec<Ticket>,
    email: String,
    state: Mutex<ReservationState>,
}

impl Reservation {
    pub(crate) fn new(
        concert: Arc<Concert>,
        hold: HoldId,
        tickets: Vec<Ticket>,
        email: &str,
    ) -> Self {
        Self {
            concert,
            hold,
            tickets,
            email: email.to_string(),
            state: Mutex::new(ReservationState::Pending),
        }
    }

    pub fn concert(&self) -> &Arc<Concert> {
        &self.concert
    }

    /// The hold that owns this reservation's tickets on the concert.
    pub fn hold(&self) -> HoldId {
        self.hold
    }

    pub fn tickets(&self) -> &[Ticket] {
        &self.tickets
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Sum of the held tickets' prices, in cents.
    pub fn total_cost(&self) -> u64 {
        self.tickets.iter().map(Ticket::price).sum()
    }

    pub fn is_pending(&self) -> bool {
        *self.state.lock() == ReservationState::Pending
    }

    /// Charges the purchaser and creates the order.
    ///
    /// On error the reservation stays pending and still holds its tickets;
    /// the caller decides whether to [`cancel`](Self::cancel) it. While the
    /// charge is in flight the reservation is neither pending nor closed:
    /// `cancel` does nothing and a second `complete` fails.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::ReservationClosed`] - Already completed or cancelled,
    ///   or another completion is in progress.
    /// - [`CheckoutError::PaymentFailed`] - The gateway declined the charge.
    /// - [`CheckoutError::DuplicateConfirmationNumber`] - The order could not be stored.
    pub fn complete(
        &self,
        gateway: &dyn PaymentGateway,
        payment_token: &str,
        orders: &OrderFactory,
    ) -> Result<Order, CheckoutError> {
        {
            let mut state = self.state.lock();
            if *state != ReservationState::Pending {
                return Err(CheckoutError::ReservationClosed);
            }
            *state = ReservationState::Completing;
        }

        let result = self.charge_and_order(gateway, payment_token, orders);
        *self.state.lock() = match result {
            Ok(_) => ReservationState::Completed,
            Err(_) => ReservationState::Pending,
        };
        result
    }

    fn charge_and_order(
        &self,
        gateway: &dyn PaymentGateway,
        payment_token: &str,
        orders: &OrderFactory,
    ) -> Result<Order, CheckoutError> {
        let destination = self.concert.destination_account();
        let charge = gateway.charge(self.total_cost(), payment_token, destination.as_deref())?;
        orders.for_tickets(&self.concert, self.hold, &self.tickets, &self.email, &charge)
    }

    /// Releases every held ticket back to the pool.
    ///
    /// Only the first call on a pending reservation does anything; returns the
    /// number of tickets released.
    pub fn cancel(&self) -> usize {
        let mut state = self.state.lock();
        if *state != ReservationState::Pending {
            return 0;
        }
        *state = ReservationState::Cancelled;

        let released = self.concert.release(self.hold);
        tracing::debug!(
            concert_id = %self.concert.id(),
            hold = %self.hold,
            released,
            "reservation released"
        );
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::ConcertId;
    use crate::codes::{HashedTicketCodeGenerator, RandomConfirmationNumberGenerator};
    use crate::concert::ConcertDetails;
    use crate::gateway::FakePaymentGateway;
    use crate::order::OrderBook;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    fn concert(price: u64, quantity: usize, destination: Option<&str>) -> Arc<Concert> {
        let mut details = ConcertDetails::new("Gig", price, quantity);
        details.destination_account = destination.map(str::to_string);
        let concert = Arc::new(Concert::new(ConcertId(1), details));
        concert.publish(&AtomicU32::new(1)).unwrap();
        concert
    }

    fn factory() -> OrderFactory {
        OrderFactory::new(
            Arc::new(RandomConfirmationNumberGenerator::default()),
            Arc::new(HashedTicketCodeGenerator::default()),
            Arc::new(OrderBook::new()),
        )
    }

    #[test]
    fn calculating_the_total_cost() {
        let concert = concert(1200, 3, None);
        let reservation = concert.reserve_tickets(3, "john@example.com").unwrap();
        assert_eq!(reservation.total_cost(), 3600);
    }

    #[test]
    fn retrieving_the_tickets_and_email() {
        let concert = concert(1200, 3, None);
        let reservation = concert.reserve_tickets(2, "john@example.com").unwrap();

        assert_eq!(reservation.tickets().len(), 2);
        assert_eq!(reservation.email(), "john@example.com");
        assert!(reservation.is_pending());
    }

    #[test]
    fn reserved_tickets_are_released_when_a_reservation_is_cancelled() {
        let concert = concert(1200, 3, None);
        let reservation = concert.reserve_tickets(3, "john@example.com").unwrap();
        assert_eq!(concert.tickets_remaining(), 0);

        assert_eq!(reservation.cancel(), 3);
        assert_eq!(concert.tickets_remaining(), 3);
        assert!(!reservation.is_pending());
    }

    #[test]
    fn cancelling_twice_does_not_touch_other_reservations() {
        let concert = concert(1200, 3, None);
        let first = concert.reserve_tickets(3, "john@example.com").unwrap();
        first.cancel();

        let second = concert.reserve_tickets(3, "jane@example.com").unwrap();
        assert_eq!(first.cancel(), 0);
        assert_eq!(concert.tickets_remaining(), 0);
        assert!(second.is_pending());
    }

    #[test]
    fn completing_a_reservation() {
        let concert = concert(1200, 3, Some("test_acct_1234"));
        let reservation = concert.reserve_tickets(3, "john@example.com").unwrap();
        let gateway = FakePaymentGateway::new();
        let token = gateway.valid_test_token(None);

        let order = reservation.complete(&gateway, &token, &factory()).unwrap();

        assert_eq!(order.email(), "john@example.com");
        assert_eq!(order.ticket_quantity(), 3);
        assert_eq!(order.amount(), 3600);
        assert_eq!(gateway.total_charges(), 3600);
        assert_eq!(gateway.total_charges_for("test_acct_1234"), 3600);
        assert_eq!(concert.tickets_sold(), 3);
    }

    #[test]
    fn failed_payment_leaves_the_reservation_pending() {
        let concert = concert(1200, 3, None);
        let reservation = concert.reserve_tickets(3, "john@example.com").unwrap();
        let gateway = FakePaymentGateway::new();

        let result = reservation.complete(&gateway, "invalid-payment-token", &factory());

        assert_eq!(result.err(), Some(CheckoutError::PaymentFailed));
        assert!(reservation.is_pending());
        assert_eq!(concert.ticket_counts().reserved, 3);
    }

    #[test]
    fn a_cancelled_reservation_cannot_be_completed() {
        let concert = concert(1200, 3, None);
        let reservation = concert.reserve_tickets(3, "john@example.com").unwrap();
        reservation.cancel();
        let gateway = FakePaymentGateway::new();
        let token = gateway.valid_test_token(None);

        let result = reservation.complete(&gateway, &token, &factory());

        assert_eq!(result.err(), Some(CheckoutError::ReservationClosed));
        assert_eq!(gateway.total_charges(), 0);
    }

    #[test]
    fn cancelling_during_the_charge_does_nothing() {
        let concert = concert(1200, 2, None);
        let reservation = Arc::new(concert.reserve_tickets(2, "john@example.com").unwrap());
        let gateway = FakePaymentGateway::new();
        let released_by_hook = Arc::new(AtomicUsize::new(usize::MAX));
        {
            let reservation = Arc::clone(&reservation);
            let released_by_hook = Arc::clone(&released_by_hook);
            gateway.before_first_charge(move |_| {
                released_by_hook.store(reservation.cancel(), Ordering::SeqCst);
            });
        }

        let token = gateway.valid_test_token(None);
        let order = reservation.complete(&gateway, &token, &factory()).unwrap();

        assert_eq!(released_by_hook.load(Ordering::SeqCst), 0);
        assert_eq!(order.ticket_quantity(), 2);
        assert_eq!(concert.tickets_sold(), 2);
        assert!(!reservation.is_pending());
    }

    #[test]
    fn a_completed_reservation_is_not_charged_twice() {
        let concert = concert(1200, 1, None);
        let reservation = concert.reserve_tickets(1, "john@example.com").unwrap();
        let gateway = FakePaymentGateway::new();
        let factory = factory();

        let token = gateway.valid_test_token(None);
        reservation.complete(&gateway, &token, &factory).unwrap();
        let token = gateway.valid_test_token(None);
        let again = reservation.complete(&gateway, &token, &factory);

        assert_eq!(again.err(), Some(CheckoutError::ReservationClosed));
        assert_eq!(gateway.total_charges(), 1200);
        assert_eq!(reservation.cancel(), 0);
        assert_eq!(concert.tickets_sold(), 1);
    }
}

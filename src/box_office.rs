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


//! The box office: concerts, tickets, orders and checkout.
//!
//! [`BoxOffice::purchase`] runs one checkout attempt:
//!
//! ```text
//! validate -> reserve -> charge -> create order -> done
//!                |          |
//!                |          +-- declined -> release reservation -> PaymentFailed
//!                +-- short -> NotEnoughTickets (nothing charged, nothing to undo)
//! ```
//!
//! # Thread Safety
//!
//! Concerts live in a [`DashMap`] and are handed out as `Arc`s, so no map
//! shard is locked while a checkout waits on the payment gateway. Each
//! concert serializes its own ticket claims; checkouts for different concerts
//! proceed in parallel.

use crate::base::ConcertId;
use crate::codes::{
    ConfirmationNumberGenerator, HashedTicketCodeGenerator, RandomConfirmationNumberGenerator,
    TicketCodeGenerator,
};
use crate::concert::{Concert, ConcertDetails, TicketCounts, cents_to_dollars};
use crate::config::BoxOfficeConfig;
use crate::error::CheckoutError;
use crate::gateway::PaymentGateway;
use crate::order::{Order, OrderBook, OrderFactory};
use crate::reservation::Reservation;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// A customer's request to buy tickets.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutRequest {
    pub concert_id: ConcertId,
    pub email: String,
    pub ticket_quantity: usize,
    pub payment_token: String,
}

impl CheckoutRequest {
    /// Checks the request's shape. Says nothing about ticket availability.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::InvalidEmail`] - Email is empty or malformed.
    /// - [`CheckoutError::InvalidTicketQuantity`] - Quantity is zero.
    /// - [`CheckoutError::MissingPaymentToken`] - Token is empty.
    pub fn validate(&self) -> Result<(), CheckoutError> {
        if !is_valid_email(&self.email) {
            return Err(CheckoutError::InvalidEmail);
        }
        if self.ticket_quantity < 1 {
            return Err(CheckoutError::InvalidTicketQuantity);
        }
        if self.payment_token.trim().is_empty() {
            return Err(CheckoutError::MissingPaymentToken);
        }
        Ok(())
    }
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.contains(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
}

/// Concert inventory and checkout.
pub struct BoxOffice {
    concerts: DashMap<ConcertId, Arc<Concert>>,
    orders: Arc<OrderBook>,
    order_factory: OrderFactory,
    gateway: Arc<dyn PaymentGateway>,
    next_concert_id: AtomicU32,
    next_ticket_id: AtomicU32,
}

impl BoxOffice {
    /// Creates a box office with default code generators.
    pub fn new(gateway: Arc<dyn PaymentGateway>) -> Self {
        Self::with_config(gateway, &BoxOfficeConfig::default())
    }

    pub fn with_config(gateway: Arc<dyn PaymentGateway>, config: &BoxOfficeConfig) -> Self {
        Self::with_generators(
            gateway,
            Arc::new(RandomConfirmationNumberGenerator::new(
                config.confirmation_number_length,
            )),
            Arc::new(HashedTicketCodeGenerator::new(&config.ticket_code_salt)),
        )
    }

    pub fn with_generators(
        gateway: Arc<dyn PaymentGateway>,
        confirmation_numbers: Arc<dyn ConfirmationNumberGenerator>,
        ticket_codes: Arc<dyn TicketCodeGenerator>,
    ) -> Self {
        let orders = Arc::new(OrderBook::new());
        Self {
            concerts: DashMap::new(),
            order_factory: OrderFactory::new(confirmation_numbers, ticket_codes, Arc::clone(&orders)),
            orders,
            gateway,
            next_concert_id: AtomicU32::new(1),
            next_ticket_id: AtomicU32::new(1),
        }
    }

    pub fn gateway(&self) -> &Arc<dyn PaymentGateway> {
        &self.gateway
    }

    /// Adds an unpublished concert.
    pub fn create_concert(&self, details: ConcertDetails) -> ConcertId {
        let id = ConcertId(self.next_concert_id.fetch_add(1, Ordering::Relaxed));
        self.concerts.insert(id, Arc::new(Concert::new(id, details)));
        id
    }

    /// Edits an unpublished concert.
    ///
    /// # Errors
    ///
    /// [`CheckoutError::ConcertNotFound`] or [`CheckoutError::AlreadyPublished`].
    pub fn update_concert(
        &self,
        concert_id: ConcertId,
        details: ConcertDetails,
    ) -> Result<(), CheckoutError> {
        self.concert(concert_id)?.update(details)
    }

    /// Publishes a concert, creating its ticket pool.
    ///
    /// # Errors
    ///
    /// [`CheckoutError::ConcertNotFound`] or [`CheckoutError::AlreadyPublished`].
    pub fn publish(&self, concert_id: ConcertId) -> Result<(), CheckoutError> {
        self.concert(concert_id)?.publish(&self.next_ticket_id)
    }

    /// Looks up a concert whether or not it is published.
    ///
    /// # Errors
    ///
    /// [`CheckoutError::ConcertNotFound`] if no such concert exists.
    pub fn concert(&self, concert_id: ConcertId) -> Result<Arc<Concert>, CheckoutError> {
        self.concerts
            .get(&concert_id)
            .map(|concert| Arc::clone(concert.value()))
            .ok_or(CheckoutError::ConcertNotFound)
    }

    /// Looks up a concert customers can see.
    ///
    /// # Errors
    ///
    /// [`CheckoutError::ConcertNotFound`] if it doesn't exist or isn't published.
    pub fn published_concert(&self, concert_id: ConcertId) -> Result<Arc<Concert>, CheckoutError> {
        let concert = self.concert(concert_id)?;
        if !concert.is_published() {
            return Err(CheckoutError::ConcertNotFound);
        }
        Ok(concert)
    }

    /// Published concerts ordered by id.
    pub fn published_concerts(&self) -> Vec<Arc<Concert>> {
        let mut concerts: Vec<Arc<Concert>> = self
            .concerts
            .iter()
            .filter(|concert| concert.is_published())
            .map(|concert| Arc::clone(concert.value()))
            .collect();
        concerts.sort_by_key(|concert| concert.id());
        concerts
    }

    /// Claims `quantity` tickets of a published concert.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::ConcertNotFound`] - Unknown or unpublished concert.
    /// - [`CheckoutError::NotEnoughTickets`] - Too few tickets available.
    pub fn reserve_tickets(
        &self,
        concert_id: ConcertId,
        quantity: usize,
        email: &str,
    ) -> Result<Reservation, CheckoutError> {
        self.published_concert(concert_id)?
            .reserve_tickets(quantity, email)
    }

    /// Puts a reservation's tickets back in the pool.
    pub fn release(&self, reservation: &Reservation) -> usize {
        reservation.cancel()
    }

    /// Buys tickets: reserve, charge, create the order.
    ///
    /// A declined payment releases the reservation before the error is
    /// returned, so no tickets stay held by a failed checkout.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::ConcertNotFound`] - Unknown or unpublished concert.
    /// - [`CheckoutError::InvalidEmail`], [`CheckoutError::InvalidTicketQuantity`],
    ///   [`CheckoutError::MissingPaymentToken`] - Malformed request.
    /// - [`CheckoutError::NotEnoughTickets`] - Nothing was charged.
    /// - [`CheckoutError::PaymentFailed`] - Tickets were released.
    /// - [`CheckoutError::DuplicateConfirmationNumber`] - Charged, but the order
    ///   could not be stored; tickets were released.
    pub fn purchase(&self, request: &CheckoutRequest) -> Result<Order, CheckoutError> {
        let concert = self.published_concert(request.concert_id)?;
        request.validate()?;

        let reservation = concert.reserve_tickets(request.ticket_quantity, &request.email)?;

        match reservation.complete(
            self.gateway.as_ref(),
            &request.payment_token,
            &self.order_factory,
        ) {
            Ok(order) => Ok(order),
            Err(e) => {
                let released = reservation.cancel();
                tracing::info!(
                    concert_id = %request.concert_id,
                    quantity = request.ticket_quantity,
                    released,
                    "checkout failed: {e}"
                );
                Err(e)
            }
        }
    }

    /// # Errors
    ///
    /// [`CheckoutError::OrderNotFound`] if no order has this confirmation number.
    pub fn find_order(&self, confirmation_number: &str) -> Result<Order, CheckoutError> {
        self.orders.find_by_confirmation_number(confirmation_number)
    }

    /// Cancels an order: its tickets go back on sale and the order is removed.
    ///
    /// The charge is not refunded here.
    ///
    /// # Errors
    ///
    /// [`CheckoutError::OrderNotFound`] if no order has this confirmation number.
    pub fn cancel_order(&self, confirmation_number: &str) -> Result<Order, CheckoutError> {
        let order = self.orders.remove(confirmation_number)?;
        let released = self.concert(order.concert_id())?.unsell(order.id());
        tracing::info!(
            concert_id = %order.concert_id(),
            order_id = %order.id(),
            released,
            "order cancelled"
        );
        Ok(order)
    }

    pub fn has_order_for(&self, concert_id: ConcertId, email: &str) -> bool {
        !self.orders_for(concert_id, email).is_empty()
    }

    /// Orders placed by `email` for a concert, oldest first.
    pub fn orders_for(&self, concert_id: ConcertId, email: &str) -> Vec<Order> {
        self.orders
            .for_concert(concert_id)
            .into_iter()
            .filter(|order| order.email() == email)
            .collect()
    }

    /// All orders for a concert, oldest first.
    pub fn concert_orders(&self, concert_id: ConcertId) -> Vec<Order> {
        self.orders.for_concert(concert_id)
    }

    /// # Errors
    ///
    /// [`CheckoutError::ConcertNotFound`] if no such concert exists.
    pub fn tickets_remaining(&self, concert_id: ConcertId) -> Result<usize, CheckoutError> {
        Ok(self.concert(concert_id)?.tickets_remaining())
    }

    /// # Errors
    ///
    /// [`CheckoutError::ConcertNotFound`] if no such concert exists.
    pub fn ticket_counts(&self, concert_id: ConcertId) -> Result<TicketCounts, CheckoutError> {
        Ok(self.concert(concert_id)?.ticket_counts())
    }

    /// Amount collected by a concert's current orders.
    ///
    /// # Errors
    ///
    /// [`CheckoutError::ConcertNotFound`] if no such concert exists.
    pub fn revenue_in_dollars(&self, concert_id: ConcertId) -> Result<Decimal, CheckoutError> {
        self.concert(concert_id)?;
        let cents = self
            .orders
            .for_concert(concert_id)
            .iter()
            .map(Order::amount)
            .sum();
        Ok(cents_to_dollars(cents))
    }
}

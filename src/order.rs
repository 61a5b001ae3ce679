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


//! Orders, the factory that creates them, and the book that stores them.

use crate::base::{ConcertId, HoldId, OrderId, TicketId};
use crate::charge::Charge;
use crate::codes::{ConfirmationNumberGenerator, TicketCodeGenerator};
use crate::concert::Concert;
use crate::error::CheckoutError;
use crate::ticket::Ticket;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// A ticket as it appears on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderTicket {
    #[serde(skip)]
    id: TicketId,
    code: String,
}

impl OrderTicket {
    pub fn id(&self) -> TicketId {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }
}

/// A paid order.
///
/// Serializes to the customer-facing form:
/// `confirmation_number`, `email`, `amount` and the ticket `code`s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    #[serde(skip)]
    id: OrderId,
    #[serde(skip)]
    concert_id: ConcertId,
    confirmation_number: String,
    email: String,
    amount: u64,
    #[serde(skip)]
    card_last_four: String,
    tickets: Vec<OrderTicket>,
}

impl Order {
    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn concert_id(&self) -> ConcertId {
        self.concert_id
    }

    pub fn confirmation_number(&self) -> &str {
        &self.confirmation_number
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Amount charged, in cents.
    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn card_last_four(&self) -> &str {
        &self.card_last_four
    }

    pub fn tickets(&self) -> &[OrderTicket] {
        &self.tickets
    }

    pub fn ticket_quantity(&self) -> usize {
        self.tickets.len()
    }

    pub fn ticket_codes(&self) -> Vec<&str> {
        self.tickets.iter().map(OrderTicket::code).collect()
    }
}

/// Stored orders, unique by confirmation number.
#[derive(Debug, Default)]
pub struct OrderBook {
    orders: DashMap<String, Order>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self {
            orders: DashMap::new(),
        }
    }

    /// Stores an order.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::DuplicateConfirmationNumber`] if an order with
    /// the same confirmation number is already stored.
    pub fn insert(&self, order: Order) -> Result<(), CheckoutError> {
        // Entry API keeps the uniqueness check and the insert atomic
        match self.orders.entry(order.confirmation_number.clone()) {
            Entry::Occupied(_) => Err(CheckoutError::DuplicateConfirmationNumber),
            Entry::Vacant(entry) => {
                entry.insert(order);
                Ok(())
            }
        }
    }

    /// # Errors
    ///
    /// [`CheckoutError::OrderNotFound`] if no order has this confirmation number.
    pub fn find_by_confirmation_number(
        &self,
        confirmation_number: &str,
    ) -> Result<Order, CheckoutError> {
        self.orders
            .get(confirmation_number)
            .map(|order| order.value().clone())
            .ok_or(CheckoutError::OrderNotFound)
    }

    /// # Errors
    ///
    /// [`CheckoutError::OrderNotFound`] if no order has this confirmation number.
    pub fn remove(&self, confirmation_number: &str) -> Result<Order, CheckoutError> {
        self.orders
            .remove(confirmation_number)
            .map(|(_, order)| order)
            .ok_or(CheckoutError::OrderNotFound)
    }

    /// Orders for a concert, oldest first.
    pub fn for_concert(&self, concert_id: ConcertId) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|order| order.concert_id == concert_id)
            .map(|order| order.value().clone())
            .collect();
        orders.sort_by_key(|order| order.id);
        orders
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

/// Turns reserved tickets and a charge into a stored order.
pub struct OrderFactory {
    confirmation_numbers: Arc<dyn ConfirmationNumberGenerator>,
    ticket_codes: Arc<dyn TicketCodeGenerator>,
    orders: Arc<OrderBook>,
    next_order_id: AtomicU32,
}

impl OrderFactory {
    pub fn new(
        confirmation_numbers: Arc<dyn ConfirmationNumberGenerator>,
        ticket_codes: Arc<dyn TicketCodeGenerator>,
        orders: Arc<OrderBook>,
    ) -> Self {
        Self {
            confirmation_numbers,
            ticket_codes,
            orders,
            next_order_id: AtomicU32::new(1),
        }
    }

    pub fn orders(&self) -> &Arc<OrderBook> {
        &self.orders
    }

    /// Creates and stores an order for `tickets`, which must be reserved on
    /// `concert` by `hold`.
    ///
    /// Each ticket is sold to the new order and given a code. The order's
    /// amount and card come from `charge`.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::NotEnoughTickets`] - A ticket is no longer reserved.
    /// - [`CheckoutError::DuplicateConfirmationNumber`] - The generated number is
    ///   taken; the tickets go back to `hold`, still reserved.
    pub fn for_tickets(
        &self,
        concert: &Concert,
        hold: HoldId,
        tickets: &[Ticket],
        email: &str,
        charge: &Charge,
    ) -> Result<Order, CheckoutError> {
        debug_assert_eq!(
            charge.amount(),
            tickets.iter().map(Ticket::price).sum::<u64>(),
            "Invariant violated: charge does not match ticket prices"
        );

        let order_id = OrderId(self.next_order_id.fetch_add(1, Ordering::Relaxed));
        let confirmation_number = self.confirmation_numbers.generate();
        let ids: Vec<TicketId> = tickets.iter().map(Ticket::id).collect();

        let sold = concert.sell(hold, &ids, order_id, |id| self.ticket_codes.generate_for(id))?;

        let order = Order {
            id: order_id,
            concert_id: concert.id(),
            confirmation_number,
            email: email.to_string(),
            amount: charge.amount(),
            card_last_four: charge.card_last_four().to_string(),
            tickets: sold
                .iter()
                .map(|ticket| OrderTicket {
                    id: ticket.id(),
                    code: ticket.code().unwrap_or_default().to_string(),
                })
                .collect(),
        };

        if let Err(e) = self.orders.insert(order.clone()) {
            concert.return_to_hold(order_id);
            tracing::error!(
                concert_id = %concert.id(),
                %hold,
                amount = charge.amount(),
                "charged but order not stored: {e}"
            );
            return Err(e);
        }

        tracing::info!(
            concert_id = %concert.id(),
            order_id = %order_id,
            tickets = order.ticket_quantity(),
            amount = order.amount,
            "order created"
        );
        Ok(order)
    }
}

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


//! Concerts and their ticket pools.
//!
//! Every concert owns its tickets behind a single [`parking_lot::Mutex`]. All
//! claim, release, sell and unsell transitions happen while that lock is held,
//! so concurrent reservations against one concert are serialized and
//! reservations against different concerts never wait on each other.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::AtomicU32;
//! use concert_checkout_rs::{Concert, ConcertDetails, ConcertId};
//!
//! let concert = Arc::new(Concert::new(ConcertId(1), ConcertDetails::new("Gig", 3250, 3)));
//! concert.publish(&AtomicU32::new(1)).unwrap();
//!
//! let reservation = concert.reserve_tickets(2, "jane@example.com").unwrap();
//! assert_eq!(reservation.total_cost(), 6500);
//! assert_eq!(concert.tickets_remaining(), 1);
//! ```

use crate::base::{ConcertId, HoldId, OrderId, TicketId};
use crate::error::CheckoutError;
use crate::reservation::Reservation;
use crate::ticket::{Ticket, TicketSlot, TicketState};
use chrono::{DateTime, NaiveDateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Editable description of a concert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcertDetails {
    pub title: String,
    pub subtitle: Option<String>,
    pub venue: String,
    pub city: String,
    pub date: NaiveDateTime,
    pub additional_information: Option<String>,
    /// Price per ticket in minor currency units (cents).
    pub ticket_price: u64,
    /// Size of the ticket pool created on publish.
    pub ticket_quantity: usize,
    /// Promoter account credited with the proceeds, if any.
    pub destination_account: Option<String>,
}

impl ConcertDetails {
    /// Minimal details: a title, a price and a pool size.
    pub fn new(title: impl Into<String>, ticket_price: u64, ticket_quantity: usize) -> Self {
        Self {
            title: title.into(),
            subtitle: None,
            venue: String::new(),
            city: String::new(),
            date: NaiveDateTime::default(),
            additional_information: None,
            ticket_price,
            ticket_quantity,
            destination_account: None,
        }
    }
}

/// Ticket totals by state.
///
/// `available + reserved + sold` always equals the pool size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TicketCounts {
    pub available: usize,
    pub reserved: usize,
    pub sold: usize,
}

impl TicketCounts {
    pub fn total(&self) -> usize {
        self.available + self.reserved + self.sold
    }
}

#[derive(Debug)]
struct ConcertData {
    details: ConcertDetails,
    published_at: Option<DateTime<Utc>>,
    /// Kept in creation order, which is also claim order.
    tickets: Vec<TicketSlot>,
    next_hold: u64,
}

impl ConcertData {
    fn assert_invariants(&self) {
        debug_assert!(
            self.published_at.is_some() || self.tickets.is_empty(),
            "Invariant violated: unpublished concert has {} tickets",
            self.tickets.len()
        );
        debug_assert!(
            self.published_at.is_none() || self.tickets.len() == self.details.ticket_quantity,
            "Invariant violated: pool size {} differs from ticket quantity {}",
            self.tickets.len(),
            self.details.ticket_quantity
        );
        debug_assert!(
            self.tickets
                .iter()
                .all(|slot| slot.state() == TicketState::Available || slot.held_by.is_some()),
            "Invariant violated: claimed ticket without a hold"
        );
    }

    fn counts(&self) -> TicketCounts {
        let mut counts = TicketCounts::default();
        for slot in &self.tickets {
            match slot.state() {
                TicketState::Available => counts.available += 1,
                TicketState::Reserved => counts.reserved += 1,
                TicketState::Sold => counts.sold += 1,
            }
        }
        counts
    }

    /// Claims `quantity` available tickets for a new hold, or none at all.
    fn claim(&mut self, quantity: usize) -> Result<(HoldId, Vec<usize>), CheckoutError> {
        let positions: Vec<usize> = self
            .tickets
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.state() == TicketState::Available)
            .map(|(position, _)| position)
            .take(quantity)
            .collect();

        if positions.len() < quantity {
            return Err(CheckoutError::NotEnoughTickets {
                requested: quantity,
                available: positions.len(),
            });
        }

        self.next_hold += 1;
        let hold = HoldId(self.next_hold);
        let now = Utc::now();
        for &position in &positions {
            self.tickets[position].reserve(now, hold);
        }
        Ok((hold, positions))
    }

    fn position_of(&self, ticket_id: TicketId) -> Option<usize> {
        // Ids are allocated in increasing order when the pool is created.
        self.tickets
            .binary_search_by_key(&ticket_id, |slot| slot.id)
            .ok()
    }
}

/// A concert with a fixed ticket pool.
#[derive(Debug)]
pub struct Concert {
    id: ConcertId,
    inner: Mutex<ConcertData>,
}

impl Concert {
    pub fn new(id: ConcertId, details: ConcertDetails) -> Self {
        Self {
            id,
            inner: Mutex::new(ConcertData {
                details,
                published_at: None,
                tickets: Vec::new(),
                next_hold: 0,
            }),
        }
    }

    pub fn id(&self) -> ConcertId {
        self.id
    }

    pub fn details(&self) -> ConcertDetails {
        self.inner.lock().details.clone()
    }

    pub fn title(&self) -> String {
        self.inner.lock().details.title.clone()
    }

    /// Price per ticket in cents.
    pub fn ticket_price(&self) -> u64 {
        self.inner.lock().details.ticket_price
    }

    pub fn destination_account(&self) -> Option<String> {
        self.inner.lock().details.destination_account.clone()
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().published_at
    }

    pub fn is_published(&self) -> bool {
        self.inner.lock().published_at.is_some()
    }

    /// e.g. `December 13, 2026`
    pub fn formatted_date(&self) -> String {
        self.inner.lock().details.date.format("%B %-d, %Y").to_string()
    }

    /// e.g. `8:00pm`
    pub fn formatted_start_time(&self) -> String {
        self.inner.lock().details.date.format("%-I:%M%P").to_string()
    }

    pub fn ticket_price_in_dollars(&self) -> Decimal {
        cents_to_dollars(self.ticket_price())
    }

    /// Replaces the concert's details.
    ///
    /// # Errors
    ///
    /// [`CheckoutError::AlreadyPublished`] once the concert is published; the
    /// price and pool size are frozen from then on.
    pub fn update(&self, details: ConcertDetails) -> Result<(), CheckoutError> {
        let mut data = self.inner.lock();
        if data.published_at.is_some() {
            return Err(CheckoutError::AlreadyPublished);
        }
        data.details = details;
        Ok(())
    }

    /// Publishes the concert and creates its ticket pool.
    ///
    /// Ticket ids are drawn from `next_ticket_id` so they stay unique across
    /// concerts sharing the counter.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::AlreadyPublished`] - The concert was published before.
    /// - [`CheckoutError::TicketIdsExhausted`] - The pool doesn't fit in the
    ///   remaining ticket ids; nothing is published and no ids are used.
    pub fn publish(&self, next_ticket_id: &AtomicU32) -> Result<(), CheckoutError> {
        let mut data = self.inner.lock();
        if data.published_at.is_some() {
            return Err(CheckoutError::AlreadyPublished);
        }

        let quantity = data.details.ticket_quantity;
        let count = u32::try_from(quantity).map_err(|_| CheckoutError::TicketIdsExhausted)?;
        let first = next_ticket_id
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |next| {
                next.checked_add(count)
            })
            .map_err(|_| CheckoutError::TicketIdsExhausted)?;
        data.tickets = (0..count)
            .map(|offset| TicketSlot::new(TicketId(first + offset)))
            .collect();
        data.published_at = Some(Utc::now());
        data.assert_invariants();

        tracing::info!(concert_id = %self.id, tickets = quantity, "concert published");
        Ok(())
    }

    /// Atomically claims `quantity` available tickets for `email`.
    ///
    /// Tickets are taken in creation order. Either exactly `quantity` tickets
    /// move to `Reserved`, or nothing changes.
    ///
    /// # Errors
    ///
    /// [`CheckoutError::NotEnoughTickets`] if fewer than `quantity` tickets are
    /// available at claim time.
    pub fn reserve_tickets(
        self: &Arc<Self>,
        quantity: usize,
        email: &str,
    ) -> Result<Reservation, CheckoutError> {
        let (hold, tickets) = {
            let mut data = self.inner.lock();
            let (hold, positions) = match data.claim(quantity) {
                Ok(claimed) => claimed,
                Err(e) => {
                    tracing::debug!(concert_id = %self.id, quantity, "reservation rejected: {e}");
                    return Err(e);
                }
            };
            let price = data.details.ticket_price;
            let tickets = positions
                .into_iter()
                .map(|position| Ticket::from_slot(&data.tickets[position], self.id, price))
                .collect::<Vec<_>>();
            (hold, tickets)
        };

        tracing::debug!(concert_id = %self.id, %hold, quantity, "tickets reserved");
        Ok(Reservation::new(Arc::clone(self), hold, tickets, email))
    }

    /// Returns every ticket still reserved by `hold` to the pool.
    ///
    /// Tickets the hold no longer owns (sold, or already released) are
    /// skipped, so releasing twice is harmless. Returns how many tickets were
    /// released.
    pub(crate) fn release(&self, hold: HoldId) -> usize {
        let mut data = self.inner.lock();
        let released = data
            .tickets
            .iter_mut()
            .map(|slot| slot.release(hold))
            .filter(|&released| released)
            .count();
        data.assert_invariants();
        released
    }

    /// Marks reserved tickets as sold to `order_id`, assigning each a code.
    ///
    /// All tickets must still be reserved by `hold`; otherwise nothing is sold.
    pub(crate) fn sell(
        &self,
        hold: HoldId,
        ticket_ids: &[TicketId],
        order_id: OrderId,
        code_for: impl Fn(TicketId) -> String,
    ) -> Result<Vec<Ticket>, CheckoutError> {
        let mut data = self.inner.lock();

        let mut positions = Vec::with_capacity(ticket_ids.len());
        for &ticket_id in ticket_ids {
            match data.position_of(ticket_id) {
                Some(position) if data.tickets[position].is_held_by(hold) => {
                    positions.push(position)
                }
                _ => {
                    return Err(CheckoutError::NotEnoughTickets {
                        requested: ticket_ids.len(),
                        available: positions.len(),
                    });
                }
            }
        }

        let price = data.details.ticket_price;
        let sold = positions
            .into_iter()
            .map(|position| {
                let slot = &mut data.tickets[position];
                slot.sell(order_id, code_for(slot.id));
                Ticket::from_slot(slot, self.id, price)
            })
            .collect();
        Ok(sold)
    }

    /// Takes back the tickets of an order that was never stored. They stay
    /// reserved by the hold they were sold from.
    pub(crate) fn return_to_hold(&self, order_id: OrderId) -> usize {
        let mut data = self.inner.lock();
        data.tickets
            .iter_mut()
            .map(|slot| slot.return_to_hold(order_id))
            .filter(|&returned| returned)
            .count()
    }

    /// Returns every ticket sold to `order_id` to the pool.
    pub(crate) fn unsell(&self, order_id: OrderId) -> usize {
        let mut data = self.inner.lock();
        data.tickets
            .iter_mut()
            .map(|slot| slot.unsell(order_id))
            .filter(|&returned| returned)
            .count()
    }

    /// Snapshot of every ticket in the pool.
    pub fn tickets(&self) -> Vec<Ticket> {
        let data = self.inner.lock();
        let price = data.details.ticket_price;
        data.tickets
            .iter()
            .map(|slot| Ticket::from_slot(slot, self.id, price))
            .collect()
    }

    pub fn ticket_counts(&self) -> TicketCounts {
        self.inner.lock().counts()
    }

    pub fn tickets_remaining(&self) -> usize {
        self.ticket_counts().available
    }

    pub fn tickets_sold(&self) -> usize {
        self.ticket_counts().sold
    }

    pub fn total_tickets(&self) -> usize {
        self.inner.lock().tickets.len()
    }

    pub fn is_sold_out(&self) -> bool {
        self.tickets_remaining() == 0
    }

    /// Percentage of the pool that is sold, to two decimal places.
    pub fn percent_sold_out(&self) -> Decimal {
        let counts = self.ticket_counts();
        if counts.total() == 0 {
            return Decimal::ZERO;
        }
        (Decimal::from(counts.sold * 100) / Decimal::from(counts.total())).round_dp(2)
    }
}

pub(crate) fn cents_to_dollars(cents: u64) -> Decimal {
    Decimal::from(cents) / Decimal::ONE_HUNDRED
}

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


//! Ticket state.
//!
//! A ticket's state is derived from two fields, never stored on its own:
//!
//! | `order_id` | `reserved_at` | State |
//! |------------|---------------|-------|
//! | unset | unset | [`TicketState::Available`] |
//! | unset | set | [`TicketState::Reserved`] |
//! | set | any | [`TicketState::Sold`] |
//!
//! Transitions: `Available` → `Reserved` (claim), `Reserved` → `Available`
//! (release), `Reserved` → `Sold` (sell), `Sold` → `Reserved` (order not
//! stored), `Sold` → `Available` (order cancelled).

use crate::base::{ConcertId, HoldId, OrderId, TicketId};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TicketState {
    Available,
    Reserved,
    Sold,
}

/// A slot in a concert's ticket pool.
///
/// Slots are only ever touched while the owning concert's lock is held.
/// `held_by` names the reservation that claimed the slot and stays set
/// while the sale is pending storage, so a failed order can hand the
/// tickets back to the same hold.
#[derive(Debug, Clone)]
pub(crate) struct TicketSlot {
    pub(crate) id: TicketId,
    pub(crate) reserved_at: Option<DateTime<Utc>>,
    pub(crate) held_by: Option<HoldId>,
    pub(crate) order_id: Option<OrderId>,
    pub(crate) code: Option<String>,
}

impl TicketSlot {
    pub(crate) fn new(id: TicketId) -> Self {
        Self {
            id,
            reserved_at: None,
            held_by: None,
            order_id: None,
            code: None,
        }
    }

    pub(crate) fn state(&self) -> TicketState {
        match (self.order_id, self.reserved_at) {
            (Some(_), _) => TicketState::Sold,
            (None, Some(_)) => TicketState::Reserved,
            (None, None) => TicketState::Available,
        }
    }

    /// Returns `true` if the slot is reserved by `hold` and not yet sold.
    pub(crate) fn is_held_by(&self, hold: HoldId) -> bool {
        self.state() == TicketState::Reserved && self.held_by == Some(hold)
    }

    pub(crate) fn reserve(&mut self, at: DateTime<Utc>, hold: HoldId) {
        debug_assert_eq!(self.state(), TicketState::Available);
        self.reserved_at = Some(at);
        self.held_by = Some(hold);
    }

    /// Returns `true` if the slot went back to the pool.
    ///
    /// Only the hold that reserved the slot can release it. Sold tickets are
    /// left alone: a late release must not undo a sale.
    pub(crate) fn release(&mut self, hold: HoldId) -> bool {
        if !self.is_held_by(hold) {
            return false;
        }
        self.reserved_at = None;
        self.held_by = None;
        true
    }

    pub(crate) fn sell(&mut self, order_id: OrderId, code: String) {
        debug_assert_eq!(self.state(), TicketState::Reserved);
        self.order_id = Some(order_id);
        self.code = Some(code);
    }

    /// Undoes a sale that was never stored, leaving the slot reserved by
    /// its original hold.
    pub(crate) fn return_to_hold(&mut self, order_id: OrderId) -> bool {
        if self.order_id != Some(order_id) {
            return false;
        }
        self.order_id = None;
        self.code = None;
        true
    }

    /// Returns `true` if the slot belonged to `order_id` and was returned.
    pub(crate) fn unsell(&mut self, order_id: OrderId) -> bool {
        if self.order_id != Some(order_id) {
            return false;
        }
        self.order_id = None;
        self.reserved_at = None;
        self.held_by = None;
        self.code = None;
        true
    }
}

/// Point-in-time view of a ticket.
///
/// `price` is read from the owning concert when the snapshot is taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ticket {
    id: TicketId,
    concert_id: ConcertId,
    price: u64,
    reserved_at: Option<DateTime<Utc>>,
    order_id: Option<OrderId>,
    code: Option<String>,
}

impl Ticket {
    pub(crate) fn from_slot(slot: &TicketSlot, concert_id: ConcertId, price: u64) -> Self {
        Self {
            id: slot.id,
            concert_id,
            price,
            reserved_at: slot.reserved_at,
            order_id: slot.order_id,
            code: slot.code.clone(),
        }
    }

    pub fn id(&self) -> TicketId {
        self.id
    }

    pub fn concert_id(&self) -> ConcertId {
        self.concert_id
    }

    /// Price in minor currency units (cents).
    pub fn price(&self) -> u64 {
        self.price
    }

    pub fn reserved_at(&self) -> Option<DateTime<Utc>> {
        self.reserved_at
    }

    pub fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn state(&self) -> TicketState {
        match (self.order_id, self.reserved_at) {
            (Some(_), _) => TicketState::Sold,
            (None, Some(_)) => TicketState::Reserved,
            (None, None) => TicketState::Available,
        }
    }
}

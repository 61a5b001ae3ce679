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


//! # Concert Checkout
//!
//! This library sells concert tickets from a fixed inventory: it reserves
//! tickets, charges a payment token, and issues orders with unique ticket
//! codes, without ever selling a ticket twice.
//!
//! ## Core Components
//!
//! - [`BoxOffice`]: Concert store and checkout orchestrator
//! - [`Concert`]: Published event owning a fixed ticket pool
//! - [`Reservation`]: Tickets held for one checkout attempt
//! - [`PaymentGateway`]: Charging capability, with [`FakePaymentGateway`] for tests
//! - [`OrderFactory`]: Turns a reservation and a [`Charge`] into an [`Order`]
//! - [`CheckoutError`]: Error types for checkout failures
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use concert_checkout_rs::{
//!     BoxOffice, CheckoutRequest, ConcertDetails, FakePaymentGateway, PaymentGateway,
//! };
//!
//! let gateway = Arc::new(FakePaymentGateway::new());
//! let box_office = BoxOffice::new(gateway.clone());
//!
//! let concert_id = box_office.create_concert(ConcertDetails::new("The Red Chord", 3250, 3));
//! box_office.publish(concert_id).unwrap();
//!
//! let order = box_office
//!     .purchase(&CheckoutRequest {
//!         concert_id,
//!         email: "john@example.com".to_string(),
//!         ticket_quantity: 3,
//!         payment_token: gateway.valid_test_token(None),
//!     })
//!     .unwrap();
//!
//! assert_eq!(order.amount(), 9750);
//! assert_eq!(gateway.total_charges(), 9750);
//! assert_eq!(box_office.tickets_remaining(concert_id).unwrap(), 0);
//! ```
//!
//! ## Thread Safety
//!
//! Each concert serializes claims on its own ticket pool, so concurrent
//! checkouts for one concert behave as if run one after another, while
//! checkouts for different concerts run in parallel.

mod base;
mod box_office;
mod charge;
mod codes;
pub mod concert;
mod config;
pub mod error;
mod gateway;
mod order;
mod reservation;
mod ticket;

pub use base::{ConcertId, HoldId, OrderId, TicketId};
pub use box_office::{BoxOffice, CheckoutRequest};
pub use charge::{Charge, ChargeLedger};
pub use codes::{
    ConfirmationNumberGenerator, HashedTicketCodeGenerator, RandomConfirmationNumberGenerator,
    TicketCodeGenerator,
};
pub use concert::{Concert, ConcertDetails, TicketCounts};
pub use config::BoxOfficeConfig;
pub use error::CheckoutError;
pub use gateway::{FakePaymentGateway, PaymentGateway, TEST_CARD_NUMBER};
pub use order::{Order, OrderBook, OrderFactory, OrderTicket};
pub use reservation::Reservation;
pub use ticket::{Ticket, TicketState};

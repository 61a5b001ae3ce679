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


//! Error types for ticket reservation and checkout.

use thiserror::Error;

/// Checkout and inventory errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckoutError {
    /// Concert does not exist, or is not published yet
    #[error("concert not found")]
    ConcertNotFound,

    /// No order carries the given confirmation number
    #[error("order not found")]
    OrderNotFound,

    /// Fewer tickets are available than were requested
    #[error("not enough tickets: requested {requested}, available {available}")]
    NotEnoughTickets { requested: usize, available: usize },

    /// Payment gateway declined the charge
    #[error("payment failed")]
    PaymentFailed,

    /// Concert is already published and can no longer be changed
    #[error("concert is already published")]
    AlreadyPublished,

    /// Email is missing or malformed
    #[error("invalid email address")]
    InvalidEmail,

    /// Ticket quantity is below one
    #[error("ticket quantity must be at least 1")]
    InvalidTicketQuantity,

    /// Payment token is missing
    #[error("payment token is required")]
    MissingPaymentToken,

    /// Reservation was already completed or cancelled
    #[error("reservation is no longer pending")]
    ReservationClosed,

    /// Another order already uses the generated confirmation number
    #[error("duplicate confirmation number")]
    DuplicateConfirmationNumber,

    /// Publishing would need more ticket ids than remain
    #[error("ticket ids exhausted")]
    TicketIdsExhausted,
}

impl CheckoutError {
    /// Returns `true` for errors the caller should see as "not found".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ConcertNotFound | Self::OrderNotFound)
    }

    /// Returns `true` for rejected requests (unprocessable input or state).
    ///
    /// Payment failures and inventory shortfalls are reported identically.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotEnoughTickets { .. }
                | Self::PaymentFailed
                | Self::AlreadyPublished
                | Self::InvalidEmail
                | Self::InvalidTicketQuantity
                | Self::MissingPaymentToken
        )
    }
}

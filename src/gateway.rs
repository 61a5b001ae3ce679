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


//! Payment gateway capability.
//!
//! [`PaymentGateway`] is the boundary to whatever captures card payments. The
//! crate ships [`FakePaymentGateway`], an in-memory implementation for tests
//! and local runs that never talks to the network.

use crate::charge::{Charge, ChargeLedger};
use crate::error::CheckoutError;
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::Rng;
use rand::distributions::Alphanumeric;

/// Card number used when a test token is requested without one.
pub const TEST_CARD_NUMBER: &str = "4242424242424242";

/// Charges payment tokens.
///
/// Implementations must be atomic per charge: a failed charge leaves nothing
/// in the gateway's ledger.
pub trait PaymentGateway: Send + Sync {
    /// Charges `amount` cents to `token`, crediting `destination_account` when
    /// the gateway supports split payments.
    ///
    /// # Errors
    ///
    /// [`CheckoutError::PaymentFailed`] if the token is invalid or declined.
    fn charge(
        &self,
        amount: u64,
        token: &str,
        destination_account: Option<&str>,
    ) -> Result<Charge, CheckoutError>;

    /// Returns a token that can be charged once successfully.
    ///
    /// Charges made with it report the last four digits of `card_number`
    /// (or of [`TEST_CARD_NUMBER`]).
    fn valid_test_token(&self, card_number: Option<&str>) -> String;

    /// Runs `callback` and returns the charges it created, newest first.
    fn new_charges_during(&self, callback: &mut dyn FnMut(&dyn PaymentGateway)) -> Vec<Charge>;
}

type Hook = Box<dyn FnOnce(&FakePaymentGateway) + Send>;

/// In-memory payment gateway.
///
/// Tokens minted by [`PaymentGateway::valid_test_token`] are single use; any
/// other token is declined. Successful charges land in the gateway's own
/// [`ChargeLedger`].
pub struct FakePaymentGateway {
    ledger: ChargeLedger,
    /// Outstanding tokens mapped to the card number they stand for.
    tokens: DashMap<String, String>,
    before_first_charge: Mutex<Option<Hook>>,
}

impl FakePaymentGateway {
    pub const TEST_CARD_NUMBER: &'static str = TEST_CARD_NUMBER;

    const TOKEN_LENGTH: usize = 24;

    pub fn new() -> Self {
        Self {
            ledger: ChargeLedger::new(),
            tokens: DashMap::new(),
            before_first_charge: Mutex::new(None),
        }
    }

    /// Registers `callback` to run right before the next charge attempt.
    ///
    /// The callback runs at most once and is cleared before it is invoked,
    /// whether or not the charge that triggered it succeeds. It receives the
    /// gateway, so it may charge (or check out) itself.
    pub fn before_first_charge<F>(&self, callback: F)
    where
        F: FnOnce(&FakePaymentGateway) + Send + 'static,
    {
        *self.before_first_charge.lock() = Some(Box::new(callback));
    }

    pub fn ledger(&self) -> &ChargeLedger {
        &self.ledger
    }

    pub fn total_charges(&self) -> u64 {
        self.ledger.total()
    }

    pub fn total_charges_for(&self, destination_account: &str) -> u64 {
        self.ledger.total_for(destination_account)
    }
}

impl Default for FakePaymentGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl PaymentGateway for FakePaymentGateway {
    fn charge(
        &self,
        amount: u64,
        token: &str,
        destination_account: Option<&str>,
    ) -> Result<Charge, CheckoutError> {
        // Taken out before running so a charge inside the hook can't refire it.
        let hook = self.before_first_charge.lock().take();
        if let Some(hook) = hook {
            hook(self);
        }

        let Some((_, card_number)) = self.tokens.remove(token) else {
            tracing::warn!(amount, "charge declined: unknown payment token");
            return Err(CheckoutError::PaymentFailed);
        };

        let skip = card_number.chars().count().saturating_sub(4);
        let last_four: String = card_number.chars().skip(skip).collect();
        let charge = Charge::new(amount, last_four, destination_account.map(str::to_owned));
        self.ledger.record(charge.clone());

        tracing::info!(amount, destination = ?destination_account, "charge succeeded");
        Ok(charge)
    }

    fn valid_test_token(&self, card_number: Option<&str>) -> String {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(Self::TOKEN_LENGTH)
            .map(char::from)
            .collect();
        let token = format!("fake-tok_{suffix}");
        self.tokens.insert(
            token.clone(),
            card_number.unwrap_or(TEST_CARD_NUMBER).to_string(),
        );
        token
    }

    fn new_charges_during(&self, callback: &mut dyn FnMut(&dyn PaymentGateway)) -> Vec<Charge> {
        let cursor = self.ledger.cursor();
        callback(self);
        self.ledger.since(cursor)
    }
}

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


//! Charges and the ledger that records them.
//!
//! A [`Charge`] describes what a payment gateway actually captured. The
//! [`ChargeLedger`] keeps successful charges in the order they were made so
//! callers can diff it around a block of work.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Result of a successful charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Charge {
    amount: u64,
    card_last_four: String,
    destination_account: Option<String>,
}

impl Charge {
    pub fn new(
        amount: u64,
        card_last_four: impl Into<String>,
        destination_account: Option<String>,
    ) -> Self {
        Self {
            amount,
            card_last_four: card_last_four.into(),
            destination_account,
        }
    }

    /// Amount captured, in cents.
    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn card_last_four(&self) -> &str {
        &self.card_last_four
    }

    /// Account credited with the funds, when the gateway routed them.
    pub fn destination_account(&self) -> Option<&str> {
        self.destination_account.as_deref()
    }
}

/// Append-only record of successful charges.
///
/// Owned by a single gateway instance; nothing is shared between gateways.
#[derive(Debug, Default)]
pub struct ChargeLedger {
    charges: Mutex<Vec<Charge>>,
}

impl ChargeLedger {
    pub fn new() -> Self {
        Self {
            charges: Mutex::new(Vec::new()),
        }
    }

    pub fn record(&self, charge: Charge) {
        self.charges.lock().push(charge);
    }

    /// Position of the next charge to be recorded.
    pub fn cursor(&self) -> usize {
        self.charges.lock().len()
    }

    /// Charges recorded at or after `cursor`, most recent first.
    pub fn since(&self, cursor: usize) -> Vec<Charge> {
        let charges = self.charges.lock();
        charges
            .get(cursor..)
            .unwrap_or_default()
            .iter()
            .rev()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.charges.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.charges.lock().is_empty()
    }

    /// Sum of every recorded charge.
    pub fn total(&self) -> u64 {
        self.charges.lock().iter().map(Charge::amount).sum()
    }

    /// Sum of the charges routed to `destination_account`.
    pub fn total_for(&self, destination_account: &str) -> u64 {
        self.charges
            .lock()
            .iter()
            .filter(|charge| charge.destination_account() == Some(destination_account))
            .map(Charge::amount)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn charge(amount: u64) -> Charge {
        Charge::new(amount, "4242", Some("acct_1".to_string()))
    }

    #[test]
    fn charge_exposes_its_details() {
        let charge = Charge::new(2500, "1234", Some("test_acct_1234".to_string()));
        assert_eq!(charge.amount(), 2500);
        assert_eq!(charge.card_last_four(), "1234");
        assert_eq!(charge.destination_account(), Some("test_acct_1234"));
    }

    #[test]
    fn since_returns_newest_first() {
        let ledger = ChargeLedger::new();
        ledger.record(charge(2000));
        ledger.record(charge(3000));

        let cursor = ledger.cursor();
        ledger.record(charge(4000));
        ledger.record(charge(5000));

        let amounts: Vec<u64> = ledger.since(cursor).iter().map(Charge::amount).collect();
        assert_eq!(amounts, vec![5000, 4000]);
    }

    #[test]
    fn since_past_the_end_is_empty() {
        let ledger = ChargeLedger::new();
        ledger.record(charge(2000));
        assert!(ledger.since(5).is_empty());
        assert!(ledger.since(1).is_empty());
    }

    #[test]
    fn totals_by_destination() {
        let ledger = ChargeLedger::new();
        ledger.record(Charge::new(1000, "4242", Some("acct_a".to_string())));
        ledger.record(Charge::new(2500, "4242", Some("acct_b".to_string())));
        ledger.record(Charge::new(500, "4242", None));

        assert_eq!(ledger.total(), 4000);
        assert_eq!(ledger.total_for("acct_a"), 1000);
        assert_eq!(ledger.total_for("acct_b"), 2500);
        assert_eq!(ledger.total_for("acct_c"), 0);
        assert_eq!(ledger.len(), 3);
    }
}

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


//! Customer-facing identifiers: ticket codes and order confirmation numbers.

use crate::base::TicketId;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Produces the code printed on a ticket.
pub trait TicketCodeGenerator: Send + Sync {
    /// Must return the same code every time it is given the same id.
    fn generate_for(&self, ticket_id: TicketId) -> String;
}

/// Produces order confirmation numbers.
pub trait ConfirmationNumberGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Salted, reversible ticket codes over `A-Z`.
///
/// The id is scrambled with a bijection keyed by the salt and written as a
/// fixed-width base-26 number, so distinct ids always give distinct codes and
/// the codes don't reveal how many tickets exist.
#[derive(Debug, Clone)]
pub struct HashedTicketCodeGenerator {
    key: u32,
}

impl HashedTicketCodeGenerator {
    const ALPHABET: &'static [u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    /// 26^7 > 2^32, so seven letters cover every id.
    const CODE_LENGTH: usize = 7;
    /// Odd, so multiplication modulo 2^32 is invertible.
    const MULTIPLIER: u32 = 0x9E37_79B1;

    pub fn new(salt: &str) -> Self {
        let digest = Sha256::digest(salt.as_bytes());
        let key = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]);
        Self { key }
    }

    fn scramble(&self, value: u32) -> u32 {
        value.wrapping_mul(Self::MULTIPLIER).rotate_left(13) ^ self.key
    }
}

impl Default for HashedTicketCodeGenerator {
    fn default() -> Self {
        Self::new("salt")
    }
}

impl TicketCodeGenerator for HashedTicketCodeGenerator {
    fn generate_for(&self, ticket_id: TicketId) -> String {
        let mut value = self.scramble(ticket_id.0) as u64;
        let mut code = [b'A'; Self::CODE_LENGTH];
        for slot in code.iter_mut().rev() {
            *slot = Self::ALPHABET[(value % 26) as usize];
            value /= 26;
        }
        code.iter().map(|&byte| char::from(byte)).collect()
    }
}

/// Random confirmation numbers drawn from an alphabet without look-alikes.
///
/// `0/O` and `1/I` are left out so numbers survive being read aloud.
#[derive(Debug, Clone)]
pub struct RandomConfirmationNumberGenerator {
    length: usize,
}

impl RandomConfirmationNumberGenerator {
    pub const POOL: &'static [u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
    pub const DEFAULT_LENGTH: usize = 24;

    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl Default for RandomConfirmationNumberGenerator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LENGTH)
    }
}

impl ConfirmationNumberGenerator for RandomConfirmationNumberGenerator {
    fn generate(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..self.length)
            .map(|_| char::from(Self::POOL[rng.gen_range(0..Self::POOL.len())]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ticket_codes_are_at_least_6_characters_long() {
        let generator = HashedTicketCodeGenerator::default();
        assert!(generator.generate_for(TicketId(1)).len() >= 6);
    }

    #[test]
    fn ticket_codes_only_contain_uppercase_letters() {
        let generator = HashedTicketCodeGenerator::default();
        for id in [0, 1, 2, 1_000, u32::MAX] {
            let code = generator.generate_for(TicketId(id));
            assert!(code.chars().all(|c| c.is_ascii_uppercase()), "{code}");
        }
    }

    #[test]
    fn ticket_codes_for_the_same_ticket_id_are_the_same() {
        let generator = HashedTicketCodeGenerator::default();
        assert_eq!(
            generator.generate_for(TicketId(1)),
            generator.generate_for(TicketId(1))
        );
    }

    #[test]
    fn ticket_codes_for_different_ticket_ids_are_different() {
        let generator = HashedTicketCodeGenerator::default();
        let codes: HashSet<String> = (0..10_000)
            .map(|id| generator.generate_for(TicketId(id)))
            .collect();
        assert_eq!(codes.len(), 10_000);
    }

    #[test]
    fn ticket_codes_generated_with_different_salts_are_different() {
        let first = HashedTicketCodeGenerator::new("testsalt1");
        let second = HashedTicketCodeGenerator::new("testsalt2");
        assert_ne!(
            first.generate_for(TicketId(1)),
            second.generate_for(TicketId(1))
        );
    }

    #[test]
    fn confirmation_numbers_are_24_characters_long() {
        let generator = RandomConfirmationNumberGenerator::default();
        assert_eq!(generator.generate().len(), 24);
    }

    #[test]
    fn confirmation_numbers_only_use_unambiguous_characters() {
        let generator = RandomConfirmationNumberGenerator::default();
        let number = generator.generate();
        assert!(
            number
                .bytes()
                .all(|byte| RandomConfirmationNumberGenerator::POOL.contains(&byte))
        );
        assert!(!number.contains(['0', 'O', '1', 'I']));
    }

    #[test]
    fn confirmation_numbers_are_unique() {
        let generator = RandomConfirmationNumberGenerator::default();
        let numbers: HashSet<String> = (0..100).map(|_| generator.generate()).collect();
        assert_eq!(numbers.len(), 100);
    }

    #[test]
    fn confirmation_number_length_is_configurable() {
        let generator = RandomConfirmationNumberGenerator::new(10);
        assert_eq!(generator.generate().len(), 10);
    }
}

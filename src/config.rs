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


//! Box office configuration.

use serde::{Deserialize, Serialize};

/// Settings for the code generators a [`BoxOffice`](crate::BoxOffice) uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoxOfficeConfig {
    /// Salt mixed into ticket codes. Changing it changes every code.
    pub ticket_code_salt: String,
    pub confirmation_number_length: usize,
}

impl Default for BoxOfficeConfig {
    fn default() -> Self {
        Self {
            ticket_code_salt: "salt".to_string(),
            confirmation_number_length: 24,
        }
    }
}

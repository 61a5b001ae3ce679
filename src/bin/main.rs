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


use clap::Parser;
use concert_checkout_rs::{
    BoxOffice, BoxOfficeConfig, CheckoutRequest, ConcertDetails, ConcertId, FakePaymentGateway,
    PaymentGateway,
};
use crossbeam::channel;
use csv::{ReaderBuilder, Trim, Writer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::thread;
use tracing_subscriber::EnvFilter;

/// Box Office - Replay concert and purchase CSV files
///
/// Publishes the concerts listed in the input, then runs every purchase
/// through a pool of concurrent checkout workers against an in-memory
/// payment gateway. Writes one result row per purchase to stdout.
#[derive(Parser, Debug)]
#[command(name = "concert-checkout-rs")]
#[command(about = "Replays concert ticket purchases from a CSV file", long_about = None)]
struct Args {
    /// Path to CSV file with commands
    ///
    /// Expected format: type,concert,email,quantity,price,token
    /// Example: cargo run -- purchases.csv > orders.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Number of concurrent checkout workers
    #[arg(short, long, default_value_t = 4)]
    workers: usize,

    /// Salt mixed into generated ticket codes
    #[arg(long, env = "TICKET_CODE_SALT", default_value = "salt")]
    ticket_code_salt: String,

    /// Length of generated order confirmation numbers
    #[arg(long, env = "CONFIRMATION_NUMBER_LENGTH", default_value_t = 24)]
    confirmation_number_length: usize,
}

impl Args {
    fn config(&self) -> BoxOfficeConfig {
        BoxOfficeConfig {
            ticket_code_salt: self.ticket_code_salt.clone(),
            confirmation_number_length: self.confirmation_number_length,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let results = match replay(BufReader::new(file), &args.config(), args.workers) {
        Ok(results) => results,
        Err(e) => {
            eprintln!("Error processing commands: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = write_results(&results, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `type, concert, email, quantity, price, token`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(rename = "type")]
    command: String,
    concert: String,
    #[serde(default)]
    email: String,
    #[serde(deserialize_with = "csv::invalid_option")]
    quantity: Option<usize>,
    #[serde(deserialize_with = "csv::invalid_option")]
    price: Option<u64>,
    #[serde(default)]
    token: String,
}

/// A purchase waiting for a worker.
#[derive(Debug)]
struct PendingPurchase {
    row: usize,
    concert: String,
    email: String,
    quantity: usize,
    token: String,
}

/// Outcome of one purchase row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseResult {
    row: usize,
    concert: String,
    email: String,
    quantity: usize,
    status: String,
    confirmation_number: String,
    amount: u64,
    tickets: String,
}

/// Replays commands from a CSV reader.
///
/// `publish` rows are applied first, in file order. `purchase` rows then run
/// concurrently on `workers` threads. A purchase token of `valid` is swapped
/// for a fresh gateway test token; anything else is sent as-is and declined.
/// Malformed rows are skipped.
///
/// # CSV Format
///
/// ```csv
/// type,concert,email,quantity,price,token
/// publish,rock-night,,50,3250,
/// purchase,rock-night,john@example.com,3,,valid
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
/// Failed purchases are reported in the results, not as errors.
pub fn replay<R: Read>(
    reader: R,
    config: &BoxOfficeConfig,
    workers: usize,
) -> Result<Vec<PurchaseResult>, csv::Error> {
    let gateway = Arc::new(FakePaymentGateway::new());
    let box_office = BoxOffice::with_config(gateway.clone(), config);
    let mut concerts: HashMap<String, ConcertId> = HashMap::new();
    let mut purchases = Vec::new();

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for (row, result) in rdr.deserialize::<CsvRecord>().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(row, "skipping malformed row: {e}");
                continue;
            }
        };

        match record.command.to_lowercase().as_str() {
            "publish" => {
                let (Some(quantity), Some(price)) = (record.quantity, record.price) else {
                    tracing::warn!(row, "skipping publish without quantity and price");
                    continue;
                };
                if concerts.contains_key(&record.concert) {
                    tracing::warn!(row, concert = %record.concert, "skipping duplicate publish");
                    continue;
                }
                let id = box_office
                    .create_concert(ConcertDetails::new(record.concert.clone(), price, quantity));
                if let Err(e) = box_office.publish(id) {
                    tracing::warn!(row, "skipping publish: {e}");
                    continue;
                }
                concerts.insert(record.concert, id);
            }
            "purchase" => purchases.push(PendingPurchase {
                row,
                concert: record.concert,
                email: record.email,
                quantity: record.quantity.unwrap_or(0),
                token: record.token,
            }),
            other => tracing::warn!(row, command = other, "skipping unknown command"),
        }
    }

    let (sender, receiver) = channel::unbounded::<PendingPurchase>();
    for purchase in purchases {
        // Receiver is alive until the workers below finish.
        let _ = sender.send(purchase);
    }
    drop(sender);

    let mut results: Vec<PurchaseResult> = thread::scope(|scope| {
        let handles: Vec<_> = (0..workers.max(1))
            .map(|_| {
                let receiver = receiver.clone();
                let box_office = &box_office;
                let concerts = &concerts;
                let gateway = &gateway;
                scope.spawn(move || {
                    receiver
                        .iter()
                        .map(|purchase| run_purchase(box_office, gateway, concerts, purchase))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
            })
            .collect()
    });

    results.sort_by_key(|result| result.row);
    Ok(results)
}

fn run_purchase(
    box_office: &BoxOffice,
    gateway: &FakePaymentGateway,
    concerts: &HashMap<String, ConcertId>,
    purchase: PendingPurchase,
) -> PurchaseResult {
    let mut result = PurchaseResult {
        row: purchase.row,
        concert: purchase.concert,
        email: purchase.email,
        quantity: purchase.quantity,
        status: String::new(),
        confirmation_number: String::new(),
        amount: 0,
        tickets: String::new(),
    };

    // Unknown concert labels map to an id no concert uses.
    let concert_id = concerts
        .get(&result.concert)
        .copied()
        .unwrap_or(ConcertId(0));
    let payment_token = if purchase.token.eq_ignore_ascii_case("valid") {
        gateway.valid_test_token(None)
    } else {
        purchase.token
    };

    let request = CheckoutRequest {
        concert_id,
        email: result.email.clone(),
        ticket_quantity: result.quantity,
        payment_token,
    };

    match box_office.purchase(&request) {
        Ok(order) => {
            result.status = "ok".to_string();
            result.confirmation_number = order.confirmation_number().to_string();
            result.amount = order.amount();
            result.tickets = order.ticket_codes().join(" ");
        }
        Err(e) => result.status = e.to_string(),
    }
    result
}

/// Writes purchase results as CSV.
///
/// # CSV Format
///
/// Columns: `row, concert, email, quantity, status, confirmation_number, amount, tickets`
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_results<W: Write>(results: &[PurchaseResult], writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for result in results {
        wtr.serialize(result)?;
    }

    wtr.flush()?;
    Ok(())
}

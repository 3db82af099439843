// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 The coinshop-rs Authors
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
use coinshop_rs::{
    BalanceStore, CatalogItem, Coins, ItemId, MemoryCatalog, MemoryLedger, MemoryStore,
    OpContext, PurchaseEngine, TransferEngine, UserId, STARTING_BALANCE,
};
use csv::{ReaderBuilder, Trim, Writer};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// CoinShop replay tool - apply a CSV of shop operations
///
/// Reads operations from a CSV file, applies them through the transfer and
/// purchase engines, and writes final account balances to stdout.
#[derive(Parser, Debug)]
#[command(name = "coinshop-rs")]
#[command(about = "Replays a CSV of accounts, transfers, and purchases", long_about = None)]
struct Args {
    /// Path to CSV file with operations
    ///
    /// Expected format: op,user,target,amount,note
    /// Example: cargo run -- ops.csv > balances.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
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

    let shop = match replay_operations(BufReader::new(file)) {
        Ok(shop) => shop,
        Err(e) => {
            eprintln!("Error replaying operations: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = write_balances(&shop, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// The capabilities and engines the replay drives.
pub struct Shop {
    pub store: Arc<MemoryStore>,
    pub ledger: Arc<MemoryLedger>,
    pub catalog: Arc<MemoryCatalog>,
    transfers: TransferEngine<MemoryStore, MemoryLedger>,
    purchases: PurchaseEngine<MemoryStore, MemoryLedger, MemoryCatalog>,
}

impl Shop {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(MemoryLedger::new());
        let catalog = Arc::new(MemoryCatalog::new());
        let transfers = TransferEngine::new(Arc::clone(&store), Arc::clone(&ledger));
        let purchases = PurchaseEngine::new(
            Arc::clone(&store),
            Arc::clone(&ledger),
            Arc::clone(&catalog),
        );
        Self {
            store,
            ledger,
            catalog,
            transfers,
            purchases,
        }
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `op, user, target, amount, note`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    op: String,
    #[serde(deserialize_with = "csv::invalid_option")]
    user: Option<i64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    target: Option<i64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    amount: Option<i64>,
    note: Option<String>,
}

/// One parsed shop operation.
#[derive(Debug)]
enum Op {
    /// Create an account; amount is the seed balance.
    Account { user: UserId, seed: Coins },
    /// Register a catalog item; target is the item ID, amount the price.
    Item {
        item: ItemId,
        price: Coins,
        name: String,
    },
    /// Move coins from `user` to `target`.
    Transfer {
        from: UserId,
        to: UserId,
        amount: Coins,
        description: Option<String>,
    },
    /// Buy `amount` units of item `target`.
    Buy {
        user: UserId,
        item: ItemId,
        quantity: u32,
    },
}

impl CsvRecord {
    /// Converts a CSV record to an operation.
    ///
    /// Returns `None` for unknown ops or missing required fields.
    fn into_op(self) -> Option<Op> {
        match self.op.to_lowercase().as_str() {
            "account" => Some(Op::Account {
                user: UserId(self.user?),
                seed: self.amount.unwrap_or(STARTING_BALANCE),
            }),
            "item" => Some(Op::Item {
                item: ItemId(self.target?),
                price: self.amount?,
                name: self.note.unwrap_or_default(),
            }),
            "transfer" => Some(Op::Transfer {
                from: UserId(self.user?),
                to: UserId(self.target?),
                amount: self.amount?,
                description: self.note,
            }),
            "buy" => Some(Op::Buy {
                user: UserId(self.user?),
                item: ItemId(self.target?),
                quantity: u32::try_from(self.amount?).ok()?,
            }),
            _ => None,
        }
    }
}

/// Replays operations from a CSV reader.
///
/// Streaming parse; malformed rows and failed operations are skipped so one
/// bad row does not poison the rest of the replay.
///
/// # CSV Format
///
/// Expected columns: `op, user, target, amount, note`
/// - `account,1,,,` creates user 1 with the default 1000-coin seed
/// - `item,,7,20,mug` registers item 7 priced at 20
/// - `transfer,1,2,300,rent` moves 300 coins from user 1 to user 2
/// - `buy,1,7,3,` buys 3 units of item 7 for user 1
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
pub fn replay_operations<R: Read>(reader: R) -> Result<Shop, csv::Error> {
    let shop = Shop::new();
    let ctx = OpContext::new();

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for result in rdr.deserialize::<CsvRecord>() {
        match result {
            Ok(record) => {
                let Some(op) = record.into_op() else {
                    #[cfg(debug_assertions)]
                    eprintln!("Skipping invalid operation record");
                    continue;
                };

                let outcome = match op {
                    Op::Account { user, seed } => shop.store.create_account(user, seed),
                    Op::Item { item, price, name } => shop.catalog.insert(CatalogItem {
                        id: item,
                        name,
                        unit_price: price,
                        description: String::new(),
                    }),
                    Op::Transfer {
                        from,
                        to,
                        amount,
                        description,
                    } => shop.transfers.transfer(&ctx, from, to, amount, description),
                    Op::Buy {
                        user,
                        item,
                        quantity,
                    } => shop.purchases.buy(&ctx, user, item, quantity),
                };

                if let Err(e) = outcome {
                    #[cfg(debug_assertions)]
                    eprintln!("Skipping failed operation: {}", e);
                    #[cfg(not(debug_assertions))]
                    let _ = e;
                }
            }
            Err(e) => {
                #[cfg(debug_assertions)]
                eprintln!("Skipping malformed row: {}", e);
                #[cfg(not(debug_assertions))]
                let _ = e;
                continue;
            }
        }
    }

    Ok(shop)
}

#[derive(Debug, Serialize)]
struct BalanceRow {
    user: UserId,
    balance: Coins,
}

/// Writes final account balances as CSV, sorted by user ID.
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_balances<W: Write>(shop: &Shop, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    let mut accounts = shop.store.accounts();
    accounts.sort_by_key(|account| account.user_id());

    for account in accounts {
        wtr.serialize(BalanceRow {
            user: account.user_id(),
            balance: account.balance(),
        })?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn replay_seeds_accounts_with_default_balance() {
        let csv = "op,user,target,amount,note\naccount,1,,,\n";
        let shop = replay_operations(Cursor::new(csv)).unwrap();

        let ctx = OpContext::new();
        assert_eq!(shop.store.balance(&ctx, UserId(1)).unwrap(), 1000);
    }

    #[test]
    fn replay_transfer_moves_coins() {
        let csv = "op,user,target,amount,note\n\
                   account,1,,,\n\
                   account,2,,,\n\
                   transfer,1,2,300,rent\n";
        let shop = replay_operations(Cursor::new(csv)).unwrap();

        let ctx = OpContext::new();
        assert_eq!(shop.store.balance(&ctx, UserId(1)).unwrap(), 700);
        assert_eq!(shop.store.balance(&ctx, UserId(2)).unwrap(), 1300);
        assert_eq!(shop.ledger.transaction_count(), 1);
    }

    #[test]
    fn replay_buy_debits_and_records() {
        let csv = "op,user,target,amount,note\n\
                   account,1,,,\n\
                   item,,7,100,poster\n\
                   buy,1,7,2,\n";
        let shop = replay_operations(Cursor::new(csv)).unwrap();

        let ctx = OpContext::new();
        assert_eq!(shop.store.balance(&ctx, UserId(1)).unwrap(), 800);
        assert_eq!(shop.ledger.purchase_count(), 1);
    }

    #[test]
    fn replay_skips_failed_and_malformed_rows() {
        let csv = "op,user,target,amount,note\n\
                   account,1,,500,\n\
                   transfer,1,9,100,\n\
                   gibberish,x,y,z,\n\
                   account,2,,,\n";
        let shop = replay_operations(Cursor::new(csv)).unwrap();

        // Transfer to a missing user and the gibberish row are skipped.
        let ctx = OpContext::new();
        assert_eq!(shop.store.balance(&ctx, UserId(1)).unwrap(), 500);
        assert_eq!(shop.store.balance(&ctx, UserId(2)).unwrap(), 1000);
        assert_eq!(shop.ledger.transaction_count(), 0);
    }

    #[test]
    fn replay_with_whitespace() {
        let csv = "op,user,target,amount,note\n account , 1 , , 250 , \n";
        let shop = replay_operations(Cursor::new(csv)).unwrap();

        let ctx = OpContext::new();
        assert_eq!(shop.store.balance(&ctx, UserId(1)).unwrap(), 250);
    }

    #[test]
    fn balances_output_is_sorted_by_user() {
        let csv = "op,user,target,amount,note\n\
                   account,3,,30,\n\
                   account,1,,10,\n\
                   account,2,,20,\n";
        let shop = replay_operations(Cursor::new(csv)).unwrap();

        let mut output = Vec::new();
        write_balances(&shop, &mut output).unwrap();

        let output_str = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = output_str.lines().collect();
        assert_eq!(lines[0], "user,balance");
        assert_eq!(lines[1], "1,10");
        assert_eq!(lines[2], "2,20");
        assert_eq!(lines[3], "3,30");
    }
}

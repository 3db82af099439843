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

//! # CoinShop Core
//!
//! The balance-and-ledger engine for a virtual-currency shop: users hold an
//! integer coin balance, purchase catalog items, and transfer coins to each
//! other. Balances, the purchase ledger, and the transaction ledger stay
//! mutually consistent under concurrent use, including compensation when a
//! multi-step operation partially fails.
//!
//! ## Core Components
//!
//! - [`BalanceStore`] / [`MemoryStore`]: exclusive owner of every balance;
//!   atomic adjust-by-delta with a non-negative-result guarantee
//! - [`LedgerWriter`] / [`MemoryLedger`]: append-only transaction and
//!   purchase records, queryable newest first
//! - [`TransferEngine`]: two-party balance move plus ledger entry as one
//!   atomic unit, deadlock-free via ordered row locking
//! - [`PurchaseEngine`]: price lookup, debit, and purchase record, with a
//!   compensating credit on partial failure
//! - [`OpContext`]: caller-supplied cancellation/deadline signal, honored
//!   up to the commit point of each atomic unit
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use coinshop_rs::{
//!     BalanceStore, MemoryLedger, MemoryStore, OpContext, TransferEngine, UserId,
//!     STARTING_BALANCE,
//! };
//!
//! let store = Arc::new(MemoryStore::new());
//! let ledger = Arc::new(MemoryLedger::new());
//!
//! store.create_account(UserId(1), STARTING_BALANCE).unwrap();
//! store.create_account(UserId(2), STARTING_BALANCE).unwrap();
//!
//! let engine = TransferEngine::new(Arc::clone(&store), Arc::clone(&ledger));
//! let ctx = OpContext::new();
//! engine
//!     .transfer(&ctx, UserId(1), UserId(2), 300, Some("thanks!".into()))
//!     .unwrap();
//!
//! assert_eq!(store.balance(&ctx, UserId(1)).unwrap(), 700);
//! assert_eq!(store.balance(&ctx, UserId(2)).unwrap(), 1300);
//! assert_eq!(ledger.transactions_for_user(UserId(1)).len(), 1);
//! ```
//!
//! ## Known Gap
//!
//! There is no idempotency-key deduplication: a client that retries a
//! transfer after a timeout can move the coins twice. Deduplication, if
//! needed, belongs to the request layer.

pub mod account;
mod base;
pub mod catalog;
mod context;
pub mod error;
pub mod ledger;
mod purchase;
pub mod store;
mod transfer;

pub use account::Account;
pub use base::{Coins, ItemId, RecordId, UserId};
pub use catalog::{Catalog, CatalogItem, MemoryCatalog};
pub use context::OpContext;
pub use error::LedgerError;
pub use ledger::{
    LedgerWriter, MemoryLedger, PurchaseEntry, PurchaseRecord, TransactionEntry,
    TransactionRecord,
};
pub use purchase::PurchaseEngine;
pub use store::{BalanceStore, MemoryStore, STARTING_BALANCE};
pub use transfer::TransferEngine;

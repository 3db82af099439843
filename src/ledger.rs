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

//! Append-only ledger of completed transfers and purchases.
//!
//! The ledger never validates business rules and never mutates an existing
//! record; validation belongs to the engines, and records are the immutable
//! audit trail of operations that committed. Records are queryable by owning
//! user, newest first.

use crate::base::{Coins, ItemId, RecordId, UserId};
use crate::context::OpContext;
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

/// What the transfer engine hands the ledger once both balance legs moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionEntry {
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    pub amount: Coins,
    pub description: Option<String>,
}

/// What the purchase engine hands the ledger once the debit committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurchaseEntry {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub quantity: u32,
}

/// A completed peer-to-peer transfer. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRecord {
    pub id: RecordId,
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    pub amount: Coins,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A completed debit against the catalog. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseRecord {
    pub id: RecordId,
    pub user_id: UserId,
    pub item_id: ItemId,
    pub quantity: u32,
    pub created_at: DateTime<Utc>,
}

/// Storage capability for durable record appends.
///
/// Implementations fail only on underlying storage trouble
/// ([`LedgerError::Storage`]) or pre-commit cancellation.
pub trait LedgerWriter: Send + Sync {
    /// Appends one transaction record and returns its generated ID.
    fn record_transaction(
        &self,
        ctx: &OpContext,
        entry: TransactionEntry,
    ) -> Result<RecordId, LedgerError>;

    /// Appends one purchase record and returns its generated ID.
    fn record_purchase(
        &self,
        ctx: &OpContext,
        entry: PurchaseEntry,
    ) -> Result<RecordId, LedgerError>;
}

/// In-memory [`LedgerWriter`] with the newest-first read path.
///
/// Records live in append-only vectors; the ID of a record is its position
/// in the log, so IDs are dense and creation-ordered.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    transactions: RwLock<Vec<Arc<TransactionRecord>>>,
    purchases: RwLock<Vec<Arc<PurchaseRecord>>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transfers where the user is sender or receiver, newest first.
    pub fn transactions_for_user(&self, user_id: UserId) -> Vec<Arc<TransactionRecord>> {
        self.transactions
            .read()
            .iter()
            .rev()
            .filter(|record| record.from_user_id == user_id || record.to_user_id == user_id)
            .cloned()
            .collect()
    }

    /// Purchases made by the user, newest first.
    pub fn purchases_for_user(&self, user_id: UserId) -> Vec<Arc<PurchaseRecord>> {
        self.purchases
            .read()
            .iter()
            .rev()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn transaction(&self, id: RecordId) -> Option<Arc<TransactionRecord>> {
        let log = self.transactions.read();
        id.0.checked_sub(1)
            .and_then(|index| log.get(index as usize))
            .cloned()
    }

    pub fn purchase(&self, id: RecordId) -> Option<Arc<PurchaseRecord>> {
        let log = self.purchases.read();
        id.0.checked_sub(1)
            .and_then(|index| log.get(index as usize))
            .cloned()
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.read().len()
    }

    pub fn purchase_count(&self) -> usize {
        self.purchases.read().len()
    }
}

impl LedgerWriter for MemoryLedger {
    fn record_transaction(
        &self,
        ctx: &OpContext,
        entry: TransactionEntry,
    ) -> Result<RecordId, LedgerError> {
        ctx.check()?;
        let mut log = self.transactions.write();
        let id = RecordId(log.len() as u64 + 1);
        log.push(Arc::new(TransactionRecord {
            id,
            from_user_id: entry.from_user_id,
            to_user_id: entry.to_user_id,
            amount: entry.amount,
            description: entry.description,
            created_at: Utc::now(),
        }));
        Ok(id)
    }

    fn record_purchase(
        &self,
        ctx: &OpContext,
        entry: PurchaseEntry,
    ) -> Result<RecordId, LedgerError> {
        ctx.check()?;
        let mut log = self.purchases.write();
        let id = RecordId(log.len() as u64 + 1);
        log.push(Arc::new(PurchaseRecord {
            id,
            user_id: entry.user_id,
            item_id: entry.item_id,
            quantity: entry.quantity,
            created_at: Utc::now(),
        }));
        Ok(id)
    }
}

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

//! Purchase engine: price lookup, balance debit, and purchase record.
//!
//! The debit and the record append are not one storage transaction; the
//! engine makes them atomic from the caller's point of view by crediting
//! the cost back whenever the append fails after the debit succeeded.

use crate::base::{Coins, ItemId, UserId};
use crate::catalog::Catalog;
use crate::context::OpContext;
use crate::error::LedgerError;
use crate::ledger::{LedgerWriter, PurchaseEntry};
use crate::store::BalanceStore;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Orchestrates catalog purchases over injected storage capabilities.
pub struct PurchaseEngine<S, L, C> {
    store: Arc<S>,
    ledger: Arc<L>,
    catalog: Arc<C>,
}

impl<S: BalanceStore, L: LedgerWriter, C: Catalog> PurchaseEngine<S, L, C> {
    pub fn new(store: Arc<S>, ledger: Arc<L>, catalog: Arc<C>) -> Self {
        Self {
            store,
            ledger,
            catalog,
        }
    }

    /// Debits the user for `quantity` units of an item and appends one
    /// purchase record.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidQuantity`] - `quantity` is zero, or the total
    ///   cost overflows [`Coins`].
    /// - [`LedgerError::ItemNotFound`] - no such catalog item.
    /// - [`LedgerError::UserNotFound`] - no such account.
    /// - [`LedgerError::InsufficientFunds`] - balance below the total cost,
    ///   checked as part of the atomic debit.
    /// - [`LedgerError::Cancelled`] - the context was cancelled before the
    ///   operation committed; no state change is observable.
    /// - [`LedgerError::TransactionFailed`] - the record append failed after
    ///   the debit; the cost has been credited back, so retrying is safe.
    pub fn buy(
        &self,
        ctx: &OpContext,
        user_id: UserId,
        item_id: ItemId,
        quantity: u32,
    ) -> Result<(), LedgerError> {
        ctx.check()?;
        if quantity == 0 {
            return Err(LedgerError::InvalidQuantity);
        }

        let unit_price = self.catalog.item_price(item_id)?;
        let total_cost: Coins = unit_price
            .checked_mul(Coins::from(quantity))
            .ok_or(LedgerError::InvalidQuantity)?;

        // The sufficiency check happens inside the debit itself; a balance
        // change between a separate check and the debit cannot slip through.
        self.store.adjust(ctx, user_id, -total_cost)?;

        let entry = PurchaseEntry {
            user_id,
            item_id,
            quantity,
        };
        match self.ledger.record_purchase(ctx, entry) {
            Ok(record_id) => {
                debug!(user = %user_id, item = %item_id, quantity, total_cost, %record_id, "purchase committed");
                Ok(())
            }
            Err(append_err) => {
                warn!(
                    user = %user_id,
                    item = %item_id,
                    quantity,
                    total_cost,
                    cause = %append_err,
                    "purchase record append failed, crediting cost back"
                );
                if let Err(comp_err) = self.store.compensate_adjust(user_id, total_cost) {
                    error!(
                        user = %user_id,
                        total_cost,
                        cause = %comp_err,
                        "purchase compensation failed, balance and ledger are inconsistent"
                    );
                }
                if append_err == LedgerError::Cancelled {
                    Err(LedgerError::Cancelled)
                } else {
                    Err(LedgerError::TransactionFailed)
                }
            }
        }
    }
}

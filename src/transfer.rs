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

//! Transfer engine: the two-party balance move plus its ledger entry.
//!
//! An operation runs through three stages: validated, debited, recorded.
//! The balance legs commit as one atomic unit inside the store; if the
//! ledger append then fails, the engine reverses the move before reporting
//! failure, so the caller never observes a transfer that moved coins
//! without leaving a record.

use crate::base::{Coins, UserId};
use crate::context::OpContext;
use crate::error::LedgerError;
use crate::ledger::{LedgerWriter, TransactionEntry};
use crate::store::BalanceStore;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Orchestrates peer-to-peer coin moves over injected storage capabilities.
pub struct TransferEngine<S, L> {
    store: Arc<S>,
    ledger: Arc<L>,
}

impl<S: BalanceStore, L: LedgerWriter> TransferEngine<S, L> {
    pub fn new(store: Arc<S>, ledger: Arc<L>) -> Self {
        Self { store, ledger }
    }

    /// Moves `amount` coins from one user to another and appends one
    /// transaction record.
    ///
    /// Precondition: `from != to`; rejecting self-transfers is the caller's
    /// job. The engine tolerates the degenerate pair without deadlocking.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] - `amount` is zero or negative.
    /// - [`LedgerError::UserNotFound`] - either account is missing.
    /// - [`LedgerError::InsufficientFunds`] - sender cannot cover `amount`,
    ///   checked as part of the atomic debit.
    /// - [`LedgerError::Cancelled`] - the context was cancelled before the
    ///   operation committed; no state change is observable.
    /// - [`LedgerError::TransactionFailed`] - the ledger append failed after
    ///   the balances moved; the move has been reversed, so retrying is safe.
    pub fn transfer(
        &self,
        ctx: &OpContext,
        from: UserId,
        to: UserId,
        amount: Coins,
        description: Option<String>,
    ) -> Result<(), LedgerError> {
        ctx.check()?;
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount);
        }

        // Existence, sufficiency, debit, and credit are one atomic unit
        // under the store's ordered locks.
        self.store.move_funds(ctx, from, to, amount)?;

        let entry = TransactionEntry {
            from_user_id: from,
            to_user_id: to,
            amount,
            description,
        };
        match self.ledger.record_transaction(ctx, entry) {
            Ok(record_id) => {
                debug!(%from, %to, amount, %record_id, "transfer committed");
                Ok(())
            }
            Err(append_err) => {
                warn!(
                    %from,
                    %to,
                    amount,
                    cause = %append_err,
                    "transaction record append failed, reversing balance move"
                );
                // Compensation runs unconditionally; its failure is the one
                // place balances and ledger can diverge, so it must be
                // operator-visible.
                if let Err(comp_err) = self.store.compensate_move(to, from, amount) {
                    error!(
                        %from,
                        %to,
                        amount,
                        cause = %comp_err,
                        "transfer compensation failed, balances and ledger are inconsistent"
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

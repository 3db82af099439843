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

//! Balance store: exclusive owner of every user's coin balance.
//!
//! The [`BalanceStore`] trait is the capability the engines are handed;
//! nothing else in the crate mutates a balance. Adjustments are atomic
//! read-modify-write operations against the stored value, so the
//! insufficient-funds check and the debit are one step, never check-then-act.
//!
//! Cross-account moves lock both accounts in ascending [`UserId`] order.
//! That order is global and independent of transfer direction, which is what
//! keeps two opposing transfers over the same pair of accounts from
//! deadlocking.

use crate::account::Account;
use crate::base::{Coins, UserId};
use crate::context::OpContext;
use crate::error::LedgerError;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

/// Balance granted to every account at creation.
pub const STARTING_BALANCE: Coins = 1000;

/// Storage capability for account balances.
///
/// The normal-path operations take an [`OpContext`] and honor cancellation
/// up to the commit point. The `compensate_*` operations are the dedicated
/// reversal path used after a ledger append fails: they take no context
/// because compensation must be attempted unconditionally, and their errors
/// are escalated by the engines rather than swallowed.
pub trait BalanceStore: Send + Sync {
    /// Creates an account seeded with `starting_balance`.
    fn create_account(&self, user_id: UserId, starting_balance: Coins)
    -> Result<(), LedgerError>;

    /// Returns the current balance.
    fn balance(&self, ctx: &OpContext, user_id: UserId) -> Result<Coins, LedgerError>;

    /// Applies `delta` (positive or negative) to the stored balance as a
    /// single atomic read-modify-write and returns the new balance.
    ///
    /// Fails with [`LedgerError::InsufficientFunds`] if the result would be
    /// negative, leaving the stored value unchanged.
    fn adjust(&self, ctx: &OpContext, user_id: UserId, delta: Coins) -> Result<Coins, LedgerError>;

    /// Moves `amount` from one account to another as one atomic unit:
    /// existence check, sufficiency check, debit, and credit either all take
    /// effect or none do.
    fn move_funds(
        &self,
        ctx: &OpContext,
        from: UserId,
        to: UserId,
        amount: Coins,
    ) -> Result<(), LedgerError>;

    /// Reverses a completed move (compensation path). Same atomicity as
    /// [`BalanceStore::move_funds`], but runs regardless of cancellation.
    fn compensate_move(&self, from: UserId, to: UserId, amount: Coins)
    -> Result<(), LedgerError>;

    /// Credits back a completed debit (compensation path).
    fn compensate_adjust(&self, user_id: UserId, amount: Coins) -> Result<Coins, LedgerError>;
}

/// In-memory [`BalanceStore`] backed by a concurrent map of accounts.
///
/// Accounts are held behind `Arc` so a multi-account unit of work can pin
/// both rows without holding map shard locks while it runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    accounts: DashMap<UserId, Arc<Account>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
        }
    }

    fn account(&self, user_id: UserId) -> Result<Arc<Account>, LedgerError> {
        self.accounts
            .get(&user_id)
            .map(|entry| Arc::clone(&entry))
            .ok_or(LedgerError::UserNotFound)
    }

    pub fn account_exists(&self, user_id: UserId) -> bool {
        self.accounts.contains_key(&user_id)
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    /// Snapshot of all accounts, for reporting.
    pub fn accounts(&self) -> Vec<Arc<Account>> {
        self.accounts
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Sum of all balances. Each account is read atomically; a snapshot
    /// taken while transfers run may interleave between their legs, so only
    /// quiescent sums are meaningful for conservation audits.
    pub fn sum_of_balances(&self) -> Coins {
        self.accounts
            .iter()
            .map(|entry| entry.value().balance())
            .sum()
    }

    /// Shared implementation for the normal and compensating move paths.
    ///
    /// `ctx` is checked after both locks are held and before the first
    /// write, so a cancelled move leaves no partial state. `None` means the
    /// move runs unconditionally (compensation).
    fn locked_move(
        &self,
        ctx: Option<&OpContext>,
        from: UserId,
        to: UserId,
        amount: Coins,
    ) -> Result<(), LedgerError> {
        debug_assert!(amount > 0, "move amount must be validated positive");

        let src = self.account(from)?;
        let dst = self.account(to)?;

        // Degenerate self-move: single lock, net-zero effect, but the
        // sufficiency rule still applies (matches a same-row debit+credit).
        if from == to {
            let guard = src.lock();
            if let Some(ctx) = ctx {
                ctx.check()?;
            }
            if guard.balance() < amount {
                return Err(LedgerError::InsufficientFunds);
            }
            return Ok(());
        }

        // Ascending user-ID order, regardless of which side is the sender.
        let (lo, hi) = if from < to { (&src, &dst) } else { (&dst, &src) };
        let mut lo_guard = lo.lock();
        let mut hi_guard = hi.lock();
        let (src_guard, dst_guard) = if from < to {
            (&mut lo_guard, &mut hi_guard)
        } else {
            (&mut hi_guard, &mut lo_guard)
        };

        if let Some(ctx) = ctx {
            ctx.check()?;
        }

        src_guard.apply(-amount)?;
        if let Err(err) = dst_guard.apply(amount) {
            // Receiver credit can only fail on overflow. Undo the debit
            // while both locks are still held; restoring the just-debited
            // amount cannot fail.
            let restored = src_guard.apply(amount);
            debug_assert!(restored.is_ok());
            return Err(err);
        }
        Ok(())
    }
}

impl BalanceStore for MemoryStore {
    fn create_account(
        &self,
        user_id: UserId,
        starting_balance: Coins,
    ) -> Result<(), LedgerError> {
        if starting_balance < 0 {
            return Err(LedgerError::InvalidAmount);
        }
        // Entry API for atomic check-and-insert under concurrent creation.
        match self.accounts.entry(user_id) {
            Entry::Occupied(_) => Err(LedgerError::UserAlreadyExists),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(Account::new(user_id, starting_balance)));
                Ok(())
            }
        }
    }

    fn balance(&self, ctx: &OpContext, user_id: UserId) -> Result<Coins, LedgerError> {
        ctx.check()?;
        Ok(self.account(user_id)?.balance())
    }

    fn adjust(&self, ctx: &OpContext, user_id: UserId, delta: Coins) -> Result<Coins, LedgerError> {
        let account = self.account(user_id)?;
        let mut guard = account.lock();
        ctx.check()?;
        guard.apply(delta)
    }

    fn move_funds(
        &self,
        ctx: &OpContext,
        from: UserId,
        to: UserId,
        amount: Coins,
    ) -> Result<(), LedgerError> {
        self.locked_move(Some(ctx), from, to, amount)
    }

    fn compensate_move(
        &self,
        from: UserId,
        to: UserId,
        amount: Coins,
    ) -> Result<(), LedgerError> {
        self.locked_move(None, from, to, amount)
    }

    fn compensate_adjust(&self, user_id: UserId, amount: Coins) -> Result<Coins, LedgerError> {
        self.account(user_id)?.apply(amount)
    }
}

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

//! Account state: a user's coin balance behind a per-account mutex.
//!
//! The mutex is the serialization point for all mutation of one balance.
//! Holding it across read-check-write is what makes an adjustment atomic:
//! two concurrent debits can never both observe a balance sufficient for
//! themselves unless it actually covers both.

use crate::base::{Coins, UserId};
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use serde::ser::{Serialize, SerializeStruct, Serializer};

#[derive(Debug)]
pub(crate) struct AccountData {
    user_id: UserId,
    balance: Coins,
    updated_at: DateTime<Utc>,
}

impl AccountData {
    fn new(user_id: UserId, balance: Coins) -> Self {
        Self {
            user_id,
            balance,
            updated_at: Utc::now(),
        }
    }

    pub(crate) fn balance(&self) -> Coins {
        self.balance
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.balance >= 0,
            "Invariant violated: balance of user {} went negative: {}",
            self.user_id,
            self.balance
        );
    }

    /// Applies `delta` (credit if positive, debit if negative) against the
    /// current value. Fails without changing anything if the result would
    /// be negative. Returns the new balance.
    pub(crate) fn apply(&mut self, delta: Coins) -> Result<Coins, LedgerError> {
        let next = self
            .balance
            .checked_add(delta)
            .ok_or(LedgerError::InvalidAmount)?;
        if next < 0 {
            return Err(LedgerError::InsufficientFunds);
        }
        self.balance = next;
        self.updated_at = Utc::now();
        self.assert_invariants();
        Ok(next)
    }
}

/// A user's balance record.
///
/// Mutated only through the balance store; the inner mutex serializes
/// concurrent adjustments to the same account.
#[derive(Debug)]
pub struct Account {
    user_id: UserId,
    inner: Mutex<AccountData>,
}

impl Account {
    pub fn new(user_id: UserId, starting_balance: Coins) -> Self {
        Self {
            user_id,
            inner: Mutex::new(AccountData::new(user_id, starting_balance)),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn balance(&self) -> Coins {
        self.inner.lock().balance
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.inner.lock().updated_at
    }

    /// Exposes the guarded state to the store for multi-account units of
    /// work (a transfer locks two accounts, in ascending user-ID order).
    pub(crate) fn lock(&self) -> MutexGuard<'_, AccountData> {
        self.inner.lock()
    }

    /// Single-account atomic read-modify-write.
    pub(crate) fn apply(&self, delta: Coins) -> Result<Coins, LedgerError> {
        self.inner.lock().apply(delta)
    }
}

impl Serialize for Account {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let data = self.inner.lock();
        let mut state = serializer.serialize_struct("Account", 3)?;
        state.serialize_field("user", &self.user_id)?;
        state.serialize_field("balance", &data.balance)?;
        state.serialize_field("updated_at", &data.updated_at)?;
        state.end()
    }
}

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

//! Error types for balance mutation and ledger operations.

use thiserror::Error;

/// Failure kinds shared by the balance store, the ledger, and both engines.
///
/// The first four variants are precondition failures: they are detected
/// before any mutation and never require compensation. `InsufficientFunds`
/// is raised inside the atomic debit itself. `TransactionFailed` is the only
/// kind that can surface after a balance already moved; by the time the
/// caller sees it, a compensating mutation has been attempted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Transfer amount is zero or negative
    #[error("invalid amount (must be positive)")]
    InvalidAmount,

    /// Purchase quantity is zero, or the total cost is unrepresentable
    #[error("invalid quantity")]
    InvalidQuantity,

    /// No account exists for the given user ID
    #[error("user not found")]
    UserNotFound,

    /// No catalog item exists for the given item ID
    #[error("item not found")]
    ItemNotFound,

    /// The debit would drive the balance below zero
    #[error("insufficient funds")]
    InsufficientFunds,

    /// A storage-level failure after validation passed; any partial balance
    /// change has been compensated, so a retry is safe
    #[error("transaction failed")]
    TransactionFailed,

    /// An account already exists for the given user ID
    #[error("user already exists")]
    UserAlreadyExists,

    /// The caller cancelled the operation, or its deadline passed, before
    /// the atomic unit committed
    #[error("operation cancelled")]
    Cancelled,

    /// Underlying storage failure from a store or ledger implementation
    #[error("storage failure: {0}")]
    Storage(String),
}

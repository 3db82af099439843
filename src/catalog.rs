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

//! Catalog collaborator: read-mostly item and price lookup.
//!
//! The purchase engine only needs a unit price; listing and pagination live
//! outside this crate. Supply is unlimited, so there is no quantity to
//! decrement on purchase.

use crate::base::{Coins, ItemId};
use crate::error::LedgerError;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;

/// An item offered by the shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogItem {
    pub id: ItemId,
    pub name: String,
    pub unit_price: Coins,
    pub description: String,
}

/// Price-lookup capability consumed by the purchase engine.
pub trait Catalog: Send + Sync {
    /// Returns the unit price for an item, or [`LedgerError::ItemNotFound`].
    fn item_price(&self, item_id: ItemId) -> Result<Coins, LedgerError>;
}

/// In-memory [`Catalog`].
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    items: DashMap<ItemId, Arc<CatalogItem>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an item. Prices must be non-negative.
    pub fn insert(&self, item: CatalogItem) -> Result<(), LedgerError> {
        if item.unit_price < 0 {
            return Err(LedgerError::InvalidAmount);
        }
        self.items.insert(item.id, Arc::new(item));
        Ok(())
    }

    pub fn get(&self, item_id: ItemId) -> Option<Arc<CatalogItem>> {
        self.items.get(&item_id).map(|entry| Arc::clone(&entry))
    }
}

impl Catalog for MemoryCatalog {
    fn item_price(&self, item_id: ItemId) -> Result<Coins, LedgerError> {
        self.items
            .get(&item_id)
            .map(|entry| entry.unit_price)
            .ok_or(LedgerError::ItemNotFound)
    }
}

//! Remaining stock per product.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::catalog::Catalog;
use crate::model::{ProductId, SelectionToken};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InventoryError {
    #[error("product '{0}' is not stocked")]
    UnknownProduct(ProductId),
    #[error("product '{0}' is out of stock")]
    Empty(ProductId),
}

/// Mutable stock counts, seeded once from the catalog, plus the slots that
/// have already been emptied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    stock: HashMap<ProductId, u32>,
    retired: HashSet<SelectionToken>,
}

impl Inventory {
    pub fn from_catalog(catalog: &Catalog) -> Self {
        Self {
            stock: catalog
                .stock_table()
                .map(|(id, count)| (id.clone(), count))
                .collect(),
            retired: HashSet::new(),
        }
    }

    /// Units left for `id`; unknown products have none.
    pub fn remaining(&self, id: &str) -> u32 {
        self.stock.get(id).copied().unwrap_or(0)
    }

    pub fn in_stock(&self, id: &str) -> bool {
        self.remaining(id) > 0
    }

    /// Remove exactly one unit, returning how many are left.
    pub fn take_one(&mut self, id: &str) -> Result<u32, InventoryError> {
        let count = self
            .stock
            .get_mut(id)
            .ok_or_else(|| InventoryError::UnknownProduct(id.to_string()))?;

        if *count == 0 {
            return Err(InventoryError::Empty(id.to_string()));
        }

        *count -= 1;
        Ok(*count)
    }

    /// Mark a slot as vended. Returns `false` if it was already retired.
    pub fn retire(&mut self, token: SelectionToken) -> bool {
        self.retired.insert(token)
    }

    pub fn is_retired(&self, token: &SelectionToken) -> bool {
        self.retired.contains(token)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ProductId, u32)> + '_ {
        self.stock.iter().map(|(id, count)| (id, *count))
    }
}

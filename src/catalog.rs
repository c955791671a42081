//! Static product and coin definitions.

use std::collections::HashSet;

use thiserror::Error;

use crate::Cents;
use crate::change::{ChangeCalculator, ChangeError, find_greedy_counterexample};
use crate::model::ProductId;

/// Errors raised while validating a catalog at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog has no coin denominations")]
    NoDenominations,

    #[error("coin denomination of zero cents")]
    ZeroDenomination,

    #[error("duplicate coin denomination {0}")]
    DuplicateDenomination(Cents),

    #[error("duplicate product id '{0}'")]
    DuplicateProduct(ProductId),

    #[error("{value} is not a multiple of the smallest coin {unit}")]
    Indivisible { value: Cents, unit: Cents },

    #[error("greedy change-making is not optimal for {amount} with these denominations")]
    NonCanonical { amount: Cents },

    #[error(transparent)]
    Change(#[from] ChangeError),
}

/// One entry of the product catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: ProductId,
    pub display_name: String,
    pub price: Cents,
}

impl Product {
    pub fn new(id: impl Into<ProductId>, display_name: impl Into<String>, price: Cents) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            price,
        }
    }
}

/// Immutable product list, starting stock and accepted coins.
#[derive(Debug, Clone)]
pub struct Catalog {
    products: Vec<Product>,
    starting_stock: Vec<u32>,
    change: ChangeCalculator,
}

impl Catalog {
    /// Build and validate a catalog.
    ///
    /// Denominations must be non-empty, non-zero and distinct, every price and
    /// coin a multiple of the smallest coin, and the set canonical so greedy
    /// change-making is always exact and minimal.
    pub fn new(
        products: impl IntoIterator<Item = (Product, u32)>,
        denominations: impl IntoIterator<Item = Cents>,
    ) -> Result<Self, CatalogError> {
        let denominations: Vec<Cents> = denominations.into_iter().collect();

        let mut seen = HashSet::new();
        for coin in &denominations {
            if coin.is_zero() {
                return Err(CatalogError::ZeroDenomination);
            }
            if !seen.insert(*coin) {
                return Err(CatalogError::DuplicateDenomination(*coin));
            }
        }

        let unit = denominations
            .iter()
            .copied()
            .min()
            .ok_or(CatalogError::NoDenominations)?;

        if let Some(value) = denominations.iter().find(|d| !d.is_multiple_of(unit)) {
            return Err(CatalogError::Indivisible { value: *value, unit });
        }

        if let Some(amount) = find_greedy_counterexample(&denominations)? {
            return Err(CatalogError::NonCanonical { amount });
        }

        let mut ids = HashSet::new();
        let mut catalog_products = Vec::new();
        let mut starting_stock = Vec::new();
        for (product, stock) in products {
            if !ids.insert(product.id.clone()) {
                return Err(CatalogError::DuplicateProduct(product.id));
            }
            if !product.price.is_multiple_of(unit) {
                return Err(CatalogError::Indivisible {
                    value: product.price,
                    unit,
                });
            }
            catalog_products.push(product);
            starting_stock.push(stock);
        }

        Ok(Self {
            products: catalog_products,
            starting_stock,
            change: ChangeCalculator::new(denominations),
        })
    }

    pub fn product(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    pub fn products(&self) -> impl Iterator<Item = &Product> + '_ {
        self.products.iter()
    }

    /// Number of units loaded for `id` at startup, which is also its slot count.
    pub fn starting_stock(&self, id: &str) -> Option<u32> {
        self.products
            .iter()
            .position(|p| p.id == id)
            .map(|idx| self.starting_stock[idx])
    }

    pub fn stock_table(&self) -> impl Iterator<Item = (&ProductId, u32)> + '_ {
        self.products
            .iter()
            .zip(self.starting_stock.iter().copied())
            .map(|(p, stock)| (&p.id, stock))
    }

    /// Accepted coins, largest first.
    pub fn denominations(&self) -> &[Cents] {
        self.change.denominations()
    }

    pub fn accepts(&self, coin: Cents) -> bool {
        self.denominations().contains(&coin)
    }

    pub fn change_calculator(&self) -> &ChangeCalculator {
        &self.change
    }
}

impl Default for Catalog {
    /// The standard kiosk stock: four parts and five coins.
    fn default() -> Self {
        Self {
            products: vec![
                Product::new("diode", "1N4001 diode", Cents::new(75)),
                Product::new("transistor", "2N3904 BJT", Cents::new(150)),
                Product::new("cap", "0.1uF Capacitor", Cents::new(50)),
                Product::new("res", "10k Resistor", Cents::new(5)),
            ],
            starting_stock: vec![3, 2, 4, 5],
            change: ChangeCalculator::new([5, 10, 25, 100, 200].map(Cents::new)),
        }
    }
}

//! Error types for the kiosk controller and its states.

use thiserror::Error;

use crate::Cents;
use crate::model::ProductId;

/// Setup and wiring errors. These indicate a programming mistake and are
/// expected to surface during startup, never while serving a customer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControllerError {
    #[error("state '{0}' is already registered")]
    DuplicateState(String),

    #[error("no state named '{0}' is registered")]
    UnknownState(String),

    #[error("transient states kept transitioning, last target was '{0}'")]
    TransitionLoop(String),
}

/// Why a product selection was refused. The message is shown to the user.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PurchaseError {
    #[error("{name} out of stock")]
    OutOfStock { name: String },

    #[error("insufficient funds, need {price}")]
    InsufficientFunds { price: Cents, balance: Cents },
}

/// Failures detected on entry to the dispensing phase.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispenseError {
    #[error("no product selected")]
    NoSelection,

    #[error("product '{0}' is not in the catalog")]
    UnknownProduct(ProductId),

    #[error("product '{0}' ran out of stock before dispensing")]
    UnexpectedStockRace(ProductId),

    #[error("balance {balance} does not cover price {price}")]
    InsufficientBalance { balance: Cents, price: Cents },
}

/// Events that do not make sense for this catalog.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("unrecognized coin {0}")]
    UnknownCoin(Cents),

    #[error("unknown product '{0}'")]
    UnknownProduct(ProductId),

    #[error("product '{product}' has no slot {instance}")]
    UnknownSlot { product: ProductId, instance: u32 },

    #[error("slot {instance} of '{product}' is empty")]
    RetiredSlot { product: ProductId, instance: u32 },
}

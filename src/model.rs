//! Core domain types exchanged between the kiosk and its collaborators.

use std::fmt;
use std::time::Duration;

use crate::Cents;

/// Product identifier, e.g. `"diode"`.
pub type ProductId = String;

/// How long the dispense actuator is held high for one unit of product.
pub const DISPENSE_PULSE: Duration = Duration::from_secs(1);

/// Ties an accepted purchase to the physical slot (and UI element) it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectionToken {
    pub product_id: ProductId,
    pub instance_index: u32,
}

impl SelectionToken {
    pub fn new(product_id: impl Into<ProductId>, instance_index: u32) -> Self {
        Self {
            product_id: product_id.into(),
            instance_index,
        }
    }
}

impl fmt::Display for SelectionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.product_id, self.instance_index)
    }
}

/// An input delivered to the controller, one per tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A coin of the given denomination was accepted by the coin mech.
    InsertCoin(Cents),
    /// The user pressed the button for one product slot.
    SelectProduct(SelectionToken),
    /// The user asked for their money back (GUI button or debounced hardware button).
    Return,
    /// Heartbeat with no user input.
    Tick,
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::InsertCoin(_) => "coin",
            Event::SelectProduct(_) => "select",
            Event::Return => "return",
            Event::Tick => "tick",
        }
    }
}

/// An output for the display or actuator collaborator.
///
/// Pulses carry their duration instead of blocking; the collaborator is
/// responsible for scheduling the actual signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    DisplayMessage(String),
    DispensePulse(Duration),
    ReturnCoinPulse(Cents),
    RetireSelection(SelectionToken),
}

impl Command {
    pub fn kind(&self) -> &'static str {
        match self {
            Command::DisplayMessage(_) => "display",
            Command::DispensePulse(_) => "dispense",
            Command::ReturnCoinPulse(_) => "return_coin",
            Command::RetireSelection(_) => "retire",
        }
    }
}

/// Result of the most recent trip through the dispensing phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VendOutcome {
    Dispensed(SelectionToken),
    Failed(ProductId),
}

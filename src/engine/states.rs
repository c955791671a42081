//! The four transaction phases and the handle they operate through.
//!
//! States carry no fields. Everything they read or change lives in the
//! [`Machine`] handed to them by the controller, so one instance of each can
//! be shared for the controller's whole lifetime.

use tracing::{debug, error, info, warn};

use super::TransactionContext;
use super::error::{DispenseError, PurchaseError};
use crate::catalog::{Catalog, Product};
use crate::inventory::Inventory;
use crate::model::{Command, DISPENSE_PULSE, Event, SelectionToken, VendOutcome};
use crate::sink::CommandSink;

pub const WAITING: &str = "waiting";
pub const ADDING_FUNDS: &str = "adding_funds";
pub const DISPENSING: &str = "dispensing";
pub const RETURNING_CHANGE: &str = "returning_change";

/// What a state asks the controller to do after handling an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Stay,
    Goto(&'static str),
}

/// Mutable view of the kiosk given to the active state.
pub struct Machine<'a> {
    pub context: &'a mut TransactionContext,
    pub inventory: &'a mut Inventory,
    pub catalog: &'a Catalog,
    sink: &'a mut dyn CommandSink,
}

impl<'a> Machine<'a> {
    pub fn new(
        context: &'a mut TransactionContext,
        inventory: &'a mut Inventory,
        catalog: &'a Catalog,
        sink: &'a mut dyn CommandSink,
    ) -> Self {
        Self {
            context,
            inventory,
            catalog,
            sink,
        }
    }

    pub fn emit(&mut self, command: Command) {
        debug!(command = ?command, "emit");
        self.sink.emit(command);
    }

    pub fn display(&mut self, text: impl Into<String>) {
        self.emit(Command::DisplayMessage(text.into()));
    }
}

/// One phase of the transaction lifecycle.
pub trait State: Send + Sync {
    fn name(&self) -> &'static str;

    fn on_entry(&self, _machine: &mut Machine<'_>) {}

    fn on_exit(&self, _machine: &mut Machine<'_>) {}

    fn update(&self, event: &Event, machine: &mut Machine<'_>) -> Transition;

    /// Transient states are updated right after entry, in the same dispatch,
    /// so they never wait on an external event.
    fn is_transient(&self) -> bool {
        false
    }
}

/// Idle, nothing inserted.
#[derive(Debug, Clone, Copy, Default)]
pub struct Waiting;

impl State for Waiting {
    fn name(&self) -> &'static str {
        WAITING
    }

    fn on_entry(&self, machine: &mut Machine<'_>) {
        machine.display("waiting for funds");
    }

    fn update(&self, event: &Event, machine: &mut Machine<'_>) -> Transition {
        match event {
            Event::InsertCoin(coin) => {
                machine.context.credit(*coin);
                Transition::Goto(ADDING_FUNDS)
            }
            // nothing to refund yet
            Event::Return | Event::SelectProduct(_) | Event::Tick => Transition::Stay,
        }
    }
}

/// Collecting coins until the customer buys something or asks for a refund.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddingFunds;

impl AddingFunds {
    fn show_balance(machine: &mut Machine<'_>) {
        let balance = machine.context.balance();
        machine.display(format!("balance: {balance}"));
    }

    fn check_purchase<'c>(
        machine: &Machine<'c>,
        token: &SelectionToken,
    ) -> Option<Result<&'c Product, PurchaseError>> {
        let catalog: &'c Catalog = machine.catalog;
        let product = catalog.product(&token.product_id)?;

        if !machine.inventory.in_stock(&product.id) {
            return Some(Err(PurchaseError::OutOfStock {
                name: product.display_name.clone(),
            }));
        }

        let balance = machine.context.balance();
        if balance < product.price {
            return Some(Err(PurchaseError::InsufficientFunds {
                price: product.price,
                balance,
            }));
        }

        Some(Ok(product))
    }
}

impl State for AddingFunds {
    fn name(&self) -> &'static str {
        ADDING_FUNDS
    }

    fn on_entry(&self, machine: &mut Machine<'_>) {
        Self::show_balance(machine);
    }

    fn update(&self, event: &Event, machine: &mut Machine<'_>) -> Transition {
        match event {
            Event::InsertCoin(coin) => {
                machine.context.credit(*coin);
                Self::show_balance(machine);
                Transition::Stay
            }
            Event::Return => {
                machine.context.refund_balance();
                Transition::Goto(RETURNING_CHANGE)
            }
            Event::SelectProduct(token) => match Self::check_purchase(machine, token) {
                Some(Ok(product)) => {
                    info!(selection = %token, price = %product.price, "purchase accepted");
                    machine.context.select(token.clone());
                    Transition::Goto(DISPENSING)
                }
                Some(Err(e)) => {
                    info!(selection = %token, reason = %e, "purchase refused");
                    machine.display(e.to_string());
                    Transition::Stay
                }
                // unknown products are filtered out before dispatch
                None => Transition::Stay,
            },
            Event::Tick => Transition::Stay,
        }
    }
}

/// Releases one unit of the selected product and settles the balance.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dispensing;

impl Dispensing {
    fn vend(machine: &mut Machine<'_>, token: &SelectionToken) -> Result<(), DispenseError> {
        let product = machine
            .catalog
            .product(&token.product_id)
            .ok_or_else(|| DispenseError::UnknownProduct(token.product_id.clone()))?;

        // stock was checked at selection time; check again before committing
        if !machine.inventory.in_stock(&product.id) {
            return Err(DispenseError::UnexpectedStockRace(product.id.clone()));
        }

        let balance = machine.context.balance();
        if balance < product.price {
            return Err(DispenseError::InsufficientBalance {
                balance,
                price: product.price,
            });
        }

        let remaining = machine
            .inventory
            .take_one(&product.id)
            .map_err(|_| DispenseError::UnexpectedStockRace(product.id.clone()))?;

        machine.context.settle(product.price);

        info!(
            selection = %token,
            price = %product.price,
            change = %machine.context.change_due(),
            remaining,
            "dispensing"
        );

        let name = product.display_name.clone();
        machine.display(format!("dispensing {name}"));
        machine.emit(Command::DispensePulse(DISPENSE_PULSE));
        machine.inventory.retire(token.clone());
        machine.emit(Command::RetireSelection(token.clone()));
        Ok(())
    }
}

impl State for Dispensing {
    fn name(&self) -> &'static str {
        DISPENSING
    }

    fn on_entry(&self, machine: &mut Machine<'_>) {
        let Some(token) = machine.context.clear_selection() else {
            warn!(reason = %DispenseError::NoSelection, "dispense aborted");
            machine.display("error: no product selected");
            machine.context.refund_balance();
            return;
        };

        match Self::vend(machine, &token) {
            Ok(()) => machine.context.record_vend(VendOutcome::Dispensed(token)),
            Err(e) => {
                warn!(selection = %token, reason = %e, "dispense aborted");
                match e {
                    DispenseError::UnexpectedStockRace(_) => machine.display("error: out of stock"),
                    other => machine.display(format!("error: {other}")),
                }
                // keep the customer's money: route it through change return
                machine.context.refund_balance();
                machine
                    .context
                    .record_vend(VendOutcome::Failed(token.product_id));
            }
        }
    }

    fn update(&self, _event: &Event, machine: &mut Machine<'_>) -> Transition {
        if machine.context.change_due().is_zero() {
            Transition::Goto(WAITING)
        } else {
            Transition::Goto(RETURNING_CHANGE)
        }
    }

    fn is_transient(&self) -> bool {
        true
    }
}

/// Pays out `change_due` as coins, then goes back to idle.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReturningChange;

impl State for ReturningChange {
    fn name(&self) -> &'static str {
        RETURNING_CHANGE
    }

    fn on_entry(&self, machine: &mut Machine<'_>) {
        let due = machine.context.change_due();
        machine.display(format!("change due: {due}"));
    }

    fn update(&self, event: &Event, machine: &mut Machine<'_>) -> Transition {
        if let Event::InsertCoin(coin) = event {
            machine.context.add_change(*coin);
        }

        let due = machine.context.take_change();
        let change = machine.catalog.change_calculator().decompose(due);
        info!(due = %due, coins = change.coins.len(), "returning change");

        for coin in &change.coins {
            machine.emit(Command::ReturnCoinPulse(*coin));
        }

        if !change.is_exact() {
            error!(due = %due, remainder = %change.remainder, "change not fully returned");
            machine.display(format!("unable to return {}", change.remainder));
        }

        Transition::Goto(WAITING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Cents;
    use crate::sink::RecordingSink;

    struct Rig {
        context: TransactionContext,
        inventory: Inventory,
        catalog: Catalog,
        sink: RecordingSink,
    }

    impl Rig {
        fn new() -> Self {
            let catalog = Catalog::default();
            Self {
                context: TransactionContext::default(),
                inventory: Inventory::from_catalog(&catalog),
                catalog,
                sink: RecordingSink::new(),
            }
        }

        fn with_balance(cents: u32) -> Self {
            let mut rig = Self::new();
            rig.context.credit(Cents::new(cents));
            rig
        }

        fn machine(&mut self) -> Machine<'_> {
            Machine::new(
                &mut self.context,
                &mut self.inventory,
                &self.catalog,
                &mut self.sink,
            )
        }
    }

    fn select(product: &str) -> Event {
        Event::SelectProduct(SelectionToken::new(product, 0))
    }

    #[test]
    fn waiting_displays_prompt_on_entry() {
        let mut rig = Rig::new();
        Waiting.on_entry(&mut rig.machine());
        assert_eq!(rig.sink.messages().collect::<Vec<_>>(), vec!["waiting for funds"]);
    }

    #[test]
    fn waiting_coin_moves_to_adding_funds() {
        let mut rig = Rig::new();
        let next = Waiting.update(&Event::InsertCoin(Cents::new(25)), &mut rig.machine());
        assert_eq!(next, Transition::Goto(ADDING_FUNDS));
        assert_eq!(rig.context.balance(), Cents::new(25));
    }

    #[test]
    fn waiting_absorbs_everything_else() {
        let mut rig = Rig::new();
        for event in [Event::Return, Event::Tick, select("diode")] {
            assert_eq!(Waiting.update(&event, &mut rig.machine()), Transition::Stay);
        }
        assert_eq!(rig.context, TransactionContext::default());
        assert!(rig.sink.commands().is_empty());
    }

    #[test]
    fn adding_funds_shows_balance() {
        let mut rig = Rig::with_balance(75);
        AddingFunds.on_entry(&mut rig.machine());
        let next = AddingFunds.update(&Event::InsertCoin(Cents::new(100)), &mut rig.machine());

        assert_eq!(next, Transition::Stay);
        assert_eq!(
            rig.sink.messages().collect::<Vec<_>>(),
            vec!["balance: $0.75", "balance: $1.75"]
        );
    }

    #[test]
    fn adding_funds_return_refunds_balance() {
        let mut rig = Rig::with_balance(175);
        let next = AddingFunds.update(&Event::Return, &mut rig.machine());

        assert_eq!(next, Transition::Goto(RETURNING_CHANGE));
        assert_eq!(rig.context.balance(), Cents::ZERO);
        assert_eq!(rig.context.change_due(), Cents::new(175));
    }

    #[test]
    fn adding_funds_accepts_affordable_selection() {
        let mut rig = Rig::with_balance(100);
        let next = AddingFunds.update(&select("cap"), &mut rig.machine());

        assert_eq!(next, Transition::Goto(DISPENSING));
        assert_eq!(
            rig.context.pending_selection(),
            Some(&SelectionToken::new("cap", 0))
        );
        // settled only once dispensing succeeds
        assert_eq!(rig.context.balance(), Cents::new(100));
        assert_eq!(rig.inventory.remaining("cap"), 4);
    }

    #[test]
    fn adding_funds_refuses_when_short() {
        let mut rig = Rig::with_balance(100);
        let next = AddingFunds.update(&select("transistor"), &mut rig.machine());

        assert_eq!(next, Transition::Stay);
        assert_eq!(rig.context.balance(), Cents::new(100));
        assert!(rig.context.pending_selection().is_none());
        assert_eq!(
            rig.sink.messages().collect::<Vec<_>>(),
            vec!["insufficient funds, need $1.50"]
        );
    }

    #[test]
    fn adding_funds_refuses_when_out_of_stock() {
        let mut rig = Rig::with_balance(200);
        rig.inventory.take_one("transistor").unwrap();
        rig.inventory.take_one("transistor").unwrap();

        let next = AddingFunds.update(&select("transistor"), &mut rig.machine());

        assert_eq!(next, Transition::Stay);
        assert_eq!(rig.inventory.remaining("transistor"), 0);
        assert_eq!(rig.context.balance(), Cents::new(200));
        assert_eq!(
            rig.sink.messages().collect::<Vec<_>>(),
            vec!["2N3904 BJT out of stock"]
        );
    }

    #[test]
    fn adding_funds_ignores_tick() {
        let mut rig = Rig::with_balance(10);
        assert_eq!(AddingFunds.update(&Event::Tick, &mut rig.machine()), Transition::Stay);
        assert!(rig.sink.commands().is_empty());
    }

    #[test]
    fn dispensing_success_emits_pulse_and_retires_selection() {
        let mut rig = Rig::with_balance(100);
        let token = SelectionToken::new("cap", 2);
        rig.context.select(token.clone());

        Dispensing.on_entry(&mut rig.machine());

        assert_eq!(rig.inventory.remaining("cap"), 3);
        assert_eq!(rig.context.balance(), Cents::ZERO);
        assert_eq!(rig.context.change_due(), Cents::new(50));
        assert!(rig.context.pending_selection().is_none());
        assert_eq!(rig.context.last_vend(), Some(&VendOutcome::Dispensed(token.clone())));
        assert!(rig.inventory.is_retired(&token));
        assert_eq!(
            rig.sink.commands(),
            &[
                Command::DisplayMessage("dispensing 0.1uF Capacitor".to_string()),
                Command::DispensePulse(DISPENSE_PULSE),
                Command::RetireSelection(token),
            ]
        );

        let next = Dispensing.update(&Event::Tick, &mut rig.machine());
        assert_eq!(next, Transition::Goto(RETURNING_CHANGE));
    }

    #[test]
    fn dispensing_exact_payment_goes_back_to_waiting() {
        let mut rig = Rig::with_balance(75);
        rig.context.select(SelectionToken::new("diode", 0));

        Dispensing.on_entry(&mut rig.machine());
        let next = Dispensing.update(&Event::Tick, &mut rig.machine());

        assert_eq!(next, Transition::Goto(WAITING));
        assert_eq!(rig.context.change_due(), Cents::ZERO);
        assert_eq!(rig.inventory.remaining("diode"), 2);
    }

    #[test]
    fn dispensing_stock_race_refunds_instead_of_forfeiting() {
        let mut rig = Rig::with_balance(100);
        for _ in 0..4 {
            rig.inventory.take_one("cap").unwrap();
        }
        rig.context.select(SelectionToken::new("cap", 0));

        Dispensing.on_entry(&mut rig.machine());

        assert_eq!(rig.inventory.remaining("cap"), 0);
        assert_eq!(rig.context.balance(), Cents::ZERO);
        assert_eq!(rig.context.change_due(), Cents::new(100));
        assert!(rig.context.pending_selection().is_none());
        assert_eq!(
            rig.context.last_vend(),
            Some(&VendOutcome::Failed("cap".to_string()))
        );
        assert_eq!(
            rig.sink.commands(),
            &[Command::DisplayMessage("error: out of stock".to_string())]
        );

        let next = Dispensing.update(&Event::Tick, &mut rig.machine());
        assert_eq!(next, Transition::Goto(RETURNING_CHANGE));
    }

    #[test]
    fn dispensing_reports_stock_race_before_short_balance() {
        let mut rig = Rig::with_balance(25);
        while rig.inventory.take_one("diode").is_ok() {}
        rig.context.select(SelectionToken::new("diode", 0));

        Dispensing.on_entry(&mut rig.machine());

        assert_eq!(
            rig.sink.commands(),
            &[Command::DisplayMessage("error: out of stock".to_string())]
        );
        assert_eq!(rig.context.change_due(), Cents::new(25));
    }

    #[test]
    fn dispensing_short_balance_keeps_stock() {
        let mut rig = Rig::with_balance(25);
        rig.context.select(SelectionToken::new("diode", 0));

        Dispensing.on_entry(&mut rig.machine());

        assert_eq!(rig.inventory.remaining("diode"), 3);
        assert!(!rig.inventory.is_retired(&SelectionToken::new("diode", 0)));
        assert_eq!(
            rig.sink.messages().collect::<Vec<_>>(),
            vec!["error: balance $0.25 does not cover price $0.75"]
        );
    }

    #[test]
    fn dispensing_without_selection_refunds() {
        let mut rig = Rig::with_balance(25);
        Dispensing.on_entry(&mut rig.machine());

        assert_eq!(rig.context.change_due(), Cents::new(25));
        assert_eq!(rig.inventory.remaining("diode"), 3);
        assert!(Dispensing.is_transient());
    }

    #[test]
    fn returning_change_pays_out_greedily() {
        let mut rig = Rig::with_balance(175);
        rig.context.refund_balance();

        ReturningChange.on_entry(&mut rig.machine());
        let next = ReturningChange.update(&Event::Tick, &mut rig.machine());

        assert_eq!(next, Transition::Goto(WAITING));
        assert_eq!(rig.context.change_due(), Cents::ZERO);
        assert_eq!(
            rig.sink.commands(),
            &[
                Command::DisplayMessage("change due: $1.75".to_string()),
                Command::ReturnCoinPulse(Cents::new(100)),
                Command::ReturnCoinPulse(Cents::new(25)),
                Command::ReturnCoinPulse(Cents::new(25)),
                Command::ReturnCoinPulse(Cents::new(25)),
            ]
        );
    }

    #[test]
    fn returning_change_gives_back_coins_inserted_meanwhile() {
        let mut rig = Rig::with_balance(50);
        rig.context.refund_balance();

        ReturningChange.update(&Event::InsertCoin(Cents::new(10)), &mut rig.machine());

        let paid: Cents = rig
            .sink
            .commands()
            .iter()
            .filter_map(|c| match c {
                Command::ReturnCoinPulse(coin) => Some(*coin),
                _ => None,
            })
            .sum();
        assert_eq!(paid, Cents::new(60));
        assert_eq!(rig.context.balance(), Cents::ZERO);
    }

    #[test]
    fn states_are_not_transient_by_default() {
        assert!(!Waiting.is_transient());
        assert!(!AddingFunds.is_transient());
        assert!(!ReturningChange.is_transient());
    }
}

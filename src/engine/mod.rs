//! Kiosk state machine driver.
//!
//! The controller owns the transaction context and inventory, holds the
//! registry of states, and feeds each incoming [`Event`] to the active one.
//! Events are handled strictly one at a time and every transition's
//! exit/entry pair completes before the next event is accepted. Also
//! supports an async stream of events.

use std::collections::HashMap;
use tokio_stream::{Stream, StreamExt};
use tracing::{error, info, warn};

use crate::catalog::Catalog;
use crate::inventory::Inventory;
use crate::model::{Command, Event};
use crate::sink::CommandSink;

mod state;
pub use state::TransactionContext;

mod states;
pub use states::{
    ADDING_FUNDS, AddingFunds, DISPENSING, Dispensing, Machine, RETURNING_CHANGE,
    ReturningChange, State, Transition, WAITING, Waiting,
};

mod error;
pub use error::{ControllerError, DispenseError, EventError, PurchaseError};

/// The kiosk controller.
///
/// Generic over the command sink so the same core drives real actuators,
/// a CSV log or an in-memory recorder.
pub struct Controller<S> {
    states: HashMap<&'static str, Box<dyn State>>,
    active: Option<&'static str>,
    context: TransactionContext,
    inventory: Inventory,
    catalog: Catalog,
    sink: S,
}

/// Public API
impl<S: CommandSink> Controller<S> {
    /// Controller with no states registered yet.
    pub fn new(catalog: Catalog, sink: S) -> Self {
        Self {
            states: HashMap::new(),
            active: None,
            context: TransactionContext::default(),
            inventory: Inventory::from_catalog(&catalog),
            catalog,
            sink,
        }
    }

    /// Controller with the four kiosk states registered, sitting in `waiting`.
    pub fn standard(catalog: Catalog, sink: S) -> Result<Self, ControllerError> {
        let mut controller = Self::new(catalog, sink);
        controller.register(Box::new(Waiting))?;
        controller.register(Box::new(AddingFunds))?;
        controller.register(Box::new(Dispensing))?;
        controller.register(Box::new(ReturningChange))?;
        controller.goto(WAITING)?;
        Ok(controller)
    }

    /// Add a state to the registry. Names must be unique.
    pub fn register(&mut self, state: Box<dyn State>) -> Result<(), ControllerError> {
        let name = state.name();
        if self.states.contains_key(name) {
            return Err(ControllerError::DuplicateState(name.to_string()));
        }
        self.states.insert(name, state);
        Ok(())
    }

    /// Leave the active state (if any) and enter `name`.
    ///
    /// Transient states are updated as soon as they are entered, and the
    /// transition they request is followed before returning.
    pub fn goto(&mut self, name: &str) -> Result<(), ControllerError> {
        let mut target = self.resolve(name)?;
        // each transient hop must land somewhere new eventually
        let mut hops_left = self.states.len() + 1;

        loop {
            self.enter(target);

            let transient = self.states.get(target).is_some_and(|s| s.is_transient());
            if !transient {
                return Ok(());
            }

            if hops_left == 0 {
                return Err(ControllerError::TransitionLoop(target.to_string()));
            }
            hops_left -= 1;

            match self.update_active(&Event::Tick) {
                Some(Transition::Goto(next)) => target = self.resolve(next)?,
                Some(Transition::Stay) | None => return Ok(()),
            }
        }
    }

    /// Hand one event to the active state and perform the transition it asks for.
    ///
    /// Events that don't fit the catalog are reported on the display and dropped.
    pub fn dispatch(&mut self, event: Event) -> Result<(), ControllerError> {
        let Some(active) = self.active else {
            warn!(event = event.kind(), "no active state, event dropped");
            return Ok(());
        };

        if let Err(e) = self.validate(&event) {
            warn!(state = active, event = event.kind(), reason = %e, "event rejected");
            self.sink.emit(Command::DisplayMessage(e.to_string()));
            return Ok(());
        }

        match self.update_active(&event) {
            Some(Transition::Goto(next)) => self.goto(next),
            Some(Transition::Stay) | None => Ok(()),
        }
    }

    /// Run the controller over the given event stream
    pub async fn run(&mut self, mut stream: impl Stream<Item = Event> + Unpin) {
        while let Some(event) = stream.next().await {
            // wiring errors are logged, the kiosk keeps serving
            if let Err(e) = self.dispatch(event) {
                error!(reason = %e, "dispatch failed");
            }
        }
    }

    /// Name of the active state, if any.
    pub fn state_name(&self) -> Option<&'static str> {
        self.active
    }

    pub fn context(&self) -> &TransactionContext {
        &self.context
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

/// Private API
impl<S: CommandSink> Controller<S> {
    /// Registry key for `name`.
    fn resolve(&self, name: &str) -> Result<&'static str, ControllerError> {
        self.states
            .get_key_value(name)
            .map(|(key, _)| *key)
            .ok_or_else(|| ControllerError::UnknownState(name.to_string()))
    }

    /// Exit the active state and enter `target`, which must be registered.
    fn enter(&mut self, target: &'static str) {
        let Self {
            states,
            active,
            context,
            inventory,
            catalog,
            sink,
        } = self;

        let mut machine = Machine::new(context, inventory, catalog, sink);

        if let Some(current) = active.and_then(|name| states.get(name)) {
            current.on_exit(&mut machine);
        }

        info!(from = active.unwrap_or("-"), to = target, "transition");
        *active = Some(target);

        if let Some(next) = states.get(target) {
            next.on_entry(&mut machine);
        }
    }

    fn update_active(&mut self, event: &Event) -> Option<Transition> {
        let Self {
            states,
            active,
            context,
            inventory,
            catalog,
            sink,
        } = self;

        let state = states.get((*active)?)?;
        let mut machine = Machine::new(context, inventory, catalog, sink);
        Some(state.update(event, &mut machine))
    }

    /// Reject events that reference coins, products or slots the catalog
    /// doesn't have, and slots that were already vended.
    fn validate(&self, event: &Event) -> Result<(), EventError> {
        match event {
            Event::InsertCoin(coin) if !self.catalog.accepts(*coin) => {
                Err(EventError::UnknownCoin(*coin))
            }
            Event::SelectProduct(token) => {
                let slots = self
                    .catalog
                    .starting_stock(&token.product_id)
                    .ok_or_else(|| EventError::UnknownProduct(token.product_id.clone()))?;
                // zero-stock products fall through and are refused as out of stock
                if slots > 0 && token.instance_index >= slots {
                    return Err(EventError::UnknownSlot {
                        product: token.product_id.clone(),
                        instance: token.instance_index,
                    });
                }
                if self.inventory.is_retired(token) {
                    return Err(EventError::RetiredSlot {
                        product: token.product_id.clone(),
                        instance: token.instance_index,
                    });
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

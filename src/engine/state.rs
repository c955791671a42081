use crate::Cents;
use crate::model::{SelectionToken, VendOutcome};

/// Money and selection for the transaction in progress.
///
/// `balance` holds inserted coins, `change_due` what is owed back. Moving
/// money into `change_due` always empties `balance` in the same step.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TransactionContext {
    balance: Cents,
    change_due: Cents,
    pending_selection: Option<SelectionToken>,
    last_vend: Option<VendOutcome>,
}

impl TransactionContext {
    pub fn balance(&self) -> Cents {
        self.balance
    }

    pub fn change_due(&self) -> Cents {
        self.change_due
    }

    pub fn pending_selection(&self) -> Option<&SelectionToken> {
        self.pending_selection.as_ref()
    }

    pub fn last_vend(&self) -> Option<&VendOutcome> {
        self.last_vend.as_ref()
    }

    pub fn credit(&mut self, coin: Cents) {
        self.balance += coin;
    }

    /// Owe the whole balance back to the customer.
    pub fn refund_balance(&mut self) {
        self.change_due += self.balance;
        self.balance = Cents::ZERO;
    }

    /// Pay `price` out of the balance and owe the rest back.
    /// Leaves everything untouched if the balance is short.
    pub fn settle(&mut self, price: Cents) -> Option<Cents> {
        let change = self.balance.checked_sub(price)?;
        self.change_due += change;
        self.balance = Cents::ZERO;
        Some(change)
    }

    /// Hand over the change owed, leaving none due.
    pub fn take_change(&mut self) -> Cents {
        std::mem::take(&mut self.change_due)
    }

    /// Coins fed in while change is being returned go straight back out.
    pub fn add_change(&mut self, coin: Cents) {
        self.change_due += coin;
    }

    pub fn select(&mut self, token: SelectionToken) {
        self.pending_selection = Some(token);
    }

    pub fn clear_selection(&mut self) -> Option<SelectionToken> {
        self.pending_selection.take()
    }

    pub fn record_vend(&mut self, outcome: VendOutcome) {
        self.last_vend = Some(outcome);
    }
}

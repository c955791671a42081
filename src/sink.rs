//! Where the controller sends its commands.
//!
//! The core only sees [`CommandSink`]; whether a pulse drives a real
//! actuator or is simulated is decided once at startup by whoever builds
//! the sink.

use crate::model::Command;

pub trait CommandSink {
    fn emit(&mut self, command: Command);
}

impl<S: CommandSink + ?Sized> CommandSink for &mut S {
    fn emit(&mut self, command: Command) {
        (**self).emit(command);
    }
}

/// Keeps every command in memory, in emission order.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    commands: Vec<Command>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Drain everything recorded so far.
    pub fn take(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    /// Text of every `DisplayMessage`, in order.
    pub fn messages(&self) -> impl Iterator<Item = &str> + '_ {
        self.commands.iter().filter_map(|c| match c {
            Command::DisplayMessage(text) => Some(text.as_str()),
            _ => None,
        })
    }
}

impl CommandSink for RecordingSink {
    fn emit(&mut self, command: Command) {
        self.commands.push(command);
    }
}

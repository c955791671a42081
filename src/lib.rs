pub mod amount;
pub mod catalog;
pub mod change;
pub mod csv;
pub mod engine;
pub mod inventory;
pub mod model;
pub mod sink;

pub use amount::Cents;
pub use catalog::{Catalog, Product};
pub use engine::Controller;
pub use model::{Command, Event, ProductId, SelectionToken};
pub use sink::{CommandSink, RecordingSink};

use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

use crate::catalog::{Catalog, CatalogError, Product};
use crate::model::{Command, Event, SelectionToken};
use crate::sink::CommandSink;
use crate::{Cents, ProductId};

/// Errors that can occur when reading csv input
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("failed to open {path}: {source}")]
    Open { path: String, source: csv::Error },

    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized {column} '{value}'")]
    Unrecognized {
        line: usize,
        column: &'static str,
        value: String,
    },

    #[error("line {line}: {kind} missing {field}")]
    MissingField {
        line: usize,
        kind: String,
        field: &'static str,
    },

    #[error("invalid catalog: {0}")]
    Catalog(#[from] CatalogError),
}

#[derive(Debug, Deserialize)]
struct EventRow {
    event: String,
    coin: Option<u32>,
    product: Option<ProductId>,
    instance: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CatalogRow {
    kind: String,
    id: Option<ProductId>,
    name: Option<String>,
    value: u32,
    stock: Option<u32>,
}

#[derive(Debug, Serialize, Default)]
struct CommandRow<'a> {
    command: &'a str,
    text: Option<&'a str>,
    duration_ms: Option<u64>,
    coin: Option<u32>,
    product: Option<&'a str>,
    instance: Option<u32>,
}

fn reader(path: &Path) -> Result<csv::Reader<std::fs::File>, CsvError> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| CsvError::Open {
            path: path.display().to_string(),
            source,
        })
}

fn required<T>(
    value: Option<T>,
    line: usize,
    kind: &str,
    field: &'static str,
) -> Result<T, CsvError> {
    value.ok_or_else(|| CsvError::MissingField {
        line,
        kind: kind.to_string(),
        field,
    })
}

/// Read an event script from a csv file with columns `event,coin,product,instance`
pub fn read_events(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<Event, CsvError>>, CsvError> {
    let reader = reader(path.as_ref())?;

    Ok(reader
        .into_deserialize::<EventRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            match row.event.as_str() {
                "coin" => {
                    let coin = required(row.coin, line, "coin", "coin")?;
                    Ok(Event::InsertCoin(Cents::new(coin)))
                }
                "select" => {
                    let product = required(row.product, line, "select", "product")?;
                    let instance = required(row.instance, line, "select", "instance")?;
                    Ok(Event::SelectProduct(SelectionToken::new(product, instance)))
                }
                "return" => Ok(Event::Return),
                "tick" => Ok(Event::Tick),
                other => Err(CsvError::Unrecognized {
                    line,
                    column: "event",
                    value: other.to_string(),
                }),
            }
        }))
}

/// Load a catalog from a csv file with columns `kind,id,name,value,stock`.
///
/// `product` rows need all columns, `coin` rows only `value`.
pub fn read_catalog(path: impl AsRef<Path>) -> Result<Catalog, CsvError> {
    let reader = reader(path.as_ref())?;
    let mut products = Vec::new();
    let mut coins = Vec::new();

    for (idx, result) in reader.into_deserialize::<CatalogRow>().enumerate() {
        let line = idx + 2;
        let row = result.map_err(|source| CsvError::Parse { line, source })?;
        match row.kind.as_str() {
            "product" => {
                let id = required(row.id, line, "product", "id")?;
                let name = required(row.name, line, "product", "name")?;
                let stock = required(row.stock, line, "product", "stock")?;
                products.push((Product::new(id, name, Cents::new(row.value)), stock));
            }
            "coin" => coins.push(Cents::new(row.value)),
            other => {
                return Err(CsvError::Unrecognized {
                    line,
                    column: "kind",
                    value: other.to_string(),
                });
            }
        }
    }

    Ok(Catalog::new(products, coins)?)
}

/// Writes each command as a csv row: `command,text,duration_ms,coin,product,instance`
pub struct CsvSink<W: io::Write> {
    writer: csv::Writer<W>,
}

impl CsvSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: io::Write> CsvSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(writer),
        }
    }

    pub fn flush(&mut self) {
        if let Err(e) = self.writer.flush() {
            warn!(reason = %e, "failed to flush command output");
        }
    }

    pub fn into_inner(self) -> Option<W> {
        self.writer.into_inner().ok()
    }
}

impl<W: io::Write> CommandSink for CsvSink<W> {
    fn emit(&mut self, command: Command) {
        let kind = command.kind();
        let row = match &command {
            Command::DisplayMessage(text) => CommandRow {
                command: kind,
                text: Some(text.as_str()),
                ..Default::default()
            },
            Command::DispensePulse(duration) => CommandRow {
                command: kind,
                duration_ms: u64::try_from(duration.as_millis())
                    .inspect_err(|_| warn!(?duration, "pulse length does not fit in milliseconds"))
                    .ok(),
                ..Default::default()
            },
            Command::ReturnCoinPulse(coin) => CommandRow {
                command: kind,
                coin: Some(coin.value()),
                ..Default::default()
            },
            Command::RetireSelection(token) => CommandRow {
                command: kind,
                product: Some(token.product_id.as_str()),
                instance: Some(token.instance_index),
                ..Default::default()
            },
        };

        if let Err(e) = self.writer.serialize(&row) {
            warn!(command = kind, reason = %e, "failed to write command");
        }
    }
}

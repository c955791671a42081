use std::env;
use std::process::ExitCode;

use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;
use vend_eng::csv::{CsvSink, read_catalog, read_events};
use vend_eng::{Catalog, Controller};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(
            "warn".parse().expect("static directive parses"),
        ))
        .with_writer(std::io::stderr)
        .init();

    let mut args = env::args().skip(1);
    let Some(events_path) = args.next() else {
        eprintln!("usage: vend-eng <events.csv> [catalog.csv]");
        return ExitCode::from(2);
    };

    let catalog = match args.next() {
        Some(path) => match read_catalog(&path) {
            Ok(catalog) => catalog,
            Err(e) => {
                error!(path, "{e}");
                return ExitCode::from(2);
            }
        },
        None => Catalog::default(),
    };

    let events = match read_events(events_path) {
        Ok(events) => events,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(2);
        }
    };

    let mut controller = match Controller::standard(catalog, CsvSink::stdout()) {
        Ok(controller) => controller,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(2);
        }
    };

    // single consumer queue between the event source and the controller
    let (event_sender, event_receiver) = tokio::sync::mpsc::channel(16);

    tokio::spawn(async move {
        for result in events {
            match result {
                Ok(event) => {
                    if event_sender.send(event).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });

    controller.run(ReceiverStream::new(event_receiver)).await;
    controller.sink_mut().flush();

    ExitCode::SUCCESS
}

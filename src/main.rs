//! This file defines the aquaview binary entry point.

use aquaview::app;
use aquaview::app_state::AppState;
use aquaview::cli;
use aquaview::metrics;
use aquaview::server;
use aquaview::tracing;

use std::process::exit;

/// Application entry point
#[tokio::main]
async fn main() {
    let args = cli::parse();
    tracing::init_tracing();
    metrics::register_metrics();
    let state = match AppState::new(args.dataset_path.clone(), &args.image_column) {
        Ok(state) => state,
        Err(err) => {
            // No point serving without a table; fail fast.
            ::tracing::error!("failed to load dataset: {err}");
            let mut source = std::error::Error::source(&err);
            while let Some(cause) = source {
                ::tracing::error!("caused by: {cause}");
                source = cause.source();
            }
            exit(1);
        }
    };
    let service = app::service(state);
    server::serve(&args, service).await;
}

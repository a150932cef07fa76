//! hitexport - streaming bulk export of tenant analytics
//!
//! Pages through a tenant's records, streams them into a gzip-compressed CSV
//! artifact and publishes it atomically, reporting the row count, size and
//! SHA-256 digest on completion.
//!
//! # Usage
//!
//! ```bash
//! # Export a tenant from a JSON Lines dump
//! hitexport --artifact-dir /srv/exports export --tenant acme --input hits.jsonl
//!
//! # Check the published artifact
//! hitexport --artifact-dir /srv/exports verify --tenant acme --digest sha256-...
//! ```

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use hitexport::cli::{CliInterface, Commands};
use hitexport::error::Result;
use hitexport::export::{
    CompletionNotifier, ExportOutcome, ExportPipeline, FanoutNotifier, JsonLinesSource,
    LogNotifier, ReceiptNotifier, Tenant,
};

/// Application entry point
#[tokio::main]
async fn main() {
    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Main application logic
///
/// # Returns
/// * `Result<bool>` - Whether the command succeeded
async fn run() -> Result<bool> {
    let cli = CliInterface::new()?;

    initialize_logging(&cli);

    if cli.handle_subcommand()? {
        return Ok(true);
    }

    let Commands::Export {
        tenant,
        tenant_id,
        input,
        resume,
        receipt,
    } = &cli.args().command
    else {
        return Ok(true);
    };

    let mut notifier = FanoutNotifier::new().with(Arc::new(LogNotifier));
    if *receipt {
        notifier = notifier.with(Arc::new(ReceiptNotifier));
    }
    let notifier: Arc<dyn CompletionNotifier> = Arc::new(notifier);

    let cancel_token = CancellationToken::new();
    let pipeline = ExportPipeline::new(
        Arc::new(JsonLinesSource::new(input)),
        notifier,
        &cli.config().export,
    )
    .with_cancellation(cancel_token.clone());

    // Ctrl+C stops the export at the next page boundary
    let ctrl_c_handle = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => cancel_token.cancel(),
            Err(err) => eprintln!("Failed to listen for Ctrl+C: {}", err),
        }
    });

    let outcome = pipeline
        .export(&Tenant::new(*tenant_id, tenant.as_str()), *resume)
        .await;
    ctrl_c_handle.abort();

    Ok(report(&outcome))
}

/// Print the outcome for the operator
fn report(outcome: &ExportOutcome) -> bool {
    match outcome {
        ExportOutcome::Success(summary) => {
            println!(
                "{} rows, {} MB, {}, resume after {}",
                summary.rows, summary.size, summary.digest, summary.cursor
            );
            println!("{}", summary.path.display());
            true
        }
        ExportOutcome::Failed { cause } => {
            eprintln!("Export failed ({}): {}", cause.stage(), cause);
            false
        }
    }
}

/// Initialize logging system based on the effective log level
///
/// # Arguments
/// * `cli` - CLI interface with the loaded configuration
fn initialize_logging(cli: &CliInterface) {
    let level = cli.config().logging.level.to_tracing_level();

    // Logs go to stderr so stdout stays clean for completions and reports
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}

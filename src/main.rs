use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jirafe_cli::cli::{self, Cli};
use jirafe_cli::settings::FileSettings;
use jirafe_cli::ui::{ConsoleReporter, Reporter};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "jirafe_cli=debug"
    } else {
        "jirafe_cli=warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut reporter = ConsoleReporter::new();

    // Settings are re-read on every invocation
    let loaded = match &cli.config {
        Some(path) => FileSettings::load(path),
        None => FileSettings::load_default(),
    };
    let mut store = match loaded {
        Ok(store) => store,
        Err(e) => {
            reporter.failure(&format!("{:#}", e));
            return ExitCode::FAILURE;
        }
    };

    let client_config = cli.client_config();
    if cli::run(cli.command, client_config, &mut store, &mut reporter).await {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

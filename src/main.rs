//! FlyList - flight log, reference data and METAR lookups from the terminal

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use flylist::app::App;
use flylist::cli::Cli;
use flylist::store::default_data_dir;

/// Installs the stderr log subscriber
///
/// `RUST_LOG` wins over the `-v` flags when it is set.
fn setup_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("flylist={}", cli.log_level())));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(io::stderr)
                .compact(),
        )
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(&cli);

    let Some(data_dir) = cli.data_dir.clone().or_else(default_data_dir) else {
        eprintln!("Error: could not determine a data directory, pass --data-dir");
        return ExitCode::FAILURE;
    };

    let app = App::new(data_dir);
    let mut stdout = io::stdout().lock();

    match app.run(cli.command, &mut stdout).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

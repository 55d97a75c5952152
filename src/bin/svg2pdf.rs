//! Convert an SVG file to PDF via a supervised Inkscape shell.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use inkscape_proxy::{Proxy, ProxyConfig};

#[derive(Parser)]
#[command(
    name = "svg2pdf",
    about = "Convert an SVG file to PDF via a supervised Inkscape shell",
    version
)]
struct Cli {
    /// SVG input path.
    #[arg(short, long)]
    input: String,

    /// PDF output path.
    #[arg(short, long, default_value = "result.pdf")]
    output: String,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = ProxyConfig::default().verbose(cli.verbose > 1);
    let proxy = Proxy::new(config);

    if let Err(err) = proxy.run::<&str>(&[]) {
        tracing::error!(error = %err, "failed to start inkscape");
        return ExitCode::FAILURE;
    }

    let result = proxy.svg2pdf(&cli.input, &cli.output).await;
    let _ = proxy.close().await;

    match result {
        Ok(()) => {
            println!("done: {}", cli.output);
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, input = %cli.input, "conversion failed");
            ExitCode::FAILURE
        }
    }
}

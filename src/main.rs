use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use xmload::cli::{self, Cli};
use xmload::loader::{Loader, LoaderConfig};
use xmload::sink;

fn main() {
    let cli = Cli::parse();

    if let Err(error) = cli::validate_cli_args(&cli) {
        eprintln!("{error}");
        eprintln!();
        eprintln!("{}", cli::USAGE_HINT);
        std::process::exit(2);
    }

    let code = match run(cli) {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(error) => {
            eprintln!("xmload: {error:#}");
            eprintln!("{}", cli::USAGE_HINT);
            1
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<bool> {
    let sink = sink::open_sink(&cli.url)?;

    let mut config = LoaderConfig::new(
        cli.input_mode(),
        cli.paths.iter().map(PathBuf::from).collect(),
    );
    config.threads = cli.threads;
    config.ack_timeout = Duration::from_secs(cli.ack_timeout);

    Ok(Loader::new(config).run(sink))
}

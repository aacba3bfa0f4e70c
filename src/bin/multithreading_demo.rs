use clap::Parser;
use colored::Colorize;
use multithreading_demo::logging;
use multithreading_demo::{CancelTrigger, DemoConfig, DemoError, KeyPressTrigger, Menu};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

/// Race-condition and producer-consumer demos behind a text menu.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// TOML file overriding the demo parameters.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Diagnostic log filter, e.g. `debug` or `multithreading_demo=trace`.
    #[arg(long)]
    log_level: Option<String>,

    /// Disable colored output.
    #[arg(long)]
    no_color: bool,
}

fn run(cli: &Cli) -> Result<(), DemoError> {
    let config = match &cli.config {
        Some(path) => DemoConfig::load(path)?,
        None => DemoConfig::default(),
    };
    tracing::debug!(?config, "configuration loaded");

    let mut menu = Menu::new(
        io::stdin().lock(),
        io::stdout(),
        config,
        Box::new(|| Box::new(KeyPressTrigger::default()) as Box<dyn CancelTrigger>),
    );
    menu.run()
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.log_level.as_deref());
    if cli.no_color {
        colored::control::set_override(false);
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

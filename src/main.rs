mod cli;
mod commands;
mod config;
mod error;
mod esxi;
mod inventory;
mod logging;
mod output;

use clap::Parser;
use cli::Cli;
use commands::handle_inventory_command;
use config::InventoryConfig;
use output::print_error;

fn main() {
    let cli = Cli::parse();
    if let Err(e) = cli.check_conflicts() {
        e.exit();
    }
    logging::init(cli.verbose);

    if let Err(e) = run(&cli) {
        print_error(&e.to_string());
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> error::Result<()> {
    let env = |key: &str| std::env::var(key).ok();

    // Configuration problems surface here, before any connection is made
    let file = config::discover_config(cli.connection.config.as_deref(), env)?;
    let config = InventoryConfig::resolve(file.merge(cli.connection.to_source()), env)?;

    handle_inventory_command(&cli.resolve_command(), &config)
}

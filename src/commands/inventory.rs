use tracing::info;

use crate::cli::Commands;
use crate::config::InventoryConfig;
use crate::error::Result;
use crate::esxi::{BuildOptions, BuildReport, InventoryBuilder, SshShell};
use crate::output::{output_data, output_inventory};

pub fn handle_inventory_command(cmd: &Commands, config: &InventoryConfig) -> Result<()> {
    let report = collect_inventory(config)?;

    match cmd {
        Commands::Inventory { format } => {
            output_inventory(&report.inventory, format)?;
        }
        Commands::Host { name, format } => {
            output_data(&report.inventory.host_json(name), format)?;
        }
        Commands::Vms { format } => {
            output_data(&report, format)?;
        }
    }
    Ok(())
}

/// Connect to the configured host and build the inventory from its VMs.
fn collect_inventory(config: &InventoryConfig) -> Result<BuildReport> {
    let shell = SshShell::connect(config)?;
    let report = InventoryBuilder::new(shell, BuildOptions::from(config)).build()?;
    info!("{} hosts from {}", report.inventory.hosts().count(), config.hostname);
    Ok(report)
}

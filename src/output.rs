use serde::Serialize;

use crate::error::Result;
use crate::inventory::Inventory;

pub fn output_data<T: Serialize>(data: &T, format: &str) -> Result<()> {
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(data)?);
        }
        "yaml" => {
            print!("{}", serde_yaml::to_string(data)?);
        }
        "pretty" | _ => {
            println!("{}", serde_json::to_string_pretty(data)?);
        }
    }
    Ok(())
}

/// Inventory in Ansible's shapes: `--list` JSON, YAML inventory, or the
/// `--graph` tree.
pub fn output_inventory(inventory: &Inventory, format: &str) -> Result<()> {
    match format {
        "yaml" => output_data(&inventory.to_yaml_value(), "yaml"),
        "pretty" => {
            print!("{}", inventory.render_graph());
            Ok(())
        }
        _ => output_data(&inventory.to_ansible_json(), "json"),
    }
}

pub fn print_error(message: &str) {
    eprintln!("\x1b[31m❌ Error: {}\x1b[0m", message);
}

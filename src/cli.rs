use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};

use crate::config::{ConfigSource, GroupBy};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "esxi-inventory")]
#[command(about = "Ansible dynamic inventory of the VMs running on an ESXi host")]
pub struct Cli {
    /// Print the whole inventory as Ansible inventory JSON (the default)
    #[arg(long, conflicts_with = "host")]
    pub list: bool,

    /// Print the variables of one inventory host as JSON
    #[arg(long, value_name = "NAME")]
    pub host: Option<String>,

    /// Log more (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// `--list` and `--host` stand in for a subcommand, so they cannot be
    /// given alongside one.
    pub fn check_conflicts(&self) -> Result<(), clap::Error> {
        if self.command.is_some() && (self.list || self.host.is_some()) {
            return Err(Cli::command().error(
                ErrorKind::ArgumentConflict,
                "--list and --host cannot be used with a subcommand",
            ));
        }
        Ok(())
    }

    /// The command to run; the bare `--list`/`--host` flags map onto
    /// subcommands with JSON output.
    pub fn resolve_command(&self) -> Commands {
        if let Some(command) = &self.command {
            return command.clone();
        }
        match &self.host {
            Some(name) if !self.list => Commands::Host {
                name: name.clone(),
                format: "json".to_string(),
            },
            _ => Commands::Inventory {
                format: "json".to_string(),
            },
        }
    }
}

#[derive(Args)]
pub struct ConnectionArgs {
    /// Inventory config file (YAML); defaults to $ESXI_INVENTORY_CONFIG
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// ESXi host FQDN or IP
    #[arg(long, global = true)]
    pub hostname: Option<String>,

    /// User to log in to the ESXi shell
    #[arg(short, long, global = true)]
    pub username: Option<String>,

    /// Password for the user; falls back to $ESXI_PASSWORD
    #[arg(long, global = true)]
    pub password: Option<String>,

    /// SSH port
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Keys to create groups from (guestfamily, guestid, geststate, notes)
    #[arg(short, long, value_enum, value_delimiter = ',', global = true)]
    pub group_by: Vec<GroupBy>,

    /// TCP connect timeout in seconds
    #[arg(long, value_name = "SECS", global = true)]
    pub connect_timeout: Option<u64>,

    /// Timeout for each remote command in seconds
    #[arg(long, value_name = "SECS", global = true)]
    pub command_timeout: Option<u64>,

    /// Retries for a remote command that fails to run
    #[arg(long, global = true)]
    pub retries: Option<u32>,

    /// Skip VM summaries (no notes, no notes groups)
    #[arg(long, global = true)]
    pub no_annotations: bool,
}

impl ConnectionArgs {
    /// Command line values as a config layer; unset flags leave the file alone.
    pub fn to_source(&self) -> ConfigSource {
        ConfigSource {
            plugin: None,
            hostname: self.hostname.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            port: self.port,
            group_by: (!self.group_by.is_empty()).then(|| self.group_by.clone()),
            connect_timeout: self.connect_timeout,
            command_timeout: self.command_timeout,
            command_retries: self.retries,
            annotations: self.no_annotations.then_some(false),
        }
    }
}

#[derive(Subcommand, Clone, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Build the full inventory
    Inventory {
        /// Output format (json, yaml, or pretty)
        #[arg(short, long, default_value = "json")]
        format: String,
    },

    /// Show the variables of one inventory host
    Host {
        /// Inventory hostname
        name: String,

        /// Output format (json, yaml, or pretty)
        #[arg(short, long, default_value = "json")]
        format: String,
    },

    /// List resolved VMs and the ones that were skipped
    Vms {
        /// Output format (json, yaml, or pretty)
        #[arg(short, long, default_value = "pretty")]
        format: String,
    },
}

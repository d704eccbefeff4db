use std::net::Ipv4Addr;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{GroupBy, InventoryConfig};
use crate::error::{InventoryError, Result};
use crate::esxi::commands;
use crate::esxi::parse::{parse_annotation, parse_guest_info, parse_guest_state, parse_vm_ids};
use crate::esxi::session::{CommandOutput, RemoteShell};
use crate::inventory::{Inventory, ALL};

const GUEST_NOT_RUNNING: &str = "notRunning";

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub group_by: Vec<GroupBy>,
    /// Fetch VM summaries for notes. Without it notes are always empty.
    pub annotations: bool,
    pub command_retries: u32,
}

impl From<&InventoryConfig> for BuildOptions {
    fn from(config: &InventoryConfig) -> Self {
        BuildOptions {
            group_by: config.group_by.clone(),
            annotations: config.annotations,
            command_retries: config.command_retries,
        }
    }
}

/// One fully resolved VM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VmRecord {
    pub id: String,
    pub hostname: String,
    pub ip_address: Ipv4Addr,
    pub guest_family: String,
    pub guest_id: String,
    pub guest_state: String,
    pub notes: String,
}

impl VmRecord {
    /// Host variables, in the order they are assigned.
    pub fn host_vars(&self) -> [(&'static str, String); 6] {
        [
            ("ansible_host", self.ip_address.to_string()),
            ("guest_family", self.guest_family.clone()),
            ("guest_name", self.guest_id.clone()),
            ("vm_state", self.guest_state.clone()),
            ("esxi_uid", self.id.clone()),
            ("notes", self.notes.clone()),
        ]
    }

    /// Group name this VM falls into for `key`, if any.
    pub fn group_value(&self, key: GroupBy) -> Option<&str> {
        let value = match key {
            GroupBy::GuestFamily => &self.guest_family,
            GroupBy::GuestId => &self.guest_id,
            // Only running VMs make it this far, so state never splits them
            GroupBy::GestState => return None,
            GroupBy::Notes => &self.notes,
        };
        Some(value.as_str()).filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedVm {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    #[serde(skip)]
    pub inventory: Inventory,
    pub vms: Vec<VmRecord>,
    pub skipped: Vec<SkippedVm>,
}

/// Walks every VM on the host and turns it into inventory entries.
pub struct InventoryBuilder<S: RemoteShell> {
    shell: S,
    options: BuildOptions,
}

impl<S: RemoteShell> InventoryBuilder<S> {
    pub fn new(shell: S, options: BuildOptions) -> Self {
        InventoryBuilder { shell, options }
    }

    /// Run discovery and the per-VM steps, then close the session whatever
    /// the outcome.
    pub fn build(mut self) -> Result<BuildReport> {
        let result = self.populate();
        self.shell.close();
        result
    }

    fn populate(&mut self) -> Result<BuildReport> {
        let ids = self.discover()?;
        info!("discovered {} VMs", ids.len());

        let mut report = BuildReport {
            inventory: Inventory::new(),
            vms: Vec::new(),
            skipped: Vec::new(),
        };

        for id in ids {
            match self.resolve_vm(&id) {
                Ok(record) => {
                    add_record(&mut report.inventory, &record, &self.options.group_by)?;
                    report.vms.push(record);
                }
                Err(e) if e.is_recoverable() => {
                    // Powered-off VMs are an expected skip
                    if matches!(e, InventoryError::NotRunning { .. }) {
                        info!("skipping VM {}: {}", id, e);
                    } else {
                        warn!("skipping VM {}: {}", id, e);
                    }
                    report.skipped.push(SkippedVm {
                        id,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            "inventory built: {} hosts in {} groups, {} VMs skipped",
            report.inventory.hosts().count(),
            report.inventory.groups().count() - 1,
            report.skipped.len()
        );
        Ok(report)
    }

    fn discover(&mut self) -> Result<Vec<String>> {
        let output = self.exec(commands::LIST_VMS)?;

        // grep exits 1 when there is nothing left after the header
        let listing = if output.exit_status == 1
            && output.stdout.trim().is_empty()
            && output.stderr.trim().is_empty()
        {
            String::new()
        } else {
            output.into_stdout(commands::LIST_VMS)?
        };

        Ok(parse_vm_ids(&listing))
    }

    fn resolve_vm(&mut self, id: &str) -> Result<VmRecord> {
        let guest_command = commands::get_guest(id);
        let vminfo = self.exec(&guest_command)?.into_stdout(&guest_command)?;

        let notes = if self.options.annotations {
            let summary_command = commands::get_summary(id);
            match self
                .exec(&summary_command)
                .and_then(|output| output.into_stdout(&summary_command))
            {
                Ok(summary) => parse_annotation(&summary),
                Err(e) => {
                    warn!("VM {}: {}; notes left empty", id, e);
                    String::new()
                }
            }
        } else {
            String::new()
        };

        let guest = parse_guest_info(&vminfo).map_err(|missing| {
            if parse_guest_state(&vminfo).as_deref() == Some(GUEST_NOT_RUNNING) {
                InventoryError::NotRunning { id: id.to_string() }
            } else {
                InventoryError::Extraction {
                    id: id.to_string(),
                    missing,
                }
            }
        })?;

        Ok(VmRecord {
            id: id.to_string(),
            hostname: guest.hostname,
            ip_address: guest.ip_address,
            guest_family: guest.guest_family,
            guest_id: guest.guest_id,
            guest_state: guest.guest_state,
            notes,
        })
    }

    /// Run a command, retrying transport-level failures up to
    /// `command_retries` times.
    fn exec(&mut self, command: &str) -> Result<CommandOutput> {
        let mut attempt = 0;
        loop {
            match self.shell.exec(command) {
                Ok(output) => return Ok(output),
                Err(e) if e.is_recoverable() && attempt < self.options.command_retries => {
                    attempt += 1;
                    debug!("retrying ({}/{}): {}", attempt, self.options.command_retries, e);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Add a host with its variables and lazily created group memberships.
fn add_record(inventory: &mut Inventory, record: &VmRecord, group_by: &[GroupBy]) -> Result<()> {
    if !inventory.add_host(&record.hostname) {
        warn!(
            "hostname {} reported by more than one VM; VM {} wins",
            record.hostname, record.id
        );
    }
    for (key, value) in record.host_vars() {
        inventory.set_variable(&record.hostname, key, value)?;
    }

    for key in group_by {
        if let Some(group) = record.group_value(*key) {
            if inventory.add_group(group) {
                debug!("created group {}", group);
            }
            if group == record.hostname {
                warn!("host {} shares its name with a group", record.hostname);
            }
            inventory.add_child(ALL, group)?;
            inventory.add_host_to_group(group, &record.hostname)?;
        }
    }
    Ok(())
}

//! In-memory Ansible inventory: hosts with variables, groups with member
//! hosts and child groups, and the implicit `all` root.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{json, Map, Value};

use crate::error::{InventoryError, Result};

pub const ALL: &str = "all";
pub const UNGROUPED: &str = "ungrouped";

pub type HostVars = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Group {
    pub hosts: BTreeSet<String>,
    pub children: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inventory {
    hosts: BTreeMap<String, HostVars>,
    groups: BTreeMap<String, Group>,
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new()
    }
}

impl Inventory {
    pub fn new() -> Self {
        let mut groups = BTreeMap::new();
        groups.insert(ALL.to_string(), Group::default());
        Inventory {
            hosts: BTreeMap::new(),
            groups,
        }
    }

    /// Register a host. Returns false if it already existed.
    pub fn add_host(&mut self, name: &str) -> bool {
        if self.hosts.contains_key(name) {
            return false;
        }
        self.hosts.insert(name.to_string(), HostVars::new());
        true
    }

    pub fn set_variable(&mut self, host: &str, key: &str, value: impl Into<String>) -> Result<()> {
        let vars = self
            .hosts
            .get_mut(host)
            .ok_or_else(|| InventoryError::UnknownEntity(host.to_string()))?;
        vars.insert(key.to_string(), value.into());
        Ok(())
    }

    /// Register a group. Returns false if it already existed.
    pub fn add_group(&mut self, name: &str) -> bool {
        if self.groups.contains_key(name) {
            return false;
        }
        self.groups.insert(name.to_string(), Group::default());
        true
    }

    /// Link `child` (a group, or failing that a host) under `group`.
    pub fn add_child(&mut self, group: &str, child: &str) -> Result<()> {
        if !self.groups.contains_key(group) {
            return Err(InventoryError::UnknownEntity(group.to_string()));
        }
        if group == child {
            return Ok(());
        }

        let is_group = self.groups.contains_key(child);
        if !is_group && !self.hosts.contains_key(child) {
            return Err(InventoryError::UnknownEntity(child.to_string()));
        }

        if let Some(entry) = self.groups.get_mut(group) {
            if is_group {
                entry.children.insert(child.to_string());
            } else {
                entry.hosts.insert(child.to_string());
            }
        }
        Ok(())
    }

    /// Make `host` a member of `group`, even when a group shares its name.
    pub fn add_host_to_group(&mut self, group: &str, host: &str) -> Result<()> {
        if !self.hosts.contains_key(host) {
            return Err(InventoryError::UnknownEntity(host.to_string()));
        }
        let entry = self
            .groups
            .get_mut(group)
            .ok_or_else(|| InventoryError::UnknownEntity(group.to_string()))?;
        entry.hosts.insert(host.to_string());
        Ok(())
    }

    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.hosts.keys().map(|h| h.as_str())
    }

    pub fn host_vars(&self, host: &str) -> Option<&HostVars> {
        self.hosts.get(host)
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.get(name)
    }

    /// Group names, `all` included.
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(|g| g.as_str())
    }

    /// Hosts that belong to no group besides `all`.
    pub fn ungrouped_hosts(&self) -> BTreeSet<&str> {
        let grouped: BTreeSet<&str> = self
            .groups
            .iter()
            .filter(|(name, _)| name.as_str() != ALL)
            .flat_map(|(_, g)| g.hosts.iter().map(|h| h.as_str()))
            .collect();
        self.hosts()
            .filter(|h| !grouped.contains(h))
            .collect()
    }

    /// Ansible dynamic inventory `--list` document.
    pub fn to_ansible_json(&self) -> Value {
        let mut doc = Map::new();

        let hostvars: Map<String, Value> = self
            .hosts
            .iter()
            .map(|(name, vars)| (name.clone(), json!(vars)))
            .collect();
        doc.insert("_meta".to_string(), json!({ "hostvars": hostvars }));

        let mut all_children: BTreeSet<&str> = self
            .group(ALL)
            .map(|g| g.children.iter().map(|c| c.as_str()).collect())
            .unwrap_or_default();
        all_children.insert(UNGROUPED);
        doc.insert(ALL.to_string(), json!({ "children": all_children }));

        for (name, group) in self.groups.iter().filter(|(name, _)| name.as_str() != ALL) {
            let mut entry = Map::new();
            if !group.hosts.is_empty() {
                entry.insert("hosts".to_string(), json!(group.hosts));
            }
            if !group.children.is_empty() {
                entry.insert("children".to_string(), json!(group.children));
            }
            doc.insert(name.clone(), Value::Object(entry));
        }

        let ungrouped = self.ungrouped_hosts();
        if !ungrouped.is_empty() {
            let mut hosts: BTreeSet<&str> = ungrouped;
            if let Some(existing) = self.groups.get(UNGROUPED) {
                hosts.extend(existing.hosts.iter().map(|h| h.as_str()));
            }
            doc.insert(UNGROUPED.to_string(), json!({ "hosts": hosts }));
        }

        Value::Object(doc)
    }

    /// Variables for one host in `--host` form; unknown hosts get `{}`.
    pub fn host_json(&self, host: &str) -> Value {
        match self.host_vars(host) {
            Some(vars) => json!(vars),
            None => json!({}),
        }
    }

    /// Ansible YAML inventory layout: variables under `all.hosts`, group
    /// membership under `all.children`.
    pub fn to_yaml_value(&self) -> Value {
        let hosts: Map<String, Value> = self
            .hosts
            .iter()
            .map(|(name, vars)| (name.clone(), json!(vars)))
            .collect();

        let mut all = Map::new();
        if !hosts.is_empty() {
            all.insert("hosts".to_string(), Value::Object(hosts));
        }
        let children = self.yaml_children(ALL, &mut vec![ALL]);
        if !children.is_empty() {
            all.insert("children".to_string(), Value::Object(children));
        }

        let mut doc = Map::new();
        doc.insert(ALL.to_string(), Value::Object(all));
        Value::Object(doc)
    }

    fn yaml_children<'a>(&'a self, group: &str, path: &mut Vec<&'a str>) -> Map<String, Value> {
        let mut children = Map::new();
        let Some(entry) = self.groups.get(group) else {
            return children;
        };
        for child in &entry.children {
            if path.contains(&child.as_str()) {
                continue;
            }
            let mut node = Map::new();
            if let Some(child_group) = self.groups.get(child) {
                if !child_group.hosts.is_empty() {
                    let members: Map<String, Value> =
                        child_group.hosts.iter().map(|h| (h.clone(), Value::Null)).collect();
                    node.insert("hosts".to_string(), Value::Object(members));
                }
                path.push(child.as_str());
                let nested = self.yaml_children(child, path);
                path.pop();
                if !nested.is_empty() {
                    node.insert("children".to_string(), Value::Object(nested));
                }
            }
            children.insert(child.clone(), Value::Object(node));
        }
        children
    }

    /// Tree rendering in the style of `ansible-inventory --graph`.
    pub fn render_graph(&self) -> String {
        let mut out = String::new();
        self.render_group(ALL, 0, &mut vec![], &mut out);
        out
    }

    fn render_group<'a>(
        &'a self,
        name: &'a str,
        depth: usize,
        path: &mut Vec<&'a str>,
        out: &mut String,
    ) {
        out.push_str(&graph_prefix(depth));
        out.push('@');
        out.push_str(name);
        out.push_str(":\n");

        if path.contains(&name) {
            return;
        }
        path.push(name);

        let ungrouped = self.ungrouped_hosts();
        let mut children: Vec<&str> =
            self.groups[name].children.iter().map(|c| c.as_str()).collect();
        if name == ALL && !ungrouped.is_empty() && !children.contains(&UNGROUPED) {
            children.push(UNGROUPED);
            children.sort_unstable();
        }

        for child in children {
            if self.groups.contains_key(child) {
                self.render_group(child, depth + 1, path, out);
            } else {
                // Synthetic `ungrouped` node
                out.push_str(&graph_prefix(depth + 1));
                out.push_str("@ungrouped:\n");
                for host in &ungrouped {
                    out.push_str(&graph_prefix(depth + 2));
                    out.push_str(host);
                    out.push('\n');
                }
            }
        }

        let mut hosts: BTreeSet<&str> =
            self.groups[name].hosts.iter().map(|h| h.as_str()).collect();
        if name == UNGROUPED {
            hosts.extend(ungrouped.iter().copied());
        }
        for host in hosts {
            out.push_str(&graph_prefix(depth + 1));
            out.push_str(host);
            out.push('\n');
        }

        path.pop();
    }
}

fn graph_prefix(depth: usize) -> String {
    if depth == 0 {
        return String::new();
    }
    format!("  {}|--", "|  ".repeat(depth - 1))
}

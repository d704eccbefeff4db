//! Field extraction from `vim-cmd` text output.
//!
//! `vim-cmd` prints managed objects as `key = "value",` lines. Each field has
//! its own named-capture pattern so a missing field can be reported on its own.

use std::net::Ipv4Addr;
use std::sync::LazyLock;

use regex::Regex;

static HOSTNAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"hostName\s*=\s*"(?P<hostname>[^"]*)""#).expect("valid regex"));

static IP_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"ipAddress\s*=\s*"(?P<ip>\d{1,3}(?:\.\d{1,3}){3})""#).expect("valid regex")
});

static GUEST_FAMILY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"guestFamily[^=\n]*=\s*"(?P<family>[^"]*)""#).expect("valid regex")
});

static GUEST_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"guestId[^=\n]*=\s*"(?P<id>[^"]*)""#).expect("valid regex"));

static GUEST_STATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"guestState\s*=\s*"(?P<state>[^"]*)""#).expect("valid regex")
});

static ANNOTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"annotation\s*=\s*"(?P<notes>[^"]*)""#).expect("valid regex")
});

/// Fields taken from `vim-cmd vmsvc/get.guest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestInfo {
    pub hostname: String,
    pub ip_address: Ipv4Addr,
    pub guest_family: String,
    pub guest_id: String,
    pub guest_state: String,
}

fn capture(re: &Regex, group: &str, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.name(group))
        .map(|m| m.as_str().to_string())
}

/// First `ipAddress = "a.b.c.d"` whose value is a real IPv4 address. The
/// top-level entry may hold an IPv6 address, in which case a NIC entry wins.
fn capture_ipv4(text: &str) -> Option<Ipv4Addr> {
    IP_ADDRESS
        .captures_iter(text)
        .filter_map(|c| c.name("ip"))
        .find_map(|m| m.as_str().parse().ok())
}

/// Value of `guestState`, if the guest reports one at all.
pub fn parse_guest_state(text: &str) -> Option<String> {
    capture(&GUEST_STATE, "state", text)
}

/// Extract every required field, or the names of those that are missing.
pub fn parse_guest_info(text: &str) -> Result<GuestInfo, Vec<&'static str>> {
    let hostname = capture(&HOSTNAME, "hostname", text).filter(|h| !h.is_empty());
    let ip_address = capture_ipv4(text);
    let guest_family = capture(&GUEST_FAMILY, "family", text);
    let guest_id = capture(&GUEST_ID, "id", text);
    let guest_state = capture(&GUEST_STATE, "state", text);

    match (hostname, ip_address, guest_family, guest_id, guest_state) {
        (
            Some(hostname),
            Some(ip_address),
            Some(guest_family),
            Some(guest_id),
            Some(guest_state),
        ) => Ok(GuestInfo {
            hostname,
            ip_address,
            guest_family,
            guest_id,
            guest_state,
        }),
        (hostname, ip_address, guest_family, guest_id, guest_state) => {
            let mut missing = Vec::new();
            if hostname.is_none() {
                missing.push("hostname");
            }
            if ip_address.is_none() {
                missing.push("ip_address");
            }
            if guest_family.is_none() {
                missing.push("guest_family");
            }
            if guest_id.is_none() {
                missing.push("guest_id");
            }
            if guest_state.is_none() {
                missing.push("guest_state");
            }
            Err(missing)
        }
    }
}

/// VM notes from `vim-cmd vmsvc/get.summary`; empty when there are none.
pub fn parse_annotation(summary: &str) -> String {
    capture(&ANNOTATION, "notes", summary).unwrap_or_default()
}

/// VM identifiers from the listing command, in order.
pub fn parse_vm_ids(listing: &str) -> Vec<String> {
    listing
        .trim()
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter(|id| *id != "Vmid")
        .map(|id| id.to_string())
        .collect()
}

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::io::Write;

fn esxi_inventory() -> assert_cmd::Command {
    let mut cmd: assert_cmd::Command = cargo_bin_cmd!("esxi-inventory").into();
    cmd.env_remove("ESXI_PASSWORD")
        .env_remove("ESXI_INVENTORY_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

fn write_config(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
    let config_path = dir.path().join("esxi.yml");
    let mut f = std::fs::File::create(&config_path).unwrap();
    write!(f, "{}", body).unwrap();
    config_path
}

#[test]
fn help_works() {
    esxi_inventory()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Ansible dynamic inventory"));
}

#[test]
fn missing_hostname_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(
        &dir,
        r#"
plugin: community.esxi.esxi_inventory
username: root
password: secret
"#,
    );

    esxi_inventory()
        .args(["--config", config_path.to_str().unwrap(), "--list"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Missing required value 'hostname'"));
}

#[test]
fn missing_username_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(&dir, "hostname: esx01.example.com\nusername: ''\n");

    esxi_inventory()
        .args(["--config", config_path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Missing required value 'username'"));
}

#[test]
fn missing_password_without_env_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(&dir, "hostname: esx01.example.com\nusername: root\n");

    esxi_inventory()
        .args(["--config", config_path.to_str().unwrap(), "inventory"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Missing required value 'password'"));
}

#[test]
fn flags_fill_in_for_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(&dir, "username: root\n");

    // Only the password is still missing once --hostname is given
    esxi_inventory()
        .args([
            "--config",
            config_path.to_str().unwrap(),
            "--hostname",
            "esx01.example.com",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Missing required value 'password'"));
}

#[test]
fn unreadable_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.yml");

    esxi_inventory()
        .args(["--config", missing.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read config"));
}

#[test]
fn invalid_group_by_in_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(&dir, "hostname: esx\ngroup_by:\n  - datastore\n");

    esxi_inventory()
        .args(["--config", config_path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse config"));
}

#[test]
fn invalid_group_by_flag_is_rejected() {
    esxi_inventory()
        .args(["--group-by", "datastore"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn connection_failure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(
        &dir,
        "hostname: 127.0.0.1\nport: 1\nusername: root\nconnect_timeout: 2\n",
    );

    esxi_inventory()
        .env("ESXI_PASSWORD", "secret")
        .args(["--config", config_path.to_str().unwrap(), "--list"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("failed to connect to 127.0.0.1:1"));
}

#[test]
fn zero_timeout_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(
        &dir,
        "hostname: 127.0.0.1\nusername: root\npassword: secret\nconnect_timeout: 0\n",
    );

    esxi_inventory()
        .args(["--config", config_path.to_str().unwrap(), "--list"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Invalid value for 'connect_timeout'"))
        .stderr(predicate::str::contains("failed to connect").not());
}

#[test]
fn host_flag_with_subcommand_is_rejected() {
    esxi_inventory()
        .args(["--host", "web1", "vms"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("cannot be used with a subcommand"));
}

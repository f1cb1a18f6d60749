#![allow(dead_code)]

use anyhow::{bail, Result};
use assert_cmd::cargo;
use serde_json::Value;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Command isolated from the user's configuration directory
pub fn base_cmd(home: &TempDir) -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("valorisation"));
    cmd.env("HOME", home.path());
    cmd.env("XDG_CONFIG_HOME", home.path().join(".config"));
    cmd.env("RUST_LOG", "warn");
    cmd.current_dir(home.path());
    cmd
}

pub fn run_cmd(home: &TempDir, args: &[&str]) -> Result<Output> {
    let output = base_cmd(home).args(args).output()?;
    if !output.status.success() {
        bail!(
            "command {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(output)
}

pub fn run_cmd_json(home: &TempDir, args: &[&str]) -> Result<Value> {
    let mut full_args = vec!["--json"];
    full_args.extend_from_slice(args);
    let output = run_cmd(home, &full_args)?;
    Ok(serde_json::from_slice(&output.stdout)?)
}

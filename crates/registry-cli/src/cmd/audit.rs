use crate::cmd::open_registry;
use crate::output::{print_json, print_table};
use anyhow::Context;
use registry_core::types::Caller;
use std::path::Path;

pub fn run(root: &Path, caller: &Caller, limit: Option<usize>, json: bool) -> anyhow::Result<()> {
    let registry = open_registry(root)?;
    let entries = registry
        .audit_tail(caller, limit)
        .context("failed to read audit trail")?;

    if json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("Audit trail is empty.");
        return Ok(());
    }
    let rows = entries
        .iter()
        .map(|e| {
            vec![
                e.seq.to_string(),
                e.at.format("%Y-%m-%d %H:%M:%S").to_string(),
                e.user.clone(),
                e.role.to_string(),
                e.action.to_string(),
            ]
        })
        .collect();
    print_table(&["SEQ", "AT", "USER", "ROLE", "ACTION"], rows);
    Ok(())
}

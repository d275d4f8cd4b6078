use crate::cmd::{open_registry, read_input};
use crate::output::{print_json, print_table};
use anyhow::Context;
use registry_core::reconcile::{parse_batch, SyncOutcome};
use registry_core::types::Caller;
use std::path::Path;

pub fn run(root: &Path, caller: &Caller, file: &Path, json: bool) -> anyhow::Result<()> {
    let registry = open_registry(root)?;
    let text = read_input(file)?;
    let ops = parse_batch(&text).context("invalid sync batch")?;
    let results = registry.reconcile_raw(caller, ops);

    if json {
        return print_json(&serde_json::json!({ "results": results }));
    }
    if results.is_empty() {
        println!("No operations.");
        return Ok(());
    }
    let rows = results
        .iter()
        .map(|r| {
            let status = match (&r.outcome, &r.error) {
                (Some(SyncOutcome::Committed), _) => "committed".to_string(),
                (Some(SyncOutcome::Pending), _) => "pending".to_string(),
                (Some(SyncOutcome::Duplicate), _) => "duplicate".to_string(),
                (None, Some(e)) => format!("{}: {}", e.kind, e.message),
                (None, None) => "failed".to_string(),
            };
            let target = r
                .record_id
                .clone()
                .or_else(|| r.pending_id.clone())
                .unwrap_or_default();
            vec![r.op_id.clone(), status, target]
        })
        .collect();
    print_table(&["OP", "RESULT", "TARGET"], rows);
    Ok(())
}

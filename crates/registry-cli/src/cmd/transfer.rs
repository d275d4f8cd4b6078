use crate::cmd::{open_registry, read_input};
use crate::output::{print_json, print_table};
use anyhow::Context;
use registry_core::io::atomic_write;
use registry_core::types::Caller;
use std::path::Path;

pub fn import(root: &Path, caller: &Caller, file: &Path, json: bool) -> anyhow::Result<()> {
    let registry = open_registry(root)?;
    let text = read_input(file)?;
    let report = registry
        .import_csv(caller, text.as_bytes())
        .context("import failed")?;

    if json {
        return print_json(&report);
    }
    println!(
        "Imported {} row(s), skipped {}.",
        report.imported,
        report.failures.len()
    );
    if !report.failures.is_empty() {
        let rows = report
            .failures
            .iter()
            .map(|f| vec![f.row.to_string(), f.reason.clone()])
            .collect();
        print_table(&["ROW", "REASON"], rows);
    }
    Ok(())
}

pub fn export(root: &Path, caller: &Caller, out: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let registry = open_registry(root)?;

    let Some(path) = out else {
        let stdout = std::io::stdout();
        registry
            .export_csv(caller, stdout.lock())
            .context("export failed")?;
        return Ok(());
    };

    let mut buf = Vec::new();
    let rows = registry
        .export_csv(caller, &mut buf)
        .context("export failed")?;
    atomic_write(path, &buf).with_context(|| format!("failed to write {}", path.display()))?;

    if json {
        print_json(&serde_json::json!({
            "path": path.display().to_string(),
            "rows": rows,
        }))?;
    } else {
        println!("Exported {rows} student(s) to {}", path.display());
    }
    Ok(())
}

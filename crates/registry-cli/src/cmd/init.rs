use crate::output::print_json;
use anyhow::Context;
use registry_core::{paths, Registry};
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let report = Registry::init(root).context("failed to initialize registry")?;

    if json {
        print_json(&serde_json::json!({
            "root": root.display().to_string(),
            "config_created": report.config_created,
            "store_created": report.store_created,
        }))?;
        return Ok(());
    }

    let status = |created: bool| if created { "created" } else { "exists" };
    println!("Registry ready at {}", root.display());
    println!("  {}  {}", paths::CONFIG_FILE, status(report.config_created));
    println!("  {}  {}", paths::STORE_FILE, status(report.store_created));
    Ok(())
}

use crate::cmd::open_registry;
use crate::output::{print_json, print_table};
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let registry = open_registry(root)?;
    let meta = registry.meta();

    if json {
        return print_json(&meta);
    }

    println!("{}", meta.school);
    println!();
    let rows = meta
        .specialists
        .iter()
        .map(|t| {
            vec![
                t.code.clone(),
                t.short_name.clone(),
                t.full_name.clone(),
                t.machine_name.clone(),
            ]
        })
        .collect();
    print_table(&["CODE", "SHORT", "NAME", "MACHINE NAME"], rows);
    println!();
    let rows = meta
        .registry_types
        .iter()
        .map(|(label, code)| vec![code.clone(), label.clone()])
        .collect();
    print_table(&["TYPE", "LABEL"], rows);
    Ok(())
}

use crate::cmd::open_registry;
use crate::cmd::student::print_records;
use crate::output::print_json;
use std::path::Path;

pub fn run(root: &Path, query: &str, json: bool) -> anyhow::Result<()> {
    let registry = open_registry(root)?;
    let hits = registry.search(query);

    if json {
        return print_json(&hits);
    }
    if hits.is_empty() {
        println!("No matches.");
        return Ok(());
    }
    print_records(&hits);
    Ok(())
}

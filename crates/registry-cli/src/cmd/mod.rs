pub mod audit;
pub mod config;
pub mod init;
pub mod meta;
pub mod pending;
pub mod search;
pub mod student;
pub mod sync;
pub mod transfer;

use anyhow::Context;
use registry_core::Registry;
use std::io::Read;
use std::path::Path;

pub(crate) fn open_registry(root: &Path) -> anyhow::Result<Registry> {
    Registry::open(root).with_context(|| format!("failed to open registry at {}", root.display()))
}

/// Read a whole input file; `-` means stdin.
pub(crate) fn read_input(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

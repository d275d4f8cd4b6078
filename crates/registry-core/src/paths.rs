use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const REGISTRY_DIR: &str = ".registry";

pub const CONFIG_FILE: &str = ".registry/config.yaml";
pub const STORE_FILE: &str = ".registry/records.yaml";
pub const AUDIT_FILE: &str = ".registry/audit.redb";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn registry_dir(root: &Path) -> PathBuf {
    root.join(REGISTRY_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn store_path(root: &Path) -> PathBuf {
    root.join(STORE_FILE)
}

pub fn audit_path(root: &Path) -> PathBuf {
    root.join(AUDIT_FILE)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_helpers() {
        let root = Path::new("/srv/school");
        assert_eq!(
            config_path(root),
            PathBuf::from("/srv/school/.registry/config.yaml")
        );
        assert_eq!(
            store_path(root),
            PathBuf::from("/srv/school/.registry/records.yaml")
        );
        assert_eq!(
            audit_path(root),
            PathBuf::from("/srv/school/.registry/audit.redb")
        );
    }
}

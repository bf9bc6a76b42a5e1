use std::fs;
use std::path::{Component, Path, PathBuf};

use super::object_store::ObjectStore;

/// Writes objects beneath a root directory, one file per key.
#[derive(Debug, Clone)]
pub struct LocalDirectoryStore {
    root: PathBuf,
}

impl LocalDirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, String> {
        let relative = Path::new(key);
        let escapes_root = relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_)));
        if key.is_empty() || escapes_root {
            return Err(format!("object key '{key}' does not resolve under the store root"));
        }
        Ok(self.root.join(relative))
    }
}

impl ObjectStore for LocalDirectoryStore {
    fn write_object(&self, key: &str, body: &[u8]) -> Result<(), String> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|error| {
                format!("failed to create directory {}: {error}", parent.display())
            })?;
        }
        fs::write(&path, body)
            .map_err(|error| format!("failed to write object {}: {error}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_nested_key_beneath_root() {
        let root = tempfile::tempdir().expect("temp dir should be created");
        let store = LocalDirectoryStore::new(root.path());

        store
            .write_object("formatted/others/1.json", b"{\"id\":\"1\"}")
            .expect("write should succeed");

        let written = fs::read(root.path().join("formatted/others/1.json"))
            .expect("object file should exist");
        assert_eq!(written, b"{\"id\":\"1\"}");
    }

    #[test]
    fn overwrites_existing_object() {
        let root = tempfile::tempdir().expect("temp dir should be created");
        let store = LocalDirectoryStore::new(root.path());

        store.write_object("a/b.json", b"first").expect("first write");
        store.write_object("a/b.json", b"second").expect("second write");

        assert_eq!(
            fs::read(root.path().join("a/b.json")).expect("object file should exist"),
            b"second"
        );
    }

    #[test]
    fn rejects_keys_escaping_root() {
        let root = tempfile::tempdir().expect("temp dir should be created");
        let store = LocalDirectoryStore::new(root.path());

        for key in ["", "../outside.json", "formatted/../../x.json", "/etc/passwd"] {
            let error = store
                .write_object(key, b"{}")
                .expect_err("escaping key should be rejected");
            assert!(error.contains("does not resolve under the store root"), "{key}");
        }
    }
}

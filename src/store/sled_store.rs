//! Durable store backend on sled

use tracing::error;

use super::KvStore;

/// sled-backed durable store
///
/// I/O failures are logged and surface as absent values rather than
/// panics; a node operator restarts with an intact log rather than a
/// half-written state.
pub struct SledStore {
    tree: sled::Tree,
}

impl SledStore {
    /// Open (or create) a store at `path`
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self, sled::Error> {
        let db = sled::open(path)?;
        let tree = db.open_tree("staking")?;
        Ok(Self { tree })
    }

    /// Wrap an already-open tree
    pub fn from_tree(tree: sled::Tree) -> Self {
        Self { tree }
    }

    /// Open a temporary store, removed when dropped
    pub fn temporary() -> Result<Self, sled::Error> {
        let db = sled::Config::new().temporary(true).open()?;
        let tree = db.open_tree("staking")?;
        Ok(Self { tree })
    }

    /// Flush pending writes to disk
    pub fn flush(&self) {
        if let Err(e) = self.tree.flush() {
            error!(error = %e, "sled flush failed");
        }
    }
}

impl KvStore for SledStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.tree.get(key) {
            Ok(value) => value.map(|v| v.to_vec()),
            Err(e) => {
                error!(error = %e, "sled get failed");
                None
            }
        }
    }

    fn set(&mut self, key: &[u8], value: &[u8]) {
        if let Err(e) = self.tree.insert(key, value) {
            error!(error = %e, "sled insert failed");
        }
    }

    fn delete(&mut self, key: &[u8]) {
        if let Err(e) = self.tree.remove(key) {
            error!(error = %e, "sled remove failed");
        }
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.tree
            .scan_prefix(prefix)
            .filter_map(|res| match res {
                Ok((k, v)) => Some((k.to_vec(), v.to_vec())),
                Err(e) => {
                    error!(error = %e, "sled scan failed");
                    None
                }
            })
            .collect()
    }
}

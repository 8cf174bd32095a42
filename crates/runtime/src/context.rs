//! Per-transaction execution context.
//!
//! Wraps the world-state snapshot and records every access in order. Reads
//! capture the stored version before the value is returned; writes are
//! buffered, never applied. A read after an in-transaction write returns the
//! buffered value (read-your-own-writes) while the read entry still records
//! the version that was on disk.

use crate::ChaincodeError;
use litefab_chain::{ReadEntry, RwSet, WriteEntry};
use litefab_storage::WorldStateStore;

pub struct ExecutionContext<'a> {
    store: &'a WorldStateStore,
    reads: Vec<ReadEntry>,
    writes: Vec<WriteEntry>,
    creator_id: String,
    creator_org_id: String,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(store: &'a WorldStateStore, creator_id: &str, creator_org_id: &str) -> Self {
        Self {
            store,
            reads: Vec::new(),
            writes: Vec::new(),
            creator_id: creator_id.to_string(),
            creator_org_id: creator_org_id.to_string(),
        }
    }

    pub fn creator_id(&self) -> &str {
        &self.creator_id
    }

    pub fn creator_org_id(&self) -> &str {
        &self.creator_org_id
    }

    /// Read a key. The stored version is recorded before the value is
    /// returned; the latest buffered write to the same key, if any, shadows
    /// the stored value.
    pub fn get_state(&mut self, key: &str) -> Result<Option<String>, ChaincodeError> {
        let version = self.store.get_version(key)?;
        self.reads.push(ReadEntry {
            key: key.to_string(),
            version,
        });
        // latest buffered write wins over the stored value
        if let Some(entry) = self.writes.iter().rev().find(|w| w.key == key) {
            return Ok(entry.value.clone());
        }
        Ok(self.store.get(key)?)
    }

    pub fn put_state(&mut self, key: &str, value: &str) {
        self.writes.push(WriteEntry {
            key: key.to_string(),
            value: Some(value.to_string()),
        });
    }

    pub fn del_state(&mut self, key: &str) {
        self.writes.push(WriteEntry {
            key: key.to_string(),
            value: None,
        });
    }

    pub fn into_rw_set(self) -> RwSet {
        RwSet {
            reads: self.reads,
            writes: self.writes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use litefab_chain::Version;

    fn store() -> (tempfile::TempDir, WorldStateStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = WorldStateStore::open(dir.path(), "default").expect("open");
        (dir, store)
    }

    #[test]
    fn read_your_own_writes_keeps_original_version() {
        let (_dir, store) = store();
        let committed = RwSet {
            reads: vec![],
            writes: vec![WriteEntry {
                key: "k".to_string(),
                value: Some("old".to_string()),
            }],
        };
        store.apply(&committed, 3, 0).expect("seed");

        let mut ctx = ExecutionContext::new(&store, "Org1Client", "Org1");
        assert_eq!(ctx.get_state("k").expect("read"), Some("old".to_string()));
        ctx.put_state("k", "new");
        // the logical value is visible...
        assert_eq!(ctx.get_state("k").expect("read"), Some("new".to_string()));
        ctx.del_state("k");
        assert_eq!(ctx.get_state("k").expect("read"), None);

        // ...but every read entry still records the stored version
        let rw_set = ctx.into_rw_set();
        assert_eq!(rw_set.reads.len(), 3);
        for read in &rw_set.reads {
            assert_eq!(read.version, Some(Version::new(3, 0)));
        }
        assert_eq!(rw_set.writes.len(), 2);
    }

    #[test]
    fn unwritten_key_reads_as_absent_with_no_version() {
        let (_dir, store) = store();
        let mut ctx = ExecutionContext::new(&store, "Org1Client", "Org1");
        assert_eq!(ctx.get_state("missing").expect("read"), None);
        let rw_set = ctx.into_rw_set();
        assert_eq!(rw_set.reads[0].version, None);
        assert!(rw_set.writes.is_empty());
    }

    #[test]
    fn writes_are_buffered_not_applied() {
        let (_dir, store) = store();
        let mut ctx = ExecutionContext::new(&store, "Org1Client", "Org1");
        ctx.put_state("k", "v");
        drop(ctx);
        assert_eq!(store.get("k").expect("get"), None);
    }
}

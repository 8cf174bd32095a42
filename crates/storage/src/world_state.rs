//! Versioned key-value world state with MVCC validation.
//!
//! Keys inside the LMDB environment:
//! - `state:<channel>:<key>`    raw UTF-8 value
//! - `version:<channel>:<key>`  bincode Version {blockNum, txNum}
//!
//! Versions are written only by the committer through [`WorldStateStore::apply`];
//! endorsers read values and versions but never write. After `apply`, every
//! write entry's key carries version `(block_num, tx_num)`, deletes included,
//! so a deleted key still witnesses the transaction that removed it.

use crate::{StorageError, LMDB_MAP_SIZE};
use lmdb::{Cursor, Database, DatabaseFlags, Environment, Transaction, WriteFlags};
use litefab_chain::{ChaincodeMetadata, ReadEntry, RwSet, Version};
use std::path::Path;

pub struct WorldStateStore {
    env: Environment,
    db: Database,
    channel: String,
}

impl WorldStateStore {
    /// Open (creating if needed) the world state under `<data_dir>/worldstate`.
    pub fn open(data_dir: impl AsRef<Path>, channel: &str) -> Result<Self, StorageError> {
        let path = data_dir.as_ref().join("worldstate");
        std::fs::create_dir_all(&path)?;
        let env = Environment::new()
            .set_max_dbs(1)
            .set_map_size(LMDB_MAP_SIZE)
            .open(&path)?;
        let db = env.create_db(Some("worldstate"), DatabaseFlags::empty())?;
        Ok(Self {
            env,
            db,
            channel: channel.to_string(),
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    fn state_key(&self, key: &str) -> String {
        format!("state:{}:{}", self.channel, key)
    }

    fn version_key(&self, key: &str) -> String {
        format!("version:{}:{}", self.channel, key)
    }

    /// Current value of a key, if present.
    pub fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let rtxn = self.env.begin_ro_txn()?;
        match rtxn.get(self.db, &self.state_key(key).as_bytes()) {
            Ok(raw) => Ok(Some(String::from_utf8(raw.to_vec()).map_err(|_| {
                StorageError::Corrupt(format!("non-UTF-8 value under key {key:?}"))
            })?)),
            Err(lmdb::Error::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Version of the last committed write to a key; `None` if the key was
    /// never written.
    pub fn get_version(&self, key: &str) -> Result<Option<Version>, StorageError> {
        let rtxn = self.env.begin_ro_txn()?;
        match rtxn.get(self.db, &self.version_key(key).as_bytes()) {
            Ok(raw) => Ok(Some(bincode::deserialize(raw)?)),
            Err(lmdb::Error::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Raw state mutator. Does not touch the version column; commit-path
    /// writes go through [`Self::apply`].
    pub fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut wtxn = self.env.begin_rw_txn()?;
        wtxn.put(
            self.db,
            &self.state_key(key).as_bytes(),
            &value.as_bytes(),
            WriteFlags::empty(),
        )?;
        wtxn.commit()?;
        Ok(())
    }

    /// Raw state delete. Missing keys are tolerated.
    pub fn del(&self, key: &str) -> Result<(), StorageError> {
        let mut wtxn = self.env.begin_rw_txn()?;
        match wtxn.del(self.db, &self.state_key(key).as_bytes(), None) {
            Ok(()) | Err(lmdb::Error::NotFound) => {}
            Err(e) => return Err(e.into()),
        }
        wtxn.commit()?;
        Ok(())
    }

    /// Apply a transaction's writes in order, stamping each written key with
    /// version `(block_num, tx_num)`. All writes of the transaction land in
    /// one LMDB write transaction.
    pub fn apply(&self, rw_set: &RwSet, block_num: u64, tx_num: u64) -> Result<(), StorageError> {
        let version = bincode::serialize(&Version::new(block_num, tx_num))?;
        let mut wtxn = self.env.begin_rw_txn()?;
        for write in &rw_set.writes {
            let state_key = self.state_key(&write.key);
            match &write.value {
                Some(value) => {
                    wtxn.put(
                        self.db,
                        &state_key.as_bytes(),
                        &value.as_bytes(),
                        WriteFlags::empty(),
                    )?;
                }
                None => match wtxn.del(self.db, &state_key.as_bytes(), None) {
                    Ok(()) | Err(lmdb::Error::NotFound) => {}
                    Err(e) => return Err(e.into()),
                },
            }
            wtxn.put(
                self.db,
                &self.version_key(&write.key).as_bytes(),
                &version,
                WriteFlags::empty(),
            )?;
        }
        wtxn.commit()?;
        Ok(())
    }

    /// MVCC check: every recorded read must match the current version
    /// exactly, including the never-written (`None`) versus present
    /// distinction. The first mismatch fails the whole set.
    pub fn validate_read_set(&self, reads: &[ReadEntry]) -> Result<bool, StorageError> {
        let rtxn = self.env.begin_ro_txn()?;
        for read in reads {
            let current = match rtxn.get(self.db, &self.version_key(&read.key).as_bytes()) {
                Ok(raw) => Some(bincode::deserialize::<Version>(raw)?),
                Err(lmdb::Error::NotFound) => None,
                Err(e) => return Err(e.into()),
            };
            if current != read.version {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Ordered iteration over user keys in this channel starting with
    /// `prefix`.
    pub fn keys_by_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let namespace = format!("state:{}:", self.channel);
        let start = format!("{}{}", namespace, prefix);
        let rtxn = self.env.begin_ro_txn()?;
        let mut cursor = rtxn.open_ro_cursor(self.db)?;
        let mut keys = Vec::new();
        for (key, _value) in cursor.iter_from(start.as_bytes()) {
            if !key.starts_with(start.as_bytes()) {
                break;
            }
            let user_key = String::from_utf8(key[namespace.len()..].to_vec())
                .map_err(|_| StorageError::Corrupt("non-UTF-8 state key".to_string()))?;
            keys.push(user_key);
        }
        Ok(keys)
    }

    fn chaincode_key(chaincode_id: &str) -> String {
        format!("chaincode:{}", chaincode_id)
    }

    /// Record a deployed chaincode (id, version, endorsement policy) in the
    /// channel namespace, stamped like any committed write.
    pub fn put_chaincode_metadata(
        &self,
        meta: &ChaincodeMetadata,
        block_num: u64,
        tx_num: u64,
    ) -> Result<(), StorageError> {
        let key = Self::chaincode_key(&meta.chaincode_id);
        let value = serde_json::to_string(meta)
            .map_err(|e| StorageError::Corrupt(format!("chaincode metadata encode: {e}")))?;
        let version = bincode::serialize(&Version::new(block_num, tx_num))?;
        let mut wtxn = self.env.begin_rw_txn()?;
        wtxn.put(
            self.db,
            &self.state_key(&key).as_bytes(),
            &value.as_bytes(),
            WriteFlags::empty(),
        )?;
        wtxn.put(
            self.db,
            &self.version_key(&key).as_bytes(),
            &version,
            WriteFlags::empty(),
        )?;
        wtxn.commit()?;
        Ok(())
    }

    pub fn get_chaincode_metadata(
        &self,
        chaincode_id: &str,
    ) -> Result<Option<ChaincodeMetadata>, StorageError> {
        match self.get(&Self::chaincode_key(chaincode_id))? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw).map_err(|e| {
                StorageError::Corrupt(format!("chaincode metadata decode: {e}"))
            })?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use litefab_chain::{EndorsementPolicy, PolicyType, WriteEntry};

    fn store() -> (tempfile::TempDir, WorldStateStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = WorldStateStore::open(dir.path(), "default").expect("open");
        (dir, store)
    }

    fn writes(entries: &[(&str, Option<&str>)]) -> RwSet {
        RwSet {
            reads: vec![],
            writes: entries
                .iter()
                .map(|(key, value)| WriteEntry {
                    key: key.to_string(),
                    value: value.map(|v| v.to_string()),
                })
                .collect(),
        }
    }

    #[test]
    fn apply_stamps_versions_for_puts_and_deletes() {
        let (_dir, store) = store();
        store
            .apply(&writes(&[("balance:Alice", Some("500"))]), 1, 0)
            .expect("apply");
        assert_eq!(store.get("balance:Alice").expect("get"), Some("500".into()));
        assert_eq!(
            store.get_version("balance:Alice").expect("version"),
            Some(Version::new(1, 0))
        );

        store
            .apply(&writes(&[("balance:Alice", None)]), 2, 3)
            .expect("apply delete");
        assert_eq!(store.get("balance:Alice").expect("get"), None);
        // a delete still stamps the version of the deleting transaction
        assert_eq!(
            store.get_version("balance:Alice").expect("version"),
            Some(Version::new(2, 3))
        );
    }

    #[test]
    fn validate_read_set_is_strict() {
        let (_dir, store) = store();
        store
            .apply(&writes(&[("k1", Some("v1"))]), 0, 0)
            .expect("apply");

        let matching = vec![ReadEntry {
            key: "k1".to_string(),
            version: Some(Version::new(0, 0)),
        }];
        assert!(store.validate_read_set(&matching).expect("validate"));

        let stale = vec![ReadEntry {
            key: "k1".to_string(),
            version: Some(Version::new(0, 1)),
        }];
        assert!(!store.validate_read_set(&stale).expect("validate"));

        // a read that observed "never written" fails once the key exists
        let phantom = vec![ReadEntry {
            key: "k1".to_string(),
            version: None,
        }];
        assert!(!store.validate_read_set(&phantom).expect("validate"));

        // and the converse: expecting a version on an unwritten key fails
        let missing = vec![ReadEntry {
            key: "k2".to_string(),
            version: Some(Version::new(0, 0)),
        }];
        assert!(!store.validate_read_set(&missing).expect("validate"));

        // never-written key read as absent verifies
        let absent = vec![ReadEntry {
            key: "k2".to_string(),
            version: None,
        }];
        assert!(store.validate_read_set(&absent).expect("validate"));
    }

    #[test]
    fn reapplying_the_same_writes_restamps_the_same_versions() {
        let (_dir, store) = store();
        let set = writes(&[("k1", Some("v1")), ("k2", None)]);
        store.apply(&set, 5, 1).expect("apply");
        store.apply(&set, 5, 1).expect("reapply");
        assert_eq!(store.get("k1").expect("get"), Some("v1".into()));
        assert_eq!(
            store.get_version("k1").expect("version"),
            Some(Version::new(5, 1))
        );
        assert_eq!(
            store.get_version("k2").expect("version"),
            Some(Version::new(5, 1))
        );
    }

    #[test]
    fn keys_by_prefix_is_ordered_and_scoped() {
        let (_dir, store) = store();
        store
            .apply(
                &writes(&[
                    ("balance:Bob", Some("1")),
                    ("balance:Alice", Some("2")),
                    ("totalSupply", Some("3")),
                ]),
                0,
                0,
            )
            .expect("apply");

        assert_eq!(
            store.keys_by_prefix("balance:").expect("scan"),
            vec!["balance:Alice".to_string(), "balance:Bob".to_string()]
        );
        assert_eq!(
            store.keys_by_prefix("").expect("scan"),
            vec![
                "balance:Alice".to_string(),
                "balance:Bob".to_string(),
                "totalSupply".to_string()
            ]
        );
    }

    #[test]
    fn chaincode_metadata_roundtrip() {
        let (_dir, store) = store();
        let meta = ChaincodeMetadata {
            chaincode_id: "basic".to_string(),
            version: "1.0".to_string(),
            endorsement_policy: EndorsementPolicy::new(PolicyType::Any, vec!["Org1".into()]),
        };
        store.put_chaincode_metadata(&meta, 0, 0).expect("put");
        assert_eq!(
            store.get_chaincode_metadata("basic").expect("get"),
            Some(meta)
        );
        assert_eq!(store.get_chaincode_metadata("other").expect("get"), None);
    }
}

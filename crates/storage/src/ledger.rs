//! Append-only block log.
//!
//! Keys:
//! - `block:<n>`      bincode Block
//! - `hash:<h>`       block number (u64 big-endian)
//! - `meta:latest`    latest block number (u64 big-endian)
//! - `tx:<txId>`      bincode (block number, tx number)
//!
//! `put_block` writes body, hash index and latest pointer in one write
//! transaction; the hash index is never visible without the body.

use crate::{StorageError, LMDB_MAP_SIZE};
use lmdb::{Cursor, Database, DatabaseFlags, Environment, Transaction, WriteFlags};
use litefab_chain::Block;
use std::path::Path;

pub struct LedgerStore {
    env: Environment,
    db: Database,
}

impl LedgerStore {
    /// Open (creating if needed) the ledger store under `<data_dir>/ledger`.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = data_dir.as_ref().join("ledger");
        std::fs::create_dir_all(&path)?;
        let env = Environment::new()
            .set_max_dbs(1)
            .set_map_size(LMDB_MAP_SIZE)
            .open(&path)?;
        let db = env.create_db(Some("ledger"), DatabaseFlags::empty())?;
        Ok(Self { env, db })
    }

    fn block_key(number: u64) -> String {
        format!("block:{}", number)
    }

    /// Persist a block under its header number, maintain the hash index and
    /// advance the latest pointer. One write transaction.
    pub fn put_block(&self, block: &Block) -> Result<(), StorageError> {
        let number = block.header.number;
        let hash = block.stored_hash()?;
        let blob = bincode::serialize(block)?;

        let mut wtxn = self.env.begin_rw_txn()?;
        wtxn.put(
            self.db,
            &Self::block_key(number).as_bytes(),
            &blob,
            WriteFlags::empty(),
        )?;
        wtxn.put(
            self.db,
            &format!("hash:{}", hash).as_bytes(),
            &number.to_be_bytes(),
            WriteFlags::empty(),
        )?;
        wtxn.put(
            self.db,
            b"meta:latest",
            &number.to_be_bytes(),
            WriteFlags::empty(),
        )?;
        wtxn.commit()?;
        Ok(())
    }

    pub fn get_block(&self, number: u64) -> Result<Option<Block>, StorageError> {
        let rtxn = self.env.begin_ro_txn()?;
        match rtxn.get(self.db, &Self::block_key(number).as_bytes()) {
            Ok(blob) => Ok(Some(bincode::deserialize(blob)?)),
            Err(lmdb::Error::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_block_by_hash(&self, hash: &str) -> Result<Option<Block>, StorageError> {
        let rtxn = self.env.begin_ro_txn()?;
        let number = match rtxn.get(self.db, &format!("hash:{}", hash).as_bytes()) {
            Ok(raw) => decode_u64(raw)?,
            Err(lmdb::Error::NotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match rtxn.get(self.db, &Self::block_key(number).as_bytes()) {
            Ok(blob) => Ok(Some(bincode::deserialize(blob)?)),
            Err(lmdb::Error::NotFound) => Err(StorageError::Corrupt(format!(
                "hash index points at missing block {}",
                number
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Latest committed block number, or -1 when the ledger is empty.
    pub fn latest_block_number(&self) -> Result<i64, StorageError> {
        let rtxn = self.env.begin_ro_txn()?;
        match rtxn.get(self.db, b"meta:latest") {
            Ok(raw) => Ok(decode_u64(raw)? as i64),
            Err(lmdb::Error::NotFound) => Ok(-1),
            Err(e) => Err(e.into()),
        }
    }

    /// Secondary index: transaction id → (block number, tx number).
    pub fn put_tx_index(
        &self,
        tx_id: &str,
        block_num: u64,
        tx_num: u64,
    ) -> Result<(), StorageError> {
        let blob = bincode::serialize(&(block_num, tx_num))?;
        let mut wtxn = self.env.begin_rw_txn()?;
        wtxn.put(
            self.db,
            &format!("tx:{}", tx_id).as_bytes(),
            &blob,
            WriteFlags::empty(),
        )?;
        wtxn.commit()?;
        Ok(())
    }

    pub fn get_tx_location(&self, tx_id: &str) -> Result<Option<(u64, u64)>, StorageError> {
        let rtxn = self.env.begin_ro_txn()?;
        match rtxn.get(self.db, &format!("tx:{}", tx_id).as_bytes()) {
            Ok(blob) => Ok(Some(bincode::deserialize(blob)?)),
            Err(lmdb::Error::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Number of blocks recorded, by walking the `block:` prefix. Test and
    /// diagnostics helper.
    pub fn block_count(&self) -> Result<usize, StorageError> {
        let rtxn = self.env.begin_ro_txn()?;
        let mut cursor = rtxn.open_ro_cursor(self.db)?;
        let mut count = 0usize;
        for (key, _value) in cursor.iter_from(b"block:") {
            if !key.starts_with(b"block:") {
                break;
            }
            count += 1;
        }
        Ok(count)
    }
}

fn decode_u64(raw: &[u8]) -> Result<u64, StorageError> {
    let arr: [u8; 8] = raw
        .try_into()
        .map_err(|_| StorageError::Corrupt("expected 8-byte big-endian number".to_string()))?;
    Ok(u64::from_be_bytes(arr))
}

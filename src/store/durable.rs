//! ACID-durable knowledge store backed by redb.
//!
//! Layout:
//!
//! - `items`:  item id → bincode-encoded [`KnowledgeItem`]
//! - `chains`: scope/name/sequence → item id (chain index, insertion order)
//! - `hashes`: scope/name/content-hash → item id (uniqueness index)
//! - `meta`:   counters
//!
//! redb admits one write transaction at a time, so the uniqueness check and the
//! insert inside [`insert_unique`](KnowledgeStore::insert_unique) cannot
//! interleave with another writer. A write transaction that is dropped before
//! `commit` leaves nothing behind.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};

use crate::error::StoreError;
use crate::item::{KnowledgeId, KnowledgeItem};
use crate::scope::ScopeKey;
use crate::store::{
    InsertOutcome, KnowledgeStore, StoreResult, chain_prefix, hash_key, scope_prefix,
    sequence_key,
};

const ITEMS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("items");
const CHAINS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("chains");
const HASHES_TABLE: TableDefinition<&str, &str> = TableDefinition::new("hashes");
const META_TABLE: TableDefinition<&str, u64> = TableDefinition::new("meta");

const SEQUENCE_KEY: &str = "sequence";

/// File name of the database inside the data directory.
pub const DB_FILE: &str = "knowledge.redb";

fn redb_err<E: std::fmt::Display>(op: &'static str) -> impl FnOnce(E) -> StoreError {
    move |e| StoreError::Redb {
        message: format!("{op} failed: {e}"),
    }
}

fn encode(item: &KnowledgeItem) -> StoreResult<Vec<u8>> {
    bincode::serialize(item).map_err(|e| StoreError::Serialization {
        message: format!("failed to serialize knowledge item {}: {e}", item.id),
    })
}

fn decode(bytes: &[u8]) -> StoreResult<KnowledgeItem> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization {
        message: format!("failed to deserialize knowledge item: {e}"),
    })
}

/// ACID-durable knowledge store using redb.
pub struct DurableStore {
    db: Arc<Database>,
    path: PathBuf,
}

impl DurableStore {
    /// Open or create a durable store in the given directory.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| StoreError::Io { source: e })?;
        let path = data_dir.join(DB_FILE);
        let db = Database::create(&path).map_err(|e| StoreError::Redb {
            message: format!("failed to open redb at {}: {e}", path.display()),
        })?;

        // Create every table up front so read transactions never see a
        // missing table on a fresh database.
        let txn = db.begin_write().map_err(redb_err("begin_write"))?;
        {
            txn.open_table(ITEMS_TABLE).map_err(redb_err("open_table"))?;
            txn.open_table(CHAINS_TABLE).map_err(redb_err("open_table"))?;
            txn.open_table(HASHES_TABLE).map_err(redb_err("open_table"))?;
            txn.open_table(META_TABLE).map_err(redb_err("open_table"))?;
        }
        txn.commit().map_err(redb_err("commit"))?;

        tracing::debug!(path = %path.display(), "opened durable knowledge store");
        Ok(Self {
            db: Arc::new(db),
            path,
        })
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KnowledgeStore for DurableStore {
    fn insert_unique(&self, mut item: KnowledgeItem) -> StoreResult<InsertOutcome> {
        let txn = self.db.begin_write().map_err(redb_err("begin_write"))?;
        let outcome = {
            let mut items = txn.open_table(ITEMS_TABLE).map_err(redb_err("open_table"))?;
            let mut chains = txn.open_table(CHAINS_TABLE).map_err(redb_err("open_table"))?;
            let mut hashes = txn.open_table(HASHES_TABLE).map_err(redb_err("open_table"))?;
            let mut meta = txn.open_table(META_TABLE).map_err(redb_err("open_table"))?;

            let hkey = hash_key(&item.scope, &item.name, &item.content_hash);
            let existing_id = hashes
                .get(hkey.as_str())
                .map_err(redb_err("get"))?
                .map(|g| g.value().to_string());

            if let Some(existing_id) = existing_id {
                let existing = items
                    .get(existing_id.as_str())
                    .map_err(redb_err("get"))?
                    .map(|g| decode(g.value()))
                    .transpose()?
                    .ok_or(StoreError::Conflict { key: hkey })?;
                InsertOutcome::Existing(existing)
            } else {
                let id = item.id.to_string();
                if items.get(id.as_str()).map_err(redb_err("get"))?.is_some() {
                    return Err(StoreError::Conflict { key: id });
                }

                let sequence = meta
                    .get(SEQUENCE_KEY)
                    .map_err(redb_err("get"))?
                    .map(|g| g.value())
                    .unwrap_or(0)
                    + 1;
                item.sequence = sequence;

                let encoded = encode(&item)?;
                items
                    .insert(id.as_str(), encoded.as_slice())
                    .map_err(redb_err("insert"))?;
                chains
                    .insert(
                        sequence_key(&item.scope, &item.name, sequence).as_str(),
                        id.as_str(),
                    )
                    .map_err(redb_err("insert"))?;
                hashes
                    .insert(hkey.as_str(), id.as_str())
                    .map_err(redb_err("insert"))?;
                meta.insert(SEQUENCE_KEY, sequence)
                    .map_err(redb_err("insert"))?;
                InsertOutcome::Inserted(item)
            }
        };
        match outcome {
            InsertOutcome::Inserted(_) => txn.commit().map_err(redb_err("commit"))?,
            InsertOutcome::Existing(_) => txn.abort().map_err(redb_err("abort"))?,
        }
        Ok(outcome)
    }

    fn get(&self, id: &KnowledgeId) -> StoreResult<Option<KnowledgeItem>> {
        let txn = self.db.begin_read().map_err(redb_err("begin_read"))?;
        let items = txn.open_table(ITEMS_TABLE).map_err(redb_err("open_table"))?;
        let id = id.to_string();
        items
            .get(id.as_str())
            .map_err(redb_err("get"))?
            .map(|g| decode(g.value()))
            .transpose()
    }

    fn chain(&self, name: &str, scope: &ScopeKey) -> StoreResult<Vec<KnowledgeItem>> {
        let txn = self.db.begin_read().map_err(redb_err("begin_read"))?;
        let chains = txn.open_table(CHAINS_TABLE).map_err(redb_err("open_table"))?;
        let items = txn.open_table(ITEMS_TABLE).map_err(redb_err("open_table"))?;

        let prefix = chain_prefix(scope, name);
        let mut out = Vec::new();
        for entry in chains.range(prefix.as_str()..).map_err(redb_err("range"))? {
            let (key, id) = entry.map_err(redb_err("range"))?;
            if !key.value().starts_with(&prefix) {
                break;
            }
            let id = id.value();
            let item = items
                .get(id)
                .map_err(redb_err("get"))?
                .map(|g| decode(g.value()))
                .transpose()?
                .ok_or_else(|| StoreError::Conflict {
                    key: key.value().to_string(),
                })?;
            out.push(item);
        }
        Ok(out)
    }

    fn items_at(&self, scope: &ScopeKey) -> StoreResult<Vec<KnowledgeItem>> {
        let txn = self.db.begin_read().map_err(redb_err("begin_read"))?;
        let chains = txn.open_table(CHAINS_TABLE).map_err(redb_err("open_table"))?;
        let items = txn.open_table(ITEMS_TABLE).map_err(redb_err("open_table"))?;

        // Names hold no control characters, so each chain's keys are contiguous
        // and chains come out in name order.
        let prefix = scope_prefix(scope);
        let mut out = Vec::new();
        for entry in chains.range(prefix.as_str()..).map_err(redb_err("range"))? {
            let (key, id) = entry.map_err(redb_err("range"))?;
            if !key.value().starts_with(&prefix) {
                break;
            }
            let item = items
                .get(id.value())
                .map_err(redb_err("get"))?
                .map(|g| decode(g.value()))
                .transpose()?
                .ok_or_else(|| StoreError::Conflict {
                    key: key.value().to_string(),
                })?;
            out.push(item);
        }
        Ok(out)
    }

    fn delete_chain(&self, name: &str, scope: &ScopeKey) -> StoreResult<usize> {
        let prefix = chain_prefix(scope, name);
        let txn = self.db.begin_write().map_err(redb_err("begin_write"))?;
        let removed = {
            let mut items = txn.open_table(ITEMS_TABLE).map_err(redb_err("open_table"))?;
            let mut chains = txn.open_table(CHAINS_TABLE).map_err(redb_err("open_table"))?;
            let mut hashes = txn.open_table(HASHES_TABLE).map_err(redb_err("open_table"))?;

            let chain_entries = collect_prefix(&chains, &prefix)?;
            let hash_keys: Vec<String> = collect_prefix(&hashes, &prefix)?
                .into_iter()
                .map(|(k, _)| k)
                .collect();

            for (key, id) in &chain_entries {
                chains.remove(key.as_str()).map_err(redb_err("remove"))?;
                items.remove(id.as_str()).map_err(redb_err("remove"))?;
            }
            for key in &hash_keys {
                hashes.remove(key.as_str()).map_err(redb_err("remove"))?;
            }
            chain_entries.len()
        };
        txn.commit().map_err(redb_err("commit"))?;
        Ok(removed)
    }

    fn delete(&self, id: &KnowledgeId) -> StoreResult<bool> {
        let id = id.to_string();
        let txn = self.db.begin_write().map_err(redb_err("begin_write"))?;
        let existed = {
            let mut items = txn.open_table(ITEMS_TABLE).map_err(redb_err("open_table"))?;
            let mut chains = txn.open_table(CHAINS_TABLE).map_err(redb_err("open_table"))?;
            let mut hashes = txn.open_table(HASHES_TABLE).map_err(redb_err("open_table"))?;

            let removed = items
                .remove(id.as_str())
                .map_err(redb_err("remove"))?
                .map(|g| decode(g.value()))
                .transpose()?;
            match removed {
                Some(item) => {
                    chains
                        .remove(sequence_key(&item.scope, &item.name, item.sequence).as_str())
                        .map_err(redb_err("remove"))?;
                    hashes
                        .remove(hash_key(&item.scope, &item.name, &item.content_hash).as_str())
                        .map_err(redb_err("remove"))?;
                    true
                }
                None => false,
            }
        };
        txn.commit().map_err(redb_err("commit"))?;
        Ok(existed)
    }

    fn len(&self) -> StoreResult<usize> {
        let txn = self.db.begin_read().map_err(redb_err("begin_read"))?;
        let items = txn.open_table(ITEMS_TABLE).map_err(redb_err("open_table"))?;
        let mut count = 0;
        for entry in items.iter().map_err(redb_err("iter"))? {
            entry.map_err(redb_err("iter"))?;
            count += 1;
        }
        Ok(count)
    }

    fn is_persistent(&self) -> bool {
        true
    }
}

/// Collect `(key, id)` pairs whose key starts with `prefix`.
fn collect_prefix<T>(table: &T, prefix: &str) -> StoreResult<Vec<(String, String)>>
where
    T: ReadableTable<&'static str, &'static str>,
{
    let mut out = Vec::new();
    for entry in table.range(prefix..).map_err(redb_err("range"))? {
        let (key, value) = entry.map_err(redb_err("range"))?;
        if !key.value().starts_with(prefix) {
            break;
        }
        out.push((key.value().to_string(), value.value().to_string()));
    }
    Ok(out)
}

impl std::fmt::Debug for DurableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableStore")
            .field("path", &self.path)
            .finish()
    }
}

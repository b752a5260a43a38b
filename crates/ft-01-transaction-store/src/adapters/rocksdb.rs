//! # RocksDB Transaction Store
//!
//! Durable backend. Blocking RocksDB calls run on the tokio blocking pool.
//!
//! ## Column Families
//!
//! - `transactions` - `id` → JSON-encoded `Transaction`
//! - `user_index` - `user_id \0 id` → empty (range scans per user)

use crate::domain::{paginate, Page, StoreError, TransactionFilter};
use crate::ports::TransactionStore;
use async_trait::async_trait;
use parking_lot::Mutex;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBCompressionType, Direction, IteratorMode, Options,
    WriteBatch, WriteOptions, DB,
};
use shared_types::Transaction;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

pub const CF_TRANSACTIONS: &str = "transactions";
pub const CF_USER_INDEX: &str = "user_index";

/// All column families used by the store
pub const COLUMN_FAMILIES: &[&str] = &[CF_TRANSACTIONS, CF_USER_INDEX];

/// RocksDB configuration
#[derive(Debug, Clone)]
pub struct RocksDbStoreConfig {
    /// Path to the database directory
    pub path: PathBuf,
    /// Write buffer size in bytes (default: 64MB)
    pub write_buffer_size: usize,
    /// fsync after each write (default: true)
    pub sync_writes: bool,
}

impl Default for RocksDbStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/transactions"),
            write_buffer_size: 64 * 1024 * 1024,
            sync_writes: true,
        }
    }
}

impl RocksDbStoreConfig {
    /// Small buffers, no sync.
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_buffer_size: 4 * 1024 * 1024,
            sync_writes: false,
        }
    }
}

struct Inner {
    db: DB,
    config: RocksDbStoreConfig,
    /// Serializes read-modify-write of the user index.
    write_lock: Mutex<()>,
}

fn index_key(user_id: &str, id: &str) -> Vec<u8> {
    let mut key = user_prefix(user_id);
    key.extend_from_slice(id.as_bytes());
    key
}

fn user_prefix(user_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(user_id.len() + 1);
    key.extend_from_slice(user_id.as_bytes());
    key.push(0);
    key
}

fn io_error(op: &str, e: rocksdb::Error) -> StoreError {
    StoreError::Unavailable(format!("RocksDB {op} failed: {e}"))
}

impl Inner {
    fn cf(&self, name: &str) -> Result<&ColumnFamily, StoreError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Unavailable(format!("missing column family {name}")))
    }

    fn write_options(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.config.sync_writes);
        opts
    }

    fn load(&self, id: &str) -> Result<Option<Transaction>, StoreError> {
        let cf = self.cf(CF_TRANSACTIONS)?;
        match self.db.get_cf(cf, id.as_bytes()).map_err(|e| io_error("get", e))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn upsert(&self, tx: &Transaction) -> Result<bool, StoreError> {
        let value = serde_json::to_vec(tx)?;
        let rows = self.cf(CF_TRANSACTIONS)?;
        let index = self.cf(CF_USER_INDEX)?;

        let _guard = self.write_lock.lock();
        let previous = self.load(&tx.id)?;

        let mut batch = WriteBatch::default();
        if let Some(prev) = &previous {
            if prev.user_id != tx.user_id {
                batch.delete_cf(index, index_key(&prev.user_id, &prev.id));
            }
        }
        batch.put_cf(rows, tx.id.as_bytes(), value);
        batch.put_cf(index, index_key(&tx.user_id, &tx.id), b"");

        self.db
            .write_opt(batch, &self.write_options())
            .map_err(|e| io_error("write", e))?;
        Ok(previous.is_some())
    }

    fn query(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>, StoreError> {
        let index = self.cf(CF_USER_INDEX)?;
        let prefix = user_prefix(&filter.user_id);

        let mut matches = Vec::new();
        for item in self
            .db
            .iterator_cf(index, IteratorMode::From(&prefix, Direction::Forward))
        {
            let (key, _) = item.map_err(|e| io_error("iterate", e))?;
            if !key.starts_with(&prefix) {
                break;
            }
            let id = String::from_utf8_lossy(&key[prefix.len()..]).into_owned();
            if let Some(tx) = self.load(&id)? {
                if filter.matches(&tx) {
                    matches.push(tx);
                }
            }
        }
        Ok(matches)
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        let rows = self.cf(CF_TRANSACTIONS)?;
        let index = self.cf(CF_USER_INDEX)?;

        let _guard = self.write_lock.lock();
        let Some(existing) = self.load(id)? else {
            return Err(StoreError::NotFound { id: id.to_string() });
        };

        let mut batch = WriteBatch::default();
        batch.delete_cf(rows, id.as_bytes());
        batch.delete_cf(index, index_key(&existing.user_id, id));
        self.db
            .write_opt(batch, &self.write_options())
            .map_err(|e| io_error("delete", e))
    }
}

/// RocksDB-backed implementation of `TransactionStore`.
#[derive(Clone)]
pub struct RocksDbTransactionStore {
    inner: Arc<Inner>,
    closed: Arc<AtomicBool>,
}

impl RocksDbTransactionStore {
    /// Open or create the database.
    pub fn open(config: RocksDbStoreConfig) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_compression_type(DBCompressionType::Snappy);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|name| {
                let mut cf_opts = Options::default();
                cf_opts.set_compression_type(DBCompressionType::Snappy);
                ColumnFamilyDescriptor::new(*name, cf_opts)
            })
            .collect();

        let db = DB::open_cf_descriptors(&opts, &config.path, cf_descriptors)
            .map_err(|e| io_error("open", e))?;
        info!(path = %config.path.display(), "RocksDB transaction store opened");

        Ok(Self {
            inner: Arc::new(Inner {
                db,
                config,
                write_lock: Mutex::new(()),
            }),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Inner) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(&inner))
            .await
            .map_err(|e| StoreError::Unavailable(format!("blocking task failed: {e}")))?
    }
}

#[async_trait]
impl TransactionStore for RocksDbTransactionStore {
    async fn upsert(&self, tx: &Transaction) -> Result<(), StoreError> {
        let record = tx.clone();
        let replaced = self.blocking(move |inner| inner.upsert(&record)).await?;
        debug!(id = %tx.id, replaced, "Transaction upserted");
        Ok(())
    }

    async fn query(
        &self,
        filter: &TransactionFilter,
        page: Option<Page>,
    ) -> Result<Vec<Transaction>, StoreError> {
        let filter = filter.clone();
        let matches = self.blocking(move |inner| inner.query(&filter)).await?;
        Ok(paginate(matches, page))
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Transaction>, StoreError> {
        let id = id.to_string();
        self.blocking(move |inner| inner.load(&id)).await
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), StoreError> {
        let id = id.to_string();
        self.blocking(move |inner| inner.delete(&id)).await
    }

    async fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.db.flush().map_err(|e| io_error("flush", e)))
            .await
            .map_err(|e| StoreError::Unavailable(format!("blocking task failed: {e}")))??;
        info!("RocksDB transaction store closed");
        Ok(())
    }
}

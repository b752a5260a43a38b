//! # RocksDB Queue
//!
//! Durable transport: the queue index lives in memory, every message it
//! holds is journaled to RocksDB until settled. On open the journal is
//! replayed, so accepted-but-unconsumed messages and unacknowledged
//! deliveries survive a restart with their delivery counts.
//!
//! ## Column Families
//!
//! - `messages` - `topic \0 id` → payload
//! - `deliveries` - `topic \0 id` → delivery count (u32, big-endian)

use crate::journal::{JournaledMessage, MessageJournal};
use crate::publisher::{AckMode, InMemoryQueue, QueueOptions, QueueTransport, TransportError};
use crate::subscriber::Subscription;
use async_trait::async_trait;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBCompressionType, IteratorMode, Options, WriteBatch,
    WriteOptions, DB,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

pub const CF_MESSAGES: &str = "messages";
pub const CF_DELIVERIES: &str = "deliveries";

/// All column families used by the journal
pub const COLUMN_FAMILIES: &[&str] = &[CF_MESSAGES, CF_DELIVERIES];

const ID_LEN: usize = std::mem::size_of::<u64>();

/// RocksDB queue configuration
#[derive(Debug, Clone)]
pub struct RocksDbQueueConfig {
    /// Path to the database directory
    pub path: PathBuf,
    /// Write buffer size in bytes (default: 16MB)
    pub write_buffer_size: usize,
    /// fsync after each write (default: true)
    pub sync_writes: bool,
}

impl Default for RocksDbQueueConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/queue"),
            write_buffer_size: 16 * 1024 * 1024,
            sync_writes: true,
        }
    }
}

impl RocksDbQueueConfig {
    /// Small buffers, no sync.
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_buffer_size: 4 * 1024 * 1024,
            sync_writes: false,
        }
    }
}

fn message_key(topic: &str, id: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(topic.len() + 1 + ID_LEN);
    key.extend_from_slice(topic.as_bytes());
    key.push(0);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

fn parse_key(key: &[u8]) -> Option<(String, u64)> {
    let split = key.len().checked_sub(ID_LEN + 1)?;
    if key[split] != 0 {
        return None;
    }
    let topic = std::str::from_utf8(&key[..split]).ok()?.to_string();
    let id = u64::from_be_bytes(key[split + 1..].try_into().ok()?);
    Some((topic, id))
}

fn io_error(op: &str, e: rocksdb::Error) -> TransportError {
    TransportError::Unavailable(format!("RocksDB {op} failed: {e}"))
}

/// Message journal stored in RocksDB.
pub struct RocksDbJournal {
    db: DB,
    config: RocksDbQueueConfig,
}

impl RocksDbJournal {
    /// Open or create the journal database.
    pub fn open(config: RocksDbQueueConfig) -> Result<Self, TransportError> {
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
        Ok(Self { db, config })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, TransportError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| TransportError::Unavailable(format!("missing column family {name}")))
    }

    fn write_options(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.config.sync_writes);
        opts
    }

    fn delivery_count(&self, key: &[u8]) -> Result<u32, TransportError> {
        let deliveries = self.cf(CF_DELIVERIES)?;
        let count = self
            .db
            .get_cf(deliveries, key)
            .map_err(|e| io_error("get", e))?
            .and_then(|bytes| <[u8; 4]>::try_from(bytes.as_slice()).ok())
            .map_or(0, u32::from_be_bytes);
        Ok(count)
    }

    pub fn flush(&self) -> Result<(), TransportError> {
        self.db.flush().map_err(|e| io_error("flush", e))
    }
}

impl MessageJournal for RocksDbJournal {
    fn append(&self, topic: &str, id: u64, payload: &[u8]) -> Result<(), TransportError> {
        if topic.as_bytes().contains(&0) {
            return Err(TransportError::InvalidTopic(topic.to_string()));
        }
        let key = message_key(topic, id);
        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_MESSAGES)?, &key, payload);
        batch.put_cf(self.cf(CF_DELIVERIES)?, &key, 0u32.to_be_bytes());
        self.db
            .write_opt(batch, &self.write_options())
            .map_err(|e| io_error("append", e))
    }

    fn record_delivery(
        &self,
        topic: &str,
        id: u64,
        delivery_count: u32,
    ) -> Result<(), TransportError> {
        self.db
            .put_cf_opt(
                self.cf(CF_DELIVERIES)?,
                message_key(topic, id),
                delivery_count.to_be_bytes(),
                &self.write_options(),
            )
            .map_err(|e| io_error("put", e))
    }

    fn remove(&self, topic: &str, id: u64) -> Result<(), TransportError> {
        let key = message_key(topic, id);
        let mut batch = WriteBatch::default();
        batch.delete_cf(self.cf(CF_MESSAGES)?, &key);
        batch.delete_cf(self.cf(CF_DELIVERIES)?, &key);
        self.db
            .write_opt(batch, &self.write_options())
            .map_err(|e| io_error("delete", e))
    }

    fn recover(&self) -> Result<Vec<JournaledMessage>, TransportError> {
        let messages = self.cf(CF_MESSAGES)?;
        let mut recovered = Vec::new();
        for item in self.db.iterator_cf(messages, IteratorMode::Start) {
            let (key, payload) = item.map_err(|e| io_error("iterate", e))?;
            let Some((topic, id)) = parse_key(&key) else {
                warn!(key_len = key.len(), "Skipping malformed journal key");
                continue;
            };
            recovered.push(JournaledMessage {
                topic,
                id,
                payload: payload.into_vec(),
                delivery_count: self.delivery_count(&key)?,
            });
        }
        Ok(recovered)
    }
}

/// Durable queue transport backed by a RocksDB journal.
#[derive(Clone)]
pub struct RocksDbQueue {
    queue: InMemoryQueue,
    journal: Arc<RocksDbJournal>,
}

impl RocksDbQueue {
    /// Open the journal at `config.path` and replay what it holds.
    pub fn open(config: RocksDbQueueConfig, options: QueueOptions) -> Result<Self, TransportError> {
        let path = config.path.clone();
        let journal = Arc::new(RocksDbJournal::open(config)?);
        let queue =
            InMemoryQueue::with_journal(options, Arc::clone(&journal) as Arc<dyn MessageJournal>)?;
        info!(path = %path.display(), "RocksDB queue opened");
        Ok(Self { queue, journal })
    }

    /// Messages waiting for a subscriber on `topic`.
    #[must_use]
    pub fn depth(&self, topic: &str) -> usize {
        self.queue.depth(topic)
    }

    /// Messages delivered on `topic` but not yet settled.
    #[must_use]
    pub fn in_flight(&self, topic: &str) -> usize {
        self.queue.in_flight(topic)
    }
}

#[async_trait]
impl QueueTransport for RocksDbQueue {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        let queue = self.queue.clone();
        let topic = topic.to_string();
        tokio::task::spawn_blocking(move || queue.publish_now(&topic, payload))
            .await
            .map_err(|e| TransportError::Unavailable(format!("blocking task failed: {e}")))?
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, TransportError> {
        self.queue.subscribe(topic).await
    }

    fn ack_mode(&self) -> AckMode {
        self.queue.ack_mode()
    }

    async fn close(&self) {
        self.queue.close().await;
        let journal = Arc::clone(&self.journal);
        match tokio::task::spawn_blocking(move || journal.flush()).await {
            Ok(Ok(())) => info!("RocksDB queue closed"),
            Ok(Err(e)) => warn!(error = %e, "RocksDB queue flush failed"),
            Err(e) => warn!(error = %e, "RocksDB queue flush task failed"),
        }
    }
}

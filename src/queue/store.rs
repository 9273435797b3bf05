use crate::proto::{DeadLetterTask, ImportTask, LeaseState};
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use prost::Message;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("Protobuf decode error: {0}")]
    ProtobufDecode(#[from] prost::DecodeError),

    #[error("Task not found: seq={0}")]
    TaskNotFound(u64),

    #[error("Lease {0} is no longer held")]
    LeaseMismatch(LeaseId),

    #[error("Invalid sequence number")]
    InvalidSequence,
}

pub type Result<T> = std::result::Result<T, QueueError>;

/// Queue tuning knobs
#[derive(Debug, Clone)]
pub struct QueueOptions {
    /// How long a leased task stays invisible before it is redelivered
    pub lease_timeout: Duration,
    /// Deliveries allowed before a task is dead-lettered; `None` retries forever
    pub max_deliveries: Option<u32>,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            lease_timeout: Duration::from_secs(300),
            max_deliveries: None,
        }
    }
}

/// Opaque handle proving the holder currently owns a queued task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseId {
    pub seq: u64,
    token: String,
}

impl fmt::Display for LeaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.seq, self.token)
    }
}

/// A task handed to a consumer together with its lease
#[derive(Debug, Clone)]
pub struct LeasedTask {
    pub lease: LeaseId,
    pub task: ImportTask,
    /// 1 on first delivery, incremented on every redelivery
    pub deliveries: u32,
}

/// FjallQueue is a durable, lease-based task queue on the Fjall embedded database
///
/// Architecture:
/// - `tasks` partition: u64 (big-endian) → ImportTask (protobuf)
/// - `leases` partition: u64 (big-endian) → LeaseState (protobuf)
/// - `metadata` partition: "next_seq" → u64 (atomic counter)
/// - `dlq` partition: u64 (big-endian) → DeadLetterTask (protobuf)
///
/// A task stays in `tasks` until it is acknowledged. Leasing writes a
/// `LeaseState` with an expiry; while it is live the task is skipped by other
/// consumers, once it expires the task is handed out again (at-least-once).
/// Lease scans and acks are serialized by an internal lock, so the same task
/// is never leased twice concurrently.
pub struct FjallQueue {
    keyspace: Keyspace,
    tasks: PartitionHandle,
    leases: PartitionHandle,
    metadata: PartitionHandle,
    dlq: PartitionHandle,
    seq_counter: Arc<AtomicU64>,
    enqueue_lock: Mutex<()>,
    lease_lock: Mutex<()>,
    options: QueueOptions,
}

impl FjallQueue {
    /// Open or create a new FjallQueue at the specified path
    pub fn open<P: AsRef<Path>>(path: P, options: QueueOptions) -> Result<Self> {
        info!("Opening FjallQueue at: {}", path.as_ref().display());

        let keyspace = Config::new(path).open()?;

        let tasks = keyspace.open_partition("tasks", PartitionCreateOptions::default())?;
        let leases = keyspace.open_partition("leases", PartitionCreateOptions::default())?;
        let metadata = keyspace.open_partition("metadata", PartitionCreateOptions::default())?;
        let dlq = keyspace.open_partition("dlq", PartitionCreateOptions::default())?;

        // The stored counter must never fall behind a live or dead-lettered key
        let stored_seq = metadata
            .get(b"next_seq")?
            .map(|bytes| u64::from_be_bytes(bytes.as_ref().try_into().unwrap_or([0u8; 8])))
            .unwrap_or(0);
        let current_seq = stored_seq
            .max(next_after_last(&tasks)?)
            .max(next_after_last(&dlq)?);
        if current_seq != stored_seq {
            warn!(stored_seq, current_seq, "Sequence counter behind stored keys, advancing");
        }

        info!(
            current_seq,
            lease_timeout_ms = options.lease_timeout.as_millis() as u64,
            "FjallQueue opened"
        );

        Ok(Self {
            keyspace,
            tasks,
            leases,
            metadata,
            dlq,
            seq_counter: Arc::new(AtomicU64::new(current_seq)),
            enqueue_lock: Mutex::new(()),
            lease_lock: Mutex::new(()),
            options,
        })
    }

    /// Durably append a task and return its sequence number
    ///
    /// The task and the advanced counter are written in one batch and the
    /// journal is synced before returning, so an accepted task survives a
    /// process crash. Sequence assignment and commit happen under one lock so
    /// the persisted counter only moves forward.
    pub fn enqueue(&self, task: &ImportTask) -> Result<u64> {
        let seq = {
            let _guard = guard(&self.enqueue_lock);
            let seq = self.seq_counter.load(Ordering::SeqCst);

            let mut batch = self.keyspace.batch();
            batch.insert(&self.tasks, seq.to_be_bytes(), task.encode_to_vec());
            batch.insert(&self.metadata, b"next_seq", (seq + 1).to_be_bytes());
            batch.commit()?;
            self.seq_counter.store(seq + 1, Ordering::SeqCst);
            seq
        };
        self.keyspace.persist(PersistMode::SyncData)?;

        debug!(seq, image_id = %task.image_id, "Task enqueued");

        Ok(seq)
    }

    /// Lease the next available task, if any
    ///
    /// A task is available when it has no lease or its lease has expired.
    /// Returns `None` when every queued task is currently leased.
    pub fn lease(&self) -> Result<Option<LeasedTask>> {
        let _guard = self.lock();
        let now = now_ms();

        for item in self.tasks.iter() {
            let (key, value) = item?;
            let seq = decode_seq(&key)?;

            let state = match self.leases.get(seq.to_be_bytes())? {
                Some(bytes) => Some(LeaseState::decode(&*bytes)?),
                None => None,
            };

            if let Some(state) = &state {
                if state.expires_at_ms > now {
                    continue;
                }
                debug!(seq, deliveries = state.deliveries, "Lease expired, redelivering");
            }

            let deliveries = state.map(|s| s.deliveries).unwrap_or(0);
            let task = ImportTask::decode(&*value)?;

            if let Some(max) = self.options.max_deliveries {
                if deliveries >= max {
                    self.dead_letter(seq, task, deliveries)?;
                    continue;
                }
            }

            let state = LeaseState {
                token: Uuid::new_v4().simple().to_string(),
                expires_at_ms: now + self.options.lease_timeout.as_millis() as u64,
                deliveries: deliveries + 1,
            };
            self.leases.insert(seq.to_be_bytes(), state.encode_to_vec())?;

            debug!(seq, image_id = %task.image_id, deliveries = state.deliveries, "Task leased");

            return Ok(Some(LeasedTask {
                lease: LeaseId {
                    seq,
                    token: state.token,
                },
                task,
                deliveries: state.deliveries,
            }));
        }

        Ok(None)
    }

    /// Permanently remove a leased task
    ///
    /// Fails with [`QueueError::LeaseMismatch`] when the lease expired and the
    /// task was handed to another consumer in the meantime.
    pub fn ack(&self, lease: &LeaseId) -> Result<()> {
        let _guard = self.lock();
        let key = lease.seq.to_be_bytes();

        let held = match self.leases.get(key)? {
            Some(bytes) => LeaseState::decode(&*bytes)?.token == lease.token,
            None => false,
        };
        if !held {
            warn!(seq = lease.seq, "Ack with stale lease rejected");
            return Err(QueueError::LeaseMismatch(lease.clone()));
        }

        let mut batch = self.keyspace.batch();
        batch.remove(&self.tasks, key);
        batch.remove(&self.leases, key);
        batch.commit()?;

        debug!(seq = lease.seq, "Task acknowledged");
        Ok(())
    }

    /// Retrieve a queued task by sequence number
    pub fn get_task(&self, seq: u64) -> Result<Option<ImportTask>> {
        match self.tasks.get(seq.to_be_bytes())? {
            Some(bytes) => Ok(Some(ImportTask::decode(&*bytes)?)),
            None => Ok(None),
        }
    }

    /// Number of tasks not yet acknowledged (leased or not)
    pub fn pending(&self) -> Result<usize> {
        let mut count = 0;
        for item in self.tasks.iter() {
            item?;
            count += 1;
        }
        Ok(count)
    }

    /// Get a task from the DLQ by sequence number
    pub fn get_dlq_task(&self, seq: u64) -> Result<Option<DeadLetterTask>> {
        match self.dlq.get(seq.to_be_bytes())? {
            Some(bytes) => Ok(Some(DeadLetterTask::decode(&*bytes)?)),
            None => Ok(None),
        }
    }

    /// List DLQ tasks (for debugging/inspection)
    pub fn list_dead_letters(&self, limit: usize) -> Result<Vec<(u64, DeadLetterTask)>> {
        let mut results = Vec::new();

        for item in self.dlq.iter().take(limit) {
            let (key, value) = item?;
            results.push((decode_seq(&key)?, DeadLetterTask::decode(&*value)?));
        }

        Ok(results)
    }

    /// Get current sequence counter value
    pub fn current_seq(&self) -> u64 {
        self.seq_counter.load(Ordering::SeqCst)
    }

    /// Flush all writes to disk
    pub fn flush(&self) -> Result<()> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }

    /// Health check - verify database is accessible
    pub fn health_check(&self) -> Result<()> {
        let _ = self.metadata.get(b"next_seq")?;
        Ok(())
    }

    fn dead_letter(&self, seq: u64, task: ImportTask, deliveries: u32) -> Result<()> {
        let entry = DeadLetterTask {
            task: Some(task),
            failure_code: "MAX_DELIVERIES".to_string(),
            failure_message: format!("not acknowledged after {deliveries} deliveries"),
            deliveries,
            failed_at_ms: now_ms(),
        };

        let key = seq.to_be_bytes();
        let mut batch = self.keyspace.batch();
        batch.insert(&self.dlq, key, entry.encode_to_vec());
        batch.remove(&self.tasks, key);
        batch.remove(&self.leases, key);
        batch.commit()?;

        warn!(seq, deliveries, "Task moved to DLQ");
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        guard(&self.lease_lock)
    }
}

// The guarded sections hold no data, so a poisoned lock is still usable
fn guard(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
    lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One past the highest sequence key in `partition`, 0 when empty
fn next_after_last(partition: &PartitionHandle) -> Result<u64> {
    match partition.last_key_value()? {
        Some((key, _)) => Ok(decode_seq(&key)? + 1),
        None => Ok(0),
    }
}

fn decode_seq(key: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = key.try_into().map_err(|_| QueueError::InvalidSequence)?;
    Ok(u64::from_be_bytes(bytes))
}

/// Get current Unix timestamp in milliseconds
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

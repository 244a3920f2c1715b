//! Durable queue of undelivered trial records.
//!
//! The queue is a single JSON array on disk. Every write replaces the file
//! atomically (temp file in the same directory, then rename), and all
//! read-modify-write cycles in this process are serialised by an async mutex.
//! File work runs on the blocking pool. Separate processes sharing one file are
//! not coordinated.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use gazex_core::TrialPayload;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::transport::SessionRequest;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRecord {
    pub session_id: String,
    pub payload: TrialPayload,
    /// Unix epoch milliseconds.
    pub enqueued_at: u64,
    /// Set for sessions the store has not created yet; replay creates the
    /// session from it before delivering the record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionRequest>,
}

#[derive(Debug)]
pub struct LocalQueue {
    path: PathBuf,
    guard: Mutex<()>,
}

impl LocalQueue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current contents in enqueue order. A missing file is an empty queue.
    pub async fn load(&self) -> Result<Vec<PendingRecord>, StoreError> {
        let _held = self.guard.lock().await;
        let path = self.path.clone();
        blocking(move || read_records(&path)).await
    }

    pub async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.load().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len().await? == 0)
    }

    pub async fn push(&self, record: PendingRecord) -> Result<usize, StoreError> {
        let _held = self.guard.lock().await;
        let path = self.path.clone();
        let pending = blocking(move || {
            let mut records = read_records(&path)?;
            records.push(record);
            write_records(&path, &records)?;
            Ok(records.len())
        })
        .await?;
        debug!(path = %self.path.display(), pending, "record queued");
        Ok(pending)
    }

    /// Drops the first occurrence of each delivered record and moves records of
    /// promoted local sessions onto their remote id. Everything else, including
    /// records queued meanwhile, keeps its order.
    pub async fn settle(
        &self,
        delivered: &[PendingRecord],
        promoted: &HashMap<String, String>,
    ) -> Result<usize, StoreError> {
        let _held = self.guard.lock().await;
        let path = self.path.clone();
        let delivered = delivered.to_vec();
        let promoted = promoted.clone();
        blocking(move || {
            let mut records = read_records(&path)?;
            for done in &delivered {
                if let Some(pos) = records.iter().position(|r| r == done) {
                    records.remove(pos);
                }
            }
            for record in &mut records {
                if let Some(remote) = promoted.get(&record.session_id) {
                    record.session_id = remote.clone();
                    record.session = None;
                }
            }
            write_records(&path, &records)?;
            Ok(records.len())
        })
        .await
    }
}

async fn blocking<R, F>(work: F) -> Result<R, StoreError>
where
    R: Send + 'static,
    F: FnOnce() -> Result<R, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}

fn read_records(path: &Path) -> Result<Vec<PendingRecord>, StoreError> {
    match fs::read(path) {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "queue file unreadable");
            Err(err.into())
        }
    }
}

fn write_records(path: &Path, records: &[PendingRecord]) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, records)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::tests::{payload, request};

    fn record(n: u32) -> PendingRecord {
        PendingRecord {
            session_id: "s-1".into(),
            payload: payload(n),
            enqueued_at: 1_000 + u64::from(n),
            session: None,
        }
    }

    #[tokio::test]
    async fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let q = LocalQueue::new(dir.path().join("pending.json"));
        assert!(q.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn records_keep_enqueue_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pending.json");
        let q = LocalQueue::new(&path);
        q.push(record(1)).await.unwrap();
        q.push(record(2)).await.unwrap();
        assert_eq!(q.push(record(3)).await.unwrap(), 3);

        let reopened = LocalQueue::new(&path);
        let numbers: Vec<u32> = reopened
            .load()
            .await
            .unwrap()
            .iter()
            .map(|r| r.payload.trial_number)
            .collect();
        assert_eq!(numbers, [1, 2, 3]);
    }

    #[tokio::test]
    async fn settle_keeps_the_rest_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let q = LocalQueue::new(dir.path().join("pending.json"));
        for n in 1..=4 {
            q.push(record(n)).await.unwrap();
        }
        let none = HashMap::new();
        assert_eq!(q.settle(&[record(1), record(3)], &none).await.unwrap(), 2);
        let left: Vec<u32> = q
            .load()
            .await
            .unwrap()
            .iter()
            .map(|r| r.payload.trial_number)
            .collect();
        assert_eq!(left, [2, 4]);
    }

    #[tokio::test]
    async fn settle_rebinds_promoted_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let q = LocalQueue::new(dir.path().join("pending.json"));
        let local = |n| PendingRecord {
            session_id: "local-1".into(),
            session: Some(request()),
            ..record(n)
        };
        q.push(local(1)).await.unwrap();
        q.push(local(2)).await.unwrap();
        q.push(record(3)).await.unwrap();

        let promoted = HashMap::from([("local-1".to_string(), "remote-9".to_string())]);
        assert_eq!(q.settle(&[local(1)], &promoted).await.unwrap(), 2);

        let left = q.load().await.unwrap();
        assert_eq!(left[0].session_id, "remote-9");
        assert_eq!(left[0].session, None);
        assert_eq!(left[0].payload.trial_number, 2);
        assert_eq!(left[1], record(3));
    }

    #[tokio::test]
    async fn wire_shape_uses_camel_case() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pending.json");
        let q = LocalQueue::new(&path);
        q.push(record(7)).await.unwrap();
        let raw: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw[0]["sessionId"], "s-1");
        assert_eq!(raw[0]["enqueuedAt"], 1_007);
        assert_eq!(raw[0]["payload"]["trialNumber"], 7);
        assert!(raw[0].get("session").is_none());
        // only the queue file itself, no leftover temp files
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pending.json");
        fs::write(&path, "not json").unwrap();
        let q = LocalQueue::new(&path);
        assert!(matches!(q.load().await, Err(StoreError::Json(_))));
    }
}

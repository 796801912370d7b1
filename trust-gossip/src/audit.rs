//! Append-only trust audit log.
//!
//! Each completed round appends one block:
//!
//! ```text
//! Trust Scores at 2024-05-01 12:00:00:
//! 10.0.0.1:8000: 1.0
//! 10.0.0.2:8000: 0.8
//!
//! ```
//!
//! The file is never truncated or rotated. Writes go through [`AuditWriter`],
//! a bounded queue drained by a background task, so a slow disk never holds
//! up message intake.

use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use trust_gossip_core::trust::TrustSnapshot;
use trust_gossip_runtime::NodeRuntime;

/// Timestamp layout used in audit headers and `/metrics`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render Unix milliseconds as a UTC `YYYY-MM-DD HH:MM:SS` string
pub fn format_timestamp(millis: u64) -> String {
    let millis = i64::try_from(millis).unwrap_or(i64::MAX);
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_default()
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

/// Render one audit block, trailing blank line included
pub fn format_block(snapshot: &TrustSnapshot) -> String {
    let mut out = format!(
        "Trust Scores at {}:\n",
        format_timestamp(snapshot.taken_at_millis)
    );
    for (peer, score) in &snapshot.scores {
        let _ = writeln!(out, "{peer}: {score:.1}");
    }
    out.push('\n');
    out
}

/// Audit file on disk
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one snapshot block
    pub fn append(&self, snapshot: &TrustSnapshot) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(format_block(snapshot).as_bytes())?;
        file.flush()
    }
}

enum AuditCommand {
    Record(TrustSnapshot),
    Flush(oneshot::Sender<()>),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Queue in front of an [`AuditLog`]
#[derive(Debug)]
pub struct AuditWriter {
    path: PathBuf,
    tx: Mutex<Option<mpsc::Sender<AuditCommand>>>,
    done: Mutex<Option<oneshot::Receiver<()>>>,
}

impl std::fmt::Debug for AuditCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditCommand::Record(s) => f.debug_tuple("Record").field(&s.taken_at_millis).finish(),
            AuditCommand::Flush(_) => f.write_str("Flush"),
        }
    }
}

impl AuditWriter {
    /// Start the drain task on `runtime`
    ///
    /// `capacity` of zero is treated as one.
    pub fn spawn<R: NodeRuntime>(log: AuditLog, capacity: usize, runtime: &R) -> Self {
        let (tx, mut rx) = mpsc::channel::<AuditCommand>(capacity.max(1));
        let (done_tx, done_rx) = oneshot::channel();
        let path = log.path().to_path_buf();

        runtime.spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    AuditCommand::Record(snapshot) => {
                        if let Err(e) = log.append(&snapshot) {
                            warn!(path = %log.path().display(), error = %e, "audit write failed");
                        }
                    }
                    AuditCommand::Flush(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
            debug!(path = %log.path().display(), "audit writer stopped");
            let _ = done_tx.send(());
        });

        Self {
            path,
            tx: Mutex::new(Some(tx)),
            done: Mutex::new(Some(done_rx)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queue a snapshot without waiting; dropped with a warning when full
    ///
    /// Returns whether the snapshot was queued.
    pub fn submit(&self, snapshot: TrustSnapshot) -> bool {
        let guard = lock(&self.tx);
        let Some(tx) = guard.as_ref() else {
            warn!("audit writer closed, dropping trust snapshot");
            return false;
        };
        match tx.try_send(AuditCommand::Record(snapshot)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("audit queue full, dropping trust snapshot");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("audit writer stopped, dropping trust snapshot");
                false
            }
        }
    }

    /// Wait until every snapshot queued so far is on disk
    pub async fn flush(&self) {
        let tx = lock(&self.tx).clone();
        let Some(tx) = tx else {
            return;
        };
        let (ack_tx, ack_rx) = oneshot::channel();
        if tx.send(AuditCommand::Flush(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// Stop accepting snapshots and wait for the queue to drain
    pub async fn close(&self) {
        drop(lock(&self.tx).take());
        let done = lock(&self.done).take();
        if let Some(done) = done {
            let _ = done.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trust_gossip_core::identity::PeerIdentity;
    use trust_gossip_runtime::tokio_runtime::TokioRuntime;

    // 2024-05-01 12:00:00 UTC
    const NOON: u64 = 1_714_564_800_000;

    fn snapshot(at: u64, scores: &[(&str, f64)]) -> TrustSnapshot {
        TrustSnapshot {
            taken_at_millis: at,
            scores: scores
                .iter()
                .map(|(host, s)| (PeerIdentity::new(*host, 8000), *s))
                .collect(),
        }
    }

    #[test]
    fn timestamp_is_utc_seconds() {
        assert_eq!(format_timestamp(NOON), "2024-05-01 12:00:00");
        assert_eq!(format_timestamp(NOON + 999), "2024-05-01 12:00:00");
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00");
    }

    #[test]
    fn block_layout() {
        let block = format_block(&snapshot(NOON, &[("10.0.0.1", 1.0), ("10.0.0.2", 0.8)]));
        assert_eq!(
            block,
            "Trust Scores at 2024-05-01 12:00:00:\n10.0.0.1:8000: 1.0\n10.0.0.2:8000: 0.8\n\n"
        );
    }

    #[test]
    fn append_never_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("nested").join("trust.log"));

        log.append(&snapshot(NOON, &[("a", 1.0)])).unwrap();
        log.append(&snapshot(NOON + 1_000, &[("a", 0.8)])).unwrap();

        let text = fs::read_to_string(log.path()).unwrap();
        assert_eq!(text.matches("Trust Scores at").count(), 2);
        assert!(text.ends_with("a:8000: 0.8\n\n"));
    }

    #[tokio::test]
    async fn writer_drains_queue_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trust.log");
        let writer = AuditWriter::spawn(AuditLog::new(&path), 8, &TokioRuntime::new());

        assert!(writer.submit(snapshot(NOON, &[("a", 1.0)])));
        assert!(writer.submit(snapshot(NOON, &[("a", 0.8)])));
        writer.flush().await;

        let text = fs::read_to_string(&path).unwrap();
        let first = text.find("a:8000: 1.0").unwrap();
        let second = text.find("a:8000: 0.8").unwrap();
        assert!(first < second);

        writer.close().await;
        assert!(!writer.submit(snapshot(NOON, &[("a", 0.6)])));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn full_queue_drops_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let writer = AuditWriter::spawn(
            AuditLog::new(dir.path().join("trust.log")),
            1,
            &TokioRuntime::new(),
        );

        // The drain task cannot run until this task yields.
        assert!(writer.submit(snapshot(NOON, &[("a", 1.0)])));
        assert!(!writer.submit(snapshot(NOON, &[("a", 0.8)])));
        writer.close().await;
    }
}

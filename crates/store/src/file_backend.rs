//! File-based event store: a single pretty-printed JSON document.
//!
//! Layout: `{"events": [...]}`, plus `"next_id"` under the monotonic id
//! policy. The file is rewritten on every mutation (temp file + rename, so a
//! crash never leaves a torn log).
//!
//! Several processes may share one log (the gateway and CLI commands both
//! default to it). Every mutation therefore re-reads the file while holding
//! a `<path>.lock` file, and reads reload the cache whenever the file's
//! modification stamp has moved.
//!
//! Default location: `~/.medtriage/data.json`

use async_trait::async_trait;
use medtriage_config::IdPolicy;
use medtriage_core::error::StoreError;
use medtriage_core::event::{Event, EventBody, EventId};
use medtriage_core::store::EventStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::io::AsyncWriteExt;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

use crate::next_event_id;

/// How long a writer waits for another process to release the log.
const LOCK_WAIT: Duration = Duration::from_secs(5);
/// A lock file older than this was left behind by a crashed writer.
const LOCK_STALE: Duration = Duration::from_secs(30);
const LOCK_POLL: Duration = Duration::from_millis(20);

/// On-disk document.
#[derive(Debug, Default, Serialize, Deserialize)]
struct EventLog {
    #[serde(default)]
    events: Vec<Event>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    next_id: Option<EventId>,
}

/// Identifies one version of the file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: SystemTime,
    len: u64,
}

impl FileStamp {
    fn of(meta: &std::fs::Metadata) -> Option<Self> {
        meta.modified().ok().map(|modified| Self {
            modified,
            len: meta.len(),
        })
    }
}

/// The log as last read or written, and the file version it came from.
#[derive(Debug)]
struct Cached {
    log: EventLog,
    stamp: Option<FileStamp>,
}

/// A file-backed event store.
///
/// `append` and `delete` hold the cache's write guard and the lock file
/// across reload, id assignment, persistence, and commit, so appends from
/// this process or any other always receive distinct ids and none of them
/// overwrites another's event.
#[derive(Debug)]
pub struct FileEventStore {
    path: PathBuf,
    policy: IdPolicy,
    cache: Arc<RwLock<Cached>>,
}

impl FileEventStore {
    /// Open the store at `path`.
    ///
    /// A missing or empty file is an empty log (the file is created on first
    /// write). A file that exists but does not parse is an error; it is never
    /// silently replaced.
    pub fn open(path: impl Into<PathBuf>, policy: IdPolicy) -> Result<Self, StoreError> {
        let path = path.into();
        let stamp = std::fs::metadata(&path).ok().as_ref().and_then(FileStamp::of);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => Some(c),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(read_err(&path, e)),
        };
        let log = parse_log(&path, content.as_deref())?;

        info!(path = %path.display(), count = log.events.len(), ?policy, "File event store loaded");
        Ok(Self {
            path,
            policy,
            cache: Arc::new(RwLock::new(Cached { log, stamp })),
        })
    }

    /// Where the log lives.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read guard over a cache that matches the file on disk.
    async fn fresh(&self) -> Result<RwLockReadGuard<'_, Cached>, StoreError> {
        let stamp = current_stamp(&self.path).await?;
        {
            let cached = self.cache.read().await;
            if cached.stamp == stamp {
                return Ok(cached);
            }
        }

        let mut cached = self.cache.write().await;
        let stamp = current_stamp(&self.path).await?;
        if cached.stamp != stamp {
            cached.log = read_log(&self.path).await?;
            cached.stamp = stamp;
            debug!(count = cached.log.events.len(), "Event log changed on disk, reloaded");
        }
        Ok(cached.downgrade())
    }

    /// Write `log` to disk atomically.
    async fn persist(&self, log: &EventLog) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(log)
            .map_err(|e| StoreError::Storage(format!("Failed to serialize event log: {e}")))?;

        let tmp_path = sibling(&self.path, ".tmp");
        tokio::fs::write(&tmp_path, content)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to write event log: {e}")))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to replace event log: {e}")))?;

        Ok(())
    }

    async fn ensure_parent(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StoreError::Storage(format!("Failed to create data directory: {e}"))
            })?;
        }
        Ok(())
    }
}

fn read_err(path: &Path, e: std::io::Error) -> StoreError {
    StoreError::Storage(format!("Failed to read {}: {e}", path.display()))
}

/// `path` with `suffix` appended to its file name.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Parse file content. `None` (no file) and blank content are an empty log.
fn parse_log(path: &Path, content: Option<&str>) -> Result<EventLog, StoreError> {
    let content = match content {
        Some(c) if !c.trim().is_empty() => c,
        _ => return Ok(EventLog::default()),
    };

    let log: EventLog = serde_json::from_str(content)
        .map_err(|e| StoreError::Corrupted(format!("{}: {e}", path.display())))?;

    let mut seen = std::collections::HashSet::new();
    if let Some(dup) = log.events.iter().find(|e| !seen.insert(e.id)) {
        return Err(StoreError::Corrupted(format!(
            "{}: duplicate event id {}",
            path.display(),
            dup.id
        )));
    }

    Ok(log)
}

async fn read_log(path: &Path) -> Result<EventLog, StoreError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(c) => Some(c),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(read_err(path, e)),
    };
    parse_log(path, content.as_deref())
}

async fn current_stamp(path: &Path) -> Result<Option<FileStamp>, StoreError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(FileStamp::of(&meta)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(read_err(path, e)),
    }
}

// --- Cross-process write lock ---

/// Exclusive right to rewrite the log, held as a `<path>.lock` file that is
/// created atomically and removed on drop.
struct LogLock {
    path: PathBuf,
}

impl LogLock {
    async fn acquire(log_path: &Path) -> Result<Self, StoreError> {
        let path = sibling(log_path, ".lock");
        let deadline = tokio::time::Instant::now() + LOCK_WAIT;

        loop {
            let attempt = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;
            match attempt {
                Ok(mut file) => {
                    // Holder pid, for whoever finds the lock left behind
                    let _ = file.write_all(std::process::id().to_string().as_bytes()).await;
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if Self::is_stale(&path).await {
                        warn!(lock = %path.display(), "Removing stale event log lock");
                        let _ = tokio::fs::remove_file(&path).await;
                        continue;
                    }
                    if tokio::time::Instant::now() >= deadline {
                        return Err(StoreError::Storage(format!(
                            "event log is locked by another process ({})",
                            path.display()
                        )));
                    }
                    tokio::time::sleep(LOCK_POLL).await;
                }
                Err(e) => {
                    return Err(StoreError::Storage(format!("Failed to lock event log: {e}")));
                }
            }
        }
    }

    async fn is_stale(path: &Path) -> bool {
        match tokio::fs::metadata(path).await.and_then(|m| m.modified()) {
            Ok(modified) => modified.elapsed().is_ok_and(|age| age > LOCK_STALE),
            Err(_) => false,
        }
    }
}

impl Drop for LogLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[async_trait]
impl EventStore for FileEventStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn append(&self, text: String, body: EventBody) -> Result<Event, StoreError> {
        let mut cached = self.cache.write().await;
        self.ensure_parent().await?;
        let _lock = LogLock::acquire(&self.path).await?;

        let log = read_log(&self.path).await?;
        let id = next_event_id(&log.events, self.policy, log.next_id.unwrap_or(0))?;
        let event = Event::new(id, text, body);

        let mut events = log.events;
        events.push(event.clone());
        let candidate = EventLog {
            events,
            next_id: match self.policy {
                IdPolicy::MaxPlusOne => None,
                IdPolicy::Monotonic => Some(id.saturating_add(1)),
            },
        };

        self.persist(&candidate).await?;
        cached.stamp = current_stamp(&self.path).await?;
        cached.log = candidate;

        debug!(id, kind = %event.kind(), "Event appended");
        Ok(event)
    }

    async fn all(&self) -> Result<Vec<Event>, StoreError> {
        Ok(self.fresh().await?.log.events.clone())
    }

    async fn delete(&self, id: EventId) -> Result<usize, StoreError> {
        let mut cached = self.cache.write().await;
        self.ensure_parent().await?;
        let _lock = LogLock::acquire(&self.path).await?;

        let stamp = current_stamp(&self.path).await?;
        let log = read_log(&self.path).await?;
        let removed = log.events.iter().filter(|e| e.id == id).count();
        if removed == 0 {
            debug!(id, "Delete of unknown event is a no-op");
            cached.log = log;
            cached.stamp = stamp;
            return Ok(0);
        }

        let candidate = EventLog {
            events: log.events.into_iter().filter(|e| e.id != id).collect(),
            next_id: log.next_id,
        };

        self.persist(&candidate).await?;
        cached.stamp = current_stamp(&self.path).await?;
        cached.log = candidate;

        debug!(id, "Event deleted");
        Ok(removed)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.fresh().await?.log.events.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medtriage_core::event::EventKind;
    use medtriage_core::record::TriageResult;
    use std::collections::BTreeSet;

    fn symptom() -> EventBody {
        EventBody::Symptom {
            triage: TriageResult::fallback(),
        }
    }

    fn store_in(dir: &tempfile::TempDir, policy: IdPolicy) -> FileEventStore {
        FileEventStore::open(dir.path().join("data.json"), policy).unwrap()
    }

    #[tokio::test]
    async fn ids_start_at_one_and_increase() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, IdPolicy::MaxPlusOne);

        for expected in 1..=3 {
            let event = store.append(format!("s{expected}"), symptom()).await.unwrap();
            assert_eq!(event.id, expected);
        }
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, IdPolicy::MaxPlusOne);
        store.append("fever".into(), symptom()).await.unwrap();
        store
            .append("asthma since childhood".into(), EventBody::HistoryNote)
            .await
            .unwrap();

        let content = std::fs::read_to_string(store.path()).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(doc["events"].as_array().unwrap().len(), 2);
        assert!(doc.get("next_id").is_none());

        let reopened = store_in(&dir, IdPolicy::MaxPlusOne);
        let events = reopened.all().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].text, "fever");
        assert_eq!(events[1].kind(), EventKind::HistoryNote);
    }

    #[tokio::test]
    async fn deleting_newest_frees_its_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, IdPolicy::MaxPlusOne);
        store.append("a".into(), symptom()).await.unwrap();
        store.append("b".into(), symptom()).await.unwrap();

        assert_eq!(store.delete(2).await.unwrap(), 1);
        let event = store.append("c".into(), symptom()).await.unwrap();
        assert_eq!(event.id, 2);
    }

    #[tokio::test]
    async fn monotonic_never_reuses_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, IdPolicy::Monotonic);
        store.append("a".into(), symptom()).await.unwrap();
        store.append("b".into(), symptom()).await.unwrap();
        store.delete(2).await.unwrap();

        // Counter survives a restart
        let reopened = store_in(&dir, IdPolicy::Monotonic);
        let event = reopened.append("c".into(), symptom()).await.unwrap();
        assert_eq!(event.id, 3);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, IdPolicy::MaxPlusOne);
        store.append("a".into(), symptom()).await.unwrap();

        assert_eq!(store.delete(1).await.unwrap(), 1);
        assert_eq!(store.delete(1).await.unwrap(), 0);
        assert_eq!(store.delete(99).await.unwrap(), 0);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_keeps_order_of_survivors() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, IdPolicy::MaxPlusOne);
        for t in ["a", "b", "c"] {
            store.append(t.into(), symptom()).await.unwrap();
        }
        store.delete(2).await.unwrap();
        let ids: Vec<EventId> = store.all().await.unwrap().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn concurrent_appends_get_distinct_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store_in(&dir, IdPolicy::MaxPlusOne));

        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.append(format!("s{i}"), symptom()).await })
            })
            .collect();

        let mut ids = BTreeSet::new();
        for result in futures::future::join_all(tasks).await {
            ids.insert(result.unwrap().unwrap().id);
        }
        assert_eq!(ids, (1..=20).collect::<BTreeSet<_>>());

        let reopened = store_in(&dir, IdPolicy::MaxPlusOne);
        assert_eq!(reopened.count().await.unwrap(), 20);
    }

    #[tokio::test]
    async fn missing_and_empty_files_are_empty_logs() {
        let dir = tempfile::tempdir().unwrap();
        let missing = store_in(&dir, IdPolicy::MaxPlusOne);
        assert_eq!(missing.count().await.unwrap(), 0);

        let path = dir.path().join("empty.json");
        std::fs::write(&path, "  \n").unwrap();
        let empty = FileEventStore::open(&path, IdPolicy::MaxPlusOne).unwrap();
        assert_eq!(empty.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn corrupted_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, "{\"events\": [ this is not json").unwrap();

        let err = FileEventStore::open(&path, IdPolicy::MaxPlusOne).err().unwrap();
        assert!(matches!(err, StoreError::Corrupted(_)));
        // The damaged file is left in place for inspection
        assert!(std::fs::read_to_string(&path).unwrap().contains("not json"));
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(
            &path,
            r#"{"events": [
                {"id": 1, "kind": "history_note", "text": "a", "timestamp": "2026-01-01T00:00:00Z", "extra": {}},
                {"id": 1, "kind": "history_note", "text": "b", "timestamp": "2026-01-01T00:00:01Z", "extra": {}}
            ]}"#,
        )
        .unwrap();
        let err = FileEventStore::open(&path, IdPolicy::MaxPlusOne).err().unwrap();
        assert!(matches!(err, StoreError::Corrupted(_)));
    }

    #[tokio::test]
    async fn loads_hand_written_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(
            &path,
            r#"{"events": [
                {"id": 4, "kind": "symptom", "text": "fever", "timestamp": "2026-01-01T00:00:00Z",
                 "extra": {"triage": {"specialist": "General Physician", "reason": "r", "priority": "low"}}}
            ]}"#,
        )
        .unwrap();
        let store = FileEventStore::open(&path, IdPolicy::MaxPlusOne).unwrap();
        let event = store.append("cough".into(), symptom()).await.unwrap();
        assert_eq!(event.id, 5);
    }

    #[tokio::test]
    async fn emptied_log_restarts_at_one() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, IdPolicy::MaxPlusOne);
        for t in ["a", "b", "c"] {
            store.append(t.into(), symptom()).await.unwrap();
        }
        for id in [1, 3, 2] {
            assert_eq!(store.delete(id).await.unwrap(), 1);
        }

        let event = store.append("d".into(), symptom()).await.unwrap();
        assert_eq!(event.id, 1);
    }

    #[tokio::test]
    async fn two_handles_on_one_file_keep_every_write() {
        let dir = tempfile::tempdir().unwrap();
        let server = store_in(&dir, IdPolicy::MaxPlusOne);
        let cli = store_in(&dir, IdPolicy::MaxPlusOne);

        server.append("fever".into(), symptom()).await.unwrap();
        let note = cli
            .append("allergic to penicillin".into(), EventBody::HistoryNote)
            .await
            .unwrap();
        let cough = server.append("cough".into(), symptom()).await.unwrap();
        assert_eq!((note.id, cough.id), (2, 3));

        let texts: Vec<String> = store_in(&dir, IdPolicy::MaxPlusOne)
            .all()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.text)
            .collect();
        assert_eq!(texts, vec!["fever", "allergic to penicillin", "cough"]);
    }

    #[tokio::test]
    async fn reads_pick_up_changes_from_another_handle() {
        let dir = tempfile::tempdir().unwrap();
        let server = store_in(&dir, IdPolicy::MaxPlusOne);
        let cli = store_in(&dir, IdPolicy::MaxPlusOne);

        server.append("fever".into(), symptom()).await.unwrap();
        assert_eq!(server.count().await.unwrap(), 1);

        cli.append("smoker".into(), EventBody::HistoryNote).await.unwrap();
        assert_eq!(server.count().await.unwrap(), 2);

        cli.delete(1).await.unwrap();
        let ids: Vec<EventId> = server.all().await.unwrap().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[tokio::test]
    async fn monotonic_counter_is_shared_between_handles() {
        let dir = tempfile::tempdir().unwrap();
        let a = store_in(&dir, IdPolicy::Monotonic);
        let b = store_in(&dir, IdPolicy::Monotonic);

        a.append("x".into(), symptom()).await.unwrap();
        b.append("y".into(), symptom()).await.unwrap();
        b.delete(2).await.unwrap();
        assert_eq!(a.append("z".into(), symptom()).await.unwrap().id, 3);
    }

    #[tokio::test]
    async fn held_lock_delays_writers_until_released() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store_in(&dir, IdPolicy::MaxPlusOne));
        let lock_path = dir.path().join("data.json.lock");
        std::fs::write(&lock_path, "4242").unwrap();

        let writer = {
            let store = store.clone();
            tokio::spawn(async move { store.append("fever".into(), symptom()).await })
        };
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!store.path().exists());

        std::fs::remove_file(&lock_path).unwrap();
        let event = writer.await.unwrap().unwrap();
        assert_eq!(event.id, 1);
        assert!(!lock_path.exists());
    }

    #[tokio::test]
    async fn largest_id_in_file_fails_append_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        let content = r#"{"events": [
            {"id": 18446744073709551615, "kind": "history_note", "text": "last", "timestamp": "2026-01-01T00:00:00Z", "extra": {}}
        ]}"#;
        std::fs::write(&path, content).unwrap();

        let store = FileEventStore::open(&path, IdPolicy::MaxPlusOne).unwrap();
        let err = store.append("one more".into(), symptom()).await.unwrap_err();
        assert!(matches!(err, StoreError::Storage(ref m) if m.contains("exhausted")));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), content);
    }
}

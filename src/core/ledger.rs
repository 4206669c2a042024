/// Completion ledger and the persistence port behind it.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::schema::event::EventId;
use crate::schema::metrics::GameMetricsSnapshot;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("RON serialization error: {0}")]
    RonWrite(#[from] ron::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Append-only set of consumed narrative events. There is no removal API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionLedger {
    ids: BTreeSet<EventId>,
}

impl CompletionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `id` was newly added.
    pub fn append(&mut self, id: EventId) -> bool {
        self.ids.insert(id)
    }

    pub fn contains(&self, id: &EventId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventId> {
        self.ids.iter()
    }
}

impl FromIterator<EventId> for CompletionLedger {
    fn from_iter<I: IntoIterator<Item = EventId>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

/// Storage for the ledger and the last metrics snapshot.
///
/// `append_ledger` must be idempotent: appending an id that is already
/// stored leaves exactly one copy, so a failed write can be retried.
pub trait Persistence {
    fn read_ledger(&self) -> Result<Vec<EventId>, PersistenceError>;
    fn append_ledger(&mut self, id: &EventId) -> Result<(), PersistenceError>;
    fn read_metrics(&self) -> Result<Option<GameMetricsSnapshot>, PersistenceError>;
    fn write_metrics(&mut self, snapshot: &GameMetricsSnapshot) -> Result<(), PersistenceError>;
}

/// In-memory persistence. Writes can be made to fail on demand.
#[derive(Debug, Default)]
pub struct MemoryStore {
    ledger: Vec<EventId>,
    metrics: Option<GameMetricsSnapshot>,
    failing_writes: u32,
    dropping_appends: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ledger(ids: impl IntoIterator<Item = EventId>) -> Self {
        let mut store = Self::default();
        for id in ids {
            if !store.ledger.contains(&id) {
                store.ledger.push(id);
            }
        }
        store
    }

    /// Make the next `count` writes fail with `Unavailable`.
    pub fn fail_next_writes(&mut self, count: u32) {
        self.failing_writes = count;
    }

    /// Acknowledge ledger appends without storing them.
    pub fn drop_appends(&mut self, drop: bool) {
        self.dropping_appends = drop;
    }

    fn check_write(&mut self) -> Result<(), PersistenceError> {
        if self.failing_writes > 0 {
            self.failing_writes -= 1;
            return Err(PersistenceError::Unavailable(
                "injected write failure".to_string(),
            ));
        }
        Ok(())
    }
}

impl Persistence for MemoryStore {
    fn read_ledger(&self) -> Result<Vec<EventId>, PersistenceError> {
        Ok(self.ledger.clone())
    }

    fn append_ledger(&mut self, id: &EventId) -> Result<(), PersistenceError> {
        self.check_write()?;
        if !self.dropping_appends && !self.ledger.contains(id) {
            self.ledger.push(id.clone());
        }
        Ok(())
    }

    fn read_metrics(&self) -> Result<Option<GameMetricsSnapshot>, PersistenceError> {
        Ok(self.metrics.clone())
    }

    fn write_metrics(&mut self, snapshot: &GameMetricsSnapshot) -> Result<(), PersistenceError> {
        self.check_write()?;
        self.metrics = Some(snapshot.clone());
        Ok(())
    }
}

const LEDGER_FILE: &str = "ledger.ron";
const METRICS_FILE: &str = "metrics.ron";

/// Persistence in a save directory holding `ledger.ron` and `metrics.ron`.
#[derive(Debug, Clone)]
pub struct RonFileStore {
    dir: PathBuf,
}

impl RonFileStore {
    /// Create the store, creating `dir` if it does not exist.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write through a temporary file so a crash never leaves half a file.
    fn write_atomic(&self, name: &str, contents: &str) -> Result<(), PersistenceError> {
        let tmp = self.dir.join(format!("{}.tmp", name));
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, self.dir.join(name))?;
        Ok(())
    }
}

impl Persistence for RonFileStore {
    fn read_ledger(&self) -> Result<Vec<EventId>, PersistenceError> {
        let path = self.dir.join(LEDGER_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(ron::from_str(&contents)?)
    }

    fn append_ledger(&mut self, id: &EventId) -> Result<(), PersistenceError> {
        let mut ids = self.read_ledger()?;
        if ids.contains(id) {
            return Ok(());
        }
        ids.push(id.clone());
        let contents = ron::ser::to_string_pretty(&ids, ron::ser::PrettyConfig::default())?;
        self.write_atomic(LEDGER_FILE, &contents)
    }

    fn read_metrics(&self) -> Result<Option<GameMetricsSnapshot>, PersistenceError> {
        let path = self.dir.join(METRICS_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(Some(ron::from_str(&contents)?))
    }

    fn write_metrics(&mut self, snapshot: &GameMetricsSnapshot) -> Result<(), PersistenceError> {
        let contents = ron::ser::to_string_pretty(snapshot, ron::ser::PrettyConfig::default())?;
        self.write_atomic(METRICS_FILE, &contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "storybeat-ledger-{}-{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn ledger_only_grows() {
        let mut ledger = CompletionLedger::new();
        assert!(ledger.append("a".into()));
        assert!(!ledger.append("a".into()));
        assert!(ledger.append("b".into()));
        assert_eq!(ledger.len(), 2);
        assert!(ledger.contains(&"a".into()));
    }

    #[test]
    fn memory_append_is_idempotent() {
        let mut store = MemoryStore::new();
        store.append_ledger(&"intro".into()).unwrap();
        store.append_ledger(&"intro".into()).unwrap();
        let ids = store.read_ledger().unwrap();
        assert_eq!(ids, vec![EventId::from("intro")]);
    }

    #[test]
    fn memory_injected_failures_then_recovers() {
        let mut store = MemoryStore::new();
        store.fail_next_writes(1);
        assert!(matches!(
            store.append_ledger(&"intro".into()),
            Err(PersistenceError::Unavailable(_))
        ));
        assert!(store.read_ledger().unwrap().is_empty());
        store.append_ledger(&"intro".into()).unwrap();
        assert_eq!(store.read_ledger().unwrap().len(), 1);
    }

    #[test]
    fn file_store_round_trip() {
        let dir = temp_dir("round-trip");
        let mut store = RonFileStore::open(&dir).unwrap();
        assert!(store.read_ledger().unwrap().is_empty());
        assert!(store.read_metrics().unwrap().is_none());

        store.append_ledger(&"intro".into()).unwrap();
        store.append_ledger(&"intro".into()).unwrap();
        store.append_ledger(&"second".into()).unwrap();
        let snapshot = GameMetricsSnapshot::new("midpoint".into())
            .with_puzzles(4)
            .with_flag("tutorial_done");
        store.write_metrics(&snapshot).unwrap();

        let reopened = RonFileStore::open(&dir).unwrap();
        assert_eq!(
            reopened.read_ledger().unwrap(),
            vec![EventId::from("intro"), EventId::from("second")]
        );
        assert_eq!(reopened.read_metrics().unwrap(), Some(snapshot));

        let _ = std::fs::remove_dir_all(&dir);
    }
}

/// The narrative engine: progress updates → triggers → beat progression →
/// conversation choice → playback → completion ledger.
///
/// All state lives in one [`NarrativeEngine`] value. Nothing is global, so
/// independent engines (and tests) never share a ledger or recency ring.

use serde::Serialize;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use thiserror::Error;

use crate::core::catalog::{Catalog, CatalogError, ContentStore, RonContentStore};
use crate::core::config::{ConfigError, EngineConfig};
use crate::core::index::TriggerIndex;
use crate::core::ledger::{CompletionLedger, MemoryStore, Persistence, PersistenceError, RonFileStore};
use crate::core::playback::{
    ContentLookup, DialogueEntry, PlaybackError, PlaybackSequencer, PlaybackState, PlaybackStep,
};
use crate::core::predicate::evaluate;
use crate::core::progression::{BeatTransition, ProgressionMachine};
use crate::core::selector::DialogueSelector;
use crate::schema::banter::BanterLine;
use crate::schema::beat::StoryBeat;
use crate::schema::character::{Character, CharacterId};
use crate::schema::event::{EventId, NarrativeEvent};
use crate::schema::metrics::GameMetricsSnapshot;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("playback error: {0}")]
    Playback(#[from] PlaybackError),
    #[error("consistency violation: {0}")]
    Consistency(String),
    #[error("event '{0}' has already been played")]
    AlreadyConsumed(EventId),
    #[error("completion of '{0}' is not saved yet; retry it before loading another event")]
    CompletionPending(EventId),
    #[error("no completion is waiting to be saved")]
    NothingPending,
    #[error("no content source configured")]
    NoContent,
    #[error("no save directory configured")]
    NoSaveDir,
}

impl EngineError {
    /// Retrying the failed persistence call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }

    pub fn is_consistency(&self) -> bool {
        matches!(
            self,
            Self::Consistency(_) | Self::Playback(PlaybackError::IdMismatch { .. })
        )
    }
}

/// A catalog together with the trigger index built from it. Swapped as a
/// unit on reload.
#[derive(Debug)]
pub struct LoadedContent {
    pub catalog: Catalog,
    pub index: TriggerIndex,
}

impl LoadedContent {
    pub fn new(catalog: Catalog) -> Self {
        let index = TriggerIndex::build(&catalog);
        Self { catalog, index }
    }

    pub fn events_for_beat<'a>(
        &'a self,
        beat: &StoryBeat,
    ) -> impl Iterator<Item = &'a NarrativeEvent> + 'a {
        self.index.events_for_beat(&self.catalog, beat)
    }
}

impl ContentLookup for LoadedContent {
    fn event(&self, id: &EventId) -> Option<&NarrativeEvent> {
        self.catalog.event(id)
    }

    fn character(&self, id: &CharacterId) -> Option<&Character> {
        self.catalog.character(id)
    }
}

/// What `start_conversation` chose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversation {
    Event(NarrativeEvent),
    Banter(BanterLine),
    Nothing,
}

/// Outcome of one processed progress update.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ProgressReport {
    /// Events whose triggers fired during this update.
    pub triggered: Vec<EventId>,
    pub transition: Option<BeatTransition>,
    /// Whether a scripted event is waiting at the current beat.
    pub available: bool,
}

/// Cross-component signals delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineNotification {
    AvailabilityChanged(bool),
    BeatChanged(BeatTransition),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn FnMut(&EngineNotification)>;

/// Queue of progress snapshots waiting to be processed.
///
/// Cloned handles share one queue. A subscriber may hold a handle and
/// submit follow-up snapshots while an update is being handled; they are
/// processed in order after the current update, never interleaved with it.
#[derive(Debug, Clone, Default)]
pub struct ProgressInbox {
    queue: Rc<RefCell<VecDeque<GameMetricsSnapshot>>>,
}

impl ProgressInbox {
    pub fn submit(&self, snapshot: GameMetricsSnapshot) {
        self.queue.borrow_mut().push_back(snapshot);
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    fn pop(&self) -> Option<GameMetricsSnapshot> {
        self.queue.borrow_mut().pop_front()
    }
}

/// The top-level engine. Built via `NarrativeEngine::builder()`.
pub struct NarrativeEngine<S = MemoryStore> {
    config: EngineConfig,
    source: Option<Box<dyn ContentStore>>,
    content: Arc<LoadedContent>,
    progression: ProgressionMachine,
    selector: DialogueSelector,
    playback: PlaybackSequencer,
    ledger: CompletionLedger,
    store: S,
    last_snapshot: Option<GameMetricsSnapshot>,
    /// Triggered, not yet consumed, in trigger order.
    pending: Vec<EventId>,
    available: bool,
    pending_completion: Option<EventId>,
    inbox: ProgressInbox,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
}

/// Builder for constructing a `NarrativeEngine`.
pub struct NarrativeEngineBuilder<S> {
    config: EngineConfig,
    source: Option<Box<dyn ContentStore>>,
    catalog: Option<Catalog>,
    store: S,
}

impl NarrativeEngine<MemoryStore> {
    pub fn builder() -> NarrativeEngineBuilder<MemoryStore> {
        NarrativeEngineBuilder {
            config: EngineConfig::default(),
            source: None,
            catalog: None,
            store: MemoryStore::new(),
        }
    }
}

impl NarrativeEngine<RonFileStore> {
    /// Build from a config with on-disk content and saves, then restore
    /// the ledger and last metrics.
    pub fn from_config(config: EngineConfig) -> Result<Self, EngineError> {
        let save_dir = config.save_dir.clone().ok_or(EngineError::NoSaveDir)?;
        let store = RonFileStore::open(save_dir)?;
        let mut engine = NarrativeEngine::builder()
            .config(config)
            .with_store(store)
            .build()?;
        engine.restore()?;
        Ok(engine)
    }
}

impl<S: Persistence> NarrativeEngine<S> {
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.content.catalog
    }

    pub fn current_beat(&self) -> &StoryBeat {
        self.progression.current()
    }

    pub fn ledger(&self) -> &CompletionLedger {
        &self.ledger
    }

    pub fn pending_events(&self) -> &[EventId] {
        &self.pending
    }

    pub fn last_snapshot(&self) -> Option<&GameMetricsSnapshot> {
        self.last_snapshot.as_ref()
    }

    pub fn playback(&self) -> &PlaybackSequencer {
        &self.playback
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// A handle for submitting snapshots from inside subscriber callbacks.
    pub fn inbox(&self) -> ProgressInbox {
        self.inbox.clone()
    }

    /// Register a callback for engine notifications.
    ///
    /// Callbacks run synchronously, in subscription order, after an update
    /// has been fully evaluated. They stay registered until `unsubscribe`.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&EngineNotification) + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    /// Read the ledger and last metrics from persistence and resume from
    /// them. Events still satisfied at the restored beat become pending.
    pub fn restore(&mut self) -> Result<(), EngineError> {
        for id in self.store.read_ledger()? {
            self.ledger.append(id);
        }
        if let Some(mut snapshot) = self.store.read_metrics()? {
            self.progression.restore(&snapshot.current_beat);
            snapshot.current_beat = self.progression.current().clone();
            let available = self.check_currently_available(&snapshot);
            self.add_pending(available);
            self.last_snapshot = Some(snapshot);
        }
        self.refresh_availability();
        tracing::info!(
            beat = %self.progression.current(),
            consumed = self.ledger.len(),
            pending = self.pending.len(),
            "engine state restored"
        );
        Ok(())
    }

    /// Rebuild the catalog and trigger index from the content source. The
    /// new content replaces the old only once fully built; an active
    /// playback session keeps the content it was loaded from.
    pub fn reload(&mut self) -> Result<(), EngineError> {
        let source = self.source.as_ref().ok_or(EngineError::NoContent)?;
        let catalog = source.load_catalog()?;
        let fresh = Arc::new(LoadedContent::new(catalog));
        let mut progression =
            ProgressionMachine::new(fresh.catalog.beats().clone(), fresh.catalog.rules())
                .ok_or(CatalogError::NoBeats)?;
        progression.restore(self.progression.current());

        self.content = fresh;
        self.progression = progression;
        let content = &self.content;
        self.pending.retain(|id| content.catalog.event(id).is_some());
        self.refresh_availability();
        tracing::info!(events = self.content.catalog.events().len(), "content reloaded");
        Ok(())
    }

    /// Handle a progress update. Snapshots queued through the inbox while
    /// this runs are handled afterwards, one at a time; one report per
    /// processed snapshot is returned.
    pub fn on_progress_updated(&mut self, snapshot: GameMetricsSnapshot) -> Vec<ProgressReport> {
        self.inbox.submit(snapshot);
        let mut reports = Vec::new();
        while let Some(next) = self.inbox.pop() {
            reports.push(self.process_update(next));
        }
        reports
    }

    fn process_update(&mut self, mut snapshot: GameMetricsSnapshot) -> ProgressReport {
        let previous = self.last_snapshot.take();
        let beat_before = self.progression.current().clone();
        if snapshot.current_beat != beat_before {
            tracing::debug!(
                reported = %snapshot.current_beat,
                tracked = %beat_before,
                "snapshot beat overridden by tracked beat"
            );
            snapshot.current_beat = beat_before.clone();
        }

        // Milestones at the beat being left are checked before progression
        // can move past it.
        let mut triggered = Vec::new();
        for event in self.content.events_for_beat(&beat_before) {
            if self.is_settled(&event.id) {
                continue;
            }
            if evaluate(&event.trigger, &snapshot, previous.as_ref()) {
                tracing::debug!(event = %event.id, trigger = %event.trigger, "trigger fired");
                triggered.push(event.id.clone());
            }
        }

        let transition = self.progression.evaluate(&snapshot);
        if let Some(t) = &transition {
            snapshot.current_beat = t.to.clone();
            // Events that only came into scope with this update have no
            // meaningful "before", so they are checked as they stand now.
            for event in self.content.events_for_beat(&t.to) {
                if event.beat.admits(&beat_before) || self.is_settled(&event.id) {
                    continue;
                }
                if evaluate(&event.trigger, &snapshot, None) {
                    tracing::debug!(event = %event.id, trigger = %event.trigger, "trigger fired on beat entry");
                    triggered.push(event.id.clone());
                }
            }
        }
        self.add_pending(triggered.clone());

        if let Err(e) = self.store.write_metrics(&snapshot) {
            tracing::warn!(error = %e, "failed to save metrics; will retry on next update");
        }
        self.last_snapshot = Some(snapshot);

        if let Some(t) = &transition {
            self.notify(&EngineNotification::BeatChanged(t.clone()));
        }
        self.refresh_availability();

        ProgressReport {
            triggered,
            transition,
            available: self.available,
        }
    }

    /// Events satisfied right now at the snapshot's beat and not yet played.
    /// Used at cold start, where only "still pending" matters.
    pub fn check_currently_available(&self, snapshot: &GameMetricsSnapshot) -> Vec<EventId> {
        self.content
            .events_for_beat(&snapshot.current_beat)
            .filter(|e| !self.is_played(&e.id))
            .filter(|e| evaluate(&e.trigger, snapshot, None))
            .map(|e| e.id.clone())
            .collect()
    }

    /// Pick what to show when the player asks for a conversation: the
    /// oldest pending scripted event admitted at `beat`, otherwise banter.
    /// Events in the ledger, awaiting a completion retry, or in `completed`
    /// are never returned.
    pub fn start_conversation(&mut self, beat: &StoryBeat, completed: &[EventId]) -> Conversation {
        let ledger = &self.ledger;
        self.pending.retain(|id| !ledger.contains(id));

        for id in &self.pending {
            if completed.contains(id) || self.pending_completion.as_ref() == Some(id) {
                continue;
            }
            match self.content.catalog.event(id) {
                Some(event) if event.beat.admits(beat) => {
                    return Conversation::Event(event.clone());
                }
                Some(_) => {}
                None => tracing::warn!(event = %id, "pending event missing from catalog"),
            }
        }

        let catalog = &self.content.catalog;
        match self
            .selector
            .pick_banter(catalog.characters(), catalog.banter(), beat, catalog.beats())
        {
            Some(line) => Conversation::Banter(line),
            None => Conversation::Nothing,
        }
    }

    /// Prepare playback of `id`. Fails if the event was already played,
    /// another session is still active, or a finished session's completion
    /// still has to be retried.
    pub fn load(&mut self, id: &EventId) -> Result<(), EngineError> {
        if self.ledger.contains(id) {
            return Err(EngineError::AlreadyConsumed(id.clone()));
        }
        if let Some(unsaved) = &self.pending_completion {
            return Err(EngineError::CompletionPending(unsaved.clone()));
        }
        let content: Arc<dyn ContentLookup> = self.content.clone();
        self.playback.load(content, id)?;
        Ok(())
    }

    pub fn start(&mut self) -> Result<PlaybackStep, EngineError> {
        let step = self.playback.start()?;
        self.after_step(step)
    }

    /// The "continue" signal.
    pub fn advance(&mut self) -> Result<PlaybackStep, EngineError> {
        let step = self.playback.advance()?;
        self.after_step(step)
    }

    pub fn next_page(&mut self) -> Option<&DialogueEntry> {
        self.playback.next_page()
    }

    pub fn pause(&mut self) -> bool {
        self.playback.pause()
    }

    pub fn resume(&mut self) -> bool {
        self.playback.resume()
    }

    /// The "abort" signal. Clears the session; the event stays unplayed.
    pub fn abort(&mut self) -> bool {
        self.playback.abort()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback.state()
    }

    /// Retry saving a completion whose persistence write failed.
    pub fn retry_completion(&mut self) -> Result<(), EngineError> {
        self.persist_completion()
    }

    pub fn has_pending_completion(&self) -> bool {
        self.pending_completion.is_some()
    }

    fn after_step(&mut self, step: PlaybackStep) -> Result<PlaybackStep, EngineError> {
        if let PlaybackStep::Completed(id) = &step {
            self.pending_completion = Some(id.clone());
            self.refresh_availability();
            self.persist_completion()?;
        }
        Ok(step)
    }

    /// The only path that adds to the ledger.
    fn persist_completion(&mut self) -> Result<(), EngineError> {
        let id = self
            .pending_completion
            .clone()
            .ok_or(EngineError::NothingPending)?;

        if let Err(e) = self.store.append_ledger(&id) {
            tracing::warn!(event = %id, error = %e, "ledger write failed; completion kept for retry");
            return Err(e.into());
        }

        let stored = self.store.read_ledger()?;
        if !stored.contains(&id) {
            self.pending_completion = None;
            self.refresh_availability();
            tracing::error!(event = %id, "ledger write acknowledged but not read back");
            return Err(EngineError::Consistency(format!(
                "ledger write for '{}' was acknowledged but not stored",
                id
            )));
        }

        self.pending_completion = None;
        self.ledger.append(id.clone());
        self.pending.retain(|p| p != &id);
        tracing::info!(event = %id, "narrative event consumed");
        self.refresh_availability();
        Ok(())
    }

    fn add_pending(&mut self, ids: Vec<EventId>) {
        for id in ids {
            if !self.is_settled(&id) {
                self.pending.push(id);
            }
        }
    }

    /// Played, whether or not the ledger write has landed yet.
    fn is_played(&self, id: &EventId) -> bool {
        self.ledger.contains(id) || self.pending_completion.as_ref() == Some(id)
    }

    /// Played or already waiting to be played.
    fn is_settled(&self, id: &EventId) -> bool {
        self.is_played(id) || self.pending.contains(id)
    }

    fn refresh_availability(&mut self) {
        let beat = self.progression.current();
        let available = self.pending.iter().any(|id| {
            !self.is_played(id)
                && self
                    .content
                    .catalog
                    .event(id)
                    .is_some_and(|e| e.beat.admits(beat))
        });
        if available != self.available {
            self.available = available;
            self.notify(&EngineNotification::AvailabilityChanged(available));
        }
    }

    fn notify(&mut self, notification: &EngineNotification) {
        for (_, callback) in self.subscribers.iter_mut() {
            callback(notification);
        }
    }
}

impl<S: Persistence> NarrativeEngineBuilder<S> {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn page_width(mut self, width: usize) -> Self {
        self.config.page_width = width;
        self
    }

    pub fn recent_window(mut self, size: usize) -> Self {
        self.config.recent_window = size;
        self
    }

    /// Load content from a RON file or a directory of RON files.
    pub fn content_path(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.config.content_path = Some(path.clone());
        self.source = Some(Box::new(RonContentStore::new(path)));
        self
    }

    pub fn with_content<C: ContentStore + 'static>(mut self, source: C) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Provide a catalog directly (for testing without files). A catalog
    /// given this way cannot be reloaded unless a content source is set too.
    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_store<T: Persistence>(self, store: T) -> NarrativeEngineBuilder<T> {
        NarrativeEngineBuilder {
            config: self.config,
            source: self.source,
            catalog: self.catalog,
            store,
        }
    }

    pub fn build(self) -> Result<NarrativeEngine<S>, EngineError> {
        let mut source = self.source;
        if source.is_none() {
            if let Some(path) = &self.config.content_path {
                source = Some(Box::new(RonContentStore::new(path.clone())));
            }
        }

        let catalog = match self.catalog {
            Some(catalog) => catalog,
            None => source
                .as_ref()
                .ok_or(EngineError::NoContent)?
                .load_catalog()?,
        };

        let content = Arc::new(LoadedContent::new(catalog));
        let progression =
            ProgressionMachine::new(content.catalog.beats().clone(), content.catalog.rules())
                .ok_or(CatalogError::NoBeats)?;

        Ok(NarrativeEngine {
            selector: DialogueSelector::new(self.config.recent_window, self.config.seed),
            playback: PlaybackSequencer::new(self.config.page_width),
            config: self.config,
            source,
            content,
            progression,
            ledger: CompletionLedger::new(),
            store: self.store,
            last_snapshot: None,
            pending: Vec::new(),
            available: false,
            pending_completion: None,
            inbox: ProgressInbox::default(),
            subscribers: Vec::new(),
            next_subscription: 0,
        })
    }
}

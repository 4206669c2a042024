//! WASM bindings for storybeat-engine — drives a story from a web page.
//!
//! Values cross the boundary as JSON strings.

use wasm_bindgen::prelude::*;

use storybeat_engine::core::catalog::{RawCatalog, StaticContent};
use storybeat_engine::core::engine::{Conversation, NarrativeEngine};
use storybeat_engine::core::playback::{DialogueEntry, PlaybackStep};
use storybeat_engine::schema::event::EventId;
use storybeat_engine::schema::metrics::GameMetricsSnapshot;

// ---------------------------------------------------------------------------
// JSON helper types for communication across the WASM boundary
// ---------------------------------------------------------------------------
#[derive(serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ConversationInfo {
    Event { id: String, speakers: Vec<String> },
    Banter { character: String, text: String, category: String },
    Nothing,
}

#[derive(serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum StepInfo {
    Entry { entry: DialogueEntry },
    Completed { event: String },
    Paused,
    Finished,
}

impl From<PlaybackStep> for StepInfo {
    fn from(step: PlaybackStep) -> Self {
        match step {
            PlaybackStep::Entry(entry) => StepInfo::Entry { entry },
            PlaybackStep::Completed(id) => StepInfo::Completed { event: id.0 },
            PlaybackStep::Paused => StepInfo::Paused,
            PlaybackStep::Finished => StepInfo::Finished,
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, JsError> {
    serde_json::to_string(value).map_err(|e| JsError::new(&format!("Serialization error: {e}")))
}

fn parse_snapshot(json: &str) -> Result<GameMetricsSnapshot, JsError> {
    serde_json::from_str(json).map_err(|e| JsError::new(&format!("Invalid snapshot JSON: {e}")))
}

// ---------------------------------------------------------------------------
// StorySession — the main exported struct
// ---------------------------------------------------------------------------
#[wasm_bindgen]
pub struct StorySession {
    engine: NarrativeEngine,
}

#[wasm_bindgen]
impl StorySession {
    /// Create a session from a RON catalog document.
    #[wasm_bindgen(constructor)]
    pub fn new(catalog_ron: &str, seed: u64, page_width: usize) -> Result<StorySession, JsError> {
        let raw = RawCatalog::parse_ron(catalog_ron)
            .map_err(|e| JsError::new(&format!("Catalog parse error: {e}")))?;
        let engine = NarrativeEngine::builder()
            .seed(seed)
            .page_width(page_width)
            .with_content(StaticContent(raw))
            .build()
            .map_err(|e| JsError::new(&format!("Engine build error: {e}")))?;
        Ok(StorySession { engine })
    }

    /// Report progress. Returns a JSON array of progress reports.
    ///
    /// Expected JSON shape:
    /// ```json
    /// {
    ///   "completed_puzzles": 3,
    ///   "groups": { "fables": { "items": ["fox"], "completed": ["fox"] } },
    ///   "flags": ["tutorial_done"],
    ///   "current_beat": "hook"
    /// }
    /// ```
    pub fn update_progress(&mut self, snapshot_json: &str) -> Result<String, JsError> {
        let snapshot = parse_snapshot(snapshot_json)?;
        let reports = self.engine.on_progress_updated(snapshot);
        to_json(&reports)
    }

    /// Unplayed events satisfied right now. Returns a JSON array of ids.
    pub fn currently_available(&self, snapshot_json: &str) -> Result<String, JsError> {
        let snapshot = parse_snapshot(snapshot_json)?;
        to_json(&self.engine.check_currently_available(&snapshot))
    }

    /// Choose what to show at `beat`.
    pub fn talk(&mut self, beat: &str) -> Result<String, JsError> {
        let info = match self.engine.start_conversation(&beat.into(), &[]) {
            Conversation::Event(event) => ConversationInfo::Event {
                id: event.id.0.clone(),
                speakers: event.speakers().iter().map(|c| c.0.clone()).collect(),
            },
            Conversation::Banter(line) => ConversationInfo::Banter {
                character: line.character.0,
                text: line.text,
                category: line.category,
            },
            Conversation::Nothing => ConversationInfo::Nothing,
        };
        to_json(&info)
    }

    pub fn load(&mut self, event_id: &str) -> Result<(), JsError> {
        self.engine
            .load(&EventId::from(event_id))
            .map_err(|e| JsError::new(&format!("Load error: {e}")))
    }

    /// The "continue" signal. Returns the JSON playback step.
    pub fn advance(&mut self) -> Result<String, JsError> {
        let step = self
            .engine
            .advance()
            .map_err(|e| JsError::new(&format!("Playback error: {e}")))?;
        to_json(&StepInfo::from(step))
    }

    /// Returns the paged entry as JSON, or `null` when the line has no more pages.
    pub fn next_page(&mut self) -> Result<String, JsError> {
        to_json(&self.engine.next_page())
    }

    pub fn pause(&mut self) -> bool {
        self.engine.pause()
    }

    pub fn resume(&mut self) -> bool {
        self.engine.resume()
    }

    pub fn abort(&mut self) -> bool {
        self.engine.abort()
    }

    pub fn current_beat(&self) -> String {
        self.engine.current_beat().to_string()
    }

    /// JSON array of every played event id.
    pub fn played(&self) -> Result<String, JsError> {
        let ids: Vec<&EventId> = self.engine.ledger().iter().collect();
        to_json(&ids)
    }
}

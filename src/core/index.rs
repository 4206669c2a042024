/// Trigger index — catalog events grouped by owning beat.
///
/// Built once per catalog so a progress update only checks the events
/// relevant to the current beat instead of scanning the whole catalog.

use rustc_hash::FxHashMap;

use crate::core::catalog::Catalog;
use crate::schema::beat::{BeatScope, StoryBeat};
use crate::schema::event::NarrativeEvent;

#[derive(Debug, Clone, Default)]
pub struct TriggerIndex {
    /// Indices into `Catalog::events`, per beat, in declaration order.
    by_beat: FxHashMap<StoryBeat, Vec<usize>>,
    any_beat: Vec<usize>,
}

impl TriggerIndex {
    pub fn build(catalog: &Catalog) -> TriggerIndex {
        let mut index = TriggerIndex::default();
        for (i, event) in catalog.events().iter().enumerate() {
            match &event.beat {
                BeatScope::Any => index.any_beat.push(i),
                BeatScope::Beat(beat) => index.by_beat.entry(beat.clone()).or_default().push(i),
            }
        }
        tracing::debug!(
            beats = index.by_beat.len(),
            any = index.any_beat.len(),
            "trigger index built"
        );
        index
    }

    /// Events scoped to `beat`, followed by events scoped to any beat.
    pub fn events_for_beat<'a>(
        &'a self,
        catalog: &'a Catalog,
        beat: &StoryBeat,
    ) -> impl Iterator<Item = &'a NarrativeEvent> + 'a {
        let scoped = self.by_beat.get(beat).map(Vec::as_slice).unwrap_or(&[]);
        scoped
            .iter()
            .chain(self.any_beat.iter())
            .filter_map(move |&i| catalog.events().get(i))
    }

    /// Number of events a check at `beat` has to look at.
    pub fn candidate_count(&self, beat: &StoryBeat) -> usize {
        self.by_beat.get(beat).map_or(0, Vec::len) + self.any_beat.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::event::EventId;

    fn catalog() -> Catalog {
        Catalog::parse_ron(
            r#"(
                beats: ["hook", "midpoint", "end"],
                characters: [(id: "cat", name: "Inkblot")],
                events: [
                    (id: "h1", beat: Some("hook"), trigger: "first:puzzles", lines: [(speaker: "cat", text: "a")]),
                    (id: "any1", trigger: "flag:x", lines: [(speaker: "cat", text: "b")]),
                    (id: "m1", beat: Some("midpoint"), trigger: "reach:puzzles:5", lines: [(speaker: "cat", text: "c")]),
                    (id: "h2", beat: Some("hook"), trigger: "reach:puzzles:2", lines: [(speaker: "cat", text: "d")]),
                ],
            )"#,
        )
        .unwrap()
    }

    fn ids(index: &TriggerIndex, catalog: &Catalog, beat: &str) -> Vec<EventId> {
        index
            .events_for_beat(catalog, &beat.into())
            .map(|e| e.id.clone())
            .collect()
    }

    #[test]
    fn beat_events_then_any() {
        let catalog = catalog();
        let index = TriggerIndex::build(&catalog);
        assert_eq!(
            ids(&index, &catalog, "hook"),
            vec![EventId::from("h1"), EventId::from("h2"), EventId::from("any1")]
        );
        assert_eq!(
            ids(&index, &catalog, "midpoint"),
            vec![EventId::from("m1"), EventId::from("any1")]
        );
        assert_eq!(ids(&index, &catalog, "end"), vec![EventId::from("any1")]);
        assert_eq!(index.candidate_count(&"hook".into()), 3);
    }

    #[test]
    fn stable_across_calls() {
        let catalog = catalog();
        let index = TriggerIndex::build(&catalog);
        let first = ids(&index, &catalog, "hook");
        for _ in 0..5 {
            assert_eq!(ids(&index, &catalog, "hook"), first);
        }
    }

    #[test]
    fn unknown_beat_gets_any_only() {
        let catalog = catalog();
        let index = TriggerIndex::build(&catalog);
        assert_eq!(ids(&index, &catalog, "nowhere"), vec![EventId::from("any1")]);
    }
}

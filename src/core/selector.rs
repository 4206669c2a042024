/// Dialogue selector — weighted banter choice with recency avoidance.

use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

use crate::schema::banter::BanterLine;
use crate::schema::beat::{BeatOrder, StoryBeat};
use crate::schema::character::{Character, CharacterId};

/// Default number of recently used speakers to remember.
pub const DEFAULT_RECENT_WINDOW: usize = 3;
/// Draw weight for a character not spoken recently.
const FRESH_WEIGHT: u32 = 3;
/// Draw weight for a character in the recent ring.
const RECENT_WEIGHT: u32 = 1;

/// Bounded FIFO of recently chosen speakers. Oldest is evicted on overflow.
#[derive(Debug, Clone)]
pub struct RecentRing {
    capacity: usize,
    entries: VecDeque<CharacterId>,
}

impl RecentRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, id: CharacterId) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(id);
    }

    pub fn contains(&self, id: &CharacterId) -> bool {
        self.entries.contains(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CharacterId> {
        self.entries.iter()
    }
}

impl Default for RecentRing {
    fn default() -> Self {
        Self::new(DEFAULT_RECENT_WINDOW)
    }
}

#[derive(Debug, Clone)]
pub struct DialogueSelector {
    recent: RecentRing,
    rng: StdRng,
}

impl DialogueSelector {
    pub fn new(recent_window: usize, seed: u64) -> Self {
        Self {
            recent: RecentRing::new(recent_window),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn recent(&self) -> &RecentRing {
        &self.recent
    }

    /// Choose a banter line for `beat`.
    ///
    /// Characters with at least one line available at `beat` form a pool,
    /// weighted 3 if absent from the recent ring and 1 if present. A
    /// character is drawn from the pool, then one of their eligible lines
    /// uniformly. Returns `None` when nobody has anything to say.
    pub fn pick_banter(
        &mut self,
        characters: &[Character],
        banter: &[BanterLine],
        beat: &StoryBeat,
        order: &BeatOrder,
    ) -> Option<BanterLine> {
        let mut pool: Vec<(&Character, Vec<&BanterLine>)> = Vec::new();
        for character in characters {
            let lines: Vec<&BanterLine> = banter
                .iter()
                .filter(|l| l.character == character.id && l.window.contains(beat, order))
                .collect();
            if !lines.is_empty() {
                pool.push((character, lines));
            }
        }
        if pool.is_empty() {
            tracing::debug!(%beat, "no eligible banter");
            return None;
        }

        let weights: Vec<u32> = pool
            .iter()
            .map(|(c, _)| {
                if self.recent.contains(&c.id) {
                    RECENT_WEIGHT
                } else {
                    FRESH_WEIGHT
                }
            })
            .collect();
        let dist = WeightedIndex::new(&weights).ok()?;
        let (character, lines) = &pool[dist.sample(&mut self.rng)];
        let line = lines[self.rng.gen_range(0..lines.len())].clone();

        self.recent.push(character.id.clone());
        Some(line)
    }
}

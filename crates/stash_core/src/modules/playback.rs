use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::catalog::ItemCatalog;
use crate::{ItemKind, ItemStack};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayMode {
    #[default]
    SequentialRepeat,
    RepeatOne,
    /// Random order, never the same entry twice in a row.
    Shuffle,
}

impl PlayMode {
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::SequentialRepeat => Self::RepeatOne,
            Self::RepeatOne => Self::Shuffle,
            Self::Shuffle => Self::SequentialRepeat,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::SequentialRepeat => "repeat all",
            Self::RepeatOne => "repeat one",
            Self::Shuffle => "shuffle",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackState {
    /// The track items themselves; removing the module carries them along.
    pub program: Vec<ItemStack>,
    pub mode: PlayMode,
    pub current: Option<usize>,
    pub current_kind: Option<ItemKind>,
    pub remaining_quanta: u64,
    pub playing: bool,
}

/// Cue transition produced by a playback step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CueChange {
    None,
    Started(String),
    Stopped(String),
    Switched { from: String, to: String },
}

impl PlaybackState {
    fn playable(&self, catalog: &ItemCatalog) -> Vec<usize> {
        self.program
            .iter()
            .enumerate()
            .filter(|(_, item)| catalog.track(&item.kind).is_some())
            .map(|(i, _)| i)
            .collect()
    }

    /// The current selection is still the entry it was when it started.
    fn current_valid(&self) -> bool {
        match (self.current, &self.current_kind) {
            (Some(i), Some(kind)) => self.program.get(i).is_some_and(|item| &item.kind == kind),
            _ => false,
        }
    }

    fn current_sound(&self, catalog: &ItemCatalog) -> Option<String> {
        self.current_kind
            .as_deref()
            .and_then(|k| catalog.track(k))
            .map(|t| t.sound.clone())
    }

    fn choose(&self, catalog: &ItemCatalog, rng: &mut impl Rng) -> Option<usize> {
        let playable = self.playable(catalog);
        if playable.is_empty() {
            return None;
        }
        let valid_current = self.current.filter(|_| self.current_valid());
        match self.mode {
            PlayMode::RepeatOne => valid_current.or(Some(playable[0])),
            PlayMode::SequentialRepeat => match self.current {
                Some(cur) => playable
                    .iter()
                    .copied()
                    .find(|&i| i > cur)
                    .or(Some(playable[0])),
                None => Some(playable[0]),
            },
            PlayMode::Shuffle => {
                let pool: Vec<usize> = if playable.len() > 1 {
                    playable
                        .iter()
                        .copied()
                        .filter(|&i| Some(i) != valid_current)
                        .collect()
                } else {
                    playable
                };
                Some(pool[rng.gen_range(0..pool.len())])
            }
        }
    }

    fn select(&mut self, index: usize, catalog: &ItemCatalog) -> Option<String> {
        let kind = self.program.get(index)?.kind.clone();
        let track = catalog.track(&kind)?;
        self.current = Some(index);
        self.current_kind = Some(kind);
        self.remaining_quanta = track.duration_quanta.max(1);
        Some(track.sound.clone())
    }

    fn halt(&mut self) {
        self.playing = false;
        self.current = None;
        self.current_kind = None;
        self.remaining_quanta = 0;
    }

    pub fn start(&mut self, catalog: &ItemCatalog, rng: &mut impl Rng) -> CueChange {
        if self.playing && self.current_valid() {
            return CueChange::None;
        }
        self.current = None;
        match self.choose(catalog, rng).and_then(|i| self.select(i, catalog)) {
            Some(sound) => {
                self.playing = true;
                CueChange::Started(sound)
            }
            None => {
                self.halt();
                CueChange::None
            }
        }
    }

    pub fn stop(&mut self, catalog: &ItemCatalog) -> CueChange {
        if !self.playing {
            return CueChange::None;
        }
        let sound = self.current_sound(catalog);
        self.halt();
        sound.map_or(CueChange::None, CueChange::Stopped)
    }

    /// Advance by `d` quanta, moving on when the track ends or vanishes from the program.
    pub fn step(&mut self, d: u64, catalog: &ItemCatalog, rng: &mut impl Rng) -> CueChange {
        if !self.playing {
            return CueChange::None;
        }
        let was = self.current_sound(catalog);
        if self.current_valid() && self.remaining_quanta > d {
            self.remaining_quanta -= d;
            return CueChange::None;
        }
        if !self.current_valid() {
            // Entry edited out: sequential play resumes from the slot it left.
            self.current_kind = None;
        }
        let next = self.choose(catalog, rng).and_then(|i| self.select(i, catalog));
        match (was, next) {
            (Some(from), Some(to)) => CueChange::Switched { from, to },
            (None, Some(to)) => CueChange::Started(to),
            (Some(from), None) => {
                self.halt();
                CueChange::Stopped(from)
            }
            (None, None) => {
                self.halt();
                CueChange::None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{base_content, make_rng};

    fn program(kinds: &[&str]) -> PlaybackState {
        PlaybackState {
            program: kinds.iter().map(|k| ItemStack::new(*k, 1)).collect(),
            ..PlaybackState::default()
        }
    }

    #[test]
    fn sequential_repeat_wraps() {
        let content = base_content();
        let catalog = &content.items;
        let mut rng = make_rng();
        let mut p = program(&["disc_cat", "stone", "disc_far"]);
        assert_eq!(p.start(catalog, &mut rng), CueChange::Started("music.cat".to_string()));
        let cat_len = catalog.track("disc_cat").map_or(0, |t| t.duration_quanta);
        assert_eq!(p.step(cat_len, catalog, &mut rng), CueChange::Switched {
            from: "music.cat".to_string(),
            to: "music.far".to_string()
        });
        assert_eq!(p.current, Some(2));
        let far_len = catalog.track("disc_far").map_or(0, |t| t.duration_quanta);
        p.step(far_len, catalog, &mut rng);
        assert_eq!(p.current, Some(0));
    }

    #[test]
    fn repeat_one_sticks() {
        let content = base_content();
        let catalog = &content.items;
        let mut rng = make_rng();
        let mut p = program(&["disc_cat", "disc_far"]);
        p.mode = PlayMode::RepeatOne;
        p.start(catalog, &mut rng);
        for _ in 0..5 {
            p.step(1_000, catalog, &mut rng);
            assert_eq!(p.current, Some(0));
        }
    }

    #[test]
    fn shuffle_never_repeats_immediately() {
        let content = base_content();
        let catalog = &content.items;
        let mut rng = make_rng();
        let mut p = program(&["disc_cat", "disc_blocks", "disc_far"]);
        p.mode = PlayMode::Shuffle;
        p.start(catalog, &mut rng);
        let mut last = p.current;
        for _ in 0..50 {
            p.step(10_000, catalog, &mut rng);
            assert!(p.current.is_some());
            assert_ne!(p.current, last);
            last = p.current;
        }
    }

    #[test]
    fn removed_entry_moves_on_and_empty_program_stops() {
        let content = base_content();
        let catalog = &content.items;
        let mut rng = make_rng();
        let mut p = program(&["disc_cat", "disc_far"]);
        p.start(catalog, &mut rng);
        p.program[0] = ItemStack::new("stone", 1);
        assert!(matches!(p.step(1, catalog, &mut rng), CueChange::Switched { .. }));
        assert_eq!(p.current, Some(1));

        p.program.clear();
        assert_eq!(p.step(1, catalog, &mut rng), CueChange::Stopped("music.far".to_string()));
        assert!(!p.playing);
    }

    #[test]
    fn program_without_tracks_never_starts() {
        let content = base_content();
        let mut rng = make_rng();
        let mut p = program(&["stone"]);
        assert_eq!(p.start(&content.items, &mut rng), CueChange::None);
        assert!(!p.playing);
    }
}

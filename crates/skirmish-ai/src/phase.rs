//! Global game phase, passed explicitly instead of through a singleton.
//!
//! The host owns a `PhaseSignal` and hands `PhaseReader`s to whatever needs
//! to gate on it. Readers can never change the phase.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// High-level phase of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    /// Intro, nothing runs
    #[default]
    Start,
    /// Countdown before play
    Wait,
    /// Active play; spawners run
    Play,
    /// Match finished
    Over,
}

impl GamePhase {
    /// Returns whether active play is running.
    #[must_use]
    pub const fn is_play(self) -> bool {
        matches!(self, Self::Play)
    }
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::Wait => "wait",
            Self::Play => "play",
            Self::Over => "over",
        };
        f.write_str(name)
    }
}

/// Writable phase flag held by the host.
#[derive(Debug, Default)]
pub struct PhaseSignal {
    phase: Arc<RwLock<GamePhase>>,
}

impl PhaseSignal {
    /// Creates a signal starting in `phase`.
    #[must_use]
    pub fn new(phase: GamePhase) -> Self {
        Self {
            phase: Arc::new(RwLock::new(phase)),
        }
    }

    /// Changes the phase.
    pub fn set(&self, phase: GamePhase) {
        let mut current = self.phase.write();
        if *current != phase {
            tracing::info!("Game phase {} -> {}", *current, phase);
            *current = phase;
        }
    }

    /// Current phase.
    #[must_use]
    pub fn get(&self) -> GamePhase {
        *self.phase.read()
    }

    /// Creates a read-only view.
    #[must_use]
    pub fn reader(&self) -> PhaseReader {
        PhaseReader {
            phase: Arc::clone(&self.phase),
        }
    }
}

/// Read-only view of the phase flag.
#[derive(Debug, Clone)]
pub struct PhaseReader {
    phase: Arc<RwLock<GamePhase>>,
}

impl PhaseReader {
    /// A reader pinned to `phase`, not connected to any signal.
    #[must_use]
    pub fn fixed(phase: GamePhase) -> Self {
        Self {
            phase: Arc::new(RwLock::new(phase)),
        }
    }

    /// Current phase.
    #[must_use]
    pub fn get(&self) -> GamePhase {
        *self.phase.read()
    }

    /// Returns whether active play is running.
    #[must_use]
    pub fn is_play(&self) -> bool {
        self.get().is_play()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_follows_signal() {
        let signal = PhaseSignal::new(GamePhase::Wait);
        let reader = signal.reader();
        assert!(!reader.is_play());

        signal.set(GamePhase::Play);
        assert!(reader.is_play());
        assert_eq!(reader.get(), GamePhase::Play);

        signal.set(GamePhase::Over);
        assert_eq!(reader.get(), GamePhase::Over);
    }

    #[test]
    fn test_fixed_reader() {
        assert!(PhaseReader::fixed(GamePhase::Play).is_play());
        assert!(!PhaseReader::fixed(GamePhase::Start).is_play());
    }

    #[test]
    fn test_phase_serde_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            phase: GamePhase,
        }
        let parsed: Wrapper = toml::from_str("phase = \"play\"").expect("valid toml");
        assert_eq!(parsed.phase, GamePhase::Play);
    }
}

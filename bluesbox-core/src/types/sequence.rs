//! Groove feels and the fixed catalog of selectable sequences

use crate::types::note::PitchClass;
use crate::types::progression::{Progression, Variation, build_progression};
use std::fmt;

/// Rhythmic feel of a sequence. Determines default tempo and swing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Groove {
    #[default]
    Shuffle,
    Swing,
    Straight,
    Slow,
}

impl Groove {
    /// Tempo a sequence with this groove starts at, in BPM
    pub fn default_tempo(&self) -> u32 {
        match self {
            Groove::Shuffle => 96,
            Groove::Swing => 120,
            Groove::Straight => 110,
            Groove::Slow => 66,
        }
    }

    /// Share of each eighth note given to its first sixteenth (0.5 = even)
    pub fn swing_amount(&self) -> f64 {
        match self {
            Groove::Shuffle | Groove::Swing => 0.6,
            Groove::Straight | Groove::Slow => 0.5,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Groove::Shuffle => "shuffle",
            Groove::Swing => "swing",
            Groove::Straight => "straight",
            Groove::Slow => "slow",
        }
    }
}

/// A selectable backing sequence
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SequenceDescriptor {
    pub id: &'static str,
    pub title: &'static str,
    pub key: PitchClass,
    pub variation: Variation,
    pub groove: Groove,
}

impl SequenceDescriptor {
    /// The twelve bars this sequence plays
    pub fn progression(&self) -> Progression {
        build_progression(self.key, self.variation)
    }
}

impl fmt::Display for SequenceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {}, {} bpm)",
            self.title,
            self.variation.name(),
            self.groove.name(),
            self.groove.default_tempo()
        )
    }
}

/// Every sequence the performer can pick from
pub const CATALOG: &[SequenceDescriptor] = &[
    SequenceDescriptor {
        id: "c-shuffle",
        title: "C Blues — Shuffle",
        key: PitchClass::wrapping(0),
        variation: Variation::Basic,
        groove: Groove::Shuffle,
    },
    SequenceDescriptor {
        id: "g-quick-swing",
        title: "G Blues — Quick Change Swing",
        key: PitchClass::wrapping(7),
        variation: Variation::QuickChange,
        groove: Groove::Swing,
    },
    SequenceDescriptor {
        id: "e-turnaround",
        title: "E Blues — Turnaround Straight",
        key: PitchClass::wrapping(4),
        variation: Variation::TurnaroundV,
        groove: Groove::Straight,
    },
    SequenceDescriptor {
        id: "a-minor-slow",
        title: "A Minor Blues — Slow",
        key: PitchClass::wrapping(9),
        variation: Variation::MinorBlues,
        groove: Groove::Slow,
    },
    SequenceDescriptor {
        id: "f-shuffle",
        title: "F Blues — Shuffle",
        key: PitchClass::wrapping(5),
        variation: Variation::QuickChange,
        groove: Groove::Shuffle,
    },
    SequenceDescriptor {
        id: "bb-swing",
        title: "A# Blues — Turnaround Swing",
        key: PitchClass::wrapping(10),
        variation: Variation::TurnaroundV,
        groove: Groove::Swing,
    },
];

/// Look up a catalog entry by id
pub fn find_sequence(id: &str) -> Option<&'static SequenceDescriptor> {
    CATALOG.iter().find(|s| s.id == id)
}

/// The sequence selected when nothing else has been chosen
pub fn default_sequence() -> &'static SequenceDescriptor {
    &CATALOG[0]
}

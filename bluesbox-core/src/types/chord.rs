use crate::types::note::PitchClass;
#[cfg(feature = "colored")]
use colored::*;
use std::fmt;
use std::ops::Add;

/// Chord quality. The accompaniment only ever voices dominant sevenths,
/// but the quality is kept explicit so voicings derive from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChordQuality {
    #[default]
    DominantSeventh,
}

impl ChordQuality {
    /// Semitone offsets of the chord tones above the root
    pub fn intervals(&self) -> &'static [i32] {
        match self {
            ChordQuality::DominantSeventh => &[0, 4, 7, 10],
        }
    }

    /// Suffix used in chord symbols ("C7")
    pub fn symbol(&self) -> &'static str {
        match self {
            ChordQuality::DominantSeventh => "7",
        }
    }
}

/// An immutable chord: a root pitch class plus a quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Chord {
    root: PitchClass,
    quality: ChordQuality,
}

impl Chord {
    /// Create a dominant-seventh chord on the given root
    pub fn dominant_seventh(root: PitchClass) -> Self {
        Chord {
            root,
            quality: ChordQuality::DominantSeventh,
        }
    }

    pub fn root(&self) -> PitchClass {
        self.root
    }

    pub fn quality(&self) -> ChordQuality {
        self.quality
    }

    /// Pitch classes of the chord tones, root first
    pub fn pitch_classes(&self) -> Vec<PitchClass> {
        self.quality
            .intervals()
            .iter()
            .map(|&i| self.root + i)
            .collect()
    }

    /// Close-position voicing as MIDI note numbers, root placed in `octave`
    pub fn voicing(&self, octave: i32) -> Vec<i32> {
        let root = self.root.midi_in_octave(octave);
        self.quality.intervals().iter().map(|&i| root + i).collect()
    }

    /// Chord symbol, e.g. "F#7"
    pub fn symbol(&self) -> String {
        format!("{}{}", self.root.name(), self.quality.symbol())
    }
}

impl Add<i32> for Chord {
    type Output = Chord;

    /// Transpose the chord by a number of semitones
    fn add(self, semitones: i32) -> Chord {
        Chord {
            root: self.root + semitones,
            quality: self.quality,
        }
    }
}

#[cfg(feature = "colored")]
impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol().green().bold())
    }
}

#[cfg(not(feature = "colored"))]
impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

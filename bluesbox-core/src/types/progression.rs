//! Twelve-bar blues progression generator
//!
//! Builds the chord-per-bar layout for one cycle of a blues in any key.
//! The dominant forms are laid out from two independent flags (the "quick
//! change" to IV in bar 2, and a V turnaround in bar 12), giving four
//! skeletons; the minor form has a single skeleton and ignores both flags.

use crate::types::chord::Chord;
use crate::types::note::PitchClass;
#[cfg(feature = "colored")]
use colored::*;
use std::fmt;
use std::ops::Index;

/// Number of bars in one progression cycle
pub const BARS_PER_CYCLE: usize = 12;

/// Scale degree of a bar's chord relative to the key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Degree {
    I,
    IV,
    V,
}

impl Degree {
    /// Semitones above the key
    pub fn offset(&self) -> i32 {
        match self {
            Degree::I => 0,
            Degree::IV => 5,
            Degree::V => 7,
        }
    }

    /// Roman numeral label
    pub fn numeral(&self) -> &'static str {
        match self {
            Degree::I => "I",
            Degree::IV => "IV",
            Degree::V => "V",
        }
    }
}

use Degree::{I, IV, V};

const MINOR_SKELETON: [Degree; BARS_PER_CYCLE] = [I, I, I, I, IV, IV, I, I, V, V, I, I];

/// Progression variation tag, as carried by a sequence descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Variation {
    #[default]
    Basic,
    QuickChange,
    TurnaroundV,
    MinorBlues,
}

impl Variation {
    pub fn all() -> [Variation; 4] {
        [
            Variation::Basic,
            Variation::QuickChange,
            Variation::TurnaroundV,
            Variation::MinorBlues,
        ]
    }

    /// Form flags this variation lays out
    pub fn form(&self) -> BluesForm {
        match self {
            Variation::Basic => BluesForm::default(),
            Variation::QuickChange => BluesForm {
                quick_change: true,
                ..BluesForm::default()
            },
            Variation::TurnaroundV => BluesForm {
                turnaround_v: true,
                ..BluesForm::default()
            },
            Variation::MinorBlues => BluesForm {
                minor: true,
                ..BluesForm::default()
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Variation::Basic => "basic",
            Variation::QuickChange => "quick change",
            Variation::TurnaroundV => "turnaround V",
            Variation::MinorBlues => "minor blues",
        }
    }
}

/// Independent layout flags for a twelve-bar form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BluesForm {
    /// Bar 2 moves to IV instead of staying on I
    pub quick_change: bool,
    /// Last four bars run V-IV-I-V instead of V-IV-I-I
    pub turnaround_v: bool,
    /// Use the minor-blues skeleton (both flags above are ignored)
    pub minor: bool,
}

impl BluesForm {
    /// Degree of every bar in the cycle
    pub fn skeleton(&self) -> [Degree; BARS_PER_CYCLE] {
        if self.minor {
            return MINOR_SKELETON;
        }

        let mut bars = [I, I, I, I, IV, IV, I, I, V, IV, I, I];
        if self.quick_change {
            bars[1] = IV;
        }
        if self.turnaround_v {
            bars[11] = V;
        }
        bars
    }
}

/// One bar of the progression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bar {
    pub chord: Chord,
    pub degree: Degree,
}

/// One full cycle of bars. Always exactly twelve long, so it is only
/// built by `build_progression*`, never deserialized.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Progression {
    key: PitchClass,
    bars: Vec<Bar>,
}

impl Progression {
    pub fn key(&self) -> PitchClass {
        self.key
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    /// Bar at a running bar index, wrapping around the cycle
    pub fn bar_at(&self, bar_index: usize) -> &Bar {
        &self.bars[bar_index % self.bars.len()]
    }

    /// Render the progression as bar lines, highlighting `active` if given
    pub fn display_with_active(&self, active: Option<usize>) -> String {
        let mut out = String::new();
        for (i, bar) in self.bars.iter().enumerate() {
            if i > 0 && i % 4 == 0 {
                out.push_str(" |\n");
            }
            out.push_str("| ");
            let symbol = format!("{:<4}", bar.chord.symbol());
            if active == Some(i) {
                #[cfg(feature = "colored")]
                out.push_str(&symbol.black().on_yellow().to_string());
                #[cfg(not(feature = "colored"))]
                out.push_str(&format!("[{}]", symbol.trim_end()));
            } else {
                out.push_str(&symbol);
            }
            out.push(' ');
        }
        out.push('|');
        out
    }
}

impl Index<usize> for Progression {
    type Output = Bar;

    fn index(&self, index: usize) -> &Bar {
        &self.bars[index]
    }
}

impl fmt::Display for Progression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_with_active(None))
    }
}

/// Build the twelve bars for `key` laid out per `variation`. Total: every
/// key and variation yields a valid cycle.
pub fn build_progression(key: PitchClass, variation: Variation) -> Progression {
    build_progression_with(key, variation.form())
}

/// Build the twelve bars for `key` from explicit form flags
pub fn build_progression_with(key: PitchClass, form: BluesForm) -> Progression {
    let bars = form
        .skeleton()
        .iter()
        .map(|&degree| Bar {
            chord: Chord::dominant_seventh(key + degree.offset()),
            degree,
        })
        .collect();

    Progression { key, bars }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roots(p: &Progression) -> Vec<u8> {
        p.bars().iter().map(|b| b.chord.root().value()).collect()
    }

    #[test]
    fn test_basic_in_c() {
        let p = build_progression(PitchClass::C, Variation::Basic);
        assert_eq!(roots(&p), vec![0, 0, 0, 0, 5, 5, 0, 0, 7, 5, 0, 0]);
    }

    #[test]
    fn test_quick_change_moves_bar_two() {
        let p = build_progression(PitchClass::C, Variation::QuickChange);
        assert_eq!(p[1].degree, Degree::IV);
        assert_eq!(p[1].chord.root().value(), 5);
    }

    #[test]
    fn test_turnaround_ends_on_five() {
        let p = build_progression(PitchClass::from_semitone(7), Variation::TurnaroundV);
        let last_four: Vec<Degree> = p.bars()[8..].iter().map(|b| b.degree).collect();
        assert_eq!(last_four, vec![Degree::V, Degree::IV, Degree::I, Degree::V]);
        assert_eq!(p[11].chord.root().value(), 2); // D7 in G
    }

    #[test]
    fn test_combined_form() {
        let form = BluesForm {
            quick_change: true,
            turnaround_v: true,
            minor: false,
        };
        let p = build_progression_with(PitchClass::C, form);
        assert_eq!(p[1].degree, Degree::IV);
        assert_eq!(p[11].degree, Degree::V);
    }

    #[test]
    fn test_bar_at_wraps() {
        let p = build_progression(PitchClass::C, Variation::Basic);
        assert_eq!(p.bar_at(12), &p[0]);
        assert_eq!(p.bar_at(20), &p[8]);
    }

    #[test]
    fn test_display_lists_all_bars() {
        let p = build_progression(PitchClass::C, Variation::Basic);
        let text = p.display_with_active(None);
        assert_eq!(text.matches("C7").count(), 8);
        assert_eq!(text.matches("F7").count(), 3);
        assert_eq!(text.matches("G7").count(), 1);
    }
}

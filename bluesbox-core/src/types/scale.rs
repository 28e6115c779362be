//! Blues scale derivation and nearest-pitch quantization

use crate::types::chord::Chord;
use crate::types::note::PitchClass;
use std::collections::BTreeSet;

/// Semitone offsets of the hexatonic blues scale above its root
pub const BLUES_SCALE_OFFSETS: [i32; 6] = [0, 3, 5, 6, 7, 10];

/// How far either side of a pitch the quantizer searches
const MAX_SNAP: i32 = 6;

/// A set of allowed pitch classes. Empty means "anything goes".
pub type PitchClassSet = BTreeSet<PitchClass>;

/// The six blues-scale pitch classes rooted on the chord's root
pub fn scale_for(chord: &Chord) -> PitchClassSet {
    BLUES_SCALE_OFFSETS
        .iter()
        .map(|&offset| chord.root() + offset)
        .collect()
}

/// Snap a MIDI pitch to the nearest pitch whose class is in `allowed`.
///
/// An empty set disables quantization. Upward and downward candidates are
/// searched independently; on equal distance the upward one wins.
pub fn quantize(pitch: i32, allowed: &PitchClassSet) -> i32 {
    if allowed.is_empty() || allowed.contains(&PitchClass::of_midi(pitch)) {
        return pitch;
    }

    let up = (1..=MAX_SNAP)
        .filter_map(|d| pitch.checked_add(d))
        .find(|p| allowed.contains(&PitchClass::of_midi(*p)));
    let down = (1..=MAX_SNAP)
        .filter_map(|d| pitch.checked_sub(d))
        .find(|p| allowed.contains(&PitchClass::of_midi(*p)));

    match (up, down) {
        (Some(u), Some(d)) => {
            if u.abs_diff(pitch) <= pitch.abs_diff(d) {
                u
            } else {
                d
            }
        }
        (Some(u), None) => u,
        (None, Some(d)) => d,
        (None, None) => pitch,
    }
}

use anyhow::{Result, anyhow};
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

/// Sharp-spelled names for the twelve chromatic pitch classes
/// 0=C, 1=C#, 2=D, 3=D#, 4=E, 5=F, 6=F#, 7=G, 8=G#, 9=A, 10=A#, 11=B
pub const PITCH_CLASS_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// MIDI note number of A4, the tuning reference
const A4_MIDI: i32 = 69;
/// Frequency of A4 in Hz
const A4_FREQUENCY: f32 = 440.0;

/// A semitone class in 12-tone equal temperament (0-11)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8"))]
pub struct PitchClass(u8);

impl TryFrom<u8> for PitchClass {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl PitchClass {
    pub const C: PitchClass = PitchClass(0);

    /// Create a pitch class from its chromatic index (0-11)
    pub fn new(value: u8) -> Result<Self> {
        if value > 11 {
            return Err(anyhow!("Pitch class must be 0-11, got {}", value));
        }
        Ok(PitchClass(value))
    }

    /// Wrap a small index onto the 12-tone circle (usable in constants)
    pub const fn wrapping(value: u8) -> Self {
        PitchClass(value % 12)
    }

    /// Wrap any semitone count (including negative ones) onto the 12-tone circle
    pub fn from_semitone(semitone: i32) -> Self {
        PitchClass(semitone.rem_euclid(12) as u8)
    }

    /// Pitch class of a MIDI note number
    pub fn of_midi(note: i32) -> Self {
        Self::from_semitone(note)
    }

    /// Chromatic index (0-11)
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Display name, sharp spelling
    pub fn name(&self) -> &'static str {
        PITCH_CLASS_NAMES[self.0 as usize]
    }

    /// Transpose by a number of semitones, wrapping around the octave
    pub fn transpose(self, semitones: i32) -> Self {
        Self::from_semitone(self.0 as i32 + semitones)
    }

    /// All twelve pitch classes in ascending order
    pub fn all() -> impl Iterator<Item = PitchClass> {
        (0..12u8).map(PitchClass)
    }

    /// MIDI note number of this pitch class in the given octave
    /// (scientific pitch notation, C4 = 60)
    pub fn midi_in_octave(&self, octave: i32) -> i32 {
        (octave + 1) * 12 + self.0 as i32
    }
}

impl From<PitchClass> for u8 {
    fn from(pc: PitchClass) -> u8 {
        pc.0
    }
}

impl Add<i32> for PitchClass {
    type Output = PitchClass;

    fn add(self, semitones: i32) -> PitchClass {
        self.transpose(semitones)
    }
}

impl Sub<i32> for PitchClass {
    type Output = PitchClass;

    fn sub(self, semitones: i32) -> PitchClass {
        self.transpose(-semitones)
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for PitchClass {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let mut chars = s.chars();
        let letter = chars
            .next()
            .ok_or_else(|| anyhow!("Empty pitch class name"))?
            .to_ascii_uppercase();

        let natural = match letter {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(anyhow!("Invalid pitch class name: {}", s)),
        };

        let offset: i32 = chars
            .map(|c| match c {
                '#' | '♯' => Ok(1),
                'b' | '♭' => Ok(-1),
                _ => Err(anyhow!("Invalid accidental in pitch class: {}", s)),
            })
            .sum::<Result<i32>>()?;

        Ok(PitchClass::from_semitone(natural + offset))
    }
}

/// Equal-tempered frequency of a (possibly fractional) MIDI note number
pub fn midi_to_frequency(note: f32) -> f32 {
    A4_FREQUENCY * 2.0_f32.powf((note - A4_MIDI as f32) / 12.0)
}

/// Playback-rate multiplier for a pitch shift expressed in cents
pub fn cents_to_ratio(cents: f32) -> f32 {
    2.0_f32.powf(cents / 1200.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_class_range() {
        assert!(PitchClass::new(11).is_ok());
        assert!(PitchClass::new(12).is_err());
    }

    #[test]
    fn test_try_from_rejects_out_of_range() {
        assert_eq!(PitchClass::try_from(7u8).unwrap().name(), "G");
        assert!(PitchClass::try_from(200u8).is_err());
    }

    #[test]
    fn test_from_semitone_wraps() {
        assert_eq!(PitchClass::from_semitone(12), PitchClass::C);
        assert_eq!(PitchClass::from_semitone(-1).value(), 11);
        assert_eq!(PitchClass::from_semitone(19).value(), 7);
    }

    #[test]
    fn test_names() {
        assert_eq!(PitchClass::from_semitone(3).name(), "D#");
        assert_eq!(PitchClass::from_semitone(10).to_string(), "A#");
    }

    #[test]
    fn test_parse() {
        assert_eq!("C".parse::<PitchClass>().unwrap(), PitchClass::C);
        assert_eq!("Bb".parse::<PitchClass>().unwrap().value(), 10);
        assert_eq!("f#".parse::<PitchClass>().unwrap().value(), 6);
        assert!("H".parse::<PitchClass>().is_err());
    }

    #[test]
    fn test_transpose() {
        let g = PitchClass::C + 7;
        assert_eq!(g.value(), 7);
        assert_eq!((g + 7).value(), 2);
        assert_eq!((PitchClass::C - 2).value(), 10);
    }

    #[test]
    fn test_midi_frequency() {
        assert!((midi_to_frequency(69.0) - 440.0).abs() < 0.001);
        assert!((midi_to_frequency(60.0) - 261.63).abs() < 0.01);
        assert_eq!(PitchClass::C.midi_in_octave(4), 60);
    }

    #[test]
    fn test_cents_ratio() {
        assert!((cents_to_ratio(1200.0) - 2.0).abs() < 1e-6);
        assert!((cents_to_ratio(0.0) - 1.0).abs() < 1e-6);
    }
}

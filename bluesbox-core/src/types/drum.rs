//! Drum sounds and instrument roles
//!
//! Provides the `DrumSound` tags the backing groove triggers and the
//! `Role` of each instrument bus.

use std::fmt;

/// Percussion sound played by the backing groove
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DrumSound {
    /// Bass drum
    Kick,
    /// Snare on the backbeat
    Snare,
    /// Closed hi-hat, short burst
    HiHat,
    /// Open hi-hat, longer burst
    OpenHiHat,
}

impl DrumSound {
    /// Parse drum sound from string (TidalCycles-style names)
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "kick" | "k" | "bd" => Some(DrumSound::Kick),
            "snare" | "s" | "sn" | "sd" => Some(DrumSound::Snare),
            "hihat" | "hh" | "h" | "ch" => Some(DrumSound::HiHat),
            "openhat" | "oh" | "ho" => Some(DrumSound::OpenHiHat),
            _ => None,
        }
    }

    /// Get short display name for the drum
    pub fn short_name(&self) -> &'static str {
        match self {
            DrumSound::Kick => "kick",
            DrumSound::Snare => "snare",
            DrumSound::HiHat => "hh",
            DrumSound::OpenHiHat => "oh",
        }
    }

    /// Whether this is one of the two hi-hat sounds (they share a sample slot)
    pub fn is_hat(&self) -> bool {
        matches!(self, DrumSound::HiHat | DrumSound::OpenHiHat)
    }
}

impl fmt::Display for DrumSound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

/// Instrument role, one per mixer bus
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Role {
    Drums,
    Bass,
    Guitar,
    Lead,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Drums, Role::Bass, Role::Guitar, Role::Lead];

    /// Position of this role's bus in the mixer
    pub fn index(&self) -> usize {
        match self {
            Role::Drums => 0,
            Role::Bass => 1,
            Role::Guitar => 2,
            Role::Lead => 3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Role::Drums => "drums",
            Role::Bass => "bass",
            Role::Guitar => "guitar",
            Role::Lead => "lead",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Where a backing role's sound comes from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SourceMode {
    /// Step-sequenced triggers from the transport
    #[default]
    Sequence,
    /// Enabled loop slots of this role
    Loop,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drum_parsing() {
        assert_eq!(DrumSound::from_name("kick"), Some(DrumSound::Kick));
        assert_eq!(DrumSound::from_name("bd"), Some(DrumSound::Kick));
        assert_eq!(DrumSound::from_name("snare"), Some(DrumSound::Snare));
        assert_eq!(DrumSound::from_name("hh"), Some(DrumSound::HiHat));
        assert_eq!(DrumSound::from_name("KICK"), Some(DrumSound::Kick));
        assert_eq!(DrumSound::from_name("invalid"), None);
    }

    #[test]
    fn test_role_indices_distinct() {
        let mut seen = [false; 4];
        for role in Role::ALL {
            assert!(!seen[role.index()]);
            seen[role.index()] = true;
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", DrumSound::Kick), "kick");
        assert_eq!(format!("{}", Role::Guitar), "guitar");
    }
}

//! Scale tables for harmony quantization
//!
//! Each scale is a fixed set of semitone offsets from the key root.
//! Membership is checked through a 12-bit mask so lookups stay branch-free
//! on the audio thread.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from parsing theory names
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TheoryError {
    #[error("Unknown scale: {0}")]
    UnknownScale(String),
    #[error("Unknown key: {0}")]
    UnknownKey(String),
}

/// Musical scale (12 available)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scale {
    /// All 12 semitones (quantization disabled)
    Chromatic,
    #[default]
    Major,
    NaturalMinor,
    HarmonicMinor,
    MelodicMinor,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Locrian,
    MajorPentatonic,
    MinorPentatonic,
}

impl Scale {
    /// Every scale, in menu order
    pub const ALL: [Scale; 12] = [
        Scale::Chromatic,
        Scale::Major,
        Scale::NaturalMinor,
        Scale::HarmonicMinor,
        Scale::MelodicMinor,
        Scale::Dorian,
        Scale::Phrygian,
        Scale::Lydian,
        Scale::Mixolydian,
        Scale::Locrian,
        Scale::MajorPentatonic,
        Scale::MinorPentatonic,
    ];

    /// Semitone offsets from the root
    pub fn intervals(self) -> &'static [u8] {
        match self {
            Scale::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
            Scale::Major => &[0, 2, 4, 5, 7, 9, 11],
            Scale::NaturalMinor => &[0, 2, 3, 5, 7, 8, 10],
            Scale::HarmonicMinor => &[0, 2, 3, 5, 7, 8, 11],
            Scale::MelodicMinor => &[0, 2, 3, 5, 7, 9, 11],
            Scale::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            Scale::Phrygian => &[0, 1, 3, 5, 7, 8, 10],
            Scale::Lydian => &[0, 2, 4, 6, 7, 9, 11],
            Scale::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
            Scale::Locrian => &[0, 1, 3, 5, 6, 8, 10],
            Scale::MajorPentatonic => &[0, 2, 4, 7, 9],
            Scale::MinorPentatonic => &[0, 3, 5, 7, 10],
        }
    }

    /// Bit mask of the scale degrees relative to the root (bit n = n semitones)
    pub fn mask(self) -> u16 {
        self.intervals()
            .iter()
            .fold(0u16, |mask, &step| mask | (1 << step))
    }

    /// Check if an absolute pitch class belongs to this scale in the given key
    #[inline]
    pub fn contains(self, pitch_class: i32, key: u8) -> bool {
        let degree = (pitch_class - key as i32).rem_euclid(12);
        self.mask() & (1 << degree) != 0
    }

    /// Stable identifier used in config files
    pub fn id(self) -> &'static str {
        match self {
            Scale::Chromatic => "chromatic",
            Scale::Major => "major",
            Scale::NaturalMinor => "natural_minor",
            Scale::HarmonicMinor => "harmonic_minor",
            Scale::MelodicMinor => "melodic_minor",
            Scale::Dorian => "dorian",
            Scale::Phrygian => "phrygian",
            Scale::Lydian => "lydian",
            Scale::Mixolydian => "mixolydian",
            Scale::Locrian => "locrian",
            Scale::MajorPentatonic => "major_pentatonic",
            Scale::MinorPentatonic => "minor_pentatonic",
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Scale::Chromatic => "Chromatic",
            Scale::Major => "Major",
            Scale::NaturalMinor => "Natural Minor",
            Scale::HarmonicMinor => "Harmonic Minor",
            Scale::MelodicMinor => "Melodic Minor",
            Scale::Dorian => "Dorian",
            Scale::Phrygian => "Phrygian",
            Scale::Lydian => "Lydian",
            Scale::Mixolydian => "Mixolydian",
            Scale::Locrian => "Locrian",
            Scale::MajorPentatonic => "Major Pentatonic",
            Scale::MinorPentatonic => "Minor Pentatonic",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Scale {
    type Err = TheoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '-' => '_',
                c => c.to_ascii_lowercase(),
            })
            .collect();

        let scale = match normalized.as_str() {
            "minor" | "aeolian" => Scale::NaturalMinor,
            "ionian" => Scale::Major,
            other => Scale::ALL
                .into_iter()
                .find(|scale| scale.id() == other)
                .ok_or_else(|| TheoryError::UnknownScale(s.to_string()))?,
        };
        Ok(scale)
    }
}

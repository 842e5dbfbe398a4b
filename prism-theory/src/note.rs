//! Pitch classes and key roots
//!
//! A key is stored as a pitch class (0-11, where 0=C). Names use flats for
//! the black keys, matching the rest of the UI, but sharps are accepted
//! when parsing.

use crate::scale::TheoryError;
use std::fmt;
use std::str::FromStr;

/// Display names for the 12 pitch classes (index 0 = C)
pub const NOTE_NAMES: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

/// Root of a key as a pitch class (0-11)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Key(u8);

impl Key {
    /// C, the default key
    pub const C: Key = Key(0);

    /// Create a key from a pitch class, `None` if outside 0-11
    pub fn new(pitch_class: u8) -> Option<Self> {
        if pitch_class < 12 {
            Some(Self(pitch_class))
        } else {
            None
        }
    }

    /// Create a key from any integer, wrapping into 0-11
    pub fn wrapping(value: i32) -> Self {
        Self(value.rem_euclid(12) as u8)
    }

    /// Pitch class of the root (0-11)
    #[inline]
    pub fn pitch_class(self) -> u8 {
        self.0
    }

    /// Note name of the root
    pub fn name(self) -> &'static str {
        NOTE_NAMES[self.0 as usize]
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Key {
    type Err = TheoryError;

    /// Parse a note name ("C", "f#", "Bb") or a pitch class number ("0".."11")
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if let Ok(n) = s.parse::<u8>() {
            return Key::new(n).ok_or_else(|| TheoryError::UnknownKey(s.to_string()));
        }

        let mut chars = s.chars();
        let letter = chars
            .next()
            .ok_or_else(|| TheoryError::UnknownKey(s.to_string()))?;
        let natural: i32 = match letter.to_ascii_uppercase() {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(TheoryError::UnknownKey(s.to_string())),
        };

        let accidental = match chars.as_str() {
            "" => 0,
            "#" | "s" | "sharp" => 1,
            "b" | "flat" => -1,
            _ => return Err(TheoryError::UnknownKey(s.to_string())),
        };

        Ok(Key::wrapping(natural + accidental))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_range() {
        assert_eq!(Key::new(11).map(Key::pitch_class), Some(11));
        assert!(Key::new(12).is_none());
        assert_eq!(Key::wrapping(-1).pitch_class(), 11);
        assert_eq!(Key::wrapping(25).pitch_class(), 1);
    }

    #[test]
    fn test_key_parse() {
        assert_eq!("C".parse::<Key>().unwrap(), Key::C);
        assert_eq!("f#".parse::<Key>().unwrap().pitch_class(), 6);
        assert_eq!("Gb".parse::<Key>().unwrap().pitch_class(), 6);
        assert_eq!("Cb".parse::<Key>().unwrap().pitch_class(), 11);
        assert_eq!("9".parse::<Key>().unwrap().name(), "A");
        assert!("H".parse::<Key>().is_err());
        assert!("12".parse::<Key>().is_err());
        assert!("".parse::<Key>().is_err());
    }

    #[test]
    fn test_key_display() {
        assert_eq!(Key::wrapping(3).to_string(), "Eb");
        assert_eq!(Key::C.to_string(), "C");
    }
}

//! Interval quantization for harmony voices
//!
//! A harmony voice asks for an interval (in semitones) above or below a
//! base note. When scale-awareness is on, the resulting note is moved to
//! the nearest note of the scale, preferring the lower neighbour on ties.

use crate::scale::Scale;

/// Farthest distance (semitones) searched for a scale note
const MAX_SEARCH: i32 = 6;

/// Snap `desired_interval` so that `base_note + interval` lands in `scale`.
///
/// Returns the rounded interval unchanged when `scale_aware` is false or
/// the scale is chromatic. `base_note` is a MIDI note number and `key` a
/// pitch class (0-11).
pub fn quantize_interval(
    base_note: i32,
    desired_interval: f32,
    key: u8,
    scale: Scale,
    scale_aware: bool,
) -> i32 {
    let interval = desired_interval.round() as i32;

    if !scale_aware || scale == Scale::Chromatic {
        return interval;
    }

    let target = (base_note + interval).rem_euclid(12);
    if scale.contains(target, key) {
        return interval;
    }

    for distance in 1..=MAX_SEARCH {
        if scale.contains(target - distance, key) {
            return interval - distance;
        }
        if scale.contains(target + distance, key) {
            return interval + distance;
        }
    }

    interval
}

//! Music theory for PRISM
//!
//! Provides pitch-class naming, the scale tables used by the harmonizer,
//! and the interval quantizer that snaps harmony voices onto a scale.

mod note;
mod quantize;
mod scale;

pub use note::{Key, NOTE_NAMES};
pub use quantize::quantize_interval;
pub use scale::{Scale, TheoryError};

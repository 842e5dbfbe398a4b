//! Parameter sets for the spectral effects and the engine.
//!
//! Every setter path clamps through these types, so the processing code
//! never sees out-of-range values.

use crate::spectral::Quality;
use prism_theory::Scale;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of harmonizer voices (fixed at construction)
pub const MAX_VOICES: usize = 4;

/// Errors from parsing or validating parameters
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    #[error("Unknown quality mode: {0}")]
    UnknownQuality(String),
    #[error("Unknown phase mode: {0}")]
    UnknownPhaseMode(String),
    #[error("Voice index {0} out of range (0-{max})", max = MAX_VOICES - 1)]
    VoiceOutOfRange(usize),
}

/// Source of the frozen phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PhaseMode {
    /// Phase keeps advancing at each bin's center frequency (smooth drone)
    #[default]
    Drift,
    /// Captured phase is reused every frame (static, buzzy texture)
    Preserve,
}

impl PhaseMode {
    pub fn id(self) -> &'static str {
        match self {
            PhaseMode::Drift => "drift",
            PhaseMode::Preserve => "preserve",
        }
    }
}

impl fmt::Display for PhaseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl FromStr for PhaseMode {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drift" => Ok(PhaseMode::Drift),
            "preserve" => Ok(PhaseMode::Preserve),
            _ => Err(ParamError::UnknownPhaseMode(s.to_string())),
        }
    }
}

/// Spectral freeze parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FreezeParams {
    /// Freeze engaged
    pub enabled: bool,
    /// Fade-in time in ms (10-2000)
    pub fade_in_ms: f32,
    /// Fade-out time in ms (10-2000)
    pub fade_out_ms: f32,
    /// Spectral smoothing of the captured magnitude (0-1)
    pub blur: f32,
    /// Spectral tilt of the frozen sound (0-1, 0.5 = neutral)
    pub brightness: f32,
    pub phase_mode: PhaseMode,
    /// Random per-bin magnitude variation (0-1)
    pub jitter: f32,
}

impl FreezeParams {
    pub fn clamped(self) -> Self {
        Self {
            enabled: self.enabled,
            fade_in_ms: self.fade_in_ms.clamp(10.0, 2000.0),
            fade_out_ms: self.fade_out_ms.clamp(10.0, 2000.0),
            blur: self.blur.clamp(0.0, 1.0),
            brightness: self.brightness.clamp(0.0, 1.0),
            phase_mode: self.phase_mode,
            jitter: self.jitter.clamp(0.0, 1.0),
        }
    }
}

impl Default for FreezeParams {
    fn default() -> Self {
        Self {
            enabled: false,
            fade_in_ms: 100.0,
            fade_out_ms: 300.0,
            blur: 0.0,
            brightness: 0.5,
            phase_mode: PhaseMode::Drift,
            jitter: 0.0,
        }
    }
}

/// One harmonizer voice
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceParams {
    /// Interval in semitones (-24 to +24)
    pub interval: f32,
    /// Output level (0-1)
    pub level: f32,
    /// Pan (-1 = left, 1 = right)
    pub pan: f32,
    pub enabled: bool,
}

impl VoiceParams {
    pub fn clamped(self) -> Self {
        Self {
            interval: self.interval.clamp(-24.0, 24.0),
            level: self.level.clamp(0.0, 1.0),
            pan: self.pan.clamp(-1.0, 1.0),
            enabled: self.enabled,
        }
    }
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            interval: 0.0,
            level: 0.7,
            pan: 0.0,
            enabled: false,
        }
    }
}

/// Harmonizer parameters shared by all voices
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarmonizerParams {
    pub voices: [VoiceParams; MAX_VOICES],
    /// Key root as pitch class (0-11)
    pub key: u8,
    pub scale: Scale,
    /// Snap voice intervals onto the scale
    pub scale_aware: bool,
    /// Formant preservation amount (0-1)
    pub formant_preserve: f32,
    /// Level of the latency-aligned dry signal (0-1)
    pub dry_level: f32,
    /// MIDI note the intervals are measured from when quantizing
    pub base_note: i32,
}

impl HarmonizerParams {
    pub fn clamped(self) -> Self {
        Self {
            voices: self.voices.map(VoiceParams::clamped),
            key: self.key % 12,
            scale: self.scale,
            scale_aware: self.scale_aware,
            formant_preserve: self.formant_preserve.clamp(0.0, 1.0),
            dry_level: self.dry_level.clamp(0.0, 1.0),
            base_note: self.base_note.clamp(0, 127),
        }
    }
}

impl Default for HarmonizerParams {
    fn default() -> Self {
        Self {
            voices: [VoiceParams::default(); MAX_VOICES],
            key: 0,
            scale: Scale::Major,
            scale_aware: false,
            formant_preserve: 0.0,
            dry_level: 1.0,
            base_note: 60,
        }
    }
}

/// Full engine configuration. Changing `quality`, `sample_rate` or
/// `channels` requires rebuilding the spectral state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub sample_rate: u32,
    /// Interleaved channels (1 or 2)
    pub channels: usize,
    pub quality: Quality,
    /// Seed for jitter and drift randomization
    pub seed: u64,
    /// Freeze slot in the chain
    pub freeze_active: bool,
    /// Harmonizer slot in the chain
    pub harmonizer_active: bool,
    pub freeze: FreezeParams,
    pub harmonizer: HarmonizerParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
            quality: Quality::Normal,
            seed: crate::rng::DEFAULT_SEED,
            freeze_active: true,
            harmonizer_active: false,
            freeze: FreezeParams::default(),
            harmonizer: HarmonizerParams::default(),
        }
    }
}

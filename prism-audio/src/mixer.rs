//! Voice mixer - constant-power panning and level smoothing

use crate::params::MAX_VOICES;
use std::f32::consts::FRAC_PI_4;

/// Constant-power pan law: returns (left, right) gains for pan in [-1, 1]
#[inline]
pub fn constant_power_gains(pan: f32) -> (f32, f32) {
    let angle = (pan.clamp(-1.0, 1.0) + 1.0) * FRAC_PI_4;
    (angle.cos(), angle.sin())
}

/// Per-voice stereo gains (level × pan law), smoothed to avoid zipper noise
pub struct VoiceMixer {
    /// Target (left, right) gains
    targets: [(f32, f32); MAX_VOICES],
    /// Smoothed gains (interpolate toward targets)
    current: [(f32, f32); MAX_VOICES],
}

impl VoiceMixer {
    /// Smoothing coefficient for gain changes (~5ms at 48kHz)
    const GAIN_SMOOTH_COEFF: f32 = 0.995;

    pub fn new() -> Self {
        Self {
            targets: [(0.0, 0.0); MAX_VOICES],
            current: [(0.0, 0.0); MAX_VOICES],
        }
    }

    /// Set a voice's level and pan target
    pub fn set_voice(&mut self, index: usize, level: f32, pan: f32) {
        let (left, right) = constant_power_gains(pan);
        let level = level.clamp(0.0, 1.0);
        self.targets[index] = (left * level, right * level);
    }

    /// Jump straight to the targets (used after construction/reset)
    pub fn snap(&mut self) {
        self.current = self.targets;
    }

    /// Advance smoothing by one sample frame
    #[inline]
    pub fn advance(&mut self) {
        let c = Self::GAIN_SMOOTH_COEFF;
        for (cur, target) in self.current.iter_mut().zip(&self.targets) {
            cur.0 = c * cur.0 + (1.0 - c) * target.0;
            cur.1 = c * cur.1 + (1.0 - c) * target.1;
        }
    }

    /// Current (left, right) gains for a voice
    #[inline]
    pub fn gains(&self, index: usize) -> (f32, f32) {
        self.current[index]
    }

    /// Current mono gain (level only, pan ignored)
    #[inline]
    pub fn mono_gain(&self, index: usize) -> f32 {
        // Equal-power pair: |(l, r)| is the level
        let (l, r) = self.current[index];
        (l * l + r * r).sqrt()
    }
}

impl Default for VoiceMixer {
    fn default() -> Self {
        Self::new()
    }
}

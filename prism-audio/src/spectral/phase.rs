//! Phase vocoder analysis: per-bin magnitude and true frequency.
//!
//! The phase advance of bin `k` between two frames, minus the advance a
//! stationary sinusoid centred on that bin would show, gives the bin's
//! frequency deviation. Frequencies are expressed in bins.

use super::fft::Complex;
use super::stft::OVERLAP;
use std::f32::consts::PI;

const TWO_PI: f32 = 2.0 * PI;

/// Wrap phase to [-π, π]
#[inline(always)]
pub fn wrap_phase(phase: f32) -> f32 {
    if (-PI..=PI).contains(&phase) {
        return phase;
    }
    phase - TWO_PI * ((phase + PI) / TWO_PI).floor()
}

/// Phase advance over one hop for a frequency given in bins
#[inline(always)]
pub fn hop_phase_advance(freq_bins: f32) -> f32 {
    freq_bins * TWO_PI / OVERLAP as f32
}

/// Blend two phases with weight (0 = first, 1 = second)
#[inline(always)]
pub fn blend_phase(phase1: f32, phase2: f32, weight: f32) -> f32 {
    // Convert to unit circle and blend
    let (s1, c1) = phase1.sin_cos();
    let (s2, c2) = phase2.sin_cos();

    let s = s1 * (1.0 - weight) + s2 * weight;
    let c = c1 * (1.0 - weight) + c2 * weight;

    s.atan2(c)
}

/// Frame-to-frame phase analyzer for one stream
pub struct PhaseAnalyzer {
    /// Raw phase of the previous frame
    last_phase: Vec<f32>,
    /// Magnitude of the current frame
    magnitude: Vec<f32>,
    /// Raw phase of the current frame
    phase: Vec<f32>,
    /// Estimated frequency of each bin, in bins
    true_freq: Vec<f32>,
}

impl PhaseAnalyzer {
    pub fn new(num_bins: usize) -> Self {
        Self {
            last_phase: vec![0.0; num_bins],
            magnitude: vec![0.0; num_bins],
            phase: vec![0.0; num_bins],
            true_freq: vec![0.0; num_bins],
        }
    }

    /// Analyze the positive-frequency bins of the current frame
    pub fn analyze(&mut self, bins: &[Complex]) {
        debug_assert!(bins.len() >= self.magnitude.len());

        for (k, bin) in bins.iter().enumerate().take(self.magnitude.len()) {
            let phase = bin.phase();
            let expected = hop_phase_advance(k as f32);
            let residual = wrap_phase(phase - self.last_phase[k] - expected);
            let deviation = residual * OVERLAP as f32 / TWO_PI;

            self.magnitude[k] = bin.magnitude();
            self.phase[k] = phase;
            self.true_freq[k] = k as f32 + deviation;
            self.last_phase[k] = phase;
        }
    }

    #[inline]
    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitude
    }

    #[inline]
    pub fn phases(&self) -> &[f32] {
        &self.phase
    }

    #[inline]
    pub fn true_frequencies(&self) -> &[f32] {
        &self.true_freq
    }

    pub fn reset(&mut self) {
        self.last_phase.fill(0.0);
        self.magnitude.fill(0.0);
        self.phase.fill(0.0);
        self.true_freq.fill(0.0);
    }
}

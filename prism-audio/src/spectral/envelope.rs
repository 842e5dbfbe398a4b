//! Cepstral spectral envelope for formant preservation.
//!
//! The log-magnitude spectrum is transformed, quefrencies above the lifter
//! cutoff are discarded, and the result is transformed back and
//! exponentiated. What remains is the smooth resonance shape of the
//! spectrum without its harmonic fine structure.

use super::fft::{fft, Complex};

/// Floor applied before taking the log so silent bins stay finite
const MIN_MAGNITUDE: f32 = 1e-9;

/// Lifter cutoff in quefrency bins: `min(sample_rate/1000 + 4, fft_size/8)`
pub fn lifter_cutoff(fft_size: usize, sample_rate: u32) -> usize {
    (sample_rate as usize / 1000 + 4).min(fft_size / 8)
}

/// Cepstrally smoothed envelope extractor (pre-allocated)
pub struct SpectralEnvelope {
    size: usize,
    lifter: usize,
    /// Work buffer for the cepstrum
    cepstrum: Vec<Complex>,
    /// Envelope per positive bin
    envelope: Vec<f32>,
}

impl SpectralEnvelope {
    pub fn new(fft_size: usize, sample_rate: u32) -> Self {
        Self {
            size: fft_size,
            lifter: lifter_cutoff(fft_size, sample_rate),
            cepstrum: vec![Complex::ZERO; fft_size],
            envelope: vec![1.0; fft_size / 2 + 1],
        }
    }

    #[inline]
    pub fn lifter(&self) -> usize {
        self.lifter
    }

    /// Compute the envelope of `magnitude` (positive bins)
    pub fn extract(&mut self, magnitude: &[f32]) {
        let half = self.size / 2;
        debug_assert!(magnitude.len() > half);

        // Real, even log spectrum
        for k in 0..=half {
            self.cepstrum[k] = Complex::new(magnitude[k].max(MIN_MAGNITUDE).ln(), 0.0);
        }
        for k in 1..half {
            self.cepstrum[self.size - k] = self.cepstrum[k];
        }

        fft(&mut self.cepstrum, false);

        // Low-quefrency lifter (keeps both mirrored ends)
        for c in &mut self.cepstrum[self.lifter + 1..self.size - self.lifter] {
            *c = Complex::ZERO;
        }

        fft(&mut self.cepstrum, true);

        for (env, c) in self.envelope.iter_mut().zip(&self.cepstrum) {
            *env = c.re.exp();
        }
    }

    /// Envelope values per positive bin
    #[inline]
    pub fn values(&self) -> &[f32] {
        &self.envelope
    }

    /// Envelope at a fractional bin position (linear interpolation, clamped)
    pub fn interpolate(&self, position: f32) -> f32 {
        let last = self.envelope.len() - 1;
        if position <= 0.0 {
            return self.envelope[0];
        }
        let index = position.floor() as usize;
        if index >= last {
            return self.envelope[last];
        }
        let frac = position - index as f32;
        self.envelope[index] * (1.0 - frac) + self.envelope[index + 1] * frac
    }

    pub fn reset(&mut self) {
        self.cepstrum.fill(Complex::ZERO);
        self.envelope.fill(1.0);
    }
}

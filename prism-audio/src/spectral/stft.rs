//! Short-Time Fourier Transform frame engine for one channel or voice.
//!
//! Features:
//! - Circular input accumulator (2x FFT size)
//! - Hop scheduling at 75% overlap
//! - Circular overlap-add output (4x FFT size), zeroed as it is consumed
//! - Zero-allocation processing after construction
//!
//! With an identity spectral transform the output is the input delayed by
//! exactly one FFT frame ([`StftEngine::latency_samples`]).

use super::fft::{fft, Complex};
use crate::params::ParamError;
use std::f32::consts::PI;
use std::fmt;
use std::str::FromStr;

/// Frames overlap by 75%: hop = FFT size / 4
pub const OVERLAP: usize = 4;

/// Quality modes, each mapped to a fixed power-of-two FFT size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Quality {
    /// 1024 samples - lowest latency, coarse frequency resolution
    Fast = 1024,
    /// 2048 samples - balanced (recommended)
    #[default]
    Normal = 2048,
    /// 4096 samples - smoother pads, more latency
    HighQuality = 4096,
    /// 8192 samples - maximum resolution
    Ultra = 8192,
}

impl Quality {
    pub const ALL: [Quality; 4] = [
        Quality::Fast,
        Quality::Normal,
        Quality::HighQuality,
        Quality::Ultra,
    ];

    #[inline]
    pub fn fft_size(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn hop_size(self) -> usize {
        self.fft_size() / OVERLAP
    }

    /// Number of positive frequency bins (size/2 + 1)
    #[inline]
    pub fn num_bins(self) -> usize {
        self.fft_size() / 2 + 1
    }

    /// Identifier used in config files
    pub fn id(self) -> &'static str {
        match self {
            Quality::Fast => "fast",
            Quality::Normal => "normal",
            Quality::HighQuality => "high",
            Quality::Ultra => "ultra",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id(), self.fft_size())
    }
}

impl FromStr for Quality {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" | "1024" => Ok(Quality::Fast),
            "normal" | "2048" => Ok(Quality::Normal),
            "high" | "highquality" | "high_quality" | "4096" => Ok(Quality::HighQuality),
            "ultra" | "8192" => Ok(Quality::Ultra),
            _ => Err(ParamError::UnknownQuality(s.to_string())),
        }
    }
}

/// Periodic Hann window: `0.5 * (1 - cos(2πi / size))`.
///
/// Zero at index 0 only; the last sample is not zero. Symmetric about
/// `size / 2`, and its square sums to a constant at 75% overlap.
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / size as f32).cos()))
        .collect()
}

/// STFT analysis/resynthesis engine for a single stream
pub struct StftEngine {
    /// FFT size
    size: usize,
    /// Hop size
    hop_size: usize,
    /// Pre-computed Hann window (analysis and synthesis)
    window: Vec<f32>,
    /// Overlap-add gain compensating the doubled window
    synthesis_gain: f32,
    /// Input circular buffer
    input: Vec<f32>,
    /// Next write position in the input buffer
    input_pos: usize,
    /// Samples left until the next frame
    hop_countdown: usize,
    /// Output overlap-add buffer
    output: Vec<f32>,
    /// Next read position in the output buffer
    output_pos: usize,
    /// Working frame for FFT (avoid allocation)
    frame: Vec<Complex>,
}

impl StftEngine {
    /// Create a new STFT engine
    pub fn new(quality: Quality) -> Self {
        let size = quality.fft_size();
        let hop_size = quality.hop_size();
        let window = hann_window(size);

        // Sum of w^2 over one frame, spread over the hops that overlap it
        let energy: f32 = window.iter().map(|w| w * w).sum();
        let synthesis_gain = if energy > 0.0 {
            hop_size as f32 / energy
        } else {
            1.0
        };

        Self {
            size,
            hop_size,
            window,
            synthesis_gain,
            input: vec![0.0; size * 2],
            input_pos: 0,
            hop_countdown: hop_size,
            output: vec![0.0; size * 4],
            output_pos: 0,
            frame: vec![Complex::ZERO; size],
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    #[inline]
    pub fn num_bins(&self) -> usize {
        self.size / 2 + 1
    }

    /// Delay between a sample entering and its reconstruction leaving
    #[inline]
    pub fn latency_samples(&self) -> usize {
        self.size
    }

    /// Push one input sample
    #[inline]
    pub fn push_sample(&mut self, x: f32) {
        self.input[self.input_pos] = x;
        self.input_pos = (self.input_pos + 1) % self.input.len();
        self.hop_countdown = self.hop_countdown.saturating_sub(1);
    }

    /// True once per hop; re-arms the countdown when it fires
    #[inline]
    pub fn frame_ready(&mut self) -> bool {
        if self.hop_countdown == 0 {
            self.hop_countdown = self.hop_size;
            true
        } else {
            false
        }
    }

    /// Copy the latest `size` samples into the work frame, windowed
    pub fn extract_window(&mut self) {
        let len = self.input.len();
        let start = (self.input_pos + len - self.size) % len;

        for (i, (slot, &w)) in self.frame.iter_mut().zip(&self.window).enumerate() {
            *slot = Complex::new(self.input[(start + i) % len] * w, 0.0);
        }
    }

    /// Window the latest input and transform it in place.
    /// The positive-frequency bins are then available from [`bins`](Self::bins).
    pub fn analyze(&mut self) {
        self.extract_window();
        fft(&mut self.frame, false);
    }

    /// Positive-frequency bins of the last analyzed frame
    #[inline]
    pub fn bins(&self) -> &[Complex] {
        &self.frame[..self.num_bins()]
    }

    /// Rebuild a full spectrum from positive bins (Hermitian symmetry),
    /// inverse-transform it and overlap-add the result.
    pub fn synthesize(&mut self, bins: &[Complex]) {
        debug_assert!(bins.len() >= self.num_bins());
        let half = self.size / 2;

        // DC and Nyquist must be real
        self.frame[0] = Complex::new(bins[0].re, 0.0);
        self.frame[half] = Complex::new(bins[half].re, 0.0);
        for k in 1..half {
            self.frame[k] = bins[k];
            self.frame[self.size - k] = bins[k].conj();
        }

        fft(&mut self.frame, true);

        debug_assert!(
            self.frame.iter().all(|c| c.is_finite()),
            "non-finite sample in spectral reconstruction"
        );

        self.overlap_add();
    }

    /// Window the (inverse-transformed) work frame and add it to the output
    /// buffer, starting one sample after the read cursor.
    pub fn overlap_add(&mut self) {
        let len = self.output.len();
        let start = self.output_pos + 1;

        for (i, (sample, &w)) in self.frame.iter().zip(&self.window).enumerate() {
            self.output[(start + i) % len] += sample.re * w * self.synthesis_gain;
        }
    }

    /// Pop one output sample, clearing its slot for future overlap-adds
    #[inline]
    pub fn pull_sample(&mut self) -> f32 {
        let value = self.output[self.output_pos];
        self.output[self.output_pos] = 0.0;
        self.output_pos = (self.output_pos + 1) % self.output.len();
        value
    }

    /// Reset all buffers
    pub fn reset(&mut self) {
        self.input.fill(0.0);
        self.output.fill(0.0);
        self.frame.fill(Complex::ZERO);
        self.input_pos = 0;
        self.output_pos = 0;
        self.hop_countdown = self.hop_size;
    }
}

//! STFT spectral-processing framework shared by the spectral effects.
//!
//! # Pipeline
//!
//! ```text
//! push_sample ─► input ring ─(every hop)─► window ─► FFT ─► transform
//!                                                              │
//! pull_sample ◄─ output ring ◄─ overlap-add ◄─ window ◄─ IFFT ◄┘
//! ```
//!
//! - [`fft`]: in-place radix-2 transform for the fixed frame sizes
//! - [`StftEngine`]: per-stream buffering, hop scheduling, overlap-add
//! - [`PhaseAnalyzer`]: phase-vocoder magnitude / true-frequency estimates
//! - [`SpectralEnvelope`]: cepstral envelope for formant correction
//!
//! # Usage
//!
//! ```rust
//! use prism_audio::spectral::{Complex, Quality, StftEngine};
//!
//! let mut stft = StftEngine::new(Quality::Fast);
//! let mut bins = vec![Complex::ZERO; stft.num_bins()];
//!
//! for x in [0.0f32; 2048] {
//!     stft.push_sample(x);
//!     if stft.frame_ready() {
//!         stft.analyze();
//!         bins.copy_from_slice(stft.bins());
//!         // ... transform bins ...
//!         stft.synthesize(&bins);
//!     }
//!     let _y = stft.pull_sample();
//! }
//! ```

mod envelope;
mod fft;
mod phase;
mod stft;

pub use envelope::{lifter_cutoff, SpectralEnvelope};
pub use fft::{fft, Complex};
pub use phase::{blend_phase, hop_phase_advance, wrap_phase, PhaseAnalyzer};
pub use stft::{hann_window, Quality, StftEngine, OVERLAP};

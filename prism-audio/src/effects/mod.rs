//! Spectral effects for PRISM

mod freeze;
mod harmonizer;

pub use freeze::{FreezeState, SpectralFreeze};
pub use harmonizer::{Harmonizer, HarmonizerVoice};

/// Trait for STFT-based effects
pub trait SpectralEffect: Send {
    /// Process audio samples in place (interleaved)
    fn process(&mut self, samples: &mut [f32]);

    /// Reset effect state
    fn reset(&mut self);

    /// Delay introduced by the effect, in sample frames
    fn latency_samples(&self) -> usize;

    /// Get effect name
    fn name(&self) -> &'static str;
}

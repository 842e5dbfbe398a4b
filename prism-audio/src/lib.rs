//! Spectral engine for PRISM - freeze and harmonizer on a shared STFT core
//!
//! This module provides the spectral processing pipeline:
//! - Spectral: FFT, STFT framing, phase-vocoder analysis, cepstral envelope
//! - Effects: spectral freeze and 4-voice harmonizer
//! - Mixer: constant-power voice panning
//! - Engine: command/event surface driving the effect chain

pub mod spectral;
mod effects;
mod engine;
mod mixer;
mod params;
mod rng;

pub use effects::{FreezeState, Harmonizer, HarmonizerVoice, SpectralEffect, SpectralFreeze};
pub use engine::{EngineError, EngineState, SpectralCommand, SpectralEngine, SpectralEvent, MAX_CHANNELS};
pub use mixer::{constant_power_gains, VoiceMixer};
pub use params::{EngineConfig, FreezeParams, HarmonizerParams, ParamError, PhaseMode, VoiceParams, MAX_VOICES};
pub use rng::{Xorshift64, DEFAULT_SEED};
pub use spectral::Quality;

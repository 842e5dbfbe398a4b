//! Spectral engine - orchestrates freeze and harmonizer, applies commands

use crate::effects::{FreezeState, Harmonizer, SpectralEffect, SpectralFreeze};
use crate::params::{
    EngineConfig, FreezeParams, HarmonizerParams, ParamError, PhaseMode, VoiceParams, MAX_VOICES,
};
use crate::spectral::Quality;
use crossbeam_channel::{bounded, Receiver, Sender};
use prism_theory::Scale;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Largest supported interleaved channel count
pub const MAX_CHANNELS: usize = 2;

/// Errors from building engine state
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("Unsupported channel count: {0} (expected 1-{max})", max = MAX_CHANNELS)]
    UnsupportedChannels(usize),
}

/// Commands sent to the spectral engine
#[derive(Debug, Clone, PartialEq)]
pub enum SpectralCommand {
    /// Rebuild all spectral state at a new FFT size
    SetQuality(Quality),

    // Freeze slot
    SetFreezeActive(bool),
    SetFreezeEnabled(bool),
    ToggleFreeze,
    SetFadeIn(f32),      // ms, 10-2000
    SetFadeOut(f32),     // ms, 10-2000
    SetBlur(f32),        // 0.0-1.0
    SetBrightness(f32),  // 0.0-1.0
    SetPhaseMode(PhaseMode),
    SetJitter(f32),      // 0.0-1.0
    ClearCapture,

    // Harmonizer slot (voice index 0-3)
    SetHarmonizerActive(bool),
    SetVoiceInterval(usize, f32),  // semitones, -24 to 24
    SetVoiceLevel(usize, f32),
    SetVoicePan(usize, f32),
    SetVoiceEnabled(usize, bool),
    SetKey(u8),
    SetScale(Scale),
    SetScaleAware(bool),
    SetFormantPreserve(f32),
    SetDryLevel(f32),
    SetBaseNote(i32),

    // System
    Reset,
    Shutdown,
}

/// Events sent from the spectral engine
#[derive(Debug, Clone, PartialEq)]
pub enum SpectralEvent {
    /// Snapshot for display
    StateUpdate {
        quality: Quality,
        latency_samples: usize,
        channels: usize,
        // Freeze state (per channel)
        freeze_active: bool,
        freeze_enabled: bool,
        freeze_blend: [f32; MAX_CHANNELS],
        freeze_state: [FreezeState; MAX_CHANNELS],
        capture_count: [u32; MAX_CHANNELS],
        // Harmonizer state (per voice)
        harmonizer_active: bool,
        voice_enabled: [bool; MAX_VOICES],
        voice_ratio: [f32; MAX_VOICES],
        key: u8,
        scale: Scale,
    },
    /// Error occurred
    Error(String),
}

/// Spectral engine state (held in the processing thread)
pub struct EngineState {
    freeze: SpectralFreeze,
    harmonizer: Harmonizer,
    /// Source of truth for all parameters (clamped)
    config: EngineConfig,
}

impl EngineState {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        if config.sample_rate == 0 {
            return Err(EngineError::InvalidSampleRate(config.sample_rate));
        }
        if config.channels == 0 || config.channels > MAX_CHANNELS {
            return Err(EngineError::UnsupportedChannels(config.channels));
        }

        let state = Self::build(config);
        tracing::info!(
            sample_rate = config.sample_rate,
            channels = config.channels,
            quality = %config.quality,
            latency = state.latency_samples(),
            "spectral engine created"
        );
        Ok(state)
    }

    /// Build effects from an already validated config
    fn build(config: EngineConfig) -> Self {
        let freeze = SpectralFreeze::new(
            config.sample_rate,
            config.channels,
            config.quality,
            config.freeze,
            config.seed,
        );
        let harmonizer = Harmonizer::new(
            config.sample_rate,
            config.channels,
            config.quality,
            config.harmonizer,
        );

        let mut config = config;
        config.freeze = *freeze.params();
        config.harmonizer = *harmonizer.params();

        Self {
            freeze,
            harmonizer,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn freeze(&self) -> &SpectralFreeze {
        &self.freeze
    }

    pub fn harmonizer(&self) -> &Harmonizer {
        &self.harmonizer
    }

    /// Switch FFT size. The replacement state is built completely before it
    /// replaces the current one; captures and voice state start fresh.
    pub fn reconfigure(&mut self, quality: Quality) {
        if quality == self.config.quality {
            return;
        }

        let mut config = self.config;
        config.quality = quality;
        *self = Self::build(config);

        tracing::info!(
            quality = %quality,
            latency = self.latency_samples(),
            "spectral engine reconfigured"
        );
    }

    /// Process interleaved samples in place (freeze → harmonizer)
    pub fn process(&mut self, samples: &mut [f32]) {
        if self.config.freeze_active {
            self.freeze.process(samples);
        }
        if self.config.harmonizer_active {
            self.harmonizer.process(samples);
        }
    }

    /// Total delay of the active chain, in sample frames
    pub fn latency_samples(&self) -> usize {
        let mut latency = 0;
        if self.config.freeze_active {
            latency += self.freeze.latency_samples();
        }
        if self.config.harmonizer_active {
            latency += self.harmonizer.latency_samples();
        }
        latency
    }

    /// Apply every queued command. Returns false once shutdown was requested.
    pub fn drain_commands(&mut self, rx: &Receiver<SpectralCommand>) -> bool {
        while let Ok(cmd) = rx.try_recv() {
            if cmd == SpectralCommand::Shutdown {
                return false;
            }
            self.handle_command(cmd);
        }
        true
    }

    /// Process a command
    pub fn handle_command(&mut self, cmd: SpectralCommand) {
        match cmd {
            SpectralCommand::SetQuality(quality) => self.reconfigure(quality),

            // Freeze commands
            SpectralCommand::SetFreezeActive(active) => {
                if active && !self.config.freeze_active {
                    self.freeze.reset();
                }
                self.config.freeze_active = active;
            }
            SpectralCommand::SetFreezeEnabled(enabled) => {
                self.update_freeze(|p| p.enabled = enabled)
            }
            SpectralCommand::ToggleFreeze => self.update_freeze(|p| p.enabled = !p.enabled),
            SpectralCommand::SetFadeIn(ms) => self.update_freeze(|p| p.fade_in_ms = ms),
            SpectralCommand::SetFadeOut(ms) => self.update_freeze(|p| p.fade_out_ms = ms),
            SpectralCommand::SetBlur(blur) => self.update_freeze(|p| p.blur = blur),
            SpectralCommand::SetBrightness(b) => self.update_freeze(|p| p.brightness = b),
            SpectralCommand::SetPhaseMode(mode) => self.update_freeze(|p| p.phase_mode = mode),
            SpectralCommand::SetJitter(jitter) => self.update_freeze(|p| p.jitter = jitter),
            SpectralCommand::ClearCapture => self.freeze.clear_capture(),

            // Harmonizer commands
            SpectralCommand::SetHarmonizerActive(active) => {
                if active && !self.config.harmonizer_active {
                    self.harmonizer.reset();
                }
                self.config.harmonizer_active = active;
            }
            SpectralCommand::SetVoiceInterval(index, semitones) => {
                self.update_voice(index, |v| v.interval = semitones)
            }
            SpectralCommand::SetVoiceLevel(index, level) => {
                self.update_voice(index, |v| v.level = level)
            }
            SpectralCommand::SetVoicePan(index, pan) => self.update_voice(index, |v| v.pan = pan),
            SpectralCommand::SetVoiceEnabled(index, enabled) => {
                self.update_voice(index, |v| v.enabled = enabled)
            }
            SpectralCommand::SetKey(key) => self.update_harmonizer(|p| p.key = key),
            SpectralCommand::SetScale(scale) => self.update_harmonizer(|p| p.scale = scale),
            SpectralCommand::SetScaleAware(aware) => {
                self.update_harmonizer(|p| p.scale_aware = aware)
            }
            SpectralCommand::SetFormantPreserve(amount) => {
                self.update_harmonizer(|p| p.formant_preserve = amount)
            }
            SpectralCommand::SetDryLevel(level) => self.update_harmonizer(|p| p.dry_level = level),
            SpectralCommand::SetBaseNote(note) => self.update_harmonizer(|p| p.base_note = note),

            // System
            SpectralCommand::Reset => {
                self.freeze.reset();
                self.harmonizer.reset();
            }
            SpectralCommand::Shutdown => {}
        }
    }

    fn update_freeze(&mut self, f: impl FnOnce(&mut FreezeParams)) {
        let mut params = self.config.freeze;
        f(&mut params);
        self.freeze.set_params(params);
        self.config.freeze = *self.freeze.params();
    }

    fn update_harmonizer(&mut self, f: impl FnOnce(&mut HarmonizerParams)) {
        let mut params = self.config.harmonizer;
        f(&mut params);
        self.harmonizer.set_params(params);
        self.config.harmonizer = *self.harmonizer.params();
    }

    fn update_voice(&mut self, index: usize, f: impl FnOnce(&mut VoiceParams)) {
        if index >= MAX_VOICES {
            tracing::warn!(error = %ParamError::VoiceOutOfRange(index), "voice command ignored");
            return;
        }
        self.update_harmonizer(|p| f(&mut p.voices[index]));
    }

    /// Get current state for display
    pub fn get_state(&self) -> SpectralEvent {
        let mut freeze_blend = [0.0; MAX_CHANNELS];
        let mut freeze_state = [FreezeState::Live; MAX_CHANNELS];
        let mut capture_count = [0; MAX_CHANNELS];
        for ch in 0..self.config.channels.min(MAX_CHANNELS) {
            freeze_blend[ch] = self.freeze.blend(ch);
            freeze_state[ch] = self.freeze.state(ch);
            capture_count[ch] = self.freeze.capture_count(ch);
        }

        let mut voice_enabled = [false; MAX_VOICES];
        let mut voice_ratio = [1.0; MAX_VOICES];
        for (i, voice) in self.harmonizer.voices().iter().enumerate() {
            voice_enabled[i] = voice.is_enabled();
            voice_ratio[i] = voice.pitch_ratio();
        }

        SpectralEvent::StateUpdate {
            quality: self.config.quality,
            latency_samples: self.latency_samples(),
            channels: self.config.channels,
            freeze_active: self.config.freeze_active,
            freeze_enabled: self.freeze.is_enabled(),
            freeze_blend,
            freeze_state,
            capture_count,
            harmonizer_active: self.config.harmonizer_active,
            voice_enabled,
            voice_ratio,
            key: self.config.harmonizer.key,
            scale: self.config.harmonizer.scale,
        }
    }
}

/// Spectral engine handle (held in the control thread)
pub struct SpectralEngine {
    /// Send commands to the processing thread
    pub command_tx: Sender<SpectralCommand>,
    /// Receive events from the processing thread
    pub event_rx: Receiver<SpectralEvent>,
    /// Shutdown flag
    shutdown: Arc<AtomicBool>,
}

impl SpectralEngine {
    /// Create channels for engine communication
    /// Buffer size of 1024 provides headroom for command bursts without saturation
    pub fn create_channels() -> (
        Sender<SpectralCommand>,
        Receiver<SpectralCommand>,
        Sender<SpectralEvent>,
        Receiver<SpectralEvent>,
    ) {
        let (cmd_tx, cmd_rx) = bounded(1024);
        let (evt_tx, evt_rx) = bounded(1024);
        (cmd_tx, cmd_rx, evt_tx, evt_rx)
    }

    /// Create a new engine handle
    pub fn new(command_tx: Sender<SpectralCommand>, event_rx: Receiver<SpectralEvent>) -> Self {
        Self {
            command_tx,
            event_rx,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Send a command to the engine (dropped if the queue is full)
    pub fn send(&self, cmd: SpectralCommand) {
        let _ = self.command_tx.try_send(cmd);
    }

    /// Check if shutdown was requested
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Request shutdown
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        let _ = self.command_tx.try_send(SpectralCommand::Shutdown);
    }
}

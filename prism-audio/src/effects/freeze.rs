//! Spectral freeze - capture a spectrum and sustain it indefinitely.
//!
//! Features:
//! - Per-channel capture of magnitude and phase on engagement
//! - Linear crossfade between live and frozen spectra (fade-in/out in ms)
//! - Gaussian blur, brightness tilt and jitter on the frozen magnitudes
//! - Drift (advancing) or preserved (static) frozen phase
//!
//! Each channel moves through `Live → Capturing → Frozen`. A capture
//! persists after the freeze is released and is reused on the next
//! engagement until [`SpectralFreeze::clear_capture`] is called.

use super::SpectralEffect;
use crate::params::{FreezeParams, PhaseMode};
use crate::rng::Xorshift64;
use crate::spectral::{blend_phase, hop_phase_advance, wrap_phase, Complex, Quality, StftEngine};

/// Largest blur half-width in bins (blur = 1.0)
const MAX_BLUR_RADIUS: usize = 21;
const KERNEL_LEN: usize = 2 * MAX_BLUR_RADIUS + 1;

/// Per-bin randomization of the drift increment (±0.5%)
const DRIFT_SPREAD: f32 = 0.005;

/// Lowest brightness gain applied to any bin
const MIN_TILT_GAIN: f32 = 0.1;

/// Freeze state of one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FreezeState {
    /// Live spectrum passes through
    #[default]
    Live,
    /// A new capture was taken in the last frame
    Capturing,
    /// Captured spectrum is (partly) audible
    Frozen,
}

/// Freeze processing for a single channel
struct FreezeChannel {
    stft: StftEngine,
    live_mag: Vec<f32>,
    live_phase: Vec<f32>,
    captured_mag: Vec<f32>,
    captured_phase: Vec<f32>,
    has_capture: bool,
    /// Number of captures taken since construction
    captures: u32,
    drift_phase: Vec<f32>,
    drift_increment: Vec<f32>,
    out_bins: Vec<Complex>,
    /// Live (0) to frozen (1) crossfade position
    blend: f32,
    state: FreezeState,
}

impl FreezeChannel {
    fn new(quality: Quality, rng: &mut Xorshift64) -> Self {
        let num_bins = quality.num_bins();

        // Bin center frequency × hop, spread slightly per bin
        let drift_increment = (0..num_bins)
            .map(|k| hop_phase_advance(k as f32) * (1.0 + DRIFT_SPREAD * rng.next_bipolar()))
            .collect();

        Self {
            stft: StftEngine::new(quality),
            live_mag: vec![0.0; num_bins],
            live_phase: vec![0.0; num_bins],
            captured_mag: vec![0.0; num_bins],
            captured_phase: vec![0.0; num_bins],
            has_capture: false,
            captures: 0,
            drift_phase: vec![0.0; num_bins],
            drift_increment,
            out_bins: vec![Complex::ZERO; num_bins],
            blend: 0.0,
            state: FreezeState::Live,
        }
    }

    fn capture(&mut self) {
        self.captured_mag.copy_from_slice(&self.live_mag);
        self.captured_phase.copy_from_slice(&self.live_phase);
        self.drift_phase.copy_from_slice(&self.live_phase);
        self.has_capture = true;
        self.captures += 1;
    }

    /// One analysis → transform → synthesis cycle
    fn process_frame(&mut self, ctx: &FrameContext, rng: &mut Xorshift64) {
        self.stft.analyze();

        for (k, bin) in self.stft.bins().iter().enumerate() {
            self.live_mag[k] = bin.magnitude();
            self.live_phase[k] = bin.phase();
        }

        let captured_now = ctx.params.enabled && !self.has_capture;
        if captured_now {
            self.capture();
            tracing::debug!(captures = self.captures, "freeze captured spectrum");
        }

        // Blend moves linearly toward its target
        let target = if ctx.params.enabled && self.has_capture {
            1.0
        } else {
            0.0
        };
        if self.blend < target {
            self.blend = (self.blend + ctx.rate_in).min(target);
        } else if self.blend > target {
            self.blend = (self.blend - ctx.rate_out).max(target);
        }

        if self.has_capture || self.blend > 0.0 {
            for (phase, inc) in self.drift_phase.iter_mut().zip(&self.drift_increment) {
                *phase = wrap_phase(*phase + inc);
            }
        }

        self.state = if captured_now {
            FreezeState::Capturing
        } else if self.blend > 0.0 || (self.has_capture && ctx.params.enabled) {
            // A cleared capture stays audible until the fade-out ends
            FreezeState::Frozen
        } else {
            FreezeState::Live
        };

        if self.blend <= 0.0 {
            // Untouched live spectrum
            let num_bins = self.out_bins.len();
            self.out_bins.copy_from_slice(&self.stft.bins()[..num_bins]);
        } else {
            self.render_frozen(ctx, rng);
        }

        self.stft.synthesize(&self.out_bins);
    }

    /// Blend live and frozen spectra into `out_bins`
    fn render_frozen(&mut self, ctx: &FrameContext, rng: &mut Xorshift64) {
        let num_bins = self.out_bins.len();
        let half = (num_bins - 1) as f32;
        let blend = self.blend;
        let radius = ctx.radius as isize;
        let jitter = ctx.params.jitter;

        for k in 0..num_bins {
            // Gaussian-smoothed captured magnitude
            let mut sum = 0.0;
            let mut weight_sum = 0.0;
            for offset in -radius..=radius {
                let j = k as isize + offset;
                if j < 0 || j >= num_bins as isize {
                    continue;
                }
                let w = ctx.kernel[(offset + MAX_BLUR_RADIUS as isize) as usize];
                sum += self.captured_mag[j as usize] * w;
                weight_sum += w;
            }
            let smoothed = if weight_sum > 0.0 {
                sum / weight_sum
            } else {
                self.captured_mag[k]
            };

            let tilt = (1.0 + (ctx.params.brightness - 0.5) * 2.0 * (k as f32 / half))
                .max(MIN_TILT_GAIN);
            let scatter = if jitter > 0.0 {
                (1.0 + jitter * rng.next_bipolar()).max(0.0)
            } else {
                1.0
            };
            let frozen_mag = smoothed * tilt * scatter;

            let frozen_phase = match ctx.params.phase_mode {
                PhaseMode::Preserve => self.captured_phase[k],
                PhaseMode::Drift => self.drift_phase[k],
            };

            let mag = self.live_mag[k] * (1.0 - blend) + frozen_mag * blend;
            let phase = blend_phase(self.live_phase[k], frozen_phase, blend);
            self.out_bins[k] = Complex::from_polar(mag, phase);
        }
    }

    fn reset(&mut self) {
        self.stft.reset();
        self.live_mag.fill(0.0);
        self.live_phase.fill(0.0);
        self.out_bins.fill(Complex::ZERO);
        self.has_capture = false;
        self.blend = 0.0;
        self.state = FreezeState::Live;
    }
}

/// Per-frame values shared by all channels
struct FrameContext {
    params: FreezeParams,
    /// Blend increment per frame while fading in
    rate_in: f32,
    /// Blend decrement per frame while fading out
    rate_out: f32,
    radius: usize,
    kernel: [f32; KERNEL_LEN],
}

impl FrameContext {
    fn new(params: FreezeParams, frames_per_second: f32) -> Self {
        let mut ctx = Self {
            params,
            rate_in: 0.0,
            rate_out: 0.0,
            radius: 1,
            kernel: [0.0; KERNEL_LEN],
        };
        ctx.update(params, frames_per_second);
        ctx
    }

    fn update(&mut self, params: FreezeParams, frames_per_second: f32) {
        self.params = params;
        self.rate_in = fade_rate(params.fade_in_ms, frames_per_second);
        self.rate_out = fade_rate(params.fade_out_ms, frames_per_second);

        // Kernel over normalized distance (offset / radius)
        self.radius = ((params.blur * 20.0).round() as usize + 1).min(MAX_BLUR_RADIUS);
        self.kernel = [0.0; KERNEL_LEN];
        let r = self.radius as isize;
        for offset in -r..=r {
            let d = offset as f32 / r as f32;
            self.kernel[(offset + MAX_BLUR_RADIUS as isize) as usize] = (-d * d * 2.0).exp();
        }
    }
}

/// Blend change per frame for a fade time
fn fade_rate(fade_ms: f32, frames_per_second: f32) -> f32 {
    let frames = fade_ms / 1000.0 * frames_per_second;
    if frames > 0.0 {
        (1.0 / frames).min(1.0)
    } else {
        1.0
    }
}

/// Multi-channel spectral freeze
pub struct SpectralFreeze {
    channels: Vec<FreezeChannel>,
    num_channels: usize,
    quality: Quality,
    frames_per_second: f32,
    ctx: FrameContext,
    /// Jitter source (per instance, seedable)
    rng: Xorshift64,
}

impl SpectralFreeze {
    /// Create a freeze for `channels` interleaved channels (at least one)
    pub fn new(
        sample_rate: u32,
        channels: usize,
        quality: Quality,
        params: FreezeParams,
        seed: u64,
    ) -> Self {
        let channels = channels.max(1);
        let mut rng = Xorshift64::new(seed);
        let frames_per_second = sample_rate as f32 / quality.hop_size() as f32;
        let channel_states = (0..channels)
            .map(|_| FreezeChannel::new(quality, &mut rng))
            .collect();

        Self {
            channels: channel_states,
            num_channels: channels,
            quality,
            frames_per_second,
            ctx: FrameContext::new(params.clamped(), frames_per_second),
            rng,
        }
    }

    /// Update parameters (clamped)
    pub fn set_params(&mut self, params: FreezeParams) {
        self.ctx.update(params.clamped(), self.frames_per_second);
    }

    pub fn params(&self) -> &FreezeParams {
        &self.ctx.params
    }

    /// Engage or release the freeze
    pub fn set_enabled(&mut self, enabled: bool) {
        let mut params = self.ctx.params;
        params.enabled = enabled;
        self.set_params(params);
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.ctx.params.enabled
    }

    /// Discard every channel's capture; the next engaged frame captures again
    pub fn clear_capture(&mut self) {
        for channel in &mut self.channels {
            channel.has_capture = false;
        }
        tracing::debug!("freeze capture cleared");
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Crossfade position of a channel (0 = live, 1 = frozen)
    pub fn blend(&self, channel: usize) -> f32 {
        self.channels.get(channel).map_or(0.0, |c| c.blend)
    }

    pub fn state(&self, channel: usize) -> FreezeState {
        self.channels.get(channel).map_or(FreezeState::Live, |c| c.state)
    }

    pub fn has_capture(&self, channel: usize) -> bool {
        self.channels.get(channel).is_some_and(|c| c.has_capture)
    }

    /// Number of captures a channel has taken
    pub fn capture_count(&self, channel: usize) -> u32 {
        self.channels.get(channel).map_or(0, |c| c.captures)
    }
}

impl SpectralEffect for SpectralFreeze {
    fn process(&mut self, samples: &mut [f32]) {
        for frame in samples.chunks_mut(self.num_channels) {
            for (sample, channel) in frame.iter_mut().zip(self.channels.iter_mut()) {
                channel.stft.push_sample(*sample);
                if channel.stft.frame_ready() {
                    channel.process_frame(&self.ctx, &mut self.rng);
                }
                *sample = channel.stft.pull_sample();
            }
        }
    }

    fn reset(&mut self) {
        for channel in &mut self.channels {
            channel.reset();
        }
    }

    fn latency_samples(&self) -> usize {
        self.quality.fft_size()
    }

    fn name(&self) -> &'static str {
        "Spectral Freeze"
    }
}

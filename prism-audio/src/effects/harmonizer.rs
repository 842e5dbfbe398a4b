//! Harmonizer - up to four pitch-shifted voices with formant preservation
//!
//! Each voice runs its own phase vocoder over the mono sum of the input.
//! Bins are redistributed by the voice's pitch ratio, every source bin
//! adds its shifted true frequency to the running phase of its target bin,
//! and a cepstral envelope optionally restores the original formants.
//! Voices are mixed with a constant-power pan law next to a dry path
//! delayed by the STFT latency.

use super::SpectralEffect;
use crate::mixer::VoiceMixer;
use crate::params::{HarmonizerParams, VoiceParams, MAX_VOICES};
use crate::spectral::{
    hop_phase_advance, wrap_phase, Complex, PhaseAnalyzer, Quality, SpectralEnvelope, StftEngine,
};
use prism_theory::quantize_interval;

/// Range of the formant correction gain
const MIN_FORMANT_GAIN: f32 = 0.1;
const MAX_FORMANT_GAIN: f32 = 10.0;

/// Envelope values below this are treated as silence
const ENVELOPE_FLOOR: f32 = 1e-9;

/// Smoothed gain below which a switched-off voice stops rendering
const SILENT_GAIN: f32 = 1e-4;

/// Formant correction for one bin: the envelope ratio `target / source`,
/// scaled by `amount` around unity and clamped.
fn formant_correction(target: f32, source: f32, amount: f32) -> f32 {
    if source <= ENVELOPE_FLOOR {
        return 1.0;
    }
    let correction = target / source;
    (1.0 + (correction - 1.0) * amount).clamp(MIN_FORMANT_GAIN, MAX_FORMANT_GAIN)
}

/// One harmony voice
pub struct HarmonizerVoice {
    stft: StftEngine,
    analyzer: PhaseAnalyzer,
    envelope: SpectralEnvelope,
    /// Redistributed magnitudes
    synth_mag: Vec<f32>,
    /// Running output phase per target bin
    accum_phase: Vec<f32>,
    out_bins: Vec<Complex>,
    params: VoiceParams,
    pitch_ratio: f32,
}

impl HarmonizerVoice {
    fn new(quality: Quality, sample_rate: u32) -> Self {
        let num_bins = quality.num_bins();
        Self {
            stft: StftEngine::new(quality),
            analyzer: PhaseAnalyzer::new(num_bins),
            envelope: SpectralEnvelope::new(quality.fft_size(), sample_rate),
            synth_mag: vec![0.0; num_bins],
            accum_phase: vec![0.0; num_bins],
            out_bins: vec![Complex::ZERO; num_bins],
            params: VoiceParams::default(),
            pitch_ratio: 1.0,
        }
    }

    /// Frequency ratio applied to this voice
    #[inline]
    pub fn pitch_ratio(&self) -> f32 {
        self.pitch_ratio
    }

    #[inline]
    pub fn params(&self) -> &VoiceParams {
        &self.params
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.params.enabled
    }

    /// Clear all analysis and synthesis state
    pub fn reset(&mut self) {
        self.stft.reset();
        self.analyzer.reset();
        self.envelope.reset();
        self.synth_mag.fill(0.0);
        self.accum_phase.fill(0.0);
        self.out_bins.fill(Complex::ZERO);
    }

    #[inline]
    fn process_sample(&mut self, x: f32, formant: f32) -> f32 {
        self.stft.push_sample(x);
        if self.stft.frame_ready() {
            self.process_frame(formant);
        }
        self.stft.pull_sample()
    }

    fn process_frame(&mut self, formant: f32) {
        self.stft.analyze();
        self.analyzer.analyze(self.stft.bins());

        let num_bins = self.out_bins.len();
        let ratio = self.pitch_ratio;
        let magnitudes = self.analyzer.magnitudes();
        let true_freq = self.analyzer.true_frequencies();

        if formant > 0.0 {
            self.envelope.extract(magnitudes);
        }

        self.synth_mag.fill(0.0);

        // Every source bin integrates its shifted frequency into its target
        for k in 0..num_bins {
            let target = (k as f32 * ratio).round() as usize;
            if target >= num_bins {
                continue;
            }
            self.synth_mag[target] += magnitudes[k];
            self.accum_phase[target] = wrap_phase(
                self.accum_phase[target] + hop_phase_advance(true_freq[k] * ratio),
            );
        }

        for k in 0..num_bins {
            let mut mag = self.synth_mag[k];
            if formant > 0.0 {
                mag *= self.formant_gain(k, formant);
            }
            self.out_bins[k] = Complex::from_polar(mag, self.accum_phase[k]);
        }

        self.stft.synthesize(&self.out_bins);
    }

    /// Gain restoring the source envelope at target bin `k`
    fn formant_gain(&self, k: usize, amount: f32) -> f32 {
        formant_correction(
            self.envelope.interpolate(k as f32),
            self.envelope.interpolate(k as f32 / self.pitch_ratio),
            amount,
        )
    }
}

/// Multi-voice harmonizer over interleaved audio
pub struct Harmonizer {
    voices: [HarmonizerVoice; MAX_VOICES],
    params: HarmonizerParams,
    mixer: VoiceMixer,
    num_channels: usize,
    quality: Quality,
    /// Dry signal delayed by the STFT latency (interleaved frames)
    dry: Vec<f32>,
    dry_pos: usize,
}

impl Harmonizer {
    pub fn new(
        sample_rate: u32,
        channels: usize,
        quality: Quality,
        params: HarmonizerParams,
    ) -> Self {
        let channels = channels.max(1);
        let mut harmonizer = Self {
            voices: std::array::from_fn(|_| HarmonizerVoice::new(quality, sample_rate)),
            params: HarmonizerParams::default(),
            mixer: VoiceMixer::new(),
            num_channels: channels,
            quality,
            dry: vec![0.0; quality.fft_size() * channels],
            dry_pos: 0,
        };
        harmonizer.set_params(params);
        harmonizer.mixer.snap();
        harmonizer
    }

    /// Update parameters (clamped). Pitch ratios are recomputed and voices
    /// that switch on start from a clean state.
    pub fn set_params(&mut self, params: HarmonizerParams) {
        let params = params.clamped();

        for (index, (voice, voice_params)) in
            self.voices.iter_mut().zip(params.voices).enumerate()
        {
            if voice_params.enabled && !voice.params.enabled {
                voice.reset();
            }

            let semitones = if params.scale_aware {
                quantize_interval(
                    params.base_note,
                    voice_params.interval,
                    params.key,
                    params.scale,
                    true,
                ) as f32
            } else {
                voice_params.interval
            };
            voice.pitch_ratio = 2.0_f32.powf(semitones / 12.0);
            voice.params = voice_params;

            let level = if voice_params.enabled {
                voice_params.level
            } else {
                0.0
            };
            self.mixer.set_voice(index, level, voice_params.pan);
        }

        self.params = params;
    }

    pub fn params(&self) -> &HarmonizerParams {
        &self.params
    }

    pub fn voice(&self, index: usize) -> Option<&HarmonizerVoice> {
        self.voices.get(index)
    }

    pub fn voices(&self) -> &[HarmonizerVoice] {
        &self.voices
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    /// Number of voices currently switched on
    pub fn active_voices(&self) -> usize {
        self.voices.iter().filter(|v| v.is_enabled()).count()
    }
}

impl SpectralEffect for Harmonizer {
    fn process(&mut self, samples: &mut [f32]) {
        let channels = self.num_channels;
        let delay = self.quality.fft_size();
        let formant = self.params.formant_preserve;
        let dry_level = self.params.dry_level;

        for frame in samples.chunks_mut(channels) {
            let mono = frame.iter().sum::<f32>() / frame.len() as f32;

            // Switched-off voices keep rendering while their gain fades out
            let mut voice_out = [0.0_f32; MAX_VOICES];
            for (v, (out, voice)) in voice_out.iter_mut().zip(self.voices.iter_mut()).enumerate() {
                if voice.params.enabled || self.mixer.mono_gain(v) > SILENT_GAIN {
                    *out = voice.process_sample(mono, formant);
                }
            }

            self.mixer.advance();

            let base = self.dry_pos * channels;
            for (c, sample) in frame.iter_mut().enumerate() {
                let delayed = self.dry[base + c];
                self.dry[base + c] = *sample;

                let wet: f32 = voice_out
                    .iter()
                    .enumerate()
                    .map(|(v, out)| {
                        let gain = if channels == 2 {
                            let (left, right) = self.mixer.gains(v);
                            if c == 0 {
                                left
                            } else {
                                right
                            }
                        } else {
                            self.mixer.mono_gain(v)
                        };
                        out * gain
                    })
                    .sum();

                *sample = dry_level * delayed + wet;
            }

            self.dry_pos = (self.dry_pos + 1) % delay;
        }
    }

    fn reset(&mut self) {
        for voice in &mut self.voices {
            voice.reset();
        }
        self.dry.fill(0.0);
        self.dry_pos = 0;
        self.mixer.snap();
    }

    fn latency_samples(&self) -> usize {
        self.quality.fft_size()
    }

    fn name(&self) -> &'static str {
        "Harmonizer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectral::{fft, hann_window};
    use prism_theory::Scale;
    use std::f32::consts::{FRAC_1_SQRT_2, PI};

    const SR: u32 = 48000;

    fn sine(freq: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / SR as f32).sin() * 0.5)
            .collect()
    }

    fn interleave(mono: &[f32], channels: usize) -> Vec<f32> {
        mono.iter()
            .flat_map(|&x| std::iter::repeat(x).take(channels))
            .collect()
    }

    fn rms(samples: impl Iterator<Item = f32>) -> f32 {
        let (sum, n) = samples.fold((0.0, 0usize), |(s, n), x| (s + x * x, n + 1));
        (sum / n.max(1) as f32).sqrt()
    }

    fn single_voice(interval: f32, level: f32, pan: f32) -> HarmonizerParams {
        let mut params = HarmonizerParams {
            dry_level: 0.0,
            ..HarmonizerParams::default()
        };
        params.voices[0] = VoiceParams {
            interval,
            level,
            pan,
            enabled: true,
        };
        params
    }

    /// Strongest bin of a Hann-windowed block
    fn peak_bin(block: &[f32]) -> usize {
        let window = hann_window(block.len());
        let mut data: Vec<Complex> = block
            .iter()
            .zip(&window)
            .map(|(x, w)| Complex::new(x * w, 0.0))
            .collect();
        fft(&mut data, false);
        (1..block.len() / 2)
            .max_by(|&a, &b| data[a].magnitude().total_cmp(&data[b].magnitude()))
            .unwrap_or(0)
    }

    #[test]
    fn test_unity_voice_is_delayed_input() {
        let quality = Quality::Fast;
        let n = quality.fft_size();
        let input: Vec<f32> = (0..8192)
            .map(|i| {
                let t = i as f32 / SR as f32;
                0.4 * (2.0 * PI * 440.0 * t).sin() + 0.2 * (2.0 * PI * 1210.0 * t).sin()
            })
            .collect();

        let mut harmonizer = Harmonizer::new(SR, 1, quality, single_voice(0.0, 1.0, 0.0));
        let mut output = input.clone();
        harmonizer.process(&mut output);

        for t in 0..output.len() {
            let expected = if t >= n { input[t - n] } else { 0.0 };
            assert!(
                (output[t] - expected).abs() < 1e-3,
                "t={} got {} expected {}",
                t,
                output[t],
                expected
            );
        }
    }

    #[test]
    fn test_unity_voice_centered_in_stereo() {
        let quality = Quality::Fast;
        let n = quality.fft_size();
        let mono = sine(440.0, 8192);

        let mut harmonizer = Harmonizer::new(SR, 2, quality, single_voice(0.0, 1.0, 0.0));
        let mut output = interleave(&mono, 2);
        harmonizer.process(&mut output);

        for t in n..mono.len() {
            let expected = mono[t - n] * FRAC_1_SQRT_2;
            assert!((output[t * 2] - expected).abs() < 1e-3);
            assert!((output[t * 2 + 1] - expected).abs() < 1e-3);
        }
    }

    #[test]
    fn test_dry_path_is_latency_aligned() {
        let quality = Quality::Fast;
        let n = quality.fft_size();
        let input = sine(300.0, 4096);

        let params = HarmonizerParams {
            dry_level: 0.5,
            ..HarmonizerParams::default()
        };
        let mut harmonizer = Harmonizer::new(SR, 1, quality, params);
        let mut output = input.clone();
        harmonizer.process(&mut output);

        for t in 0..output.len() {
            let expected = if t >= n { input[t - n] * 0.5 } else { 0.0 };
            assert!((output[t] - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_voice_levels_and_hard_pan() {
        let quality = Quality::Fast;
        let mut params = HarmonizerParams {
            dry_level: 0.0,
            ..HarmonizerParams::default()
        };
        params.voices[0] = VoiceParams {
            interval: 0.0,
            level: 0.5,
            pan: -1.0,
            enabled: true,
        };
        params.voices[1] = VoiceParams {
            interval: 0.0,
            level: 0.3,
            pan: 1.0,
            enabled: true,
        };

        let mut harmonizer = Harmonizer::new(SR, 2, quality, params);
        assert_eq!(harmonizer.active_voices(), 2);

        let mut output = interleave(&sine(440.0, 16384), 2);
        harmonizer.process(&mut output);

        let settled = &output[4096 * 2..];
        let left = rms(settled.iter().step_by(2).copied());
        let right = rms(settled.iter().skip(1).step_by(2).copied());
        assert!(
            (left / right - 0.5 / 0.3).abs() < 0.05,
            "left {} right {}",
            left,
            right
        );
    }

    #[test]
    fn test_scale_aware_ratio() {
        let mut params = single_voice(1.0, 1.0, 0.0);
        params.scale = Scale::Major;
        params.scale_aware = true;
        params.voices[1] = VoiceParams {
            interval: 4.0,
            enabled: true,
            ..VoiceParams::default()
        };

        let harmonizer = Harmonizer::new(SR, 1, Quality::Fast, params);
        let first = harmonizer.voice(0).map(|v| v.pitch_ratio()).unwrap_or(0.0);
        let second = harmonizer.voice(1).map(|v| v.pitch_ratio()).unwrap_or(0.0);

        // C# snaps down to C
        assert!((first - 1.0).abs() < 1e-6);
        assert!((second - 2.0_f32.powf(4.0 / 12.0)).abs() < 1e-6);
    }

    #[test]
    fn test_unquantized_ratio_keeps_fraction() {
        let harmonizer = Harmonizer::new(SR, 1, Quality::Fast, single_voice(0.5, 1.0, 0.0));
        let ratio = harmonizer.voice(0).map(|v| v.pitch_ratio()).unwrap_or(0.0);
        assert!((ratio - 2.0_f32.powf(0.5 / 12.0)).abs() < 1e-6);
    }

    #[test]
    fn test_octave_up_moves_peak() {
        let quality = Quality::Fast;
        let n = quality.fft_size();
        // Bin-centered tone at bin 10
        let freq = 10.0 * SR as f32 / n as f32;

        let mut harmonizer = Harmonizer::new(SR, 1, quality, single_voice(12.0, 1.0, 0.0));
        let mut output = sine(freq, 8192);
        harmonizer.process(&mut output);

        let peak = peak_bin(&output[4096..4096 + n]);
        assert!((19..=21).contains(&peak), "peak at bin {}", peak);
    }

    #[test]
    fn test_formant_is_neutral_at_unity() {
        let quality = Quality::Fast;
        let input = sine(523.0, 8192);

        let mut plain = Harmonizer::new(SR, 1, quality, single_voice(0.0, 1.0, 0.0));
        let mut params = single_voice(0.0, 1.0, 0.0);
        params.formant_preserve = 1.0;
        let mut formant = Harmonizer::new(SR, 1, quality, params);

        let mut a = input.clone();
        let mut b = input;
        plain.process(&mut a);
        formant.process(&mut b);

        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-4);
        }
    }

    #[test]
    fn test_formant_shift_stays_finite() {
        let mut params = single_voice(-7.0, 1.0, 0.3);
        params.formant_preserve = 1.0;
        params.voices[1] = VoiceParams {
            interval: 12.0,
            level: 0.6,
            pan: -0.4,
            enabled: true,
        };

        let mut harmonizer = Harmonizer::new(SR, 2, Quality::Normal, params);
        let mut output = interleave(&sine(220.0, 16384), 2);
        harmonizer.process(&mut output);

        assert!(output.iter().all(|s| s.is_finite()));
        assert!(rms(output[8192 * 2..].iter().copied()) > 0.01);
    }

    #[test]
    fn test_enabling_voice_resets_it() {
        let quality = Quality::Fast;
        let mut harmonizer = Harmonizer::new(SR, 1, quality, single_voice(0.0, 1.0, 0.0));
        let mut block = sine(440.0, 4096);
        harmonizer.process(&mut block);

        let mut params = *harmonizer.params();
        params.voices[0].enabled = false;
        harmonizer.set_params(params);
        params.voices[0].enabled = true;
        harmonizer.set_params(params);

        // Fresh voice: silent for one latency period
        let mut block = sine(440.0, quality.fft_size());
        harmonizer.process(&mut block);
        assert!(block.iter().all(|s| s.abs() < 1e-3));
    }

    #[test]
    fn test_phase_integrates_every_source_bin() {
        let quality = Quality::Fast;
        let mut voice = HarmonizerVoice::new(quality, SR);
        voice.pitch_ratio = 0.5;

        // One frame of noise: several source bins land on each target
        let mut rng = crate::rng::Xorshift64::new(5);
        for _ in 0..quality.hop_size() {
            voice.process_sample(rng.next_bipolar() * 0.5, 0.0);
        }

        let num_bins = quality.num_bins();
        let mut expected = vec![0.0_f32; num_bins];
        for (k, &freq) in voice.analyzer.true_frequencies().iter().enumerate() {
            let target = (k as f32 * 0.5).round() as usize;
            expected[target] += hop_phase_advance(freq * 0.5);
        }

        for (k, (&got, &want)) in voice.accum_phase.iter().zip(&expected).enumerate() {
            let diff = wrap_phase(got - want).abs();
            assert!(diff < 1e-2, "bin {} phase {} expected {}", k, got, wrap_phase(want));
        }
    }

    #[test]
    fn test_formant_gain_follows_envelope_ratio() {
        let quality = Quality::Fast;
        let mut voice = HarmonizerVoice::new(quality, SR);
        voice.pitch_ratio = 1.5;

        // Single broad resonance around bin 100
        let magnitudes: Vec<f32> = (0..quality.num_bins())
            .map(|k| {
                let d = (k as f32 - 100.0) / 30.0;
                1.0 + 10.0 * (-d * d).exp()
            })
            .collect();
        voice.envelope.extract(&magnitudes);

        for k in [20, 80, 100, 150, 300] {
            let target = voice.envelope.interpolate(k as f32);
            let source = voice.envelope.interpolate(k as f32 / 1.5);
            for amount in [0.25, 0.5, 1.0] {
                let expected = (1.0 + (target / source - 1.0) * amount).clamp(0.1, 10.0);
                assert!((voice.formant_gain(k, amount) - expected).abs() < 1e-6);
            }
            assert!((voice.formant_gain(k, 0.0) - 1.0).abs() < 1e-6);
        }

        // Raising the resonance at bin 100 is undone at its shifted position
        assert!(voice.formant_gain(150, 1.0) < 1.0);
    }

    #[test]
    fn test_formant_correction_guards_silent_source() {
        assert_eq!(formant_correction(0.5, 0.0, 1.0), 1.0);
        assert_eq!(formant_correction(0.5, 1e-10, 1.0), 1.0);
        assert_eq!(formant_correction(100.0, 1.0, 1.0), 10.0);
        assert_eq!(formant_correction(0.01, 1.0, 1.0), 0.1);
        assert!((formant_correction(2.0, 1.0, 0.5) - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_disabled_voice_fades_out() {
        let quality = Quality::Fast;
        let mut harmonizer = Harmonizer::new(SR, 1, quality, single_voice(0.0, 1.0, 0.0));
        let mut block = sine(440.0, 4096);
        harmonizer.process(&mut block);

        let mut params = *harmonizer.params();
        params.voices[0].enabled = false;
        harmonizer.set_params(params);

        // Gain decays smoothly instead of cutting
        let mut tail = sine(440.0, 4096 + 64);
        let mut block = tail.split_off(4096);
        harmonizer.process(&mut block);
        assert!(rms(block.iter().copied()) > 0.1);

        let mut block = sine(440.0, 8192);
        harmonizer.process(&mut block);
        assert!(rms(block[4096..].iter().copied()) < 1e-3);
    }

    #[test]
    fn test_zero_channels_treated_as_mono() {
        let mut harmonizer = Harmonizer::new(SR, 0, Quality::Fast, single_voice(7.0, 1.0, 0.0));
        let mut block = sine(440.0, 4096);
        harmonizer.process(&mut block);
        assert!(block.iter().all(|s| s.is_finite()));
        assert!(rms(block[2048..].iter().copied()) > 0.1);
    }
}

//! PRISM - spectral freeze and harmonizer engine host
//!
//! Runs the spectral engine on a render thread over a synthesized test
//! signal and drives it through the command channel.
//!
//! Usage: `prism [--init] [CONFIG_PATH]`
//!
//! `--init` writes the effective configuration to the config path and exits.

mod config;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use tracing_subscriber::EnvFilter;

use config::Config;
use prism_audio::{EngineState, SpectralCommand, SpectralEngine, SpectralEvent, Xorshift64};

/// Frames rendered per block
const BLOCK_FRAMES: usize = 512;

/// Interval between state updates sent to the control thread
const STATE_UPDATE_INTERVAL: Duration = Duration::from_millis(250);

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut init = false;
    let mut path = None;
    for arg in std::env::args().skip(1) {
        if arg == "--init" {
            init = true;
        } else {
            path = Some(PathBuf::from(arg));
        }
    }

    let config = match &path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let shown = path.clone().unwrap_or_else(Config::config_path);
    tracing::info!(path = %shown.display(), "configuration loaded");

    // Write the effective configuration and exit
    if init {
        match &path {
            Some(path) => config.save_to(path)?,
            None => config.save()?,
        }
        tracing::info!(path = %shown.display(), "configuration written");
        return Ok(());
    }

    let state = EngineState::new(config.engine)?;

    // Create engine channels
    let (cmd_tx, cmd_rx, evt_tx, evt_rx) = SpectralEngine::create_channels();

    // Shutdown flag
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_render = shutdown.clone();

    // Spawn render thread
    let render_handle = thread::spawn(move || {
        run_render_thread(state, cmd_rx, evt_tx, shutdown_render);
    });

    let engine = SpectralEngine::new(cmd_tx, evt_rx);
    run_script(&engine);

    engine.shutdown();
    shutdown.store(true, Ordering::SeqCst);
    if render_handle.join().is_err() {
        anyhow::bail!("render thread panicked");
    }

    // Drain remaining events
    for event in engine.event_rx.try_iter() {
        log_event(&event);
    }

    Ok(())
}

/// Test signal: two partials with a little noise
struct ToneGenerator {
    phase: [f32; 2],
    increment: [f32; 2],
    rng: Xorshift64,
}

impl ToneGenerator {
    fn new(sample_rate: u32) -> Self {
        let sr = sample_rate as f32;
        Self {
            phase: [0.0; 2],
            increment: [220.0 / sr, 330.0 / sr],
            rng: Xorshift64::new(1),
        }
    }

    fn fill(&mut self, block: &mut [f32], channels: usize) {
        for frame in block.chunks_mut(channels) {
            let mut x = 0.0;
            for (phase, inc) in self.phase.iter_mut().zip(&self.increment) {
                x += (*phase * std::f32::consts::TAU).sin() * 0.25;
                *phase = (*phase + inc).fract();
            }
            x += self.rng.next_bipolar() * 0.01;
            frame.fill(x);
        }
    }
}

fn run_render_thread(
    mut state: EngineState,
    cmd_rx: Receiver<SpectralCommand>,
    evt_tx: Sender<SpectralEvent>,
    shutdown: Arc<AtomicBool>,
) {
    let sample_rate = state.config().sample_rate;
    let channels = state.config().channels;
    let block_duration = Duration::from_secs_f64(BLOCK_FRAMES as f64 / sample_rate as f64);

    let mut tone = ToneGenerator::new(sample_rate);
    let mut block = vec![0.0f32; BLOCK_FRAMES * channels];
    let mut last_state_update = Instant::now();

    while !shutdown.load(Ordering::Relaxed) {
        let started = Instant::now();

        // Commands are applied between blocks only
        if !state.drain_commands(&cmd_rx) {
            break;
        }

        tone.fill(&mut block, channels);
        state.process(&mut block);

        if last_state_update.elapsed() >= STATE_UPDATE_INTERVAL {
            let rms = (block.iter().map(|s| s * s).sum::<f32>() / block.len() as f32).sqrt();
            tracing::debug!(rms, "output level");
            if !rms.is_finite() {
                let _ = evt_tx.try_send(SpectralEvent::Error("non-finite output".into()));
            }
            let _ = evt_tx.try_send(state.get_state());
            last_state_update = Instant::now();
        }

        // Pace to real time
        if let Some(remaining) = block_duration.checked_sub(started.elapsed()) {
            thread::sleep(remaining);
        }
    }
}

/// Scripted session: live → freeze → harmonize over the freeze → release
fn run_script(engine: &SpectralEngine) {
    let steps: [(Duration, &[SpectralCommand]); 4] = [
        (
            Duration::from_millis(500),
            &[SpectralCommand::SetFreezeEnabled(true)],
        ),
        (
            Duration::from_millis(1000),
            &[
                SpectralCommand::SetHarmonizerActive(true),
                SpectralCommand::SetScaleAware(true),
                SpectralCommand::SetVoiceInterval(0, 4.0),
                SpectralCommand::SetVoicePan(0, -0.6),
                SpectralCommand::SetVoiceEnabled(0, true),
                SpectralCommand::SetVoiceInterval(1, 7.0),
                SpectralCommand::SetVoicePan(1, 0.6),
                SpectralCommand::SetVoiceEnabled(1, true),
                SpectralCommand::SetFormantPreserve(0.8),
            ],
        ),
        (
            Duration::from_millis(1000),
            &[
                SpectralCommand::SetFreezeEnabled(false),
                SpectralCommand::ClearCapture,
            ],
        ),
        (Duration::from_millis(500), &[]),
    ];

    for (wait, commands) in steps {
        let deadline = Instant::now() + wait;
        while Instant::now() < deadline {
            if let Ok(event) = engine.event_rx.recv_timeout(Duration::from_millis(50)) {
                log_event(&event);
            }
        }
        for cmd in commands {
            tracing::info!(?cmd, "sending command");
            engine.send(cmd.clone());
        }
    }
}

fn log_event(event: &SpectralEvent) {
    match event {
        SpectralEvent::StateUpdate {
            quality,
            latency_samples,
            freeze_enabled,
            freeze_blend,
            freeze_state,
            harmonizer_active,
            voice_ratio,
            ..
        } => {
            tracing::info!(
                quality = %quality,
                latency = latency_samples,
                freeze = freeze_enabled,
                blend = freeze_blend[0],
                state = ?freeze_state[0],
                harmonizer = harmonizer_active,
                ratios = ?voice_ratio,
                "engine state"
            );
        }
        SpectralEvent::Error(message) => tracing::error!(%message, "engine error"),
    }
}

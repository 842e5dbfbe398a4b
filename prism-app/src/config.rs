//! Engine configuration persistence for PRISM
//!
//! Stores the full engine setup as `key = value` lines. Voice keys are
//! numbered from 1 (`voice1.interval` .. `voice4.enabled`).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use prism_audio::{EngineConfig, PhaseMode, Quality, MAX_VOICES};
use prism_theory::{Key, Scale};
use thiserror::Error;

/// Errors from reading or writing a config file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Line {line}: expected `key = value`, found `{content}`")]
    Malformed { line: usize, content: String },

    #[error("Line {line}: unknown key `{key}`")]
    UnknownKey { line: usize, key: String },

    #[error("Line {line}: invalid value `{value}` for `{key}`")]
    InvalidValue {
        line: usize,
        key: String,
        value: String,
    },
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub engine: EngineConfig,
}

impl Config {
    /// Load config from the default location
    ///
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load config from a specific path; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        fs::write(path, self.serialize()).map_err(io_err)
    }

    /// Get the default config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("prism")
            .join("engine.conf")
    }

    /// Parse config from simple key=value format
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for (index, line) in content.lines().enumerate() {
            let line_no = index + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| ConfigError::Malformed {
                line: line_no,
                content: line.to_string(),
            })?;
            config.apply(line_no, key.trim(), value.trim())?;
        }

        Ok(config)
    }

    fn apply(&mut self, line: usize, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            line,
            key: key.to_string(),
            value: value.to_string(),
        };
        let engine = &mut self.engine;
        let freeze = &mut engine.freeze;
        let harmonizer = &mut engine.harmonizer;

        match key {
            "sample_rate" => engine.sample_rate = parse_value(value).ok_or_else(invalid)?,
            "channels" => engine.channels = parse_value(value).ok_or_else(invalid)?,
            "quality" => engine.quality = Quality::from_str(value).map_err(|_| invalid())?,
            "seed" => engine.seed = parse_seed(value).ok_or_else(invalid)?,

            "freeze.active" => engine.freeze_active = parse_bool(value).ok_or_else(invalid)?,
            "freeze.enabled" => freeze.enabled = parse_bool(value).ok_or_else(invalid)?,
            "freeze.fade_in_ms" => freeze.fade_in_ms = parse_value(value).ok_or_else(invalid)?,
            "freeze.fade_out_ms" => freeze.fade_out_ms = parse_value(value).ok_or_else(invalid)?,
            "freeze.blur" => freeze.blur = parse_value(value).ok_or_else(invalid)?,
            "freeze.brightness" => freeze.brightness = parse_value(value).ok_or_else(invalid)?,
            "freeze.phase_mode" => {
                freeze.phase_mode = PhaseMode::from_str(value).map_err(|_| invalid())?
            }
            "freeze.jitter" => freeze.jitter = parse_value(value).ok_or_else(invalid)?,

            "harmonizer.active" => {
                engine.harmonizer_active = parse_bool(value).ok_or_else(invalid)?
            }
            "harmonizer.key" => {
                harmonizer.key = Key::from_str(value).map_err(|_| invalid())?.pitch_class()
            }
            "harmonizer.scale" => {
                harmonizer.scale = Scale::from_str(value).map_err(|_| invalid())?
            }
            "harmonizer.scale_aware" => {
                harmonizer.scale_aware = parse_bool(value).ok_or_else(invalid)?
            }
            "harmonizer.formant" => {
                harmonizer.formant_preserve = parse_value(value).ok_or_else(invalid)?
            }
            "harmonizer.dry" => harmonizer.dry_level = parse_value(value).ok_or_else(invalid)?,
            "harmonizer.base_note" => {
                harmonizer.base_note = parse_value(value).ok_or_else(invalid)?
            }

            _ => {
                let unknown = || ConfigError::UnknownKey {
                    line,
                    key: key.to_string(),
                };
                let (index, field) = parse_voice_key(key).ok_or_else(unknown)?;
                let voice = &mut harmonizer.voices[index];
                match field {
                    "interval" => voice.interval = parse_value(value).ok_or_else(invalid)?,
                    "level" => voice.level = parse_value(value).ok_or_else(invalid)?,
                    "pan" => voice.pan = parse_value(value).ok_or_else(invalid)?,
                    "enabled" => voice.enabled = parse_bool(value).ok_or_else(invalid)?,
                    _ => return Err(unknown()),
                }
            }
        }

        Ok(())
    }

    /// Serialize config to simple key=value format
    pub fn serialize(&self) -> String {
        let engine = &self.engine;
        let freeze = &engine.freeze;
        let harmonizer = &engine.harmonizer;
        let key = Key::new(harmonizer.key).unwrap_or(Key::C);

        let mut lines = vec![
            "# PRISM Engine Configuration".to_string(),
            format!("sample_rate = {}", engine.sample_rate),
            format!("channels = {}", engine.channels),
            format!("quality = {}", engine.quality.id()),
            format!("seed = {:#x}", engine.seed),
            String::new(),
            "# Spectral freeze".to_string(),
            format!("freeze.active = {}", engine.freeze_active),
            format!("freeze.enabled = {}", freeze.enabled),
            format!("freeze.fade_in_ms = {}", freeze.fade_in_ms),
            format!("freeze.fade_out_ms = {}", freeze.fade_out_ms),
            format!("freeze.blur = {}", freeze.blur),
            format!("freeze.brightness = {}", freeze.brightness),
            format!("freeze.phase_mode = {}", freeze.phase_mode.id()),
            format!("freeze.jitter = {}", freeze.jitter),
            String::new(),
            "# Harmonizer".to_string(),
            format!("harmonizer.active = {}", engine.harmonizer_active),
            format!("harmonizer.key = {}", key),
            format!("harmonizer.scale = {}", harmonizer.scale.id()),
            format!("harmonizer.scale_aware = {}", harmonizer.scale_aware),
            format!("harmonizer.formant = {}", harmonizer.formant_preserve),
            format!("harmonizer.dry = {}", harmonizer.dry_level),
            format!("harmonizer.base_note = {}", harmonizer.base_note),
        ];

        for (i, voice) in harmonizer.voices.iter().enumerate() {
            let n = i + 1;
            lines.push(format!("voice{}.interval = {}", n, voice.interval));
            lines.push(format!("voice{}.level = {}", n, voice.level));
            lines.push(format!("voice{}.pan = {}", n, voice.pan));
            lines.push(format!("voice{}.enabled = {}", n, voice.enabled));
        }

        lines.join("\n") + "\n"
    }
}

fn parse_value<T: FromStr>(value: &str) -> Option<T> {
    value.parse().ok()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Some(true),
        "false" | "off" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Decimal or `0x`-prefixed hexadecimal
fn parse_seed(value: &str) -> Option<u64> {
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16).ok(),
        None => value.parse().ok(),
    }
}

/// `voiceN.field` → (zero-based index, field)
fn parse_voice_key(key: &str) -> Option<(usize, &str)> {
    let (voice, field) = key.strip_prefix("voice")?.split_once('.')?;
    let n: usize = voice.parse().ok()?;
    (1..=MAX_VOICES).contains(&n).then_some((n - 1, field))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_parse_with_comments() {
        let content = "# Comment\nquality = fast\n\n# Another comment\nfreeze.blur = 0.25";
        let config = Config::parse(content).unwrap();
        assert_eq!(config.engine.quality, Quality::Fast);
        assert_eq!(config.engine.freeze.blur, 0.25);
    }

    #[test]
    fn test_parse_harmonizer_and_voices() {
        let content = "\
harmonizer.active = on
harmonizer.key = F#
harmonizer.scale = harmonic minor
harmonizer.scale_aware = true
voice1.interval = 4
voice1.enabled = true
voice4.pan = -0.5
";
        let config = Config::parse(content).unwrap();
        let h = &config.engine.harmonizer;
        assert!(config.engine.harmonizer_active);
        assert_eq!(h.key, 6);
        assert_eq!(h.scale, Scale::HarmonicMinor);
        assert!(h.scale_aware);
        assert_eq!(h.voices[0].interval, 4.0);
        assert!(h.voices[0].enabled);
        assert_eq!(h.voices[3].pan, -0.5);
    }

    #[test]
    fn test_parse_seed_formats() {
        assert_eq!(parse_seed("42"), Some(42));
        assert_eq!(parse_seed("0xff"), Some(255));
        assert_eq!(parse_seed("0xDEAD_BEEF"), Some(0xDEAD_BEEF));
        assert_eq!(parse_seed("zz"), None);
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let err = Config::parse("quality = fast\nnot a pair").unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { line: 2, .. }));
    }

    #[test]
    fn test_unknown_key() {
        let err = Config::parse("voice5.level = 1").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey { line: 1, .. }));

        let err = Config::parse("voice1.colour = red").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey { .. }));
    }

    #[test]
    fn test_invalid_value() {
        let err = Config::parse("\nfreeze.phase_mode = sideways").unwrap_err();
        match err {
            ConfigError::InvalidValue { line, key, value } => {
                assert_eq!(line, 2);
                assert_eq!(key, "freeze.phase_mode");
                assert_eq!(value, "sideways");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_serialize_roundtrip() {
        let mut config = Config::default();
        config.engine.quality = Quality::Ultra;
        config.engine.seed = 7;
        config.engine.freeze.phase_mode = PhaseMode::Preserve;
        config.engine.freeze.fade_in_ms = 250.0;
        config.engine.harmonizer.key = 10;
        config.engine.harmonizer.scale = Scale::Dorian;
        config.engine.harmonizer.voices[2].interval = -7.0;
        config.engine.harmonizer.voices[2].enabled = true;

        let parsed = Config::parse(&config.serialize()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("prism-config-test-does-not-exist.conf");
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("prism-config-test-{}", std::process::id()));
        let path = dir.join("engine.conf");

        let mut config = Config::default();
        config.engine.channels = 1;
        config.engine.harmonizer.dry_level = 0.3;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);

        let _ = fs::remove_dir_all(&dir);
    }
}

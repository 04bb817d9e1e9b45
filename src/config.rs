/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory, the CWD or
/// `~/.local/share/onekey`. Falls back to defaults if the file is missing
/// or incomplete. Problems are returned as warnings, because the logger
/// is not up yet when the config is read.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::platform::KeyId;

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub timing: TimingConfig,
    pub input: InputConfig,
    pub levels_dir: PathBuf,
    pub slowdowns: bool,
    pub trace_capacity: usize,
    pub log_file: PathBuf,
    pub log_level: String,
}

#[derive(Clone, Debug)]
pub struct TimingConfig {
    pub tick_rate_ms: u64,
    pub frames_per_timer_tick: u32, // collectable timers count in these
    pub score_decay_frames: u32,
}

#[derive(Clone, Debug)]
pub struct InputConfig {
    pub control_key: KeyId,
    pub gamepad_buttons: Vec<String>,
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    timing: TomlTiming,
    #[serde(default)]
    input: TomlInput,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlTiming {
    #[serde(default = "default_tick_rate")]
    tick_rate_ms: u64,
    #[serde(default = "default_frames_per_timer_tick")]
    frames_per_timer_tick: u32,
    #[serde(default = "default_score_decay")]
    score_decay_frames: u32,
}

#[derive(Deserialize, Debug)]
struct TomlInput {
    #[serde(default = "default_control_key")]
    control_key: String,
    #[serde(default = "default_gamepad_buttons")]
    gamepad_buttons: Vec<String>,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_levels_dir")]
    levels_dir: String,
    #[serde(default = "default_slowdowns")]
    slowdowns: bool,
    #[serde(default = "default_trace_capacity")]
    trace_capacity: usize,
    #[serde(default = "default_log_file")]
    log_file: String,
    #[serde(default = "default_log_level")]
    log_level: String,
}

// ── Defaults ──

fn default_tick_rate() -> u64 { 20 }                // 50 Hz, like a PAL frame
fn default_frames_per_timer_tick() -> u32 { 50 }    // one second
fn default_score_decay() -> u32 { 10 }

fn default_control_key() -> String { "space".into() }
fn default_gamepad_buttons() -> Vec<String> { vec!["A".into(), "B".into(), "X".into(), "Y".into()] }

fn default_levels_dir() -> String { "levels".into() }
fn default_slowdowns() -> bool { true }
fn default_trace_capacity() -> usize { 250 }
fn default_log_file() -> String { "onekey.log".into() }
fn default_log_level() -> String { "info".into() }

impl Default for TomlTiming {
    fn default() -> Self {
        TomlTiming {
            tick_rate_ms: default_tick_rate(),
            frames_per_timer_tick: default_frames_per_timer_tick(),
            score_decay_frames: default_score_decay(),
        }
    }
}

impl Default for TomlInput {
    fn default() -> Self {
        TomlInput {
            control_key: default_control_key(),
            gamepad_buttons: default_gamepad_buttons(),
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            levels_dir: default_levels_dir(),
            slowdowns: default_slowdowns(),
            trace_capacity: default_trace_capacity(),
            log_file: default_log_file(),
            log_level: default_log_level(),
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        let (cfg, _) = GameConfig::from_toml(TomlConfig::default(), &[]);
        cfg
    }
}

/// `"space"`, `"enter"` or a single character.
pub fn parse_control_key(name: &str) -> Option<KeyId> {
    let lower = name.trim().to_ascii_lowercase();
    match lower.as_str() {
        "space" => Some(KeyId::Char(' ')),
        "enter" | "return" => Some(KeyId::Enter),
        _ => {
            let mut chars = lower.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(KeyId::Char(c)),
                _ => None,
            }
        }
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`; returns the config plus any warnings.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> (Self, Vec<String>) {
        let search_dirs = candidate_dirs();
        let mut warnings = vec![];
        let toml_cfg = load_toml(&search_dirs, &mut warnings);
        let (cfg, more) = GameConfig::from_toml(toml_cfg, &search_dirs);
        warnings.extend(more);
        (cfg, warnings)
    }

    /// Parse config text directly (no file search).
    #[cfg(test)]
    fn from_str(text: &str) -> Result<(Self, Vec<String>), toml::de::Error> {
        let toml_cfg = toml::from_str::<TomlConfig>(text)?;
        Ok(GameConfig::from_toml(toml_cfg, &[]))
    }

    fn from_toml(toml_cfg: TomlConfig, search_dirs: &[PathBuf]) -> (Self, Vec<String>) {
        let mut warnings = vec![];

        let control_key = parse_control_key(&toml_cfg.input.control_key).unwrap_or_else(|| {
            warnings.push(format!(
                "unknown control_key {:?}, using space",
                toml_cfg.input.control_key
            ));
            KeyId::Char(' ')
        });

        let timing = TimingConfig {
            tick_rate_ms: toml_cfg.timing.tick_rate_ms.max(1),
            frames_per_timer_tick: toml_cfg.timing.frames_per_timer_tick.max(1),
            score_decay_frames: toml_cfg.timing.score_decay_frames.max(1),
        };

        let cfg = GameConfig {
            timing,
            input: InputConfig {
                control_key,
                gamepad_buttons: toml_cfg.input.gamepad_buttons,
            },
            levels_dir: resolve_levels_dir(&toml_cfg.general.levels_dir, search_dirs),
            slowdowns: toml_cfg.general.slowdowns,
            trace_capacity: toml_cfg.general.trace_capacity.max(1),
            log_file: PathBuf::from(toml_cfg.general.log_file),
            log_level: toml_cfg.general.log_level,
        };
        (cfg, warnings)
    }
}

/// Absolute paths are used as is; relative ones are looked up in the
/// candidate dirs, falling back to the CWD.
fn resolve_levels_dir(name: &str, search_dirs: &[PathBuf]) -> PathBuf {
    if Path::new(name).is_absolute() {
        return PathBuf::from(name);
    }
    search_dirs
        .iter()
        .map(|d| d.join(name))
        .find(|p| p.is_dir())
        .unwrap_or_else(|| PathBuf::from(name))
}

/// Candidate directories to search: exe dir + CWD + XDG data home (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    // 1. Directory of the running executable
    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    // 2. Current working directory
    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    // 3. XDG data home (~/.local/share/onekey)
    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/onekey");
        if xdg.is_dir() && !dirs.iter().any(|d| d == &xdg) {
            dirs.push(xdg);
        }
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf], warnings: &mut Vec<String>) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(text) => match toml::from_str::<TomlConfig>(&text) {
                    Ok(cfg) => return cfg,
                    Err(e) => {
                        warnings.push(format!("{} parse error, using defaults: {e}", path.display()));
                        return TomlConfig::default();
                    }
                },
                Err(e) => {
                    warnings.push(format!("could not read {}: {e}", path.display()));
                }
            }
        }
    }
    TomlConfig::default()
}

/// Entry point: config, logging, terminal setup, then the game loop.

mod config;
mod domain;
mod platform;
mod sim;
mod ui;

use std::fs::File;
use std::time::Duration;

use env_logger::{Builder, Env, Target};

use config::GameConfig;
use platform::FixedRateClock;
use sim::gameloop::{AppError, GameLoop};
use sim::level::load_levels;
use ui::gamepad::GamepadState;
use ui::input::{ControlInput, InputState};
use ui::renderer::Renderer;
use ui::sound::SoundEngine;

const TITLE: &str = "ONE KEY";

/// Log to the configured file: the terminal belongs to the renderer.
/// `RUST_LOG` overrides the configured level.
fn init_logging(config: &GameConfig) {
    let env = Env::default().default_filter_or(config.log_level.as_str());
    let mut builder = Builder::from_env(env);
    match File::create(&config.log_file) {
        Ok(file) => {
            builder.target(Target::Pipe(Box::new(file)));
        }
        Err(e) => {
            eprintln!("cannot open log file {}: {e}", config.log_file.display());
            builder.filter_level(log::LevelFilter::Off);
        }
    }
    // Only fails if a logger was already set.
    let _ = builder.try_init();
}

fn main() {
    let (config, warnings) = GameConfig::load();
    init_logging(&config);
    for w in &warnings {
        log::warn!("{}", w);
    }

    match run(&config) {
        Ok(total) => {
            println!();
            println!("Thanks for playing One Key!");
            println!("Final Score: {}", total);
        }
        Err(e) => {
            log::error!("{}", e);
            eprintln!("Game error: {e}");
            std::process::exit(1);
        }
    }
}

fn run(config: &GameConfig) -> Result<u32, AppError> {
    let levels = load_levels(&config.levels_dir);
    log::info!("{} levels loaded from {}", levels.len(), config.levels_dir.display());
    if levels.is_empty() {
        return Err(AppError::NoLevels);
    }

    let mut renderer = Renderer::new(TITLE);
    let mut keys = InputState::new();
    keys.honor_release = renderer.init()?;

    let pad = GamepadState::new(&config.input.gamepad_buttons);
    log::info!("gamepad connected: {}", pad.connected);
    let input = ControlInput::new(keys, pad);
    let clock = FixedRateClock::new(Duration::from_millis(config.timing.tick_rate_ms));
    let sound = SoundEngine::new();

    GameLoop::new(config, levels, renderer, input, clock).and_then(|mut game| {
        let outcome = game.run(|events| {
            if let Some(sfx) = &sound {
                sfx.play_events(events);
            }
        });
        let total = game.world.scoring.total;
        if let Err(e) = game.display_mut().cleanup() {
            log::error!("terminal cleanup failed: {}", e);
        }
        outcome.map(|()| total)
    })
}

/// The fixed-rate game loop.
///
/// ## Tick order (strict)
///
///   1. Input     : sample the control key, update pressed/processed flags
///   2. Resolve   : first proposal from `GAME_ACTIONS`
///   3. Trace     : one ACTION record per tick
///   4. Apply     : one action, one runner mutation
///   5. Position  : jump arc against level geometry
///   6. Timers    : every running timer counts one frame; it loses a
///                  tick each `frames_per_timer_tick` frames since it started
///   7. Interact  : keys, passthrough cells, pills, exit
///   8. Animate   : door and pill motion, then the runner sprite
///   9. Scores    : decay and (changed-only) print
///
/// `run()` then commits the frame and waits for the next tick boundary.
/// That wait is the only suspension point. The loop ends only on an
/// external reset from the input service.

use thiserror::Error;

use crate::config::GameConfig;
use crate::domain::action::Action;
use crate::domain::collectable::{collect, frame_timer, TimerTick};
use crate::domain::door::{self, DoorMotion};
use crate::domain::pill::SlowdownStatus;
use crate::platform::{Display, FrameSync, InputService, KeyId};
use crate::sim::event::GameEvent;
use crate::sim::level::{install_level, LevelDef};
use crate::sim::resolver::{resolve, GAME_ACTIONS};
use crate::sim::trace::{TraceEntry, TraceKind, TraceRing};
use crate::sim::world::WorldState;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("no playable levels found")]
    NoLevels,
}

pub struct GameLoop<D: Display, I: InputService, C: FrameSync> {
    pub world: WorldState,
    levels: Vec<LevelDef>,
    display: D,
    input: I,
    clock: C,
    trace: TraceRing<TraceEntry>,
    control_key: KeyId,
    frames_per_timer_tick: u32,
    score_decay_frames: u64,
}

impl<D: Display, I: InputService, C: FrameSync> GameLoop<D, I, C> {
    /// Set up the world and install the first level.
    pub fn new(
        config: &GameConfig,
        levels: Vec<LevelDef>,
        mut display: D,
        input: I,
        clock: C,
    ) -> Result<Self, AppError> {
        let first = levels.first().ok_or(AppError::NoLevels)?;

        let mut world = WorldState::new();
        world.slowdowns_disabled = !config.slowdowns;
        install_level(&mut world, first, 0, &mut display);

        Ok(GameLoop {
            world,
            levels,
            display,
            input,
            clock,
            trace: TraceRing::new(config.trace_capacity),
            control_key: config.input.control_key,
            frames_per_timer_tick: config.timing.frames_per_timer_tick.max(1),
            score_decay_frames: u64::from(config.timing.score_decay_frames.max(1)),
        })
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    pub fn trace(&self) -> &TraceRing<TraceEntry> {
        &self.trace
    }

    /// Run until the input service asks for a reset.
    pub fn run<F: FnMut(&[GameEvent])>(&mut self, mut on_events: F) -> Result<(), AppError> {
        self.record(TraceKind::Enter, Action::NoAction);
        log::info!("game loop started at level {}", self.world.current_level + 1);

        loop {
            let events = self.tick();
            if !events.is_empty() {
                on_events(&events);
            }
            self.display.update_now()?;

            if self.input.reset_requested() {
                break;
            }
            self.clock.wait_for_tick();
        }

        log::info!("reset requested, total score {}", self.world.scoring.total);
        if let Some(last) = self.trace.latest() {
            log::info!("last tick: {last}");
        }
        self.record(TraceKind::Exit, Action::NoAction);
        self.dump_trace();
        Ok(())
    }

    /// One complete tick, minus the commit and the wait.
    pub fn tick(&mut self) -> Vec<GameEvent> {
        let mut events = vec![];

        self.sample_input();

        // Slowdown: the runner only acts on even frames.
        let runner_acts = !(self.world.slowdown_active() && self.world.frame % 2 == 1);

        let action = if runner_acts {
            resolve(&GAME_ACTIONS, &self.world)
        } else {
            Action::NoAction
        };
        self.record(TraceKind::Action, action);

        if runner_acts {
            self.apply_action(action, &mut events);
            self.world.position_runner();
        }

        // Before interact, so a timer never counts the frame it was started in.
        self.tick_timers(&mut events);

        if self.interact(&mut events) {
            return events;
        }

        self.animate();

        if (self.world.frame + 1) % self.score_decay_frames == 0 {
            self.world.scoring.decrement_level_score(1);
        }
        self.world.scoring.show_scores(&mut self.display);

        self.world.frame += 1;
        events
    }

    // ── Steps ──

    fn sample_input(&mut self) {
        self.input.poll();
        let down = self.input.is_key_down(self.control_key);
        let changed = down != self.world.key_pressed;

        if down {
            self.world.key_pressed = true;
        } else {
            self.world.key_pressed = false;
            self.world.key_processed = false;
        }

        if changed {
            self.record(TraceKind::KeyState, Action::NoAction);
        }
    }

    fn apply_action(&mut self, action: Action, events: &mut Vec<GameEvent>) {
        let runner = &mut self.world.runner;
        match action {
            Action::NoAction => {}
            Action::ToggleDirection => runner.toggle_direction(),
            Action::Jump => {
                runner.start_jumping();
                self.world.key_processed = true;
                events.push(GameEvent::RunnerJumped);
            }
            Action::MoveDown => runner.y += 1,
            Action::MoveUp => runner.y -= 1,
            Action::MoveRight => runner.x += 1,
            Action::MoveLeft => runner.x -= 1,
        }
    }

    /// Keys, passthrough cells, pills and the exit. Returns true when the
    /// level was completed and replaced.
    fn interact(&mut self, events: &mut Vec<GameEvent>) -> bool {
        let cell = self.world.runner.cell();
        let on = |x: u8, y: u8| cell == (i32::from(x), i32::from(y));

        for (i, door) in self.world.doors.iter_mut().enumerate().take_while(|(_, d)| d.is_valid()) {
            let (kx, ky) = door.collectable.cell();
            if on(kx, ky) && collect(door, &mut self.display).is_ok() {
                log::info!("key {} collected, door open for {}", i, door.open_secs);
                events.push(GameEvent::KeyCollected { door: i });
            }
            if door.check_passed_through(cell) {
                log::info!("passed through door {}", i);
                door.display_key(false, &mut self.display);
                events.push(GameEvent::DoorPassed { door: i });
            }
        }

        if !self.world.slowdowns_disabled {
            for (i, pill) in self.world.pills.iter_mut().enumerate().take_while(|(_, p)| p.is_valid()) {
                let (px, py) = pill.collectable.cell();
                if on(px, py) && collect(pill, &mut self.display).is_ok() {
                    self.world.scoring.use_bonus();
                    log::info!("slowdown pill {} taken for {}", i, pill.duration_secs);
                    events.push(GameEvent::PillCollected { pill: i });
                }
            }
        }

        if self.world.runner_on_exit() {
            self.complete_level(events);
            return true;
        }
        false
    }

    fn complete_level(&mut self, events: &mut Vec<GameEvent>) {
        let level = self.world.current_level;
        let gained = self.world.scoring.bank_level();
        log::info!(
            "level {} complete: +{} (total {})",
            level + 1,
            gained,
            self.world.scoring.total
        );
        events.push(GameEvent::LevelComplete { level });

        let next = (level + 1) % self.levels.len();
        install_level(&mut self.world, &self.levels[next], next, &mut self.display);
    }

    fn tick_timers(&mut self, events: &mut Vec<GameEvent>) {
        let fpt = self.frames_per_timer_tick;
        for (i, door) in self.world.doors.iter_mut().enumerate().take_while(|(_, d)| d.is_valid()) {
            if frame_timer(door, &mut self.display, fpt) == TimerTick::Expired {
                log::debug!("door {} timer expired", i);
                if door.motion() == DoorMotion::Closing {
                    log::info!("door {} closing", i);
                    events.push(GameEvent::DoorClosing { door: i });
                }
            }
        }
        for (i, pill) in self.world.pills.iter_mut().enumerate().take_while(|(_, p)| p.is_valid()) {
            if frame_timer(pill, &mut self.display, fpt) == TimerTick::Expired
                && pill.status() == SlowdownStatus::Inactive
            {
                log::info!("slowdown {} ended", i);
                events.push(GameEvent::SlowdownEnded { pill: i });
            }
        }
    }

    fn animate(&mut self) {
        for door in self.world.doors.iter_mut().take_while(|d| d.is_valid()) {
            door.animate(&mut self.display);
        }
        for pill in self.world.pills.iter_mut().take_while(|p| p.is_valid()) {
            pill.animate(&mut self.display);
        }
        door::validate_cells(&self.world.doors, &mut self.display);
        self.world.draw_runner(&mut self.display);
    }

    // ── Trace ──

    fn record(&mut self, kind: TraceKind, action: Action) {
        self.trace.push(TraceEntry {
            kind,
            key_pressed: self.world.key_pressed,
            key_processed: self.world.key_processed,
            x: self.world.runner.x,
            y: self.world.runner.y,
            action,
        });
    }

    fn dump_trace(&self) {
        if self.trace.is_empty() || !log::log_enabled!(log::Level::Debug) {
            return;
        }
        log::debug!("trace ({} of {} entries), oldest first:", self.trace.len(), self.trace.capacity());
        for entry in self.trace.iter() {
            log::debug!("  {entry}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::recording::{NoWait, RecordingDisplay, ScriptedInput};
    use crate::sim::level::parse_level;

    const CORRIDOR: &str = "\
# Test Corridor
@ door=A open=3
############
#P a A   X #
############
";

    const OPEN_FLOOR: &str = "\
# Open Floor
##################################
#                                #
#                                #
#P                               #
##################################
";

    const PILL_FLOOR: &str = "\
# Pill Floor
@ bonus=300 bonus_step=40 pill_secs=2
##################################
#P*                              #
##################################
";

    const BOX: &str = "\
# Key Box
@ door=A open=3
#########
#P a#A  #
#########
";

    const TIMER_ROOM: &str = "\
# Timer Room
@ door=A open=1
##########A#
#P a       #
############
";

    type TestLoop = GameLoop<RecordingDisplay, ScriptedInput, NoWait>;

    fn config() -> GameConfig {
        let mut cfg = GameConfig::default();
        cfg.trace_capacity = 1000;
        cfg
    }

    fn game(levels: &[&str], cfg: &GameConfig, script: &[bool]) -> TestLoop {
        let defs = levels.iter().map(|t| parse_level(t).unwrap()).collect();
        GameLoop::new(cfg, defs, RecordingDisplay::new(), ScriptedInput::new(script), NoWait::default()).unwrap()
    }

    fn run_ticks(g: &mut TestLoop, n: usize) -> Vec<GameEvent> {
        (0..n).flat_map(|_| g.tick()).collect()
    }

    fn actions(g: &TestLoop) -> Vec<Action> {
        g.trace()
            .iter()
            .filter(|e| e.kind == TraceKind::Action)
            .map(|e| e.action)
            .collect()
    }

    #[test]
    fn no_levels_is_an_error() {
        let r = GameLoop::new(
            &config(),
            vec![],
            RecordingDisplay::new(),
            ScriptedInput::new(&[]),
            NoWait::default(),
        );
        assert!(matches!(r, Err(AppError::NoLevels)));
    }

    #[test]
    fn key_opens_door_runner_passes_and_exits() {
        let cfg = config();
        let mut g = game(&[CORRIDOR], &cfg, &[]);
        let events = run_ticks(&mut g, 120);

        let key = events.iter().position(|e| *e == GameEvent::KeyCollected { door: 0 });
        let pass = events.iter().position(|e| *e == GameEvent::DoorPassed { door: 0 });
        let done = events.iter().position(|e| *e == GameEvent::LevelComplete { level: 0 });
        assert!(key < pass && pass < done, "{events:?}");
        assert!(key.is_some());
        assert!(g.world.scoring.total > 0);
        // single level wraps around
        assert_eq!(g.world.current_level, 0);
    }

    #[test]
    fn closed_door_turns_the_runner() {
        let cfg = config();
        let mut g = game(&[BOX], &cfg, &[]);
        run_ticks(&mut g, 30);
        assert!(actions(&g).contains(&Action::ToggleDirection));
        assert!(g.world.runner.cell().0 < 4);
    }

    #[test]
    fn door_closes_when_timer_runs_out() {
        let mut cfg = config();
        cfg.timing.frames_per_timer_tick = 2;
        let mut g = game(&[BOX], &cfg, &[]);
        let events = run_ticks(&mut g, 40);

        let key = events.iter().position(|e| *e == GameEvent::KeyCollected { door: 0 });
        let closing = events.iter().position(|e| *e == GameEvent::DoorClosing { door: 0 });
        assert!(key.is_some());
        assert!(closing > key, "{events:?}");
    }

    #[test]
    fn one_tick_door_opens_fully_whatever_the_frame_phase() {
        for fpt in [9u32, 20, 28, 33] {
            for phase in 0..u64::from(fpt) {
                let mut cfg = config();
                cfg.timing.frames_per_timer_tick = fpt;
                let mut g = game(&[TIMER_ROOM], &cfg, &[]);
                g.world.frame = phase;

                let mut guard = 0;
                while !g.tick().contains(&GameEvent::KeyCollected { door: 0 }) {
                    guard += 1;
                    assert!(guard < 50, "key never collected");
                }
                assert_eq!(g.world.doors[0].motion(), DoorMotion::Opening);

                let mut open_frames = 0;
                let mut max_offset = g.world.doors[0].offset();
                loop {
                    let events = g.tick();
                    open_frames += 1;
                    assert!(!events.contains(&GameEvent::KeyCollected { door: 0 }));
                    if events.contains(&GameEvent::DoorClosing { door: 0 }) {
                        break;
                    }
                    max_offset = max_offset.max(g.world.doors[0].offset());
                    assert!(open_frames < 100, "door never closed");
                }
                assert_eq!(open_frames, fpt, "fpt {fpt} phase {phase}");
                assert_eq!(max_offset, door::DOOR_MAX_TRAVEL, "fpt {fpt} phase {phase}");
            }
        }
    }

    #[test]
    fn held_key_jumps_once() {
        let cfg = config();
        let mut script = vec![true; 30];
        script.extend([false, false, true, true, true]);
        let mut g = game(&[OPEN_FLOOR], &cfg, &script);
        let events = run_ticks(&mut g, script.len());

        let jumps = actions(&g).iter().filter(|a| **a == Action::Jump).count();
        assert_eq!(jumps, 2);
        assert_eq!(events.iter().filter(|e| **e == GameEvent::RunnerJumped).count(), 2);

        let key_states = g.trace().iter().filter(|e| e.kind == TraceKind::KeyState).count();
        assert_eq!(key_states, 3);
    }

    #[test]
    fn falling_beats_jump_while_airborne() {
        let cfg = config();
        let mut g = game(&[OPEN_FLOOR], &cfg, &[]);
        g.world.runner.y -= 4;
        g.tick();
        assert_eq!(actions(&g), vec![Action::MoveDown]);
    }

    #[test]
    fn slowdown_halves_runner_speed_and_costs_bonus() {
        let cfg = config();
        let mut g = game(&[PILL_FLOOR], &cfg, &[]);
        let events = run_ticks(&mut g, 8);
        assert!(events.contains(&GameEvent::PillCollected { pill: 0 }));
        assert_eq!(g.world.scoring.level_bonus(), 260);

        let x0 = g.world.runner.x;
        run_ticks(&mut g, 20);
        assert_eq!(g.world.runner.x - x0, 10);
    }

    #[test]
    fn slowdown_wears_off() {
        let mut cfg = config();
        cfg.timing.frames_per_timer_tick = 5;
        let mut g = game(&[PILL_FLOOR], &cfg, &[]);
        let events = run_ticks(&mut g, 30);
        assert!(events.contains(&GameEvent::SlowdownEnded { pill: 0 }));
        assert!(!g.world.slowdown_active());
    }

    #[test]
    fn disabled_slowdowns_leave_pills_alone() {
        let mut cfg = config();
        cfg.slowdowns = false;
        let mut g = game(&[PILL_FLOOR], &cfg, &[]);
        let events = run_ticks(&mut g, 20);
        assert!(events.is_empty());
        assert_eq!(g.world.scoring.level_bonus(), 300);
    }

    #[test]
    fn score_decays_and_prints_on_change_only() {
        let mut cfg = config();
        cfg.timing.score_decay_frames = 10;
        let mut g = game(&[OPEN_FLOOR], &cfg, &[]);
        let before = g.world.scoring.level_score();
        g.display_mut().clear();
        run_ticks(&mut g, 20);
        assert_eq!(g.world.scoring.level_score(), before - 2);
        let status_prints = g
            .display()
            .calls
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    crate::platform::recording::Call::Print { area: crate::platform::PrintArea::Status, .. }
                )
            })
            .count();
        // first frame, then one per decrement
        assert_eq!(status_prints, 3);
    }

    #[test]
    fn run_traces_enter_actions_exit_and_commits_each_frame() {
        let cfg = config();
        let defs = vec![parse_level(OPEN_FLOOR).unwrap()];
        let mut input = ScriptedInput::new(&[]);
        input.reset_after = Some(5);
        let mut g = GameLoop::new(&cfg, defs, RecordingDisplay::new(), input, NoWait::default()).unwrap();
        g.run(|_| {}).unwrap();

        let kinds: Vec<TraceKind> = g.trace().iter().map(|e| e.kind).collect();
        let mut expected = vec![TraceKind::Enter];
        expected.extend([TraceKind::Action; 5]);
        expected.push(TraceKind::Exit);
        assert_eq!(kinds, expected);

        let commits = g
            .display()
            .calls
            .iter()
            .filter(|c| **c == crate::platform::recording::Call::Commit)
            .count();
        assert_eq!(commits, 5);
        assert_eq!(g.clock.ticks, 4);
    }

    #[test]
    fn trace_ring_keeps_only_recent_ticks() {
        let mut cfg = config();
        cfg.trace_capacity = 10;
        let mut g = game(&[OPEN_FLOOR], &cfg, &[]);
        run_ticks(&mut g, 25);
        assert_eq!(g.trace().len(), 10);
        let xs: Vec<i32> = g.trace().iter().map(|e| e.x).collect();
        assert!(xs.windows(2).all(|w| w[0] < w[1]));
    }
}

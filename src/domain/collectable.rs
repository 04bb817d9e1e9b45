/// Collectables: pickups with an availability state and an optional
/// countdown timer.
///
/// ## State machine
///
///   Available ──collect──▶ NotAvailable [timer running]
///        ▲                      │
///        └──────timeout─────────┤
///                               └──disarm──▶ Disarmed (absorbing)
///
/// `Invalid` is a static sentinel that ends fixed arrays of collectables
/// in level data. It is never reached from the other states and is never
/// treated as a live object.
///
/// ## Owner contract
///
/// Objects that embed a collectable (doors, slowdown pills) implement
/// `CollectableOwner`. `collect()` and `tick_timer()` run the state change
/// first and then hand control to the owner's callback, so callbacks always
/// observe the post-transition state.
///
/// Timers count in timer ticks. The game loop decides how many frames
/// make one timer tick; each timer keeps its own frame phase, counted
/// from the moment it was started, so a timer of n ticks always runs for
/// exactly n * frames_per_tick frames.

use thiserror::Error;

use crate::platform::Display;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Availability {
    Available,
    NotAvailable,
    Disarmed,
    Invalid,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CollectableError {
    #[error("collectable at ({x},{y}) is not available ({state:?})")]
    NotAvailable { x: u8, y: u8, state: Availability },
    #[error("sentinel collectable cannot be collected")]
    Sentinel,
}

/// Result of advancing a timer by one timer tick.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TimerTick {
    /// No timer running.
    Idle,
    /// Still running, with this many ticks left.
    Running(u16),
    /// Reached zero on this tick; the timeout callback has been invoked.
    Expired,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Timer {
    /// Remaining timer ticks. Never 0.
    ticks: u16,
    /// Frames counted towards the next tick.
    frames: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Collectable {
    /// Grid cell.
    pub x: u8,
    pub y: u8,
    state: Availability,
    /// `None` = stopped.
    timer: Option<Timer>,
}

impl Collectable {
    pub fn new(x: u8, y: u8) -> Self {
        Collectable { x, y, state: Availability::Available, timer: None }
    }

    /// End-of-list marker.
    pub fn sentinel() -> Self {
        Collectable { x: 0, y: 0, state: Availability::Invalid, timer: None }
    }

    #[inline]
    pub fn state(&self) -> Availability {
        self.state
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.state != Availability::Invalid
    }

    #[inline]
    pub fn is_available(&self) -> bool {
        self.state == Availability::Available
    }

    #[cfg(test)]
    pub fn is_timer_running(&self) -> bool {
        self.timer.is_some()
    }

    #[cfg(test)]
    pub fn timer_remaining(&self) -> Option<u16> {
        self.timer.map(|t| t.ticks)
    }

    #[inline]
    pub fn cell(&self) -> (u8, u8) {
        (self.x, self.y)
    }

    /// Set a new availability. Used by owner callbacks.
    pub fn set_state(&mut self, state: Availability) {
        debug_assert!(self.is_valid(), "set_state on sentinel collectable");
        debug_assert!(state != Availability::Invalid, "live collectable cannot become a sentinel");
        debug_assert!(
            self.timer.is_none() || state == Availability::NotAvailable,
            "running timer requires NotAvailable"
        );
        self.state = state;
    }

    /// Available → NotAvailable, optionally starting the timer.
    /// Anything else is refused and leaves the collectable untouched.
    pub fn collect(&mut self, duration: Option<u16>) -> Result<(), CollectableError> {
        match self.state {
            Availability::Available => {
                self.state = Availability::NotAvailable;
                if let Some(ticks) = duration {
                    self.start_timer(ticks);
                }
                Ok(())
            }
            Availability::Invalid => Err(CollectableError::Sentinel),
            state => Err(CollectableError::NotAvailable { x: self.x, y: self.y, state }),
        }
    }

    /// Start (or restart) the countdown. A zero duration expires on the
    /// next timer tick.
    pub fn start_timer(&mut self, ticks: u16) {
        debug_assert_eq!(self.state, Availability::NotAvailable, "timer started while not collected");
        self.timer = Some(Timer { ticks: ticks.max(1), frames: 0 });
    }

    /// Count down one timer tick. Does not invoke any callback; see
    /// `tick_timer()` for the owner-aware version.
    pub fn timer_tick(&mut self) -> TimerTick {
        match &mut self.timer {
            None => TimerTick::Idle,
            Some(t) if t.ticks > 1 => {
                t.ticks -= 1;
                t.frames = 0;
                TimerTick::Running(t.ticks)
            }
            Some(_) => {
                self.timer = None;
                TimerTick::Expired
            }
        }
    }

    /// Count one frame. Every `frames_per_tick` frames since the timer
    /// started, one timer tick elapses.
    pub fn timer_frame(&mut self, frames_per_tick: u32) -> TimerTick {
        match &mut self.timer {
            None => TimerTick::Idle,
            Some(t) => {
                t.frames += 1;
                if t.frames < frames_per_tick.max(1) {
                    TimerTick::Running(t.ticks)
                } else {
                    self.timer_tick()
                }
            }
        }
    }

    /// Stop the timer without a timeout. Safe when nothing is running.
    #[inline]
    pub fn cancel_timer(&mut self) {
        self.timer = None;
    }

    /// Terminal state: no more Available/NotAvailable cycling.
    pub fn disarm(&mut self) {
        debug_assert!(self.is_valid(), "disarm on sentinel collectable");
        self.timer = None;
        self.state = Availability::Disarmed;
    }
}

/// An object built around a collectable. The two callbacks replace the
/// "function pointer + opaque data" pair of a plain C design.
pub trait CollectableOwner {
    fn collectable(&self) -> &Collectable;
    fn collectable_mut(&mut self) -> &mut Collectable;

    /// Called right after the collectable went Available → NotAvailable.
    fn collected(&mut self, display: &mut dyn Display);

    /// Called when the timer reached zero. The owner restores whatever
    /// state it wants. Returned status: 0 leaves the timer stopped,
    /// n > 0 re-arms it for n timer ticks.
    fn timed_out(&mut self, display: &mut dyn Display) -> u8;
}

/// Collect the owner's collectable and run its collection callback.
pub fn collect<O: CollectableOwner + ?Sized>(
    owner: &mut O,
    display: &mut dyn Display,
) -> Result<(), CollectableError> {
    owner.collectable_mut().collect(None)?;
    owner.collected(display);
    Ok(())
}

/// Advance the owner's timer by one whole tick; on expiry run its
/// timeout callback.
pub fn tick_timer<O: CollectableOwner + ?Sized>(owner: &mut O, display: &mut dyn Display) -> TimerTick {
    frame_timer(owner, display, 1)
}

/// Advance the owner's timer by one frame; on expiry run its timeout
/// callback.
pub fn frame_timer<O: CollectableOwner + ?Sized>(
    owner: &mut O,
    display: &mut dyn Display,
    frames_per_tick: u32,
) -> TimerTick {
    let tick = owner.collectable_mut().timer_frame(frames_per_tick);
    if tick == TimerTick::Expired {
        let rearm = owner.timed_out(display);
        if rearm > 0 {
            owner.collectable_mut().start_timer(u16::from(rearm));
        }
    }
    tick
}

/// Live entries of a level array: everything before the first sentinel.
pub fn live<O: CollectableOwner>(items: &[O]) -> impl Iterator<Item = &O> {
    items.iter().take_while(|o| o.collectable().is_valid())
}

pub fn live_mut<O: CollectableOwner>(items: &mut [O]) -> impl Iterator<Item = &mut O> {
    items.iter_mut().take_while(|o| o.collectable().is_valid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::recording::RecordingDisplay;

    /// Minimal owner: counts callbacks, optionally re-arms once.
    struct Owner {
        c: Collectable,
        collected: u32,
        timeouts: u32,
        rearm: u8,
    }

    impl Owner {
        fn new() -> Self {
            Owner { c: Collectable::new(3, 4), collected: 0, timeouts: 0, rearm: 0 }
        }
    }

    impl CollectableOwner for Owner {
        fn collectable(&self) -> &Collectable { &self.c }
        fn collectable_mut(&mut self) -> &mut Collectable { &mut self.c }
        fn collected(&mut self, _display: &mut dyn Display) {
            self.collected += 1;
            self.c.start_timer(2);
        }
        fn timed_out(&mut self, _display: &mut dyn Display) -> u8 {
            self.timeouts += 1;
            let status = self.rearm;
            self.rearm = 0;
            if status == 0 {
                self.c.set_state(Availability::Available);
            }
            status
        }
    }

    #[test]
    fn collect_moves_to_not_available() {
        let mut c = Collectable::new(1, 2);
        assert!(c.collect(None).is_ok());
        assert_eq!(c.state(), Availability::NotAvailable);
        assert!(!c.is_timer_running());
    }

    #[test]
    fn collect_with_duration_starts_timer() {
        let mut c = Collectable::new(1, 2);
        c.collect(Some(5)).unwrap();
        assert_eq!(c.timer_remaining(), Some(5));
    }

    #[test]
    fn collect_twice_is_refused() {
        let mut c = Collectable::new(1, 2);
        c.collect(Some(4)).unwrap();
        let err = c.collect(Some(9)).unwrap_err();
        assert_eq!(
            err,
            CollectableError::NotAvailable { x: 1, y: 2, state: Availability::NotAvailable }
        );
        assert_eq!(c.timer_remaining(), Some(4)); // untouched
    }

    #[test]
    fn sentinel_refuses_collect() {
        let mut c = Collectable::sentinel();
        assert!(!c.is_valid());
        assert_eq!(c.collect(None), Err(CollectableError::Sentinel));
    }

    #[test]
    fn timer_counts_down_then_expires() {
        let mut c = Collectable::new(0, 0);
        c.collect(Some(3)).unwrap();
        assert_eq!(c.timer_tick(), TimerTick::Running(2));
        assert_eq!(c.timer_tick(), TimerTick::Running(1));
        assert_eq!(c.timer_tick(), TimerTick::Expired);
        assert_eq!(c.timer_tick(), TimerTick::Idle);
        assert!(!c.is_timer_running());
    }

    #[test]
    fn frame_timer_counts_from_its_own_start() {
        let mut d = RecordingDisplay::new();
        let mut p = Owner::new();
        collect(&mut p, &mut d).unwrap();

        // 2 ticks of 4 frames: expires on the 8th frame after collection.
        for frame in 1..8 {
            assert_ne!(frame_timer(&mut p, &mut d, 4), TimerTick::Expired, "frame {frame}");
        }
        assert_eq!(p.c.timer_remaining(), Some(1));
        assert_eq!(frame_timer(&mut p, &mut d, 4), TimerTick::Expired);
        assert_eq!(p.timeouts, 1);
    }

    #[test]
    fn restart_resets_the_frame_phase() {
        let mut c = Collectable::new(0, 0);
        c.collect(Some(1)).unwrap();
        assert_eq!(c.timer_frame(3), TimerTick::Running(1));
        assert_eq!(c.timer_frame(3), TimerTick::Running(1));
        c.start_timer(1);
        assert_eq!(c.timer_frame(3), TimerTick::Running(1));
        assert_eq!(c.timer_frame(3), TimerTick::Running(1));
        assert_eq!(c.timer_frame(3), TimerTick::Expired);
    }

    #[test]
    fn cancel_without_timer_is_noop() {
        let mut c = Collectable::new(0, 0);
        let before = c.clone();
        c.cancel_timer();
        assert_eq!(c, before);
    }

    #[test]
    fn disarm_clears_timer() {
        let mut c = Collectable::new(0, 0);
        c.collect(Some(3)).unwrap();
        c.disarm();
        assert_eq!(c.state(), Availability::Disarmed);
        assert!(!c.is_timer_running());
        assert!(c.collect(None).is_err());
    }

    #[test]
    fn owner_callbacks_fire_in_order() {
        let mut d = RecordingDisplay::new();
        let mut p = Owner::new();
        collect(&mut p, &mut d).unwrap();
        assert_eq!(p.collected, 1);
        assert_eq!(p.c.timer_remaining(), Some(2));

        assert_eq!(tick_timer(&mut p, &mut d), TimerTick::Running(1));
        assert_eq!(p.timeouts, 0);
        assert_eq!(tick_timer(&mut p, &mut d), TimerTick::Expired);
        assert_eq!(p.timeouts, 1);
        assert!(p.c.is_available());
    }

    #[test]
    fn failed_collect_skips_callback() {
        let mut d = RecordingDisplay::new();
        let mut p = Owner::new();
        p.c.disarm();
        assert!(collect(&mut p, &mut d).is_err());
        assert_eq!(p.collected, 0);
    }

    #[test]
    fn nonzero_timeout_status_rearms() {
        let mut d = RecordingDisplay::new();
        let mut p = Owner::new();
        p.rearm = 3;
        collect(&mut p, &mut d).unwrap();
        tick_timer(&mut p, &mut d);
        assert_eq!(tick_timer(&mut p, &mut d), TimerTick::Expired);
        assert_eq!(p.c.timer_remaining(), Some(3));
        assert_eq!(p.c.state(), Availability::NotAvailable);
    }

    #[test]
    fn live_stops_at_first_sentinel() {
        let mut items = vec![Owner::new(), Owner::new(), Owner::new()];
        items[1].c = Collectable::sentinel();
        assert_eq!(live(&items).count(), 1);
        assert_eq!(live_mut(&mut items).count(), 1);
    }
}

/// Events emitted during a game loop tick.
/// The presentation layer consumes these for sound and logging.

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GameEvent {
    KeyCollected { door: usize },
    DoorClosing { door: usize },
    DoorPassed { door: usize },
    PillCollected { pill: usize },
    SlowdownEnded { pill: usize },
    RunnerJumped,
    LevelComplete { level: usize },
}

/// The closed set of per-tick effects on the runner.
/// Exactly one is selected each tick.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Action {
    #[default]
    NoAction,
    ToggleDirection,
    Jump,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
}

impl Action {
    pub fn is_some(self) -> bool {
        self != Action::NoAction
    }
}

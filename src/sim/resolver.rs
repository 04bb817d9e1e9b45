/// Action resolver: one action per tick from an ordered list of tests.
///
/// Each test looks at the world and either proposes an action or returns
/// `NoAction`. The first proposal wins and later tests are not run, so
/// the list order is the tie-break: falling beats jumping, jumping beats
/// turning round, turning beats running on.
///
/// Tests only read. The winning action is applied afterwards, in one
/// place, by the game loop.

use crate::domain::action::Action;
use crate::domain::runner::Facing;
use crate::sim::world::WorldState;

pub type ActionTest<S> = fn(&S) -> Action;

/// First non-`NoAction` result, or `NoAction` if every test declines.
pub fn resolve<S: ?Sized, F: Fn(&S) -> Action>(tests: &[F], state: &S) -> Action {
    tests
        .iter()
        .map(|test| test(state))
        .find(|action| action.is_some())
        .unwrap_or(Action::NoAction)
}

/// The game's tests, highest priority first.
pub const GAME_ACTIONS: [ActionTest<WorldState>; 4] = [
    test_for_falling,
    test_for_start_jump,
    test_for_direction_change,
    move_sideways,
];

pub fn test_for_falling(world: &WorldState) -> Action {
    if !world.runner.is_jumping() && !world.runner.on_floor(world) {
        Action::MoveDown
    } else {
        Action::NoAction
    }
}

pub fn test_for_start_jump(world: &WorldState) -> Action {
    if world.key_pressed
        && !world.key_processed
        && !world.runner.is_jumping()
        && world.runner.on_floor(world)
    {
        Action::Jump
    } else {
        Action::NoAction
    }
}

pub fn test_for_direction_change(world: &WorldState) -> Action {
    if world.runner.wall_ahead(world) {
        Action::ToggleDirection
    } else {
        Action::NoAction
    }
}

pub fn move_sideways(world: &WorldState) -> Action {
    match world.runner.facing {
        Facing::Left => Action::MoveLeft,
        Facing::Right => Action::MoveRight,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::runner::Runner;
    use crate::domain::tile::Tile;
    use proptest::prelude::*;

    /// 6x4 room, floor on row 3, wall at (5, 2).
    fn world() -> WorldState {
        let mut w = WorldState::new();
        w.width = 6;
        w.height = 4;
        w.tiles = vec![vec![Tile::Empty; 6]; 4];
        w.tiles[3] = vec![Tile::Wall; 6];
        w.tiles[2][5] = Tile::Wall;
        w.runner = Runner::at_cell(1, 2);
        w
    }

    #[test]
    fn runs_when_nothing_else_applies() {
        let w = world();
        assert_eq!(resolve(&GAME_ACTIONS, &w), Action::MoveRight);
    }

    #[test]
    fn falling_beats_jumping() {
        let mut w = world();
        w.runner = Runner::at_cell(1, 0);
        w.key_pressed = true;
        assert_eq!(resolve(&GAME_ACTIONS, &w), Action::MoveDown);
    }

    #[test]
    fn fresh_press_on_floor_jumps() {
        let mut w = world();
        w.key_pressed = true;
        assert_eq!(resolve(&GAME_ACTIONS, &w), Action::Jump);
        w.key_processed = true;
        assert_eq!(resolve(&GAME_ACTIONS, &w), Action::MoveRight);
    }

    #[test]
    fn turns_at_walls() {
        let mut w = world();
        w.runner = Runner::at_cell(4, 2);
        assert_eq!(resolve(&GAME_ACTIONS, &w), Action::ToggleDirection);
        w.runner.toggle_direction();
        assert_eq!(resolve(&GAME_ACTIONS, &w), Action::MoveLeft);
    }

    #[test]
    fn empty_list_gives_no_action() {
        let tests: [ActionTest<WorldState>; 0] = [];
        assert_eq!(resolve(&tests, &world()), Action::NoAction);
    }

    #[test]
    fn later_tests_are_not_run() {
        use std::cell::Cell;
        let calls = Cell::new(0);
        let tests: Vec<Box<dyn Fn(&()) -> Action + '_>> = vec![
            Box::new(|_: &()| Action::Jump),
            Box::new(|_: &()| {
                calls.set(calls.get() + 1);
                Action::MoveLeft
            }),
        ];
        assert_eq!(resolve(&tests, &()), Action::Jump);
        assert_eq!(calls.get(), 0);
    }

    fn action() -> impl Strategy<Value = Action> {
        prop_oneof![
            Just(Action::NoAction),
            Just(Action::ToggleDirection),
            Just(Action::Jump),
            Just(Action::MoveUp),
            Just(Action::MoveDown),
            Just(Action::MoveLeft),
            Just(Action::MoveRight),
        ]
    }

    proptest! {
        #[test]
        fn first_proposal_wins(results in proptest::collection::vec(action(), 0..8)) {
            let tests: Vec<Box<dyn Fn(&()) -> Action>> = results
                .iter()
                .map(|&a| Box::new(move |_: &()| a) as Box<dyn Fn(&()) -> Action>)
                .collect();
            let expected = results
                .iter()
                .copied()
                .find(|a| a.is_some())
                .unwrap_or(Action::NoAction);
            prop_assert_eq!(resolve(&tests, &()), expected);
        }
    }
}

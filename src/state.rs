//! Top-level game state machine.

use std::fmt;

/// Which screen the game is on. Drives both update branching and draw dispatch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GameState {
    #[default]
    MainMenu,
    GamePlay,
    GameOver,
    Exit,
}

/// Something that may move the game to another state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateEvent {
    PlayClicked,
    QuitClicked,
    EscapePressed,
    PlayerFell,
    RestartPressed,
}

impl GameState {
    /// The state after `event`. Events that do not apply leave the state unchanged.
    ///
    /// Escape exits from anywhere and `Exit` is terminal.
    pub fn next(self, event: StateEvent) -> GameState {
        use GameState::*;
        use StateEvent::*;

        match (self, event) {
            (Exit, _) => Exit,
            (_, EscapePressed) => Exit,
            (MainMenu, PlayClicked) => GamePlay,
            (MainMenu, QuitClicked) => Exit,
            (GamePlay, PlayerFell) => GameOver,
            (GameOver, RestartPressed) => GamePlay,
            (state, _) => state,
        }
    }

    pub fn is_exit(self) -> bool {
        self == GameState::Exit
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GameState::MainMenu => "main menu",
            GameState::GamePlay => "gameplay",
            GameState::GameOver => "game over",
            GameState::Exit => "exit",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_in_main_menu() {
        assert_eq!(GameState::default(), GameState::MainMenu);
    }

    #[test]
    fn menu_transitions() {
        let menu = GameState::MainMenu;
        assert_eq!(menu.next(StateEvent::PlayClicked), GameState::GamePlay);
        assert_eq!(menu.next(StateEvent::QuitClicked), GameState::Exit);
        assert_eq!(menu.next(StateEvent::PlayerFell), GameState::MainMenu);
        assert_eq!(menu.next(StateEvent::RestartPressed), GameState::MainMenu);
    }

    #[test]
    fn falling_ends_the_run_and_enter_restarts() {
        let over = GameState::GamePlay.next(StateEvent::PlayerFell);
        assert_eq!(over, GameState::GameOver);
        assert_eq!(over.next(StateEvent::PlayClicked), GameState::GameOver);
        assert_eq!(over.next(StateEvent::RestartPressed), GameState::GamePlay);
    }

    #[test]
    fn clicks_are_ignored_outside_the_menu() {
        assert_eq!(
            GameState::GamePlay.next(StateEvent::QuitClicked),
            GameState::GamePlay
        );
        assert_eq!(
            GameState::GamePlay.next(StateEvent::PlayClicked),
            GameState::GamePlay
        );
    }

    #[test]
    fn escape_exits_from_every_state() {
        for state in [
            GameState::MainMenu,
            GameState::GamePlay,
            GameState::GameOver,
            GameState::Exit,
        ] {
            assert!(state.next(StateEvent::EscapePressed).is_exit());
        }
    }

    #[test]
    fn exit_is_terminal() {
        assert_eq!(
            GameState::Exit.next(StateEvent::RestartPressed),
            GameState::Exit
        );
        assert_eq!(GameState::Exit.next(StateEvent::PlayClicked), GameState::Exit);
    }
}

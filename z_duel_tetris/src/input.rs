use console::Key;

use crate::tetris::Action;

/// What a key press asks for
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Input {
    Game(Action),
    // Space: hard drop while playing, restart otherwise
    DropOrRestart,
    Restart,
    // Zero based index into the discovered peer list
    SelectPeer(usize),
    Quit,
}

pub fn map_key(key: &Key) -> Option<Input> {
    let input = match key {
        Key::ArrowLeft | Key::Char('a') | Key::Char('A') => Input::Game(Action::MoveLeft),
        Key::ArrowRight | Key::Char('d') | Key::Char('D') => Input::Game(Action::MoveRight),
        Key::ArrowUp | Key::Char('w') | Key::Char('W') => Input::Game(Action::Rotate),
        Key::ArrowDown | Key::Char('s') | Key::Char('S') => Input::Game(Action::SoftDrop),
        Key::Char(' ') => Input::DropOrRestart,
        Key::Escape | Key::Char('p') | Key::Char('P') => Input::Game(Action::Pause),
        Key::Char('r') | Key::Char('R') => Input::Restart,
        Key::Char('q') | Key::Char('Q') => Input::Quit,
        Key::Char(c @ '1'..='9') => Input::SelectPeer(*c as usize - '1' as usize),
        _ => return None,
    };
    Some(input)
}

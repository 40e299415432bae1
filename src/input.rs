use std::collections::HashSet;

use glam::Vec2;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Raw keyboard and mouse state, updated from window events.
///
/// Keys are polled by `KeyCode`. Edge detection is left to [`EdgeTrigger`], which
/// the game samples exactly once per update.
pub struct Input {
    keys_down: HashSet<KeyCode>,
    mouse_buttons_down: HashSet<MouseButton>,
    mouse_position: Vec2,
}

impl Default for Input {
    fn default() -> Self {
        Self {
            keys_down: HashSet::new(),
            mouse_buttons_down: HashSet::new(),
            mouse_position: Vec2::ZERO,
        }
    }
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a window event and update input state.
    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    self.set_key(key, event.state == ElementState::Pressed);
                }
            }
            WindowEvent::MouseInput { state, button, .. } => match state {
                ElementState::Pressed => {
                    self.mouse_buttons_down.insert(*button);
                }
                ElementState::Released => {
                    self.mouse_buttons_down.remove(button);
                }
            },
            WindowEvent::CursorMoved { position, .. } => {
                self.mouse_position = Vec2::new(position.x as f32, position.y as f32);
            }
            WindowEvent::Focused(false) => {
                self.keys_down.clear();
                self.mouse_buttons_down.clear();
            }
            _ => {}
        }
    }

    /// Mark a key as held or released.
    pub fn set_key(&mut self, key: KeyCode, down: bool) {
        if down {
            self.keys_down.insert(key);
        } else {
            self.keys_down.remove(&key);
        }
    }

    /// Returns true if the key is currently held down.
    pub fn key_down(&self, key: KeyCode) -> bool {
        self.keys_down.contains(&key)
    }

    /// Returns true if the mouse button is currently held down.
    pub fn mouse_down(&self, button: MouseButton) -> bool {
        self.mouse_buttons_down.contains(&button)
    }

    /// Current mouse position in window coordinates.
    pub fn mouse_position(&self) -> Vec2 {
        self.mouse_position
    }
}

/// Rising-edge detector over a polled boolean.
///
/// Holds the previous and current samples. Feed it one sample per frame with
/// [`update`](Self::update); it reports `true` only on the frame the signal goes
/// from released to held.
#[derive(Clone, Copy, Debug, Default)]
pub struct EdgeTrigger {
    previous: bool,
    current: bool,
}

impl EdgeTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record this frame's sample and return whether it is a rising edge.
    pub fn update(&mut self, down: bool) -> bool {
        self.previous = self.current;
        self.current = down;
        self.rising()
    }

    /// Whether the latest sample was a rising edge.
    pub fn rising(&self) -> bool {
        self.current && !self.previous
    }

    /// Whether the latest sample was held.
    pub fn held(&self) -> bool {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_trigger_fires_once_per_press() {
        let mut trigger = EdgeTrigger::new();
        let samples = [false, true, true, true, false, true, false];
        let fired: Vec<bool> = samples.iter().map(|&s| trigger.update(s)).collect();
        assert_eq!(fired, vec![false, true, false, false, false, true, false]);
    }

    #[test]
    fn edge_trigger_starting_held_counts_as_press() {
        let mut trigger = EdgeTrigger::new();
        assert!(trigger.update(true));
        assert!(trigger.held());
        assert!(!trigger.update(true));
    }

    #[test]
    fn key_state_tracks_press_and_release() {
        let mut input = Input::new();
        input.set_key(KeyCode::KeyA, true);
        assert!(input.key_down(KeyCode::KeyA));
        assert!(!input.key_down(KeyCode::KeyD));
        input.set_key(KeyCode::KeyA, false);
        assert!(!input.key_down(KeyCode::KeyA));
    }
}

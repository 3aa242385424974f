//! Input management system
//!
//! The render core never polls a window itself. The camera receives an
//! [`InputProvider`] for every `control` call; [`InputManager`] is the
//! in-memory provider fed by the application's event loop (or by a script in
//! tests and the demo).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::foundation::math::Vec2;

/// Source of per-frame input state
pub trait InputProvider {
    /// Wheel offset accumulated since the previous frame
    fn wheel_scroll(&self) -> Vec2;

    /// Cursor position in window pixels, origin top-left
    fn mouse_position(&self) -> Vec2;

    /// Whether a key is currently held
    fn key_pressed(&self, key: KeyCode) -> bool;

    /// Whether a mouse button is currently held
    fn mouse_pressed(&self, button: MouseButton) -> bool;
}

/// Input manager
///
/// Tracks held keys and buttons, the cursor position and the wheel offset of
/// the current frame.
#[derive(Debug)]
pub struct InputManager {
    keys: HashSet<KeyCode>,
    buttons: HashSet<MouseButton>,
    mouse_position: Vec2,
    wheel: Vec2,
}

impl InputManager {
    /// Create a new input manager
    pub fn new() -> Self {
        Self {
            keys: HashSet::new(),
            buttons: HashSet::new(),
            mouse_position: Vec2::zeros(),
            wheel: Vec2::zeros(),
        }
    }

    /// Start a new frame; wheel offsets do not carry over
    pub fn update(&mut self) {
        self.wheel = Vec2::zeros();
    }

    /// Handle key input
    pub fn handle_key_input(&mut self, key: KeyCode, pressed: bool) {
        if pressed {
            self.keys.insert(key);
        } else {
            self.keys.remove(&key);
        }
    }

    /// Handle mouse button input
    pub fn handle_mouse_button(&mut self, button: MouseButton, pressed: bool) {
        if pressed {
            self.buttons.insert(button);
        } else {
            self.buttons.remove(&button);
        }
    }

    /// Handle mouse movement
    pub fn handle_mouse_move(&mut self, x: f32, y: f32) {
        self.mouse_position = Vec2::new(x, y);
    }

    /// Handle wheel scrolling
    pub fn handle_scroll(&mut self, x: f32, y: f32) {
        self.wheel += Vec2::new(x, y);
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

impl InputProvider for InputManager {
    fn wheel_scroll(&self) -> Vec2 {
        self.wheel
    }

    fn mouse_position(&self) -> Vec2 {
        self.mouse_position
    }

    fn key_pressed(&self, key: KeyCode) -> bool {
        self.keys.contains(&key)
    }

    fn mouse_pressed(&self, button: MouseButton) -> bool {
        self.buttons.contains(&button)
    }
}

/// Key codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    /// A key
    A,
    /// D key
    D,
    /// E key
    E,
    /// Q key
    Q,
    /// S key
    S,
    /// W key
    W,
    /// Space key
    Space,
    /// Left shift key
    LeftShift,
    /// Left control key
    LeftControl,
    /// Enter key
    Enter,
    /// Escape key
    Escape,
    /// Up arrow
    Up,
    /// Down arrow
    Down,
    /// Left arrow
    Left,
    /// Right arrow
    Right,
}

/// Mouse buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    /// Left mouse button
    Left,
    /// Right mouse button
    Right,
    /// Middle mouse button
    Middle,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_and_button_state() {
        let mut input = InputManager::new();
        input.handle_key_input(KeyCode::W, true);
        input.handle_mouse_button(MouseButton::Right, true);

        assert!(input.key_pressed(KeyCode::W));
        assert!(!input.key_pressed(KeyCode::S));
        assert!(input.mouse_pressed(MouseButton::Right));

        input.handle_key_input(KeyCode::W, false);
        assert!(!input.key_pressed(KeyCode::W));
    }

    #[test]
    fn test_wheel_resets_each_frame() {
        let mut input = InputManager::new();
        input.handle_scroll(0.0, 1.0);
        input.handle_scroll(0.0, 2.0);
        assert_eq!(input.wheel_scroll(), Vec2::new(0.0, 3.0));

        input.update();
        assert_eq!(input.wheel_scroll(), Vec2::zeros());
    }
}

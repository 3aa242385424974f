//! GLFW window with a current OpenGL 4.5 core context
//!
//! The window owns the context [`GlBackend`] renders into and translates
//! GLFW events into [`InputManager`] state for the camera.

use glfw::{Action, Context};
use thiserror::Error;

pub use glfw::{Key, WindowEvent};

use super::backend::GlBackend;
use crate::input::{InputManager, KeyCode, MouseButton};

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// GLFW could not be initialised
    #[error("GLFW initialization failed: {0}")]
    InitializationFailed(String),

    /// The window or its context could not be created
    #[error("Window creation failed")]
    CreationFailed,
}

/// Result alias for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// GLFW window whose context stays current on the creating thread
pub struct GlWindow {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, WindowEvent)>,
}

impl GlWindow {
    /// Open a resizable window and make its context current
    pub fn new(title: &str, width: u32, height: u32) -> WindowResult<Self> {
        let mut glfw = glfw::init(glfw::fail_on_errors).map_err(|err| WindowError::InitializationFailed(format!("{err:?}")))?;

        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::OpenGl));
        glfw.window_hint(glfw::WindowHint::ContextVersion(4, 5));
        glfw.window_hint(glfw::WindowHint::OpenGlProfile(glfw::OpenGlProfileHint::Core));
        glfw.window_hint(glfw::WindowHint::OpenGlForwardCompat(true));
        glfw.window_hint(glfw::WindowHint::Resizable(true));

        let (mut window, events) = glfw
            .create_window(width, height, title, glfw::WindowMode::Windowed)
            .ok_or(WindowError::CreationFailed)?;

        window.make_current();
        glfw.set_swap_interval(glfw::SwapInterval::Sync(1));

        window.set_key_polling(true);
        window.set_mouse_button_polling(true);
        window.set_cursor_pos_polling(true);
        window.set_scroll_polling(true);
        window.set_close_polling(true);
        window.set_framebuffer_size_polling(true);

        log::info!("Window '{title}' opened at {width}x{height}");
        Ok(Self { glfw, window, events })
    }

    /// Load a device from this window's context
    #[allow(unsafe_code)]
    pub fn create_backend(&mut self) -> GlBackend {
        self.window.make_current();
        let window = &mut self.window;
        unsafe { GlBackend::from_loader_function(|name| window.get_proc_address(name) as *const _) }
    }

    /// Whether the user asked to close the window
    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Request or cancel closing
    pub fn set_should_close(&mut self, should_close: bool) {
        self.window.set_should_close(should_close);
    }

    /// Pump the event queue and return everything received since the last call
    pub fn poll_events(&mut self) -> Vec<WindowEvent> {
        self.glfw.poll_events();
        glfw::flush_messages(&self.events).map(|(_, event)| event).collect()
    }

    /// Present the default framebuffer
    pub fn swap_buffers(&mut self) {
        self.window.swap_buffers();
    }

    /// Drawable size in pixels
    pub fn framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (u32::try_from(width).unwrap_or(0), u32::try_from(height).unwrap_or(0))
    }

    /// Seconds since GLFW was initialised
    pub fn time(&self) -> f64 {
        self.glfw.get_time()
    }
}

/// Camera key bound to a GLFW key
pub const fn key_code(key: Key) -> Option<KeyCode> {
    Some(match key {
        Key::A => KeyCode::A,
        Key::D => KeyCode::D,
        Key::E => KeyCode::E,
        Key::Q => KeyCode::Q,
        Key::S => KeyCode::S,
        Key::W => KeyCode::W,
        Key::Space => KeyCode::Space,
        Key::LeftShift => KeyCode::LeftShift,
        Key::LeftControl => KeyCode::LeftControl,
        Key::Enter => KeyCode::Enter,
        Key::Escape => KeyCode::Escape,
        Key::Up => KeyCode::Up,
        Key::Down => KeyCode::Down,
        Key::Left => KeyCode::Left,
        Key::Right => KeyCode::Right,
        _ => return None,
    })
}

/// Camera mouse button bound to a GLFW button
pub const fn mouse_button(button: glfw::MouseButton) -> Option<MouseButton> {
    match button {
        glfw::MouseButton::Button1 => Some(MouseButton::Left),
        glfw::MouseButton::Button2 => Some(MouseButton::Right),
        glfw::MouseButton::Button3 => Some(MouseButton::Middle),
        _ => None,
    }
}

/// Feed one window event into the input state; unrelated events are ignored
pub fn forward_event(input: &mut InputManager, event: &WindowEvent) {
    match *event {
        WindowEvent::Key(key, _, action, _) => {
            if let Some(key) = key_code(key) {
                input.handle_key_input(key, action != Action::Release);
            }
        }
        WindowEvent::MouseButton(button, action, _) => {
            if let Some(button) = mouse_button(button) {
                input.handle_mouse_button(button, action != Action::Release);
            }
        }
        WindowEvent::CursorPos(x, y) => input.handle_mouse_move(x as f32, y as f32),
        WindowEvent::Scroll(x, y) => input.handle_scroll(x as f32, y as f32),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputProvider;

    #[test]
    fn test_repeat_keeps_key_held() {
        let mut input = InputManager::new();
        let modifiers = glfw::Modifiers::empty();

        forward_event(&mut input, &WindowEvent::Key(Key::W, 17, Action::Press, modifiers));
        forward_event(&mut input, &WindowEvent::Key(Key::W, 17, Action::Repeat, modifiers));
        assert!(input.key_pressed(KeyCode::W));

        forward_event(&mut input, &WindowEvent::Key(Key::W, 17, Action::Release, modifiers));
        assert!(!input.key_pressed(KeyCode::W));
    }

    #[test]
    fn test_mouse_events_reach_input() {
        let mut input = InputManager::new();
        forward_event(
            &mut input,
            &WindowEvent::MouseButton(glfw::MouseButton::Button2, Action::Press, glfw::Modifiers::empty()),
        );
        forward_event(&mut input, &WindowEvent::CursorPos(120.0, 45.0));

        assert!(input.mouse_pressed(MouseButton::Right));
        assert_eq!(input.mouse_position(), crate::foundation::math::Vec2::new(120.0, 45.0));
    }

    #[test]
    fn test_unbound_keys_are_ignored() {
        assert_eq!(key_code(Key::F1), None);
        assert_eq!(mouse_button(glfw::MouseButton::Button5), None);
        assert_eq!(key_code(Key::LeftShift), Some(KeyCode::LeftShift));
    }
}

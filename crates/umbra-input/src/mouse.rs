//! Frame-coherent mouse state.
//!
//! Tracks cursor position, per-frame motion, button transitions, and wheel
//! scroll. Camera look in the viewer is drag based, so there is no cursor
//! capture.

use glam::Vec2;
use winit::event::{ElementState, MouseButton, MouseScrollDelta};

#[derive(Debug, Clone, Copy, Default)]
struct ButtonFrame {
    pressed: bool,
    just_pressed: bool,
    just_released: bool,
}

fn button_index(button: MouseButton) -> usize {
    match button {
        MouseButton::Left => 0,
        MouseButton::Right => 1,
        MouseButton::Middle => 2,
        MouseButton::Back | MouseButton::Forward | MouseButton::Other(_) => 3,
    }
}

/// Pixels of trackpad scroll treated as one wheel line.
const PIXELS_PER_LINE: f64 = 40.0;

#[derive(Debug, Clone, Default)]
pub struct MouseState {
    position: Option<Vec2>,
    delta: Vec2,
    buttons: [ButtonFrame; 4],
    scroll: f32,
}

impl MouseState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a `CursorMoved` event. The first position seen produces no delta.
    pub fn on_cursor_moved(&mut self, x: f64, y: f64) {
        let new_pos = Vec2::new(x as f32, y as f32);
        if let Some(prev) = self.position {
            self.delta += new_pos - prev;
        }
        self.position = Some(new_pos);
    }

    /// Process a `CursorLeft` event; the next entry must not jump the camera.
    pub fn on_cursor_left(&mut self) {
        self.position = None;
    }

    pub fn on_button(&mut self, button: MouseButton, state: ElementState) {
        let b = &mut self.buttons[button_index(button)];
        match state {
            ElementState::Pressed => {
                b.pressed = true;
                b.just_pressed = true;
            }
            ElementState::Released => {
                b.pressed = false;
                b.just_released = true;
            }
        }
    }

    pub fn on_scroll(&mut self, delta: MouseScrollDelta) {
        match delta {
            MouseScrollDelta::LineDelta(_x, y) => self.scroll += y,
            MouseScrollDelta::PixelDelta(pos) => self.scroll += (pos.y / PIXELS_PER_LINE) as f32,
        }
    }

    /// Clears delta, scroll, and button transitions. Call at end of frame.
    pub fn clear_transients(&mut self) {
        self.delta = Vec2::ZERO;
        self.scroll = 0.0;
        for b in &mut self.buttons {
            b.just_pressed = false;
            b.just_released = false;
        }
    }

    #[must_use]
    pub fn position(&self) -> Option<Vec2> {
        self.position
    }

    /// Cursor motion accumulated since the last clear.
    #[must_use]
    pub fn delta(&self) -> Vec2 {
        self.delta
    }

    #[must_use]
    pub fn is_button_pressed(&self, button: MouseButton) -> bool {
        self.buttons[button_index(button)].pressed
    }

    #[must_use]
    pub fn just_button_pressed(&self, button: MouseButton) -> bool {
        self.buttons[button_index(button)].just_pressed
    }

    #[must_use]
    pub fn just_button_released(&self, button: MouseButton) -> bool {
        self.buttons[button_index(button)].just_released
    }

    /// Wheel lines accumulated this frame (positive = up).
    #[must_use]
    pub fn scroll(&self) -> f32 {
        self.scroll
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_move_has_no_delta() {
        let mut ms = MouseState::new();
        ms.on_cursor_moved(100.0, 200.0);
        assert_eq!(ms.position(), Some(Vec2::new(100.0, 200.0)));
        assert_eq!(ms.delta(), Vec2::ZERO);
    }

    #[test]
    fn test_delta_accumulates_across_moves() {
        let mut ms = MouseState::new();
        ms.on_cursor_moved(100.0, 200.0);
        ms.clear_transients();
        ms.on_cursor_moved(105.0, 198.0);
        ms.on_cursor_moved(110.0, 195.0);
        assert_eq!(ms.delta(), Vec2::new(10.0, -5.0));
    }

    #[test]
    fn test_cursor_left_resets_anchor() {
        let mut ms = MouseState::new();
        ms.on_cursor_moved(10.0, 10.0);
        ms.on_cursor_left();
        ms.on_cursor_moved(500.0, 500.0);
        assert_eq!(ms.delta(), Vec2::ZERO);
    }

    #[test]
    fn test_button_transitions() {
        let mut ms = MouseState::new();
        ms.on_button(MouseButton::Left, ElementState::Pressed);
        assert!(ms.is_button_pressed(MouseButton::Left));
        assert!(ms.just_button_pressed(MouseButton::Left));
        ms.clear_transients();
        assert!(!ms.just_button_pressed(MouseButton::Left));

        ms.on_button(MouseButton::Left, ElementState::Released);
        assert!(!ms.is_button_pressed(MouseButton::Left));
        assert!(ms.just_button_released(MouseButton::Left));
    }

    #[test]
    fn test_scroll_accumulates_and_clears() {
        let mut ms = MouseState::new();
        ms.on_scroll(MouseScrollDelta::LineDelta(0.0, 1.0));
        ms.on_scroll(MouseScrollDelta::LineDelta(0.0, 0.5));
        assert!((ms.scroll() - 1.5).abs() < f32::EPSILON);
        ms.clear_transients();
        assert_eq!(ms.scroll(), 0.0);
    }
}

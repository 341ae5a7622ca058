//! Frame-coherent keyboard state.
//!
//! Physical key codes are used so WASD works on any layout.

use std::collections::HashSet;

use winit::event::{ElementState, KeyEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Minimal description of a key event, constructible without a window.
#[derive(Debug, Clone, Copy)]
pub struct RawKeyEvent {
    pub key: PhysicalKey,
    pub state: ElementState,
    pub repeat: bool,
}

/// Held / just-pressed / just-released sets for physical keys.
///
/// Forward events with [`process_event`](Self::process_event), query, then
/// call [`clear_transients`](Self::clear_transients) once per frame.
#[derive(Debug, Clone, Default)]
pub struct KeyboardState {
    pressed: HashSet<PhysicalKey>,
    just_pressed: HashSet<PhysicalKey>,
    just_released: HashSet<PhysicalKey>,
}

impl KeyboardState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Processes a winit [`KeyEvent`]. Repeat events are ignored.
    pub fn process_event(&mut self, event: &KeyEvent) {
        self.process_raw(RawKeyEvent {
            key: event.physical_key,
            state: event.state,
            repeat: event.repeat,
        });
    }

    pub fn process_raw(&mut self, event: RawKeyEvent) {
        if event.repeat {
            return;
        }
        match event.state {
            ElementState::Pressed => {
                if self.pressed.insert(event.key) {
                    self.just_pressed.insert(event.key);
                }
            }
            ElementState::Released => {
                if self.pressed.remove(&event.key) {
                    self.just_released.insert(event.key);
                }
            }
        }
    }

    #[must_use]
    pub fn is_pressed(&self, key: PhysicalKey) -> bool {
        self.pressed.contains(&key)
    }

    /// Convenience for [`KeyCode`] lookups.
    #[must_use]
    pub fn is_code_pressed(&self, code: KeyCode) -> bool {
        self.is_pressed(PhysicalKey::Code(code))
    }

    #[must_use]
    pub fn just_pressed(&self, key: PhysicalKey) -> bool {
        self.just_pressed.contains(&key)
    }

    #[must_use]
    pub fn code_just_pressed(&self, code: KeyCode) -> bool {
        self.just_pressed(PhysicalKey::Code(code))
    }

    #[must_use]
    pub fn just_released(&self, key: PhysicalKey) -> bool {
        self.just_released.contains(&key)
    }

    /// Releases every held key, e.g. when the window loses focus.
    pub fn release_all(&mut self) {
        self.just_released.extend(self.pressed.drain());
    }

    /// Clears the per-frame sets. Call at end of frame.
    pub fn clear_transients(&mut self) {
        self.just_pressed.clear();
        self.just_released.clear();
    }
}

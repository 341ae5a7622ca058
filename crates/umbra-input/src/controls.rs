//! Per-frame viewer controls derived from raw keyboard and mouse state.
//!
//! | input              | effect                          |
//! |--------------------|---------------------------------|
//! | W / S              | move forward / back             |
//! | A / D              | strafe left / right             |
//! | Space / X          | move up / down                  |
//! | Shift              | fast movement                   |
//! | left mouse drag    | look around                     |
//! | 1 - 9              | select camera                   |
//! | F1                 | toggle shadow map overlay       |
//! | Escape             | quit                            |

use glam::{Vec2, Vec3};
use winit::event::MouseButton;
use winit::keyboard::KeyCode;

use crate::{KeyboardState, MouseState};

const CAMERA_KEYS: [KeyCode; 9] = [
    KeyCode::Digit1,
    KeyCode::Digit2,
    KeyCode::Digit3,
    KeyCode::Digit4,
    KeyCode::Digit5,
    KeyCode::Digit6,
    KeyCode::Digit7,
    KeyCode::Digit8,
    KeyCode::Digit9,
];

/// User-tunable mapping parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlSettings {
    pub mouse_sensitivity: f32,
    pub invert_y: bool,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            mouse_sensitivity: 1.0,
            invert_y: false,
        }
    }
}

/// Everything the simulation step needs from input for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameControls {
    /// Local-space movement intent: x right, y up, z forward. Components are -1, 0 or 1.
    pub movement: Vec3,
    /// Mouse drag in pixels, scaled by sensitivity. x yaws, y pitches.
    pub look: Vec2,
    pub fast: bool,
    /// Zero-based camera index requested this frame.
    pub select_camera: Option<usize>,
    pub toggle_overlay: bool,
    pub quit: bool,
}

impl FrameControls {
    /// Reads the current device state. Call before clearing transients.
    pub fn gather(
        keyboard: &KeyboardState,
        mouse: &MouseState,
        settings: &ControlSettings,
    ) -> Self {
        let axis = |pos: KeyCode, neg: KeyCode| -> f32 {
            let mut v = 0.0;
            if keyboard.is_code_pressed(pos) {
                v += 1.0;
            }
            if keyboard.is_code_pressed(neg) {
                v -= 1.0;
            }
            v
        };

        let movement = Vec3::new(
            axis(KeyCode::KeyD, KeyCode::KeyA),
            axis(KeyCode::Space, KeyCode::KeyX),
            axis(KeyCode::KeyW, KeyCode::KeyS),
        );

        let look = if mouse.is_button_pressed(MouseButton::Left) {
            let mut d = mouse.delta() * settings.mouse_sensitivity;
            if settings.invert_y {
                d.y = -d.y;
            }
            d
        } else {
            Vec2::ZERO
        };

        let select_camera = CAMERA_KEYS
            .iter()
            .position(|&code| keyboard.code_just_pressed(code));
        if let Some(index) = select_camera {
            tracing::debug!(index, "camera selection requested");
        }

        Self {
            movement,
            look,
            fast: keyboard.is_code_pressed(KeyCode::ShiftLeft)
                || keyboard.is_code_pressed(KeyCode::ShiftRight),
            select_camera,
            toggle_overlay: keyboard.code_just_pressed(KeyCode::F1),
            quit: keyboard.code_just_pressed(KeyCode::Escape),
        }
    }
}

//! Keyboard and mouse state for the viewer, and the mapping from raw device
//! state to per-frame [`FrameControls`].

pub mod controls;
pub mod keyboard;
pub mod mouse;

pub use controls::{ControlSettings, FrameControls};
pub use keyboard::{KeyboardState, RawKeyEvent};
pub use mouse::MouseState;

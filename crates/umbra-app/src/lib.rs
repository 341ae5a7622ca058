//! Umbra application: window, frame loop, scene renderer and inspector bridge.

pub mod game_loop;
pub mod inspector;
pub mod platform;
pub mod renderer;
pub mod window;

//! Active viewport tracking.
//!
//! The shadow pass renders at the shadow map's resolution and the main pass at
//! the window's. [`ViewportTracker::scoped`] switches to the shadow viewport
//! for the lifetime of a guard and switches back when the guard drops, so any
//! exit from the shadow pass leaves the main viewport active.

use std::ops::{Deref, DerefMut};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Full-target viewport with depth range `[0, 1]`.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width as u32, self.height as u32)
    }

    pub fn apply(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_viewport(
            self.x,
            self.y,
            self.width,
            self.height,
            self.min_depth,
            self.max_depth,
        );
    }
}

/// The main target size and the viewport currently in effect.
#[derive(Debug)]
pub struct ViewportTracker {
    main: Viewport,
    active: Viewport,
    scoped: bool,
}

impl ViewportTracker {
    pub fn new(width: u32, height: u32) -> Self {
        let main = Viewport::full(width.max(1), height.max(1));
        Self {
            main,
            active: main,
            scoped: false,
        }
    }

    /// New window size. Applies immediately unless a scope is open, in which
    /// case it applies when the scope closes.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.main = Viewport::full(width.max(1), height.max(1));
        if !self.scoped {
            self.active = self.main;
        }
    }

    pub fn main(&self) -> Viewport {
        self.main
    }

    pub fn active(&self) -> Viewport {
        self.active
    }

    pub fn is_main_active(&self) -> bool {
        !self.scoped && self.active == self.main
    }

    /// Makes `viewport` active until the returned guard drops.
    pub fn scoped(&mut self, viewport: Viewport) -> ViewportScope<'_> {
        log::trace!("Viewport {:?} -> {:?}", self.active.size(), viewport.size());
        self.active = viewport;
        self.scoped = true;
        ViewportScope { tracker: self }
    }
}

/// Restores the main viewport on drop.
#[derive(Debug)]
pub struct ViewportScope<'a> {
    tracker: &'a mut ViewportTracker,
}

impl ViewportScope<'_> {
    pub fn viewport(&self) -> Viewport {
        self.tracker.active
    }
}

impl Deref for ViewportScope<'_> {
    type Target = ViewportTracker;

    fn deref(&self) -> &ViewportTracker {
        self.tracker
    }
}

impl DerefMut for ViewportScope<'_> {
    fn deref_mut(&mut self) -> &mut ViewportTracker {
        self.tracker
    }
}

impl Drop for ViewportScope<'_> {
    fn drop(&mut self) {
        self.tracker.active = self.tracker.main;
        self.tracker.scoped = false;
    }
}

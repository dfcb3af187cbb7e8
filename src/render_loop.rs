//! The per-frame loop driving every registered actor.

use std::time::Instant;

use crate::surface::{Point, Rgb, Surface};

/// A participant in the frame loop.
pub trait Actor {
    /// Advance time-based state. Runs for every actor before any drawing.
    fn update(&mut self, _now: Instant) {}
    fn draw(&mut self, surface: &mut dyn Surface);
}

/// Clears the surface and paints the background.
pub struct Backdrop {
    fill: Rgb,
}

impl Backdrop {
    pub fn new(fill: Rgb) -> Self {
        Self { fill }
    }
}

impl Actor for Backdrop {
    fn draw(&mut self, surface: &mut dyn Surface) {
        let viewport = surface.viewport();
        surface.clear();
        surface.fill_rect(Point::new(0.0, 0.0), viewport.width, viewport.height, self.fill);
    }
}

pub struct RenderLoop {
    running: bool,
    frames: u64,
}

impl Default for RenderLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderLoop {
    pub fn new() -> Self {
        Self {
            running: true,
            frames: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Stop for good. There is no way back once stopped.
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Run one frame: update then draw every actor in registration order.
    /// Returns whether the next frame should be scheduled.
    pub fn tick(
        &mut self,
        now: Instant,
        actors: &mut [&mut dyn Actor],
        surface: &mut dyn Surface,
    ) -> bool {
        if !self.running {
            return false;
        }

        for actor in actors.iter_mut() {
            actor.update(now);
        }
        for actor in actors.iter_mut() {
            actor.draw(surface);
        }

        self.frames += 1;
        true
    }
}

//! Pointer-drag scrubbing on the progress bar.

use crate::playback::Command;

/// Page-space rectangle of the progress element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn contains_x(&self, page_x: f64) -> bool {
        page_x >= self.left && page_x <= self.left + self.width
    }

    pub fn contains_y(&self, page_y: f64) -> bool {
        page_y >= self.top && page_y <= self.top + self.height
    }

    pub fn contains(&self, page_x: f64, page_y: f64) -> bool {
        self.contains_x(page_x) && self.contains_y(page_y)
    }

    /// Horizontal position of `page_x` as a fraction of the width. Not clamped.
    pub fn fraction(&self, page_x: f64) -> Option<f64> {
        if self.width <= 0.0 {
            return None;
        }
        Some((page_x - self.left) / self.width)
    }
}

/// An active drag, from pointer-down until pointer-up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekDrag {
    pub bounds: Bounds,
}

/// Turns pointer gestures on the progress element into playback commands.
#[derive(Debug, Default)]
pub struct SeekController {
    drag: Option<SeekDrag>,
}

impl SeekController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text selection stays locked for the length of a drag.
    pub fn is_selection_locked(&self) -> bool {
        self.drag.is_some()
    }

    /// Start a drag. The seek is skipped when `page_x` falls outside the
    /// element, so a click just beside the bar does not jump.
    pub fn pointer_down(&mut self, page_x: f64, bounds: Bounds) -> Vec<Command> {
        self.drag = Some(SeekDrag { bounds });

        let mut commands = vec![Command::DragStart];
        if bounds.contains_x(page_x) {
            commands.extend(bounds.fraction(page_x).map(Command::SeekTo));
        }
        commands
    }

    /// Follow the pointer. Positions past either edge are passed through and
    /// left to the player to clamp.
    pub fn pointer_move(&mut self, page_x: f64) -> Option<Command> {
        let drag = self.drag?;
        drag.bounds.fraction(page_x).map(Command::SeekTo)
    }

    pub fn pointer_up(&mut self) -> Option<Command> {
        self.drag.take().map(|_| Command::DragEnd)
    }
}

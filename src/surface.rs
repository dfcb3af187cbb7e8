//! Viewport-space drawing contract and a recording implementation of it.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn midpoint(self, other: Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// Drawable area in pixels, y pointing down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn lerp(self, other: Rgb, t: f64) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Rgb(mix(self.0, other.0), mix(self.1, other.1), mix(self.2, other.2))
    }
}

/// Colour ramp along the axis `start → end`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearGradient {
    start: Point,
    end: Point,
    stops: Vec<(f64, Rgb)>,
}

impl LinearGradient {
    pub fn new(start: Point, end: Point) -> Self {
        Self {
            start,
            end,
            stops: Vec::new(),
        }
    }

    pub fn with_stop(mut self, offset: f64, color: Rgb) -> Self {
        self.stops.push((offset.clamp(0.0, 1.0), color));
        self.stops.sort_by(|a, b| a.0.total_cmp(&b.0));
        self
    }

    /// Colour at `point`, projected onto the gradient axis.
    pub fn color_at(&self, point: Point) -> Rgb {
        let (Some(first), Some(last)) = (self.stops.first(), self.stops.last()) else {
            return Rgb(0, 0, 0);
        };

        let axis = Point::new(self.end.x - self.start.x, self.end.y - self.start.y);
        let length_sq = axis.x * axis.x + axis.y * axis.y;
        if length_sq == 0.0 {
            return first.1;
        }
        let t = ((point.x - self.start.x) * axis.x + (point.y - self.start.y) * axis.y) / length_sq;

        if t <= first.0 {
            return first.1;
        }
        if t >= last.0 {
            return last.1;
        }
        for pair in self.stops.windows(2) {
            let (lo, hi) = (pair[0], pair[1]);
            if t <= hi.0 {
                let span = hi.0 - lo.0;
                let local = if span > 0.0 { (t - lo.0) / span } else { 1.0 };
                return lo.1.lerp(hi.1, local);
            }
        }
        last.1
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    Solid(Rgb),
    Gradient(LinearGradient),
}

impl Paint {
    pub fn color_at(&self, point: Point) -> Rgb {
        match self {
            Paint::Solid(color) => *color,
            Paint::Gradient(gradient) => gradient.color_at(point),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub paint: Paint,
    pub width: f64,
}

impl Stroke {
    pub fn solid(color: Rgb, width: f64) -> Self {
        Self {
            paint: Paint::Solid(color),
            width,
        }
    }

    pub fn gradient(gradient: LinearGradient, width: f64) -> Self {
        Self {
            paint: Paint::Gradient(gradient),
            width,
        }
    }
}

/// Something that can be drawn on in viewport pixel coordinates.
pub trait Surface {
    fn viewport(&self) -> Viewport;
    fn clear(&mut self);
    fn fill_rect(&mut self, origin: Point, width: f64, height: f64, color: Rgb);
    /// Angles in radians, clockwise from the positive x axis (y points down).
    fn stroke_arc(&mut self, center: Point, radius: f64, start: f64, end: f64, stroke: &Stroke);
    fn stroke_line(&mut self, from: Point, to: Point, stroke: &Stroke);
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Clear,
    FillRect {
        origin: Point,
        width: f64,
        height: f64,
        color: Rgb,
    },
    StrokeArc {
        center: Point,
        radius: f64,
        start: f64,
        end: f64,
        stroke: Stroke,
    },
    StrokeLine {
        from: Point,
        to: Point,
        stroke: Stroke,
    },
}

/// Records one frame of draw calls so a backend can replay them.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayList {
    viewport: Viewport,
    ops: Vec<DrawOp>,
}

impl DisplayList {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            ops: Vec::new(),
        }
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    /// Fill colour of the last full-viewport rectangle drawn since the last clear.
    pub fn background(&self) -> Option<Rgb> {
        self.ops.iter().rev().find_map(|op| match op {
            DrawOp::FillRect {
                origin,
                width,
                height,
                color,
            } if origin.x <= 0.0
                && origin.y <= 0.0
                && *width >= self.viewport.width
                && *height >= self.viewport.height =>
            {
                Some(*color)
            }
            _ => None,
        })
    }
}

impl Surface for DisplayList {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn clear(&mut self) {
        self.ops.clear();
        self.ops.push(DrawOp::Clear);
    }

    fn fill_rect(&mut self, origin: Point, width: f64, height: f64, color: Rgb) {
        self.ops.push(DrawOp::FillRect {
            origin,
            width,
            height,
            color,
        });
    }

    fn stroke_arc(&mut self, center: Point, radius: f64, start: f64, end: f64, stroke: &Stroke) {
        self.ops.push(DrawOp::StrokeArc {
            center,
            radius,
            start,
            end,
            stroke: stroke.clone(),
        });
    }

    fn stroke_line(&mut self, from: Point, to: Point, stroke: &Stroke) {
        self.ops.push(DrawOp::StrokeLine {
            from,
            to,
            stroke: stroke.clone(),
        });
    }
}

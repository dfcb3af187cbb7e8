//! Polar spectrum renderer.
//!
//! Each channel spans a half-turn around a shared ring. Left fans out
//! clockwise and Right counter-clockwise from the same start angle, so the
//! two halves mirror each other.

use std::f64::consts::PI;

use crate::config::VisualConfig;
use crate::sampler::{ChannelFrame, ChannelId, FrameSamples};
use crate::surface::{LinearGradient, Point, Rgb, Stroke, Surface};

pub struct PolarRenderer {
    style: VisualConfig,
}

impl PolarRenderer {
    pub fn new(style: VisualConfig) -> Self {
        Self { style }
    }

    /// Draw the ring, then the bars of every channel that has data.
    pub fn draw(&self, samples: Option<&FrameSamples>, surface: &mut dyn Surface) {
        self.draw_ring(surface);

        let Some(samples) = samples else {
            return;
        };
        for channel in &samples.channels {
            self.draw_channel(channel, surface);
        }
    }

    fn draw_ring(&self, surface: &mut dyn Surface) {
        let viewport = surface.viewport();
        let [bottom, top] = self.style.ring_colors;
        let gradient = LinearGradient::new(Point::new(0.0, viewport.height), Point::new(0.0, 0.0))
            .with_stop(0.0, bottom)
            .with_stop(1.0, top);

        surface.stroke_arc(
            viewport.center(),
            self.style.radius,
            0.0,
            2.0 * PI,
            &Stroke::gradient(gradient, self.style.ring_width),
        );
    }

    fn draw_channel(&self, channel: &ChannelFrame, surface: &mut dyn Surface) {
        let Some(data) = &channel.data else {
            return;
        };
        if data.buffer_length == 0 {
            return;
        }

        // recomputed every frame so the ring follows resizes
        let center = surface.viewport().center();

        for (index, &magnitude) in data.magnitudes.iter().take(data.buffer_length).enumerate() {
            let angle = bar_angle(channel.name, index, data.buffer_length, self.style.angle_offset);
            let (from, to) = bar_segment(center, self.style.radius, angle, magnitude as f64 / 2.0);
            let stroke = Stroke::solid(bar_color(channel.name, magnitude), self.style.bar_width);
            surface.stroke_line(from, to, &stroke);
        }
    }
}

fn angle_multiplier(channel: ChannelId) -> f64 {
    match channel {
        ChannelId::Left => -1.0,
        ChannelId::Right => 1.0,
    }
}

/// Angle of bin `index` for a channel of `buffer_length` bins.
pub fn bar_angle(channel: ChannelId, index: usize, buffer_length: usize, offset: f64) -> f64 {
    let step = PI / buffer_length as f64;
    angle_multiplier(channel) * step * index as f64 + offset
}

/// Segment from the ring outwards by `length` along `angle`.
pub fn bar_segment(center: Point, radius: f64, angle: f64, length: f64) -> (Point, Point) {
    let (sin, cos) = angle.sin_cos();
    let start = Point::new(center.x + cos * radius, center.y + sin * radius);
    let end = Point::new(
        center.x + cos * (radius + length),
        center.y + sin * (radius + length),
    );
    (start, end)
}

pub fn bar_color(channel: ChannelId, magnitude: u8) -> Rgb {
    match channel {
        ChannelId::Left => Rgb(255, magnitude, 0),
        ChannelId::Right => Rgb(0, magnitude, 255),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::ChannelSample;
    use crate::surface::{DisplayList, DrawOp, Paint, Viewport};

    fn frame(left: Option<Vec<u8>>, right: Option<Vec<u8>>) -> FrameSamples {
        let sample = |magnitudes: Vec<u8>| ChannelSample {
            buffer_length: magnitudes.len(),
            magnitudes,
        };
        FrameSamples {
            channels: [
                ChannelFrame {
                    name: ChannelId::Left,
                    data: left.map(sample),
                },
                ChannelFrame {
                    name: ChannelId::Right,
                    data: right.map(sample),
                },
            ],
        }
    }

    fn lines(list: &DisplayList) -> Vec<(Point, Point, Rgb)> {
        list.ops()
            .iter()
            .filter_map(|op| match op {
                DrawOp::StrokeLine {
                    from,
                    to,
                    stroke: Stroke {
                        paint: Paint::Solid(color),
                        ..
                    },
                } => Some((*from, *to, *color)),
                _ => None,
            })
            .collect()
    }

    fn close(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
    }

    #[test]
    fn idle_frame_draws_only_the_ring() {
        let renderer = PolarRenderer::new(VisualConfig::default());
        let mut first = DisplayList::new(Viewport::new(800.0, 600.0));
        let mut second = DisplayList::new(Viewport::new(800.0, 600.0));
        renderer.draw(None, &mut first);
        renderer.draw(None, &mut second);

        assert_eq!(first, second);
        assert_eq!(first.ops().len(), 1);
        let DrawOp::StrokeArc { center, radius, .. } = &first.ops()[0] else {
            panic!("expected the ring");
        };
        assert_eq!(*center, Point::new(400.0, 300.0));
        assert_eq!(*radius, 150.0);
    }

    #[test]
    fn ring_follows_viewport_size() {
        let renderer = PolarRenderer::new(VisualConfig::default());
        let mut resized = DisplayList::new(Viewport::new(1000.0, 400.0));
        renderer.draw(None, &mut resized);
        let DrawOp::StrokeArc { center, .. } = &resized.ops()[0] else {
            panic!("expected the ring");
        };
        assert_eq!(*center, Point::new(500.0, 200.0));
    }

    #[test]
    fn channels_mirror_around_offset() {
        let offset = 1.5 * PI;
        for index in 0..8 {
            let left = bar_angle(ChannelId::Left, index, 8, offset);
            let right = bar_angle(ChannelId::Right, index, 8, offset);
            assert!(((left - offset) + (right - offset)).abs() < 1e-12);
        }
        // last bin stops short of the half-turn
        let last = bar_angle(ChannelId::Right, 7, 8, 0.0);
        assert!((last - 7.0 * PI / 8.0).abs() < 1e-12);
    }

    #[test]
    fn bars_start_on_ring_and_extend_by_half_magnitude() {
        let renderer = PolarRenderer::new(VisualConfig::default());
        let mut list = DisplayList::new(Viewport::new(800.0, 600.0));
        renderer.draw(Some(&frame(Some(vec![200, 0]), None)), &mut list);

        let bars = lines(&list);
        assert_eq!(bars.len(), 2);
        // first bin points straight up from the centre
        let (from, to, color) = bars[0];
        assert!(close(from, Point::new(400.0, 150.0)));
        assert!(close(to, Point::new(400.0, 50.0)));
        assert_eq!(color, Rgb(255, 200, 0));
    }

    #[test]
    fn identical_magnitudes_give_reflected_segments() {
        let renderer = PolarRenderer::new(VisualConfig::default());
        let mut list = DisplayList::new(Viewport::new(800.0, 600.0));
        let magnitudes = vec![10, 80, 160, 240];
        renderer.draw(
            Some(&frame(Some(magnitudes.clone()), Some(magnitudes))),
            &mut list,
        );

        let bars = lines(&list);
        assert_eq!(bars.len(), 8);
        for index in 0..4 {
            let (left_from, left_to, left_color) = bars[index];
            let (right_from, right_to, right_color) = bars[index + 4];
            // reflection across the vertical axis through the centre
            assert!(close(left_to, Point::new(800.0 - right_to.x, right_to.y)));
            assert!(close(left_from, Point::new(800.0 - right_from.x, right_from.y)));
            assert_eq!(left_color.1, right_color.1);
            assert_ne!(left_color, right_color);
        }
    }

    #[test]
    fn tolerates_partial_channel_data() {
        let renderer = PolarRenderer::new(VisualConfig::default());
        let mut list = DisplayList::new(Viewport::new(800.0, 600.0));
        let mut samples = frame(None, Some(vec![5, 6, 7]));
        samples.channels[1]
            .data
            .as_mut()
            .expect("right data")
            .buffer_length = 0;
        renderer.draw(Some(&samples), &mut list);
        assert!(lines(&list).is_empty());

        // declared length longer than the data only draws what exists
        let mut list = DisplayList::new(Viewport::new(800.0, 600.0));
        let mut samples = frame(Some(vec![5, 6]), None);
        samples.channels[0]
            .data
            .as_mut()
            .expect("left data")
            .buffer_length = 10;
        renderer.draw(Some(&samples), &mut list);
        assert_eq!(lines(&list).len(), 2);
    }
}

use std::io::stdout;
use std::time::{Duration, Instant};

use color_eyre::Result;
use crossterm::event::{
    DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton,
    MouseEvent, MouseEventKind, poll, read,
};
use crossterm::execute;
use log::info;
use ratatui::{
    DefaultTerminal,
    prelude::*,
    widgets::{
        Gauge, Paragraph,
        canvas::{Canvas, Context, Line as CanvasLine},
    },
};

use crate::config::Config;
use crate::device::{PlaybackDevice, RoutingGraph};
use crate::playback::{Command, Phase, Player};
use crate::render_loop::{Actor, Backdrop, RenderLoop};
use crate::seek::{Bounds, SeekController};
use crate::surface::{DisplayList, DrawOp, Point, Rgb, Surface, Viewport};

/// Screen regions, recomputed every frame so resizes take effect at once.
struct Screen {
    canvas: Rect,
    elapsed: Rect,
    progress: Rect,
    total: Rect,
    status: Rect,
}

impl Screen {
    fn split(area: Rect) -> Self {
        let [canvas, progress_row, status] = Layout::vertical([
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(area);
        let [elapsed, progress, total] = Layout::horizontal([
            Constraint::Length(9),
            Constraint::Min(10),
            Constraint::Length(9),
        ])
        .areas(progress_row);
        Self {
            canvas,
            elapsed,
            progress,
            total,
            status,
        }
    }
}

/// Pixel size of a terminal cell, mapping cell coordinates to the page.
#[derive(Clone, Copy)]
struct CellSize {
    width: f64,
    height: f64,
}

impl CellSize {
    fn viewport(&self, area: Rect) -> Viewport {
        Viewport::new(area.width as f64 * self.width, area.height as f64 * self.height)
    }

    /// Page position of the centre of a cell.
    fn page_point(&self, column: u16, row: u16) -> Point {
        Point::new(
            (column as f64 + 0.5) * self.width,
            (row as f64 + 0.5) * self.height,
        )
    }

    fn bounds(&self, area: Rect) -> Bounds {
        Bounds {
            left: area.x as f64 * self.width,
            top: area.y as f64 * self.height,
            width: area.width as f64 * self.width,
            height: area.height as f64 * self.height,
        }
    }
}

struct App<G: RoutingGraph> {
    player: Player<G>,
    backdrop: Backdrop,
    render_loop: RenderLoop,
    seek: SeekController,
    cell: CellSize,
    frame_interval: Duration,
}

impl<G: RoutingGraph> App<G> {
    fn new(player: Player<G>, config: &Config) -> Self {
        Self {
            player,
            backdrop: Backdrop::new(config.visual.background),
            render_loop: RenderLoop::new(),
            seek: SeekController::new(),
            cell: CellSize {
                width: config.display.cell_width_px as f64,
                height: config.display.cell_height_px as f64,
            },
            frame_interval: Duration::from_millis(config.display.frame_ms.max(1)),
        }
    }

    fn run(mut self, mut terminal: DefaultTerminal) -> Result<()> {
        loop {
            let frame_start = Instant::now();
            let size = terminal.size()?;
            let screen = Screen::split(Rect::new(0, 0, size.width, size.height));

            let mut list = DisplayList::new(self.cell.viewport(screen.canvas));
            if !self.render_frame(frame_start, &mut list) {
                info!(
                    "render loop stopped after {} frames, {:?}",
                    self.render_loop.frames(),
                    self.player.state()
                );
                return Ok(());
            }

            terminal.draw(|f| self.view(f, &screen, &list))?;
            self.handle_input_until(frame_start + self.frame_interval, &screen)?;
        }
    }

    /// Backdrop first, so the player draws over a cleared frame.
    fn render_frame(&mut self, now: Instant, list: &mut DisplayList) -> bool {
        let mut actors: [&mut dyn Actor; 2] = [&mut self.backdrop, &mut self.player];
        self.render_loop.tick(now, &mut actors, list)
    }

    fn view(&self, frame: &mut Frame, screen: &Screen, list: &DisplayList) {
        let viewport = list.viewport();
        let canvas = Canvas::default()
            .marker(symbols::Marker::Braille)
            .background_color(list.background().map(to_color).unwrap_or(Color::Reset))
            .x_bounds([0.0, viewport.width])
            .y_bounds([0.0, viewport.height])
            .paint(|ctx| paint(ctx, list));
        frame.render_widget(canvas, screen.canvas);

        let source = self.player.source();
        let (current, duration) = (source.current_time(), source.duration());
        let ratio = if duration > 0.0 {
            (current / duration).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let gauge_color = if self.seek.is_selection_locked() {
            Color::Magenta
        } else {
            Color::Cyan
        };
        frame.render_widget(
            Gauge::default()
                .ratio(ratio)
                .label("")
                .gauge_style(Style::default().fg(gauge_color).bg(Color::DarkGray)),
            screen.progress,
        );
        frame.render_widget(
            Paragraph::new(format_clock(current)).alignment(Alignment::Center),
            screen.elapsed,
        );
        frame.render_widget(
            Paragraph::new(format_clock(duration)).alignment(Alignment::Center),
            screen.total,
        );

        let phase = match self.player.phase() {
            Phase::Locked => "press space to start",
            Phase::Paused => "paused",
            Phase::Playing => "playing",
            Phase::FadingIn => "fading in",
            Phase::FadingOut => "fading out",
        };
        let volume = if source.muted() {
            String::from("muted")
        } else {
            format!("vol {:>3.0}%", source.volume() * 100.0)
        };
        frame.render_widget(
            Paragraph::new(format!(
                " {} | {} | space play/pause  drag bar to seek  q quit",
                phase, volume
            ))
            .style(Style::default().fg(Color::Gray)),
            screen.status,
        );
    }

    fn handle_input_until(&mut self, deadline: Instant, screen: &Screen) -> Result<()> {
        loop {
            let Some(timeout) = deadline.checked_duration_since(Instant::now()) else {
                return Ok(());
            };
            if !poll(timeout)? {
                return Ok(());
            }
            match read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => self.on_key(key.code),
                Event::Mouse(mouse) => self.on_mouse(mouse, screen),
                _ => {}
            }
            if !self.render_loop.is_running() {
                return Ok(());
            }
        }
    }

    fn on_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char(' ') => self.player.dispatch(Command::Toggle),
            KeyCode::Char('q') | KeyCode::Esc => self.render_loop.stop(),
            _ => {}
        }
    }

    fn on_mouse(&mut self, mouse: MouseEvent, screen: &Screen) {
        for command in pointer_commands(&mut self.seek, self.cell, screen.progress, mouse) {
            self.player.dispatch(command);
        }
    }
}

/// Route a mouse event through the seek controller. Only a press on the
/// progress bar itself starts a drag.
fn pointer_commands(
    seek: &mut SeekController,
    cell: CellSize,
    progress: Rect,
    mouse: MouseEvent,
) -> Vec<Command> {
    let page = cell.page_point(mouse.column, mouse.row);
    let bar = cell.bounds(progress);
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) if bar.contains(page.x, page.y) => {
            seek.pointer_down(page.x, bar)
        }
        MouseEventKind::Drag(MouseButton::Left) => seek.pointer_move(page.x).into_iter().collect(),
        MouseEventKind::Up(MouseButton::Left) => seek.pointer_up().into_iter().collect(),
        _ => Vec::new(),
    }
}

fn to_color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.0, rgb.1, rgb.2)
}

/// Replay a display list onto a canvas. The canvas y axis points up.
fn paint(ctx: &mut Context, list: &DisplayList) {
    let height = list.viewport().height;
    let line = |ctx: &mut Context, from: Point, to: Point, color: Rgb| {
        ctx.draw(&CanvasLine::new(
            from.x,
            height - from.y,
            to.x,
            height - to.y,
            to_color(color),
        ));
    };

    for op in list.ops() {
        match op {
            // the widget background takes care of these
            DrawOp::Clear | DrawOp::FillRect { .. } => {}
            DrawOp::StrokeLine { from, to, stroke } => {
                line(ctx, *from, *to, stroke.paint.color_at(from.midpoint(*to)));
            }
            DrawOp::StrokeArc {
                center,
                radius,
                start,
                end,
                stroke,
            } => {
                for pair in arc_points(*center, *radius, *start, *end).windows(2) {
                    let (from, to) = (pair[0], pair[1]);
                    line(ctx, from, to, stroke.paint.color_at(from.midpoint(to)));
                }
            }
        }
    }
}

/// Polyline approximating an arc, roughly one vertex every 4 px.
fn arc_points(center: Point, radius: f64, start: f64, end: f64) -> Vec<Point> {
    let sweep = end - start;
    let segments = ((radius * sweep.abs() / 4.0).ceil() as usize).clamp(16, 720);
    (0..=segments)
        .map(|i| {
            let angle = start + sweep * i as f64 / segments as f64;
            Point::new(center.x + radius * angle.cos(), center.y + radius * angle.sin())
        })
        .collect()
}

/// `m:ss`, or `h:mm:ss` from an hour up.
pub fn format_clock(secs: f64) -> String {
    let total = if secs.is_finite() && secs > 0.0 {
        secs.floor() as u64
    } else {
        0
    };
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

pub fn run<G: RoutingGraph>(player: Player<G>, config: &Config) -> Result<()> {
    let terminal = ratatui::init();
    let app_result = execute!(stdout(), EnableMouseCapture)
        .map_err(Into::into)
        .and_then(|()| App::new(player, config).run(terminal));
    let capture_result = execute!(stdout(), DisableMouseCapture);
    ratatui::restore();
    app_result?;
    capture_result?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::fakes::{FakeGraph, FakeSource};
    use crate::playback::PlayerSettings;
    use crate::renderer::PolarRenderer;
    use crossterm::event::KeyModifiers;
    use std::cell::RefCell;
    use std::rc::Rc;

    const CELL: CellSize = CellSize {
        width: 8.0,
        height: 16.0,
    };

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    fn idle_app() -> App<FakeGraph> {
        let level = || Rc::new(RefCell::new(vec![0; 4]));
        let config = Config::default();
        let player = Player::new(
            FakeSource::default(),
            FakeGraph::new([level(), level()], Rc::new(RefCell::new(0))),
            PolarRenderer::new(config.visual.clone()),
            PlayerSettings::from(&config.audio),
        );
        App::new(player, &config)
    }

    #[test]
    fn backdrop_is_drawn_before_the_ring() {
        let mut app = idle_app();
        let mut list = DisplayList::new(Viewport::new(800.0, 600.0));
        assert!(app.render_frame(Instant::now(), &mut list));

        let ops = list.ops();
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[0], DrawOp::Clear);
        assert!(matches!(ops[1], DrawOp::FillRect { .. }));
        assert!(matches!(ops[2], DrawOp::StrokeArc { .. }));

        app.render_loop.stop();
        assert!(!app.render_frame(Instant::now(), &mut list));
    }

    #[test]
    fn press_on_the_clocks_does_not_start_a_drag() {
        let screen = Screen::split(Rect::new(0, 0, 80, 24));
        let mut seek = SeekController::new();
        let press = MouseEventKind::Down(MouseButton::Left);

        let row = screen.progress.y;
        for column in [screen.elapsed.x + 2, screen.total.x + 2] {
            let commands = pointer_commands(&mut seek, CELL, screen.progress, mouse(press, column, row));
            assert!(commands.is_empty());
            assert!(!seek.is_selection_locked());
        }

        let commands =
            pointer_commands(&mut seek, CELL, screen.progress, mouse(press, screen.progress.x, row));
        assert_eq!(commands[0], Command::DragStart);
        assert!(matches!(commands[1], Command::SeekTo(fraction) if fraction > 0.0 && fraction < 0.1));

        // once dragging, the pointer may leave the bar
        let drag = mouse(MouseEventKind::Drag(MouseButton::Left), screen.total.x + 2, row + 1);
        assert!(matches!(
            pointer_commands(&mut seek, CELL, screen.progress, drag).as_slice(),
            [Command::SeekTo(fraction)] if *fraction > 1.0
        ));
        let release = mouse(MouseEventKind::Up(MouseButton::Left), 0, 0);
        assert_eq!(
            pointer_commands(&mut seek, CELL, screen.progress, release),
            vec![Command::DragEnd]
        );
    }

    #[test]
    fn clock_formats() {
        assert_eq!(format_clock(0.0), "0:00");
        assert_eq!(format_clock(65.9), "1:05");
        assert_eq!(format_clock(754.0), "12:34");
        assert_eq!(format_clock(3600.0 + 59.0), "1:00:59");
        assert_eq!(format_clock(f64::NAN), "0:00");
    }

    #[test]
    fn cells_map_to_page_pixels() {
        let cell = CellSize {
            width: 8.0,
            height: 16.0,
        };
        assert_eq!(cell.page_point(0, 0), Point::new(4.0, 8.0));
        let bounds = cell.bounds(Rect::new(9, 20, 50, 1));
        assert_eq!(bounds.left, 72.0);
        assert_eq!(bounds.width, 400.0);
        // the centre of the first bar cell lands inside the bar
        assert!(bounds.contains_x(cell.page_point(9, 20).x));
        assert!(!bounds.contains_x(cell.page_point(8, 20).x));
        assert_eq!(cell.viewport(Rect::new(0, 0, 100, 40)), Viewport::new(800.0, 640.0));
    }

    #[test]
    fn screen_reserves_progress_and_status_rows() {
        let screen = Screen::split(Rect::new(0, 0, 80, 24));
        assert_eq!(screen.canvas.height, 22);
        assert_eq!(screen.progress.y, 22);
        assert_eq!(screen.status.y, 23);
        assert_eq!(screen.elapsed.width + screen.progress.width + screen.total.width, 80);
    }

    #[test]
    fn full_arc_closes_on_itself() {
        let center = Point::new(400.0, 300.0);
        let points = arc_points(center, 150.0, 0.0, 2.0 * std::f64::consts::PI);
        assert_eq!(points.len(), 237);
        let (first, last) = (points[0], points[points.len() - 1]);
        assert!((first.x - last.x).abs() < 1e-9 && (first.y - last.y).abs() < 1e-9);
        for point in &points {
            let distance = ((point.x - center.x).powi(2) + (point.y - center.y).powi(2)).sqrt();
            assert!((distance - 150.0).abs() < 1e-9);
        }
    }
}

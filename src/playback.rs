//! Playback state machine: unlock gating, fades, and the stereo analysis tap.

use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::config::AudioConfig;
use crate::device::{PlaybackDevice, RoutingGraph, StartOutcome};
use crate::easing::{Ease, ease_in_out_cubic};
use crate::render_loop::Actor;
use crate::renderer::PolarRenderer;
use crate::sampler::{ChannelFrame, ChannelId, FrameSamples, channel_sample};
use crate::surface::Surface;
use crate::tween::{Tween, TweenStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackState {
    /// Set once by the first successful play. Never cleared.
    pub has_user_interacted: bool,
    pub is_playing: bool,
    /// At most one fade runs at a time.
    pub is_volume_fading: bool,
    /// Both channels were silent on the last sampled frame.
    pub is_bin_data_empty: bool,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            has_user_interacted: false,
            is_playing: false,
            is_volume_fading: false,
            is_bin_data_empty: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Locked,
    Paused,
    Playing,
    FadingIn,
    FadingOut,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Toggle,
    DragStart,
    /// Fraction of the track duration. Clamped to the track on apply.
    SeekTo(f64),
    DragEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FadeDirection {
    In,
    Out,
}

struct Fade {
    direction: FadeDirection,
    tween: Tween,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingStart {
    /// First play after the unlock gesture.
    Unlock,
    /// Play after a pause; the fade-in is already running.
    Resume,
}

#[derive(Debug, Clone, Copy)]
pub struct PlayerSettings {
    pub fade: Duration,
    pub ease: Ease,
    pub fft_size: usize,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            fade: Duration::from_millis(100),
            ease: ease_in_out_cubic,
            fft_size: 512,
        }
    }
}

impl From<&AudioConfig> for PlayerSettings {
    fn from(config: &AudioConfig) -> Self {
        Self {
            fade: config.fade_duration(),
            ease: config.fade_curve.ease(),
            fft_size: config.fft_size,
        }
    }
}

pub struct Player<G: RoutingGraph> {
    state: PlaybackState,
    source: G::Source,
    graph: G,
    analysers: Option<[G::Analyser; 2]>,
    fade: Option<Fade>,
    pending: Option<PendingStart>,
    renderer: PolarRenderer,
    settings: PlayerSettings,
}

impl<G: RoutingGraph> Player<G> {
    pub fn new(
        source: G::Source,
        graph: G,
        renderer: PolarRenderer,
        settings: PlayerSettings,
    ) -> Self {
        Self {
            state: PlaybackState::default(),
            source,
            graph,
            analysers: None,
            fade: None,
            pending: None,
            renderer,
            settings,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn phase(&self) -> Phase {
        match (&self.fade, self.state) {
            (Some(fade), _) if fade.direction == FadeDirection::In => Phase::FadingIn,
            (Some(_), _) => Phase::FadingOut,
            (None, state) if !state.has_user_interacted => Phase::Locked,
            (None, state) if state.is_playing => Phase::Playing,
            (None, _) => Phase::Paused,
        }
    }

    pub fn source(&self) -> &G::Source {
        &self.source
    }

    pub fn dispatch(&mut self, command: Command) {
        match command {
            Command::Toggle => self.toggle(),
            Command::DragStart => self.mute_volume(),
            Command::SeekTo(fraction) => self.seek(fraction),
            Command::DragEnd => self.reset_volume(),
        }
    }

    pub fn toggle(&mut self) {
        if self.state.is_volume_fading || self.pending.is_some() {
            debug!("toggle dropped, transition already in flight");
            return;
        }

        if self.state.is_playing {
            self.pause();
        } else {
            self.play();
        }
    }

    fn play(&mut self) {
        if !self.state.has_user_interacted {
            self.unlock();
            return;
        }

        self.state.is_playing = true;
        self.state.is_volume_fading = true;
        self.pending = Some(PendingStart::Resume);
        self.start_fade(FadeDirection::In);
        self.source.play();
    }

    /// The output context may only be created in response to a user gesture,
    /// which is why this waits for the first toggle.
    fn unlock(&mut self) {
        if let Err(err) = self.graph.unlock(&mut self.source) {
            warn!("playback rejected, waiting for the next toggle: {}", err);
            return;
        }
        self.pending = Some(PendingStart::Unlock);
        self.source.play();
    }

    fn pause(&mut self) {
        if self.state.is_volume_fading {
            return;
        }
        self.state.is_volume_fading = true;
        self.start_fade(FadeDirection::Out);
    }

    fn start_fade(&mut self, direction: FadeDirection) {
        let (from, to) = match direction {
            FadeDirection::In => (0.0, 1.0),
            FadeDirection::Out => (1.0, 0.0),
        };
        // holds until the first tick
        self.source.set_volume(from as f32);
        self.fade = Some(Fade {
            direction,
            tween: Tween::new(from, to, self.settings.fade, self.settings.ease),
        });
    }

    /// Collect a pending start outcome and step the running fade.
    pub fn advance(&mut self, now: Instant) {
        if let Some(outcome) = self.source.poll_start() {
            self.resolve_start(outcome);
        }

        let Some(fade) = self.fade.as_mut() else {
            return;
        };
        let source = &mut self.source;
        let status = fade
            .tween
            .tick(now, |volume| source.set_volume(volume as f32));
        if status == TweenStatus::Finished {
            let direction = fade.direction;
            self.fade = None;
            self.finish_fade(direction);
        }
    }

    fn resolve_start(&mut self, outcome: StartOutcome) {
        let Some(pending) = self.pending.take() else {
            debug!("start outcome with no request in flight: {:?}", outcome);
            return;
        };

        match (pending, outcome) {
            (PendingStart::Unlock, StartOutcome::Started) => {
                self.state.has_user_interacted = true;
                self.state.is_playing = true;
                info!("audio unlocked, playback started");
                self.connect_analysers();
            }
            (PendingStart::Unlock, StartOutcome::Rejected(reason)) => {
                warn!("playback rejected, waiting for the next toggle: {}", reason);
            }
            (PendingStart::Resume, StartOutcome::Started) => {
                debug!("playback resumed");
            }
            (PendingStart::Resume, StartOutcome::Rejected(reason)) => {
                warn!("resume rejected: {}", reason);
                self.fade = None;
                self.state.is_playing = false;
                self.state.is_volume_fading = false;
            }
        }
    }

    fn connect_analysers(&mut self) {
        if self.analysers.is_some() {
            return;
        }
        match self
            .graph
            .connect_stereo(&mut self.source, self.settings.fft_size)
        {
            Ok(analysers) => {
                info!(
                    "stereo analysis wired, {} bins per channel",
                    analysers[0].bin_count()
                );
                self.analysers = Some(analysers);
            }
            Err(err) => error!("playing without visuals: {}", err),
        }
    }

    fn finish_fade(&mut self, direction: FadeDirection) {
        match direction {
            FadeDirection::In => {
                self.state.is_volume_fading = false;
                debug!("fade in complete");
            }
            FadeDirection::Out => {
                // only now, so the fade is heard to the end
                self.source.pause();
                self.state.is_playing = false;
                self.state.is_volume_fading = false;
                debug!("fade out complete, paused");
            }
        }
    }

    fn mute_volume(&mut self) {
        self.source.set_volume(0.0);
        self.source.set_muted(true);
    }

    fn reset_volume(&mut self) {
        self.source.set_volume(1.0);
        self.source.set_muted(false);
    }

    fn seek(&mut self, fraction: f64) {
        let duration = self.source.duration();
        if !duration.is_finite() || duration <= 0.0 || !fraction.is_finite() {
            return;
        }
        let target = (duration * fraction).clamp(0.0, duration);
        debug!("seek to {:.2}s", target);
        self.source.set_current_time(target);
    }

    /// Sample both channels for this frame.
    ///
    /// Frames keep being sampled for a while after a pause, because buffered
    /// audio still shows up in the analysers. Sampling stops once a paused
    /// frame comes back silent on both sides.
    pub fn pull_frame_samples(&mut self) -> Option<FrameSamples> {
        if !self.state.is_playing && self.state.is_bin_data_empty {
            return None;
        }
        let [left, right] = self.analysers.as_mut()?;

        let frame = FrameSamples {
            channels: [
                ChannelFrame {
                    name: ChannelId::Left,
                    data: channel_sample(left),
                },
                ChannelFrame {
                    name: ChannelId::Right,
                    data: channel_sample(right),
                },
            ],
        };
        self.state.is_bin_data_empty = !frame.has_data();
        frame.has_data().then_some(frame)
    }

    #[cfg(test)]
    pub(crate) fn source_mut(&mut self) -> &mut G::Source {
        &mut self.source
    }

    #[cfg(test)]
    pub(crate) fn graph(&self) -> &G {
        &self.graph
    }
}

impl<G: RoutingGraph> Actor for Player<G> {
    fn update(&mut self, now: Instant) {
        self.advance(now);
    }

    fn draw(&mut self, surface: &mut dyn Surface) {
        let samples = self.pull_frame_samples();
        self.renderer.draw(samples.as_ref(), surface);
    }
}

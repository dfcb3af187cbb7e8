use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use color_eyre::Result;
use color_eyre::eyre::eyre;
use cpal::traits::{DeviceTrait, HostTrait};
use crossbeam::channel::{Receiver, Sender, unbounded};
use log::{error, info, warn};
use ringbuffer::{AllocRingBuffer, RingBuffer};
use rodio::{OutputStream, OutputStreamBuilder, Sink, Source};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::analyzer::{ChannelTap, SpectrumAnalyser};
use crate::config::AudioConfig;
use crate::device::{DeviceError, PlaybackDevice, RoutingGraph, StartOutcome};

/// Samples handed to the analysis taps in batches of this many.
const TAP_BATCH: usize = 256;

const NO_SEEK: usize = usize::MAX;

/// A fully decoded track, interleaved.
#[derive(Clone)]
pub struct Track {
    samples: Arc<Vec<f32>>,
    sample_rate: u32,
    channels: u16,
}

impl Track {
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: Arc::new(samples),
            sample_rate,
            channels: channels.max(1),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let src = std::fs::File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(src), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let meta_opts: MetadataOptions = Default::default();
        let fmt_opts: FormatOptions = Default::default();
        let probed = symphonia::default::get_probe().format(&hint, mss, &fmt_opts, &meta_opts)?;
        let mut format = probed.format;

        // first track with a known (decodeable) codec
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| eyre!("no supported audio tracks found"))?;

        let dec_opts: DecoderOptions = Default::default();
        let mut decoder = symphonia::default::get_codecs().make(&track.codec_params, &dec_opts)?;
        let track_id = track.id;

        let mut all_samples = Vec::<f32>::new();
        let mut sample_buf = None;
        let mut sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
        let mut channels = track
            .codec_params
            .channels
            .map(|channels| channels.count() as u16)
            .unwrap_or(2);

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                // end of stream
                Err(Error::IoError(_)) => break,
                Err(err) => return Err(err.into()),
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(audio_buf) => {
                    if sample_buf.is_none() {
                        let spec = *audio_buf.spec();
                        sample_rate = spec.rate;
                        channels = spec.channels.count() as u16;
                        let duration = audio_buf.capacity() as u64;
                        sample_buf = Some(SampleBuffer::<f32>::new(duration, spec));
                    }

                    if let Some(buf) = &mut sample_buf {
                        buf.copy_interleaved_ref(audio_buf);
                        all_samples.extend_from_slice(buf.samples());
                    }
                }
                Err(Error::DecodeError(err)) => warn!("skipping undecodable packet: {}", err),
                Err(err) => return Err(err.into()),
            }
        }

        if all_samples.is_empty() {
            return Err(eyre!("{} contains no audio", path.display()));
        }
        info!(
            "decoded {}: {} Hz, {} channel(s), {:.1}s",
            path.display(),
            sample_rate,
            channels,
            all_samples.len() as f64 / (sample_rate as f64 * channels.max(1) as f64)
        );
        Ok(Self::from_samples(all_samples, sample_rate, channels))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// Interleaved sample position shared by the UI and the audio thread.
///
/// The UI only requests seeks. The audio thread applies them on a frame
/// boundary, so a seek can never shift Left samples into the Right slot.
struct Playhead {
    cursor: AtomicUsize,
    pending_seek: AtomicUsize,
}

impl Playhead {
    fn new() -> Self {
        Self {
            cursor: AtomicUsize::new(0),
            pending_seek: AtomicUsize::new(NO_SEEK),
        }
    }

    /// Current position, counting a seek the audio thread has not applied yet.
    fn position(&self) -> usize {
        match self.pending_seek.load(Ordering::Acquire) {
            NO_SEEK => self.cursor.load(Ordering::Acquire),
            target => target,
        }
    }

    /// `sample` must be the first sample of a frame.
    fn request_seek(&self, sample: usize) {
        self.pending_seek.store(sample, Ordering::Release);
    }

    /// Index of the next sample to play. Audio thread only.
    fn advance(&self, channels: usize) -> usize {
        let mut position = self.cursor.load(Ordering::Acquire);
        if position % channels == 0 {
            let target = self.pending_seek.swap(NO_SEEK, Ordering::AcqRel);
            if target != NO_SEEK {
                position = target;
            }
        }
        self.cursor.store(position + 1, Ordering::Release);
        position
    }
}

/// The splitter side of the graph: one ring buffer per output channel.
struct TapBus {
    enabled: AtomicBool,
    /// Set before the taps are silenced on pause. Checked under the tap lock,
    /// so a batch from the audio thread can never land after the silence.
    paused: AtomicBool,
    left: ChannelTap,
    right: ChannelTap,
}

impl TapBus {
    fn new(capacity: usize) -> Self {
        let tap = || Arc::new(Mutex::new(AllocRingBuffer::new(capacity)));
        Self {
            enabled: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            left: tap(),
            right: tap(),
        }
    }

    fn is_live(&self) -> bool {
        self.enabled.load(Ordering::Acquire) && !self.paused.load(Ordering::Acquire)
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::Release);
    }

    /// Stop tapping and push silence through both taps, as a stopped source would.
    fn pause(&self) {
        self.paused.store(true, Ordering::Release);
        for tap in [&self.left, &self.right] {
            let mut tap = tap.lock().unwrap_or_else(PoisonError::into_inner);
            let capacity = tap.capacity();
            tap.extend(std::iter::repeat_n(0.0, capacity));
        }
    }
}

/// Streams the track to the output while copying each channel into the taps.
/// Audio passes through untouched, so tapping never changes what is heard.
struct TapSource {
    track: Track,
    playhead: Arc<Playhead>,
    bus: Arc<TapBus>,
    pending_left: Vec<f32>,
    pending_right: Vec<f32>,
}

impl TapSource {
    fn new(track: Track, playhead: Arc<Playhead>, bus: Arc<TapBus>) -> Self {
        Self {
            track,
            playhead,
            bus,
            pending_left: Vec::with_capacity(TAP_BATCH),
            pending_right: Vec::with_capacity(TAP_BATCH),
        }
    }

    fn route(&mut self, position: usize, sample: f32) {
        match (self.track.channels, position % self.track.channels as usize) {
            // a mono source only reaches the first splitter output
            (1, _) => {
                self.pending_left.push(sample);
                self.pending_right.push(0.0);
            }
            (_, 0) => self.pending_left.push(sample),
            (_, 1) => self.pending_right.push(sample),
            _ => {}
        }

        if self.pending_left.len() >= TAP_BATCH {
            self.flush();
        }
    }

    /// Hand the batch to the analysers without ever blocking the audio thread.
    fn flush(&mut self) {
        for (tap, pending) in [
            (&self.bus.left, &mut self.pending_left),
            (&self.bus.right, &mut self.pending_right),
        ] {
            if let Ok(mut tap) = tap.try_lock() {
                if self.bus.paused.load(Ordering::Acquire) {
                    pending.clear();
                } else {
                    tap.extend(pending.drain(..));
                }
            } else if pending.len() > TAP_BATCH * 16 {
                pending.clear();
            }
        }
    }
}

impl Iterator for TapSource {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let position = self.playhead.advance(self.track.channels as usize);
        // silence past the end keeps the sink alive for seeking back
        let sample = self.track.samples.get(position).copied().unwrap_or(0.0);
        if self.bus.is_live() {
            self.route(position, sample);
        } else if !self.pending_left.is_empty() || !self.pending_right.is_empty() {
            self.pending_left.clear();
            self.pending_right.clear();
        }
        Some(sample)
    }
}

impl Source for TapSource {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> rodio::ChannelCount {
        self.track.channels
    }

    fn sample_rate(&self) -> rodio::SampleRate {
        self.track.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

/// The playback element: owns the decoded track and, once unlocked, a sink.
pub struct RodioSource {
    track: Track,
    playhead: Arc<Playhead>,
    bus: Arc<TapBus>,
    sink: Option<Sink>,
    outcome_tx: Sender<StartOutcome>,
    outcome_rx: Receiver<StartOutcome>,
    volume: f32,
    muted: bool,
}

impl RodioSource {
    pub fn new(track: Track, fft_size: usize) -> Self {
        let (outcome_tx, outcome_rx) = unbounded();
        Self {
            track,
            playhead: Arc::new(Playhead::new()),
            bus: Arc::new(TapBus::new(fft_size)),
            sink: None,
            outcome_tx,
            outcome_rx,
            volume: 1.0,
            muted: false,
        }
    }

    fn attach(&mut self, sink: Sink) {
        sink.pause();
        sink.set_volume(self.effective_volume());
        sink.append(TapSource::new(
            self.track.clone(),
            Arc::clone(&self.playhead),
            Arc::clone(&self.bus),
        ));
        self.sink = Some(sink);
    }

    fn enable_taps(&self) -> (ChannelTap, ChannelTap) {
        self.bus.enabled.store(true, Ordering::Release);
        (Arc::clone(&self.bus.left), Arc::clone(&self.bus.right))
    }

    fn effective_volume(&self) -> f32 {
        if self.muted { 0.0 } else { self.volume }
    }

    fn apply_volume(&self) {
        if let Some(sink) = &self.sink {
            sink.set_volume(self.effective_volume());
        }
    }

    fn report(&self, outcome: StartOutcome) {
        if let Err(err) = self.outcome_tx.send(outcome) {
            error!("start outcome lost: {}", err);
        }
    }
}

impl PlaybackDevice for RodioSource {
    fn play(&mut self) {
        match &self.sink {
            Some(sink) => {
                self.bus.resume();
                sink.play();
                self.report(StartOutcome::Started);
            }
            None => self.report(StartOutcome::Rejected(
                "audio output has not been unlocked".to_string(),
            )),
        }
    }

    fn poll_start(&mut self) -> Option<StartOutcome> {
        self.outcome_rx.try_recv().ok()
    }

    fn pause(&mut self) {
        if let Some(sink) = &self.sink {
            sink.pause();
        }
        self.bus.pause();
    }

    fn current_time(&self) -> f64 {
        let frame = self.playhead.position() / self.track.channels as usize;
        (frame as f64 / self.track.sample_rate as f64).min(self.duration())
    }

    fn set_current_time(&mut self, secs: f64) {
        let secs = secs.clamp(0.0, self.duration());
        let frame = ((secs * self.track.sample_rate as f64) as usize).min(self.track.frames());
        self.playhead
            .request_seek(frame * self.track.channels as usize);
    }

    fn duration(&self) -> f64 {
        self.track.duration_secs()
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.apply_volume();
    }

    fn muted(&self) -> bool {
        self.muted
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.apply_volume();
    }
}

/// Output context plus the analysis wiring around a [`RodioSource`].
pub struct RodioGraph {
    stream: Option<OutputStream>,
    config: AudioConfig,
}

impl RodioGraph {
    pub fn new(config: AudioConfig) -> Self {
        Self {
            stream: None,
            config,
        }
    }
}

impl RoutingGraph for RodioGraph {
    type Source = RodioSource;
    type Analyser = SpectrumAnalyser;

    fn unlock(&mut self, source: &mut RodioSource) -> Result<(), DeviceError> {
        if self.stream.is_some() {
            return Ok(());
        }

        let stream = OutputStreamBuilder::open_default_stream()
            .map_err(|err| DeviceError::OutputUnavailable(err.to_string()))?;
        let device = cpal::default_host()
            .default_output_device()
            .and_then(|device| device.name().ok())
            .unwrap_or_else(|| String::from("<unknown>"));
        info!("audio output opened on {}", device);

        source.attach(Sink::connect_new(stream.mixer()));
        self.stream = Some(stream);
        Ok(())
    }

    fn connect_stereo(
        &mut self,
        source: &mut RodioSource,
        fft_size: usize,
    ) -> Result<[SpectrumAnalyser; 2], DeviceError> {
        if self.stream.is_none() {
            return Err(DeviceError::AnalysisUnavailable(
                "output is still locked".to_string(),
            ));
        }

        let sample_rate = source.track.sample_rate;
        let (left, right) = source.enable_taps();
        Ok([
            SpectrumAnalyser::new(left, sample_rate, fft_size, &self.config),
            SpectrumAnalyser::new(right, sample_rate, fft_size, &self.config),
        ])
    }
}

//! Contracts for the audio hardware the playback engine drives.

use std::fmt;

/// Result of a `play()` request. Devices report it on a later frame.
#[derive(Debug, Clone, PartialEq)]
pub enum StartOutcome {
    Started,
    Rejected(String),
}

/// The element that owns the track: transport, position and gain.
pub trait PlaybackDevice {
    /// Ask the device to start. The outcome is collected with [`PlaybackDevice::poll_start`].
    fn play(&mut self);
    fn poll_start(&mut self) -> Option<StartOutcome>;
    fn pause(&mut self);
    /// Position in seconds.
    fn current_time(&self) -> f64;
    fn set_current_time(&mut self, secs: f64);
    /// Track length in seconds.
    fn duration(&self) -> f64;
    fn volume(&self) -> f32;
    fn set_volume(&mut self, volume: f32);
    fn muted(&self) -> bool;
    fn set_muted(&mut self, muted: bool);
}

/// One analysis tap producing byte magnitudes per frequency bin.
pub trait FrequencyAnalyser {
    fn bin_count(&self) -> usize;
    /// Current magnitudes, `bin_count()` long. Each read may advance the
    /// device's internal window.
    fn read_magnitudes(&mut self) -> Vec<u8>;
}

/// Builds source → splitter → analysers → merger → output.
pub trait RoutingGraph {
    type Source: PlaybackDevice;
    type Analyser: FrequencyAnalyser;

    /// Create the output context. Only valid after a user gesture; calling it
    /// again once unlocked is a no-op.
    fn unlock(&mut self, source: &mut Self::Source) -> Result<(), DeviceError>;

    /// Tap both channels of `source`, returning `[left, right]` analysers.
    fn connect_stereo(
        &mut self,
        source: &mut Self::Source,
        fft_size: usize,
    ) -> Result<[Self::Analyser; 2], DeviceError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceError {
    OutputUnavailable(String),
    AnalysisUnavailable(String),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::OutputUnavailable(reason) => {
                write!(f, "audio output unavailable: {}", reason)
            }
            DeviceError::AnalysisUnavailable(reason) => {
                write!(f, "frequency analysis unavailable: {}", reason)
            }
        }
    }
}

impl std::error::Error for DeviceError {}

/// In-memory devices for exercising the engine without audio hardware.
#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    #[derive(Default)]
    pub(crate) struct FakeSource {
        pub(crate) scripted: VecDeque<StartOutcome>,
        pub(crate) outcome: Option<StartOutcome>,
        pub(crate) plays: usize,
        pub(crate) pauses: usize,
        pub(crate) time: f64,
        pub(crate) volume: f32,
        pub(crate) muted: bool,
        /// Volume at each `play()` call.
        pub(crate) play_volumes: Vec<f32>,
    }

    impl FakeSource {
        pub(crate) fn script(&mut self, outcome: StartOutcome) {
            self.scripted.push_back(outcome);
        }
    }

    impl PlaybackDevice for FakeSource {
        fn play(&mut self) {
            self.plays += 1;
            self.play_volumes.push(self.volume);
            self.outcome = Some(self.scripted.pop_front().unwrap_or(StartOutcome::Started));
        }

        fn poll_start(&mut self) -> Option<StartOutcome> {
            self.outcome.take()
        }

        fn pause(&mut self) {
            self.pauses += 1;
        }

        fn current_time(&self) -> f64 {
            self.time
        }

        fn set_current_time(&mut self, secs: f64) {
            self.time = secs;
        }

        fn duration(&self) -> f64 {
            200.0
        }

        fn volume(&self) -> f32 {
            self.volume
        }

        fn set_volume(&mut self, volume: f32) {
            self.volume = volume;
        }

        fn muted(&self) -> bool {
            self.muted
        }

        fn set_muted(&mut self, muted: bool) {
            self.muted = muted;
        }
    }

    pub(crate) type Level = Rc<RefCell<Vec<u8>>>;

    pub(crate) struct FakeAnalyser {
        pub(crate) level: Level,
        pub(crate) reads: Rc<RefCell<usize>>,
    }

    impl FrequencyAnalyser for FakeAnalyser {
        fn bin_count(&self) -> usize {
            self.level.borrow().len()
        }

        fn read_magnitudes(&mut self) -> Vec<u8> {
            *self.reads.borrow_mut() += 1;
            self.level.borrow().clone()
        }
    }

    pub(crate) struct FakeGraph {
        pub(crate) levels: [Level; 2],
        pub(crate) reads: Rc<RefCell<usize>>,
        pub(crate) unlocks: usize,
        pub(crate) connects: usize,
        pub(crate) refuse_unlock: bool,
    }

    impl FakeGraph {
        pub(crate) fn new(levels: [Level; 2], reads: Rc<RefCell<usize>>) -> Self {
            Self {
                levels,
                reads,
                unlocks: 0,
                connects: 0,
                refuse_unlock: false,
            }
        }
    }

    impl RoutingGraph for FakeGraph {
        type Source = FakeSource;
        type Analyser = FakeAnalyser;

        fn unlock(&mut self, _source: &mut FakeSource) -> Result<(), DeviceError> {
            if self.refuse_unlock {
                return Err(DeviceError::OutputUnavailable("no device".into()));
            }
            self.unlocks += 1;
            Ok(())
        }

        fn connect_stereo(
            &mut self,
            _source: &mut FakeSource,
            _fft_size: usize,
        ) -> Result<[FakeAnalyser; 2], DeviceError> {
            self.connects += 1;
            Ok(self.levels.clone().map(|level| FakeAnalyser {
                level,
                reads: Rc::clone(&self.reads),
            }))
        }
    }
}

//! Per-frame channel samples pulled from the analysis taps.

use crate::device::FrequencyAnalyser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelId {
    Left,
    Right,
}

/// Magnitudes of one channel for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSample {
    pub buffer_length: usize,
    pub magnitudes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelFrame {
    pub name: ChannelId,
    /// `None` when the channel was silent this frame.
    pub data: Option<ChannelSample>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameSamples {
    pub channels: [ChannelFrame; 2],
}

impl FrameSamples {
    pub fn has_data(&self) -> bool {
        self.channels.iter().any(|channel| channel.data.is_some())
    }
}

/// Read `analyser` once. Returns `None` when every magnitude is zero.
pub fn channel_sample<A: FrequencyAnalyser + ?Sized>(analyser: &mut A) -> Option<ChannelSample> {
    let magnitudes = analyser.read_magnitudes();
    if is_zeroed_out(&magnitudes) {
        return None;
    }
    Some(ChannelSample {
        buffer_length: magnitudes.len(),
        magnitudes,
    })
}

pub fn is_zeroed_out(magnitudes: &[u8]) -> bool {
    magnitudes.iter().all(|&value| value == 0)
}

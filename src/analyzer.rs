use std::sync::{Arc, Mutex, PoisonError};

use log::warn;
use ringbuffer::{AllocRingBuffer, RingBuffer};
use spectrum_analyzer::scaling::divide_by_N;
use spectrum_analyzer::windows::hann_window;
use spectrum_analyzer::{FrequencyLimit, samples_fft_to_spectrum};

use crate::config::AudioConfig;
use crate::device::FrequencyAnalyser;

/// Most recent samples of one channel, written by the audio thread.
pub type ChannelTap = Arc<Mutex<AllocRingBuffer<f32>>>;

/// FFT analyser over one channel tap, producing byte magnitudes per bin.
///
/// Magnitudes are smoothed over time and mapped from `[min_db, max_db]`
/// onto `0..=255`, so every read moves the smoothing window forward.
pub struct SpectrumAnalyser {
    tap: ChannelTap,
    sample_rate: u32,
    fft_size: usize,
    smoothing: f32,
    min_db: f32,
    max_db: f32,
    smoothed: Vec<f32>,
}

impl SpectrumAnalyser {
    pub fn new(tap: ChannelTap, sample_rate: u32, fft_size: usize, config: &AudioConfig) -> Self {
        Self {
            tap,
            sample_rate,
            fft_size,
            smoothing: config.smoothing,
            min_db: config.min_db,
            max_db: config.max_db,
            smoothed: vec![0.0; fft_size / 2],
        }
    }

    /// The last `fft_size` samples, zero padded at the front while the tap fills.
    fn block(&self) -> Vec<f32> {
        let tap = self.tap.lock().unwrap_or_else(PoisonError::into_inner);
        let recent: Vec<f32> = tap
            .iter()
            .map(|&sample| if sample.is_finite() { sample } else { 0.0 })
            .collect();
        drop(tap);

        let mut block = vec![0.0; self.fft_size.saturating_sub(recent.len())];
        let skip = recent.len().saturating_sub(self.fft_size);
        block.extend_from_slice(&recent[skip..]);
        block
    }
}

impl FrequencyAnalyser for SpectrumAnalyser {
    fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    fn read_magnitudes(&mut self) -> Vec<u8> {
        let bins = self.bin_count();
        let block = self.block();
        let windowed = hann_window(&block);

        let spectrum = match samples_fft_to_spectrum(
            &windowed,
            self.sample_rate,
            FrequencyLimit::All,
            Some(&divide_by_N),
        ) {
            Ok(spectrum) => spectrum,
            Err(err) => {
                warn!("spectrum analysis failed: {:?}", err);
                return vec![0; bins];
            }
        };

        let mut magnitudes = vec![0; bins];
        for (bin, (_, value)) in spectrum.data().iter().take(bins).enumerate() {
            let smoothed =
                self.smoothing * self.smoothed[bin] + (1.0 - self.smoothing) * value.val();
            self.smoothed[bin] = smoothed;
            magnitudes[bin] = magnitude_to_byte(smoothed, self.min_db, self.max_db);
        }
        magnitudes
    }
}

/// Linear magnitude to a byte on the `[min_db, max_db]` decibel scale.
pub fn magnitude_to_byte(magnitude: f32, min_db: f32, max_db: f32) -> u8 {
    if magnitude <= 0.0 || !magnitude.is_finite() {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    let scaled = 255.0 * (db - min_db) / (max_db - min_db);
    scaled.clamp(0.0, 255.0) as u8
}

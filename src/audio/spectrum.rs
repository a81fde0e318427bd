use rustfft::{num_complex::Complex, FftPlanner};
use std::collections::VecDeque;
use std::sync::Arc;

use super::window::WindowFunction;

/// Number of spectra kept for reconstructing the scrolling image. Should be at
/// least the tallest plot height in pixels.
pub const HISTORY_SIZE: usize = 1000;

/// Blocks shorter than this are not analyzed at all.
pub const MIN_BLOCK_SAMPLES: usize = 64;

pub const WINDOW_SIZES: [usize; 4] = [256, 512, 1024, 2048];

// Keeps silent bins finite (about -240 dB).
const MAGNITUDE_FLOOR: f32 = 1e-12;

/// dB values of one analysis window, `window_size / 2` bins, DC first.
pub type SpectralFrame = Arc<[f32]>;

/// Interleaved 16-bit samples handed over by the playback side.
#[derive(Clone, Debug, Default)]
pub struct SampleBlock {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
    /// Samples per channel
    pub sample_count: usize,
    /// Number of new units since the previous block; 0 for a plain refresh
    pub new_data: usize,
}

impl SampleBlock {
    pub fn new(samples: Vec<i16>, sample_rate: u32, channels: u16) -> Self {
        let channels = channels.max(1);
        let sample_count = samples.len() / channels as usize;
        Self {
            samples,
            sample_rate,
            channels,
            sample_count,
            new_data: 1,
        }
    }

    /// Samples per channel actually present in the buffer.
    fn available(&self) -> usize {
        self.sample_count
            .min(self.samples.len() / self.channels.max(1) as usize)
    }
}

/// Newest-first spectra with a hard capacity.
#[derive(Clone, Debug)]
pub struct SpectralHistory {
    frames: VecDeque<SpectralFrame>,
    capacity: usize,
    revision: u64,
}

impl SpectralHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity.min(HISTORY_SIZE)),
            capacity,
            revision: 0,
        }
    }

    /// Prepend a spectrum, evicting the oldest ones past capacity.
    pub fn push(&mut self, frame: SpectralFrame) {
        self.frames.push_front(frame);
        while self.frames.len() > self.capacity {
            self.frames.pop_back();
        }
        self.revision += 1;
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of pushes so far. Changes whenever new data arrived.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Newest first.
    pub fn iter(&self) -> impl Iterator<Item = &SpectralFrame> {
        self.frames.iter()
    }

    pub fn get(&self, age: usize) -> Option<&SpectralFrame> {
        self.frames.get(age)
    }

    pub fn stored_bytes(&self) -> usize {
        self.frames
            .iter()
            .map(|f| f.len() * std::mem::size_of::<f32>())
            .sum()
    }
}

impl Default for SpectralHistory {
    fn default() -> Self {
        Self::new(HISTORY_SIZE)
    }
}

/// Requested window size limited to the available samples, rounded down to
/// an even count.
pub fn effective_window_size(requested: usize, available: usize) -> usize {
    let size = requested.min(available);
    size & !1
}

pub struct SpectralAnalyzer {
    planner: FftPlanner<f32>,
    window: Option<(WindowFunction, Vec<f32>)>,
    history: SpectralHistory,
    last_window_size: usize,
}

impl SpectralAnalyzer {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            planner: FftPlanner::new(),
            window: None,
            history: SpectralHistory::new(capacity),
            last_window_size: 0,
        }
    }

    pub fn history(&self) -> &SpectralHistory {
        &self.history
    }

    /// Window size used for the most recent block, for display.
    pub fn last_window_size(&self) -> usize {
        self.last_window_size
    }

    /// Transform a block and prepend its spectrum to the history.
    ///
    /// Returns `None` when the block is too short or carries no new data; the
    /// history is left untouched in both cases.
    pub fn analyze(
        &mut self,
        block: &SampleBlock,
        window_size: usize,
        window: WindowFunction,
    ) -> Option<SpectralFrame> {
        if block.samples.len() < MIN_BLOCK_SAMPLES {
            log::debug!("Ignoring block of {} samples", block.samples.len());
            return None;
        }

        let size = effective_window_size(window_size, block.available());
        self.last_window_size = size;

        if block.new_data == 0 {
            log::debug!("Spectrogram has no new data to Fourier-transform");
            return None;
        }
        if size < 2 {
            return None;
        }

        self.prepare_window(window, size);
        let coefficients: &[f32] = match &self.window {
            Some((_, coeffs)) => coeffs.as_slice(),
            None => &[],
        };
        let spectrum = power_spectrum(
            &mut self.planner,
            &block.samples,
            block.channels.max(1) as usize,
            coefficients,
        );
        let frame: SpectralFrame = spectrum.into();
        self.history.push(frame.clone());

        log::trace!(
            "Spectrum of {} bins, history {} frames ({:.2} kB)",
            frame.len(),
            self.history.len(),
            self.history.stored_bytes() as f64 / 1000.0
        );
        Some(frame)
    }

    fn prepare_window(&mut self, window: WindowFunction, size: usize) {
        let stale = match &self.window {
            Some((kind, coeffs)) => *kind != window || coeffs.len() != size,
            None => true,
        };
        if stale {
            self.window = Some((window, window.coefficients(size)));
        }
    }
}

impl Default for SpectralAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Channel-mixed, windowed FFT of the first `window.len()` frames of
/// `samples`, as dB relative to a full-scale sine.
fn power_spectrum(
    planner: &mut FftPlanner<f32>,
    samples: &[i16],
    channels: usize,
    window: &[f32],
) -> Vec<f32> {
    let size = window.len();
    let gain: f32 = window.iter().sum::<f32>().max(f32::EPSILON);

    let mut buffer: Vec<Complex<f32>> = samples
        .chunks_exact(channels)
        .take(size)
        .zip(window)
        .map(|(frame, &w)| {
            let mono = frame.iter().map(|&s| s as f32).sum::<f32>() / channels as f32 / 32768.0;
            Complex::new(mono * w, 0.0)
        })
        .collect();
    buffer.resize(size, Complex::new(0.0, 0.0));

    let fft = planner.plan_fft_forward(size);
    fft.process(&mut buffer);

    buffer[..size / 2]
        .iter()
        .map(|c| 20.0 * (2.0 * c.norm() / gain).max(MAGNITUDE_FLOOR).log10())
        .collect()
}

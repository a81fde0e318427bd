use crate::error::Result;

/// One timeline frame worth of decoded audio.
#[derive(Clone, Debug, Default)]
pub struct AudioFrame {
    /// Absolute frame position within the clip
    pub position: i64,
    /// Samples per channel carried by `samples`
    pub sample_count: usize,
    /// Interleaved signed 16-bit samples
    pub samples: Vec<i16>,
    pub channels: u16,
}

/// Access to a clip's decoded audio, one timeline frame at a time.
///
/// A source keeps its own read cursor, so concurrent computations must each
/// hold their own clone (see [`SourceProvider::clone_source`]).
pub trait SampleSource: Send {
    /// Move the read cursor to an absolute frame.
    fn seek(&mut self, frame: usize) -> Result<()>;

    /// Timeline frames per second.
    fn frame_rate(&self) -> f64;

    fn sample_rate(&self) -> u32;

    fn channels(&self) -> u16;

    /// Length of the clip in timeline frames.
    fn total_frames(&self) -> usize;

    /// Fetch the frame `index` frames past the last seek position.
    fn get_frame(&mut self, index: usize) -> Result<AudioFrame>;

    fn is_valid(&self) -> bool {
        true
    }
}

/// Hands out independent sample sources per clip.
pub trait SourceProvider {
    /// Frame duration of a known clip, or `None` if the clip does not exist.
    fn clip_frames(&self, clip: &str) -> Option<usize>;

    /// A fresh source with its own cursor, exclusively owned by the caller.
    fn clone_source(&self, clip: &str) -> Result<Box<dyn SampleSource>>;
}

/// Number of samples belonging to timeline frame `position`.
///
/// Uses rounded cumulative sample positions so that fractional
/// samples-per-frame ratios (44.1 kHz at 25 fps is 1764, 48 kHz at
/// 29.97 fps is not whole) distribute without drift.
pub fn samples_for_frame(frame_rate: f64, sample_rate: u32, position: i64) -> usize {
    if frame_rate <= 0.0 || sample_rate == 0 {
        return 0;
    }
    let at = |pos: i64| -> i64 {
        let exact = pos as f64 * sample_rate as f64 / frame_rate;
        let bias = if pos < 0 { -0.5 } else { 0.5 };
        (exact + bias) as i64
    };
    (at(position + 1) - at(position)).max(0) as usize
}

/// In-memory source over interleaved samples, mostly for tests and for
/// sources that were fully decoded up front.
pub struct BufferSource {
    samples: std::sync::Arc<[i16]>,
    sample_rate: u32,
    channels: u16,
    frame_rate: f64,
    cursor: usize,
}

impl BufferSource {
    pub fn new(samples: std::sync::Arc<[i16]>, sample_rate: u32, channels: u16, frame_rate: f64) -> Self {
        Self {
            samples,
            sample_rate,
            channels: channels.max(1),
            frame_rate,
            cursor: 0,
        }
    }

    /// Index of the first sample (per channel) of a timeline frame.
    fn frame_start(&self, position: i64) -> usize {
        let exact = position as f64 * self.sample_rate as f64 / self.frame_rate;
        (exact + 0.5).max(0.0) as usize
    }
}

impl SampleSource for BufferSource {
    fn seek(&mut self, frame: usize) -> Result<()> {
        self.cursor = frame;
        Ok(())
    }

    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn total_frames(&self) -> usize {
        if self.sample_rate == 0 {
            return 0;
        }
        let per_channel = self.samples.len() / self.channels as usize;
        (per_channel as f64 * self.frame_rate / self.sample_rate as f64).ceil() as usize
    }

    fn get_frame(&mut self, index: usize) -> Result<AudioFrame> {
        let position = (self.cursor + index) as i64;
        let count = samples_for_frame(self.frame_rate, self.sample_rate, position);
        let channels = self.channels as usize;
        let per_channel = self.samples.len() / channels;

        let start = self.frame_start(position).min(per_channel);
        let end = (start + count).min(per_channel);

        // Past the end of the clip the frame is padded with silence.
        let mut samples = vec![0i16; count * channels];
        samples[..(end - start) * channels]
            .copy_from_slice(&self.samples[start * channels..end * channels]);

        Ok(AudioFrame {
            position,
            sample_count: count,
            samples,
            channels: self.channels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_per_frame_whole_ratio() {
        assert_eq!(samples_for_frame(25.0, 44100, 0), 1764);
        assert_eq!(samples_for_frame(25.0, 44100, 99), 1764);
    }

    #[test]
    fn samples_per_frame_fractional_ratio_does_not_drift() {
        let fps = 30000.0 / 1001.0;
        let total: usize = (0..30_000).map(|p| samples_for_frame(fps, 48000, p)).sum();
        let expected = (30_000.0 * 48000.0 / fps).round() as usize;
        assert_eq!(total, expected);
    }

    #[test]
    fn samples_per_frame_degenerate_rates() {
        assert_eq!(samples_for_frame(0.0, 44100, 3), 0);
        assert_eq!(samples_for_frame(25.0, 0, 3), 0);
    }

    #[test]
    fn buffer_source_reads_relative_to_seek() {
        // 10 samples per frame, mono
        let data: Vec<i16> = (0..100).collect();
        let mut source = BufferSource::new(data.into(), 100, 1, 10.0);
        assert_eq!(source.total_frames(), 10);

        source.seek(3).unwrap();
        let frame = source.get_frame(1).unwrap();
        assert_eq!(frame.position, 4);
        assert_eq!(frame.sample_count, 10);
        assert_eq!(frame.samples[0], 40);
        assert_eq!(frame.samples[9], 49);
    }

    #[test]
    fn buffer_source_pads_past_end() {
        let data: Vec<i16> = vec![5; 15];
        let mut source = BufferSource::new(data.into(), 100, 1, 10.0);
        let frame = source.get_frame(1).unwrap();
        assert_eq!(frame.samples.len(), 10);
        assert_eq!(frame.samples[4], 5);
        assert_eq!(frame.samples[5], 0);
    }
}

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::source::{BufferSource, SampleSource, SourceProvider};
use crate::error::ScopeError;

/// A fully decoded file: interleaved 16-bit samples.
pub struct AudioData {
    pub samples: Arc<[i16]>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioData {
    /// Samples per channel.
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }
}

pub fn decode_audio(path: &Path) -> Result<AudioData> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("Failed to probe audio format")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .context("No audio tracks found")?;

    let track_id = track.id;
    let mut channels = track.codec_params.channels.map_or(0, |c| c.count());
    let sample_rate = track.codec_params.sample_rate.context("Unknown sample rate")?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create audio decoder")?;

    let mut all_samples: Vec<i16> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(err)) => {
                log::debug!("Skipping undecodable packet: {}", err);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        if channels == 0 {
            channels = spec.channels.count();
        }

        // Keep the channels interleaved; consumers pick or mix them.
        let mut sample_buf = SampleBuffer::<i16>::new(decoded.frames() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        all_samples.extend_from_slice(sample_buf.samples());
    }

    let channels = u16::try_from(channels.max(1)).context("Too many audio channels")?;
    let data = AudioData {
        samples: all_samples.into(),
        sample_rate,
        channels,
    };

    log::info!(
        "Decoded audio: {} samples, {} channels, {}Hz, {:.1}s",
        data.frames(),
        data.channels,
        data.sample_rate,
        data.duration()
    );

    Ok(data)
}

/// Serves decoded files as clips, keyed by the name they were added under.
/// Every source handed out shares the decoded samples but owns its cursor.
pub struct DecodedClips {
    frame_rate: f64,
    clips: HashMap<String, Arc<AudioData>>,
}

impl DecodedClips {
    pub fn new(frame_rate: f64) -> Self {
        Self {
            frame_rate,
            clips: HashMap::new(),
        }
    }

    pub fn insert(&mut self, clip: impl Into<String>, data: AudioData) {
        self.clips.insert(clip.into(), Arc::new(data));
    }

    fn source(&self, data: &AudioData) -> BufferSource {
        BufferSource::new(
            data.samples.clone(),
            data.sample_rate,
            data.channels,
            self.frame_rate,
        )
    }
}

impl SourceProvider for DecodedClips {
    fn clip_frames(&self, clip: &str) -> Option<usize> {
        self.clips
            .get(clip)
            .map(|data| self.source(data).total_frames())
    }

    fn clone_source(&self, clip: &str) -> crate::error::Result<Box<dyn SampleSource>> {
        let data = self.clips.get(clip).ok_or_else(|| ScopeError::InvalidSource {
            clip: clip.to_string(),
            reason: "clip was never decoded".into(),
        })?;
        if data.sample_rate == 0 {
            return Err(ScopeError::Decode(format!("clip '{}' has no sampling rate", clip)));
        }
        Ok(Box::new(self.source(data)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(seconds: usize, rate: u32, channels: u16) -> AudioData {
        let len = seconds * rate as usize * channels as usize;
        AudioData {
            samples: vec![100i16; len].into(),
            sample_rate: rate,
            channels,
        }
    }

    #[test]
    fn clip_length_in_timeline_frames() {
        let mut clips = DecodedClips::new(25.0);
        clips.insert("a", clip(2, 44100, 2));
        assert_eq!(clips.clip_frames("a"), Some(50));
        assert_eq!(clips.clip_frames("b"), None);
    }

    #[test]
    fn sources_have_independent_cursors() {
        let mut clips = DecodedClips::new(25.0);
        clips.insert("a", clip(1, 8000, 1));
        let mut first = clips.clone_source("a").unwrap();
        let mut second = clips.clone_source("a").unwrap();
        first.seek(10).unwrap();
        assert_eq!(first.get_frame(0).unwrap().position, 10);
        assert_eq!(second.get_frame(0).unwrap().position, 0);
        assert_eq!(second.get_frame(0).unwrap().sample_count, 320);
    }

    #[test]
    fn unknown_clip_is_an_invalid_source() {
        let clips = DecodedClips::new(25.0);
        assert!(matches!(
            clips.clone_source("missing"),
            Err(ScopeError::InvalidSource { .. })
        ));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = decode_audio(Path::new("/nonexistent/audioscope-test.wav"))
            .err()
            .unwrap();
        assert!(format!("{:#}", err).contains("Failed to open audio file"));
    }
}

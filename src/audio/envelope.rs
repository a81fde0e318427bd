use serde::Serialize;
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use super::source::{samples_for_frame, AudioFrame, SampleSource, SourceProvider};
use crate::error::{Result, ScopeError};
use crate::render::raster::Raster;

pub const ENVELOPE_IMAGE_HEIGHT: u32 = 400;

const BACKGROUND: [u8; 4] = [255, 255, 255, 255];
const BAR_COLOR: [u8; 4] = [50, 50, 50, 255];

/// Mean-free per-frame amplitude sums of a clip range.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AudioSummary {
    pub audio_amplitudes: Vec<i64>,
    pub amplitude_max: i64,
}

impl AudioSummary {
    /// Subtract the integer mean of `raw` from every entry and record the
    /// largest absolute value of the result.
    pub fn from_raw(mut raw: Vec<i64>) -> Self {
        if raw.is_empty() {
            return Self::default();
        }

        let mean = raw.iter().sum::<i64>() / raw.len() as i64;
        let mut amplitude_max = 0;
        for value in raw.iter_mut() {
            *value -= mean;
            amplitude_max = amplitude_max.max(value.abs());
        }

        Self {
            audio_amplitudes: raw,
            amplitude_max,
        }
    }

    pub fn len(&self) -> usize {
        self.audio_amplitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.audio_amplitudes.is_empty()
    }

    /// Bar graph of the envelope, one column per frame, bars growing up from
    /// the bottom edge. Frames below the mean draw nothing.
    pub fn draw(&self, height: u32) -> Raster {
        let width = self.audio_amplitudes.len() as u32;
        let mut img = Raster::filled(width, height, BACKGROUND);

        if self.amplitude_max == 0 {
            return img;
        }

        let bottom = height as f64 - 1.0;
        for (x, &amplitude) in self.audio_amplitudes.iter().enumerate() {
            let fy = amplitude as f64 / self.amplitude_max as f64 * height as f64;
            let top = bottom - fy;
            for y in (0..height).rev() {
                if y as f64 <= top {
                    break;
                }
                img.set_pixel(x as i32, y as i32, BAR_COLOR);
            }
        }
        img
    }
}

/// Which part of a clip to summarize.
#[derive(Clone, Debug)]
pub struct EnvelopeRequest {
    /// Clip identifier understood by the [`SourceProvider`]
    pub clip: String,
    /// Timeline instance the envelope is computed for
    pub clip_id: i32,
    /// First frame, relative to the clip start
    pub offset: usize,
    /// Frame count; 0 means the rest of the clip after `offset`
    pub length: usize,
    /// Timeline position of the clip instance
    pub start_pos: usize,
}

impl EnvelopeRequest {
    pub fn whole_clip(clip: impl Into<String>) -> Self {
        Self {
            clip: clip.into(),
            clip_id: -1,
            offset: 0,
            length: 0,
            start_pos: 0,
        }
    }
}

/// Sent once per computation after the summary is complete.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnvelopeReady {
    pub clip: String,
    pub clip_id: i32,
}

/// Owns one background envelope computation and its result.
///
/// Dropping an `AudioEnvelope` blocks until the worker thread has finished,
/// including sending its ready event.
pub struct AudioEnvelope {
    clip: String,
    clip_id: i32,
    offset: usize,
    start_pos: usize,
    envelope_size: usize,
    source: Option<Box<dyn SampleSource>>,
    started: bool,
    task: Option<JoinHandle<AudioSummary>>,
    summary: Option<AudioSummary>,
}

impl AudioEnvelope {
    pub fn new(provider: &dyn SourceProvider, request: EnvelopeRequest) -> Result<Self> {
        let total = provider
            .clip_frames(&request.clip)
            .ok_or_else(|| ScopeError::InvalidSource {
                clip: request.clip.clone(),
                reason: "unknown clip".into(),
            })?;

        let envelope_size = if request.length > 0 {
            let past_end = request
                .offset
                .checked_add(request.length)
                .map_or(true, |end| end > total);
            if past_end {
                return Err(ScopeError::Range {
                    offset: request.offset,
                    length: request.length,
                    total,
                });
            }
            request.length
        } else {
            if request.offset > total {
                return Err(ScopeError::Range {
                    offset: request.offset,
                    length: 0,
                    total,
                });
            }
            total - request.offset
        };

        // A broken source does not fail the request: frames that cannot be
        // read count as silence.
        let source = match provider.clone_source(&request.clip) {
            Ok(source) if source.is_valid() => Some(source),
            Ok(_) => {
                log::warn!("Cannot create envelope for clip {}: source is not valid", request.clip);
                None
            }
            Err(err) => {
                log::warn!("Cannot create envelope for clip {}: {}", request.clip, err);
                None
            }
        };

        Ok(Self {
            clip: request.clip,
            clip_id: request.clip_id,
            offset: request.offset,
            start_pos: request.start_pos,
            envelope_size,
            source,
            started: false,
            task: None,
            summary: None,
        })
    }

    /// Spawn the background computation. `ready` receives one
    /// [`EnvelopeReady`] once the summary is available.
    pub fn start(&mut self, ready: Option<Sender<EnvelopeReady>>) -> Result<()> {
        if self.started {
            return Err(ScopeError::AlreadyStarted(self.clip.clone()));
        }

        let source = self.source.take();
        let offset = self.offset;
        let size = self.envelope_size;
        let event = EnvelopeReady {
            clip: self.clip.clone(),
            clip_id: self.clip_id,
        };

        let handle = thread::Builder::new()
            .name(format!("envelope-{}", self.clip))
            .spawn(move || {
                let summary = load_and_normalize(source, offset, size);
                if let Some(tx) = ready {
                    if tx.send(event).is_err() {
                        log::debug!("Envelope ready event dropped, receiver is gone");
                    }
                }
                summary
            })?;

        self.task = Some(handle);
        self.started = true;
        Ok(())
    }

    pub fn has_started(&self) -> bool {
        self.started
    }

    /// Non-blocking check whether the summary can be read without waiting.
    pub fn is_finished(&self) -> bool {
        match &self.task {
            Some(task) => task.is_finished(),
            None => self.summary.is_some(),
        }
    }

    /// The finished summary. Blocks until the worker thread has joined.
    pub fn summary(&mut self) -> Result<&AudioSummary> {
        if let Some(task) = self.task.take() {
            let summary = match task.join() {
                Ok(summary) => summary,
                Err(panic) => std::panic::resume_unwind(panic),
            };
            self.summary = Some(summary);
        }
        self.summary.as_ref().ok_or(ScopeError::ComputationNotStarted)
    }

    /// Normalized amplitudes. Blocks like [`summary`](Self::summary).
    pub fn envelope(&mut self) -> Result<&[i64]> {
        Ok(&self.summary()?.audio_amplitudes)
    }

    /// Envelope image of the given height, [`ENVELOPE_IMAGE_HEIGHT`] by
    /// default. Blocks like [`summary`](Self::summary).
    pub fn draw_envelope(&mut self, height: u32) -> Result<Raster> {
        Ok(self.summary()?.draw(height))
    }

    pub fn clip(&self) -> &str {
        &self.clip
    }

    pub fn clip_id(&self) -> i32 {
        self.clip_id
    }

    pub fn start_pos(&self) -> usize {
        self.start_pos
    }

    pub fn len(&self) -> usize {
        self.envelope_size
    }

    /// Log size and maximum of the summary. A worker that already finished
    /// is joined first; a running one is not waited for.
    pub fn dump_info(&mut self) {
        let finished = self.task.as_ref().map_or(false, |task| task.is_finished());
        if finished {
            if let Err(err) = self.summary() {
                log::debug!("Envelope info unavailable: {}", err);
            }
        }
        match &self.summary {
            Some(summary) => log::debug!(
                "Envelope info for clip {} (id {}, start {}): size = {}, max = {}",
                self.clip,
                self.clip_id,
                self.start_pos,
                summary.len(),
                summary.amplitude_max
            ),
            None => log::debug!("Envelope not yet generated, no information available."),
        }
    }
}

impl Drop for AudioEnvelope {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            if task.join().is_err() {
                log::warn!("Envelope worker for clip {} panicked", self.clip);
            }
        }
    }
}

fn load_and_normalize(source: Option<Box<dyn SampleSource>>, offset: usize, size: usize) -> AudioSummary {
    log::debug!("Loading envelope ...");
    let started = Instant::now();
    let mut raw = vec![0i64; size];

    if let Some(mut source) = source {
        let frame_rate = source.frame_rate();
        let sample_rate = source.sample_rate();

        match source.seek(offset) {
            Ok(()) => {
                for (i, slot) in raw.iter_mut().enumerate() {
                    match source.get_frame(i) {
                        Ok(frame) => *slot = frame_amplitude(&frame, frame_rate, sample_rate),
                        Err(err) => log::debug!("Frame {} unreadable: {}", offset + i, err),
                    }
                }
            }
            Err(err) => log::warn!("Seeking to frame {} failed: {}", offset, err),
        }
    }

    log::debug!(
        "Calculating the envelope ({} frames) took {} ms",
        size,
        started.elapsed().as_millis()
    );
    AudioSummary::from_raw(raw)
}

/// Sum of absolute first-channel sample values in one frame.
fn frame_amplitude(frame: &AudioFrame, frame_rate: f64, sample_rate: u32) -> i64 {
    let count = samples_for_frame(frame_rate, sample_rate, frame.position).min(frame.sample_count);
    let channels = frame.channels.max(1) as usize;
    frame
        .samples
        .iter()
        .step_by(channels)
        .take(count)
        .map(|&s| (s as i64).abs())
        .sum()
}

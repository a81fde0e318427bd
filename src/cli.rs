use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::audio::window::WindowFunction;

#[derive(Parser, Debug)]
#[command(name = "audioscope", about = "Audio envelope summaries and scrolling spectrogram videos")]
pub struct Cli {
    /// Config file (defaults to audioscope.toml or the user config)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compute the per-frame amplitude envelope of an audio file
    Envelope(EnvelopeArgs),
    /// Render a scrolling spectrogram video of an audio file
    Spectrogram(SpectrogramArgs),
}

#[derive(Args, Debug)]
pub struct EnvelopeArgs {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: PathBuf,

    /// Timeline frames per second
    #[arg(long, default_value_t = 25.0)]
    pub frame_rate: f64,

    /// First frame of the range
    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    /// Number of frames, 0 for the rest of the file
    #[arg(long, default_value_t = 0)]
    pub length: usize,

    /// Write the summary JSON here instead of stdout
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Also render the envelope as an image (e.g. envelope.png)
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Height of the envelope image
    #[arg(long, default_value_t = 400)]
    pub image_height: u32,
}

#[derive(Args, Debug)]
pub struct SpectrogramArgs {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: PathBuf,

    /// Output video file
    #[arg(short, long, default_value = "spectrogram.mp4")]
    pub output: PathBuf,

    /// Video width in pixels
    #[arg(long, default_value_t = 960)]
    pub width: u32,

    /// Video height in pixels
    #[arg(long, default_value_t = 540)]
    pub height: u32,

    /// Frames per second; each frame contributes one spectrum
    #[arg(long, default_value_t = 30)]
    pub fps: u32,

    /// H.264 CRF quality (0-51, lower = better)
    #[arg(long, default_value_t = 18)]
    pub crf: u32,

    /// FFmpeg video codec
    #[arg(long, default_value = "libx264")]
    pub codec: String,

    /// FFmpeg pixel format
    #[arg(long, default_value = "yuv420p")]
    pub pix_fmt: String,

    /// FFT window size (256, 512, 1024 or 2048)
    #[arg(long)]
    pub window_size: Option<usize>,

    /// Window function applied before the FFT
    #[arg(long, value_enum)]
    pub window: Option<WindowFunction>,

    /// Lowest displayed level in dB
    #[arg(long, allow_hyphen_values = true)]
    pub db_min: Option<i32>,

    /// Highest displayed level in dB
    #[arg(long, allow_hyphen_values = true)]
    pub db_max: Option<i32>,

    /// Highest displayed frequency in Hz (default: half the sampling rate)
    #[arg(long)]
    pub freq_max: Option<u32>,

    /// Hide the frame/frequency grid
    #[arg(long)]
    pub no_grid: bool,

    /// Rescale as if the scope was dragged by "DX,DY" pixels. DX moves the
    /// maximum frequency, DY the dB floor, or the ceiling with ",shift".
    /// May be repeated.
    #[arg(long = "drag", value_parser = parse_drag, allow_hyphen_values = true)]
    pub drags: Vec<Drag>,

    /// Follow the sampling rate for the maximum frequency, ignoring a
    /// configured one
    #[arg(long)]
    pub reset_max_freq: bool,

    /// Fixed cursor position "X,Y" in pixels, drawn as a crosshair
    #[arg(long, value_parser = parse_point)]
    pub cursor: Option<(i32, i32)>,

    /// TrueType font for axis labels
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Label font size in pixels
    #[arg(long, default_value_t = 13.0)]
    pub font_size: f32,

    /// Store the effective scope settings in the user config file
    #[arg(long)]
    pub save_settings: bool,
}

/// Mouse movement applied to the scope before rendering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Drag {
    pub dx: i32,
    pub dy: i32,
    pub shift: bool,
}

fn parse_drag(s: &str) -> Result<Drag, String> {
    let (point, shift) = match s.rsplit_once(',') {
        Some((point, modifier)) if modifier.trim() == "shift" => (point, true),
        _ => (s, false),
    };
    let (dx, dy) = parse_point(point)?;
    Ok(Drag { dx, dy, shift })
}

fn parse_point(s: &str) -> Result<(i32, i32), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{}'", s))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<i32>()
            .map_err(|e| format!("invalid coordinate '{}': {}", v, e))
    };
    Ok((parse(x)?, parse(y)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_parsing() {
        assert_eq!(parse_point("120, 45"), Ok((120, 45)));
        assert!(parse_point("120").is_err());
        assert!(parse_point("a,1").is_err());
    }

    #[test]
    fn drag_parsing() {
        assert_eq!(parse_drag("10,-5"), Ok(Drag { dx: 10, dy: -5, shift: false }));
        assert_eq!(parse_drag("0,-20,shift"), Ok(Drag { dx: 0, dy: -20, shift: true }));
        assert!(parse_drag("0,-20,ctrl").is_err());
        assert!(parse_drag("5").is_err());
    }

    #[test]
    fn spectrogram_options_parse() {
        let cli = Cli::parse_from([
            "audioscope",
            "spectrogram",
            "in.wav",
            "--window",
            "hamming",
            "--db-min",
            "-90",
            "--cursor",
            "300,200",
            "--drag",
            "-10,0",
            "--drag",
            "0,-6,shift",
            "--reset-max-freq",
        ]);
        match cli.command {
            Command::Spectrogram(args) => {
                assert_eq!(args.window, Some(WindowFunction::Hamming));
                assert_eq!(args.db_min, Some(-90));
                assert_eq!(args.cursor, Some((300, 200)));
                assert_eq!(args.width, 960);
                assert_eq!(args.drags.len(), 2);
                assert_eq!(args.drags[0], Drag { dx: -10, dy: 0, shift: false });
                assert!(args.drags[1].shift);
                assert!(args.reset_max_freq);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn envelope_options_parse() {
        let cli = Cli::parse_from(["audioscope", "envelope", "in.flac", "--length", "100"]);
        match cli.command {
            Command::Envelope(args) => {
                assert_eq!(args.length, 100);
                assert_eq!(args.frame_rate, 25.0);
                assert!(args.image.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}

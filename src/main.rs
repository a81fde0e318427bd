mod audio;
mod cli;
mod config;
mod encode;
mod error;
mod render;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use audio::decode::{decode_audio, DecodedClips};
use audio::envelope::{AudioEnvelope, EnvelopeRequest};
use audio::source::{BufferSource, SampleSource};
use audio::spectrum::SampleBlock;
use cli::{Cli, Command, Drag, EnvelopeArgs, SpectrogramArgs};
use config::{Config, SpectrogramConfig};
use encode::ffmpeg::{FfmpegEncoder, VideoSettings};
use render::geometry::ScopeGeometry;
use render::params::{Modifiers, RenderParameters};
use render::raster::Raster;
use render::scope::Spectrogram;
use render::text::TextOverlay;

const BACKGROUND: [u8; 4] = [18, 18, 28, 255];

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    // Load config: explicit --config path, or auto-detect audioscope.toml / global config
    let config_path = cli.config.clone().or_else(config::discover_config);
    let config = match config_path {
        Some(ref path) => match config::load_config(path) {
            Some(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            None => {
                log::warn!("Failed to load config from {}", path.display());
                Config::default()
            }
        },
        None => Config::default(),
    };

    match cli.command {
        Command::Envelope(args) => run_envelope(args, &config),
        Command::Spectrogram(args) => run_spectrogram(args, config, config_path),
    }
}

fn run_envelope(mut args: EnvelopeArgs, config: &Config) -> Result<()> {
    // Merge: config values apply only when CLI is at its default
    if args.frame_rate == 25.0 { args.frame_rate = config.envelope.frame_rate; }
    if args.image_height == 400 { args.image_height = config.envelope.image_height; }

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }
    if args.frame_rate <= 0.0 {
        anyhow::bail!("Frame rate must be positive, got {}", args.frame_rate);
    }

    log::info!("Input: {}", args.input.display());
    log::info!("Decoding audio...");
    let data = decode_audio(&args.input)?;

    let clip = args.input.display().to_string();
    let mut clips = DecodedClips::new(args.frame_rate);
    clips.insert(clip.clone(), data);

    let request = EnvelopeRequest {
        offset: args.offset,
        length: args.length,
        ..EnvelopeRequest::whole_clip(clip)
    };
    let mut envelope = AudioEnvelope::new(&clips, request)?;
    log::info!(
        "Computing envelope of {} frames at {} fps",
        envelope.len(),
        args.frame_rate
    );

    let (tx, rx) = mpsc::channel();
    envelope.start(Some(tx))?;
    log::debug!(
        "Envelope worker for clip {} (id {}, start {}) started: {}",
        envelope.clip(),
        envelope.clip_id(),
        envelope.start_pos(),
        envelope.has_started()
    );

    let spinner = ProgressBar::new_spinner();
    spinner.set_message("Computing envelope...");
    let ready = loop {
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => break Some(event),
            // The worker sends before it exits, so a finished worker has
            // already queued its event.
            Err(RecvTimeoutError::Timeout) if envelope.is_finished() => break rx.try_recv().ok(),
            Err(RecvTimeoutError::Timeout) => spinner.tick(),
            Err(RecvTimeoutError::Disconnected) => break None,
        }
    };
    spinner.finish_and_clear();
    match ready {
        Some(event) => log::info!("Envelope ready for {}", event.clip),
        None => log::warn!("Envelope worker exited without reporting"),
    }

    envelope.dump_info();
    let values = envelope.envelope()?.len();
    let summary = envelope.summary()?;
    if summary.is_empty() {
        log::warn!("Requested range is empty, the envelope has no values");
    }

    let json = serde_json::to_string_pretty(summary).context("Failed to serialize envelope")?;
    match args.json {
        Some(ref path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Wrote envelope summary ({} values) to {}", values, path.display());
        }
        None => println!("{}", json),
    }

    if let Some(ref path) = args.image {
        let image = envelope.draw_envelope(args.image_height)?;
        FfmpegEncoder::write_image(path, &image)?;
    }

    Ok(())
}

fn run_spectrogram(
    mut args: SpectrogramArgs,
    config: Config,
    config_path: Option<std::path::PathBuf>,
) -> Result<()> {
    // Merge: config values apply only when CLI is at its default
    let output = config.output;
    if args.width == 960 { args.width = output.width; }
    if args.height == 540 { args.height = output.height; }
    if args.fps == 30 { args.fps = output.fps; }
    if args.crf == 18 { args.crf = output.crf; }
    if args.codec == "libx264" { args.codec = output.codec; }
    if args.font.is_none() { args.font = output.font; }

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }
    if args.fps == 0 {
        anyhow::bail!("Frame rate must be positive");
    }

    let params = scope_parameters(&args, &config.spectrogram);

    log::info!("Input: {}", args.input.display());
    log::info!("Output: {}", args.output.display());
    log::info!("Resolution: {}x{} @ {}fps", args.width, args.height, args.fps);
    log::info!("Decoding audio...");
    let data = decode_audio(&args.input)?;
    let mut source = BufferSource::new(data.samples.clone(), data.sample_rate, data.channels, args.fps as f64);
    source.seek(0)?;
    let total_frames = source.total_frames();
    log::info!("Total frames: {}, Duration: {:.1}s", total_frames, data.duration());

    let overlay = TextOverlay::discover(args.font.as_deref(), args.font_size);
    if overlay.is_none() {
        log::info!("No usable font found, axis labels are not drawn");
    }

    let mut scope = Spectrogram::new(params, config.spectrogram.hud_options());
    if let Some(size) = args.window_size {
        scope.set_window_size(size);
    }
    if let Some(window) = args.window {
        scope.set_window_function(window);
    }
    let mut options = scope.options();
    if args.no_grid {
        options.draw_grid = false;
    }
    if args.cursor.is_some() {
        options.track_mouse = true;
    }
    scope.set_options(options);
    scope.set_mouse(args.cursor);
    log::info!(
        "Window: {} samples, {}, range {} to {} dB",
        scope.params().window_size,
        scope.params().window.label(),
        scope.params().db_min,
        scope.params().db_max
    );
    let geometry = ScopeGeometry::new(args.width, args.height);

    log::info!("Starting FFmpeg encoder...");
    let settings = VideoSettings {
        width: args.width,
        height: args.height,
        fps: args.fps,
        codec: &args.codec,
        pix_fmt: &args.pix_fmt,
        crf: args.crf,
    };
    let mut encoder = FfmpegEncoder::new(&args.output, Some(&args.input), &settings)?;

    let pb = ProgressBar::new(total_frames as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} frames ({eta} remaining)")
            .unwrap()
            .progress_chars("=>-"),
    );

    // The HUD only changes with the parameters
    let mut hud: Option<(RenderParameters, Raster)> = None;

    for frame_idx in 0..total_frames {
        let frame = source.get_frame(frame_idx)?;
        let block = SampleBlock::new(frame.samples, data.sample_rate, frame.channels);
        scope.push_block(&block);
        if frame_idx == 0 {
            // Adjustments relative to the sampling-rate default need the first block
            apply_adjustments(&mut scope, &args);
        }

        if hud.as_ref().map_or(true, |(p, _)| p != scope.params()) {
            hud = Some((scope.params().clone(), scope.render_hud(geometry, overlay.as_ref())));
        }

        let mut image = Raster::filled(args.width, args.height, BACKGROUND);
        image.composite(scope.render_scope(geometry));
        log::trace!("Frame {} rendered: {:?}", frame_idx, scope.last_render_mode());
        if let Some((_, ref hud_image)) = hud {
            image.composite(hud_image);
        }

        encoder.write_frame(image.pixels())?;
        pb.set_position(frame_idx as u64 + 1);
    }

    pb.finish_with_message("Rendering complete");
    log::info!(
        "FFT size {} ({}) at {} Hz, {}/{} spectra in history",
        scope.effective_window_size(),
        scope.params().window.label(),
        scope.sampling_rate(),
        scope.history().len(),
        scope.history().capacity()
    );

    log::info!("Finishing encoding...");
    encoder.finish()?;

    if args.save_settings {
        let path = config_path
            .or_else(config::user_config_path)
            .context("No config location available")?;
        let settings = SpectrogramConfig::from_scope(scope.params(), scope.options());
        config::save_config(&path, &settings)?;
    }

    log::info!("Done! Output: {}", args.output.display());
    Ok(())
}

/// Config values overridden by whatever was given on the command line.
fn scope_parameters(args: &SpectrogramArgs, config: &SpectrogramConfig) -> RenderParameters {
    let mut params = config.render_parameters();
    if let Some(db) = args.db_min {
        params.db_min = db;
    }
    if let Some(db) = args.db_max {
        params.db_max = db;
    }
    if let Some(hz) = args.freq_max {
        params.set_freq_max(hz);
    }
    params.sanitize();
    params
}

/// Maximum frequency reset and drags from the command line, in that order.
fn apply_adjustments(scope: &mut Spectrogram, args: &SpectrogramArgs) {
    if args.reset_max_freq {
        scope.reset_max_freq();
        log::info!("Maximum frequency follows the sampling rate: {} Hz", scope.params().freq_max);
    }
    for &Drag { dx, dy, shift } in &args.drags {
        if scope.drag((dx, dy), Modifiers { shift }) {
            let p = scope.params();
            log::info!(
                "Dragged by {},{}: {} to {} dB, up to {} Hz",
                dx, dy, p.db_min, p.db_max, p.freq_max
            );
        }
    }
}

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use std::process::{Child, Command, Stdio};

use crate::render::raster::Raster;

/// Video encoding settings passed through to ffmpeg.
pub struct VideoSettings<'a> {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub codec: &'a str,
    pub pix_fmt: &'a str,
    pub crf: u32,
}

pub struct FfmpegEncoder {
    child: Child,
    frame_bytes: usize,
}

impl FfmpegEncoder {
    /// Start an encoder reading raw RGBA frames from stdin. The audio of
    /// `input_audio` is muxed in when given.
    pub fn new(output_path: &Path, input_audio: Option<&Path>, settings: &VideoSettings) -> Result<Self> {
        let mut args = raw_input_args(settings.width, settings.height);
        args.extend(["-framerate".into(), settings.fps.to_string()]);
        args.extend(["-i".into(), "pipe:0".into()]);

        if let Some(audio) = input_audio {
            args.extend(["-i".into(), path_arg(audio)?]);
        }

        args.extend([
            "-c:v".into(), settings.codec.to_string(),
            "-pix_fmt".into(), settings.pix_fmt.to_string(),
            "-crf".into(), settings.crf.to_string(),
            "-preset".into(), "medium".into(),
        ]);

        if input_audio.is_some() {
            args.extend([
                "-c:a".into(), "aac".into(),
                "-b:a".into(), "192k".into(),
                "-shortest".into(),
            ]);
        }
        args.push(path_arg(output_path)?);

        let encoder = Self::spawn(&args, settings.width, settings.height)?;
        log::info!(
            "FFmpeg encoder started: {}x{} @ {}fps, codec={}",
            settings.width, settings.height, settings.fps, settings.codec
        );
        Ok(encoder)
    }

    /// Encode a single raster as an image file; the format follows the
    /// output extension.
    pub fn write_image(output_path: &Path, image: &Raster) -> Result<()> {
        if image.width() == 0 || image.height() == 0 {
            anyhow::bail!("Cannot write an empty {}x{} image", image.width(), image.height());
        }
        let mut args = raw_input_args(image.width(), image.height());
        args.extend(["-i".into(), "pipe:0".into(), "-frames:v".into(), "1".into()]);
        args.push(path_arg(output_path)?);

        let mut encoder = Self::spawn(&args, image.width(), image.height())?;
        encoder.write_frame(image.pixels())?;
        encoder.finish()?;
        log::info!("Wrote {}x{} image to {}", image.width(), image.height(), output_path.display());
        Ok(())
    }

    fn spawn(args: &[String], width: u32, height: u32) -> Result<Self> {
        let child = Command::new("ffmpeg")
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to spawn ffmpeg. Is ffmpeg installed?")?;

        Ok(Self {
            child,
            frame_bytes: width as usize * height as usize * 4,
        })
    }

    pub fn write_frame(&mut self, rgba_pixels: &[u8]) -> Result<()> {
        if rgba_pixels.len() != self.frame_bytes {
            anyhow::bail!(
                "Frame has {} bytes, encoder expects {}",
                rgba_pixels.len(),
                self.frame_bytes
            );
        }
        let stdin = self.child.stdin.as_mut().context("FFmpeg stdin not available")?;
        stdin.write_all(rgba_pixels).context("Failed to write frame to ffmpeg")?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        // Close stdin to signal EOF
        drop(self.child.stdin.take());

        let output = self.child.wait_with_output().context("Failed to wait for ffmpeg")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("FFmpeg exited with error:\n{}", stderr);
        }

        log::debug!("FFmpeg encoding complete");
        Ok(())
    }
}

fn raw_input_args(width: u32, height: u32) -> Vec<String> {
    vec![
        "-y".into(),
        "-loglevel".into(), "error".into(),
        "-f".into(), "rawvideo".into(),
        "-pixel_format".into(), "rgba".into(),
        "-video_size".into(), format!("{}x{}", width, height),
    ]
}

fn path_arg(path: &Path) -> Result<String> {
    path.to_str()
        .map(str::to_string)
        .with_context(|| format!("Path is not valid UTF-8: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_input_describes_frame_size() {
        let args = raw_input_args(640, 360);
        let size = args.iter().position(|a| a == "-video_size").unwrap();
        assert_eq!(args[size + 1], "640x360");
        assert!(args.contains(&"rgba".to_string()));
    }

    #[test]
    fn empty_image_is_rejected_before_spawning() {
        let err = FfmpegEncoder::write_image(Path::new("out.png"), &Raster::new(0, 400)).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }
}

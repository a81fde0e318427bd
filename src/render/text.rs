use anyhow::{Context, Result};
use fontdue::{Font, FontSettings};
use std::path::{Path, PathBuf};

use super::raster::Raster;

// Tried in order when no font is configured.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationMono-Regular.ttf",
    "/usr/share/fonts/liberation-mono/LiberationMono-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

pub struct TextOverlay {
    font: Font,
    font_size: f32,
}

impl TextOverlay {
    pub fn from_bytes(bytes: &[u8], font_size: f32) -> Result<Self> {
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|e| anyhow::anyhow!("Failed to parse font: {}", e))?;
        Ok(Self { font, font_size })
    }

    pub fn from_file(path: &Path, font_size: f32) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read font: {}", path.display()))?;
        Self::from_bytes(&bytes, font_size)
    }

    /// Load the configured font, or the first usable system font.
    pub fn discover(configured: Option<&Path>, font_size: f32) -> Option<Self> {
        if let Some(path) = configured {
            match Self::from_file(path, font_size) {
                Ok(overlay) => return Some(overlay),
                Err(err) => log::warn!("{:#}", err),
            }
        }
        FONT_CANDIDATES
            .iter()
            .map(PathBuf::from)
            .filter(|p| p.exists())
            .find_map(|p| match Self::from_file(&p, font_size) {
                Ok(overlay) => {
                    log::debug!("Using font {}", p.display());
                    Some(overlay)
                }
                Err(err) => {
                    log::debug!("{:#}", err);
                    None
                }
            })
    }

    /// Blend `text` onto the raster with its baseline at `baseline`.
    pub fn composite(&self, raster: &mut Raster, text: &str, x: i32, baseline: i32, color: [u8; 4]) {
        let mut cursor_x = x as f32;
        for ch in text.chars() {
            let (metrics, bitmap) = self.font.rasterize(ch, self.font_size);
            let glyph_x = cursor_x.round() as i32 + metrics.xmin;
            let glyph_y = baseline - metrics.height as i32 - metrics.ymin;

            for gy in 0..metrics.height {
                for gx in 0..metrics.width {
                    let coverage = bitmap[gy * metrics.width + gx];
                    if coverage == 0 {
                        continue;
                    }
                    let alpha = (coverage as u32 * color[3] as u32 / 255) as u8;
                    raster.blend_pixel(
                        glyph_x + gx as i32,
                        glyph_y + gy as i32,
                        [color[0], color[1], color[2], alpha],
                    );
                }
            }

            cursor_x += metrics.advance_width;
        }
    }

    /// Measure the width of rendered text in pixels.
    pub fn measure_width(&self, text: &str) -> u32 {
        let width: f32 = text
            .chars()
            .map(|ch| self.font.metrics(ch, self.font_size).advance_width)
            .sum();
        width.ceil() as u32
    }
}

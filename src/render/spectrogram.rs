use rayon::prelude::*;
use std::time::Instant;

use super::geometry::ScopeGeometry;
use super::params::RenderParameters;
use super::raster::Raster;
use crate::audio::spectrum::SpectralHistory;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheState {
    Valid,
    /// Parameters or geometry changed; the next render is a full redraw
    Stale,
}

/// How the last image was produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderMode {
    Full,
    /// Cached image scrolled up by this many new rows
    Incremental(usize),
    /// Nothing new, cached image returned as is
    Reused,
}

/// Inputs the cached image was rendered against.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Fingerprint {
    geometry: ScopeGeometry,
    params: RenderParameters,
    sampling_rate: u32,
}

struct CachedImage {
    image: Raster,
    fingerprint: Fingerprint,
    revision: u64,
}

/// Turns spectral history into a scrolling image, newest spectrum in the
/// bottom row of the plot.
pub struct SpectrogramRenderer {
    cache: Option<CachedImage>,
    state: CacheState,
    last_mode: RenderMode,
}

impl SpectrogramRenderer {
    pub fn new() -> Self {
        Self {
            cache: None,
            state: CacheState::Stale,
            last_mode: RenderMode::Full,
        }
    }

    /// Force the next render to redraw every row.
    pub fn invalidate(&mut self) {
        self.state = CacheState::Stale;
    }

    pub fn state(&self) -> CacheState {
        self.state
    }

    pub fn last_mode(&self) -> RenderMode {
        self.last_mode
    }

    pub fn render_frame(
        &mut self,
        history: &SpectralHistory,
        params: &RenderParameters,
        geometry: &ScopeGeometry,
        sampling_rate: u32,
    ) -> &Raster {
        let started = Instant::now();
        let fingerprint = Fingerprint {
            geometry: *geometry,
            params: params.clone(),
            sampling_rate,
        };
        let mode = self.plan(history, &fingerprint);

        let mut image = match (mode, self.cache.take()) {
            (RenderMode::Full, _) | (_, None) => Raster::new(geometry.width, geometry.height),
            (_, Some(cached)) => cached.image,
        };

        let plot = geometry.plot;
        let rows = match mode {
            RenderMode::Full => {
                let rows = history.len().min(plot.height as usize);
                draw_rows(&mut image, history, rows, &fingerprint);
                rows
            }
            RenderMode::Incremental(rows) => {
                image.shift_band_up(plot.top, plot.height, rows as u32);
                draw_rows(&mut image, history, rows, &fingerprint);
                rows
            }
            RenderMode::Reused => 0,
        };

        log::trace!(
            "Rendered {} lines from {} available spectra in {} us ({:?})",
            rows,
            history.len(),
            started.elapsed().as_micros(),
            mode
        );

        self.last_mode = mode;
        self.state = CacheState::Valid;
        let cached = self.cache.insert(CachedImage {
            image,
            fingerprint,
            revision: history.revision(),
        });
        &cached.image
    }

    fn plan(&self, history: &SpectralHistory, fingerprint: &Fingerprint) -> RenderMode {
        let cached = match &self.cache {
            Some(cached) if self.state == CacheState::Valid && cached.fingerprint == *fingerprint => cached,
            _ => return RenderMode::Full,
        };

        let new_rows = history.revision().saturating_sub(cached.revision);
        if new_rows == 0 {
            RenderMode::Reused
        } else if new_rows < fingerprint.geometry.plot.height as u64 {
            RenderMode::Incremental(new_rows as usize)
        } else {
            RenderMode::Full
        }
    }
}

impl Default for SpectrogramRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Draw the `count` newest spectra into the bottom rows of the plot.
fn draw_rows(image: &mut Raster, history: &SpectralHistory, count: usize, fp: &Fingerprint) {
    let plot = fp.geometry.plot;
    if count == 0 || history.is_empty() || plot.width == 0 || plot.height == 0 || fp.sampling_rate == 0 {
        return;
    }

    // A plot reaching past the image is cut at its right edge
    let stride = image.width() as usize * 4;
    let x0 = (plot.left as usize * 4).min(stride);
    let x1 = (x0 + plot.width as usize * 4).min(stride);
    if x0 == x1 {
        return;
    }
    let count = count.min(history.len()).min(plot.height as usize);
    let first = plot.height as usize - count;
    let params = &fp.params;

    image
        .rows_mut(plot.top, plot.height)
        .par_chunks_mut(stride)
        .enumerate()
        .skip(first)
        .for_each(|(row, line)| {
            let age = plot.height as usize - 1 - row;
            let Some(frame) = history.get(age) else {
                return;
            };
            let out = &mut line[x0..x1];
            out.fill(0);
            render_row(
                &frame[..],
                out,
                params.freq_max,
                fp.sampling_rate,
                params.db_min,
                params.db_max,
            );
        });
}

/// Map one spectrum onto a row of RGBA pixels, white with dB-scaled alpha.
///
/// Pixel `i` shows frequency `i / (width - 1) * freq_max`. Pixels past the
/// last bin are left untouched.
pub fn render_row(bins: &[f32], out: &mut [u8], freq_max: u32, sampling_rate: u32, db_min: i32, db_max: i32) {
    let width = out.len() / 4;
    let n = bins.len();
    if n == 0 || width == 0 || sampling_rate == 0 {
        return;
    }

    let span = (db_max - db_min).max(1) as f32;
    let last_bin = (n - 1) as f32;
    let mut x_prev = 0.0f32;

    for (i, px) in out.chunks_exact_mut(4).enumerate() {
        let f = if width > 1 {
            i as f32 / (width - 1) as f32 * freq_max as f32
        } else {
            0.0
        };
        let x = 2.0 * f / sampling_rate as f32 * last_bin;
        if x >= n as f32 {
            break;
        }
        let xi = x.floor() as usize;

        let val = if i == 0 || xi >= n - 1 {
            bins[xi.min(n - 1)]
        } else if bins[xi] > bins[xi + 1] && x_prev < xi as f32 {
            // A narrow peak between two pixel positions would otherwise be
            // averaged away; take the bin itself on the first pixel past it.
            bins[xi]
        } else {
            (xi as f32 + 1.0 - x) * bins[xi] + (x - xi as f32) * bins[xi + 1]
        };

        let level = ((val - db_max as f32) / span + 1.0).clamp(0.0, 1.0);
        px.copy_from_slice(&[255, 255, 255, (level * 255.0) as u8]);
        x_prev = x;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::spectrum::SpectralFrame;
    use crate::render::geometry::PlotRect;

    fn params(db_min: i32, freq_max: u32) -> RenderParameters {
        RenderParameters {
            db_min,
            db_max: 0,
            freq_max,
            ..RenderParameters::default()
        }
    }

    fn alphas(out: &[u8]) -> Vec<u8> {
        out.chunks_exact(4).map(|px| px[3]).collect()
    }

    #[test]
    fn row_interpolates_between_bins() {
        let mut out = vec![0u8; 3 * 4];
        render_row(&[-100.0, -50.0, 0.0], &mut out, 250, 1000, -100, 0);
        // x = 0, 0.5, 1.0
        assert_eq!(alphas(&out), vec![0, 63, 127]);
    }

    #[test]
    fn row_preserves_narrow_peaks() {
        let mut out = vec![0u8; 3 * 4];
        render_row(&[-100.0, 0.0, -100.0], &mut out, 750, 1000, -100, 0);
        // x = 0, 1.5, 3.0 (past the data)
        assert_eq!(alphas(&out), vec![0, 255, 0]);
    }

    #[test]
    fn row_stops_past_last_bin() {
        let mut out = vec![7u8; 4 * 4];
        render_row(&[0.0, 0.0], &mut out, 1000, 1000, -60, 0);
        // x = 0, 0.67, 1.33, 2.0; the last pixel is beyond the data
        assert_eq!(&out[12..16], &[7, 7, 7, 7]);
        assert_eq!(out[3], 255);
    }

    #[test]
    fn row_clamps_levels() {
        let mut out = vec![0u8; 2 * 4];
        render_row(&[20.0, -500.0], &mut out, 500, 1000, -70, 0);
        assert_eq!(alphas(&out), vec![255, 0]);
    }

    fn geometry(width: u32, height: u32) -> ScopeGeometry {
        ScopeGeometry {
            width: width + 4,
            height: height + 2,
            plot: PlotRect {
                left: 2,
                top: 1,
                width,
                height,
            },
        }
    }

    fn frame(level: f32) -> SpectralFrame {
        vec![level; 16].into()
    }

    #[test]
    fn newest_row_is_at_the_bottom() {
        let mut history = SpectralHistory::new(100);
        history.push(frame(0.0));
        history.push(frame(-100.0));
        let g = geometry(8, 5);
        let mut renderer = SpectrogramRenderer::new();
        let image = renderer.render_frame(&history, &params(-100, 1000), &g, 2000);

        // newest (silent) at plot bottom, older (loud) above it
        assert_eq!(image.get_pixel(2, 5)[3], 0);
        assert_eq!(image.get_pixel(2, 4)[3], 255);
        assert_eq!(image.get_pixel(2, 3)[3], 0);
        // margins stay transparent
        assert_eq!(image.get_pixel(0, 4)[3], 0);
    }

    #[test]
    fn unchanged_inputs_give_identical_images() {
        let mut history = SpectralHistory::new(100);
        for i in 0..4 {
            history.push(frame(-10.0 * i as f32));
        }
        let g = geometry(8, 6);
        let p = params(-70, 1000);
        let mut renderer = SpectrogramRenderer::new();
        let first = renderer.render_frame(&history, &p, &g, 2000).clone();
        let second = renderer.render_frame(&history, &p, &g, 2000).clone();
        assert_eq!(renderer.last_mode(), RenderMode::Reused);
        assert_eq!(first, second);
    }

    #[test]
    fn incremental_matches_full_redraw() {
        let g = geometry(8, 6);
        let p = params(-70, 1000);
        let mut history = SpectralHistory::new(100);
        let mut incremental = SpectrogramRenderer::new();

        for i in 0..10 {
            history.push(frame(-7.0 * i as f32));
            incremental.render_frame(&history, &p, &g, 2000);
        }
        assert_eq!(incremental.last_mode(), RenderMode::Incremental(1));

        history.push(frame(-3.0));
        history.push(frame(-33.0));
        let scrolled = incremental.render_frame(&history, &p, &g, 2000).clone();
        assert_eq!(incremental.last_mode(), RenderMode::Incremental(2));

        let mut fresh = SpectrogramRenderer::new();
        let full = fresh.render_frame(&history, &p, &g, 2000);
        assert_eq!(&scrolled, full);
    }

    #[test]
    fn parameter_or_geometry_change_forces_full_redraw() {
        let mut history = SpectralHistory::new(100);
        history.push(frame(-20.0));
        let g = geometry(8, 6);
        let mut renderer = SpectrogramRenderer::new();
        renderer.render_frame(&history, &params(-70, 1000), &g, 2000);

        history.push(frame(-30.0));
        renderer.render_frame(&history, &params(-80, 1000), &g, 2000);
        assert_eq!(renderer.last_mode(), RenderMode::Full);

        renderer.render_frame(&history, &params(-80, 1000), &geometry(9, 6), 2000);
        assert_eq!(renderer.last_mode(), RenderMode::Full);

        renderer.invalidate();
        assert_eq!(renderer.state(), CacheState::Stale);
        renderer.render_frame(&history, &params(-80, 1000), &geometry(9, 6), 2000);
        assert_eq!(renderer.last_mode(), RenderMode::Full);
        assert_eq!(renderer.state(), CacheState::Valid);
    }

    #[test]
    fn many_new_rows_fall_back_to_full_redraw() {
        let g = geometry(4, 3);
        let p = params(-70, 1000);
        let mut history = SpectralHistory::new(100);
        history.push(frame(0.0));
        let mut renderer = SpectrogramRenderer::new();
        renderer.render_frame(&history, &p, &g, 2000);
        for _ in 0..5 {
            history.push(frame(-10.0));
        }
        renderer.render_frame(&history, &p, &g, 2000);
        assert_eq!(renderer.last_mode(), RenderMode::Full);
    }

    #[test]
    fn plot_wider_than_image_is_cut_off() {
        let mut history = SpectralHistory::new(100);
        history.push(frame(0.0));
        let g = ScopeGeometry {
            width: 10,
            height: 4,
            plot: PlotRect {
                left: 6,
                top: 0,
                width: 8,
                height: 4,
            },
        };
        let mut renderer = SpectrogramRenderer::new();
        let image = renderer.render_frame(&history, &params(-70, 1000), &g, 2000);
        assert_eq!(image.size(), (10, 4));
        assert_eq!(image.get_pixel(5, 3)[3], 0);
        assert_eq!(image.get_pixel(6, 3)[3], 255);
        assert_eq!(image.get_pixel(9, 3)[3], 255);
    }
}

use super::geometry::ScopeGeometry;
use super::hud::{self, HudOptions};
use super::params::{DragAxis, Modifiers, RenderParameters};
use super::raster::Raster;
use super::spectrogram::{RenderMode, SpectrogramRenderer};
use super::text::TextOverlay;
use crate::audio::spectrum::{SampleBlock, SpectralAnalyzer, SpectralHistory};
use crate::audio::window::WindowFunction;

/// Scope state for one display session: analysis history, display
/// parameters and the cached image, fed with sample blocks and asked for
/// images on each paint.
pub struct Spectrogram {
    analyzer: SpectralAnalyzer,
    renderer: SpectrogramRenderer,
    params: RenderParameters,
    options: HudOptions,
    mouse: Option<(i32, i32)>,
    sampling_rate: u32,
    geometry: Option<ScopeGeometry>,
}

impl Spectrogram {
    pub fn new(mut params: RenderParameters, options: HudOptions) -> Self {
        params.sanitize();
        Self {
            analyzer: SpectralAnalyzer::new(),
            renderer: SpectrogramRenderer::new(),
            params,
            options,
            mouse: None,
            sampling_rate: 0,
            geometry: None,
        }
    }

    pub fn params(&self) -> &RenderParameters {
        &self.params
    }

    pub fn options(&self) -> HudOptions {
        self.options
    }

    pub fn history(&self) -> &SpectralHistory {
        self.analyzer.history()
    }

    pub fn sampling_rate(&self) -> u32 {
        self.sampling_rate
    }

    /// FFT size actually used for the last block, which may be smaller than
    /// the configured one for short blocks.
    pub fn effective_window_size(&self) -> usize {
        self.analyzer.last_window_size()
    }

    pub fn last_render_mode(&self) -> RenderMode {
        self.renderer.last_mode()
    }

    /// Analyze a block. Returns whether a new spectrum was added.
    pub fn push_block(&mut self, block: &SampleBlock) -> bool {
        if block.sample_rate != 0 && block.sample_rate != self.sampling_rate {
            log::debug!("Sampling rate changed to {} Hz", block.sample_rate);
            self.sampling_rate = block.sample_rate;
            if self.params.apply_sampling_rate(block.sample_rate) {
                self.renderer.invalidate();
            }
        }
        self.analyzer
            .analyze(block, self.params.window_size, self.params.window)
            .is_some()
    }

    /// Render the scrolling plot for the given widget size.
    pub fn render_scope(&mut self, geometry: ScopeGeometry) -> &Raster {
        if self.geometry != Some(geometry) {
            self.geometry = Some(geometry);
            self.renderer.invalidate();
        }
        self.renderer.render_frame(
            self.analyzer.history(),
            &self.params,
            &geometry,
            self.sampling_rate,
        )
    }

    pub fn render_hud(&self, geometry: ScopeGeometry, overlay: Option<&TextOverlay>) -> Raster {
        hud::render_hud(&geometry, &self.params, self.options, self.mouse, overlay)
    }

    pub fn handle_drag(&mut self, movement: (i32, i32), axis: DragAxis, modifiers: Modifiers) -> bool {
        let changed = self.params.handle_drag(movement, axis, modifiers);
        if changed {
            self.renderer.invalidate();
        }
        changed
    }

    /// Apply a free mouse movement: the horizontal part rescales the
    /// frequency axis, the vertical part the dB range.
    pub fn drag(&mut self, movement: (i32, i32), modifiers: Modifiers) -> bool {
        let mut changed = false;
        if movement.0 != 0 {
            changed |= self.handle_drag((movement.0, 0), DragAxis::Horizontal, modifiers);
        }
        if movement.1 != 0 {
            changed |= self.handle_drag((0, movement.1), DragAxis::Vertical, modifiers);
        }
        changed
    }

    /// Forget the user-chosen frequency ceiling and fall back to Nyquist.
    pub fn reset_max_freq(&mut self) {
        self.params.reset_max_freq();
        self.params.apply_sampling_rate(self.sampling_rate);
        self.renderer.invalidate();
    }

    pub fn set_window_size(&mut self, size: usize) -> bool {
        let changed = self.params.set_window_size(size);
        if changed {
            self.renderer.invalidate();
        }
        changed
    }

    pub fn set_window_function(&mut self, window: WindowFunction) {
        if self.params.window != window {
            self.params.window = window;
            self.renderer.invalidate();
        }
    }

    pub fn set_options(&mut self, options: HudOptions) {
        self.options = options;
    }

    /// Cursor position in scope image coordinates, `None` once it left.
    pub fn set_mouse(&mut self, position: Option<(i32, i32)>) {
        self.mouse = position;
    }
}

impl Default for Spectrogram {
    fn default() -> Self {
        Self::new(RenderParameters::default(), HudOptions::default())
    }
}

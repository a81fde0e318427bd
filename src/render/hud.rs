use super::geometry::ScopeGeometry;
use super::params::RenderParameters;
use super::raster::Raster;
use super::text::TextOverlay;

// Minimum pixel distance between two frame lines / frequency lines
const MIN_DIST_Y: i32 = 30;
const MIN_DIST_X: i32 = 40;
const TEXT_DIST_X: i32 = 10;
const TEXT_DIST_Y: i32 = 25;
// Width of the dB ramp and its distance from the plot
const RAMP_GAP: i32 = 6;
const RAMP_WIDTH: i32 = 8;

pub const PEN_LIGHT: [u8; 4] = [200, 200, 250, 150];
pub const PEN_LIGHTER: [u8; 4] = [225, 225, 250, 225];
pub const PEN_THIN: [u8; 4] = [220, 220, 220, 100];
pub const PEN_LIGHT_DOTS: [u8; 4] = [200, 200, 250, 150];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HudOptions {
    pub draw_grid: bool,
    pub track_mouse: bool,
}

impl Default for HudOptions {
    fn default() -> Self {
        Self {
            draw_grid: true,
            track_mouse: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pen {
    Light,
    Lighter,
    Thin,
    LightDots,
}

impl Pen {
    fn color(self) -> [u8; 4] {
        match self {
            Pen::Light => PEN_LIGHT,
            Pen::Lighter => PEN_LIGHTER,
            Pen::Thin => PEN_THIN,
            Pen::LightDots => PEN_LIGHT_DOTS,
        }
    }
}

/// Axis-aligned line segment, endpoints inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HudLine {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
    pub pen: Pen,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HudLabel {
    pub text: String,
    /// Left edge, or right edge when `align_right` is set
    pub x: i32,
    pub baseline: i32,
    pub align_right: bool,
    pub pen: Pen,
}

/// Everything the HUD draws, before rasterization.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HudLayout {
    pub lines: Vec<HudLine>,
    pub labels: Vec<HudLabel>,
}

impl HudLayout {
    fn line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, pen: Pen) {
        self.lines.push(HudLine { x0, y0, x1, y1, pen });
    }

    fn label(&mut self, text: impl Into<String>, x: i32, baseline: i32, pen: Pen) {
        self.labels.push(HudLabel {
            text: text.into(),
            x,
            baseline,
            align_right: false,
            pen,
        });
    }

    #[cfg(test)]
    pub fn has_label(&self, text: &str) -> bool {
        self.labels.iter().any(|l| l.text == text)
    }
}

/// Spacing of the major frequency lines: whole kHz, at least
/// `MIN_DIST_X` pixels apart.
pub fn frequency_step(plot_width: u32, freq_max: u32) -> u32 {
    if plot_width == 0 {
        return freq_max.max(1000);
    }
    let khz = (MIN_DIST_X as f32 / plot_width as f32 * freq_max as f32 / 1000.0).ceil();
    (khz.max(1.0) as u32) * 1000
}

/// Lay out grid, cursor and legend for the current parameters. `mouse` is in
/// scope image coordinates, `None` when the pointer is outside the widget.
pub fn layout(
    geometry: &ScopeGeometry,
    params: &RenderParameters,
    options: HudOptions,
    mouse: Option<(i32, i32)>,
) -> HudLayout {
    let mut hud = HudLayout::default();
    let plot = geometry.plot;
    if plot.width < 2 || plot.height < 2 {
        return hud;
    }

    let left = plot.left as i32;
    let top = plot.top as i32;
    let w = plot.width as i32;
    let h = plot.height as i32;
    let right_border = plot.right() as i32;
    let bottom_border = plot.bottom() as i32;
    let freq_max = params.freq_max.max(1);

    let (mouse_x, mouse_y) = match mouse {
        Some((x, y)) => (x - left, y - top),
        None => (-1, -1),
    };
    let tracking = options.track_mouse && mouse.is_some();
    let cursor_in_columns = tracking && mouse_x >= 0 && mouse_x < w;
    let cursor_in_plot = tracking && plot.contains_relative(mouse_x, mouse_y);

    // Frame lines, counted upwards from the newest row
    if options.draw_grid {
        for frame_number in (0..h).step_by(MIN_DIST_Y as usize) {
            let y = bottom_border - frame_number;
            let hide_text = cursor_in_plot && (y - (top + mouse_y)).abs() < TEXT_DIST_Y;
            hud.line(left, y, right_border, y, Pen::Light);
            if !hide_text {
                hud.label(frame_number.to_string(), right_border + 1 + TEXT_DIST_X, y + 6, Pen::Light);
            }
        }
    }

    if cursor_in_plot {
        let y = top + mouse_y;
        hud.line(left + mouse_x, y, right_border, y, Pen::Lighter);
        let text_top = (y - 20).clamp(0, (bottom_border - 30).max(0));
        let x = right_border + 1 + TEXT_DIST_X;
        hud.label("Frame", x, text_top + 12, Pen::Lighter);
        hud.label((h - 1 - mouse_y).to_string(), x, text_top + 26, Pen::Lighter);
    }

    // Frequency lines
    let hz_diff = frequency_step(plot.width, freq_max);
    let label_y = top + h + TEXT_DIST_Y;
    let x_at = |hz: f32, span: i32| left + (span as f32 * hz / freq_max as f32) as i32;

    if options.draw_grid {
        let mut hz = 0u32;
        loop {
            let x = x_at(hz as f32, w - 1);
            let hide_text = cursor_in_columns && (x - (left + mouse_x + 20)).abs() < MIN_DIST_X + 16;

            if x <= right_border {
                hud.line(x, top, x, top + h + 6, Pen::Light);
            }
            // Leave room for the final label at the right edge
            if x + TEXT_DIST_Y < left + w && !hide_text {
                hud.label((hz / 1000).to_string(), x - 4, label_y, Pen::Light);
            }

            if hz > 0 {
                // Finer lines between the major ones
                for quarter in (1..=3).rev() {
                    let fine_hz = hz as f32 - quarter as f32 * hz_diff as f32 / 4.0;
                    let xf = x_at(fine_hz, w);
                    if xf > right_border {
                        break;
                    }
                    hud.line(xf, top, xf, top + h - 1, Pen::LightDots);
                }
            }

            if x > right_border {
                break;
            }
            hz += hz_diff;
        }

        let x = right_border;
        let hide_text = cursor_in_columns && (x - (left + mouse_x + 30)).abs() < MIN_DIST_X;
        hud.line(x, top, x, top + h + 6, Pen::Light);
        if !hide_text {
            hud.label(format!("{:.1} kHz", freq_max as f64 / 1000.0), x - 10, label_y, Pen::Light);
        }
    }

    if cursor_in_columns {
        let x = left + mouse_x;
        hud.line(x, top, x, top + h + 6, Pen::Thin);
        let khz = mouse_x as f64 / w as f64 * freq_max as f64 / 1000.0;
        hud.label(format!("{:.2} kHz", khz), x - 10, label_y, Pen::Thin);
    }

    // dB legend next to the ramp
    let legend_right = left - RAMP_GAP - RAMP_WIDTH - 8;
    hud.labels.push(HudLabel {
        text: format!("{} dB", params.db_max),
        x: legend_right,
        baseline: top + 12,
        align_right: true,
        pen: Pen::Lighter,
    });
    hud.labels.push(HudLabel {
        text: format!("{} dB", params.db_min),
        x: legend_right,
        baseline: top + h - 4,
        align_right: true,
        pen: Pen::Lighter,
    });

    hud
}

/// Rasterize the HUD. Without a font only lines and the dB ramp are drawn.
pub fn render_hud(
    geometry: &ScopeGeometry,
    params: &RenderParameters,
    options: HudOptions,
    mouse: Option<(i32, i32)>,
    overlay: Option<&TextOverlay>,
) -> Raster {
    let hud = layout(geometry, params, options, mouse);
    let mut image = Raster::new(geometry.width, geometry.height);

    for line in &hud.lines {
        let color = line.pen.color();
        if line.x0 == line.x1 {
            if line.pen == Pen::LightDots {
                image.dotted_vline(line.x0, line.y0, line.y1, color);
            } else {
                image.vline(line.x0, line.y0, line.y1, color);
            }
        } else {
            image.hline(line.x0, line.x1, line.y0, color);
        }
    }

    draw_db_ramp(&mut image, geometry);

    if let Some(overlay) = overlay {
        for label in &hud.labels {
            let x = if label.align_right {
                label.x - overlay.measure_width(&label.text) as i32
            } else {
                label.x
            };
            overlay.composite(&mut image, &label.text, x, label.baseline, label.pen.color());
        }
    }

    image
}

/// Vertical white ramp left of the plot, opaque at the top (dB max) and
/// transparent at the bottom (dB min).
fn draw_db_ramp(image: &mut Raster, geometry: &ScopeGeometry) {
    let plot = geometry.plot;
    if plot.height < 2 {
        return;
    }
    let left = plot.left as i32;
    let top = plot.top as i32;
    let h = plot.height as i32;
    for y in top..top + h {
        let level = 1.0 - (y - top) as f32 / (h - 1) as f32;
        let color = [255, 255, 255, (255.0 * level) as u8];
        for x in (left - RAMP_GAP - RAMP_WIDTH + 1)..=(left - RAMP_GAP) {
            image.set_pixel(x, y, color);
        }
    }
}

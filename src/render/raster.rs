/// Straight-alpha RGBA8 pixel buffer, rows top to bottom.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

pub const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];

impl Raster {
    /// Fully transparent raster.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; (width as usize) * (height as usize) * 4],
        }
    }

    pub fn filled(width: u32, height: u32, color: [u8; 4]) -> Self {
        let mut raster = Self::new(width, height);
        raster.fill(color);
        raster
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn fill(&mut self, color: [u8; 4]) {
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&color);
        }
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        Some(((y as usize) * (self.width as usize) + x as usize) * 4)
    }

    #[cfg(test)]
    pub fn get_pixel(&self, x: i32, y: i32) -> [u8; 4] {
        match self.index(x, y) {
            Some(idx) => [
                self.pixels[idx],
                self.pixels[idx + 1],
                self.pixels[idx + 2],
                self.pixels[idx + 3],
            ],
            None => TRANSPARENT,
        }
    }

    /// Overwrite a pixel. Out-of-bounds coordinates are ignored.
    pub fn set_pixel(&mut self, x: i32, y: i32, color: [u8; 4]) {
        if let Some(idx) = self.index(x, y) {
            self.pixels[idx..idx + 4].copy_from_slice(&color);
        }
    }

    /// Source-over blend of a straight-alpha color onto one pixel.
    pub fn blend_pixel(&mut self, x: i32, y: i32, color: [u8; 4]) {
        if let Some(idx) = self.index(x, y) {
            blend_into(&mut self.pixels[idx..idx + 4], color);
        }
    }

    pub fn hline(&mut self, x0: i32, x1: i32, y: i32, color: [u8; 4]) {
        for x in x0.min(x1)..=x0.max(x1) {
            self.blend_pixel(x, y, color);
        }
    }

    pub fn vline(&mut self, x: i32, y0: i32, y1: i32, color: [u8; 4]) {
        for y in y0.min(y1)..=y0.max(y1) {
            self.blend_pixel(x, y, color);
        }
    }

    /// Vertical line drawn every other pixel.
    pub fn dotted_vline(&mut self, x: i32, y0: i32, y1: i32, color: [u8; 4]) {
        for y in (y0.min(y1)..=y0.max(y1)).step_by(2) {
            self.blend_pixel(x, y, color);
        }
    }

    /// Mutable bytes of rows `[top, top + rows)`.
    pub fn rows_mut(&mut self, top: u32, rows: u32) -> &mut [u8] {
        let stride = self.width as usize * 4;
        let start = (top.min(self.height) as usize) * stride;
        let end = ((top + rows).min(self.height) as usize) * stride;
        &mut self.pixels[start..end]
    }

    /// Move rows `[top + n, top + rows)` up by `n` rows and clear the
    /// `n` rows left behind at the bottom of the band.
    pub fn shift_band_up(&mut self, top: u32, rows: u32, n: u32) {
        let stride = self.width as usize * 4;
        let band = self.rows_mut(top, rows);
        let n = (n as usize * stride).min(band.len());
        band.copy_within(n.., 0);
        let len = band.len();
        band[len - n..].fill(0);
    }

    /// Composite `other` over this raster (same size), source-over.
    pub fn composite(&mut self, other: &Raster) {
        if other.size() != self.size() {
            log::warn!(
                "Skipping composite of {}x{} onto {}x{}",
                other.width,
                other.height,
                self.width,
                self.height
            );
            return;
        }
        for (dst, src) in self.pixels.chunks_exact_mut(4).zip(other.pixels.chunks_exact(4)) {
            blend_into(dst, [src[0], src[1], src[2], src[3]]);
        }
    }
}

fn blend_into(dst: &mut [u8], color: [u8; 4]) {
    let a = color[3] as f32 / 255.0;
    if a <= 0.0 {
        return;
    }
    let dst_a = dst[3] as f32 / 255.0;
    let out_a = a + dst_a * (1.0 - a);
    for c in 0..3 {
        let v = (color[c] as f32 * a + dst[c] as f32 * dst_a * (1.0 - a)) / out_a;
        dst[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round() as u8;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_bounds_writes_are_ignored() {
        let mut r = Raster::new(2, 2);
        r.set_pixel(-1, 0, [255; 4]);
        r.set_pixel(2, 1, [255; 4]);
        assert!(r.pixels().iter().all(|&b| b == 0));
        assert_eq!(r.get_pixel(5, 5), TRANSPARENT);
    }

    #[test]
    fn opaque_blend_replaces() {
        let mut r = Raster::filled(1, 1, [10, 20, 30, 255]);
        r.blend_pixel(0, 0, [200, 100, 50, 255]);
        assert_eq!(r.get_pixel(0, 0), [200, 100, 50, 255]);
    }

    #[test]
    fn half_alpha_over_transparent_keeps_color() {
        let mut r = Raster::new(1, 1);
        r.blend_pixel(0, 0, [255, 255, 255, 128]);
        assert_eq!(r.get_pixel(0, 0), [255, 255, 255, 128]);
    }

    #[test]
    fn shift_band_moves_rows_up_and_clears_bottom() {
        let mut r = Raster::new(1, 4);
        for y in 0..4 {
            r.set_pixel(0, y, [y as u8 + 1, 0, 0, 255]);
        }
        r.shift_band_up(1, 3, 1);
        assert_eq!(r.get_pixel(0, 0)[0], 1);
        assert_eq!(r.get_pixel(0, 1)[0], 3);
        assert_eq!(r.get_pixel(0, 2)[0], 4);
        assert_eq!(r.get_pixel(0, 3), TRANSPARENT);
    }
}

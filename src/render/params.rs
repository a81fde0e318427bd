use crate::audio::spectrum::WINDOW_SIZES;
use crate::audio::window::WindowFunction;

pub const MIN_DB_VALUE: i32 = -120;
pub const MAX_DB_VALUE: i32 = 0;
/// Smallest allowed distance between the dB floor and ceiling
pub const MIN_DB_SPAN: i32 = 6;
pub const MIN_FREQ_VALUE: u32 = 1000;
pub const MAX_FREQ_VALUE: u32 = 96000;
/// Frequency ceiling used before any sampling rate is known
pub const DEFAULT_FREQ_MAX: u32 = 10000;

const HZ_PER_PIXEL: i64 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragAxis {
    /// Up/down: dB floor, or ceiling with shift held
    Vertical,
    /// Left/right: maximum displayed frequency
    Horizontal,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DbBound {
    Floor,
    Ceiling,
}

/// Everything that changes how history rows map to pixels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderParameters {
    pub db_min: i32,
    pub db_max: i32,
    pub freq_max: u32,
    /// Set once the user picked a frequency ceiling; disables the
    /// sampling-rate-derived default
    pub custom_freq: bool,
    pub window_size: usize,
    pub window: WindowFunction,
}

impl Default for RenderParameters {
    fn default() -> Self {
        Self {
            db_min: -70,
            db_max: 0,
            freq_max: DEFAULT_FREQ_MAX,
            custom_freq: false,
            window_size: WINDOW_SIZES[0],
            window: WindowFunction::Rectangular,
        }
    }
}

impl RenderParameters {
    /// Apply a drag of `movement` pixels (x, y). Returns whether anything
    /// changed.
    pub fn handle_drag(&mut self, movement: (i32, i32), axis: DragAxis, modifiers: Modifiers) -> bool {
        let before = self.clone();
        match axis {
            DragAxis::Vertical => {
                let dragged = if modifiers.shift {
                    self.db_max = self.db_max.saturating_add(movement.1);
                    DbBound::Ceiling
                } else {
                    self.db_min = self.db_min.saturating_add(movement.1);
                    DbBound::Floor
                };
                self.enforce_db_bounds(dragged);
            }
            DragAxis::Horizontal => {
                let hz = self.freq_max as i64 - HZ_PER_PIXEL * movement.0 as i64;
                self.set_freq_max(hz.clamp(0, u32::MAX as i64) as u32);
            }
        }
        *self != before
    }

    /// Set the frequency ceiling explicitly. Marks it as user-chosen.
    pub fn set_freq_max(&mut self, hz: u32) {
        self.freq_max = hz.clamp(MIN_FREQ_VALUE, MAX_FREQ_VALUE);
        self.custom_freq = true;
    }

    /// Drop the user-chosen ceiling; the next sampling rate update decides.
    pub fn reset_max_freq(&mut self) {
        self.custom_freq = false;
    }

    /// Follow the Nyquist frequency unless the user picked a ceiling.
    pub fn apply_sampling_rate(&mut self, sampling_rate: u32) -> bool {
        if self.custom_freq || sampling_rate == 0 {
            return false;
        }
        let nyquist = sampling_rate / 2;
        let changed = self.freq_max != nyquist;
        self.freq_max = nyquist;
        changed
    }

    /// Select one of [`WINDOW_SIZES`]. Other sizes are rejected.
    pub fn set_window_size(&mut self, size: usize) -> bool {
        if !WINDOW_SIZES.contains(&size) {
            log::warn!("Unsupported window size {}, keeping {}", size, self.window_size);
            return false;
        }
        self.window_size = size;
        true
    }

    /// Bring values loaded from elsewhere back into the allowed ranges.
    pub fn sanitize(&mut self) {
        if !WINDOW_SIZES.contains(&self.window_size) {
            self.window_size = WINDOW_SIZES[0];
        }
        self.enforce_db_bounds(DbBound::Floor);
        if self.custom_freq {
            self.freq_max = self.freq_max.clamp(MIN_FREQ_VALUE, MAX_FREQ_VALUE);
        }
    }

    /// Clamp to `[MIN_DB_VALUE, MAX_DB_VALUE]` and keep `MIN_DB_SPAN`
    /// between the bounds by moving the one that was not dragged.
    fn enforce_db_bounds(&mut self, dragged: DbBound) {
        self.db_max = self.db_max.min(MAX_DB_VALUE);
        self.db_min = self.db_min.max(MIN_DB_VALUE);

        if self.db_max - self.db_min < MIN_DB_SPAN {
            match dragged {
                DbBound::Floor => {
                    self.db_max = self.db_min + MIN_DB_SPAN;
                    if self.db_max > MAX_DB_VALUE {
                        self.db_max = MAX_DB_VALUE;
                        self.db_min = MAX_DB_VALUE - MIN_DB_SPAN;
                    }
                }
                DbBound::Ceiling => {
                    self.db_min = self.db_max - MIN_DB_SPAN;
                    if self.db_min < MIN_DB_VALUE {
                        self.db_min = MIN_DB_VALUE;
                        self.db_max = MIN_DB_VALUE + MIN_DB_SPAN;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_db_invariants(p: &RenderParameters) {
        assert!(p.db_max <= MAX_DB_VALUE, "{p:?}");
        assert!(p.db_min >= MIN_DB_VALUE, "{p:?}");
        assert!(p.db_max - p.db_min >= MIN_DB_SPAN, "{p:?}");
    }

    const SHIFT: Modifiers = Modifiers { shift: true };

    #[test]
    fn vertical_drag_moves_floor_by_default() {
        let mut p = RenderParameters::default();
        assert!(p.handle_drag((0, -10), DragAxis::Vertical, Modifiers::default()));
        assert_eq!(p.db_min, -80);
        assert_eq!(p.db_max, 0);
    }

    #[test]
    fn shift_drag_moves_ceiling() {
        let mut p = RenderParameters::default();
        p.handle_drag((0, -20), DragAxis::Vertical, SHIFT);
        assert_eq!(p.db_max, -20);
        assert_eq!(p.db_min, -70);
    }

    #[test]
    fn floor_pushed_into_ceiling_moves_ceiling_then_reclamps() {
        let mut p = RenderParameters::default();
        p.handle_drag((0, 68), DragAxis::Vertical, Modifiers::default());
        // floor -2 would need a ceiling of +4, which is clamped back to 0
        assert_eq!((p.db_min, p.db_max), (-6, 0));
        assert_db_invariants(&p);
    }

    #[test]
    fn ceiling_pushed_into_floor_moves_floor_then_reclamps() {
        let mut p = RenderParameters::default();
        p.handle_drag((0, -500), DragAxis::Vertical, SHIFT);
        assert_eq!((p.db_min, p.db_max), (MIN_DB_VALUE, MIN_DB_VALUE + 6));
        assert_db_invariants(&p);

        let mut p = RenderParameters::default();
        p.handle_drag((0, -67), DragAxis::Vertical, SHIFT);
        assert_eq!((p.db_min, p.db_max), (-73, -67));
    }

    #[test]
    fn floor_is_clamped() {
        let mut p = RenderParameters::default();
        p.handle_drag((0, -1000), DragAxis::Vertical, Modifiers::default());
        assert_eq!(p.db_min, MIN_DB_VALUE);
        assert_db_invariants(&p);
    }

    #[test]
    fn invariants_hold_for_any_drag_sequence() {
        let mut p = RenderParameters::default();
        let moves = [37, -91, 250, -13, 6, -400, 120, 1, -1, 77];
        for (i, dy) in moves.iter().enumerate() {
            let modifiers = Modifiers { shift: i % 3 == 0 };
            p.handle_drag((0, *dy), DragAxis::Vertical, modifiers);
            assert_db_invariants(&p);
        }
    }

    #[test]
    fn horizontal_drag_changes_frequency_and_marks_custom() {
        let mut p = RenderParameters::default();
        p.handle_drag((10, 0), DragAxis::Horizontal, Modifiers::default());
        assert_eq!(p.freq_max, 9000);
        assert!(p.custom_freq);

        p.handle_drag((1000, 0), DragAxis::Horizontal, Modifiers::default());
        assert_eq!(p.freq_max, MIN_FREQ_VALUE);

        p.handle_drag((-5000, 0), DragAxis::Horizontal, Modifiers::default());
        assert_eq!(p.freq_max, MAX_FREQ_VALUE);
    }

    #[test]
    fn sampling_rate_only_applies_without_override() {
        let mut p = RenderParameters::default();
        assert!(p.apply_sampling_rate(48000));
        assert_eq!(p.freq_max, 24000);
        assert!(!p.apply_sampling_rate(48000));

        p.set_freq_max(5000);
        assert!(!p.apply_sampling_rate(44100));
        assert_eq!(p.freq_max, 5000);

        p.reset_max_freq();
        assert!(p.apply_sampling_rate(44100));
        assert_eq!(p.freq_max, 22050);
    }

    #[test]
    fn window_size_must_be_an_offered_option() {
        let mut p = RenderParameters::default();
        assert!(p.set_window_size(1024));
        assert!(!p.set_window_size(1000));
        assert_eq!(p.window_size, 1024);
    }

    #[test]
    fn sanitize_repairs_loaded_values() {
        let mut p = RenderParameters {
            db_min: -300,
            db_max: 20,
            freq_max: 200_000,
            custom_freq: true,
            window_size: 3,
            window: WindowFunction::Hamming,
        };
        p.sanitize();
        assert_db_invariants(&p);
        assert_eq!(p.freq_max, MAX_FREQ_VALUE);
        assert_eq!(p.window_size, 256);
    }
}

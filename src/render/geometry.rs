// Margins around the plot, leaving room for the dB legend on the left,
// frame labels on the right and kHz labels below.
const LEFT_MARGIN: u32 = 66;
const TOP_MARGIN: u32 = 6;
const RIGHT_MARGIN: u32 = 70;
const BOTTOM_MARGIN: u32 = 40;

/// Rectangle in scope-image pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PlotRect {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl PlotRect {
    pub fn right(&self) -> u32 {
        self.left + self.width.saturating_sub(1)
    }

    pub fn bottom(&self) -> u32 {
        self.top + self.height.saturating_sub(1)
    }

    /// Whether a point relative to the rect's top-left corner lies inside.
    pub fn contains_relative(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width as i32 && y < self.height as i32
    }
}

/// Size of the scope image and the plot area inside it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScopeGeometry {
    pub width: u32,
    pub height: u32,
    pub plot: PlotRect,
}

impl ScopeGeometry {
    /// Standard layout with axis margins around the plot.
    pub fn new(width: u32, height: u32) -> Self {
        let plot = PlotRect {
            left: LEFT_MARGIN.min(width),
            top: TOP_MARGIN.min(height),
            width: width.saturating_sub(LEFT_MARGIN + RIGHT_MARGIN),
            height: height.saturating_sub(TOP_MARGIN + BOTTOM_MARGIN),
        };
        Self { width, height, plot }
    }
}

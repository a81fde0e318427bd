use serde::{Deserialize, Serialize};

/// Weighting applied to a sample block before the Fourier transform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WindowFunction {
    /// Narrowest peaks, most leakage
    #[default]
    Rectangular,
    Triangular,
    Hamming,
}

impl WindowFunction {
    pub fn coefficients(self, size: usize) -> Vec<f32> {
        if size < 2 {
            return vec![1.0; size];
        }
        let last = (size - 1) as f32;
        match self {
            WindowFunction::Rectangular => vec![1.0; size],
            WindowFunction::Triangular => {
                let half = size as f32 / 2.0;
                (0..size)
                    .map(|n| 1.0 - ((n as f32 - last / 2.0) / half).abs())
                    .collect()
            }
            WindowFunction::Hamming => (0..size)
                .map(|n| {
                    0.54 - 0.46 * (2.0 * std::f32::consts::PI * n as f32 / last).cos()
                })
                .collect(),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            WindowFunction::Rectangular => "Rectangular window",
            WindowFunction::Triangular => "Triangular window",
            WindowFunction::Hamming => "Hamming window",
        }
    }
}

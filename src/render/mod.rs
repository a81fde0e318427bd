pub mod geometry;
pub mod hud;
pub mod params;
pub mod raster;
pub mod scope;
pub mod spectrogram;
pub mod text;

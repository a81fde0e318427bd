pub mod decode;
pub mod envelope;
pub mod source;
pub mod spectrum;
pub mod window;

pub mod block;
pub mod decode;
pub mod spectrum;

pub use block::{AudioBlock, BlockSource};
pub use spectrum::{SpectralAnalyzer, Spectrum};

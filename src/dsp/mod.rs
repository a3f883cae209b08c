//! DSP stages and the offline renderer.

pub mod chain;
pub mod compressor;
pub mod filter;
pub mod renderer;
pub mod reverb;

#![doc = include_str!("../README.md")]

// private mods (will be partly re-exported)
mod engine;
mod error;
#[cfg(any(feature = "cpal-output", feature = "wav-output"))]
mod output;
mod source;

// public, flat re-exports
pub use error::Error;

pub use engine::{GranularEngine, GranularEngineOptions, GranularHandle, GranularMessage};

pub use source::{Source, SourceTime};

// public mods
pub mod buffer;
pub mod distribution;
pub mod envelope;
pub mod parameter;
pub mod utils;

#[cfg(any(feature = "cpal-output", feature = "wav-output"))]
pub mod outputs {
    //! Audio outputs for playing or rendering sources.

    #[cfg(feature = "cpal-output")]
    pub use super::output::cpal::CpalOutput;
    #[cfg(feature = "wav-output")]
    pub use super::output::wav::WavOutput;
}

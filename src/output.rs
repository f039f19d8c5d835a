//! Audio outputs which pull samples from a [`Source`](crate::Source).

#[cfg(feature = "cpal-output")]
pub mod cpal;
#[cfg(feature = "wav-output")]
pub mod wav;

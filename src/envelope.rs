//! Precomputed grain envelope tables.

use std::f64::consts::PI;

use crate::buffer::SampleBuffer;

// -------------------------------------------------------------------------------------------------

/// Shapes of grain envelope tables, ordered by smoothness: smooth → balanced → sharp → rhythmic.
///
/// Use [`EnvelopeShape::table`] to create an envelope buffer for a granular engine. Any other
/// single channel buffer can be used as envelope as well.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    strum::EnumString,
    strum::Display,
    strum::EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum EnvelopeShape {
    Hann,
    Blackman,
    Triangle,
    Tukey,
    Trapezoid,
    Exponential,
    RampUp,
    RampDown,
}

impl EnvelopeShape {
    /// Evaluate the envelope at the given normalized phase in range `[0, 1)`.
    pub fn value(self, phase: f64) -> f32 {
        debug_assert!((0.0..=1.0).contains(&phase), "Invalid envelope phase");
        let value = match self {
            // cosine-squared window
            Self::Hann => 0.5 * (1.0 - (2.0 * PI * phase).cos()),
            // a0=0.42, a1=0.5, a2=0.08
            Self::Blackman => {
                let pi_phase = PI * phase;
                0.42 - 0.5 * (2.0 * pi_phase).cos() + 0.08 * (4.0 * pi_phase).cos()
            }
            Self::Triangle => {
                if phase < 0.5 {
                    2.0 * phase
                } else {
                    2.0 * (1.0 - phase)
                }
            }
            // tapered cosine with alpha = 0.5
            Self::Tukey => {
                let width = 0.25;
                if phase < width {
                    0.5 * (1.0 - (PI * phase / width).cos())
                } else if phase > 1.0 - width {
                    0.5 * (1.0 - (PI * (1.0 - phase) / width).cos())
                } else {
                    1.0
                }
            }
            // linear ramps with 80% sustain
            Self::Trapezoid => {
                let ramp_width = 0.1;
                if phase < ramp_width {
                    phase / ramp_width
                } else if phase > 1.0 - ramp_width {
                    (1.0 - phase) / ramp_width
                } else {
                    1.0
                }
            }
            // poisson window
            Self::Exponential => (-6.0 * (phase - 0.5).abs()).exp(),
            // 90% linear rise, 10% cosine fade
            Self::RampUp => {
                if phase < 0.9 {
                    phase / 0.9
                } else {
                    0.5 * (1.0 + (PI * (phase - 0.9) / 0.1).cos())
                }
            }
            // 10% cosine rise, 90% linear fall
            Self::RampDown => {
                if phase < 0.1 {
                    0.5 * (1.0 - (PI * phase / 0.1).cos())
                } else {
                    1.0 - ((phase - 0.1) / 0.9)
                }
            }
        };
        value as f32
    }

    /// Create a mono envelope table with the given number of frames.
    pub fn table(self, length: usize) -> SampleBuffer {
        let samples = (0..length)
            .map(|index| self.value(index as f64 / length as f64))
            .collect();
        SampleBuffer::from_mono(samples)
    }
}

// -------------------------------------------------------------------------------------------------

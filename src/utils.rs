//! Pitch conversion and sample buffer helpers.

pub mod buffer;

// -------------------------------------------------------------------------------------------------

/// Frequency of octave 0 in the octave-point-decimal pitch notation: middle C is octave 8.
pub const MIDDLE_C_OFFSET: f64 = 261.62556530059868 / 256.0;

/// Octave of middle C in the octave-point-decimal pitch notation.
pub const MIDDLE_C_OCTAVE: f64 = 8.0;

/// Lowest frequency in Hz which gets accepted for frequency based transpositions.
pub const MIN_AUDIBLE_FREQUENCY: f64 = 20.0;

// -------------------------------------------------------------------------------------------------

/// Convert an octave-point-decimal pitch into a frequency in Hz.
pub fn cpsoct(octave: f64) -> f64 {
    2.0f64.powf(octave) * MIDDLE_C_OFFSET
}

/// Convert a frequency in Hz into an octave-point-decimal pitch.
pub fn octcps(frequency: f64) -> f64 {
    (frequency / MIDDLE_C_OFFSET).log2()
}

/// Convert a transposition in octaves into a playback speed factor.
///
/// The ratio is taken against a reference pitch ten octaves above octave 0, so a transposition
/// of 0 plays at unit speed and each octave doubles or halves the speed.
pub fn transposition_to_speed(octaves: f64) -> f64 {
    cpsoct(10.0 + octaves) / cpsoct(10.0)
}

/// Convert a frequency in Hz into a transposition in octaves relative to middle C.
/// Frequencies below [`MIN_AUDIBLE_FREQUENCY`] are raised to it.
pub fn frequency_to_transposition(frequency: f64) -> f64 {
    octcps(frequency.max(MIN_AUDIBLE_FREQUENCY)) - MIDDLE_C_OCTAVE
}

// -------------------------------------------------------------------------------------------------

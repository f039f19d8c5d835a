//! Grain records and the fixed-size pool they live in.

use assume::assume;

use crate::buffer::SampleBuffer;

// -------------------------------------------------------------------------------------------------

/// Spawn settings for a [`Grain`], as calculated by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct GrainSettings {
    /// Source frames to advance per output sample.
    pub wave_read_increment: f64,
    /// Envelope table frames to advance per output sample.
    pub env_read_increment: f64,
    /// Source frame position to start reading from. Also the grain's initial read pointer.
    pub start_time: f64,
    /// Number of output samples the grain lasts.
    pub sample_count: u64,
    /// Stereo position in range `[0, 1]`.
    pub pan: f64,
}

// -------------------------------------------------------------------------------------------------

/// A single, recyclable sound event.
///
/// A grain reads the source buffer from its start position at its own speed, shapes it with
/// the envelope table, which gets traversed exactly once over the grain's life, and pans it
/// into the stereo output.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Grain {
    active: bool,
    wave_read_increment: f64,
    env_read_increment: f64,
    env_phase: f64,
    current_time: f64,
    remaining_samples: u64,
    pan_left_gain: f32,
    pan_right_gain: f32,
}

impl Default for Grain {
    fn default() -> Self {
        Self::new()
    }
}

impl Grain {
    /// Create a new inactive grain.
    pub const fn new() -> Self {
        Self {
            active: false,
            wave_read_increment: 0.0,
            env_read_increment: 0.0,
            env_phase: 0.0,
            current_time: 0.0,
            remaining_samples: 0,
            pan_left_gain: 0.5,
            pan_right_gain: 0.5,
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[cfg(test)]
    pub fn wave_read_increment(&self) -> f64 {
        self.wave_read_increment
    }

    #[cfg(test)]
    pub fn env_read_increment(&self) -> f64 {
        self.env_read_increment
    }

    #[cfg(test)]
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    #[cfg(test)]
    pub fn remaining_samples(&self) -> u64 {
        self.remaining_samples
    }

    #[cfg(test)]
    pub fn pan_gains(&self) -> (f32, f32) {
        (self.pan_left_gain, self.pan_right_gain)
    }

    /// Activate this grain with the given settings.
    pub fn activate(&mut self, settings: GrainSettings) {
        debug_assert!(!self.active, "Should only activate free grains");
        let pan = settings.pan.clamp(0.0, 1.0) as f32;
        self.active = true;
        self.wave_read_increment = settings.wave_read_increment;
        self.env_read_increment = settings.env_read_increment;
        self.env_phase = 0.0;
        self.current_time = settings.start_time;
        self.remaining_samples = settings.sample_count;
        self.pan_left_gain = 1.0 - pan;
        self.pan_right_gain = pan;
    }

    /// Deactivate this grain immediately.
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Process this grain for one output sample.
    ///
    /// Returns the grain's panned (left, right) output, or `None` when the grain expired and
    /// got deactivated. `source` and `envelope` must not be empty.
    #[inline]
    pub fn process(
        &mut self,
        source: &SampleBuffer,
        source_channel: usize,
        envelope: &SampleBuffer,
    ) -> Option<(f32, f32)> {
        debug_assert!(self.active, "Should only process active grains");

        if self.remaining_samples == 0 {
            self.active = false;
            return None;
        }

        // Envelope: linear interpolation between the two bracketing table samples
        let envelope_frames = envelope.frame_count();
        assume!(unsafe: envelope_frames > 0, "Envelope buffer must not be empty");
        let env_index = (self.env_phase as usize).min(envelope_frames - 1);
        let env_next_index = if env_index + 1 < envelope_frames {
            env_index + 1
        } else {
            0
        };
        let env_fraction = (self.env_phase - env_index as f64) as f32;
        let env_value = envelope.frame(env_index, 0);
        let env_next_value = envelope.frame(env_next_index, 0);
        let amplitude = env_value + (env_next_value - env_value) * env_fraction;

        self.env_phase += self.env_read_increment;
        if self.env_phase >= envelope_frames as f64 {
            self.env_phase = self.env_phase.rem_euclid(envelope_frames as f64);
        }

        // Source: nearest sample at the wrapped read pointer
        let source_frames = source.frame_count();
        assume!(unsafe: source_frames > 0, "Source buffer must not be empty");
        let position = (self.current_time.floor().rem_euclid(source_frames as f64) as usize)
            .min(source_frames - 1);
        let output = source.frame(position, source_channel) * amplitude;

        self.current_time += self.wave_read_increment;
        self.remaining_samples -= 1;

        Some((output * self.pan_left_gain, output * self.pan_right_gain))
    }
}

// -------------------------------------------------------------------------------------------------

/// Fixed-capacity set of grain slots, allocated once on construction.
///
/// Slots are scanned in a fixed order (first to last) by the render loop. A slot is either
/// active or free; free slots get recycled in place by the scheduler.
pub(crate) struct GrainPool {
    grains: Box<[Grain]>,
}

impl GrainPool {
    /// Create a new pool with the given number of inactive grain slots.
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0, "Need at least one grain slot");
        Self {
            grains: vec![Grain::new(); capacity].into_boxed_slice(),
        }
    }

    /// Number of grain slots.
    pub fn capacity(&self) -> usize {
        self.grains.len()
    }

    /// Number of currently active grains.
    pub fn active_count(&self) -> usize {
        self.grains.iter().filter(|grain| grain.is_active()).count()
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &Grain> {
        self.grains.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Grain> {
        self.grains.iter_mut()
    }

    /// Retire all in-flight grains.
    pub fn reset(&mut self) {
        for grain in self.grains.iter_mut() {
            grain.deactivate();
        }
    }
}

// -------------------------------------------------------------------------------------------------

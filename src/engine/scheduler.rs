//! Countdown based grain spawning.

use std::fmt;

use rand::rngs::SmallRng;

use super::grain::{Grain, GrainSettings};
use crate::{
    distribution::Distribution,
    parameter::{GranularParameter, GranularParameters},
    utils::transposition_to_speed,
};

// -------------------------------------------------------------------------------------------------

/// Reasons why a grain spawn got rejected. Rejected spawns leave their slot untouched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum SpawnRejection {
    /// The grain would last less than a single sample, or unboundedly long.
    DegenerateDuration { duration: f64 },
    /// The grain's read pointer would travel further away from the head than the source is long.
    ExcessiveDeviation { deviation: f64, buffer_frames: usize },
    /// There is no room to place the grain's start position.
    DegenerateShiftWindow { shift: f64 },
}

impl fmt::Display for SpawnRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DegenerateDuration { duration } => {
                write!(f, "grain duration of {duration} samples is out of range")
            }
            Self::ExcessiveDeviation {
                deviation,
                buffer_frames,
            } => write!(
                f,
                "grain deviation of {deviation} frames exceeds the source length of {buffer_frames} frames"
            ),
            Self::DegenerateShiftWindow { shift } => {
                write!(f, "grain shift window collapsed at {shift} frames")
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Buffer geometry and head position a grain gets spawned with.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SpawnContext {
    /// Head position in source frames.
    pub head: f64,
    /// Number of frames in the source buffer. Must be > 0.
    pub source_frames: usize,
    /// Number of frames in the envelope table. Must be > 0.
    pub envelope_frames: usize,
    /// True when an external signal drives the head position.
    pub input_connected: bool,
}

// -------------------------------------------------------------------------------------------------

/// Decides when new grains start and calculates their settings from the parameter
/// distributions.
///
/// A single countdown, measured in samples, gets decremented once per output frame. When it
/// expires, the render loop spawns at most one grain into the first free pool slot, which
/// re-arms the countdown with a new random interval.
pub(crate) struct GrainScheduler {
    parameters: GranularParameters,
    running: bool,
    countdown: i64,
    sample_rate: u32,
    rng: SmallRng,
    spawned_count: u64,
    rejected_count: u64,
}

impl GrainScheduler {
    pub fn new(sample_rate: u32, parameters: GranularParameters, rng: SmallRng) -> Self {
        debug_assert!(sample_rate > 0, "Invalid sample rate");
        Self {
            parameters: parameters.clamped(),
            running: false,
            countdown: 0,
            sample_rate,
            rng,
            spawned_count: 0,
            rejected_count: 0,
        }
    }

    pub fn parameters(&self) -> &GranularParameters {
        &self.parameters
    }

    pub fn set_parameter(&mut self, parameter: GranularParameter, value: Distribution) {
        self.parameters.set(parameter, value);
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    #[cfg(test)]
    pub fn countdown(&self) -> i64 {
        self.countdown
    }

    pub fn spawned_count(&self) -> u64 {
        self.spawned_count
    }

    pub fn rejected_count(&self) -> u64 {
        self.rejected_count
    }

    /// Advance the countdown by one frame. Returns true when a grain should be spawned in
    /// this frame.
    #[inline]
    pub fn tick(&mut self) -> bool {
        self.countdown = self.countdown.saturating_sub(1);
        self.running && self.countdown <= 0
    }

    /// Retry spawning in the next frame when the countdown expired without a spawn.
    #[inline]
    pub fn retry_if_expired(&mut self) {
        if self.countdown <= 0 {
            self.countdown = 1;
        }
    }

    /// Re-arm the countdown and try to spawn a new grain into the given free slot.
    pub fn spawn(&mut self, grain: &mut Grain, context: &SpawnContext) -> Result<(), SpawnRejection> {
        debug_assert!(!grain.is_active(), "Should only spawn into free grain slots");
        self.rearm();
        match self.grain_settings(context) {
            Ok(settings) => {
                grain.activate(settings);
                self.spawned_count += 1;
                Ok(())
            }
            Err(rejection) => {
                log::debug!("Grain spawn rejected: {rejection}");
                self.rejected_count += 1;
                Err(rejection)
            }
        }
    }

    /// Draw a new spawn interval.
    fn rearm(&mut self) {
        let seconds = self.parameters.grain_rate.sample(&mut self.rng);
        // float to int casts saturate
        self.countdown = ((seconds * self.sample_rate as f64).round() as i64).max(1);
    }

    /// Calculate settings for a new grain from the current distributions.
    fn grain_settings(&mut self, context: &SpawnContext) -> Result<GrainSettings, SpawnRejection> {
        debug_assert!(context.source_frames > 0 && context.envelope_frames > 0);
        let buffer_frames = context.source_frames as f64;

        let transposition = self.parameters.transposition.sample(&mut self.rng);
        let wave_read_increment = transposition_to_speed(transposition);

        // When the head moves at unit speed, the grain drifts away from it at speed - 1 only
        let offset = if context.input_connected {
            wave_read_increment - 1.0
        } else {
            wave_read_increment
        };

        let duration = self.parameters.grain_duration.sample(&mut self.rng) * self.sample_rate as f64;
        if duration < 1.0 || !duration.is_finite() {
            return Err(SpawnRejection::DegenerateDuration { duration });
        }

        let deviation = (duration * offset).abs().round();
        if !deviation.is_finite() || deviation >= buffer_frames {
            return Err(SpawnRejection::ExcessiveDeviation {
                deviation,
                buffer_frames: context.source_frames,
            });
        }

        let (min_shift, max_shift) = if offset > 0.0 {
            (deviation, buffer_frames)
        } else {
            (1.0, buffer_frames - deviation)
        };
        if min_shift == max_shift {
            return Err(SpawnRejection::DegenerateShiftWindow { shift: min_shift });
        }

        let ideal_shift = (self.parameters.grain_head.sample(&mut self.rng) * buffer_frames).floor();
        let shift = ideal_shift.max(min_shift).min(max_shift);

        // shifted behind the head, so the excursion of a static head stays within the buffer
        let start_time = (context.head - shift).rem_euclid(buffer_frames);

        let pan = self.parameters.pan.sample(&mut self.rng);

        Ok(GrainSettings {
            wave_read_increment,
            env_read_increment: context.envelope_frames as f64 / duration,
            start_time,
            // float to int casts saturate
            sample_count: duration.ceil() as u64,
            pan,
        })
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use rand::SeedableRng;

    fn scheduler(parameters: GranularParameters) -> GrainScheduler {
        GrainScheduler::new(44100, parameters, SmallRng::seed_from_u64(0x9a41))
    }

    fn context(source_frames: usize, envelope_frames: usize) -> SpawnContext {
        SpawnContext {
            head: 0.0,
            source_frames,
            envelope_frames,
            input_connected: false,
        }
    }

    #[test]
    fn rearm_with_fixed_rate() {
        let parameters = GranularParameters::default()
            .with(GranularParameter::GrainRate, Distribution::constant(0.1));
        let mut scheduler = scheduler(parameters);
        scheduler.set_running(true);
        assert!(scheduler.tick());

        let mut grain = Grain::new();
        assert!(scheduler.spawn(&mut grain, &context(44100, 512)).is_ok());
        assert_eq!(scheduler.countdown(), 4410);
        assert_eq!(scheduler.spawned_count(), 1);

        for _ in 0..4409 {
            assert!(!scheduler.tick());
        }
        assert!(scheduler.tick());
    }

    #[test]
    fn countdown_retries_when_expired() {
        let mut scheduler = scheduler(GranularParameters::default());
        assert!(!scheduler.is_running());
        // stopped: expires but does not request spawns
        assert!(!scheduler.tick());
        scheduler.retry_if_expired();
        assert_eq!(scheduler.countdown(), 1);

        scheduler.set_running(true);
        assert!(scheduler.tick());
        scheduler.retry_if_expired();
        assert_eq!(scheduler.countdown(), 1);
        assert!(scheduler.tick());
    }

    #[test]
    fn zero_rate_rearms_to_one() {
        let parameters = GranularParameters::default()
            .with(GranularParameter::GrainRate, Distribution::constant(0.0));
        let mut scheduler = scheduler(parameters);
        let mut grain = Grain::new();
        let _ = scheduler.spawn(&mut grain, &context(44100, 512));
        assert_eq!(scheduler.countdown(), 1);
    }

    #[test]
    fn envelope_read_increment() {
        let parameters = GranularParameters::default()
            .with(GranularParameter::GrainDuration, Distribution::constant(0.5));
        let mut scheduler = scheduler(parameters);
        let mut grain = Grain::new();
        assert!(scheduler.spawn(&mut grain, &context(44100, 512)).is_ok());
        assert_eq!(grain.env_read_increment(), 512.0 / 22050.0);
        assert_eq!(grain.wave_read_increment(), 1.0);
        assert_eq!(grain.remaining_samples(), 22050);
    }

    #[test]
    fn spawned_grain_invariants() {
        let parameters = GranularParameters::default()
            .with(
                GranularParameter::Transposition,
                Distribution::new(-1.0, 0.0, 1.0, 1.0),
            )
            .with(
                GranularParameter::GrainDuration,
                Distribution::new(0.01, 0.05, 0.1, 1.0),
            );
        let mut scheduler = scheduler(parameters);
        let buffer_frames = 44100;
        let mut spawned = 0;
        for _ in 0..1000 {
            let mut grain = Grain::new();
            if scheduler
                .spawn(&mut grain, &context(buffer_frames, 512))
                .is_ok()
            {
                spawned += 1;
                let (left, right) = grain.pan_gains();
                assert_eq!(left + right, 1.0);
                assert!(grain.remaining_samples() > 0);
                let start_time = grain.current_time();
                assert!(start_time >= 0.0);
                assert!(start_time < buffer_frames as f64);
                // with a static head, the grain's whole excursion stays behind the head
                let travel = grain.remaining_samples() as f64 * grain.wave_read_increment();
                let lag = if start_time > 0.0 {
                    buffer_frames as f64 - start_time
                } else {
                    buffer_frames as f64
                };
                // the sample count is rounded up, so allow for one extra step
                assert!(lag >= (travel - grain.wave_read_increment()).round());
            }
        }
        assert_eq!(spawned, 1000);
    }

    #[test]
    fn reject_excessive_deviation() {
        // 8 octaves up, any grain travels way more than 1000 frames
        let parameters = GranularParameters::default()
            .with(GranularParameter::Transposition, Distribution::constant(8.0));
        let mut scheduler = scheduler(parameters);
        let mut grain = Grain::new();
        let result = scheduler.spawn(&mut grain, &context(1000, 512));
        assert!(matches!(
            result,
            Err(SpawnRejection::ExcessiveDeviation { .. })
        ));
        assert!(!grain.is_active());
        assert_eq!(grain.current_time(), 0.0);
        assert_eq!(grain.remaining_samples(), 0);
        assert_eq!(scheduler.rejected_count(), 1);
        assert_eq!(scheduler.spawned_count(), 0);
        assert!(scheduler.countdown() >= 1);
    }

    #[test]
    fn reject_degenerate_duration() {
        let parameters = GranularParameters::default()
            .with(GranularParameter::GrainDuration, Distribution::constant(0.0));
        let mut scheduler = scheduler(parameters);
        let mut grain = Grain::new();
        assert!(matches!(
            scheduler.spawn(&mut grain, &context(1000, 512)),
            Err(SpawnRejection::DegenerateDuration { .. })
        ));
        assert!(!grain.is_active());
    }

    #[test]
    fn reject_degenerate_shift_window() {
        // a static read pointer (speed 1 along a moving head) can only shift within [1, 1]
        let parameters = GranularParameters::default()
            .with(GranularParameter::GrainDuration, Distribution::constant(0.01));
        let mut scheduler = scheduler(parameters);
        let mut grain = Grain::new();
        let mut context = context(1, 512);
        context.input_connected = true;
        assert!(matches!(
            scheduler.spawn(&mut grain, &context),
            Err(SpawnRejection::DegenerateShiftWindow { .. })
        ));
        assert!(!grain.is_active());
    }

    #[test]
    fn reject_unbounded_duration() {
        // an infinite duration along a moving head would yield an undefined deviation
        let parameters = GranularParameters::default()
            .with(GranularParameter::GrainDuration, Distribution::constant(1e306))
            .with(GranularParameter::Transposition, Distribution::constant(0.0));
        let mut scheduler = scheduler(parameters);
        let mut grain = Grain::new();
        let mut context = context(44100, 512);
        context.input_connected = true;
        assert!(matches!(
            scheduler.spawn(&mut grain, &context),
            Err(SpawnRejection::DegenerateDuration { .. })
        ));
        assert!(!grain.is_active());
        assert_eq!(scheduler.rejected_count(), 1);
    }
}

//! Stochastic granular synthesis engine.

use std::sync::Arc;

use crossbeam_queue::ArrayQueue;
use rand::{rngs::SmallRng, SeedableRng};

use crate::{
    buffer::{BufferRef, BufferRegistry, SampleBuffer},
    distribution::Distribution,
    parameter::{GranularParameter, GranularParameters},
    source::{Source, SourceTime},
    utils::buffer::{clear_buffer, stereo_to_interleaved},
    Error,
};

// -------------------------------------------------------------------------------------------------

mod grain;
mod message;
mod scheduler;

pub use message::GranularMessage;

use grain::GrainPool;
use scheduler::{GrainScheduler, SpawnContext};

// -------------------------------------------------------------------------------------------------

/// Options for creating a [`GranularEngine`].
#[derive(Debug, Clone)]
pub struct GranularEngineOptions {
    /// By default 44100. The output sample rate, used to convert seconds into samples.
    pub sample_rate: u32,

    /// By default 2. Channel layout of the interleaved output of the engine's [`Source`] impl.
    /// Mono layouts get a downmix, layouts with more than two channels get the stereo output
    /// in the first two channels.
    pub channel_count: usize,

    /// By default 1000. Maximum number of simultaneously playing grains.
    pub pool_size: usize,

    /// By default 0. The channel grains read from, in multi-channel source buffers. Gets
    /// clamped to the source buffer's last channel.
    pub source_channel: usize,

    /// By default 1024. Max number of frames rendered at once by the engine's [`Source`] impl.
    pub block_size: usize,

    /// By default 256. Capacity of the control message queue.
    pub message_queue_size: usize,

    /// By default None, which seeds the random number generator from the OS.
    /// Set to get reproducible grain patterns.
    pub seed: Option<u64>,

    /// Initial parameter distributions.
    pub parameters: GranularParameters,
}

impl Default for GranularEngineOptions {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channel_count: 2,
            pool_size: 1000,
            source_channel: 0,
            block_size: 1024,
            message_queue_size: 256,
            seed: None,
            parameters: GranularParameters::default(),
        }
    }
}

impl GranularEngineOptions {
    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn channel_count(mut self, channel_count: usize) -> Self {
        self.channel_count = channel_count;
        self
    }

    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn source_channel(mut self, source_channel: usize) -> Self {
        self.source_channel = source_channel;
        self
    }

    pub fn block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn message_queue_size(mut self, message_queue_size: usize) -> Self {
        self.message_queue_size = message_queue_size;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn parameter(mut self, parameter: GranularParameter, value: Distribution) -> Self {
        self.parameters.set(parameter, value);
        self
    }

    /// Validate all options. Returns Error::ParameterError on errors.
    pub fn validate(&self) -> Result<(), Error> {
        if self.sample_rate == 0 {
            return Err(Error::ParameterError(
                "engine options 'sample_rate' must be > 0".to_string(),
            ));
        }
        if self.channel_count == 0 {
            return Err(Error::ParameterError(
                "engine options 'channel_count' must be > 0".to_string(),
            ));
        }
        if self.pool_size == 0 {
            return Err(Error::ParameterError(
                "engine options 'pool_size' must be > 0".to_string(),
            ));
        }
        if self.block_size == 0 {
            return Err(Error::ParameterError(
                "engine options 'block_size' must be > 0".to_string(),
            ));
        }
        if self.message_queue_size == 0 {
            return Err(Error::ParameterError(
                "engine options 'message_queue_size' must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------

/// A real-time granular synthesizer.
///
/// Continuously spawns short, overlapping grains which read from a source buffer, shapes them
/// with an envelope table and mixes them into a stereo output. When grains start and how they
/// sound is controlled by the random [`Distribution`]s of the engine's [`GranularParameters`].
///
/// The engine runs in the audio thread and gets controlled via its [`GranularHandle`]. It
/// neither blocks nor allocates while processing.
pub struct GranularEngine {
    options: GranularEngineOptions,
    message_queue: Arc<ArrayQueue<GranularMessage>>,
    source_buffer: Arc<BufferRef>,
    envelope_buffer: Arc<BufferRef>,
    pool: GrainPool,
    scheduler: GrainScheduler,
    temp_left: Vec<f32>,
    temp_right: Vec<f32>,
}

impl GranularEngine {
    /// Create a new engine which reads grains from the given source and envelope buffers.
    ///
    /// Returns the engine, which should be moved to the audio thread, and its control handle.
    pub fn new(
        options: GranularEngineOptions,
        source_buffer: Arc<BufferRef>,
        envelope_buffer: Arc<BufferRef>,
    ) -> Result<(Self, GranularHandle), Error> {
        options.validate()?;

        let message_queue = Arc::new(ArrayQueue::new(options.message_queue_size));
        let rng = match options.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };
        let pool = GrainPool::new(options.pool_size);
        let scheduler = GrainScheduler::new(options.sample_rate, options.parameters, rng);
        let temp_left = vec![0.0; options.block_size];
        let temp_right = vec![0.0; options.block_size];

        log::debug!(
            "Creating granular engine with {} grains at {} Hz, reading from '{}' with envelope '{}'",
            options.pool_size,
            options.sample_rate,
            source_buffer.name(),
            envelope_buffer.name()
        );

        let handle = GranularHandle {
            message_queue: Arc::clone(&message_queue),
            source_buffer: Arc::clone(&source_buffer),
            envelope_buffer: Arc::clone(&envelope_buffer),
        };
        let engine = Self {
            options,
            message_queue,
            source_buffer,
            envelope_buffer,
            pool,
            scheduler,
            temp_left,
            temp_right,
        };
        Ok((engine, handle))
    }

    /// Create a new engine with buffers resolved by name from the given registry. Buffers which
    /// are not yet registered get registered as empty buffers.
    pub fn with_registry(
        options: GranularEngineOptions,
        registry: &mut BufferRegistry,
        source_buffer_name: &str,
        envelope_buffer_name: &str,
    ) -> Result<(Self, GranularHandle), Error> {
        let source_buffer = registry.get_or_insert(source_buffer_name);
        let envelope_buffer = registry.get_or_insert(envelope_buffer_name);
        Self::new(options, source_buffer, envelope_buffer)
    }

    /// The engine's options.
    pub fn options(&self) -> &GranularEngineOptions {
        &self.options
    }

    /// The currently applied parameter distributions.
    pub fn parameters(&self) -> &GranularParameters {
        self.scheduler.parameters()
    }

    /// True when the engine spawns new grains.
    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Number of currently playing grains.
    pub fn active_grain_count(&self) -> usize {
        self.pool.active_count()
    }

    /// Number of grain slots.
    pub fn grain_capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// Total number of spawned grains.
    pub fn spawned_grain_count(&self) -> u64 {
        self.scheduler.spawned_count()
    }

    /// Total number of rejected grain spawns.
    pub fn rejected_grain_count(&self) -> u64 {
        self.scheduler.rejected_count()
    }

    /// Render the next block of grains into the given planar stereo buffers.
    ///
    /// `head_input`, when given, is a per-sample signal in range `[0, 1)` which positions the
    /// head within the source buffer. It must provide at least as many samples as the output
    /// buffers. Without an input the head stays at the source buffer's start.
    ///
    /// Outputs are overwritten with the raw, unclipped sum of all grains. When the source or
    /// envelope buffer is missing, empty or got modified since the last call, the block is
    /// silent and playing grains get retired.
    ///
    /// Returns the number of rendered frames.
    pub fn process(
        &mut self,
        head_input: Option<&[f32]>,
        left: &mut [f32],
        right: &mut [f32],
    ) -> usize {
        debug_assert_eq!(left.len(), right.len(), "Output buffers must be of equal size");
        let mut frame_count = left.len().min(right.len());
        if let Some(input) = head_input {
            debug_assert!(input.len() >= frame_count, "Head input buffer is too small");
            frame_count = frame_count.min(input.len());
        }
        let left = &mut left[..frame_count];
        let right = &mut right[..frame_count];

        self.process_messages();

        // Buffers stay locked until the guards go out of scope
        let source_guard = self.source_buffer.lock();
        let envelope_guard = self.envelope_buffer.lock();

        let source_modified = self.source_buffer.take_modified();
        let envelope_modified = self.envelope_buffer.take_modified();
        if source_modified || envelope_modified {
            let active_grains = self.pool.active_count();
            if active_grains > 0 {
                log::debug!("Buffers got modified: retiring {active_grains} grains");
            }
            self.pool.reset();
            clear_buffer(left);
            clear_buffer(right);
            return frame_count;
        }

        let (Some(source), Some(envelope)) = (source_guard.get(), envelope_guard.get()) else {
            clear_buffer(left);
            clear_buffer(right);
            return frame_count;
        };

        let source_frames = source.frame_count();
        let source_channel = self.options.source_channel.min(source.channel_count() - 1);
        let envelope_frames = envelope.frame_count();
        let input_connected = head_input.is_some();

        for frame in 0..frame_count {
            let head = match head_input {
                Some(input) => head_position(input[frame], source_frames),
                None => 0.0,
            };

            let mut spawn_pending = self.scheduler.tick();

            let mut left_sum = 0.0;
            let mut right_sum = 0.0;
            for grain in self.pool.iter_mut() {
                if grain.is_active() {
                    if let Some((left_out, right_out)) =
                        grain.process(source, source_channel, envelope)
                    {
                        left_sum += left_out;
                        right_sum += right_out;
                    }
                }
                if spawn_pending && !grain.is_active() {
                    spawn_pending = false;
                    let context = SpawnContext {
                        head,
                        source_frames,
                        envelope_frames,
                        input_connected,
                    };
                    // rejections are logged and counted by the scheduler
                    let _ = self.scheduler.spawn(grain, &context);
                }
            }
            self.scheduler.retry_if_expired();

            left[frame] = left_sum;
            right[frame] = right_sum;
        }

        frame_count
    }

    fn process_messages(&mut self) {
        while let Some(message) = self.message_queue.pop() {
            match message {
                GranularMessage::Start => {
                    self.scheduler.set_running(true);
                }
                GranularMessage::Stop => {
                    self.scheduler.set_running(false);
                }
                GranularMessage::SetDistribution { parameter, value } => {
                    self.scheduler.set_parameter(parameter, value);
                }
            }
        }
    }
}

impl Source for GranularEngine {
    fn write(&mut self, output: &mut [f32], _time: &SourceTime) -> usize {
        let channel_count = self.options.channel_count;
        let block_size = self.temp_left.len();

        // Temporarily take the scratch buffers, so they can be passed to process
        let mut temp_left = std::mem::take(&mut self.temp_left);
        let mut temp_right = std::mem::take(&mut self.temp_right);

        let mut written = 0;
        for chunk in output.chunks_mut(block_size * channel_count) {
            let frame_count = chunk.len() / channel_count;
            let left = &mut temp_left[..frame_count];
            let right = &mut temp_right[..frame_count];
            self.process(None, left, right);
            let interleaved = stereo_to_interleaved(left, right, chunk, channel_count);
            // clear incomplete trailing frames
            clear_buffer(&mut chunk[interleaved..]);
            written += chunk.len();
        }

        self.temp_left = temp_left;
        self.temp_right = temp_right;
        written
    }

    fn channel_count(&self) -> usize {
        self.options.channel_count
    }

    fn sample_rate(&self) -> u32 {
        self.options.sample_rate
    }

    fn is_exhausted(&self) -> bool {
        false
    }
}

/// Convert a normalized head input value to a frame position. Values outside `[0, 1)` wrap.
#[inline]
fn head_position(value: f32, source_frames: usize) -> f64 {
    let value = value as f64;
    if value.is_finite() {
        (value.rem_euclid(1.0) * source_frames as f64)
            .floor()
            .min((source_frames - 1) as f64)
    } else {
        0.0
    }
}

// -------------------------------------------------------------------------------------------------

/// Control thread side of a [`GranularEngine`].
///
/// Delivers parameter changes and start/stop requests to the engine, which applies them at the
/// start of its next processed block, and provides access to the engine's buffers.
#[derive(Clone)]
pub struct GranularHandle {
    message_queue: Arc<ArrayQueue<GranularMessage>>,
    source_buffer: Arc<BufferRef>,
    envelope_buffer: Arc<BufferRef>,
}

impl GranularHandle {
    /// Send a control message to the engine.
    pub fn send(&self, message: GranularMessage) -> Result<(), Error> {
        self.message_queue.push(message).map_err(|message| {
            log::warn!("Granular engine message queue is full. Dropping message {message:?}");
            Error::SendError("Granular engine message queue is full".to_string())
        })
    }

    /// Parse and send a named host message. See [`GranularMessage::parse`].
    pub fn send_named(&self, name: &str, args: &[f64]) -> Result<(), Error> {
        let message = GranularMessage::parse(name, args).inspect_err(|err| {
            log::warn!("Failed to parse message '{name}': {err}");
        })?;
        self.send(message)
    }

    /// Start spawning new grains.
    pub fn start(&self) -> Result<(), Error> {
        self.send(GranularMessage::Start)
    }

    /// Stop spawning new grains. Playing grains fade out naturally.
    pub fn stop(&self) -> Result<(), Error> {
        self.send(GranularMessage::Stop)
    }

    /// Set a parameter's distribution.
    pub fn set_distribution(
        &self,
        parameter: GranularParameter,
        value: Distribution,
    ) -> Result<(), Error> {
        self.send(GranularMessage::set(parameter, value))
    }

    /// Set the grain transposition via a pitch distribution in Hz.
    pub fn set_frequency(&self, value: Distribution) -> Result<(), Error> {
        self.send(GranularMessage::frequency(value))
    }

    /// The buffer grains read from.
    pub fn source_buffer(&self) -> &Arc<BufferRef> {
        &self.source_buffer
    }

    /// The buffer grain envelopes are read from.
    pub fn envelope_buffer(&self) -> &Arc<BufferRef> {
        &self.envelope_buffer
    }

    /// Replace the content of the source buffer.
    pub fn set_source_buffer(&self, buffer: SampleBuffer) {
        self.source_buffer.replace(buffer);
    }

    /// Replace the content of the envelope buffer.
    pub fn set_envelope_buffer(&self, buffer: SampleBuffer) {
        self.envelope_buffer.replace(buffer);
    }

    /// Notify the engine that the buffer with the given name got modified. Names which refer
    /// to neither of the engine's buffers are an error.
    pub fn notify_buffer_modified(&self, name: &str) -> Result<(), Error> {
        let mut found = false;
        for buffer in [&self.source_buffer, &self.envelope_buffer] {
            if buffer.name() == name {
                buffer.notify_modified();
                found = true;
            }
        }
        if found {
            Ok(())
        } else {
            Err(Error::BufferError(format!(
                "Buffer '{name}' is not used by this engine"
            )))
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use crate::envelope::EnvelopeShape;

    const BLOCK_SIZE: usize = 64;

    struct TestEngine {
        engine: GranularEngine,
        handle: GranularHandle,
        registry: BufferRegistry,
    }

    impl TestEngine {
        fn new(options: GranularEngineOptions) -> Result<Self, Box<Error>> {
            let mut registry = BufferRegistry::new();
            let (engine, handle) = GranularEngine::with_registry(
                options.seed(0x5eed),
                &mut registry,
                "wave",
                "envelope",
            )?;
            Ok(Self {
                engine,
                handle,
                registry,
            })
        }

        fn with_buffers(
            options: GranularEngineOptions,
            source: SampleBuffer,
            envelope: SampleBuffer,
        ) -> Result<Self, Box<Error>> {
            let mut test = Self::new(options)?;
            test.handle.set_source_buffer(source);
            test.handle.set_envelope_buffer(envelope);
            // consume the modification
            test.render(1);
            Ok(test)
        }

        fn render(&mut self, frames: usize) -> (Vec<f32>, Vec<f32>) {
            let mut left = vec![0.0; frames];
            let mut right = vec![0.0; frames];
            for (left, right) in left
                .chunks_mut(BLOCK_SIZE)
                .zip(right.chunks_mut(BLOCK_SIZE))
            {
                self.engine.process(None, left, right);
            }
            (left, right)
        }
    }

    fn constant_source(frames: usize) -> SampleBuffer {
        SampleBuffer::from_mono(vec![1.0; frames])
    }

    fn flat_envelope() -> SampleBuffer {
        SampleBuffer::from_mono(vec![1.0; 512])
    }

    #[test]
    fn invalid_options() {
        let mut registry = BufferRegistry::new();
        for options in [
            GranularEngineOptions::default().sample_rate(0),
            GranularEngineOptions::default().pool_size(0),
            GranularEngineOptions::default().channel_count(0),
            GranularEngineOptions::default().block_size(0),
            GranularEngineOptions::default().message_queue_size(0),
        ] {
            assert!(
                GranularEngine::with_registry(options, &mut registry, "wave", "env").is_err()
            );
        }
    }

    #[test]
    fn silence_without_buffers() -> Result<(), Box<Error>> {
        let mut test = TestEngine::new(GranularEngineOptions::default())?;
        test.handle.start()?;
        let (left, right) = test.render(1000);
        assert!(left.iter().chain(right.iter()).all(|s| *s == 0.0));
        assert_eq!(test.engine.spawned_grain_count(), 0);

        // empty source buffer
        test.handle.set_source_buffer(SampleBuffer::from_mono(vec![]));
        test.handle.set_envelope_buffer(flat_envelope());
        let (left, right) = test.render(1000);
        assert!(left.iter().chain(right.iter()).all(|s| *s == 0.0));
        assert_eq!(test.engine.spawned_grain_count(), 0);
        Ok(())
    }

    #[test]
    fn stopped_engine_is_silent() -> Result<(), Box<Error>> {
        let mut test = TestEngine::with_buffers(
            GranularEngineOptions::default(),
            constant_source(44100),
            flat_envelope(),
        )?;
        assert!(!test.engine.is_running());
        let (left, _) = test.render(4096);
        assert!(left.iter().all(|s| *s == 0.0));
        assert_eq!(test.engine.active_grain_count(), 0);
        Ok(())
    }

    #[test]
    fn spawn_cadence() -> Result<(), Box<Error>> {
        let options = GranularEngineOptions::default()
            .parameter(GranularParameter::GrainRate, Distribution::constant(0.1))
            .parameter(GranularParameter::GrainDuration, Distribution::constant(0.01));
        let mut test =
            TestEngine::with_buffers(options, constant_source(44100), flat_envelope())?;
        test.handle.start()?;
        // spawns at frame 0, 4410 and 8820
        test.engine.process(None, &mut [0.0; 1], &mut [0.0; 1]);
        assert_eq!(test.engine.spawned_grain_count(), 1);
        test.render(4409);
        assert_eq!(test.engine.spawned_grain_count(), 1);
        test.render(1);
        assert_eq!(test.engine.spawned_grain_count(), 2);
        test.render(4410);
        assert_eq!(test.engine.spawned_grain_count(), 3);
        Ok(())
    }

    #[test]
    fn one_spawn_per_frame() -> Result<(), Box<Error>> {
        // zero rate requests a spawn in every frame
        let options = GranularEngineOptions::default()
            .pool_size(16)
            .parameter(GranularParameter::GrainRate, Distribution::constant(0.0))
            .parameter(GranularParameter::GrainDuration, Distribution::constant(0.01));
        let mut test =
            TestEngine::with_buffers(options, constant_source(44100), flat_envelope())?;
        test.handle.start()?;
        test.render(10);
        assert_eq!(test.engine.spawned_grain_count(), 10);
        assert_eq!(test.engine.active_grain_count(), 10);
        // pool exhausted: spawns wait for free slots
        test.render(100);
        assert_eq!(test.engine.spawned_grain_count(), 16);
        assert_eq!(test.engine.active_grain_count(), 16);
        Ok(())
    }

    #[test]
    fn overlapping_grains_sum() -> Result<(), Box<Error>> {
        // constant source, flat envelope, centered pan: every grain adds 0.5 per channel
        let options = GranularEngineOptions::default()
            .parameter(GranularParameter::GrainRate, Distribution::constant(0.0))
            .parameter(GranularParameter::GrainDuration, Distribution::constant(0.1))
            .parameter(GranularParameter::Pan, Distribution::constant(0.5));
        let mut test =
            TestEngine::with_buffers(options, constant_source(44100), flat_envelope())?;
        test.handle.start()?;
        let (left, right) = test.render(8);
        // grains spawned in a frame start playing in the next one
        assert_eq!(left, vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5]);
        assert_eq!(left, right);
        Ok(())
    }

    #[test]
    fn stop_lets_grains_finish() -> Result<(), Box<Error>> {
        let options = GranularEngineOptions::default()
            .parameter(GranularParameter::GrainRate, Distribution::constant(0.001))
            .parameter(GranularParameter::GrainDuration, Distribution::constant(0.01))
            .parameter(GranularParameter::Pan, Distribution::constant(0.5));
        let mut test =
            TestEngine::with_buffers(options, constant_source(44100), flat_envelope())?;
        test.handle.start()?;
        test.render(1000);
        let spawned = test.engine.spawned_grain_count();
        assert!(spawned > 0);
        assert!(test.engine.active_grain_count() > 0);

        test.handle.stop()?;
        let (left, _) = test.render(BLOCK_SIZE);
        assert!(!test.engine.is_running());
        assert!(left.iter().all(|s| *s > 0.0));
        assert_eq!(test.engine.spawned_grain_count(), spawned);

        // grains last 441 samples
        let (left, _) = test.render(512);
        assert_eq!(test.engine.active_grain_count(), 0);
        assert_eq!(left.last().copied(), Some(0.0));
        assert_eq!(test.engine.spawned_grain_count(), spawned);
        Ok(())
    }

    #[test]
    fn modified_buffer_silences_one_block() -> Result<(), Box<Error>> {
        let options = GranularEngineOptions::default()
            .parameter(GranularParameter::GrainRate, Distribution::constant(0.0))
            .parameter(GranularParameter::GrainDuration, Distribution::constant(0.1))
            .parameter(GranularParameter::Pan, Distribution::constant(0.5));
        let mut test =
            TestEngine::with_buffers(options, constant_source(44100), flat_envelope())?;
        test.handle.start()?;
        test.render(BLOCK_SIZE);
        assert!(test.engine.active_grain_count() > 0);

        test.handle.notify_buffer_modified("wave")?;
        assert!(test.handle.notify_buffer_modified("unknown").is_err());

        let (left, right) = test.render(BLOCK_SIZE);
        assert!(left.iter().chain(right.iter()).all(|s| *s == 0.0));
        assert_eq!(test.engine.active_grain_count(), 0);
        assert!(!test.handle.source_buffer().is_modified());

        let (left, _) = test.render(BLOCK_SIZE);
        assert!(left.iter().skip(1).all(|s| *s > 0.0));
        Ok(())
    }

    #[test]
    fn registry_replacement_retires_grains() -> Result<(), Box<Error>> {
        // grains of 441 frames fit into the 1000 frames source
        let options = GranularEngineOptions::default()
            .parameter(GranularParameter::GrainRate, Distribution::constant(0.0))
            .parameter(GranularParameter::GrainDuration, Distribution::constant(0.01));
        let mut test =
            TestEngine::with_buffers(options, constant_source(1000), flat_envelope())?;
        test.handle.start()?;
        test.render(BLOCK_SIZE);
        assert!(test.engine.active_grain_count() > 0);

        test.registry
            .replace("envelope", EnvelopeShape::Hann.table(256));
        assert!(test.engine.active_grain_count() > 0);
        let (left, _) = test.render(BLOCK_SIZE);
        assert!(left.iter().all(|s| *s == 0.0));
        assert_eq!(test.engine.active_grain_count(), 0);
        test.registry.collect();
        Ok(())
    }

    #[test]
    fn excessive_transposition_is_rejected() -> Result<(), Box<Error>> {
        let options = GranularEngineOptions::default()
            .parameter(GranularParameter::Transposition, Distribution::constant(8.0));
        let mut test =
            TestEngine::with_buffers(options, constant_source(1000), flat_envelope())?;
        test.handle.start()?;
        let (left, _) = test.render(4096);
        assert!(left.iter().all(|s| *s == 0.0));
        assert_eq!(test.engine.spawned_grain_count(), 0);
        assert!(test.engine.rejected_grain_count() > 0);
        assert_eq!(test.engine.active_grain_count(), 0);
        Ok(())
    }

    #[test]
    fn slow_grains_keep_recycling() -> Result<(), Box<Error>> {
        // 40 octaves down the read pointer barely moves, but grains still last 441 samples
        let options = GranularEngineOptions::default()
            .pool_size(1)
            .parameter(GranularParameter::GrainRate, Distribution::constant(0.0))
            .parameter(GranularParameter::GrainDuration, Distribution::constant(0.01))
            .parameter(GranularParameter::Transposition, Distribution::constant(-40.0));
        let mut test =
            TestEngine::with_buffers(options, constant_source(44100), flat_envelope())?;
        test.handle.start()?;
        test.render(2000);
        assert_eq!(test.engine.rejected_grain_count(), 0);
        assert!(test.engine.spawned_grain_count() >= 4);
        Ok(())
    }

    #[test]
    fn parameter_messages() -> Result<(), Box<Error>> {
        let mut test = TestEngine::new(GranularEngineOptions::default())?;
        test.handle.send_named("pan", &[0.25, 0.25, 0.25, 1.0])?;
        test.handle.set_frequency(Distribution::constant(523.2511306011974))?;
        assert!(test.handle.send_named("pan", &[]).is_err());
        test.render(1);
        assert_eq!(test.engine.parameters().pan, Distribution::constant(0.25));
        assert!((test.engine.parameters().transposition.mid() - 1.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn message_queue_overflow() -> Result<(), Box<Error>> {
        let test = TestEngine::new(GranularEngineOptions::default().message_queue_size(2))?;
        test.handle.start()?;
        test.handle.stop()?;
        assert!(matches!(test.handle.start(), Err(Error::SendError(_))));
        Ok(())
    }

    #[test]
    fn head_input_positions_grains() -> Result<(), Box<Error>> {
        // source holds its frame index, grains read at unit speed along a moving head
        let source = SampleBuffer::from_mono((0..1000).map(|i| i as f32).collect());
        let options = GranularEngineOptions::default()
            .pool_size(1)
            .parameter(GranularParameter::GrainRate, Distribution::constant(1.0))
            .parameter(GranularParameter::GrainDuration, Distribution::constant(0.001))
            .parameter(GranularParameter::GrainHead, Distribution::constant(0.1))
            .parameter(GranularParameter::Pan, Distribution::constant(0.0));
        let mut test = TestEngine::with_buffers(options, source, flat_envelope())?;
        test.handle.start()?;

        let head = [0.5; 8];
        let mut left = [0.0; 8];
        let mut right = [0.0; 8];
        test.engine.process(Some(&head), &mut left, &mut right);
        // head at frame 500, shifted 100 frames behind it
        assert_eq!(&left[1..4], &[400.0, 401.0, 402.0]);
        assert!(right.iter().all(|s| *s == 0.0));
        Ok(())
    }

    #[test]
    fn source_writes_interleaved() -> Result<(), Box<Error>> {
        let options = GranularEngineOptions::default()
            .block_size(16)
            .parameter(GranularParameter::GrainRate, Distribution::constant(0.0))
            .parameter(GranularParameter::Pan, Distribution::constant(1.0));
        let mut test =
            TestEngine::with_buffers(options, constant_source(44100), flat_envelope())?;
        test.handle.start()?;
        let mut output = vec![0.0; 2 * 50];
        let written = test.engine.write(&mut output, &SourceTime::default());
        assert_eq!(written, output.len());
        assert_eq!(Source::channel_count(&test.engine), 2);
        // all grains pan hard right
        assert!(output.chunks(2).all(|frame| frame[0] == 0.0));
        assert_eq!(output[3], 1.0);
        assert_eq!(output[99], 49.0);
        Ok(())
    }
}

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Instant,
};

#[cfg(feature = "assert-allocs")]
use assert_no_alloc::*;

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    StreamConfig,
};

use crate::{
    error::Error,
    source::{Source, SourceTime},
    utils::buffer::clear_buffer,
};

// -------------------------------------------------------------------------------------------------

const PREFERRED_SAMPLE_FORMAT: cpal::SampleFormat = cpal::SampleFormat::F32;
const PREFERRED_SAMPLE_RATE: cpal::SampleRate = cpal::SampleRate(44100);
const PREFERRED_CHANNELS: cpal::ChannelCount = 2;
const PREFERRED_BUFFER_SIZE: cpal::BufferSize = if cfg!(debug_assertions) {
    cpal::BufferSize::Default
} else {
    cpal::BufferSize::Fixed(2048)
};

// -------------------------------------------------------------------------------------------------

/// Real-time audio output on the system's default output device.
///
/// Open the device first, then create sources with the device's
/// [`sample_rate`](Self::sample_rate) and [`channel_count`](Self::channel_count) and
/// [`play`](Self::play) them.
pub struct CpalOutput {
    device: cpal::Device,
    config: StreamConfig,
    stream: Option<cpal::Stream>,
    playback_pos: Arc<AtomicU64>,
}

impl CpalOutput {
    /// Open the default output device of the default host.
    pub fn open() -> Result<Self, Error> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or(cpal::DefaultStreamConfigError::DeviceNotAvailable)?;

        if let Ok(name) = device.name() {
            log::info!("Using audio device: {name}");
        }

        let supported = Self::preferred_output_config(&device)?;
        let config = StreamConfig {
            buffer_size: PREFERRED_BUFFER_SIZE,
            ..supported.config()
        };
        let playback_pos = Arc::new(AtomicU64::new(0));

        Ok(Self {
            device,
            config,
            stream: None,
            playback_pos,
        })
    }

    fn preferred_output_config(
        device: &cpal::Device,
    ) -> Result<cpal::SupportedStreamConfig, Error> {
        for s in device.supported_output_configs()? {
            let rates = s.min_sample_rate()..=s.max_sample_rate();
            if s.channels() == PREFERRED_CHANNELS
                && s.sample_format() == PREFERRED_SAMPLE_FORMAT
                && rates.contains(&PREFERRED_SAMPLE_RATE)
            {
                return Ok(s.with_sample_rate(PREFERRED_SAMPLE_RATE));
            }
        }
        Ok(device.default_output_config()?)
    }

    /// Actual device's output channel count.
    pub fn channel_count(&self) -> usize {
        self.config.channels as usize
    }

    /// Actual device's output sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    /// Actual device's output playhead position in **samples** (NOT frames).
    pub fn sample_position(&self) -> u64 {
        self.playback_pos.load(Ordering::Relaxed)
    }

    /// True while a source is playing.
    pub fn is_playing(&self) -> bool {
        self.stream.is_some()
    }

    /// Play the given source, replacing the currently playing one. The source must match the
    /// device's sample rate and channel layout.
    pub fn play<S: Source>(&mut self, source: S) -> Result<(), Error> {
        if source.channel_count() != self.channel_count()
            || source.sample_rate() != self.sample_rate()
        {
            return Err(Error::ParameterError(format!(
                "Source layout ({} Hz, {} channels) does not match the device ({} Hz, {} channels)",
                source.sample_rate(),
                source.channel_count(),
                self.sample_rate(),
                self.channel_count()
            )));
        }
        self.stop();

        let mut callback = StreamCallback {
            source,
            channel_count: self.channel_count(),
            playback_pos: Arc::clone(&self.playback_pos),
            playback_pos_instant: Instant::now(),
        };

        log::info!("Opening output stream: {:?}", self.config);
        let stream = self.device.build_output_stream(
            &self.config,
            move |output: &mut [f32], _: &cpal::OutputCallbackInfo| {
                callback.write_samples(output);
            },
            |err| {
                log::error!("Audio output error: {err}");
            },
            None,
        )?;
        stream.play()?;
        self.stream = Some(stream);
        Ok(())
    }

    /// Pause playback without dropping the playing source.
    pub fn pause(&mut self) -> Result<(), Error> {
        if let Some(stream) = &self.stream {
            log::debug!("Pausing audio output stream");
            stream.pause()?;
        }
        Ok(())
    }

    /// Resume paused playback.
    pub fn resume(&mut self) -> Result<(), Error> {
        if let Some(stream) = &self.stream {
            log::debug!("Resuming audio output stream");
            stream.play()?;
        }
        Ok(())
    }

    /// Stop playback and drop the playing source.
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            log::debug!("Closing audio output stream");
            if let Err(err) = stream.pause() {
                log::warn!("Failed to pause output stream: {err}");
            }
        }
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.stop();
    }
}

// -------------------------------------------------------------------------------------------------

struct StreamCallback<S: Source> {
    source: S,
    channel_count: usize,
    playback_pos: Arc<AtomicU64>,
    playback_pos_instant: Instant,
}

impl<S: Source> StreamCallback<S> {
    fn write_samples(&mut self, output: &mut [f32]) {
        let time = SourceTime {
            pos_in_frames: self.playback_pos.load(Ordering::Relaxed) / self.channel_count as u64,
            pos_instant: self.playback_pos_instant,
        };

        #[cfg(not(feature = "assert-allocs"))]
        let written = self.source.write(output, &time);
        #[cfg(feature = "assert-allocs")]
        let written = assert_no_alloc(|| self.source.write(output, &time));

        // Mute any remaining samples
        clear_buffer(&mut output[written..]);

        self.playback_pos
            .fetch_add(output.len() as u64, Ordering::Relaxed);
    }
}

// -------------------------------------------------------------------------------------------------

impl From<cpal::DefaultStreamConfigError> for Error {
    fn from(err: cpal::DefaultStreamConfigError) -> Error {
        Error::OutputDeviceError(Box::new(err))
    }
}

impl From<cpal::SupportedStreamConfigsError> for Error {
    fn from(err: cpal::SupportedStreamConfigsError) -> Error {
        Error::OutputDeviceError(Box::new(err))
    }
}

impl From<cpal::BuildStreamError> for Error {
    fn from(err: cpal::BuildStreamError) -> Error {
        Error::OutputDeviceError(Box::new(err))
    }
}

impl From<cpal::PlayStreamError> for Error {
    fn from(err: cpal::PlayStreamError) -> Error {
        Error::OutputDeviceError(Box::new(err))
    }
}

impl From<cpal::PauseStreamError> for Error {
    fn from(err: cpal::PauseStreamError) -> Error {
        Error::OutputDeviceError(Box::new(err))
    }
}

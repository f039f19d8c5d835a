use std::{
    fs::File,
    io::BufWriter,
    path::Path,
    time::{Duration, Instant},
};

#[cfg(feature = "assert-allocs")]
use assert_no_alloc::*;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::{
    error::Error,
    source::{Source, SourceTime},
    utils::buffer::clear_buffer,
};

// -------------------------------------------------------------------------------------------------

const BUFFER_SIZE_FRAMES: usize = 1024;

// -------------------------------------------------------------------------------------------------

/// Offline audio output, which renders sources into a wav file as fast as possible.
///
/// Wav file contents are always saved as 32bit floats. The file gets finalized when calling
/// [`finalize`](Self::finalize) or when the output is dropped.
pub struct WavOutput {
    writer: WavWriter<BufWriter<File>>,
    channel_count: usize,
    sample_rate: u32,
    buffer: Vec<f32>,
    playback_pos: u64,
    playback_pos_instant: Instant,
}

impl WavOutput {
    /// Create a new wav file at the given path with the given sample rate and channel layout.
    pub fn open<P: AsRef<Path>>(
        file_path: P,
        sample_rate: u32,
        channel_count: usize,
    ) -> Result<Self, Error> {
        if sample_rate == 0 || channel_count == 0 || channel_count > u16::MAX as usize {
            return Err(Error::ParameterError(format!(
                "Invalid wav output specs: {sample_rate} Hz, {channel_count} channels"
            )));
        }
        let spec = WavSpec {
            channels: channel_count as u16,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        log::info!(
            "Opening wav output '{}': {:?}",
            file_path.as_ref().display(),
            spec
        );
        let writer = WavWriter::create(file_path, spec)?;
        Ok(Self {
            writer,
            channel_count,
            sample_rate,
            buffer: vec![0.0; BUFFER_SIZE_FRAMES * channel_count],
            playback_pos: 0,
            playback_pos_instant: Instant::now(),
        })
    }

    /// The wav file's channel layout.
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// The wav file's sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames written so far.
    pub fn sample_position(&self) -> u64 {
        self.playback_pos
    }

    /// Render the given source for the given duration, or until it is exhausted, into the file.
    /// The source must match the file's sample rate and channel layout.
    ///
    /// Returns the number of written frames.
    pub fn write_source<S: Source + ?Sized>(
        &mut self,
        source: &mut S,
        duration: Duration,
    ) -> Result<u64, Error> {
        if source.channel_count() != self.channel_count || source.sample_rate() != self.sample_rate
        {
            return Err(Error::ParameterError(format!(
                "Source layout ({} Hz, {} channels) does not match the wav output ({} Hz, {} channels)",
                source.sample_rate(),
                source.channel_count(),
                self.sample_rate,
                self.channel_count
            )));
        }

        let total_frames = (duration.as_secs_f64() * self.sample_rate as f64).round() as u64;
        let mut written_frames = 0;
        while written_frames < total_frames && !source.is_exhausted() {
            let frames = (total_frames - written_frames).min(BUFFER_SIZE_FRAMES as u64) as usize;
            let buffer = &mut self.buffer[..frames * self.channel_count];
            let time = SourceTime {
                pos_in_frames: self.playback_pos,
                pos_instant: self.playback_pos_instant,
            };

            #[cfg(not(feature = "assert-allocs"))]
            let written = source.write(buffer, &time);
            #[cfg(feature = "assert-allocs")]
            let written = assert_no_alloc(|| source.write(buffer, &time));

            // Mute any remaining samples
            clear_buffer(&mut buffer[written..]);

            for sample in buffer.iter() {
                self.writer.write_sample(*sample)?;
            }
            self.playback_pos += frames as u64;
            written_frames += frames as u64;
        }
        Ok(written_frames)
    }

    /// Flush and close the wav file.
    pub fn finalize(self) -> Result<(), Error> {
        log::debug!("Finalizing wav output after {} frames", self.playback_pos);
        self.writer.finalize()?;
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------

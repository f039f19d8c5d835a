use std::path::PathBuf;

use arg::{parse_args, Args};

use grainfield::{buffer::SampleBuffer, envelope::EnvelopeShape, Error};

// -------------------------------------------------------------------------------------------------

const DEFAULT_LOG_LEVEL: log::Level = if cfg!(debug_assertions) {
    log::Level::Debug
} else {
    log::Level::Warn
};

// -------------------------------------------------------------------------------------------------

/// Default program arguments for grainfield demo applications.
#[derive(Args, Debug, Default)]
#[allow(unused)]
pub struct Arguments {
    #[arg(short = "s", long = "sample")]
    /// Wav file to read grains from. By default a synthesized chord is used.
    pub sample_path: Option<PathBuf>,
    #[arg(short = "o", long = "output")]
    /// Wav file to render into, when rendering offline.
    pub output_path: Option<PathBuf>,
    #[arg(short = "e", long = "envelope")]
    /// Grain envelope shape: \"Hann\", \"Blackman\", \"Triangle\", \"Tukey\", \"Trapezoid\",
    /// \"Exponential\", \"RampUp\" or \"RampDown\". By default \"Hann\".
    pub envelope: Option<EnvelopeShape>,
    #[arg(short = "d", long = "duration")]
    /// Playback duration in seconds.
    pub duration: Option<f32>,
    #[arg(long = "seed")]
    /// Seed for reproducible grain patterns.
    pub seed: Option<u64>,
    #[arg(short = "l", long = "log-level")]
    /// Set logging level to \"debug\", \"info\", \"warn\" or \"error\".
    /// By default \"debug\" in dev builds and \"warn\" in release builds.
    pub log_level: Option<log::Level>,
}

/// Parse common demo arguments and apply the log-level arg to the logger
#[allow(unused)]
pub fn parse() -> Arguments {
    // Parse args
    let args = parse_args::<Arguments>();

    create_logger(args.log_level);
    args
}

// -------------------------------------------------------------------------------------------------

/// Create default logger from arguments. Invoked from `parse`.
#[allow(unused)]
pub fn create_logger(log_level: Option<log::Level>) {
    // Init logger
    simple_logger::SimpleLogger::new()
        // use default or arg level by default
        .with_level(log_level.unwrap_or(DEFAULT_LOG_LEVEL).to_level_filter())
        .init()
        .expect("Failed to set logger");
}

// -------------------------------------------------------------------------------------------------

/// Load the source buffer from the sample path argument or synthesize a default one.
#[allow(unused)]
pub fn source_buffer(args: &Arguments, sample_rate: u32) -> Result<SampleBuffer, Error> {
    match &args.sample_path {
        Some(path) => {
            let reader = hound::WavReader::open(path).map_err(wav_error)?;
            let spec = reader.spec();
            if spec.sample_rate != sample_rate {
                log::warn!(
                    "Sample rate of '{}' is {} Hz, playing it at {} Hz",
                    path.display(),
                    spec.sample_rate,
                    sample_rate
                );
            }
            let samples = match spec.sample_format {
                hound::SampleFormat::Float => reader
                    .into_samples::<f32>()
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(wav_error)?,
                hound::SampleFormat::Int => {
                    let scale = 1.0 / (1_i64 << (spec.bits_per_sample - 1)) as f32;
                    reader
                        .into_samples::<i32>()
                        .map(|sample| sample.map(|sample| sample as f32 * scale))
                        .collect::<Result<Vec<_>, _>>()
                        .map_err(wav_error)?
                }
            };
            SampleBuffer::new(samples, spec.channels as usize)
        }
        None => {
            // Two seconds of a C minor chord
            let frequencies = [130.81, 155.56, 196.0, 261.63];
            let samples = (0..sample_rate as usize * 2)
                .map(|frame| {
                    let time = frame as f32 / sample_rate as f32;
                    frequencies
                        .iter()
                        .map(|f| (time * f * std::f32::consts::TAU).sin())
                        .sum::<f32>()
                        / frequencies.len() as f32
                })
                .collect();
            Ok(SampleBuffer::from_mono(samples))
        }
    }
}

fn wav_error(err: hound::Error) -> Error {
    Error::IoError(std::io::Error::other(err))
}

/// Create the envelope table from the envelope argument.
#[allow(unused)]
pub fn envelope_buffer(args: &Arguments) -> SampleBuffer {
    args.envelope.unwrap_or(EnvelopeShape::Hann).table(1024)
}

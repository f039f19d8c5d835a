//! Renders a slowly evolving grain cloud into a wav file.

use std::time::Duration;

use grainfield::{
    buffer::BufferRegistry, distribution::Distribution, outputs::WavOutput,
    parameter::GranularParameter, Error, GranularEngine, GranularEngineOptions,
};

// -------------------------------------------------------------------------------------------------

// Common demo code
#[path = "./common/arguments.rs"]
mod arguments;

// -------------------------------------------------------------------------------------------------

#[cfg(all(debug_assertions, feature = "assert-allocs"))]
#[global_allocator]
static A: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;

// -------------------------------------------------------------------------------------------------

const SAMPLE_RATE: u32 = 44100;
const CHANNEL_COUNT: usize = 2;

const DEFAULT_OUTPUT_PATH: &str = "grains.wav";
const DEFAULT_DURATION: f32 = 12.0;

// -------------------------------------------------------------------------------------------------

fn main() -> Result<(), Error> {
    // Parse optional arguments
    let args = arguments::parse();

    // Register source and envelope buffers
    let mut buffers = BufferRegistry::new();
    buffers.replace("source", arguments::source_buffer(&args, SAMPLE_RATE)?);
    buffers.replace("envelope", arguments::envelope_buffer(&args));

    let mut options = GranularEngineOptions::default()
        .sample_rate(SAMPLE_RATE)
        .channel_count(CHANNEL_COUNT);
    if let Some(seed) = args.seed {
        options = options.seed(seed);
    }
    let (mut engine, handle) =
        GranularEngine::with_registry(options, &mut buffers, "source", "envelope")?;

    let output_path = args
        .output_path
        .clone()
        .unwrap_or_else(|| DEFAULT_OUTPUT_PATH.into());
    let mut output = WavOutput::open(&output_path, SAMPLE_RATE, CHANNEL_COUNT)?;

    // A little score: each step applies a few messages, then renders a slice of the cloud
    let duration = args.duration.unwrap_or(DEFAULT_DURATION).max(0.0);
    let step_duration = Duration::from_secs_f32(duration / 4.0);

    // Sparse, long grains around the source's center
    handle.send_named("graindur", &[0.1, 0.2, 0.4, 2.0])?;
    handle.send_named("grainrate", &[0.02, 0.05, 0.1, 1.0])?;
    handle.send_named("grainhead", &[0.4, 0.5, 0.6, 3.0])?;
    handle.start()?;
    output.write_source(&mut engine, step_duration)?;

    // Denser, spread over the whole source
    handle.set_distribution(
        GranularParameter::GrainRate,
        Distribution::new(0.005, 0.01, 0.02, 1.0),
    )?;
    handle.set_distribution(GranularParameter::GrainHead, Distribution::new(0.0, 0.5, 1.0, 1.0))?;
    output.write_source(&mut engine, step_duration)?;

    // Short, shimmering grains around 1 kHz
    handle.send_named("graindur", &[0.01, 0.03, 0.05, 1.0])?;
    handle.set_frequency(Distribution::new(500.0, 1000.0, 2000.0, 4.0))?;
    handle.send_named("pan", &[0.0, 0.5, 1.0, 0.0])?;
    output.write_source(&mut engine, step_duration)?;

    // Let the remaining grains fade out
    handle.stop()?;
    output.write_source(&mut engine, step_duration)?;

    println!(
        "Rendered {} grains ({} rejected) into '{}'",
        engine.spawned_grain_count(),
        engine.rejected_grain_count(),
        output_path.display()
    );
    output.finalize()?;
    buffers.collect();

    Ok(())
}

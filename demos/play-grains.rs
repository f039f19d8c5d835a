//! Plays a grain cloud on the default audio device while moving its parameters around.

use std::time::Duration;

use grainfield::{
    buffer::BufferRegistry, distribution::Distribution, outputs::CpalOutput,
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

const DEFAULT_DURATION: f32 = 20.0;
const UPDATE_RATE: Duration = Duration::from_millis(50);

// -------------------------------------------------------------------------------------------------

fn main() -> Result<(), Error> {
    // Parse optional arguments
    let args = arguments::parse();

    // Open the default output device
    let mut output = CpalOutput::open()?;
    let sample_rate = output.sample_rate();
    let channel_count = output.channel_count();

    // Register source and envelope buffers
    let mut buffers = BufferRegistry::new();
    buffers.replace("source", arguments::source_buffer(&args, sample_rate)?);
    buffers.replace("envelope", arguments::envelope_buffer(&args));

    let mut options = GranularEngineOptions::default()
        .sample_rate(sample_rate)
        .channel_count(channel_count)
        .parameter(
            GranularParameter::GrainDuration,
            Distribution::new(0.05, 0.1, 0.3, 2.0),
        )
        .parameter(
            GranularParameter::Transposition,
            Distribution::new(-0.02, 0.0, 0.02, 1.0),
        );
    if let Some(seed) = args.seed {
        options = options.seed(seed);
    }
    let (engine, handle) =
        GranularEngine::with_registry(options, &mut buffers, "source", "envelope")?;

    handle.start()?;
    output.play(engine)?;

    // Slowly sweep the grain head through the source and breathe the grain density
    let duration = Duration::from_secs_f32(args.duration.unwrap_or(DEFAULT_DURATION).max(0.0));
    let steps = (duration.as_secs_f32() / UPDATE_RATE.as_secs_f32()) as usize;
    for step in 0..steps {
        let time = step as f64 * UPDATE_RATE.as_secs_f64();
        let head = (time * 0.05).fract();
        handle.set_distribution(
            GranularParameter::GrainHead,
            Distribution::new(head - 0.05, head, head + 0.05, 2.0),
        )?;
        let density = 0.5 + 0.5 * (time * 0.3).sin();
        let rate = 0.005 + 0.045 * (1.0 - density);
        handle.set_distribution(
            GranularParameter::GrainRate,
            Distribution::new(rate * 0.5, rate, rate * 2.0, 1.0),
        )?;
        buffers.collect();
        std::thread::sleep(UPDATE_RATE);
    }

    // Let the remaining grains fade out
    handle.stop()?;
    std::thread::sleep(Duration::from_millis(500));
    output.stop();

    Ok(())
}

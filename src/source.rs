use std::time::Instant;

// -------------------------------------------------------------------------------------------------

/// Timing info for [`Source`] impls.
#[derive(Copy, Clone, Debug)]
pub struct SourceTime {
    /// Playback position in frames.
    pub pos_in_frames: u64,
    /// Time base for `pos_in_frames`.
    pub pos_instant: Instant,
}

impl Default for SourceTime {
    fn default() -> Self {
        Self {
            pos_in_frames: 0,
            pos_instant: Instant::now(),
        }
    }
}

impl SourceTime {
    /// Advance the playback position by the given number of frames.
    pub fn add_frames(&mut self, frames: u64) {
        self.pos_in_frames += frames;
    }
}

// -------------------------------------------------------------------------------------------------

/// Types that can produce audio samples in `f32` format. `Send`able across threads.
pub trait Source: Send + 'static {
    /// Write at most `output.len()` interleaved samples into `output`. Returns the number
    /// of written samples. Should always output full frames and must _never_ block.
    fn write(&mut self, output: &mut [f32], time: &SourceTime) -> usize;

    /// The source's output channel layout.
    fn channel_count(&self) -> usize;
    /// The source's output sample rate.
    fn sample_rate(&self) -> u32;

    /// True when the source will no longer produce any output.
    fn is_exhausted(&self) -> bool;
}

// -------------------------------------------------------------------------------------------------

/// Set all samples of the given buffer to zero.
pub fn clear_buffer(buffer: &mut [f32]) {
    buffer.iter_mut().for_each(|s| *s = 0.0);
}

// -------------------------------------------------------------------------------------------------

/// Copy the given planar stereo buffers into an interleaved one with the given channel layout.
///
/// Mono layouts receive the average of both channels, layouts with more than two channels get
/// the stereo pair in their first two channels and silence in all others. Copies as many frames
/// as fit into `interleaved` and returns the number of written samples.
pub fn stereo_to_interleaved(
    left: &[f32],
    right: &[f32],
    interleaved: &mut [f32],
    channel_count: usize,
) -> usize {
    debug_assert_eq!(left.len(), right.len(), "Stereo buffer sizes mismatch");
    match channel_count {
        0 => 0,
        1 => {
            let mut written = 0;
            for (i, (l, r)) in interleaved.iter_mut().zip(left.iter().zip(right)) {
                *i = (*l + *r) * 0.5;
                written += 1;
            }
            written
        }
        2 => {
            let mut written = 0;
            for (frame, (l, r)) in interleaved
                .chunks_exact_mut(2)
                .zip(left.iter().zip(right))
            {
                frame[0] = *l;
                frame[1] = *r;
                written += 2;
            }
            written
        }
        _ => {
            let mut written = 0;
            for (frame, (l, r)) in interleaved
                .chunks_exact_mut(channel_count)
                .zip(left.iter().zip(right))
            {
                frame[0] = *l;
                frame[1] = *r;
                clear_buffer(&mut frame[2..]);
                written += channel_count;
            }
            written
        }
    }
}

// -------------------------------------------------------------------------------------------------

//! Bounded, mid-biased random distributions for stochastic grain parameters.

use rand::Rng;

// -------------------------------------------------------------------------------------------------

/// A bounded random distribution with a preferred value and a "tightness" exponent.
///
/// Samples always lie within `low..=high`. The `tight` exponent controls how values cluster:
/// - `0.0` pushes all values to the extremes `low` and `high`,
/// - `1.0` distributes values evenly over the whole range,
/// - values above `1.0` increasingly concentrate values around `mid`.
///
/// The ordering `low <= mid <= high` and `tight >= 0` is enforced on construction: out of order
/// bounds are corrected instead of being rejected, and non finite values are replaced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Distribution {
    low: f64,
    mid: f64,
    high: f64,
    tight: f64,
}

impl Default for Distribution {
    fn default() -> Self {
        Self::constant(0.0)
    }
}

impl Distribution {
    /// Create a new distribution, correcting out of order bounds by raising `mid` to `low` and
    /// `high` to `mid`.
    pub fn new(low: f64, mid: f64, high: f64, tight: f64) -> Self {
        let low = finite_or(low, 0.0);
        let mid = finite_or(mid, low).max(low);
        let high = finite_or(high, mid).max(mid);
        let tight = if tight.is_nan() { 1.0 } else { tight.max(0.0) };
        Self {
            low,
            mid,
            high,
            tight,
        }
    }

    /// Create a degenerate distribution which always yields the given value.
    pub const fn constant(value: f64) -> Self {
        Self {
            low: value,
            mid: value,
            high: value,
            tight: 1.0,
        }
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn mid(&self) -> f64 {
        self.mid
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn tight(&self) -> f64 {
        self.tight
    }

    /// Largest distance from `mid` to one of the bounds.
    pub fn range(&self) -> f64 {
        (self.high - self.mid).max(self.mid - self.low)
    }

    /// True when all bounds collapse into a single value.
    pub fn is_constant(&self) -> bool {
        self.range() == 0.0
    }

    /// Clamp all bounds into the given range, keeping their order.
    pub fn clamp(self, min: f64, max: f64) -> Self {
        debug_assert!(min <= max, "Invalid clamp range");
        Self::new(
            self.low.clamp(min, max),
            self.mid.clamp(min, max),
            self.high.clamp(min, max),
            self.tight,
        )
    }

    /// Apply a monotonically increasing conversion function to all bounds.
    pub fn map<F: Fn(f64) -> f64>(self, convert: F) -> Self {
        Self::new(
            convert(self.low),
            convert(self.mid),
            convert(self.high),
            self.tight,
        )
    }

    /// Draw a random value within `low..=high`.
    #[inline]
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.sample_counted(rng).0
    }

    /// Draw a random value and report the number of rejection sampling iterations it took.
    ///
    /// Each iteration accepts with a probability of at least 1/2: candidates on the side of
    /// `mid` which defines the range can never leave the bounds.
    pub(crate) fn sample_counted<R: Rng + ?Sized>(&self, rng: &mut R) -> (f64, usize) {
        let range = self.range();
        if range == 0.0 || !range.is_finite() {
            // degenerate, or bounds too far apart to be sampled
            return (self.mid, 0);
        }
        let mut iterations = 0;
        loop {
            iterations += 1;
            let sign = if rng.random_range(-1.0f64..=1.0) > 0.0 {
                1.0
            } else {
                -1.0
            };
            let scale = ((rng.random_range(-1.0f64..=1.0) + 1.0) * 0.5).powf(self.tight);
            let candidate = self.mid + sign * scale * range;
            if candidate >= self.low && candidate <= self.high {
                return (candidate, iterations);
            }
        }
    }
}

impl From<[f64; 4]> for Distribution {
    fn from(value: [f64; 4]) -> Self {
        let [low, mid, high, tight] = value;
        Self::new(low, mid, high, tight)
    }
}

#[inline]
fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

// -------------------------------------------------------------------------------------------------

//! Descriptors and state of the stochastic grain parameters.

use std::ops::RangeInclusive;

use four_cc::FourCC;

use crate::distribution::Distribution;

// -------------------------------------------------------------------------------------------------

/// Describes a [`Distribution`] parameter: its id, display name, unit and the range its bounds
/// get clamped to.
#[derive(Debug, Clone)]
pub struct DistributionParameter {
    id: FourCC,
    name: &'static str,
    unit: &'static str,
    range: RangeInclusive<f64>,
    default: [f64; 4],
}

impl DistributionParameter {
    /// Create a new distribution parameter descriptor with the given default `[low, mid, high,
    /// tight]` values.
    pub const fn new(
        id: FourCC,
        name: &'static str,
        range: RangeInclusive<f64>,
        default: [f64; 4],
    ) -> Self {
        Self {
            id,
            name,
            unit: "",
            range,
            default,
        }
    }

    /// Optional unit for string displays.
    pub const fn with_unit(mut self, unit: &'static str) -> Self {
        self.unit = unit;
        self
    }

    pub fn id(&self) -> FourCC {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn unit(&self) -> &'static str {
        self.unit
    }

    /// The range all bounds of the distribution get clamped to.
    pub fn range(&self) -> &RangeInclusive<f64> {
        &self.range
    }

    /// The parameter's default distribution.
    pub fn default_value(&self) -> Distribution {
        Distribution::from(self.default)
    }

    /// Clamp all bounds of the given distribution into the parameter's range.
    pub fn clamp_value(&self, value: Distribution) -> Distribution {
        value.clamp(*self.range.start(), *self.range.end())
    }

    /// Convert the given distribution to a display string.
    pub fn value_to_string(&self, value: &Distribution) -> String {
        let unit = if self.unit.is_empty() {
            String::new()
        } else {
            format!(" {}", self.unit)
        };
        format!(
            "{:.3}..{:.3}..{:.3}{unit} (tight {:.2})",
            value.low(),
            value.mid(),
            value.high(),
            value.tight()
        )
    }
}

// -------------------------------------------------------------------------------------------------

/// Identifies one of the five stochastic grain parameters.
///
/// String representations are the control message names of the parameters.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    strum::EnumString,
    strum::Display,
    strum::EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum GranularParameter {
    /// Interval between grain spawns in seconds.
    #[strum(serialize = "grainrate")]
    GrainRate,
    /// Grain duration in seconds.
    #[strum(serialize = "graindur")]
    GrainDuration,
    /// Grain start offset relative to the head, as a fraction of the source buffer.
    #[strum(serialize = "grainhead")]
    GrainHead,
    /// Grain transposition in octaves.
    #[strum(serialize = "transposition")]
    Transposition,
    /// Grain stereo position: 0 is left, 1 is right.
    #[strum(serialize = "pan")]
    Pan,
}

impl GranularParameter {
    /// The parameter's descriptor.
    pub fn descriptor(self) -> &'static DistributionParameter {
        match self {
            Self::GrainRate => &GranularParameters::GRAIN_RATE,
            Self::GrainDuration => &GranularParameters::GRAIN_DURATION,
            Self::GrainHead => &GranularParameters::GRAIN_HEAD,
            Self::Transposition => &GranularParameters::TRANSPOSITION,
            Self::Pan => &GranularParameters::PAN,
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// The distributions which drive the grain scheduler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GranularParameters {
    pub grain_rate: Distribution,
    pub grain_duration: Distribution,
    pub grain_head: Distribution,
    pub transposition: Distribution,
    pub pan: Distribution,
}

impl GranularParameters {
    pub const GRAIN_RATE: DistributionParameter = DistributionParameter::new(
        FourCC(*b"GRTE"),
        "Grain Rate",
        0.0..=f64::MAX,
        [0.01, 0.02, 0.05, 1.0],
    )
    .with_unit("s");

    pub const GRAIN_DURATION: DistributionParameter = DistributionParameter::new(
        FourCC(*b"GDUR"),
        "Grain Duration",
        0.0..=f64::MAX,
        [0.05, 0.1, 0.2, 1.0],
    )
    .with_unit("s");

    pub const GRAIN_HEAD: DistributionParameter = DistributionParameter::new(
        FourCC(*b"GHED"),
        "Grain Head",
        0.0..=1.0,
        [0.0, 0.5, 1.0, 1.0],
    );

    pub const TRANSPOSITION: DistributionParameter = DistributionParameter::new(
        FourCC(*b"TRNS"),
        "Transposition",
        f64::MIN..=f64::MAX,
        [0.0, 0.0, 0.0, 1.0],
    )
    .with_unit("oct");

    pub const PAN: DistributionParameter = DistributionParameter::new(
        FourCC(*b"PAN_"),
        "Pan",
        0.0..=1.0,
        [0.0, 0.5, 1.0, 1.0],
    );

    /// All parameter descriptors.
    pub const DESCRIPTORS: [&'static DistributionParameter; 5] = [
        &Self::GRAIN_RATE,
        &Self::GRAIN_DURATION,
        &Self::GRAIN_HEAD,
        &Self::TRANSPOSITION,
        &Self::PAN,
    ];

    pub fn new() -> Self {
        Self::default()
    }

    /// Access a parameter's distribution.
    pub fn get(&self, parameter: GranularParameter) -> Distribution {
        match parameter {
            GranularParameter::GrainRate => self.grain_rate,
            GranularParameter::GrainDuration => self.grain_duration,
            GranularParameter::GrainHead => self.grain_head,
            GranularParameter::Transposition => self.transposition,
            GranularParameter::Pan => self.pan,
        }
    }

    /// Set a parameter's distribution, clamping it into the parameter's range.
    pub fn set(&mut self, parameter: GranularParameter, value: Distribution) {
        let value = parameter.descriptor().clamp_value(value);
        match parameter {
            GranularParameter::GrainRate => self.grain_rate = value,
            GranularParameter::GrainDuration => self.grain_duration = value,
            GranularParameter::GrainHead => self.grain_head = value,
            GranularParameter::Transposition => self.transposition = value,
            GranularParameter::Pan => self.pan = value,
        }
    }

    /// Builder style variant of [`set`](Self::set).
    pub fn with(mut self, parameter: GranularParameter, value: Distribution) -> Self {
        self.set(parameter, value);
        self
    }

    /// Clamp all distributions into their parameter ranges.
    pub fn clamped(self) -> Self {
        Self {
            grain_rate: Self::GRAIN_RATE.clamp_value(self.grain_rate),
            grain_duration: Self::GRAIN_DURATION.clamp_value(self.grain_duration),
            grain_head: Self::GRAIN_HEAD.clamp_value(self.grain_head),
            transposition: Self::TRANSPOSITION.clamp_value(self.transposition),
            pan: Self::PAN.clamp_value(self.pan),
        }
    }
}

impl Default for GranularParameters {
    fn default() -> Self {
        Self {
            grain_rate: Self::GRAIN_RATE.default_value(),
            grain_duration: Self::GRAIN_DURATION.default_value(),
            grain_head: Self::GRAIN_HEAD.default_value(),
            transposition: Self::TRANSPOSITION.default_value(),
            pan: Self::PAN.default_value(),
        }
    }
}

// -------------------------------------------------------------------------------------------------

//! Control messages for a granular engine.

use std::str::FromStr;

use crate::{
    distribution::Distribution,
    parameter::GranularParameter,
    utils::{frequency_to_transposition, MIN_AUDIBLE_FREQUENCY},
    Error,
};

// -------------------------------------------------------------------------------------------------

/// Messages which get sent from a [`GranularHandle`](super::GranularHandle) to its engine.
///
/// Each parameter message carries a whole, already clamped distribution, which gets applied
/// by the engine at the start of the next processed block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GranularMessage {
    /// Enable spawning of new grains.
    Start,
    /// Disable spawning of new grains. Active grains play until their end.
    Stop,
    /// Replace a parameter's distribution.
    SetDistribution {
        parameter: GranularParameter,
        value: Distribution,
    },
}

impl GranularMessage {
    /// Create a parameter message, clamping the distribution into the parameter's range.
    pub fn set(parameter: GranularParameter, value: Distribution) -> Self {
        Self::SetDistribution {
            parameter,
            value: parameter.descriptor().clamp_value(value),
        }
    }

    /// Create a transposition message from a pitch distribution in Hz.
    ///
    /// Frequencies below 20 Hz are raised to 20 Hz. The resulting transposition is relative
    /// to middle C: 261.63 Hz plays the source at unit speed.
    pub fn frequency(value: Distribution) -> Self {
        let value = value
            .clamp(MIN_AUDIBLE_FREQUENCY, f64::MAX)
            .map(frequency_to_transposition);
        Self::set(GranularParameter::Transposition, value)
    }

    /// Parse a named host message with its numeric arguments.
    ///
    /// Supported names are `start`, `stop`, `freq` and the parameter names of
    /// [`GranularParameter`]. Parameter messages expect the four arguments `low mid high tight`.
    pub fn parse(name: &str, args: &[f64]) -> Result<Self, Error> {
        let name = name.trim();
        let message = match name.to_ascii_lowercase().as_str() {
            "start" => Self::Start,
            "stop" => Self::Stop,
            "freq" => Self::frequency(Self::distribution_args(name, args)?),
            _ => {
                let parameter = GranularParameter::from_str(name).map_err(|_| {
                    Error::ParameterError(format!("Unknown message name: '{name}'"))
                })?;
                Self::set(parameter, Self::distribution_args(name, args)?)
            }
        };
        Ok(message)
    }

    fn distribution_args(name: &str, args: &[f64]) -> Result<Distribution, Error> {
        match args {
            [low, mid, high, tight] => Ok(Distribution::new(*low, *mid, *high, *tight)),
            _ => Err(Error::ParameterError(format!(
                "Message '{name}' expects 4 arguments (low mid high tight), but got {}",
                args.len()
            ))),
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_messages() -> Result<(), Box<Error>> {
        assert_eq!(GranularMessage::parse("start", &[])?, GranularMessage::Start);
        assert_eq!(GranularMessage::parse("STOP", &[])?, GranularMessage::Stop);
        assert_eq!(
            GranularMessage::parse("graindur", &[0.01, 0.02, 0.05, 1.0])?,
            GranularMessage::SetDistribution {
                parameter: GranularParameter::GrainDuration,
                value: Distribution::new(0.01, 0.02, 0.05, 1.0)
            }
        );
        assert!(GranularMessage::parse("graindur", &[0.01, 0.02]).is_err());
        assert!(GranularMessage::parse("density", &[0.0, 0.0, 0.0, 1.0]).is_err());
        Ok(())
    }

    #[test]
    fn parse_clamps() -> Result<(), Box<Error>> {
        let GranularMessage::SetDistribution { parameter, value } =
            GranularMessage::parse("pan", &[-1.0, 0.5, 3.0, 1.0])?
        else {
            panic!("expected a parameter message");
        };
        assert_eq!(parameter, GranularParameter::Pan);
        assert_eq!((value.low(), value.mid(), value.high()), (0.0, 0.5, 1.0));

        let GranularMessage::SetDistribution { value, .. } =
            GranularMessage::parse("grainrate", &[-0.1, 0.1, 0.2, -3.0])?
        else {
            panic!("expected a parameter message");
        };
        assert_eq!(value.low(), 0.0);
        assert_eq!(value.tight(), 0.0);
        Ok(())
    }

    #[test]
    fn frequency_to_octaves() -> Result<(), Box<Error>> {
        let middle_c = 261.625_565_300_598_7;
        let GranularMessage::SetDistribution { parameter, value } =
            GranularMessage::parse("freq", &[10.0, middle_c, middle_c * 2.0, 2.0])?
        else {
            panic!("expected a parameter message");
        };
        assert_eq!(parameter, GranularParameter::Transposition);
        // 10 Hz gets raised to 20 Hz
        assert!((value.low() - (20.0f64 / middle_c).log2()).abs() < 1e-9);
        assert!(value.mid().abs() < 1e-9);
        assert!((value.high() - 1.0).abs() < 1e-9);
        assert_eq!(value.tight(), 2.0);
        Ok(())
    }
}

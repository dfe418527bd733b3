use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thermo_core::{Result, ThermoError};

/// Digit string read from a device's `temperature` attribute.
///
/// The value is fixed point with three implied decimals, so `"23125"`
/// means 23.125 °C.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawWireValue(String);

impl RawWireValue {
    /// Wrap raw attribute text, trimming the trailing CR/LF.
    pub fn new(raw: &str) -> Self {
        Self(raw.trim_end_matches(['\r', '\n']).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Insert the decimal point three digits from the right, zero-padding
    /// short values: `"1"` → `"0.001"`, `"988654"` → `"988.654"`.
    pub fn to_decimal(&self) -> Result<String> {
        let (sign, digits) = match self.0.strip_prefix('-') {
            Some(rest) => ("-", rest),
            None => ("", self.0.as_str()),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ThermoError::Parse(format!("not a temperature: {:?}", self.0)));
        }

        let padded = format!("{digits:0>4}");
        let (whole, fraction) = padded.split_at(padded.len() - 3);
        Ok(format!("{sign}{whole}.{fraction}"))
    }

    /// Decoded temperature in °C.
    pub fn celsius(&self) -> Result<f64> {
        let decimal = self.to_decimal()?;
        decimal
            .parse::<f64>()
            .map_err(|e| ThermoError::Parse(format!("{decimal:?}: {e}")))
    }
}

impl fmt::Display for RawWireValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Conversion precision of a one-wire thermometer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Resolution {
    Bits9,
    Bits10,
    Bits11,
    #[default]
    Bits12,
}

impl Resolution {
    pub const ALL: [Resolution; 4] = [
        Resolution::Bits9,
        Resolution::Bits10,
        Resolution::Bits11,
        Resolution::Bits12,
    ];

    pub fn bits(self) -> u8 {
        match self {
            Resolution::Bits9 => 9,
            Resolution::Bits10 => 10,
            Resolution::Bits11 => 11,
            Resolution::Bits12 => 12,
        }
    }

    /// Worst-case conversion time; sampling faster than this only
    /// returns the previous conversion again.
    pub fn conversion_time(self) -> Duration {
        Duration::from_millis(match self {
            Resolution::Bits9 => 94,
            Resolution::Bits10 => 188,
            Resolution::Bits11 => 375,
            Resolution::Bits12 => 750,
        })
    }
}

impl TryFrom<u8> for Resolution {
    type Error = ThermoError;

    fn try_from(bits: u8) -> Result<Self> {
        match bits {
            9 => Ok(Resolution::Bits9),
            10 => Ok(Resolution::Bits10),
            11 => Ok(Resolution::Bits11),
            12 => Ok(Resolution::Bits12),
            other => Err(ThermoError::InvalidResolution(other)),
        }
    }
}

impl FromStr for Resolution {
    type Err = ThermoError;

    /// Parse the `resolution` attribute: ASCII digits, optional CR/LF.
    fn from_str(s: &str) -> Result<Self> {
        let text = s.trim_end_matches(['\r', '\n']);
        let bits = text
            .parse::<u8>()
            .map_err(|e| ThermoError::Parse(format!("resolution {text:?}: {e}")))?;
        Resolution::try_from(bits)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

//! Callendar-Van Dusen conversion from RTD code to temperature.

/// Full scale of the 15-bit RTD code.
const FULL_SCALE: f64 = 32768.0;

pub const RTD_A: f64 = 3.9083e-3;
pub const RTD_B: f64 = -5.775e-7;

/// Coefficients of the below-zero fit in normalised resistance, constant
/// term first. Not derivable from `RTD_A`/`RTD_B`.
const BELOW_ZERO: [f64; 6] = [-242.02, 2.2228, 2.5859e-3, -4.8260e-6, -2.8183e-8, 1.5243e-10];

/// Resistance of the element for a given code.
pub fn resistance(code: u16, reference_resistance: f64) -> f64 {
    f64::from(code) / FULL_SCALE * reference_resistance
}

/// Temperature in °C for a given RTD code.
///
/// Solves the quadratic first; a negative result falls back to the
/// polynomial fit, which is only valid below 0 °C.
pub fn temperature(code: u16, reference_resistance: f64, nominal_resistance: f64) -> f64 {
    let rt = resistance(code, reference_resistance);

    let z1 = -RTD_A;
    let z2 = RTD_A * RTD_A - 4.0 * RTD_B;
    let z3 = 4.0 * RTD_B / nominal_resistance;
    let z4 = 2.0 * RTD_B;

    let temp = (z1 + (z2 + z3 * rt).sqrt()) / z4;
    if temp >= 0.0 {
        return temp;
    }

    let normalised = rt / nominal_resistance * 100.0;
    let mut power = 1.0;
    let mut temp = 0.0;
    for coefficient in BELOW_ZERO {
        temp += coefficient * power;
        power *= normalised;
    }
    temp
}

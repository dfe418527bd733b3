use crate::register::Wiring;

// ── Fault status bits ─────────────────────────────────────────────────────────
pub const RTD_HIGH_THRESHOLD: u8 = 1 << 7;
pub const RTD_LOW_THRESHOLD: u8 = 1 << 6;
/// REFIN- above 0.85 × VBIAS.
pub const REFIN_HIGH: u8 = 1 << 5;
/// REFIN- below 0.85 × VBIAS with FORCE- open.
pub const REFIN_LOW_FORCE_OPEN: u8 = 1 << 4;
/// RTDIN- below 0.85 × VBIAS with FORCE- open.
pub const RTDIN_LOW_FORCE_OPEN: u8 = 1 << 3;
pub const OVER_UNDER_VOLTAGE: u8 = 1 << 2;

/// Likely wiring faults behind a fault-status byte.
pub fn possible_causes(status: u8, wiring: Wiring) -> Vec<&'static str> {
    let mut causes = Vec::new();

    if status & RTD_HIGH_THRESHOLD != 0 {
        causes.push("RTD element open");
        causes.push("RTDIN+ shorted high");
        match wiring {
            Wiring::TwoWire => causes.push("RTDIN- shorted high"),
            Wiring::ThreeWire => causes.push("FORCE+ open"),
            Wiring::FourWire => {
                causes.push("FORCE+ open");
                causes.push("FORCE- shorted high");
            }
        }
    }

    if status & RTD_LOW_THRESHOLD != 0 {
        causes.push("RTDIN+ shorted to RTDIN-");
        causes.push("RTDIN+ shorted low");
        if wiring != Wiring::TwoWire {
            causes.push("FORCE+ shorted to RTDIN-");
        }
    }

    if status & REFIN_HIGH != 0 {
        causes.push("reference resistor open");
        causes.push("REFIN- shorted high");
    }

    if status & REFIN_LOW_FORCE_OPEN != 0 {
        causes.push("reference resistor shorted");
        causes.push("REFIN- shorted low");
        if wiring != Wiring::TwoWire {
            causes.push("FORCE- open");
        }
    }

    if status & RTDIN_LOW_FORCE_OPEN != 0 {
        causes.push("RTDIN- shorted low");
        match wiring {
            Wiring::TwoWire => causes.push("RTD element shorted"),
            Wiring::ThreeWire | Wiring::FourWire => causes.push("FORCE- open"),
        }
    }

    if status & OVER_UNDER_VOLTAGE != 0 {
        causes.push("input over- or undervoltage");
    }

    if causes.is_empty() {
        causes.push("unknown fault");
    }

    let mut unique = Vec::with_capacity(causes.len());
    for cause in causes {
        if !unique.contains(&cause) {
            unique.push(cause);
        }
    }
    unique
}

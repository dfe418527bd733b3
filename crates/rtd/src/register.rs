//! Register map and configuration byte of the RTD converter.

// ── Addresses ─────────────────────────────────────────────────────────────────
pub const REG_CONFIG: u8 = 0x00;
pub const REG_RTD_MSB: u8 = 0x01;
pub const REG_HIGH_FAULT_MSB: u8 = 0x03;
pub const REG_LOW_FAULT_MSB: u8 = 0x05;
pub const REG_FAULT_STATUS: u8 = 0x07;

/// OR'd into the address byte to select a write.
pub const WRITE: u8 = 0x80;

/// Config, RTD MSB/LSB, high/low fault thresholds, fault status.
pub const FRAME_LEN: usize = 8;

// ── Configuration bits ────────────────────────────────────────────────────────
/// Mains filter select: set rejects 60 Hz (the default), clear rejects 50 Hz.
pub const FILTER_60HZ: u8 = 1 << 0;
/// Write strobe; reads back as zero.
pub const CLEAR_FAULT: u8 = 1 << 1;
pub const FAULT_CYCLE_1: u8 = 1 << 2;
pub const FAULT_CYCLE_2: u8 = 1 << 3;
pub const FAULT_CYCLE_MASK: u8 = FAULT_CYCLE_1 | FAULT_CYCLE_2;
pub const THREE_WIRE: u8 = 1 << 4;
pub const ONE_SHOT: u8 = 1 << 5;
pub const CONTINUOUS: u8 = 1 << 6;
pub const BIAS: u8 = 1 << 7;

/// Automatic fault-detection sequence: bias on, cycle bits `01`.
const FAULT_DETECT: u8 = 0b1000_0100;

/// How the RTD element is connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Wiring {
    #[default]
    TwoWire,
    ThreeWire,
    FourWire,
}

/// Mains frequency the converter's notch filter rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MainsFilter {
    Hz50,
    #[default]
    Hz60,
}

/// Configuration of one RTD channel: wiring, filter and calibration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RtdConfigRegister {
    pub wiring: Wiring,
    pub filter: MainsFilter,
    /// Reference resistor on the board, Ω.
    pub reference_resistance: f64,
    /// RTD resistance at 0 °C, Ω (100 for a PT100).
    pub nominal_resistance: f64,
}

impl Default for RtdConfigRegister {
    fn default() -> Self {
        Self {
            wiring: Wiring::default(),
            filter: MainsFilter::default(),
            reference_resistance: 430.0,
            nominal_resistance: 100.0,
        }
    }
}

impl RtdConfigRegister {
    /// Continuous conversion with bias on, plus the wiring and filter bits.
    pub fn base_register(&self) -> u8 {
        let mut reg = CONTINUOUS | BIAS;
        if self.filter == MainsFilter::Hz60 {
            reg |= FILTER_60HZ;
        }
        if self.wiring == Wiring::ThreeWire {
            reg |= THREE_WIRE;
        }
        reg
    }

    pub fn clear_faults_register(&self) -> u8 {
        self.base_register() | CLEAR_FAULT
    }

    /// Starts the automatic fault-detection cycle, keeping only the
    /// wiring-sensitive bits of the base register.
    pub fn fault_detect_register(&self) -> u8 {
        FAULT_DETECT | (self.base_register() & (FILTER_60HZ | THREE_WIRE))
    }

    /// True once the device has cleared both fault-detect cycle bits.
    pub fn fault_detect_finished(config: u8) -> bool {
        config & FAULT_CYCLE_MASK == 0
    }
}

/// The eight registers read in one burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtdRegisterFrame(pub [u8; FRAME_LEN]);

impl RtdRegisterFrame {
    pub fn config(&self) -> u8 {
        self.0[0]
    }

    /// 15-bit conversion result.
    pub fn rtd(&self) -> u16 {
        u16::from_be_bytes([self.0[1], self.0[2]]) >> 1
    }

    /// Bit 0 of the RTD LSB: this conversion is invalid.
    pub fn fault_flagged(&self) -> bool {
        self.0[2] & 1 != 0
    }

    pub fn high_threshold(&self) -> u16 {
        u16::from_be_bytes([self.0[3], self.0[4]]) >> 1
    }

    pub fn low_threshold(&self) -> u16 {
        u16::from_be_bytes([self.0[5], self.0[6]]) >> 1
    }

    pub fn fault_status(&self) -> u8 {
        self.0[7]
    }

    pub fn is_all(&self, byte: u8) -> bool {
        self.0.iter().all(|b| *b == byte)
    }
}

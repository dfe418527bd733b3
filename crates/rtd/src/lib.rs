//! SPI RTD-to-digital converter support (PT100/PT1000 elements).

pub mod convert;
pub mod driver;
pub mod fault;
pub mod handler;
pub mod register;
pub mod transport;

pub use driver::{RtdDriver, READINGS_CAP};
pub use fault::possible_causes;
pub use handler::{RtdHandler, RtdSensor};
pub use register::{MainsFilter, RtdConfigRegister, RtdRegisterFrame, Wiring};
pub use transport::{HalSpi, InterruptCallback, InterruptSource, SpiTransport};

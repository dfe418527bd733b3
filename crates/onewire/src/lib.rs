//! Linux `w1` one-wire thermometer support.

pub mod bus;
pub mod driver;
pub mod handler;
pub mod transport;
pub mod value;

pub use bus::{OneWireBus, DEFAULT_BASE_PATH};
pub use driver::OneWireSensorDriver;
pub use handler::{OneWireHandler, OneWireSensor};
pub use transport::{OneWireTransport, SysfsTransport};
pub use value::{RawWireValue, Resolution};

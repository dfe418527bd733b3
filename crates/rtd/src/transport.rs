use embedded_hal::spi::{Error as _, SpiDevice};
use std::io;
use thermo_core::Result;

/// Full-duplex register transport.
///
/// Byte 0 of `write` is the register address, OR'd with
/// [`WRITE`](crate::register::WRITE) for writes. The returned buffer has the
/// same length as `write`.
pub trait SpiTransport: Send + 'static {
    fn transfer(&mut self, write: &[u8]) -> io::Result<Vec<u8>>;
}

/// Called by an [`InterruptSource`] on every conversion-ready edge.
///
/// Never blocks; an `Err` means the trigger was dropped.
pub type InterruptCallback = Box<dyn Fn() -> Result<()> + Send + Sync>;

/// Hardware "conversion ready" line, used for interrupt-driven polling.
pub trait InterruptSource: Send + 'static {
    fn open(&mut self, callback: InterruptCallback) -> Result<()>;

    /// Release the line; the callback must not fire afterwards.
    fn close(&mut self) -> Result<()>;
}

/// Adapts any `embedded-hal` SPI device to [`SpiTransport`].
pub struct HalSpi<D>(pub D);

impl<D> SpiTransport for HalSpi<D>
where
    D: SpiDevice + Send + 'static,
{
    fn transfer(&mut self, write: &[u8]) -> io::Result<Vec<u8>> {
        let mut buf = write.to_vec();
        self.0
            .transfer_in_place(&mut buf)
            .map_err(|e| io::Error::other(format!("spi: {}", e.kind())))?;
        Ok(buf)
    }
}

use std::io;

/// Register-level access to the sensor.
///
/// Implementations perform one bus transaction per call and do no locking of their own;
/// see [`Bus`](crate::Bus) for serialization.
pub trait Transport {
    fn write_register(&mut self, addr: u8, value: u8) -> io::Result<()>;

    /// Read `data.len()` consecutive registers starting at `addr` in a single transaction.
    fn read_registers(&mut self, addr: u8, data: &mut [u8]) -> io::Result<()>;

    /// Read `data.len()` bytes from the FIFO data register.
    fn read_fifo_burst(&mut self, data: &mut [u8]) -> io::Result<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_register(&mut self, addr: u8, value: u8) -> io::Result<()> {
        (**self).write_register(addr, value)
    }

    fn read_registers(&mut self, addr: u8, data: &mut [u8]) -> io::Result<()> {
        (**self).read_registers(addr, data)
    }

    fn read_fifo_burst(&mut self, data: &mut [u8]) -> io::Result<()> {
        (**self).read_fifo_burst(data)
    }
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
#[path = "linux.rs"]
pub mod imp;

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
#[path = "stub.rs"]
pub mod imp;

use std::io;

fn unsupported() -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, "no I2C support on this platform")
}

#[derive(Debug)]
pub struct I2cTransport;

impl I2cTransport {
    pub fn new(_device_path: &str) -> io::Result<I2cTransport> {
        Err(unsupported())
    }
}

impl crate::sys::Transport for I2cTransport {
    fn write_register(&mut self, _addr: u8, _value: u8) -> io::Result<()> {
        Err(unsupported())
    }

    fn read_registers(&mut self, _addr: u8, _data: &mut [u8]) -> io::Result<()> {
        Err(unsupported())
    }

    fn read_fifo_burst(&mut self, _data: &mut [u8]) -> io::Result<()> {
        Err(unsupported())
    }
}

use std::ffi::CString;
use std::io;
use libc::{c_int, c_ulong, c_void};

use crate::regs::max86150::{ADDR_FIFO_DATA, DEVICE_ADDRESS};

// From <linux/i2c-dev.h> and <linux/i2c.h>.
const I2C_SLAVE: c_ulong = 0x0703;
const I2C_RDWR: c_ulong = 0x0707;
const I2C_M_RD: u16 = 0x0001;

#[repr(C)]
struct I2cMsg {
    addr: u16,
    flags: u16,
    len: u16,
    buf: *mut u8,
}

#[repr(C)]
struct I2cRdwrIoctlData {
    msgs: *mut I2cMsg,
    nmsgs: u32,
}

#[derive(Debug)]
struct Fd(c_int);

impl Fd {
    fn open(path: &str) -> io::Result<Fd> {
        let path = CString::new(path)
            .map_err(|error| io::Error::new(io::ErrorKind::InvalidInput, error))?;
        unsafe {
            let fd = libc::open(path.as_ptr(), libc::O_RDWR);
            if fd == -1 {
                Err(io::Error::last_os_error())
            } else {
                Ok(Fd(fd))
            }
        }
    }

    fn bind(&self, slave_addr: u8) -> io::Result<()> {
        unsafe {
            if libc::ioctl(self.0, I2C_SLAVE as _, slave_addr as c_ulong) == -1 {
                Err(io::Error::last_os_error())
            } else {
                Ok(())
            }
        }
    }

    fn write(&self, data: &[u8]) -> io::Result<()> {
        unsafe {
            let written = libc::write(self.0, data.as_ptr() as *const c_void, data.len());
            if written == -1 {
                Err(io::Error::last_os_error())
            } else if written as usize != data.len() {
                Err(io::Error::new(io::ErrorKind::WriteZero, "short I2C write"))
            } else {
                Ok(())
            }
        }
    }

    /// Write `addr`, then read into `data` after a repeated start, as one bus transaction.
    fn write_then_read(&self, slave_addr: u8, addr: u8, data: &mut [u8]) -> io::Result<()> {
        let len = u16::try_from(data.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "I2C read too long"))?;
        let mut addr = addr;
        let mut msgs = [
            I2cMsg { addr: slave_addr as u16, flags: 0, len: 1, buf: &mut addr },
            I2cMsg { addr: slave_addr as u16, flags: I2C_M_RD, len, buf: data.as_mut_ptr() },
        ];
        let mut request = I2cRdwrIoctlData { msgs: msgs.as_mut_ptr(), nmsgs: msgs.len() as u32 };
        unsafe {
            // SAFETY: Both buffers outlive the call and their lengths match `len`.
            if libc::ioctl(self.0, I2C_RDWR as _, &mut request as *mut I2cRdwrIoctlData) == -1 {
                Err(io::Error::last_os_error())
            } else {
                Ok(())
            }
        }
    }
}

impl Drop for Fd {
    fn drop(&mut self) {
        unsafe {
            if libc::close(self.0) == -1 {
                log::warn!("error closing fd: {}", io::Error::last_os_error())
            }
        }
    }
}

/// Sensor attached to a Linux `i2c-dev` adapter.
#[derive(Debug)]
pub struct I2cTransport {
    fd: Fd,
    slave_addr: u8,
}

impl I2cTransport {
    /// Open an adapter such as `/dev/i2c-0`.
    pub fn new(device_path: &str) -> io::Result<I2cTransport> {
        let fd = Fd::open(device_path)?;
        fd.bind(DEVICE_ADDRESS)?;
        log::debug!("opened {} for slave {:#04x}", device_path, DEVICE_ADDRESS);
        Ok(I2cTransport { fd, slave_addr: DEVICE_ADDRESS })
    }
}

impl crate::sys::Transport for I2cTransport {
    fn write_register(&mut self, addr: u8, value: u8) -> io::Result<()> {
        self.fd.write(&[addr, value])
    }

    fn read_registers(&mut self, addr: u8, data: &mut [u8]) -> io::Result<()> {
        self.fd.write_then_read(self.slave_addr, addr, data)
    }

    fn read_fifo_burst(&mut self, data: &mut [u8]) -> io::Result<()> {
        self.fd.write_then_read(self.slave_addr, ADDR_FIFO_DATA, data)
    }
}

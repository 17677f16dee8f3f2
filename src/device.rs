use std::time::Duration;
use std::thread::sleep;

use crate::{Error, Result};
use crate::bus::Bus;
use crate::sys::Transport;
use crate::regs::max86150::{self as regs, SysCtl};
use crate::resolve::ResolvedConfiguration;

/// One consistent reading of the FIFO pointer registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FifoPointers {
    pub write: u8,
    pub overflow: u8,
    pub read: u8,
}

impl FifoPointers {
    pub fn from_registers([write, overflow, read]: [u8; 3]) -> FifoPointers {
        FifoPointers {
            write: write & regs::FIFO_PTR_MASK,
            overflow: overflow & regs::FIFO_PTR_MASK,
            read: read & regs::FIFO_PTR_MASK,
        }
    }

    /// Number of unread samples. Meaningless if `overflow` is nonzero.
    pub fn backlog(&self) -> usize {
        (self.write.wrapping_sub(self.read) & regs::FIFO_PTR_MASK) as usize
    }
}

#[derive(Debug)]
pub struct Device<T: Transport> {
    bus: Bus<T>,
}

impl<T: Transport> Device<T> {
    pub fn new(transport: T) -> Device<T> {
        Device { bus: Bus::new(transport) }
    }

    pub fn bus(&self) -> &Bus<T> {
        &self.bus
    }

    pub fn into_transport(self) -> T {
        self.bus.into_inner()
    }

    /// Check that the part on the bus is a MAX86150.
    pub fn identify(&self) -> Result<()> {
        let part_id = self.bus.read_register(regs::ADDR_PART_ID)?;
        log::debug!("identify() part_id = {:#04x}", part_id);
        if part_id != regs::PART_ID {
            return Err(Error::NotFound { part_id })
        }
        Ok(())
    }

    pub fn write_register(&self, addr: u8, value: u8) -> Result<()> {
        log::debug!("write_register({:#04x}, {:#04x})", addr, value);
        self.bus.write_register(addr, value)
    }

    pub fn init_registers(&self, init_pairs: &[(u8, u8)]) -> Result<()> {
        for &(addr, value) in init_pairs {
            self.write_register(addr, value)?;
            if addr == regs::ADDR_SYS_CTL && value & SysCtl::Reset.bits() != 0 {
                // the reset bit self-clears once all registers have their power-on values
                sleep(Duration::from_millis(1));
            }
        }
        Ok(())
    }

    /// Reset the device and apply `config`, enabling the FIFO as the last step.
    pub fn configure(&self, config: &ResolvedConfiguration) -> Result<()> {
        log::debug!("configure({:?})", config);
        self.init_registers(&config.register_writes())
    }

    /// Stop the FIFO and release its slots.
    pub fn disable_fifo(&self) -> Result<()> {
        self.init_registers(&ResolvedConfiguration::shutdown_writes())
    }

    /// Read the write pointer, overflow counter and read pointer in one transaction.
    pub fn read_pointers(&self) -> Result<FifoPointers> {
        let pointers = FifoPointers::from_registers(
            self.bus.read_registers::<3>(regs::ADDR_FIFO_WR_PTR)?);
        log::trace!("read_pointers() = {:?}", pointers);
        Ok(pointers)
    }

    /// Pop one FIFO sample; `data` must be three bytes per enabled slot.
    pub fn read_sample(&self, data: &mut [u8]) -> Result<()> {
        debug_assert!(data.len() % regs::BYTES_PER_SLOT == 0);
        self.bus.read_fifo_burst(data)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::AcquisitionRequest;
    use crate::resolve::resolve;
    use crate::sim::SimulatedSensor;

    #[test]
    fn test_backlog_wraparound() {
        let pointers = FifoPointers::from_registers([2, 0, 30]);
        assert_eq!(pointers.backlog(), 4);
        assert_eq!(FifoPointers::from_registers([30, 0, 2]).backlog(), 28);
        assert_eq!(FifoPointers::from_registers([7, 0, 7]).backlog(), 0);
    }

    #[test]
    fn test_pointers_masked() {
        let pointers = FifoPointers::from_registers([0xe2, 0x20, 0xfe]);
        assert_eq!(pointers, FifoPointers { write: 2, overflow: 0, read: 30 });
    }

    #[test]
    fn test_identify() {
        let device = Device::new(SimulatedSensor::new());
        device.identify().unwrap();
    }

    struct OtherPart;

    impl Transport for OtherPart {
        fn write_register(&mut self, _addr: u8, _value: u8) -> std::io::Result<()> {
            Ok(())
        }

        fn read_registers(&mut self, _addr: u8, data: &mut [u8]) -> std::io::Result<()> {
            data.fill(0x15);
            Ok(())
        }

        fn read_fifo_burst(&mut self, data: &mut [u8]) -> std::io::Result<()> {
            data.fill(0);
            Ok(())
        }
    }

    #[test]
    fn test_identify_wrong_part() {
        let device = Device::new(OtherPart);
        assert!(matches!(device.identify(), Err(Error::NotFound { part_id: 0x15 })));
    }

    #[test]
    fn test_configure_writes_in_order() {
        let sensor = SimulatedSensor::new();
        let device = Device::new(sensor.clone());
        let config = resolve(&AcquisitionRequest::default()).unwrap();
        device.configure(&config).unwrap();
        assert_eq!(sensor.write_log(), config.register_writes());
        assert_eq!(sensor.register(regs::ADDR_FIFO_DCR1), 0x91);
        assert_eq!(sensor.register(regs::ADDR_SYS_CTL), SysCtl::FifoEnable.bits());
    }

    #[test]
    fn test_configure_aborts_on_write_failure() {
        let sensor = SimulatedSensor::new();
        sensor.fail_writes(true);
        let device = Device::new(sensor.clone());
        let config = resolve(&AcquisitionRequest::default()).unwrap();
        assert!(matches!(device.configure(&config),
            Err(Error::Transport { operation: "register write", .. })));
        assert!(sensor.write_log().is_empty());
    }

    #[test]
    fn test_disable_fifo() {
        let sensor = SimulatedSensor::new();
        let device = Device::new(sensor.clone());
        device.configure(&resolve(&AcquisitionRequest::default()).unwrap()).unwrap();
        device.disable_fifo().unwrap();
        assert_eq!(sensor.register(regs::ADDR_SYS_CTL), 0);
        assert_eq!(sensor.register(regs::ADDR_FIFO_DCR1), 0);
        assert_eq!(sensor.register(regs::ADDR_FIFO_DCR2), 0);
    }
}

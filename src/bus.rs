use std::sync::{Mutex, MutexGuard};

use crate::{Error, Result};
use crate::sys::Transport;

/// Shared handle to the sensor bus.
///
/// Every method is one logical transaction and holds the lock for exactly its duration, so
/// the bus can be shared between threads without any caller holding it across a wake cycle.
#[derive(Debug)]
pub struct Bus<T: Transport> {
    transport: Mutex<T>,
}

impl<T: Transport> Bus<T> {
    pub fn new(transport: T) -> Bus<T> {
        Bus { transport: Mutex::new(transport) }
    }

    pub fn into_inner(self) -> T {
        self.transport.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock(&self) -> MutexGuard<'_, T> {
        // every transaction is a single transport call, so a poisoned lock holds no partial state
        self.transport.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn write_register(&self, addr: u8, value: u8) -> Result<()> {
        log::trace!("write_register({:#04x}, {:#04x})", addr, value);
        self.lock().write_register(addr, value)
            .map_err(|source| Error::Transport { operation: "register write", source })
    }

    pub fn read_registers<const N: usize>(&self, addr: u8) -> Result<[u8; N]> {
        let mut data = [0u8; N];
        self.lock().read_registers(addr, &mut data[..])
            .map_err(|source| Error::Transport { operation: "register read", source })?;
        log::trace!("read_registers({:#04x}) = {:02x?}", addr, data);
        Ok(data)
    }

    pub fn read_register(&self, addr: u8) -> Result<u8> {
        let [value] = self.read_registers::<1>(addr)?;
        Ok(value)
    }

    pub fn read_fifo_burst(&self, data: &mut [u8]) -> Result<()> {
        self.lock().read_fifo_burst(data)
            .map_err(|source| Error::Transport { operation: "FIFO read", source })?;
        log::trace!("read_fifo_burst() = {:02x?}", data);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::SimulatedSensor;

    #[test]
    fn test_register_roundtrip() {
        let bus = Bus::new(SimulatedSensor::new());
        bus.write_register(0x11, 0x7d).unwrap();
        assert_eq!(bus.read_register(0x11).unwrap(), 0x7d);
        assert_eq!(bus.read_register(0xff).unwrap(), 0x1e);
    }

    #[test]
    fn test_transport_error() {
        let sensor = SimulatedSensor::new();
        sensor.fail_register_reads(true);
        let bus = Bus::new(sensor);
        assert!(matches!(bus.read_registers::<3>(0x04),
            Err(Error::Transport { operation: "register read", .. })));
    }

    #[test]
    fn test_shared_between_threads() {
        let bus = std::sync::Arc::new(Bus::new(SimulatedSensor::new()));
        let handles: Vec<_> = (0..4u8).map(|index| {
            let bus = bus.clone();
            std::thread::spawn(move || bus.write_register(0x11 + index, index).unwrap())
        }).collect();
        for handle in handles { handle.join().unwrap() }
        assert_eq!(bus.read_register(0x14).unwrap(), 3);
    }
}

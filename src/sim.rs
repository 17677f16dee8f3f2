//! In-memory model of a MAX86150, for running without hardware.
//!
//! The model keeps a register file and a 32-entry FIFO with 5-bit pointers and an overflow
//! counter. New FIFO entries are produced either a fixed number per pointer poll, or at the
//! configured rate in real time. Faults can be injected from a cloned handle while the sensor
//! is owned by a [`Bus`](crate::Bus).

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use crate::regs::max86150::{self as regs, SysCtl};
use crate::slots::SlotCode;

#[derive(Debug, Clone, Copy)]
enum Clock {
    PerPoll(usize),
    Realtime { frequency: u32, started: Option<Instant>, produced: u64 },
}

#[derive(Debug)]
struct State {
    registers: [u8; 256],
    write_log: Vec<(u8, u8)>,
    fifo: VecDeque<Vec<u8>>,
    partial: usize,
    wr_ptr: u8,
    rd_ptr: u8,
    ovf_counter: u8,
    sequence: u32,
    polls: usize,
    clock: Clock,
    overflow_at_poll: Option<usize>,
    fail_writes: bool,
    fail_register_reads: bool,
    fail_fifo_reads: bool,
}

impl State {
    fn reset(&mut self) {
        self.registers = [0; 256];
        self.registers[regs::ADDR_PART_ID as usize] = regs::PART_ID;
        self.fifo.clear();
        self.partial = 0;
        self.wr_ptr = 0;
        self.rd_ptr = 0;
        self.ovf_counter = 0;
        if let Clock::Realtime { started, produced, .. } = &mut self.clock {
            *started = None;
            *produced = 0;
        }
    }

    fn fifo_enabled(&self) -> bool {
        SysCtl::from_bits_retain(self.registers[regs::ADDR_SYS_CTL as usize])
            .contains(SysCtl::FifoEnable)
    }

    fn slot_codes(&self) -> Vec<u8> {
        let dcr1 = self.registers[regs::ADDR_FIFO_DCR1 as usize];
        let dcr2 = self.registers[regs::ADDR_FIFO_DCR2 as usize];
        [dcr1 & 0xf, dcr1 >> 4, dcr2 & 0xf, dcr2 >> 4].into_iter()
            .take_while(|&code| code != SlotCode::None.bits())
            .collect()
    }

    fn produce(&mut self, count: usize) {
        let codes = self.slot_codes();
        if !self.fifo_enabled() || codes.is_empty() { return }
        for _ in 0..count {
            let sequence = self.sequence;
            self.sequence = self.sequence.wrapping_add(1);
            if self.fifo.len() == regs::FIFO_DEPTH as usize {
                // FIFO_ROLLS_ON_FULL is clear: new samples are dropped and counted
                self.ovf_counter = (self.ovf_counter + 1).min(regs::FIFO_PTR_MASK);
                continue
            }
            let mut entry = Vec::with_capacity(codes.len() * regs::BYTES_PER_SLOT);
            for (slot, &code) in codes.iter().enumerate() {
                let word = raw_word(code, sequence, slot);
                entry.extend_from_slice(&word.to_be_bytes()[1..]);
            }
            self.fifo.push_back(entry);
            self.wr_ptr = (self.wr_ptr + 1) & regs::FIFO_PTR_MASK;
        }
    }

    fn advance_clock(&mut self) {
        self.polls += 1;
        if self.overflow_at_poll == Some(self.polls) {
            self.ovf_counter = self.ovf_counter.max(1);
        }
        match self.clock {
            Clock::PerPoll(count) => self.produce(count),
            Clock::Realtime { frequency, started, produced } => {
                if !self.fifo_enabled() { return }
                let started = started.unwrap_or_else(Instant::now);
                let due = (started.elapsed().as_secs_f64() * frequency as f64) as u64;
                let count = due.saturating_sub(produced);
                self.clock = Clock::Realtime { frequency, started: Some(started), produced: due };
                self.produce(count as usize);
            }
        }
    }

    fn read_fifo_byte(&mut self) -> io::Result<u8> {
        let entry = self.fifo.front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "FIFO underrun"))?;
        let byte = entry[self.partial];
        self.partial += 1;
        if self.partial == entry.len() {
            self.fifo.pop_front();
            self.partial = 0;
            self.rd_ptr = (self.rd_ptr + 1) & regs::FIFO_PTR_MASK;
        }
        Ok(byte)
    }
}

/// Raw 24-bit word the model produces for the `sequence`-th sample in FIFO slot `slot`.
///
/// Optical slots get their unused upper bits set so that masking can be observed.
pub fn raw_word(slot_code: u8, sequence: u32, slot: usize) -> u32 {
    let payload = sequence.wrapping_mul(4).wrapping_add(slot as u32);
    if slot_code == SlotCode::Ecg.bits() {
        (0x80_0000 | payload) & regs::SLOT_DATA_MASK
    } else {
        (0xf8_0000 | (payload & regs::PPG_DATA_MASK)) & regs::SLOT_DATA_MASK
    }
}

/// Cloneable handle to a simulated sensor; all clones share one device.
#[derive(Debug, Clone)]
pub struct SimulatedSensor {
    state: Arc<Mutex<State>>,
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedSensor {
    /// A sensor that produces eight samples every time its FIFO pointers are read.
    pub fn new() -> SimulatedSensor {
        Self::with_clock(Clock::PerPoll(8))
    }

    /// A sensor that produces samples at `frequency` Hz of wall-clock time once its FIFO
    /// is enabled.
    pub fn realtime(frequency: u32) -> SimulatedSensor {
        Self::with_clock(Clock::Realtime { frequency, started: None, produced: 0 })
    }

    fn with_clock(clock: Clock) -> SimulatedSensor {
        let mut state = State {
            registers: [0; 256],
            write_log: Vec::new(),
            fifo: VecDeque::new(),
            partial: 0,
            wr_ptr: 0,
            rd_ptr: 0,
            ovf_counter: 0,
            sequence: 0,
            polls: 0,
            clock,
            overflow_at_poll: None,
            fail_writes: false,
            fail_register_reads: false,
            fail_fifo_reads: false,
        };
        state.reset();
        SimulatedSensor { state: Arc::new(Mutex::new(state)) }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_samples_per_poll(&self, count: usize) {
        self.state().clock = Clock::PerPoll(count);
    }

    /// Produce `count` samples now, regardless of the clock.
    pub fn produce(&self, count: usize) {
        self.state().produce(count)
    }

    /// Report a nonzero overflow counter on the `poll`-th pointer read (counting from 1).
    pub fn overflow_at_poll(&self, poll: usize) {
        self.state().overflow_at_poll = Some(poll);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }

    pub fn fail_register_reads(&self, fail: bool) {
        self.state().fail_register_reads = fail;
    }

    pub fn fail_fifo_reads(&self, fail: bool) {
        self.state().fail_fifo_reads = fail;
    }

    /// Every register write accepted so far, in order.
    pub fn write_log(&self) -> Vec<(u8, u8)> {
        self.state().write_log.clone()
    }

    pub fn register(&self, addr: u8) -> u8 {
        self.state().registers[addr as usize]
    }

    pub fn fifo_len(&self) -> usize {
        self.state().fifo.len()
    }

    pub fn polls(&self) -> usize {
        self.state().polls
    }
}

impl crate::sys::Transport for SimulatedSensor {
    fn write_register(&mut self, addr: u8, value: u8) -> io::Result<()> {
        let mut state = self.state();
        if state.fail_writes {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "simulated write failure"))
        }
        state.write_log.push((addr, value));
        match addr {
            regs::ADDR_SYS_CTL if SysCtl::from_bits_retain(value).contains(SysCtl::Reset) =>
                state.reset(), // self-clearing
            regs::ADDR_FIFO_WR_PTR => state.wr_ptr = value & regs::FIFO_PTR_MASK,
            regs::ADDR_FIFO_OVF_COUNTER => state.ovf_counter = value & regs::FIFO_PTR_MASK,
            regs::ADDR_FIFO_RD_PTR => state.rd_ptr = value & regs::FIFO_PTR_MASK,
            regs::ADDR_PART_ID => (), // read-only
            _ => state.registers[addr as usize] = value,
        }
        Ok(())
    }

    fn read_registers(&mut self, addr: u8, data: &mut [u8]) -> io::Result<()> {
        let mut state = self.state();
        if state.fail_register_reads {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "simulated read failure"))
        }
        if addr == regs::ADDR_FIFO_WR_PTR {
            state.advance_clock();
        }
        for (offset, byte) in data.iter_mut().enumerate() {
            *byte = match addr.wrapping_add(offset as u8) {
                regs::ADDR_FIFO_WR_PTR => state.wr_ptr,
                regs::ADDR_FIFO_OVF_COUNTER => state.ovf_counter,
                regs::ADDR_FIFO_RD_PTR => state.rd_ptr,
                regs::ADDR_FIFO_DATA => state.read_fifo_byte()?,
                other => state.registers[other as usize],
            };
        }
        Ok(())
    }

    fn read_fifo_burst(&mut self, data: &mut [u8]) -> io::Result<()> {
        let mut state = self.state();
        if state.fail_fifo_reads {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "simulated FIFO failure"))
        }
        for byte in data.iter_mut() {
            *byte = state.read_fifo_byte()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sys::Transport;

    fn enabled_sensor(dcr1: u8) -> SimulatedSensor {
        let mut sensor = SimulatedSensor::new();
        sensor.write_register(regs::ADDR_FIFO_DCR1, dcr1).unwrap();
        sensor.write_register(regs::ADDR_SYS_CTL, SysCtl::FifoEnable.bits()).unwrap();
        sensor
    }

    #[test]
    fn test_reset_clears_registers() {
        let mut sensor = SimulatedSensor::new();
        sensor.write_register(regs::ADDR_LED1_PA, 0x55).unwrap();
        sensor.write_register(regs::ADDR_SYS_CTL, SysCtl::Reset.bits()).unwrap();
        assert_eq!(sensor.register(regs::ADDR_LED1_PA), 0);
        assert_eq!(sensor.register(regs::ADDR_PART_ID), regs::PART_ID);
        assert_eq!(sensor.write_log().len(), 2);
    }

    #[test]
    fn test_no_samples_while_disabled() {
        let sensor = SimulatedSensor::new();
        sensor.produce(4);
        assert_eq!(sensor.fifo_len(), 0);
    }

    #[test]
    fn test_pointers_and_data() {
        let mut sensor = enabled_sensor(0x91);
        let mut pointers = [0; 3];
        sensor.read_registers(regs::ADDR_FIFO_WR_PTR, &mut pointers).unwrap();
        assert_eq!(pointers, [8, 0, 0]);
        let mut entry = [0; 6];
        sensor.read_fifo_burst(&mut entry).unwrap();
        assert_eq!(entry, [0xf8, 0x00, 0x00, 0x80, 0x00, 0x01]);
        sensor.read_registers(regs::ADDR_FIFO_RD_PTR, &mut pointers[..1]).unwrap();
        assert_eq!(pointers[0], 1);
    }

    #[test]
    fn test_overflow_counts_dropped_samples() {
        let mut sensor = enabled_sensor(0x09);
        sensor.set_samples_per_poll(0);
        sensor.produce(35);
        let mut pointers = [0; 3];
        sensor.read_registers(regs::ADDR_FIFO_WR_PTR, &mut pointers).unwrap();
        assert_eq!(pointers, [0, 3, 0]);
        assert_eq!(sensor.fifo_len(), 32);
    }

    #[test]
    fn test_underrun() {
        let mut sensor = enabled_sensor(0x09);
        let mut entry = [0; 3];
        assert_eq!(sensor.read_fifo_burst(&mut entry).unwrap_err().kind(),
            io::ErrorKind::UnexpectedEof);
    }
}

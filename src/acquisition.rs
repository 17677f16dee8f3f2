//! Recording loop: configures the device, then periodically drains its FIFO into a sink.
//!
//! The loop wakes every eight sample intervals. On each wake it reads the FIFO pointers,
//! and if at least one batch of [`BATCH_SIZE`] samples is pending, reads up to three batches
//! one sample at a time, reassembles the 24-bit words and writes them to the sink as one
//! record. A nonzero overflow counter ends the recording: samples have already been lost at
//! an unknown position, and continuing would produce a stream with a silent gap.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::sleep;
use std::time::{Duration, Instant};

use crate::{Error, Result};
use crate::capture::CaptureSink;
use crate::config::AcquisitionRequest;
use crate::device::Device;
use crate::regs::max86150::BYTES_PER_SLOT;
use crate::resolve::ResolvedConfiguration;
use crate::sys::Transport;

/// Samples drained per batch.
pub const BATCH_SIZE: usize = 8;

/// Upper bound on batches drained per wake, to bound the time the bus is held.
const MAX_BATCHES_PER_WAKE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Configuring,
    Recording,
    Draining,
    Stopped,
    /// Recording ended because of an overflow, bus or sink failure. The sensor should be
    /// power-cycled before it is used again.
    Faulted,
}

/// Periodic wake-up of the recording loop.
pub trait WakeSource {
    /// Block until the next period starts.
    fn wait(&mut self);
}

/// Wall-clock [`WakeSource`]; dropping it disarms it.
#[derive(Debug)]
pub struct Ticker {
    period: Duration,
    next: Instant,
}

impl Ticker {
    pub fn arm(period: Duration) -> Ticker {
        log::debug!("ticker armed with period {:?}", period);
        Ticker { period, next: Instant::now() + period }
    }
}

impl WakeSource for Ticker {
    fn wait(&mut self) {
        let now = Instant::now();
        match self.next.checked_duration_since(now) {
            Some(remaining) => sleep(remaining),
            None if now - self.next > self.period => {
                log::debug!("ticker fell behind by {:?}", now - self.next);
                self.next = now;
            }
            None => (),
        }
        self.next += self.period;
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        log::debug!("ticker disarmed");
    }
}

/// What a single wake accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    /// Fewer than [`BATCH_SIZE`] samples were pending; nothing was read.
    Waiting { backlog: usize },
    Drained { samples: usize, backlog: usize },
}

/// Number of samples to drain for a given backlog: the largest multiple of the batch size,
/// up to three batches, that is available.
fn drain_count(backlog: usize) -> usize {
    (1..=MAX_BATCHES_PER_WAKE).rev()
        .map(|batches| batches * BATCH_SIZE)
        .find(|&count| count <= backlog)
        .unwrap_or(0)
}

#[derive(Debug)]
pub struct Acquisition<T: Transport> {
    device: Device<T>,
    config: ResolvedConfiguration,
    state: State,
    masks: Vec<u32>,
    sample: Vec<u8>,
    batch: Vec<u32>,
    samples_drained: u64,
}

impl<T: Transport> Acquisition<T> {
    /// Validate `request`. Nothing is sent to the device if this fails.
    pub fn new(device: Device<T>, request: &AcquisitionRequest) -> Result<Acquisition<T>> {
        let config = ResolvedConfiguration::resolve(request)?;
        Ok(Self::with_configuration(device, config))
    }

    pub fn with_configuration(device: Device<T>, config: ResolvedConfiguration) -> Acquisition<T> {
        Acquisition {
            masks: config.slot_masks(),
            sample: vec![0; config.sample_size()],
            batch: Vec::with_capacity(MAX_BATCHES_PER_WAKE * BATCH_SIZE * config.slot_count()),
            device,
            config,
            state: State::Idle,
            samples_drained: 0,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn configuration(&self) -> &ResolvedConfiguration {
        &self.config
    }

    pub fn device(&self) -> &Device<T> {
        &self.device
    }

    pub fn samples_drained(&self) -> u64 {
        self.samples_drained
    }

    fn transition(&mut self, state: State) {
        log::info!("acquisition: {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn expect_state(&self, expected: State, operation: &'static str) -> Result<()> {
        if self.state != expected {
            return Err(Error::InvalidState { operation, state: self.state })
        }
        Ok(())
    }

    /// Configure the device, start sampling, then write the stream header.
    ///
    /// If this fails the device is left with its FIFO disabled, nothing has been written to
    /// `sink`, and the acquisition returns to `Idle`.
    pub fn start<S: CaptureSink>(&mut self, sink: &mut S) -> Result<()> {
        self.expect_state(State::Idle, "start")?;
        self.transition(State::Configuring);
        let started = self.device.configure(&self.config)
            .and_then(|()| {
                sink.write_header(self.config.channels, self.config.sampling_frequency)?;
                Ok(())
            });
        if let Err(error) = started {
            log::error!("acquisition: configuration failed: {}", error);
            if let Err(cleanup_error) = self.device.disable_fifo() {
                log::warn!("acquisition: cleanup after failed configuration: {}", cleanup_error);
            }
            self.transition(State::Idle);
            return Err(error)
        }
        self.transition(State::Recording);
        Ok(())
    }

    /// Perform one wake: read the pointers and drain what is pending.
    ///
    /// Any error moves the acquisition to `Faulted` after disabling the FIFO.
    pub fn poll<S: CaptureSink>(&mut self, sink: &mut S) -> Result<Poll> {
        self.expect_state(State::Recording, "poll")?;
        match self.drain_fifo(sink) {
            Ok(poll) => Ok(poll),
            Err(error) => Err(self.fault(error)),
        }
    }

    fn drain_fifo<S: CaptureSink>(&mut self, sink: &mut S) -> Result<Poll> {
        let pointers = self.device.read_pointers()?;
        if pointers.overflow != 0 {
            return Err(Error::Overflow { count: pointers.overflow })
        }
        let backlog = pointers.backlog();
        let count = drain_count(backlog);
        if count == 0 {
            log::trace!("acquisition: backlog {} below batch size", backlog);
            return Ok(Poll::Waiting { backlog })
        }
        log::debug!("acquisition: draining {} of {} samples", count, backlog);
        self.batch.clear();
        for _ in 0..count {
            self.device.read_sample(&mut self.sample[..])?;
            for (bytes, &mask) in self.sample.chunks_exact(BYTES_PER_SLOT).zip(&self.masks) {
                let word = u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]);
                self.batch.push(word & mask);
            }
        }
        sink.write_batch(&self.batch[..])?;
        self.samples_drained += count as u64;
        Ok(Poll::Drained { samples: count, backlog })
    }

    /// Best-effort shutdown after a failure; cleanup errors are logged, not returned.
    fn fault(&mut self, error: Error) -> Error {
        log::error!("acquisition: {}; power-cycle the sensor before reuse", error);
        if let Err(cleanup_error) = self.device.disable_fifo() {
            log::warn!("acquisition: cleanup after fault: {}", cleanup_error);
        }
        self.transition(State::Faulted);
        error
    }

    fn drain(&mut self) -> Result<()> {
        self.transition(State::Draining);
        match self.device.disable_fifo() {
            Ok(()) => Ok(()),
            Err(error) => Err(self.fault(error)),
        }
    }

    /// Disable the FIFO and end the recording normally.
    pub fn stop(&mut self) -> Result<()> {
        self.expect_state(State::Recording, "stop")?;
        self.drain()?;
        self.transition(State::Stopped);
        Ok(())
    }

    /// Record until `stop` is set, waking every eight sample intervals.
    pub fn run<S: CaptureSink>(&mut self, sink: &mut S, stop: &AtomicBool) -> Result<()> {
        self.start(sink)?;
        let ticker = Ticker::arm(self.config.wake_period());
        self.record(sink, stop, ticker)
    }

    /// Like [`run`](Self::run), but with a caller-supplied wake source.
    pub fn run_with<S: CaptureSink, W: WakeSource>(&mut self, sink: &mut S, stop: &AtomicBool,
            wake: W) -> Result<()> {
        self.start(sink)?;
        self.record(sink, stop, wake)
    }

    fn record<S: CaptureSink, W: WakeSource>(&mut self, sink: &mut S, stop: &AtomicBool,
            mut wake: W) -> Result<()> {
        loop {
            wake.wait();
            if stop.load(Ordering::Acquire) {
                log::info!("acquisition: stop requested after {} samples", self.samples_drained);
                break
            }
            self.poll(sink)?;
        }
        self.drain()?;
        drop(wake);
        self.transition(State::Stopped);
        Ok(())
    }
}

impl<T: Transport> Drop for Acquisition<T> {
    fn drop(&mut self) {
        if let State::Recording | State::Draining = self.state {
            log::warn!("acquisition: dropped while {:?}, disabling FIFO", self.state);
            if let Err(error) = self.device.disable_fifo() {
                log::warn!("acquisition: cleanup on drop: {}", error);
            }
            self.state = State::Stopped;
        }
    }
}

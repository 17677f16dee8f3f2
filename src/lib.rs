mod sys;
mod regs;
mod bus;
mod config;
pub mod codec;
mod slots;
mod resolve;
mod device;
mod capture;
mod acquisition;
pub mod sim;

use std::fmt;
use std::io;

/// A request that the device cannot carry out. Detected before any bus traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    NoChannels,
    /// All five signals were requested; the FIFO only has four slots.
    AllChannels,
    TooManyChannels(usize),
    /// The sample stream would need more than half of the bus bandwidth.
    Bandwidth { required_bps: u32, available_bps: u32 },
    PpgSamplingFrequency(u16),
    PulsesPerSample(u8),
    /// Two pulses per sample requested at a rate that only supports one.
    TwoPulseSamplingFrequency(u16),
    EcgRate { frequency: u16, double_clock: bool },
    Unsupported { parameter: &'static str, value: u32 },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::NoChannels =>
                write!(f, "no channels enabled"),
            Self::AllChannels =>
                write!(f, "all five channels enabled, but the FIFO has only four slots"),
            Self::TooManyChannels(count) =>
                write!(f, "{} channels enabled, at most 4 are supported", count),
            Self::Bandwidth { required_bps, available_bps } =>
                write!(f, "sample stream needs {} bit/s, only {} bit/s of bus bandwidth usable",
                    required_bps, available_bps),
            Self::PpgSamplingFrequency(frequency) =>
                write!(f, "sampling frequency {} Hz not supported by the PPG channels", frequency),
            Self::PulsesPerSample(pulses) =>
                write!(f, "{} pulses per sample not supported (1 or 2)", pulses),
            Self::TwoPulseSamplingFrequency(frequency) =>
                write!(f, "two pulses per sample not supported at {} Hz", frequency),
            Self::EcgRate { frequency, double_clock } =>
                write!(f, "sampling frequency {} Hz not supported by the ECG channel with {} ADC clock",
                    frequency, if *double_clock { "doubled" } else { "standard" }),
            Self::Unsupported { parameter, value } =>
                write!(f, "unsupported {} value {}", parameter, value),
        }
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug)]
pub enum Error {
    Validation(ValidationError),
    /// A register or FIFO transaction failed on the bus.
    Transport { operation: &'static str, source: io::Error },
    /// The device dropped samples; the recording has a gap of unknown length.
    Overflow { count: u8 },
    /// The capture sink failed or accepted only part of a batch.
    Io(io::Error),
    /// The device did not identify itself as a MAX86150.
    NotFound { part_id: u8 },
    /// An acquisition operation was called in a state that does not allow it.
    InvalidState { operation: &'static str, state: acquisition::State },
}

impl Error {
    /// Process exit status for this kind of failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Transport { .. } => 3,
            Self::Overflow { .. } => 4,
            Self::Io(_) => 5,
            Self::NotFound { .. } => 6,
            Self::InvalidState { .. } => 7,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Validation(error) =>
                write!(f, "invalid acquisition request: {}", error),
            Self::Transport { operation, source } =>
                write!(f, "bus error during {}: {}", operation, source),
            Self::Overflow { count } =>
                write!(f, "FIFO overflow, {} samples lost; power-cycle the sensor", count),
            Self::Io(io_error) =>
                write!(f, "capture I/O error: {}", io_error),
            Self::NotFound { part_id } =>
                write!(f, "device not found (part ID {:#04x})", part_id),
            Self::InvalidState { operation, state } =>
                write!(f, "cannot {} an acquisition in state {:?}", operation, state),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Validation(error) => Some(error),
            Self::Transport { source, .. } => Some(source),
            Self::Io(io_error) => Some(io_error),
            _ => None
        }
    }
}

impl From<ValidationError> for Error {
    fn from(error: ValidationError) -> Self {
        Error::Validation(error)
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Error::Io(error)
    }
}

pub type Result<T> =
    core::result::Result<T, Error>;

pub use sys::Transport;

pub use sys::imp::I2cTransport;

pub use bus::Bus;

pub use config::{
    Channels,
    AcquisitionRequest,
};

pub use slots::{
    SlotCode,
    SlotAllocation,
    allocate,
};

pub use resolve::{
    DEFAULT_BUS_BAUD_RATE,
    ResolvedConfiguration,
    resolve,
    resolve_for_bus,
};

pub use device::{
    Device,
    FifoPointers,
};

pub use capture::{
    CaptureSink,
    CaptureWriter,
    CaptureReader,
    header_word,
};

pub use acquisition::{
    BATCH_SIZE,
    State,
    WakeSource,
    Ticker,
    Poll,
    Acquisition,
};

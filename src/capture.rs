//! Capture stream format.
//!
//! A stream starts with one 32-bit header word holding the channel mask in bits 0..8 and the
//! sampling frequency in bits 8..24. It is followed by sample groups, one word per enabled
//! channel in FIFO slot order. Every word, including the header, is stored as a little-endian
//! `u32`; sample words only use the low 24 bits.

use std::io::{self, Read, Write};

use crate::config::Channels;

/// Destination for a recording.
pub trait CaptureSink {
    fn write_header(&mut self, channels: Channels, sampling_frequency: u16) -> io::Result<()>;

    /// Write a batch of sample words. The whole batch has to be accepted in one go; anything
    /// less is reported as an error.
    fn write_batch(&mut self, words: &[u32]) -> io::Result<()>;
}

pub fn header_word(channels: Channels, sampling_frequency: u16) -> u32 {
    channels.bits() as u32 | (sampling_frequency as u32 & 0xffff) << 8
}

/// Sink writing the capture format to any [`Write`]r, typically a file.
#[derive(Debug)]
pub struct CaptureWriter<W: Write> {
    writer: W,
    buffer: Vec<u32>,
}

impl<W: Write> CaptureWriter<W> {
    pub fn new(writer: W) -> CaptureWriter<W> {
        CaptureWriter { writer, buffer: Vec::new() }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_words(&mut self, words: &[u32]) -> io::Result<()> {
        self.buffer.clear();
        self.buffer.extend(words.iter().map(|word| word.to_le()));
        let bytes: &[u8] = bytemuck::cast_slice(&self.buffer[..]);
        // one write call per batch; a short write is not retried
        let written = self.writer.write(bytes)?;
        if written != bytes.len() {
            return Err(io::Error::new(io::ErrorKind::WriteZero,
                format!("short capture write: {} of {} bytes", written, bytes.len())))
        }
        self.writer.flush()
    }
}

impl<W: Write> CaptureSink for CaptureWriter<W> {
    fn write_header(&mut self, channels: Channels, sampling_frequency: u16) -> io::Result<()> {
        log::debug!("write_header({:?}, {})", channels, sampling_frequency);
        self.write_words(&[header_word(channels, sampling_frequency)])
    }

    fn write_batch(&mut self, words: &[u32]) -> io::Result<()> {
        log::trace!("write_batch({} words)", words.len());
        self.write_words(words)
    }
}

/// Parser for a recorded capture stream.
#[derive(Debug)]
pub struct CaptureReader<R: Read> {
    reader: R,
    channels: Channels,
    sampling_frequency: u16,
}

impl<R: Read> CaptureReader<R> {
    /// Read and decode the header.
    pub fn new(mut reader: R) -> io::Result<CaptureReader<R>> {
        let mut header = [0u8; 4];
        reader.read_exact(&mut header)?;
        let header = u32::from_le_bytes(header);
        let channels = Channels::from_bits(header as u8)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData,
                format!("invalid channel mask {:#04x}", header as u8)))?;
        if channels.is_empty() || channels.count() > Channels::MAX_ENABLED {
            return Err(io::Error::new(io::ErrorKind::InvalidData,
                format!("unsupported channel set {:?}", channels)))
        }
        let sampling_frequency = (header >> 8) as u16;
        Ok(CaptureReader { reader, channels, sampling_frequency })
    }

    pub fn channels(&self) -> Channels {
        self.channels
    }

    pub fn sampling_frequency(&self) -> u16 {
        self.sampling_frequency
    }

    /// Channel of each word in a sample group.
    pub fn columns(&self) -> Vec<Channels> {
        self.channels.in_priority_order().collect()
    }

    /// Read the next sample group. Returns `None` at a clean end of stream; a group that is
    /// cut short is an error.
    pub fn next_group(&mut self) -> io::Result<Option<Vec<u32>>> {
        let mut group = vec![0u32; self.channels.count()];
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut group[..]);
        let mut filled = 0;
        while filled < bytes.len() {
            match self.reader.read(&mut bytes[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => return Err(io::Error::new(io::ErrorKind::UnexpectedEof,
                    "capture ends in the middle of a sample group")),
                Ok(count) => filled += count,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => (),
                Err(error) => return Err(error),
            }
        }
        Ok(Some(group.into_iter().map(u32::from_le).collect()))
    }
}

impl<R: Read> Iterator for CaptureReader<R> {
    type Item = io::Result<Vec<u32>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_group().transpose()
    }
}

//! Assignment of enabled channels to the four FIFO tag slots.

use crate::config::Channels;
use crate::regs::max86150::{DCR_HIGH_SLOT_SHIFT, DCR_LOW_SLOT_SHIFT};

/// Element code written into a FIFO_DCRx nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotCode {
    None      = 0,
    PpgLed1   = 1,
    PpgLed2   = 2,
    PilotLed1 = 5,
    PilotLed2 = 6,
    Ecg       = 9,
    Reserved  = 15,
}

impl SlotCode {
    /// Code for a single channel flag. Anything that is not exactly one known channel maps to
    /// `Reserved`.
    pub fn for_channel(channel: Channels) -> SlotCode {
        match channel {
            Channels::PPG1   => SlotCode::PpgLed1,
            Channels::PPG2   => SlotCode::PpgLed2,
            Channels::PILOT1 => SlotCode::PilotLed1,
            Channels::PILOT2 => SlotCode::PilotLed2,
            Channels::ECG    => SlotCode::Ecg,
            _                => SlotCode::Reserved,
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }
}

/// Result of slot allocation: the two data control register values and the channel that
/// ends up in each occupied slot, in FIFO order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotAllocation {
    pub dcr1: u8,
    pub dcr2: u8,
    pub slots: Vec<Channels>,
}

/// Fill slots 1..4 with the enabled channels, in [`Channels::PRIORITY`] order.
///
/// Callers validate the channel set beforehand; channels beyond the fourth are ignored.
pub fn allocate(channels: Channels) -> SlotAllocation {
    let mut nibbles = [SlotCode::None; 4];
    let mut slots = Vec::with_capacity(Channels::MAX_ENABLED);
    for (index, channel) in channels.in_priority_order().take(nibbles.len()).enumerate() {
        nibbles[index] = SlotCode::for_channel(channel);
        slots.push(channel);
    }
    let pack = |low: SlotCode, high: SlotCode|
        low.bits() << DCR_LOW_SLOT_SHIFT | high.bits() << DCR_HIGH_SLOT_SHIFT;
    SlotAllocation {
        dcr1: pack(nibbles[0], nibbles[1]),
        dcr2: pack(nibbles[2], nibbles[3]),
        slots,
    }
}

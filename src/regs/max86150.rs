#![allow(dead_code)]

use bitflags::bitflags;

/// 7-bit bus address of the sensor.
pub const DEVICE_ADDRESS: u8 = 0x5e;

/// Value of the part ID register.
pub const PART_ID: u8 = 0x1e;

/// Interrupt Status 1
pub const ADDR_INT_STATUS1: u8 = 0x00;
/// Interrupt Status 2
pub const ADDR_INT_STATUS2: u8 = 0x01;
/// Interrupt Enable 1
pub const ADDR_INT_ENABLE1: u8 = 0x02;
/// Interrupt Enable 2
pub const ADDR_INT_ENABLE2: u8 = 0x03;

/// FIFO Write Pointer
pub const ADDR_FIFO_WR_PTR: u8 = 0x04;
/// FIFO Overflow Counter
pub const ADDR_FIFO_OVF_COUNTER: u8 = 0x05;
/// FIFO Read Pointer
pub const ADDR_FIFO_RD_PTR: u8 = 0x06;
/// FIFO Data Register. Reads do not auto-increment the address.
pub const ADDR_FIFO_DATA: u8 = 0x07;
/// FIFO Configuration
pub const ADDR_FIFO_CONFIG: u8 = 0x08;

/// FIFO Data Control Register 1 (slots 1 and 2)
pub const ADDR_FIFO_DCR1: u8 = 0x09;
/// FIFO Data Control Register 2 (slots 3 and 4)
pub const ADDR_FIFO_DCR2: u8 = 0x0a;

/// System Control
pub const ADDR_SYS_CTL: u8 = 0x0d;

/// PPG Configuration 1
pub const ADDR_PPG_CONFIG1: u8 = 0x0e;
/// PPG Configuration 2
pub const ADDR_PPG_CONFIG2: u8 = 0x0f;
/// Prox Interrupt Threshold
pub const ADDR_PROX_INT_THRESH: u8 = 0x10;

/// LED1 Pulse Amplitude
pub const ADDR_LED1_PA: u8 = 0x11;
/// LED2 Pulse Amplitude
pub const ADDR_LED2_PA: u8 = 0x12;
/// LED Range
pub const ADDR_LED_RANGE: u8 = 0x14;
/// LED Pilot Pulse Amplitude
pub const ADDR_LED_PILOT_PA: u8 = 0x15;

/// ECG Configuration 1
pub const ADDR_ECG_CONFIG1: u8 = 0x3c;
/// ECG Configuration 3
pub const ADDR_ECG_CONFIG3: u8 = 0x3e;

/// Part ID
pub const ADDR_PART_ID: u8 = 0xff;

/// Depth of the sample FIFO; pointers are 5 bits wide.
pub const FIFO_DEPTH: u8 = 32;
pub const FIFO_PTR_MASK: u8 = FIFO_DEPTH - 1;

/// Every FIFO slot is transferred as three bytes, MSB first.
pub const BYTES_PER_SLOT: usize = 3;
pub const BITS_PER_SLOT: usize = BYTES_PER_SLOT * 8;

/// PPG and pilot slots carry a 19-bit conversion result.
pub const PPG_DATA_MASK: u32 = 0x7_ffff;
pub const SLOT_DATA_MASK: u32 = 0xff_ffff;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SysCtl: u8 {
        const Reset     = 1<<0;
        const Shutdown  = 1<<1;
        const FifoEnable = 1<<2;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FifoConfig: u8 {
        const AlmostFullClear = 1<<6;
        const AlmostFullType  = 1<<5;
        const RollsOnFull     = 1<<4;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LedRange: u8 {
        /// LED1 driven from the 100 mA range instead of the 50 mA range.
        const Led1High = 0b01<<0;
        /// LED2 driven from the 100 mA range instead of the 50 mA range.
        const Led2High = 0b01<<2;
    }
}

// PPG_CONFIG1 fields
pub const PPG_ADC_RANGE_SHIFT: u8 = 6;
pub const PPG_SAMPLE_RATE_SHIFT: u8 = 2;
pub const PPG_PULSE_WIDTH_SHIFT: u8 = 0;

// PPG_CONFIG2 fields
pub const PPG_SAMPLE_AVERAGE_SHIFT: u8 = 0;

// ECG_CONFIG1 fields
pub const ECG_ADC_CLK: u8 = 1<<2;
pub const ECG_ADC_OSR_SHIFT: u8 = 0;

// ECG_CONFIG3 fields
pub const ECG_PGA_GAIN_SHIFT: u8 = 2;
pub const ECG_IA_GAIN_SHIFT: u8 = 0;

// FIFO_DCRx fields
pub const DCR_LOW_SLOT_SHIFT: u8 = 0;
pub const DCR_HIGH_SLOT_SHIFT: u8 = 4;

//! Encoding of physical quantities into MAX86150 register fields.
//!
//! Every function takes a value in the unit the user specifies it in and returns the unshifted
//! field code, or [`ValidationError::Unsupported`] if the device has no encoding for it. Values
//! are never rounded or clamped.

use crate::ValidationError;

fn unsupported<T>(parameter: &'static str, value: impl Into<u32>) -> Result<T, ValidationError> {
    Err(ValidationError::Unsupported { parameter, value: value.into() })
}

/// PPG ADC full scale, in µA.
pub fn ppg_adc_range_code(microamps: u8) -> Result<u8, ValidationError> {
    match microamps {
        4  => Ok(0b00),
        8  => Ok(0b01),
        16 => Ok(0b10),
        32 => Ok(0b11),
        _  => unsupported("PPG ADC range", microamps),
    }
}

/// LED pulse width, in µs.
pub fn led_pulse_width_code(microseconds: u16) -> Result<u8, ValidationError> {
    match microseconds {
        50  => Ok(0b00),
        100 => Ok(0b01),
        200 => Ok(0b10),
        400 => Ok(0b11),
        _   => unsupported("LED pulse width", microseconds),
    }
}

/// PPG sample rate with one LED pulse per sample, in Hz.
pub fn ppg_sample_rate_code(hertz: u16) -> Result<u8, ValidationError> {
    match hertz {
        10   => Ok(0x0),
        20   => Ok(0x1),
        50   => Ok(0x2),
        84   => Ok(0x3),
        100  => Ok(0x4),
        200  => Ok(0x5),
        400  => Ok(0x6),
        800  => Ok(0x7),
        1000 => Ok(0x8),
        1600 => Ok(0x9),
        3200 => Ok(0xa),
        _    => unsupported("PPG sampling frequency", hertz),
    }
}

/// Remap a one-pulse sample rate code into the two-pulse range of the same field.
///
/// Only the five lowest rates can be sampled with two pulses.
pub fn two_pulse_sample_rate_code(single_pulse_code: u8) -> Option<u8> {
    match single_pulse_code {
        0x0..=0x4 => Some(single_pulse_code + 0xb),
        _ => None,
    }
}

/// Number of PPG conversions averaged per FIFO sample.
pub fn sample_averaging_code(factor: u8) -> Result<u8, ValidationError> {
    match factor {
        1  => Ok(0b000),
        2  => Ok(0b001),
        4  => Ok(0b010),
        8  => Ok(0b011),
        16 => Ok(0b100),
        32 => Ok(0b101),
        _  => unsupported("sample averaging", factor),
    }
}

/// Encoded LED drive current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedCurrent {
    /// Pulse amplitude register value.
    pub amplitude: u8,
    /// Whether the LED has to be switched into its 100 mA range.
    pub high_range: bool,
}

/// LED drive current, in mA.
///
/// The low range has a 0.2 mA step and tops out at 51 mA; the high range has a 0.4 mA step.
pub fn led_current_code(milliamps: u8) -> Result<LedCurrent, ValidationError> {
    match milliamps {
        1..=51 =>
            Ok(LedCurrent { amplitude: milliamps * 5, high_range: false }),
        52..=102 =>
            Ok(LedCurrent { amplitude: (milliamps / 2) * 5, high_range: true }),
        _ => unsupported("LED current", milliamps),
    }
}

/// ECG programmable gain amplifier setting.
pub fn ecg_pga_gain_code(gain: u8) -> Result<u8, ValidationError> {
    match gain {
        1 => Ok(0b00),
        2 => Ok(0b01),
        4 => Ok(0b10),
        8 => Ok(0b11),
        _ => unsupported("ECG PGA gain", gain),
    }
}

/// ECG instrumentation amplifier gain. The 9.5x setting is requested as either 9 or 10.
pub fn ecg_ia_gain_code(gain: u8) -> Result<u8, ValidationError> {
    match gain {
        5      => Ok(0b00),
        9 | 10 => Ok(0b01),
        20     => Ok(0b10),
        50     => Ok(0b11),
        _      => unsupported("ECG IA gain", gain),
    }
}

/// ECG ADC clock and oversampling ratio, as the three low bits of ECG_CONFIG1.
///
/// The same output rate is reached with a different oversampling ratio depending on whether
/// the ADC runs from the standard or the doubled clock.
pub fn ecg_rate_code(hertz: u16, double_clock: bool) -> Result<u8, ValidationError> {
    match (double_clock, hertz) {
        (false, 1600) => Ok(0b000),
        (false, 800)  => Ok(0b001),
        (false, 400)  => Ok(0b010),
        (false, 200)  => Ok(0b011),
        (true,  3200) => Ok(0b100),
        (true,  1600) => Ok(0b101),
        (true,  800)  => Ok(0b110),
        (true,  400)  => Ok(0b111),
        _ => Err(ValidationError::EcgRate { frequency: hertz, double_clock }),
    }
}

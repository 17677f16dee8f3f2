//! Validation of an [`AcquisitionRequest`] and its translation into register values.

use std::time::Duration;

use crate::ValidationError;
use crate::codec;
use crate::config::{AcquisitionRequest, Channels};
use crate::regs::max86150::{self as regs, LedRange, SysCtl};
use crate::slots;

/// Rated clock of the sensor bus.
pub const DEFAULT_BUS_BAUD_RATE: u32 = 210_000;

/// The FIFO is drained every this many sample intervals.
pub const WAKE_SAMPLE_INTERVALS: u32 = 8;

/// Register image of a validated acquisition request.
///
/// Fields belonging to a disabled channel group are zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfiguration {
    pub channels: Channels,
    pub sampling_frequency: u16,
    pub ppg_config1: u8,
    pub ppg_config2: u8,
    pub led1_pa: u8,
    pub led2_pa: u8,
    pub led_range: u8,
    pub ecg_config1: u8,
    pub ecg_config3: u8,
    pub fifo_dcr1: u8,
    pub fifo_dcr2: u8,
    /// Channel carried by each FIFO slot, in transfer order.
    pub slots: Vec<Channels>,
}

/// Validate `request` against a bus running at the default rate.
pub fn resolve(request: &AcquisitionRequest) -> Result<ResolvedConfiguration, ValidationError> {
    resolve_for_bus(request, DEFAULT_BUS_BAUD_RATE)
}

/// Validate `request` and compute the register image.
///
/// The stream is only allowed to use half of `bus_baud_rate`; the sensor stops responding
/// well before the nominal limit is reached.
pub fn resolve_for_bus(request: &AcquisitionRequest, bus_baud_rate: u32)
        -> Result<ResolvedConfiguration, ValidationError> {
    let channels = request.channels;
    let frequency = request.sampling_frequency;

    if channels.is_empty() {
        return Err(ValidationError::NoChannels)
    }
    if channels.contains(Channels::all()) {
        return Err(ValidationError::AllChannels)
    }
    if channels.count() > Channels::MAX_ENABLED {
        return Err(ValidationError::TooManyChannels(channels.count()))
    }

    let required_bps = channels.count() as u64 * regs::BITS_PER_SLOT as u64 * frequency as u64;
    let available_bps = bus_baud_rate / 2;
    if required_bps > available_bps as u64 {
        return Err(ValidationError::Bandwidth {
            required_bps: required_bps.min(u32::MAX as u64) as u32,
            available_bps,
        })
    }

    let mut resolved = ResolvedConfiguration {
        channels,
        sampling_frequency: frequency,
        ppg_config1: 0,
        ppg_config2: 0,
        led1_pa: 0,
        led2_pa: 0,
        led_range: 0,
        ecg_config1: 0,
        ecg_config3: 0,
        fifo_dcr1: 0,
        fifo_dcr2: 0,
        slots: Vec::new(),
    };

    let sample_rate_code = if channels.has_ppg() {
        let single_pulse_code = codec::ppg_sample_rate_code(frequency)
            .map_err(|_| ValidationError::PpgSamplingFrequency(frequency))?;
        match request.pulses_per_sample {
            1 => Some(single_pulse_code),
            2 => Some(codec::two_pulse_sample_rate_code(single_pulse_code)
                .ok_or(ValidationError::TwoPulseSamplingFrequency(frequency))?),
            pulses => return Err(ValidationError::PulsesPerSample(pulses)),
        }
    } else {
        None
    };
    let ecg_rate_code = if channels.contains(Channels::ECG) {
        Some(codec::ecg_rate_code(frequency, request.ecg_double_clock())?)
    } else {
        None
    };

    // field encodings are checked only once every rate rule has passed
    if let Some(sample_rate_code) = sample_rate_code {
        resolved.ppg_config1 =
            codec::ppg_adc_range_code(request.ppg_adc_range_ua)? << regs::PPG_ADC_RANGE_SHIFT |
            sample_rate_code << regs::PPG_SAMPLE_RATE_SHIFT |
            codec::led_pulse_width_code(request.led_pulse_width_us)? << regs::PPG_PULSE_WIDTH_SHIFT;
        resolved.ppg_config2 =
            codec::sample_averaging_code(request.sample_averaging)? << regs::PPG_SAMPLE_AVERAGE_SHIFT;
    }
    if let Some(ecg_rate_code) = ecg_rate_code {
        resolved.ecg_config1 = ecg_rate_code << regs::ECG_ADC_OSR_SHIFT;
        resolved.ecg_config3 =
            codec::ecg_pga_gain_code(request.ecg_pga_gain)? << regs::ECG_PGA_GAIN_SHIFT |
            codec::ecg_ia_gain_code(request.ecg_ia_gain)? << regs::ECG_IA_GAIN_SHIFT;
    }

    let mut led_range = LedRange::empty();
    if channels.contains(Channels::PPG1) {
        let current = codec::led_current_code(request.led1_current_ma)?;
        resolved.led1_pa = current.amplitude;
        led_range.set(LedRange::Led1High, current.high_range);
    }
    if channels.contains(Channels::PPG2) {
        let current = codec::led_current_code(request.led2_current_ma)?;
        resolved.led2_pa = current.amplitude;
        led_range.set(LedRange::Led2High, current.high_range);
    }
    resolved.led_range = led_range.bits();

    let allocation = slots::allocate(channels);
    resolved.fifo_dcr1 = allocation.dcr1;
    resolved.fifo_dcr2 = allocation.dcr2;
    resolved.slots = allocation.slots;

    log::debug!("resolved {:?} at {} Hz: {:02x?}", channels, frequency, resolved.register_writes());
    Ok(resolved)
}

impl ResolvedConfiguration {
    pub fn resolve(request: &AcquisitionRequest) -> Result<ResolvedConfiguration, ValidationError> {
        resolve(request)
    }

    /// Register writes that configure the device and start sampling, in the order they must
    /// be issued. The reset comes first because it clears every other register.
    pub fn register_writes(&self) -> Vec<(u8, u8)> {
        vec![
            (regs::ADDR_SYS_CTL,     SysCtl::Reset.bits()),
            (regs::ADDR_PPG_CONFIG1, self.ppg_config1),
            (regs::ADDR_PPG_CONFIG2, self.ppg_config2),
            (regs::ADDR_LED1_PA,     self.led1_pa),
            (regs::ADDR_LED2_PA,     self.led2_pa),
            (regs::ADDR_LED_RANGE,   self.led_range),
            (regs::ADDR_ECG_CONFIG1, self.ecg_config1),
            (regs::ADDR_ECG_CONFIG3, self.ecg_config3),
            (regs::ADDR_FIFO_DCR1,   self.fifo_dcr1),
            (regs::ADDR_FIFO_DCR2,   self.fifo_dcr2),
            (regs::ADDR_SYS_CTL,     SysCtl::FifoEnable.bits()),
        ]
    }

    /// Register writes that stop the FIFO and release all slots.
    pub fn shutdown_writes() -> [(u8, u8); 3] {
        [
            (regs::ADDR_SYS_CTL,   SysCtl::empty().bits()),
            (regs::ADDR_FIFO_DCR1, 0),
            (regs::ADDR_FIFO_DCR2, 0),
        ]
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Bytes transferred per FIFO sample.
    pub fn sample_size(&self) -> usize {
        self.slot_count() * regs::BYTES_PER_SLOT
    }

    /// Mask applied to the 24-bit word read from each slot.
    pub fn slot_masks(&self) -> Vec<u32> {
        self.slots.iter()
            .map(|&channel| if channel.has_ppg() { regs::PPG_DATA_MASK } else { regs::SLOT_DATA_MASK })
            .collect()
    }

    /// Interval at which the FIFO is polled.
    pub fn wake_period(&self) -> Duration {
        Duration::from_secs(WAKE_SAMPLE_INTERVALS as u64) / self.sampling_frequency as u32
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn request() -> AcquisitionRequest {
        AcquisitionRequest::default()
    }

    #[test]
    fn test_reference_request() {
        let resolved = resolve(&request()).unwrap();
        assert_eq!(resolved.ppg_config1, 0b11_0101_00);
        assert_eq!(resolved.ppg_config2, 0);
        assert_eq!(resolved.led1_pa, 125);
        assert_eq!(resolved.led2_pa, 0); // PPG2 disabled
        assert_eq!(resolved.led_range, 0);
        assert_eq!(resolved.ecg_config1, 0b011);
        assert_eq!(resolved.ecg_config3, 0b01_01);
        assert_eq!((resolved.fifo_dcr1, resolved.fifo_dcr2), (0x91, 0x00));
        assert_eq!(resolved.slots, vec![Channels::PPG1, Channels::ECG]);
        assert_eq!(resolved.slot_masks(), vec![0x7ffff, 0xffffff]);
        assert_eq!(resolved.sample_size(), 6);
    }

    #[test]
    fn test_register_order() {
        let resolved = resolve(&request()).unwrap();
        let addrs: Vec<u8> = resolved.register_writes().iter().map(|&(addr, _)| addr).collect();
        assert_eq!(addrs, vec![0x0d, 0x0e, 0x0f, 0x11, 0x12, 0x14, 0x3c, 0x3e, 0x09, 0x0a, 0x0d]);
        let writes = resolved.register_writes();
        assert_eq!(writes.first(), Some(&(0x0d, 0x01)));
        assert_eq!(writes.last(), Some(&(0x0d, 0x04)));
    }

    #[test]
    fn test_idempotent() {
        let request = AcquisitionRequest {
            channels: Channels::PPG1 | Channels::PPG2 | Channels::PILOT1 | Channels::ECG,
            sampling_frequency: 400,
            led2_current_ma: 80,
            ..request()
        };
        assert_eq!(resolve(&request), resolve(&request));
    }

    #[test]
    fn test_all_channels_rejected() {
        for frequency in [10, 200, 3200, 60000] {
            for pulses in [0, 1, 2] {
                let request = AcquisitionRequest {
                    channels: Channels::all(),
                    sampling_frequency: frequency,
                    pulses_per_sample: pulses,
                    ..request()
                };
                assert_eq!(resolve(&request), Err(ValidationError::AllChannels));
            }
        }
    }

    #[test]
    fn test_no_channels_rejected() {
        let request = AcquisitionRequest { channels: Channels::empty(), ..request() };
        assert_eq!(resolve(&request), Err(ValidationError::NoChannels));
    }

    #[test]
    fn test_bandwidth_boundary() {
        // 2 * 24 * 400 = 19200 bit/s, exactly half of the bus rate
        let bus_baud_rate = 38_400;
        let accepted = AcquisitionRequest {
            channels: Channels::PPG1 | Channels::PPG2,
            sampling_frequency: 400,
            ..request()
        };
        assert!(resolve_for_bus(&accepted, bus_baud_rate).is_ok());
        let rejected = AcquisitionRequest { sampling_frequency: 401, ..accepted };
        assert_eq!(resolve_for_bus(&rejected, bus_baud_rate),
            Err(ValidationError::Bandwidth { required_bps: 19248, available_bps: 19200 }));
    }

    #[test]
    fn test_bandwidth_default_bus() {
        // 105000 / 48 = 2187.5
        let request = AcquisitionRequest {
            channels: Channels::PPG1 | Channels::PPG2,
            sampling_frequency: 2188,
            ..request()
        };
        assert!(matches!(resolve(&request), Err(ValidationError::Bandwidth { .. })));
        // 3 channels at 1600 Hz need 115200 bit/s
        let request = AcquisitionRequest {
            channels: Channels::PPG1 | Channels::PPG2 | Channels::ECG,
            sampling_frequency: 1600,
            ..request
        };
        assert!(matches!(resolve(&request), Err(ValidationError::Bandwidth { .. })));
    }

    #[test]
    fn test_ppg_frequency_table() {
        let request = AcquisitionRequest { channels: Channels::PILOT1, sampling_frequency: 250, ..request() };
        assert_eq!(resolve(&request), Err(ValidationError::PpgSamplingFrequency(250)));
    }

    #[test]
    fn test_two_pulses() {
        let request = AcquisitionRequest {
            channels: Channels::PPG1,
            sampling_frequency: 100,
            pulses_per_sample: 2,
            ..request()
        };
        let resolved = resolve(&request).unwrap();
        assert_eq!((resolved.ppg_config1 >> 2) & 0xf, 0xf);

        let request = AcquisitionRequest { sampling_frequency: 200, ..request };
        assert_eq!(resolve(&request), Err(ValidationError::TwoPulseSamplingFrequency(200)));

        let request = AcquisitionRequest { pulses_per_sample: 3, ..request };
        assert_eq!(resolve(&request), Err(ValidationError::PulsesPerSample(3)));
    }

    #[test]
    fn test_ecg_double_clock() {
        let request = AcquisitionRequest { channels: Channels::ECG, sampling_frequency: 3200, ..request() };
        assert_eq!(resolve(&request).unwrap().ecg_config1, 0b100);

        let request = AcquisitionRequest { sampling_frequency: 800, ecg_oversampling: 1, ..request };
        assert_eq!(resolve(&request).unwrap().ecg_config1, 0b110);

        let request = AcquisitionRequest { sampling_frequency: 200, ..request };
        assert_eq!(resolve(&request),
            Err(ValidationError::EcgRate { frequency: 200, double_clock: true }));
    }

    #[test]
    fn test_disabled_groups_zeroed() {
        let request = AcquisitionRequest { channels: Channels::ECG, ..request() };
        let resolved = resolve(&request).unwrap();
        assert_eq!((resolved.ppg_config1, resolved.ppg_config2), (0, 0));
        assert_eq!((resolved.led1_pa, resolved.led2_pa, resolved.led_range), (0, 0, 0));

        let request = AcquisitionRequest { channels: Channels::PPG2, ..request };
        let resolved = resolve(&request).unwrap();
        assert_eq!((resolved.ecg_config1, resolved.ecg_config3), (0, 0));
        assert_eq!(resolved.led1_pa, 0);
        assert_eq!(resolved.led2_pa, 125);
    }

    #[test]
    fn test_disabled_groups_not_validated() {
        // ECG gains are irrelevant without ECG
        let request = AcquisitionRequest {
            channels: Channels::PPG1,
            ecg_pga_gain: 3,
            led2_current_ma: 0,
            ..request()
        };
        assert!(resolve(&request).is_ok());
    }

    #[test]
    fn test_high_range_led() {
        let request = AcquisitionRequest {
            channels: Channels::PPG1 | Channels::PPG2,
            led1_current_ma: 20,
            led2_current_ma: 100,
            ..request()
        };
        let resolved = resolve(&request).unwrap();
        assert_eq!((resolved.led1_pa, resolved.led2_pa), (100, 250));
        assert_eq!(resolved.led_range, 0b01_00);
    }

    #[test]
    fn test_codec_errors_propagate() {
        let request = AcquisitionRequest { led1_current_ma: 103, ..request() };
        assert_eq!(resolve(&request),
            Err(ValidationError::Unsupported { parameter: "LED current", value: 103 }));
        let request = AcquisitionRequest { ecg_ia_gain: 7, ..request };
        assert!(resolve(&request).is_err());
    }

    #[test]
    fn test_rule_order() {
        // 100 Hz is a valid PPG rate but not an ECG rate
        let request = AcquisitionRequest { sampling_frequency: 100, ppg_adc_range_ua: 12, ..request() };
        assert_eq!(resolve(&request),
            Err(ValidationError::EcgRate { frequency: 100, double_clock: false }));
        let request = AcquisitionRequest { pulses_per_sample: 3, ..request };
        assert_eq!(resolve(&request), Err(ValidationError::PulsesPerSample(3)));
        let request = AcquisitionRequest { sampling_frequency: 250, ..request };
        assert_eq!(resolve(&request), Err(ValidationError::PpgSamplingFrequency(250)));
        let request = AcquisitionRequest { ecg_ia_gain: 7, led1_current_ma: 0, ..self::request() };
        assert!(matches!(resolve(&request), Err(ValidationError::Unsupported { .. })));
    }

    #[test]
    fn test_wake_period() {
        let resolved = resolve(&request()).unwrap();
        assert_eq!(resolved.wake_period(), Duration::from_millis(40));
    }
}

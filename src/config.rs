//! High-level configuration of an acquisition in terms of physical qualities.

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Signals that can be routed into the sample FIFO.
    ///
    /// The bit values are also the channel mask stored in the capture header.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Channels: u8 {
        const PPG1   = 1<<0;
        const PPG2   = 1<<1;
        const PILOT1 = 1<<2;
        const PILOT2 = 1<<3;
        const ECG    = 1<<4;
    }
}

impl Channels {
    /// Order in which enabled channels are assigned to FIFO slots.
    pub const PRIORITY: [Channels; 5] = [
        Channels::PPG1,
        Channels::PPG2,
        Channels::PILOT1,
        Channels::PILOT2,
        Channels::ECG,
    ];

    /// Channels that share the optical (PPG) data path.
    pub const PPG_FAMILY: Channels = Channels::PPG1
        .union(Channels::PPG2)
        .union(Channels::PILOT1)
        .union(Channels::PILOT2);

    /// The device has four FIFO slots.
    pub const MAX_ENABLED: usize = 4;

    pub fn count(self) -> usize {
        self.bits().count_ones() as usize
    }

    pub fn has_ppg(self) -> bool {
        self.intersects(Self::PPG_FAMILY)
    }

    /// Enabled channels, one flag each, in slot priority order.
    pub fn in_priority_order(self) -> impl Iterator<Item = Channels> {
        Self::PRIORITY.into_iter().filter(move |&channel| self.contains(channel))
    }
}

impl fmt::Debug for Channels {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "Channels(none)")
        }
        write!(f, "Channels(")?;
        for (index, channel) in self.in_priority_order().enumerate() {
            if index > 0 { write!(f, " | ")? }
            write!(f, "{}", match channel {
                Channels::PPG1   => "PPG1",
                Channels::PPG2   => "PPG2",
                Channels::PILOT1 => "PILOT1",
                Channels::PILOT2 => "PILOT2",
                _                => "ECG",
            })?;
        }
        write!(f, ")")
    }
}

/// Everything needed to start an acquisition, in the units a user thinks in.
///
/// Values are validated and encoded by [`ResolvedConfiguration::resolve`]; nothing is
/// checked at construction time.
///
/// [`ResolvedConfiguration::resolve`]: crate::ResolvedConfiguration::resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionRequest {
    /// Output data rate in Hz.
    pub sampling_frequency: u16,
    pub channels: Channels,
    /// Full scale of the PPG ADC in µA: 4, 8, 16 or 32.
    pub ppg_adc_range_ua: u8,
    /// LED pulse width in µs: 50, 100, 200 or 400.
    pub led_pulse_width_us: u16,
    /// LED pulses per sample: 1 or 2.
    pub pulses_per_sample: u8,
    /// Number of PPG conversions averaged into one sample; a power of two up to 32.
    pub sample_averaging: u8,
    /// LED drive currents in mA, 1 to 102.
    pub led1_current_ma: u8,
    pub led2_current_ma: u8,
    /// ECG ADC clock selector: 0 for the standard clock, anything else for the doubled clock.
    pub ecg_oversampling: u8,
    /// ECG programmable gain amplifier: 1, 2, 4 or 8.
    pub ecg_pga_gain: u8,
    /// ECG instrumentation amplifier gain: 5, 9 or 10 (both meaning 9.5), 20 or 50.
    pub ecg_ia_gain: u8,
}

impl Default for AcquisitionRequest {
    fn default() -> Self {
        AcquisitionRequest {
            sampling_frequency: 200,
            channels: Channels::PPG1 | Channels::ECG,
            ppg_adc_range_ua: 32,
            led_pulse_width_us: 50,
            pulses_per_sample: 1,
            sample_averaging: 1,
            led1_current_ma: 25,
            led2_current_ma: 25,
            ecg_oversampling: 0,
            ecg_pga_gain: 2,
            ecg_ia_gain: 10,
        }
    }
}

impl AcquisitionRequest {
    /// Whether the ECG ADC has to run from the doubled clock.
    pub fn ecg_double_clock(&self) -> bool {
        self.sampling_frequency == 3200 || self.ecg_oversampling != 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_priority_order() {
        let channels = Channels::ECG | Channels::PILOT1 | Channels::PPG2;
        let order: Vec<_> = channels.in_priority_order().collect();
        assert_eq!(order, vec![Channels::PPG2, Channels::PILOT1, Channels::ECG]);
        assert_eq!(channels.count(), 3);
    }

    #[test]
    fn test_ppg_family() {
        assert!(Channels::PILOT2.has_ppg());
        assert!((Channels::PPG1 | Channels::ECG).has_ppg());
        assert!(!Channels::ECG.has_ppg());
    }

    #[test]
    fn test_header_bits() {
        assert_eq!((Channels::PPG1 | Channels::PPG2 | Channels::ECG).bits(), 0b10011);
        assert_eq!(Channels::all().count(), 5);
    }

    #[test]
    fn test_debug() {
        assert_eq!(format!("{:?}", Channels::PPG1 | Channels::ECG), "Channels(PPG1 | ECG)");
        assert_eq!(format!("{:?}", Channels::empty()), "Channels(none)");
    }

    #[test]
    fn test_double_clock() {
        let mut request = AcquisitionRequest::default();
        assert!(!request.ecg_double_clock());
        request.sampling_frequency = 3200;
        assert!(request.ecg_double_clock());
        request.sampling_frequency = 800;
        request.ecg_oversampling = 1;
        assert!(request.ecg_double_clock());
    }
}

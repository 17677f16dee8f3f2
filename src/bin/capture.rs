use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::exit;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;

use max86150::{
    Acquisition, AcquisitionRequest, CaptureWriter, Channels, Device, Error, I2cTransport,
    Transport,
};
use max86150::sim::SimulatedSensor;

/// Distinct from every `Error::exit_code()`.
const USAGE_EXIT: i32 = 1;

/// Record ECG/PPG samples from a MAX86150 into a capture file.
#[derive(Parser, Debug)]
#[command(name = "max86150-capture", version)]
struct Cli {
    /// I2C adapter such as /dev/i2c-0, or `sim` for the simulated sensor
    source: String,
    /// Capture file to create
    output: PathBuf,
    /// Sampling frequency in Hz
    #[arg(long, env = "MAX86150_FREQUENCY", default_value_t = 200)]
    frequency: u16,
    /// Channel mask: PPG1=0x01 PPG2=0x02 PILOT1=0x04 PILOT2=0x08 ECG=0x10
    #[arg(long, env = "MAX86150_CHANNELS", default_value = "0x11", value_parser = parse_channels)]
    channels: Channels,
}

impl Cli {
    fn request(&self) -> AcquisitionRequest {
        AcquisitionRequest {
            sampling_frequency: self.frequency,
            channels: self.channels,
            ..Default::default()
        }
    }
}

fn parse_channels(value: &str) -> Result<Channels, String> {
    let mask = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => value.parse(),
    }.map_err(|error| format!("{}", error))?;
    Channels::from_bits(mask).ok_or_else(|| format!("unknown channel bits in {:#04x}", mask))
}

static STOP: AtomicBool = AtomicBool::new(false);

extern "C" fn request_stop(_signal: libc::c_int) {
    STOP.store(true, Ordering::Release);
}

fn install_stop_handler() -> std::io::Result<()> {
    let handler = request_stop as extern "C" fn(libc::c_int) as libc::sighandler_t;
    for signal in [libc::SIGINT, libc::SIGTERM] {
        if unsafe { libc::signal(signal, handler) } == libc::SIG_ERR {
            return Err(std::io::Error::last_os_error())
        }
    }
    Ok(())
}

fn record<T: Transport>(transport: T, request: &AcquisitionRequest, output: &Path)
        -> max86150::Result<()> {
    let device = Device::new(transport);
    let mut acquisition = Acquisition::new(device, request)?;
    acquisition.device().identify()?;
    let mut sink = CaptureWriter::new(File::create(output)?);
    acquisition.run(&mut sink, &STOP)?;
    log::info!("recorded {} samples to {}", acquisition.samples_drained(), output.display());
    Ok(())
}

fn main() {
    env_logger::init();

    let cli = Cli::try_parse().unwrap_or_else(|error| {
        let code = if error.use_stderr() { USAGE_EXIT } else { 0 };
        let _ = error.print();
        exit(code)
    });
    let request = cli.request();
    if let Err(error) = install_stop_handler() {
        eprintln!("cannot install signal handler: {}", error);
        exit(Error::Io(error).exit_code())
    }

    let result = if cli.source == "sim" {
        record(SimulatedSensor::realtime(request.sampling_frequency as u32), &request, &cli.output)
    } else {
        I2cTransport::new(&cli.source)
            .map_err(|source| Error::Transport { operation: "open", source })
            .and_then(|transport| record(transport, &request, &cli.output))
    };
    if let Err(error) = result {
        eprintln!("max86150-capture: {}", error);
        exit(error.exit_code())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["max86150-capture", "sim", "out.bin"]).unwrap();
        assert_eq!(cli.source, "sim");
        assert_eq!(cli.output, PathBuf::from("out.bin"));
        assert_eq!(cli.request(), AcquisitionRequest::default());
    }

    #[test]
    fn test_options() {
        let cli = Cli::try_parse_from([
            "max86150-capture", "/dev/i2c-1", "out.bin", "--frequency", "400", "--channels", "0x03",
        ]).unwrap();
        assert_eq!(cli.request().sampling_frequency, 400);
        assert_eq!(cli.request().channels, Channels::PPG1 | Channels::PPG2);
    }

    #[test]
    fn test_parse_channels() {
        assert_eq!(parse_channels("0x10"), Ok(Channels::ECG));
        assert_eq!(parse_channels("17"), Ok(Channels::PPG1 | Channels::ECG));
        assert!(parse_channels("0x20").is_err());
        assert!(parse_channels("ecg").is_err());
    }

    #[test]
    fn test_missing_output_is_usage_error() {
        let error = Cli::try_parse_from(["max86150-capture", "sim"]).unwrap_err();
        assert!(error.use_stderr());
        assert_ne!(USAGE_EXIT, 0);
        for code in 2..=7 {
            assert_ne!(USAGE_EXIT, code);
        }
    }
}

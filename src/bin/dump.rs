use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::exit;

use clap::Parser;

use max86150::{CaptureReader, Channels, Error};

/// Print a MAX86150 capture file as CSV.
#[derive(Parser, Debug)]
#[command(name = "max86150-dump", version)]
struct Cli {
    /// Capture file written by max86150-capture
    capture: PathBuf,
}

fn column_name(channel: Channels) -> &'static str {
    const NAMES: [(Channels, &str); 5] = [
        (Channels::PPG1, "ppg1"),
        (Channels::PPG2, "ppg2"),
        (Channels::PILOT1, "pilot1"),
        (Channels::PILOT2, "pilot2"),
        (Channels::ECG, "ecg"),
    ];
    NAMES.iter()
        .find(|(flag, _)| *flag == channel)
        .map_or("unknown", |&(_, name)| name)
}

fn dump(path: &Path) -> io::Result<()> {
    let mut reader = CaptureReader::new(BufReader::new(File::open(path)?))?;
    log::info!("{}: channels {:?} at {} Hz", path.display(), reader.channels(), reader.sampling_frequency());

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let columns: Vec<_> = reader.columns().into_iter().map(column_name).collect();
    writeln!(out, "time,{}", columns.join(","))?;
    let period = 1.0 / reader.sampling_frequency().max(1) as f64;
    let mut index = 0u64;
    while let Some(group) = reader.next_group()? {
        write!(out, "{:.6}", index as f64 * period)?;
        for word in group {
            write!(out, ",{}", word)?;
        }
        writeln!(out)?;
        index += 1;
    }
    out.flush()?;
    log::info!("{}: {} samples", path.display(), index);
    Ok(())
}

fn main() {
    env_logger::init();

    let cli = Cli::try_parse().unwrap_or_else(|error| {
        let code = if error.use_stderr() { 1 } else { 0 };
        let _ = error.print();
        exit(code)
    });
    if let Err(error) = dump(&cli.capture) {
        eprintln!("max86150-dump: {}", error);
        exit(Error::Io(error).exit_code())
    }
}

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};

use dvbtune::device::DvbDevices;
use dvbtune::frontend;
use dvbtune::ts::{PidCounter, TS_PACKET_SIZE};
use dvbtune::{Session, SessionConfig, SignalReport};

use crate::config::ConfigFile;
use crate::context::{Cli, Commands};

mod config;
mod context;

/// Bytes requested from the DVR node per read.
const READ_CHUNK: usize = TS_PACKET_SIZE * 348;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    // Load config file: explicit path > auto-detect > default
    let file_config = match config::find_config(cli.config.as_deref()) {
        Some(path) => match config::load_config(&path) {
            Ok(c) => {
                info!("Loaded config from: {}", path.display());
                c
            }
            Err(e) => {
                error!("Failed to load config file: {}", e);
                return Err(e.into());
            }
        },
        None => ConfigFile::default(),
    };

    match cli.command {
        Commands::Capture {
            device,
            station,
            size,
            lock_timeout,
            output,
        } => {
            let (name, station) = file_config.resolve_station(&station)?;
            let device = file_config.device_dir(device);
            let session_config = SessionConfig {
                lock_timeout: file_config.lock_timeout(lock_timeout),
            };
            let limit = capture_limit(size)
                .ok_or_else(|| format!("--size {} MiB is too large", size))?;

            info!("Tuning {} ({}) on {}", name, station, device.display());
            let mut session = Session::open_with_config(&device, station, &session_config)?;
            info!(
                "Tuned to {} Hz, streaming from {}",
                session.tuned_parameters().frequency,
                device.display()
            );

            let mut out: Box<dyn Write> = if output == "-" {
                Box::new(BufWriter::new(io::stdout().lock()))
            } else {
                Box::new(BufWriter::new(File::create(&output)?))
            };

            let stop = Arc::new(AtomicBool::new(false));
            {
                let stop = Arc::clone(&stop);
                ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))?;
            }

            let progress = ProgressBar::new(limit);
            progress.set_style(ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})",
            )?);
            progress.enable_steady_tick(Duration::from_millis(200));

            let mut counter = PidCounter::new();
            let copied = copy_stream(&mut session, &mut out, limit, &stop, &progress, &mut counter)
                .and_then(|n| out.flush().map(|_| n));
            progress.finish_and_clear();

            let closed = session.close();
            let copied = match (copied, closed) {
                (Ok(n), Ok(())) => n,
                (Ok(_), Err(e)) => return Err(e.into()),
                (Err(e), closed) => {
                    if let Err(close_err) = closed {
                        warn!("{}", close_err);
                    }
                    return Err(e.into());
                }
            };

            info!("Captured {} bytes to {}", copied, output);
            for (pid, count) in counter.iter() {
                info!("  PID 0x{:04X}: {} packets", pid, count);
            }
            if counter.transport_errors() > 0 {
                warn!(
                    "{} packets had the transport error indicator set",
                    counter.transport_errors()
                );
            }
            if counter.discontinuities() > 0 {
                warn!("{} continuity counter jumps (dropped packets)", counter.discontinuities());
            }
            if counter.scrambled() > 0 {
                warn!("{} packets are scrambled", counter.scrambled());
            }
        }
        Commands::Info { device } => {
            let device = file_config.device_dir(device);
            let info = frontend::probe(&DvbDevices, &device)?;
            println!("{}", info);
        }
        Commands::Status {
            device,
            station,
            lock_timeout,
        } => {
            let (name, station) = file_config.resolve_station(&station)?;
            let device = file_config.device_dir(device);
            let session_config = SessionConfig {
                lock_timeout: file_config.lock_timeout(lock_timeout),
            };

            let mut session = Session::open_with_config(&device, station, &session_config)?;
            let report = session.signal();
            let parameters = session.frontend_parameters();
            session.close()?;

            println!("{} {}", "Station:".bold(), name);
            println!("{} {} Hz", "Frequency:".bold(), parameters?.frequency);
            print_report(&report?);
        }
        Commands::Stations => {
            if file_config.stations.is_empty() {
                warn!("No stations configured");
            }
            for (name, station) in &file_config.stations {
                println!("{:<16} {}", name.bold(), station);
            }
        }
    }

    Ok(())
}

/// Capture size in bytes, `None` if `size_mib` does not fit in a u64.
fn capture_limit(size_mib: u64) -> Option<u64> {
    size_mib.checked_mul(1024 * 1024)
}

fn copy_stream<R: Read>(
    source: &mut R,
    out: &mut dyn Write,
    limit: u64,
    stop: &AtomicBool,
    progress: &ProgressBar,
    counter: &mut PidCounter,
) -> io::Result<u64> {
    let mut buf = vec![0u8; READ_CHUNK];
    let mut copied = 0u64;

    while copied < limit {
        if stop.load(Ordering::SeqCst) {
            info!("Interrupted, stopping capture");
            break;
        }
        let want = usize::try_from(limit - copied).map_or(buf.len(), |left| left.min(buf.len()));
        let n = match source.read(&mut buf[..want]) {
            Ok(0) => {
                debug!("DVR returned end of stream");
                break;
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        out.write_all(&buf[..n])?;
        counter.feed(&buf[..n]);
        copied += n as u64;
        progress.inc(n as u64);
    }

    Ok(copied)
}

fn print_report(report: &SignalReport) {
    let lock = if report.status.has_lock() {
        "LOCKED".green().bold()
    } else {
        "NO LOCK".red().bold()
    };
    println!("{} {} ({})", "Status:".bold(), lock, report.status);
    println!("{} {}", "Signal:".bold(), report.strength);
    println!("{} {}", "SNR:".bold(), report.snr);
    println!("{} {}", "BER:".bold(), report.ber);
    println!("{} {}", "Uncorrected:".bold(), report.uncorrected_blocks);
}

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_num::maybe_hex;

#[derive(Debug, Parser)]
#[clap(name = "dvbtune")]
#[clap(about = "dvbtune tunes a Linux DVB adapter to an ATSC station and captures its transport stream. ", long_about = None)]
#[clap(version)]
pub(crate) struct Cli {
    /// Configuration file.{n}
    /// If omitted, `dvbtune.toml` in the current directory is used when present.
    #[clap(short = 'f', long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug-level logging.
    #[clap(short, long, global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

/// Station selection.{n}
/// Either a station name from the configuration file, or an explicit
/// frequency and PIDs. Explicit values override the named station's fields.
#[derive(Debug, Clone, Default, Args)]
pub(crate) struct StationArgs {
    /// Station name, as defined under `[stations]` in the configuration file.
    #[clap(short, long)]
    pub station: Option<String>,

    /// Carrier frequency in Hz.
    #[clap(long, value_name = "HZ")]
    pub frequency: Option<u32>,

    /// Video PID (decimal or 0x-prefixed hex).
    #[clap(long, value_parser = maybe_hex::<u16>)]
    pub video: Option<u16>,

    /// Audio PID (decimal or 0x-prefixed hex).
    #[clap(long, value_parser = maybe_hex::<u16>)]
    pub audio: Option<u16>,

    /// Auxiliary/data PID (decimal or 0x-prefixed hex).
    #[clap(long, value_parser = maybe_hex::<u16>)]
    pub data: Option<u16>,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Tune to a station and capture its transport stream.{n}
    /// Capture stops after `--size` megabytes or on Ctrl-C.
    Capture {
        /// The adapter directory, e.g. `/dev/dvb/adapter0`.{n}
        /// Defaults to the configuration file's `device`, then `/dev/dvb/adapter0`.
        #[clap(short = 'i', long, value_name = "ADAPTER_DIR")]
        device: Option<PathBuf>,

        #[clap(flatten)]
        station: StationArgs,

        /// Amount of data to capture, in MiB.
        #[clap(long, default_value = "1")]
        size: u64,

        /// Give up if the frontend reports nothing within this many seconds.{n}
        /// Without it, tuning waits for as long as the driver takes.
        #[clap(long, value_name = "SECONDS")]
        lock_timeout: Option<u64>,

        /// The location of the output.{n}
        /// If '-' is specified, the stream is written to stdout.
        #[clap(required = true)]
        output: String,
    },
    /// Print the frontend's name, frequency range and capabilities.
    Info {
        /// The adapter directory.
        #[clap(short = 'i', long, value_name = "ADAPTER_DIR")]
        device: Option<PathBuf>,
    },
    /// Tune to a station and print lock status and signal measurements.
    Status {
        /// The adapter directory.
        #[clap(short = 'i', long, value_name = "ADAPTER_DIR")]
        device: Option<PathBuf>,

        #[clap(flatten)]
        station: StationArgs,

        /// Give up if the frontend reports nothing within this many seconds.
        #[clap(long, value_name = "SECONDS")]
        lock_timeout: Option<u64>,
    },
    /// List the stations defined in the configuration file.
    Stations,
}

//! Configuration file.
//!
//! ```toml
//! device = "/dev/dvb/adapter0"
//! lock_timeout_secs = 10
//!
//! [stations.KQED-HD]
//! frequency = 569000000
//! video = 49
//! audio = 51
//! data = 1
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dvbtune::demux::ContentClass;
use dvbtune::Station;
use serde::Deserialize;
use thiserror::Error;

use crate::context::StationArgs;

pub(crate) const DEFAULT_CONFIG: &str = "dvbtune.toml";
pub(crate) const DEFAULT_DEVICE: &str = "/dev/dvb/adapter0";

#[derive(Error, Debug)]
pub(crate) enum ConfigError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Unknown station '{0}'")]
    UnknownStation(String),

    #[error("Specify --station or all of --frequency, --video, --audio and --data")]
    IncompleteStation,

    #[error("Station '{station}': {class:?} PID 0x{pid:04X} exceeds 0x1FFF")]
    InvalidPid {
        station: String,
        class: ContentClass,
        pid: u16,
    },
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub(crate) struct ConfigFile {
    pub device: Option<PathBuf>,
    pub lock_timeout_secs: Option<u64>,
    #[serde(default)]
    pub stations: BTreeMap<String, Station>,
}

/// Explicit path, else `dvbtune.toml` in the current directory if it exists.
pub(crate) fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit.map(Path::to_path_buf).or_else(|| {
        let default_path = PathBuf::from(DEFAULT_CONFIG);
        if default_path.exists() {
            Some(default_path)
        } else {
            None
        }
    })
}

pub(crate) fn load_config(path: &Path) -> Result<ConfigFile, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: ConfigFile = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    for (name, station) in &config.stations {
        validate(name, station)?;
    }
    Ok(config)
}

fn validate(name: &str, station: &Station) -> Result<(), ConfigError> {
    match station.invalid_pid() {
        Some((class, pid)) => Err(ConfigError::InvalidPid {
            station: name.to_string(),
            class,
            pid,
        }),
        None => Ok(()),
    }
}

impl ConfigFile {
    /// Adapter directory: command line, then config file, then the default.
    pub fn device_dir(&self, cli: Option<PathBuf>) -> PathBuf {
        cli.or_else(|| self.device.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DEVICE))
    }

    /// Lock timeout: command line, then config file. `None` waits indefinitely.
    pub fn lock_timeout(&self, cli: Option<u64>) -> Option<Duration> {
        cli.or(self.lock_timeout_secs).map(Duration::from_secs)
    }

    /// Build the station to tune, returning a display name for it.
    pub fn resolve_station(&self, args: &StationArgs) -> Result<(String, Station), ConfigError> {
        let named = match &args.station {
            Some(name) => Some(
                self.stations
                    .get(name)
                    .copied()
                    .ok_or_else(|| ConfigError::UnknownStation(name.clone()))?,
            ),
            None => None,
        };

        let station = Station {
            frequency: args
                .frequency
                .or(named.map(|s| s.frequency))
                .ok_or(ConfigError::IncompleteStation)?,
            video: args
                .video
                .or(named.map(|s| s.video))
                .ok_or(ConfigError::IncompleteStation)?,
            audio: args
                .audio
                .or(named.map(|s| s.audio))
                .ok_or(ConfigError::IncompleteStation)?,
            data: args
                .data
                .or(named.map(|s| s.data))
                .ok_or(ConfigError::IncompleteStation)?,
        };

        let name = args
            .station
            .clone()
            .unwrap_or_else(|| format!("{} Hz", station.frequency));
        validate(&name, &station)?;
        Ok((name, station))
    }
}

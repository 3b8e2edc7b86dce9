//! Tuning sessions.
//!
//! A [`Session`] owns the five handles of one tuned adapter: the frontend,
//! three demux filter instances and the DVR capture node. It is only ever
//! handed out with all five open; a failure anywhere in the open sequence
//! closes what was already opened before the error is returned.
//!
//! Reading a session reads the DVR node directly. Bytes are raw transport
//! stream in driver order with no framing or alignment applied.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::info;

use crate::control;
use crate::demux::{self, Filters};
use crate::device::{self, open_node, DeviceFile, DeviceHandle, DeviceOpener, DvbDevices, Node};
use crate::error::TunerError;
use crate::frontend::{self, SignalReport};
use crate::params::{FeStatus, FrontendInfo, FrontendParameters};
use crate::station::Station;

/// Options for opening a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionConfig {
    /// Upper bound on the wait for the frontend event. `None` blocks for as
    /// long as the driver takes to report. Expiry fails the open with
    /// [`TunerError::EventWaitExpired`]; [`TunerError::TuneTimeout`] stays
    /// reserved for events that carry the driver's timeout flag.
    pub lock_timeout: Option<Duration>,
}

/// An open, tuned and filtered adapter.
#[derive(Debug)]
pub struct Session<H = DeviceFile> {
    dir: PathBuf,
    station: Station,
    tuned: FrontendParameters,
    frontend: H,
    filters: Filters<H>,
    dvr: H,
}

impl Session<DeviceFile> {
    /// Open a session on the adapter directory `dir` (e.g. `/dev/dvb/adapter0`).
    pub fn open<P: AsRef<Path>>(dir: P, station: Station) -> Result<Self, TunerError> {
        Self::open_with(&DvbDevices, dir.as_ref(), station, &SessionConfig::default())
    }

    pub fn open_with_config<P: AsRef<Path>>(
        dir: P,
        station: Station,
        config: &SessionConfig,
    ) -> Result<Self, TunerError> {
        Self::open_with(&DvbDevices, dir.as_ref(), station, config)
    }
}

impl<H: DeviceHandle> Session<H> {
    /// Open a session using `opener` for every device node.
    pub fn open_with<O>(
        opener: &O,
        dir: &Path,
        station: Station,
        config: &SessionConfig,
    ) -> Result<Self, TunerError>
    where
        O: DeviceOpener<Handle = H>,
    {
        let tuned = frontend::tune(opener, dir, &station, config.lock_timeout)?;

        let filters = match demux::configure(opener, dir, &tuned, &station) {
            Ok(filters) => filters,
            Err(e) => {
                return Err(device::rollback(
                    e,
                    [(Node::Frontend.file_name(), tuned.into_handle())],
                ));
            }
        };

        let dvr = match open_node(opener, dir, Node::Dvr) {
            Ok(dvr) => dvr,
            Err(e) => {
                return Err(device::rollback(
                    e,
                    std::iter::once((Node::Frontend.file_name(), tuned.into_handle()))
                        .chain(filters.into_labeled()),
                ));
            }
        };

        let parameters = tuned.event().parameters;
        info!("Session open on {}: {}", dir.display(), station);
        Ok(Session {
            dir: dir.to_path_buf(),
            station,
            tuned: parameters,
            frontend: tuned.into_handle(),
            filters,
            dvr,
        })
    }

    pub fn device_dir(&self) -> &Path {
        &self.dir
    }

    pub fn station(&self) -> &Station {
        &self.station
    }

    /// Parameters the driver reported when it settled.
    pub fn tuned_parameters(&self) -> FrontendParameters {
        self.tuned
    }

    /// Current frontend status. Lock is not guaranteed by a successful open.
    pub fn status(&mut self) -> Result<FeStatus, TunerError> {
        control::read_status(&mut self.frontend)
    }

    pub fn frontend_info(&mut self) -> Result<FrontendInfo, TunerError> {
        control::get_info(&mut self.frontend)
    }

    /// Parameters currently programmed into the frontend.
    pub fn frontend_parameters(&mut self) -> Result<FrontendParameters, TunerError> {
        control::get_frontend(&mut self.frontend)
    }

    pub fn signal(&mut self) -> Result<SignalReport, TunerError> {
        frontend::read_signal(&mut self.frontend)
    }

    /// Close all five handles: frontend, video, audio and data demux, DVR.
    ///
    /// Every handle gets a close attempt; failures are collected into a single
    /// [`TunerError::CloseAggregate`] with one message per failed handle.
    pub fn close(self) -> Result<(), TunerError> {
        let Session {
            dir,
            frontend,
            filters,
            dvr,
            ..
        } = self;

        let handles = std::iter::once((Node::Frontend.file_name(), frontend))
            .chain(filters.into_labeled())
            .chain(std::iter::once((Node::Dvr.file_name(), dvr)));
        let failures = device::close_all(handles);

        if failures.is_empty() {
            info!("Session on {} closed", dir.display());
            Ok(())
        } else {
            Err(TunerError::CloseAggregate { failures })
        }
    }
}

impl<H: DeviceHandle> Read for Session<H> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.dvr.read(buf)
    }
}

/// Open a session on `dir` with default options.
pub fn open_session<P: AsRef<Path>>(dir: P, station: Station) -> Result<Session, TunerError> {
    Session::open(dir, station)
}

//! Simulated DVB driver for tests.
//!
//! Shared state records what the code under test did (opens, closes, control
//! commands, filters) and lets each test inject failures at a chosen step.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use crate::control::{Command, Request, Response};
use crate::device::{Access, DeviceHandle, DeviceOpener, Node};
use crate::params::{
    FeCaps, FeStatus, FeType, FrontendEvent, FrontendInfo, FrontendParameters, PesFilterParams,
};
use crate::ts::{SYNC_BYTE, TS_PACKET_SIZE};

#[derive(Debug, Default)]
struct SimState {
    event_status: FeStatus,
    settle_at: Option<u32>,
    event_pending: bool,
    frontend: Option<FrontendParameters>,
    filters: Vec<PesFilterParams>,
    opened: Vec<PathBuf>,
    open_handles: usize,
    close_attempts: usize,
    fail_open: HashMap<usize, i32>,
    fail_close: HashMap<usize, i32>,
    fail_commands: HashMap<(Command, usize), i32>,
    command_counts: HashMap<Command, usize>,
    fail_reads: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct SimDriver {
    state: Rc<RefCell<SimState>>,
}

impl SimDriver {
    pub const BER: u32 = 12;
    pub const SNR: u16 = 0x01C2;
    pub const STRENGTH: u16 = 0xC000;

    /// A driver that locks on whatever frequency is requested.
    pub fn locking() -> Self {
        Self::with_status(
            FeStatus::HAS_SIGNAL
                | FeStatus::HAS_CARRIER
                | FeStatus::HAS_VITERBI
                | FeStatus::HAS_SYNC
                | FeStatus::HAS_LOCK,
        )
    }

    /// A driver whose frontend event reports a timeout.
    pub fn timing_out() -> Self {
        Self::with_status(FeStatus::TIMEDOUT)
    }

    pub fn with_status(event_status: FeStatus) -> Self {
        SimDriver {
            state: Rc::new(RefCell::new(SimState {
                event_status,
                event_pending: true,
                ..SimState::default()
            })),
        }
    }

    /// Report `frequency` in frontend events regardless of the request.
    pub fn settle_at(self, frequency: u32) -> Self {
        self.state.borrow_mut().settle_at = Some(frequency);
        self
    }

    /// Never signal a pending frontend event to `wait_event`.
    pub fn without_event(self) -> Self {
        self.state.borrow_mut().event_pending = false;
        self
    }

    /// Fail the `nth` open (0-based, counting every node) with `errno`.
    pub fn fail_open(&self, nth: usize, errno: i32) {
        self.state.borrow_mut().fail_open.insert(nth, errno);
    }

    /// Fail closing the handle returned by the `nth` open.
    pub fn fail_close(&self, nth: usize, errno: i32) {
        self.state.borrow_mut().fail_close.insert(nth, errno);
    }

    pub fn fail_command(&self, command: Command, errno: i32) {
        self.fail_nth_command(command, 0, errno);
    }

    /// Fail the `nth` issue (0-based) of `command` with `errno`.
    pub fn fail_nth_command(&self, command: Command, nth: usize, errno: i32) {
        self.state
            .borrow_mut()
            .fail_commands
            .insert((command, nth), errno);
    }

    pub fn fail_reads(&self, errno: i32) {
        self.state.borrow_mut().fail_reads = Some(errno);
    }

    pub fn open_handles(&self) -> usize {
        self.state.borrow().open_handles
    }

    pub fn close_attempts(&self) -> usize {
        self.state.borrow().close_attempts
    }

    pub fn opened_paths(&self) -> Vec<PathBuf> {
        self.state.borrow().opened.clone()
    }

    pub fn filters(&self) -> Vec<PesFilterParams> {
        self.state.borrow().filters.clone()
    }

    /// Parameters from the last successful set-frontend.
    pub fn frontend_parameters(&self) -> Option<FrontendParameters> {
        self.state.borrow().frontend
    }

    pub fn command_count(&self, command: Command) -> usize {
        self.state
            .borrow()
            .command_counts
            .get(&command)
            .copied()
            .unwrap_or(0)
    }

    pub fn open_frontend(&self) -> SimHandle {
        self.open(&Node::Frontend.path_in(Path::new("/sim")), Access::ReadWrite)
            .unwrap()
    }

    pub fn open_demux(&self) -> SimHandle {
        self.open(&Node::Demux.path_in(Path::new("/sim")), Access::ReadWrite)
            .unwrap()
    }

    fn info() -> FrontendInfo {
        FrontendInfo {
            name: "Simulated ATSC Frontend".to_string(),
            fe_type: FeType::Atsc,
            frequency_min: 54_000_000,
            frequency_max: 858_000_000,
            frequency_stepsize: 62_500,
            frequency_tolerance: 0,
            symbol_rate_min: 0,
            symbol_rate_max: 0,
            symbol_rate_tolerance: 0,
            notifier_delay: 0,
            caps: FeCaps::CAN_INVERSION_AUTO | FeCaps::CAN_8VSB,
        }
    }
}

impl DeviceOpener for SimDriver {
    type Handle = SimHandle;

    fn open(&self, path: &Path, _access: Access) -> io::Result<SimHandle> {
        let mut state = self.state.borrow_mut();
        let id = state.opened.len();
        state.opened.push(path.to_path_buf());
        if let Some(&errno) = state.fail_open.get(&id) {
            return Err(io::Error::from_raw_os_error(errno));
        }
        state.open_handles += 1;
        Ok(SimHandle {
            id,
            is_dvr: path
                .file_name()
                .map_or(false, |name| name == Node::Dvr.file_name()),
            state: Rc::clone(&self.state),
            position: 0,
        })
    }
}

#[derive(Debug)]
pub struct SimHandle {
    id: usize,
    is_dvr: bool,
    state: Rc<RefCell<SimState>>,
    position: usize,
}

impl SimHandle {
    /// One packet per configured filter, repeated by the reader.
    fn stream(filters: &[PesFilterParams]) -> Vec<u8> {
        let mut stream = Vec::with_capacity(filters.len() * TS_PACKET_SIZE);
        for filter in filters {
            let mut packet = [0xFFu8; TS_PACKET_SIZE];
            packet[0] = SYNC_BYTE;
            packet[1] = (filter.pid >> 8) as u8 & 0x1F;
            packet[2] = filter.pid as u8;
            packet[3] = 0x10;
            stream.extend_from_slice(&packet);
        }
        stream
    }
}

impl Read for SimHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let state = self.state.borrow();
        if let Some(errno) = state.fail_reads {
            return Err(io::Error::from_raw_os_error(errno));
        }
        if !self.is_dvr {
            return Ok(0);
        }
        let stream = Self::stream(&state.filters);
        if stream.is_empty() {
            return Ok(0);
        }
        for byte in buf.iter_mut() {
            *byte = stream[self.position % stream.len()];
            self.position += 1;
        }
        Ok(buf.len())
    }
}

impl DeviceHandle for SimHandle {
    fn ioctl(&mut self, request: &Request) -> io::Result<Response> {
        let mut state = self.state.borrow_mut();
        let command = request.command();
        let nth = {
            let count = state.command_counts.entry(command).or_insert(0);
            *count += 1;
            *count - 1
        };
        if let Some(&errno) = state.fail_commands.get(&(command, nth)) {
            return Err(io::Error::from_raw_os_error(errno));
        }

        let settled = |state: &SimState| {
            let requested = state.frontend.map(|p| p.frequency).unwrap_or(0);
            FrontendParameters::vsb8(state.settle_at.unwrap_or(requested))
        };

        Ok(match *request {
            Request::GetInfo => Response::Info(SimDriver::info()),
            Request::ReadStatus => Response::Status(if state.frontend.is_some() {
                state.event_status
            } else {
                FeStatus::default()
            }),
            Request::ReadBer => Response::Ber(SimDriver::BER),
            Request::ReadSnr => Response::Snr(SimDriver::SNR),
            Request::ReadSignalStrength => Response::SignalStrength(SimDriver::STRENGTH),
            Request::ReadUncorrectedBlocks => Response::UncorrectedBlocks(0),
            Request::SetFrontend(params) => {
                state.frontend = Some(params);
                Response::Done
            }
            Request::GetFrontend => Response::Parameters(settled(&*state)),
            Request::GetEvent => Response::Event(FrontendEvent {
                status: state.event_status,
                parameters: settled(&*state),
            }),
            Request::SetPesFilter(params) => {
                state.filters.push(params);
                Response::Done
            }
        })
    }

    fn wait_event(&mut self, _timeout: Duration) -> io::Result<bool> {
        Ok(self.state.borrow().event_pending)
    }

    fn close(self) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        state.close_attempts += 1;
        state.open_handles -= 1;
        match state.fail_close.get(&self.id) {
            Some(&errno) => Err(io::Error::from_raw_os_error(errno)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sim_counts_handles() {
        let driver = SimDriver::locking();
        let fe = driver.open_frontend();
        let dmx = driver.open_demux();
        assert_eq!(driver.open_handles(), 2);
        fe.close().unwrap();
        dmx.close().unwrap();
        assert_eq!(driver.open_handles(), 0);
        assert_eq!(driver.close_attempts(), 2);
    }
}

//! Control channel: synchronous device-control commands.
//!
//! A [`Request`] carries the command and its input parameter block; the
//! handle answers with the matching [`Response`] once the driver returns.
//! The typed helpers below issue one command each and unwrap the reply.

use std::fmt;
use std::io;

use log::trace;

use crate::device::DeviceHandle;
use crate::error::TunerError;
use crate::params::{FeStatus, FrontendEvent, FrontendInfo, FrontendParameters, PesFilterParams};

/// Control commands understood by the DVB frontend and demux drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    GetInfo,
    ReadStatus,
    ReadBer,
    ReadSnr,
    ReadSignalStrength,
    ReadUncorrectedBlocks,
    SetFrontend,
    GetFrontend,
    /// Blocks until the driver posts a frontend status change.
    GetEvent,
    SetPesFilter,
}

impl Command {
    /// Driver name of the command.
    pub fn name(self) -> &'static str {
        match self {
            Command::GetInfo => "FE_GET_INFO",
            Command::ReadStatus => "FE_READ_STATUS",
            Command::ReadBer => "FE_READ_BER",
            Command::ReadSnr => "FE_READ_SNR",
            Command::ReadSignalStrength => "FE_READ_SIGNAL_STRENGTH",
            Command::ReadUncorrectedBlocks => "FE_READ_UNCORRECTED_BLOCKS",
            Command::SetFrontend => "FE_SET_FRONTEND",
            Command::GetFrontend => "FE_GET_FRONTEND",
            Command::GetEvent => "FE_GET_EVENT",
            Command::SetPesFilter => "DMX_SET_PES_FILTER",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A command together with its input block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    GetInfo,
    ReadStatus,
    ReadBer,
    ReadSnr,
    ReadSignalStrength,
    ReadUncorrectedBlocks,
    SetFrontend(FrontendParameters),
    GetFrontend,
    GetEvent,
    SetPesFilter(PesFilterParams),
}

impl Request {
    pub fn command(&self) -> Command {
        match self {
            Request::GetInfo => Command::GetInfo,
            Request::ReadStatus => Command::ReadStatus,
            Request::ReadBer => Command::ReadBer,
            Request::ReadSnr => Command::ReadSnr,
            Request::ReadSignalStrength => Command::ReadSignalStrength,
            Request::ReadUncorrectedBlocks => Command::ReadUncorrectedBlocks,
            Request::SetFrontend(_) => Command::SetFrontend,
            Request::GetFrontend => Command::GetFrontend,
            Request::GetEvent => Command::GetEvent,
            Request::SetPesFilter(_) => Command::SetPesFilter,
        }
    }
}

/// Output block returned by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Set commands return nothing.
    Done,
    Info(FrontendInfo),
    Status(FeStatus),
    Ber(u32),
    Snr(u16),
    SignalStrength(u16),
    UncorrectedBlocks(u32),
    Parameters(FrontendParameters),
    Event(FrontendEvent),
}

/// Issue one command on `handle` and block until the driver answers.
pub fn send<H: DeviceHandle>(handle: &mut H, request: Request) -> Result<Response, TunerError> {
    let command = request.command();
    trace!("{}: {:?}", command, request);
    handle
        .ioctl(&request)
        .map_err(|source| TunerError::ControlCommand { command, source })
}

fn unexpected(command: Command, response: Response) -> TunerError {
    TunerError::ControlCommand {
        command,
        source: io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unexpected reply {:?}", response),
        ),
    }
}

pub fn get_info<H: DeviceHandle>(handle: &mut H) -> Result<FrontendInfo, TunerError> {
    match send(handle, Request::GetInfo)? {
        Response::Info(info) => Ok(info),
        other => Err(unexpected(Command::GetInfo, other)),
    }
}

pub fn read_status<H: DeviceHandle>(handle: &mut H) -> Result<FeStatus, TunerError> {
    match send(handle, Request::ReadStatus)? {
        Response::Status(status) => Ok(status),
        other => Err(unexpected(Command::ReadStatus, other)),
    }
}

pub fn read_ber<H: DeviceHandle>(handle: &mut H) -> Result<u32, TunerError> {
    match send(handle, Request::ReadBer)? {
        Response::Ber(ber) => Ok(ber),
        other => Err(unexpected(Command::ReadBer, other)),
    }
}

pub fn read_snr<H: DeviceHandle>(handle: &mut H) -> Result<u16, TunerError> {
    match send(handle, Request::ReadSnr)? {
        Response::Snr(snr) => Ok(snr),
        other => Err(unexpected(Command::ReadSnr, other)),
    }
}

pub fn read_signal_strength<H: DeviceHandle>(handle: &mut H) -> Result<u16, TunerError> {
    match send(handle, Request::ReadSignalStrength)? {
        Response::SignalStrength(strength) => Ok(strength),
        other => Err(unexpected(Command::ReadSignalStrength, other)),
    }
}

pub fn read_uncorrected_blocks<H: DeviceHandle>(handle: &mut H) -> Result<u32, TunerError> {
    match send(handle, Request::ReadUncorrectedBlocks)? {
        Response::UncorrectedBlocks(blocks) => Ok(blocks),
        other => Err(unexpected(Command::ReadUncorrectedBlocks, other)),
    }
}

pub fn set_frontend<H: DeviceHandle>(
    handle: &mut H,
    params: FrontendParameters,
) -> Result<(), TunerError> {
    match send(handle, Request::SetFrontend(params))? {
        Response::Done => Ok(()),
        other => Err(unexpected(Command::SetFrontend, other)),
    }
}

pub fn get_frontend<H: DeviceHandle>(handle: &mut H) -> Result<FrontendParameters, TunerError> {
    match send(handle, Request::GetFrontend)? {
        Response::Parameters(params) => Ok(params),
        other => Err(unexpected(Command::GetFrontend, other)),
    }
}

/// Block until the driver posts a frontend event.
pub fn get_event<H: DeviceHandle>(handle: &mut H) -> Result<FrontendEvent, TunerError> {
    match send(handle, Request::GetEvent)? {
        Response::Event(event) => Ok(event),
        other => Err(unexpected(Command::GetEvent, other)),
    }
}

pub fn set_pes_filter<H: DeviceHandle>(
    handle: &mut H,
    params: PesFilterParams,
) -> Result<(), TunerError> {
    match send(handle, Request::SetPesFilter(params))? {
        Response::Done => Ok(()),
        other => Err(unexpected(Command::SetPesFilter, other)),
    }
}

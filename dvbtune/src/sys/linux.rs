//! Linux DVB v3 ioctls.
//!
//! Parameter blocks are passed to the kernel as 4-byte aligned byte buffers
//! whose contents are produced and consumed by [`crate::params`].

use std::fs::File;
use std::io;
use std::os::fd::{AsFd, AsRawFd, IntoRawFd};
use std::time::Duration;

use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

use crate::control::{Request, Response};
use crate::params::{
    FeStatus, FrontendEvent, FrontendInfo, FrontendParameters, FRONTEND_EVENT_SIZE,
    FRONTEND_INFO_SIZE, FRONTEND_PARAMETERS_SIZE, PES_FILTER_PARAMS_SIZE,
};

#[repr(C, align(4))]
pub struct Block<const N: usize>([u8; N]);

pub type InfoBlock = Block<FRONTEND_INFO_SIZE>;
pub type ParametersBlock = Block<FRONTEND_PARAMETERS_SIZE>;
pub type EventBlock = Block<FRONTEND_EVENT_SIZE>;
pub type PesFilterBlock = Block<PES_FILTER_PARAMS_SIZE>;

mod raw {
    use super::{EventBlock, InfoBlock, ParametersBlock, PesFilterBlock};

    nix::ioctl_read!(fe_get_info, b'o', 61, InfoBlock);
    nix::ioctl_read!(fe_read_status, b'o', 69, u32);
    nix::ioctl_read!(fe_read_ber, b'o', 70, u32);
    nix::ioctl_read!(fe_read_signal_strength, b'o', 71, u16);
    nix::ioctl_read!(fe_read_snr, b'o', 72, u16);
    nix::ioctl_read!(fe_read_uncorrected_blocks, b'o', 73, u32);
    nix::ioctl_write_ptr!(fe_set_frontend, b'o', 76, ParametersBlock);
    nix::ioctl_read!(fe_get_frontend, b'o', 77, ParametersBlock);
    nix::ioctl_read!(fe_get_event, b'o', 78, EventBlock);
    nix::ioctl_write_ptr!(dmx_set_pes_filter, b'o', 44, PesFilterBlock);
}

pub(crate) fn ioctl(file: &File, request: &Request) -> io::Result<Response> {
    let fd = file.as_raw_fd();

    // SAFETY: each block is exactly the size encoded in its request number and
    // outlives the call; `fd` stays open for the duration of the borrow.
    let response = unsafe {
        match *request {
            Request::GetInfo => {
                let mut block = Block([0u8; FRONTEND_INFO_SIZE]);
                raw::fe_get_info(fd, &mut block)?;
                Response::Info(FrontendInfo::decode(&block.0))
            }
            Request::ReadStatus => {
                let mut status = 0u32;
                raw::fe_read_status(fd, &mut status)?;
                Response::Status(FeStatus::from_bits(status))
            }
            Request::ReadBer => {
                let mut ber = 0u32;
                raw::fe_read_ber(fd, &mut ber)?;
                Response::Ber(ber)
            }
            Request::ReadSnr => {
                let mut snr = 0u16;
                raw::fe_read_snr(fd, &mut snr)?;
                Response::Snr(snr)
            }
            Request::ReadSignalStrength => {
                let mut strength = 0u16;
                raw::fe_read_signal_strength(fd, &mut strength)?;
                Response::SignalStrength(strength)
            }
            Request::ReadUncorrectedBlocks => {
                let mut blocks = 0u32;
                raw::fe_read_uncorrected_blocks(fd, &mut blocks)?;
                Response::UncorrectedBlocks(blocks)
            }
            Request::SetFrontend(params) => {
                let block = Block(params.encode());
                raw::fe_set_frontend(fd, &block)?;
                Response::Done
            }
            Request::GetFrontend => {
                let mut block = Block([0u8; FRONTEND_PARAMETERS_SIZE]);
                raw::fe_get_frontend(fd, &mut block)?;
                Response::Parameters(FrontendParameters::decode(&block.0))
            }
            Request::GetEvent => {
                let mut block = Block([0u8; FRONTEND_EVENT_SIZE]);
                raw::fe_get_event(fd, &mut block)?;
                Response::Event(FrontendEvent::decode(&block.0))
            }
            Request::SetPesFilter(params) => {
                let block = Block(params.encode());
                raw::dmx_set_pes_filter(fd, &block)?;
                Response::Done
            }
        }
    };
    Ok(response)
}

/// Frontends signal a pending event as priority data.
pub(crate) fn wait_event(file: &File, timeout: Duration) -> io::Result<bool> {
    let millis = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
    let timeout = PollTimeout::try_from(millis)
        .map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
    let mut fds = [PollFd::new(file.as_fd(), PollFlags::POLLPRI)];
    let ready = poll(&mut fds, timeout)?;
    Ok(ready > 0)
}

pub(crate) fn close(file: File) -> io::Result<()> {
    nix::unistd::close(file.into_raw_fd())?;
    Ok(())
}

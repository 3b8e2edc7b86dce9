//! Platform boundary: raw control-command encoding and handle lifecycle.

#[cfg(target_os = "linux")]
pub(crate) use self::linux::{close, ioctl, wait_event};
#[cfg(not(target_os = "linux"))]
pub(crate) use self::unsupported::{close, ioctl, wait_event};

#[cfg(target_os = "linux")]
mod linux;
#[cfg(not(target_os = "linux"))]
mod unsupported;

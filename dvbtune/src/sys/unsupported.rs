use std::fs::File;
use std::io::{self, ErrorKind};
use std::time::Duration;

use crate::control::{Request, Response};

const UNSUPPORTED_MSG: &str = "DVB device control is not supported on this platform (supported: Linux)";

pub(crate) fn ioctl(_file: &File, _request: &Request) -> io::Result<Response> {
    Err(io::Error::new(ErrorKind::Unsupported, UNSUPPORTED_MSG))
}

pub(crate) fn wait_event(_file: &File, _timeout: Duration) -> io::Result<bool> {
    Err(io::Error::new(ErrorKind::Unsupported, UNSUPPORTED_MSG))
}

pub(crate) fn close(file: File) -> io::Result<()> {
    drop(file);
    Ok(())
}

//! Device nodes and the handles opened on them.
//!
//! A tuning session is made of five handles onto three nodes of one adapter
//! directory: `frontend0` (read-write), `demux0` (opened once per filter,
//! read-write) and `dvr0` (read-only). Adapter component index 0 is assumed
//! for all of them.

use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, warn};

use crate::control::{Request, Response};
use crate::error::TunerError;
use crate::sys;

/// Access mode a node is opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

/// The device nodes a session opens under the adapter directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Frontend,
    Demux,
    Dvr,
}

impl Node {
    pub fn file_name(self) -> &'static str {
        match self {
            Node::Frontend => "frontend0",
            Node::Demux => "demux0",
            Node::Dvr => "dvr0",
        }
    }

    pub fn access(self) -> Access {
        match self {
            Node::Frontend | Node::Demux => Access::ReadWrite,
            Node::Dvr => Access::ReadOnly,
        }
    }

    pub fn path_in(self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }
}

/// An open OS handle onto a DVB device node.
pub trait DeviceHandle: Read {
    /// Issue a control command and block until the driver answers.
    fn ioctl(&mut self, request: &Request) -> io::Result<Response>;

    /// Wait up to `timeout` for a frontend event to be pending.
    /// Returns `Ok(false)` if none arrived in time.
    fn wait_event(&mut self, timeout: Duration) -> io::Result<bool>;

    /// Release the handle, reporting any error from the close itself.
    fn close(self) -> io::Result<()>;
}

/// Something that can open device nodes.
pub trait DeviceOpener {
    type Handle: DeviceHandle;

    fn open(&self, path: &Path, access: Access) -> io::Result<Self::Handle>;
}

/// Opens real character devices through the filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct DvbDevices;

impl DeviceOpener for DvbDevices {
    type Handle = DeviceFile;

    fn open(&self, path: &Path, access: Access) -> io::Result<DeviceFile> {
        let file = OpenOptions::new()
            .read(true)
            .write(access == Access::ReadWrite)
            .open(path)?;
        Ok(DeviceFile {
            file,
            path: path.to_path_buf(),
        })
    }
}

/// A device node opened by [`DvbDevices`].
#[derive(Debug)]
pub struct DeviceFile {
    file: File,
    path: PathBuf,
}

impl DeviceFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Read for DeviceFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl DeviceHandle for DeviceFile {
    fn ioctl(&mut self, request: &Request) -> io::Result<Response> {
        sys::ioctl(&self.file, request)
    }

    fn wait_event(&mut self, timeout: Duration) -> io::Result<bool> {
        sys::wait_event(&self.file, timeout)
    }

    fn close(self) -> io::Result<()> {
        sys::close(self.file)
    }
}

/// Open `node` under `dir`, mapping failures to [`TunerError::DeviceOpen`].
pub fn open_node<O: DeviceOpener>(
    opener: &O,
    dir: &Path,
    node: Node,
) -> Result<O::Handle, TunerError> {
    let path = node.path_in(dir);
    debug!("Opening {} ({:?})", path.display(), node.access());
    opener
        .open(&path, node.access())
        .map_err(|source| TunerError::DeviceOpen { path, source })
}

/// Close every handle, returning one message per handle that failed to close.
pub fn close_all<H, I>(handles: I) -> Vec<String>
where
    H: DeviceHandle,
    I: IntoIterator<Item = (&'static str, H)>,
{
    handles
        .into_iter()
        .filter_map(|(label, handle)| {
            handle
                .close()
                .err()
                .map(|e| format!("close {}: {}", label, e))
        })
        .collect()
}

/// Close handles left behind by a failed open sequence.
///
/// Returns `error` unchanged when every handle closed, otherwise wraps it in
/// [`TunerError::Rollback`] carrying the close failures.
pub fn rollback<H, I>(error: TunerError, handles: I) -> TunerError
where
    H: DeviceHandle,
    I: IntoIterator<Item = (&'static str, H)>,
{
    let failures = close_all(handles);
    for failure in &failures {
        warn!("Rollback: {}", failure);
    }
    error.with_rollback(failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimDriver;
    use std::fs;

    #[test]
    fn test_node_layout() {
        let dir = Path::new("/dev/dvb/adapter0");
        assert_eq!(
            Node::Frontend.path_in(dir),
            PathBuf::from("/dev/dvb/adapter0/frontend0")
        );
        assert_eq!(Node::Demux.access(), Access::ReadWrite);
        assert_eq!(Node::Dvr.access(), Access::ReadOnly);
    }

    #[test]
    fn test_open_missing_node() {
        let dir = tempfile::tempdir().unwrap();
        let err = open_node(&DvbDevices, dir.path(), Node::Frontend).unwrap_err();
        match err {
            TunerError::DeviceOpen { path, source } => {
                assert_eq!(path, dir.path().join("frontend0"));
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_regular_file_reads_and_closes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("dvr0"), b"\x47\x00\x31\x10").unwrap();

        let mut dvr = open_node(&DvbDevices, dir.path(), Node::Dvr).unwrap();
        assert_eq!(dvr.path(), dir.path().join("dvr0"));
        let mut buf = Vec::new();
        dvr.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"\x47\x00\x31\x10");
        dvr.close().unwrap();
    }

    #[test]
    fn test_rollback_reports_close_failures() {
        let driver = SimDriver::locking();
        let fe = driver.open_frontend();
        let dmx = driver.open_demux();
        driver.fail_close(1, 5);

        let cause = TunerError::TuneTimeout { requested: 1 };
        let err = rollback(cause, [("frontend0", fe), ("demux0 (video)", dmx)]);
        match err {
            TunerError::Rollback { source, failures } => {
                assert!(matches!(*source, TunerError::TuneTimeout { requested: 1 }));
                assert_eq!(failures.len(), 1);
                assert!(failures[0].starts_with("close demux0 (video)"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(driver.open_handles(), 0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_regular_file_rejects_control_commands() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("frontend0"), b"").unwrap();

        let mut fe = open_node(&DvbDevices, dir.path(), Node::Frontend).unwrap();
        let err = fe.ioctl(&Request::ReadStatus).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(nix::libc::ENOTTY));
        fe.close().unwrap();
    }
}

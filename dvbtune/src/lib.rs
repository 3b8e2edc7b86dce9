//! dvbtune library - ATSC tuner control for Linux DVB adapters.
//!
//! This library tunes the frontend of a DVB adapter to an 8-VSB carrier,
//! starts PES filters for a station's video, audio and data PIDs, and exposes
//! the filtered transport stream from the DVR node as a [`std::io::Read`].
//!
//! ```no_run
//! use std::io::Read;
//! use dvbtune::{Session, Station};
//!
//! let station = Station::new(569_000_000, 49, 51, 1);
//! let mut session = Session::open("/dev/dvb/adapter0", station)?;
//! let mut buf = [0u8; 188 * 64];
//! let n = session.read(&mut buf)?;
//! println!("read {} bytes", n);
//! session.close()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod control;
pub mod demux;
pub mod device;
pub mod error;
pub mod frontend;
pub mod params;
pub mod session;
pub mod station;
pub mod ts;

mod sys;

#[cfg(test)]
mod sim;

// Re-export commonly used types
pub use error::TunerError;
pub use frontend::SignalReport;
pub use params::{FeCaps, FeStatus, FrontendInfo, FrontendParameters};
pub use session::{open_session, Session, SessionConfig};
pub use station::Station;

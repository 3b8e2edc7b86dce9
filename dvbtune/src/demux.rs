//! Demux filter configuration.
//!
//! One demux instance is opened per content class and given a PES filter on
//! the station's PID for that class, routed from the frontend into the TS tap
//! with immediate start. Filters are configured in the order video, audio,
//! data; each one starts passing packets as soon as its own command succeeds.

use std::path::Path;

use log::debug;

use crate::control;
use crate::device::{self, open_node, DeviceOpener, Node};
use crate::error::TunerError;
use crate::frontend::TunedFrontend;
use crate::params::{PesFilterParams, PesType};
use crate::station::Station;

/// Content class of a demux filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentClass {
    Video,
    Audio,
    Data,
}

impl ContentClass {
    /// Configuration order.
    pub const ALL: [ContentClass; 3] = [ContentClass::Video, ContentClass::Audio, ContentClass::Data];

    pub fn pes_type(self) -> PesType {
        match self {
            ContentClass::Video => PesType::Video,
            ContentClass::Audio => PesType::Audio,
            ContentClass::Data => PesType::Teletext,
        }
    }

    /// Label of the demux handle carrying this class.
    pub fn handle_label(self) -> &'static str {
        match self {
            ContentClass::Video => "demux0 (video)",
            ContentClass::Audio => "demux0 (audio)",
            ContentClass::Data => "demux0 (data)",
        }
    }
}

/// The three demux handles of a session.
#[derive(Debug)]
pub struct Filters<H> {
    pub video: H,
    pub audio: H,
    pub data: H,
}

impl<H> Filters<H> {
    /// Handles in configuration order, labelled for error reporting.
    pub fn into_labeled(self) -> [(&'static str, H); 3] {
        [
            (ContentClass::Video.handle_label(), self.video),
            (ContentClass::Audio.handle_label(), self.audio),
            (ContentClass::Data.handle_label(), self.data),
        ]
    }
}

/// Open a demux instance and start a PES filter for `pid` on it.
/// The instance is closed again if the filter cannot be set.
pub fn open_filter<O: DeviceOpener>(
    opener: &O,
    dir: &Path,
    class: ContentClass,
    pid: u16,
) -> Result<O::Handle, TunerError> {
    let mut handle = open_node(opener, dir, Node::Demux)?;
    let params = PesFilterParams::ts_tap(pid, class.pes_type());
    debug!("Setting {:?} filter on PID 0x{:04X}", class, pid);

    match control::set_pes_filter(&mut handle, params) {
        Ok(()) => Ok(handle),
        Err(e) => Err(device::rollback(e, [(class.handle_label(), handle)])),
    }
}

/// Configure the video, audio and data filters for `station`.
///
/// On error, every demux handle opened by this call has been closed.
pub fn configure<O: DeviceOpener>(
    opener: &O,
    dir: &Path,
    frontend: &TunedFrontend<O::Handle>,
    station: &Station,
) -> Result<Filters<O::Handle>, TunerError> {
    debug!(
        "Configuring demux filters on {} (tuned to {} Hz)",
        dir.display(),
        frontend.event().parameters.frequency
    );

    let video = open_filter(opener, dir, ContentClass::Video, station.video)?;
    let audio = match open_filter(opener, dir, ContentClass::Audio, station.audio) {
        Ok(handle) => handle,
        Err(e) => {
            return Err(device::rollback(
                e,
                [(ContentClass::Video.handle_label(), video)],
            ));
        }
    };
    let data = match open_filter(opener, dir, ContentClass::Data, station.data) {
        Ok(handle) => handle,
        Err(e) => {
            return Err(device::rollback(
                e,
                [
                    (ContentClass::Video.handle_label(), video),
                    (ContentClass::Audio.handle_label(), audio),
                ],
            ));
        }
    };

    Ok(Filters { video, audio, data })
}

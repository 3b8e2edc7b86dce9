//! Broadcast station descriptors.

use std::fmt;

use serde::Deserialize;

use crate::demux::ContentClass;
use crate::params::MAX_PID;

/// A broadcast channel: carrier frequency plus the three packet identifiers
/// to extract from its multiplex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Station {
    /// Carrier frequency in Hz.
    pub frequency: u32,
    /// Video PID.
    pub video: u16,
    /// Audio PID.
    pub audio: u16,
    /// Auxiliary/data PID.
    pub data: u16,
}

impl Station {
    pub const fn new(frequency: u32, video: u16, audio: u16, data: u16) -> Self {
        Self {
            frequency,
            video,
            audio,
            data,
        }
    }

    /// The PID carried for `class`.
    pub fn pid(&self, class: ContentClass) -> u16 {
        match class {
            ContentClass::Video => self.video,
            ContentClass::Audio => self.audio,
            ContentClass::Data => self.data,
        }
    }

    /// First PID that does not fit in 13 bits, if any.
    pub fn invalid_pid(&self) -> Option<(ContentClass, u16)> {
        ContentClass::ALL
            .into_iter()
            .map(|class| (class, self.pid(class)))
            .find(|&(_, pid)| pid > MAX_PID)
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz (video=0x{:04X}, audio=0x{:04X}, data=0x{:04X})",
            self.frequency, self.video, self.audio, self.data
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pid_by_class() {
        let station = Station::new(569_000_000, 49, 51, 1);
        assert_eq!(station.pid(ContentClass::Video), 49);
        assert_eq!(station.pid(ContentClass::Audio), 51);
        assert_eq!(station.pid(ContentClass::Data), 1);
        assert_eq!(station.invalid_pid(), None);
    }

    #[test]
    fn test_invalid_pid() {
        let station = Station::new(177_000_000, 49, 0x2000, 3);
        assert_eq!(station.invalid_pid(), Some((ContentClass::Audio, 0x2000)));
    }

    #[test]
    fn test_deserialize() {
        let station: Station =
            toml::from_str("frequency = 177000000\nvideo = 49\naudio = 52\ndata = 3\n").unwrap();
        assert_eq!(station, Station::new(177_000_000, 49, 52, 3));
        assert_eq!(
            station.to_string(),
            "177000000 Hz (video=0x0031, audio=0x0034, data=0x0003)"
        );
    }
}

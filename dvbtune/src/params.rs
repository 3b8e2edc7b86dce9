//! Binary-layout value types for the DVB frontend and demux control commands.
//!
//! Every block here mirrors the Linux DVB v3 API layout (`linux/dvb/frontend.h`
//! and `linux/dvb/dmx.h`). Fields are native-endian, enums are 32 bits wide and
//! structs are 4-byte aligned. The layouts are written with [`bytes::BufMut`]
//! and read back with [`bytes::Buf`], so nothing outside [`crate::sys`] depends
//! on a platform header.
//!
//! ```text
//! dvb_frontend_parameters (36 bytes)
//! +-----------+-----------+-------------------------------+
//! | frequency | inversion | delivery union (7 x u32)      |
//! | u32 @0    | u32 @4    | vsb.modulation = u32 @8       |
//! +-----------+-----------+-------------------------------+
//!
//! dvb_frontend_event (40 bytes)
//! +-----------+-------------------------------------------+
//! | status    | dvb_frontend_parameters @4                |
//! +-----------+-------------------------------------------+
//!
//! dmx_pes_filter_params (20 bytes)
//! +--------+-----+----------+----------+----------+----------+
//! | pid    | pad | input    | output   | pes_type | flags    |
//! | u16 @0 |  @2 | u32 @4   | u32 @8   | u32 @12  | u32 @16  |
//! +--------+-----+----------+----------+----------+----------+
//! ```

use std::fmt;

use bytes::{Buf, BufMut};

/// Size of `struct dvb_frontend_parameters`.
pub const FRONTEND_PARAMETERS_SIZE: usize = 36;
/// Size of `struct dvb_frontend_event`.
pub const FRONTEND_EVENT_SIZE: usize = 40;
/// Size of `struct dvb_frontend_info`.
pub const FRONTEND_INFO_SIZE: usize = 168;
/// Size of `struct dmx_pes_filter_params`.
pub const PES_FILTER_PARAMS_SIZE: usize = 20;

/// Length of the NUL-padded device name in `struct dvb_frontend_info`.
const FRONTEND_NAME_LEN: usize = 128;

/// Largest valid 13-bit packet identifier.
pub const MAX_PID: u16 = 0x1FFF;

macro_rules! flag_set {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$fmeta:meta])* $flag:ident = $bit:expr,)* }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name(u32);

        impl $name {
            $($(#[$fmeta])* pub const $flag: $name = $name($bit);)*

            const NAMED: &'static [(&'static str, $name)] = &[$((stringify!($flag), $name::$flag)),*];

            /// Wrap raw driver bits. Unknown bits are preserved.
            pub const fn from_bits(bits: u32) -> Self {
                $name(bits)
            }

            /// Raw driver bits.
            pub const fn bits(self) -> u32 {
                self.0
            }

            /// True if every bit of `other` is set.
            pub const fn contains(self, other: $name) -> bool {
                self.0 & other.0 == other.0
            }

            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            /// Names of the set flags, in bit order.
            pub fn names(self) -> impl Iterator<Item = &'static str> {
                Self::NAMED
                    .iter()
                    .filter(move |(_, flag)| flag.0 != 0 && self.contains(*flag))
                    .map(|(name, _)| *name)
            }
        }

        impl std::ops::BitOr for $name {
            type Output = $name;

            fn bitor(self, rhs: $name) -> $name {
                $name(self.0 | rhs.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let names: Vec<&str> = self.names().collect();
                if names.is_empty() {
                    write!(f, "{:#x}", self.0)
                } else {
                    write!(f, "{}", names.join(" | "))
                }
            }
        }
    };
}

flag_set! {
    /// Frontend status bits (`fe_status_t`).
    FeStatus {
        /// Found something above the noise level.
        HAS_SIGNAL = 0x01,
        /// Found a DVB signal.
        HAS_CARRIER = 0x02,
        /// FEC is stable.
        HAS_VITERBI = 0x04,
        /// Found sync bytes.
        HAS_SYNC = 0x08,
        /// Everything's working.
        HAS_LOCK = 0x10,
        /// No lock within the driver's timeout.
        TIMEDOUT = 0x20,
        /// Frontend was reinitialized.
        REINIT = 0x40,
    }
}

impl FeStatus {
    pub fn has_lock(self) -> bool {
        self.contains(FeStatus::HAS_LOCK)
    }

    pub fn timed_out(self) -> bool {
        self.contains(FeStatus::TIMEDOUT)
    }
}

flag_set! {
    /// Frontend capability bits (`fe_caps_t`).
    FeCaps {
        IS_STUPID = 0x0,
        CAN_INVERSION_AUTO = 0x1,
        CAN_FEC_1_2 = 0x2,
        CAN_FEC_2_3 = 0x4,
        CAN_FEC_3_4 = 0x8,
        CAN_FEC_4_5 = 0x10,
        CAN_FEC_5_6 = 0x20,
        CAN_FEC_6_7 = 0x40,
        CAN_FEC_7_8 = 0x80,
        CAN_FEC_8_9 = 0x100,
        CAN_FEC_AUTO = 0x200,
        CAN_QPSK = 0x400,
        CAN_QAM_16 = 0x800,
        CAN_QAM_32 = 0x1000,
        CAN_QAM_64 = 0x2000,
        CAN_QAM_128 = 0x4000,
        CAN_QAM_256 = 0x8000,
        CAN_QAM_AUTO = 0x10000,
        CAN_TRANSMISSION_MODE_AUTO = 0x20000,
        CAN_BANDWIDTH_AUTO = 0x40000,
        CAN_GUARD_INTERVAL_AUTO = 0x80000,
        CAN_HIERARCHY_AUTO = 0x100000,
        CAN_8VSB = 0x200000,
        CAN_16VSB = 0x400000,
        HAS_EXTENDED_CAPS = 0x800000,
        CAN_MULTISTREAM = 0x4000000,
        CAN_TURBO_FEC = 0x8000000,
        CAN_2G_MODULATION = 0x10000000,
        NEEDS_BENDING = 0x20000000,
        CAN_RECOVER = 0x40000000,
        CAN_MUTE_TS = 0x80000000,
    }
}

impl FeCaps {
    /// A frontend with no capability bits at all.
    pub fn is_stupid(self) -> bool {
        self.is_empty()
    }
}

flag_set! {
    /// Demux filter flags.
    FilterFlags {
        CHECK_CRC = 0x1,
        ONESHOT = 0x2,
        /// Start filtering as soon as the filter is set.
        IMMEDIATE_START = 0x4,
    }
}

/// Frontend delivery type (`fe_type_t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeType {
    Qpsk,
    Qam,
    Ofdm,
    Atsc,
    Unknown(u32),
}

impl From<u32> for FeType {
    fn from(value: u32) -> Self {
        match value {
            0 => FeType::Qpsk,
            1 => FeType::Qam,
            2 => FeType::Ofdm,
            3 => FeType::Atsc,
            other => FeType::Unknown(other),
        }
    }
}

impl fmt::Display for FeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeType::Qpsk => f.write_str("QPSK (DVB-S)"),
            FeType::Qam => f.write_str("QAM (DVB-C)"),
            FeType::Ofdm => f.write_str("OFDM (DVB-T)"),
            FeType::Atsc => f.write_str("ATSC"),
            FeType::Unknown(raw) => write!(f, "unknown ({})", raw),
        }
    }
}

/// Spectral inversion (`fe_spectral_inversion_t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectralInversion {
    Off,
    On,
    Auto,
    Unknown(u32),
}

impl From<u32> for SpectralInversion {
    fn from(value: u32) -> Self {
        match value {
            0 => SpectralInversion::Off,
            1 => SpectralInversion::On,
            2 => SpectralInversion::Auto,
            other => SpectralInversion::Unknown(other),
        }
    }
}

impl From<SpectralInversion> for u32 {
    fn from(value: SpectralInversion) -> Self {
        match value {
            SpectralInversion::Off => 0,
            SpectralInversion::On => 1,
            SpectralInversion::Auto => 2,
            SpectralInversion::Unknown(raw) => raw,
        }
    }
}

/// Modulation (`fe_modulation_t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modulation {
    Qpsk,
    Qam16,
    Qam32,
    Qam64,
    Qam128,
    Qam256,
    QamAuto,
    Vsb8,
    Vsb16,
    Unknown(u32),
}

impl From<u32> for Modulation {
    fn from(value: u32) -> Self {
        match value {
            0 => Modulation::Qpsk,
            1 => Modulation::Qam16,
            2 => Modulation::Qam32,
            3 => Modulation::Qam64,
            4 => Modulation::Qam128,
            5 => Modulation::Qam256,
            6 => Modulation::QamAuto,
            7 => Modulation::Vsb8,
            8 => Modulation::Vsb16,
            other => Modulation::Unknown(other),
        }
    }
}

impl From<Modulation> for u32 {
    fn from(value: Modulation) -> Self {
        match value {
            Modulation::Qpsk => 0,
            Modulation::Qam16 => 1,
            Modulation::Qam32 => 2,
            Modulation::Qam64 => 3,
            Modulation::Qam128 => 4,
            Modulation::Qam256 => 5,
            Modulation::QamAuto => 6,
            Modulation::Vsb8 => 7,
            Modulation::Vsb16 => 8,
            Modulation::Unknown(raw) => raw,
        }
    }
}

/// Tuning parameters for an ATSC (VSB) frontend.
///
/// Only the VSB arm of the delivery union is modelled; the remaining union
/// words are written as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontendParameters {
    /// Carrier frequency in Hz.
    pub frequency: u32,
    pub inversion: SpectralInversion,
    pub modulation: Modulation,
}

impl FrontendParameters {
    /// 8-VSB with automatic spectral inversion, the only scheme this crate tunes.
    pub fn vsb8(frequency: u32) -> Self {
        Self {
            frequency,
            inversion: SpectralInversion::Auto,
            modulation: Modulation::Vsb8,
        }
    }

    fn put<B: BufMut>(&self, out: &mut B) {
        out.put_u32_ne(self.frequency);
        out.put_u32_ne(self.inversion.into());
        out.put_u32_ne(self.modulation.into());
        // symbol_rate/fec words of the other union arms
        out.put_bytes(0, FRONTEND_PARAMETERS_SIZE - 12);
    }

    fn get<B: Buf>(input: &mut B) -> Self {
        let frequency = input.get_u32_ne();
        let inversion = SpectralInversion::from(input.get_u32_ne());
        let modulation = Modulation::from(input.get_u32_ne());
        input.advance(FRONTEND_PARAMETERS_SIZE - 12);
        Self {
            frequency,
            inversion,
            modulation,
        }
    }

    pub fn encode(&self) -> [u8; FRONTEND_PARAMETERS_SIZE] {
        let mut buf = [0u8; FRONTEND_PARAMETERS_SIZE];
        self.put(&mut &mut buf[..]);
        buf
    }

    pub fn decode(buf: &[u8; FRONTEND_PARAMETERS_SIZE]) -> Self {
        Self::get(&mut &buf[..])
    }
}

/// Result of a blocking frontend event wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontendEvent {
    pub status: FeStatus,
    /// Parameters the driver actually settled on.
    pub parameters: FrontendParameters,
}

impl FrontendEvent {
    pub fn encode(&self) -> [u8; FRONTEND_EVENT_SIZE] {
        let mut buf = [0u8; FRONTEND_EVENT_SIZE];
        let mut out = &mut buf[..];
        out.put_u32_ne(self.status.bits());
        self.parameters.put(&mut out);
        buf
    }

    pub fn decode(buf: &[u8; FRONTEND_EVENT_SIZE]) -> Self {
        let mut input = &buf[..];
        let status = FeStatus::from_bits(input.get_u32_ne());
        Self {
            status,
            parameters: FrontendParameters::get(&mut input),
        }
    }
}

/// Frontend description returned by get-info.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontendInfo {
    pub name: String,
    pub fe_type: FeType,
    pub frequency_min: u32,
    pub frequency_max: u32,
    pub frequency_stepsize: u32,
    pub frequency_tolerance: u32,
    pub symbol_rate_min: u32,
    pub symbol_rate_max: u32,
    pub symbol_rate_tolerance: u32,
    pub notifier_delay: u32,
    pub caps: FeCaps,
}

impl FrontendInfo {
    /// Number of tuning steps between the minimum and maximum frequency.
    pub fn steps(&self) -> u32 {
        match self.frequency_stepsize {
            0 => 0,
            step => self.frequency_max.saturating_sub(self.frequency_min) / step,
        }
    }

    pub fn encode(&self) -> [u8; FRONTEND_INFO_SIZE] {
        let mut buf = [0u8; FRONTEND_INFO_SIZE];
        let mut out = &mut buf[..];
        let name = self.name.as_bytes();
        let len = name.len().min(FRONTEND_NAME_LEN - 1);
        out.put_slice(&name[..len]);
        out.put_bytes(0, FRONTEND_NAME_LEN - len);
        let fe_type = match self.fe_type {
            FeType::Qpsk => 0,
            FeType::Qam => 1,
            FeType::Ofdm => 2,
            FeType::Atsc => 3,
            FeType::Unknown(raw) => raw,
        };
        let words = [
            fe_type,
            self.frequency_min,
            self.frequency_max,
            self.frequency_stepsize,
            self.frequency_tolerance,
            self.symbol_rate_min,
            self.symbol_rate_max,
            self.symbol_rate_tolerance,
            self.notifier_delay,
            self.caps.bits(),
        ];
        for word in words {
            out.put_u32_ne(word);
        }
        buf
    }

    pub fn decode(buf: &[u8; FRONTEND_INFO_SIZE]) -> Self {
        let mut input = &buf[..];
        let raw_name = &input[..FRONTEND_NAME_LEN];
        let end = raw_name.iter().position(|&b| b == 0).unwrap_or(FRONTEND_NAME_LEN);
        let name = String::from_utf8_lossy(&raw_name[..end]).into_owned();
        input.advance(FRONTEND_NAME_LEN);
        Self {
            name,
            fe_type: FeType::from(input.get_u32_ne()),
            frequency_min: input.get_u32_ne(),
            frequency_max: input.get_u32_ne(),
            frequency_stepsize: input.get_u32_ne(),
            frequency_tolerance: input.get_u32_ne(),
            symbol_rate_min: input.get_u32_ne(),
            symbol_rate_max: input.get_u32_ne(),
            symbol_rate_tolerance: input.get_u32_ne(),
            notifier_delay: input.get_u32_ne(),
            caps: FeCaps::from_bits(input.get_u32_ne()),
        }
    }
}

impl fmt::Display for FrontendInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Device name: {}", self.name)?;
        writeln!(f, "Type: {}", self.fe_type)?;
        writeln!(f, "Min Freq: {}", self.frequency_min)?;
        writeln!(f, "Max Freq: {}", self.frequency_max)?;
        writeln!(
            f,
            "Stepsize: {} ({} steps)",
            self.frequency_stepsize,
            self.steps()
        )?;
        write!(f, "Capabilities: {:#x} ({})", self.caps.bits(), self.caps)
    }
}

/// Demux input (`dmx_input_t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum DmxInput {
    Frontend = 0,
    Dvr = 1,
}

/// Demux output (`dmx_output_t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum DmxOutput {
    Decoder = 0,
    Tap = 1,
    /// Filtered packets go to the DVR device.
    TsTap = 2,
    TsDemuxTap = 3,
}

/// PES content class (`dmx_pes_type_t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PesType {
    Audio = 0,
    Video = 1,
    Teletext = 2,
    Subtitle = 3,
    Pcr = 4,
    Other = 20,
}

impl PesType {
    fn from_raw(value: u32) -> Option<Self> {
        Some(match value {
            0 => PesType::Audio,
            1 => PesType::Video,
            2 => PesType::Teletext,
            3 => PesType::Subtitle,
            4 => PesType::Pcr,
            20 => PesType::Other,
            _ => return None,
        })
    }
}

/// Parameters for a PES filter on one demux instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PesFilterParams {
    pub pid: u16,
    pub input: DmxInput,
    pub output: DmxOutput,
    pub pes_type: PesType,
    pub flags: FilterFlags,
}

impl PesFilterParams {
    /// Frontend input into the TS tap, started immediately.
    pub fn ts_tap(pid: u16, pes_type: PesType) -> Self {
        Self {
            pid,
            input: DmxInput::Frontend,
            output: DmxOutput::TsTap,
            pes_type,
            flags: FilterFlags::IMMEDIATE_START,
        }
    }

    pub fn encode(&self) -> [u8; PES_FILTER_PARAMS_SIZE] {
        let mut buf = [0u8; PES_FILTER_PARAMS_SIZE];
        let mut out = &mut buf[..];
        out.put_u16_ne(self.pid);
        // alignment padding before the first enum
        out.put_bytes(0, 2);
        out.put_u32_ne(self.input as u32);
        out.put_u32_ne(self.output as u32);
        out.put_u32_ne(self.pes_type as u32);
        out.put_u32_ne(self.flags.bits());
        buf
    }

    /// Decode a filter block. Returns `None` for enum values this crate does not know.
    pub fn decode(buf: &[u8; PES_FILTER_PARAMS_SIZE]) -> Option<Self> {
        let mut raw = &buf[..];
        let pid = raw.get_u16_ne();
        raw.advance(2);
        let input = match raw.get_u32_ne() {
            0 => DmxInput::Frontend,
            1 => DmxInput::Dvr,
            _ => return None,
        };
        let output = match raw.get_u32_ne() {
            0 => DmxOutput::Decoder,
            1 => DmxOutput::Tap,
            2 => DmxOutput::TsTap,
            3 => DmxOutput::TsDemuxTap,
            _ => return None,
        };
        Some(Self {
            pid,
            input,
            output,
            pes_type: PesType::from_raw(raw.get_u32_ne())?,
            flags: FilterFlags::from_bits(raw.get_u32_ne()),
        })
    }
}

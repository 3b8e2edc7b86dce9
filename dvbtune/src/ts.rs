//! MPEG-TS packet headers.
//!
//! A session delivers raw transport stream with no alignment guarantees; this
//! module finds 188-byte packets in it and tallies them by PID.

use std::collections::BTreeMap;

/// TS packet size in bytes.
pub const TS_PACKET_SIZE: usize = 188;

/// TS sync byte (0x47).
pub const SYNC_BYTE: u8 = 0x47;

/// PID of null (stuffing) packets.
pub const NULL_PID: u16 = 0x1FFF;

/// Parsed TS packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TsHeader {
    /// Transport error indicator.
    pub transport_error: bool,
    /// Packet Identifier (13 bits).
    pub pid: u16,
    /// Transport scrambling control (2 bits).
    pub scrambling_control: u8,
    /// Adaptation field control (2 bits).
    pub adaptation_field_control: u8,
    /// Continuity counter (4 bits).
    pub continuity_counter: u8,
}

impl TsHeader {
    /// Parse the 4-byte header at the start of a packet.
    pub fn parse(data: &[u8]) -> Result<Self, &'static str> {
        if data.len() < 4 {
            return Err("Packet too short");
        }
        if data[0] != SYNC_BYTE {
            return Err("Invalid sync byte");
        }

        Ok(TsHeader {
            transport_error: data[1] & 0x80 != 0,
            pid: ((data[1] as u16 & 0x1F) << 8) | data[2] as u16,
            scrambling_control: (data[3] >> 6) & 0x03,
            adaptation_field_control: (data[3] >> 4) & 0x03,
            continuity_counter: data[3] & 0x0F,
        })
    }

    /// Check if packet has payload.
    pub fn has_payload(&self) -> bool {
        self.adaptation_field_control & 0x01 != 0
    }

    /// Check if packet is scrambled.
    pub fn is_scrambled(&self) -> bool {
        self.scrambling_control != 0
    }
}

/// Iterator over packet headers in a byte slice, resynchronizing on the sync byte.
pub struct TsHeaderIterator<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> TsHeaderIterator<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        let offset = data.iter().position(|&b| b == SYNC_BYTE).unwrap_or(data.len());
        Self { data, offset }
    }

    /// Offset of the first byte not yet consumed as part of a whole packet.
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn resync(&mut self) {
        self.offset += 1;
        while self.offset < self.data.len() && self.data[self.offset] != SYNC_BYTE {
            self.offset += 1;
        }
    }
}

impl<'a> Iterator for TsHeaderIterator<'a> {
    type Item = TsHeader;

    fn next(&mut self) -> Option<Self::Item> {
        while self.offset + TS_PACKET_SIZE <= self.data.len() {
            // Require the next packet to start with a sync byte too, when it is present.
            let next = self.offset + TS_PACKET_SIZE;
            if next < self.data.len() && self.data[next] != SYNC_BYTE {
                self.resync();
                continue;
            }
            match TsHeader::parse(&self.data[self.offset..]) {
                Ok(header) => {
                    self.offset = next;
                    return Some(header);
                }
                Err(_) => self.resync(),
            }
        }
        None
    }
}

/// Counts packets per PID over a stream delivered in arbitrary chunks.
#[derive(Debug, Default)]
pub struct PidCounter {
    pending: Vec<u8>,
    counts: BTreeMap<u16, u64>,
    transport_errors: u64,
    scrambled: u64,
    discontinuities: u64,
    last_cc: BTreeMap<u16, u8>,
}

impl PidCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk. A trailing partial packet is kept for the next call.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);

        let mut headers = TsHeaderIterator::new(&self.pending);
        for header in headers.by_ref() {
            *self.counts.entry(header.pid).or_insert(0) += 1;
            if header.transport_error {
                self.transport_errors += 1;
            }
            if header.is_scrambled() {
                self.scrambled += 1;
            }
            // The counter only advances on packets with payload; one duplicate is allowed.
            if header.has_payload() && header.pid != NULL_PID {
                let cc = header.continuity_counter;
                if let Some(last) = self.last_cc.insert(header.pid, cc) {
                    if cc != last && cc != (last + 1) & 0x0F {
                        self.discontinuities += 1;
                    }
                }
            }
        }
        let consumed = headers.offset();
        self.pending.drain(..consumed);
    }

    pub fn count(&self, pid: u16) -> u64 {
        self.counts.get(&pid).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn transport_errors(&self) -> u64 {
        self.transport_errors
    }

    /// Packets with a non-zero scrambling control field.
    pub fn scrambled(&self) -> u64 {
        self.scrambled
    }

    /// Continuity counter jumps, i.e. lost packets.
    pub fn discontinuities(&self) -> u64 {
        self.discontinuities
    }

    /// Packet counts in PID order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, u64)> + '_ {
        self.counts.iter().map(|(&pid, &count)| (pid, count))
    }
}

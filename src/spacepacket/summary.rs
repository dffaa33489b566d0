use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{missing_packets, Apid, Packet, PrimaryHeader};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ApidSummary {
    pub count: usize,
    pub bytes: usize,
    pub missing: usize,
}

/// Tracks stats on packet iteration.
///
/// # Example
/// ```
/// use ccsds_link::spacepacket::{Packet, read_packets, Summary};
/// let dat: &[u8] = &[0xd, 0x59, 0xc0, 0x01, 0x0, 0x8, 0x52, 0xc0, 0x0, 0x0, 0x0, 0xa7, 0x0, 0xdb, 0xff];
///
/// let mut summary = Summary::default();
/// let packets: Vec<Packet> = read_packets(dat)
///     .filter_map(Result::ok)
///     .inspect(|p| {
///         summary.add(p);
///     })
///     .collect();
/// ```
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub count: usize,
    pub bytes: usize,
    pub missing: usize,
    pub apids: HashMap<Apid, ApidSummary>,

    seen_headers: HashMap<Apid, PrimaryHeader>,
}

impl Summary {
    pub fn add(&mut self, packet: &Packet) {
        self.count += 1;
        self.bytes += packet.data.len();

        let hdr = packet.header;
        let apid = self.apids.entry(hdr.apid).or_default();
        apid.count += 1;
        apid.bytes += packet.data.len();

        if let Some(last_hdr) = self.seen_headers.get(&hdr.apid) {
            let missing = missing_packets(hdr.sequence_id, last_hdr.sequence_id) as usize;
            apid.missing += missing;
            self.missing += missing;
        }
        self.seen_headers.insert(hdr.apid, hdr);
    }
}

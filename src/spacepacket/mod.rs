use std::fmt::Display;
use std::io::{Read, Result as IOResult};

use hifitime::Epoch;
use serde::{Deserialize, Serialize};

use crate::crc::crc32c;
use crate::error::{Error, Result};
use crate::profile::Profile;
use crate::timecode;

pub type Apid = u16;

/// Decodes a UTC time in microseconds from a packet.
pub trait TimeDecoder {
    fn decode_time(&self, pkt: &Packet) -> std::result::Result<Epoch, Error>;
}

/// ``TimeDecoder`` for the CCSDS Day Segmented timecode with no P-field and 2 bytes
/// of submilliseconds. (See [`Time Code Formats`])
///
/// [`Time Code Formats`]: https://public.ccsds.org/Pubs/301x0b4e1.pdf
pub struct CdsTimeDecoder {
    format: timecode::Format,
    offset: usize,
}

impl Default for CdsTimeDecoder {
    fn default() -> Self {
        Self {
            format: timecode::Format::Cds {
                num_day: 2,
                num_submillis: 2,
            },
            offset: 0,
        }
    }
}

impl TimeDecoder for CdsTimeDecoder {
    fn decode_time(&self, pkt: &Packet) -> std::result::Result<Epoch, Error> {
        Ok(
            timecode::decode(&self.format, &pkt.data[PrimaryHeader::LEN + self.offset..])?
                .epoch()?,
        )
    }
}

/// Packet represents a single CCSDS space packet and its associated data.
///
/// This packet contains the primary header data as well as the user data,
/// which may or may not contain a secondary header. See the header's
/// `has_secondary_header` flag.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Packet {
    /// All packets have a primary header
    pub header: PrimaryHeader,
    /// All packet bytes, including header and user data
    pub data: Vec<u8>,

    offset: usize,
}

impl Display for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Packet{{header: {:?}, data:[len={}]}}",
            self.header,
            self.data.len()
        )?;
        Ok(())
    }
}

impl Packet {
    #[must_use]
    pub fn is_first(&self) -> bool {
        self.header.sequence_flags == SEQ_FIRST
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        self.header.sequence_flags == SEQ_LAST
    }

    #[must_use]
    pub fn is_cont(&self) -> bool {
        self.header.sequence_flags == SEQ_CONTINUATION
    }

    #[must_use]
    pub fn is_standalone(&self) -> bool {
        self.header.sequence_flags == SEQ_UNSEGMENTED
    }

    /// Decode from bytes. Returns `None` if there are not enough bytes to construct the
    /// header or if there are not enough bytes to construct the [Packet] of the length
    /// indicated by the header.
    #[must_use]
    pub fn decode(dat: &[u8]) -> Option<Packet> {
        match PrimaryHeader::decode(dat) {
            Some(header) => {
                if dat.len() < header.len_minus1 as usize + 1 + PrimaryHeader::LEN {
                    None
                } else {
                    Some(Packet {
                        header,
                        data: dat.to_vec(),
                        offset: 0,
                    })
                }
            }
            None => None,
        }
    }

    /// Read a single [Packet].
    ///
    /// # Errors
    /// Any ``std::io::Error`` reading
    #[allow(clippy::missing_panics_doc)]
    pub fn read<R>(mut r: R) -> IOResult<Packet>
    where
        R: Read + Send,
    {
        let mut hdr = [0u8; PrimaryHeader::LEN];
        r.read_exact(&mut hdr)?;
        // we know there are enough bytes because we just read them
        let ph = PrimaryHeader::decode(&hdr).unwrap();
        let data_len = ph.len_minus1 as usize + 1;
        let mut buf = vec![0u8; PrimaryHeader::LEN + data_len];
        buf[..PrimaryHeader::LEN].copy_from_slice(&hdr);
        r.read_exact(&mut buf[PrimaryHeader::LEN..])?;

        Ok(Packet {
            header: ph,
            data: buf,
            offset: 0,
        })
    }

    /// The data field, i.e., everything after the primary header: secondary
    /// header (if any), user data, and MIC trailer (if any).
    #[must_use]
    pub fn data_field(&self) -> &[u8] {
        &self.data[PrimaryHeader::LEN..]
    }
}

/// Packet is the first packet in a packet group
pub const SEQ_FIRST: u8 = 1;
/// Packet is a part of a packet group, but not first and not last
pub const SEQ_CONTINUATION: u8 = 0;
/// Packet is the last packet in a packet group
pub const SEQ_LAST: u8 = 2;
/// Packet is not part of a packet group, i.e., standalone.
pub const SEQ_UNSEGMENTED: u8 = 3;

/// CCSDS Primary Header
///
/// The primary header format is common to all CCSDS space packets.
#[derive(Serialize, Deserialize, Debug, Copy, Clone)]
pub struct PrimaryHeader {
    pub version: u8,
    pub type_flag: u8,
    pub has_secondary_header: bool,
    pub apid: Apid,
    /// Defines a packet's grouping. See the `SEQ_*` values.
    pub sequence_flags: u8,
    pub sequence_id: u16,
    pub len_minus1: u16,
}

impl PrimaryHeader {
    /// Size of a ``PrimaryHeader``
    pub const LEN: usize = 6;
    pub const SEQ_MAX: u16 = 16383;

    /// Read header from `r`.
    ///
    /// # Errors
    /// Any ``std::io::Error`` reading
    #[allow(clippy::missing_panics_doc)]
    pub fn read<R>(mut r: R) -> IOResult<PrimaryHeader>
    where
        R: Read + Send,
    {
        let mut buf = [0u8; Self::LEN];
        r.read_exact(&mut buf)?;

        // Can't panic because of read_exact
        Ok(Self::decode(&buf).unwrap())
    }

    /// Decode from bytes. Returns `None` if there are not enough bytes to construct the
    /// header.
    #[must_use]
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::LEN {
            return None;
        }
        let d1 = u16::from_be_bytes([buf[0], buf[1]]);
        let d2 = u16::from_be_bytes([buf[2], buf[3]]);
        let d3 = u16::from_be_bytes([buf[4], buf[5]]);

        Some(PrimaryHeader {
            version: (d1 >> 13 & 0x7) as u8,
            type_flag: (d1 >> 12 & 0x1) as u8,
            has_secondary_header: (d1 >> 11 & 0x1) == 1,
            apid: (d1 & 0x7ff),
            sequence_flags: (d2 >> 14 & 0x3) as u8,
            sequence_id: (d2 & 0x3fff),
            len_minus1: d3,
        })
    }

    /// Encode to the 6-byte wire form.
    #[must_use]
    pub fn encode(&self) -> [u8; Self::LEN] {
        let d1 = (u16::from(self.version) << 13)
            | (u16::from(self.type_flag) << 12)
            | (u16::from(self.has_secondary_header) << 11)
            | (self.apid & 0x7ff);
        let d2 = (u16::from(self.sequence_flags) << 14) | (self.sequence_id & 0x3fff);
        let d3 = self.len_minus1;
        let mut out = [0u8; Self::LEN];
        out[0..2].copy_from_slice(&d1.to_be_bytes());
        out[2..4].copy_from_slice(&d2.to_be_bytes());
        out[4..6].copy_from_slice(&d3.to_be_bytes());
        out
    }
}

/// Calculate the number of missing sequence ids.
///
/// `cur` is the current sequence id. `last` is the sequence id seen before `cur`.
#[must_use]
pub fn missing_packets(cur: u16, last: u16) -> u16 {
    let expected = if last + 1 > PrimaryHeader::SEQ_MAX {
        0
    } else {
        last + 1
    };
    if cur != expected {
        if last + 1 > cur {
            return cur + PrimaryHeader::SEQ_MAX - last;
        }
        return cur - last - 1;
    }
    0
}

/// Outcome of MIC validation during [`parse`], per spec.md §9's five-state
/// reporting contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicStatus {
    /// MIC checked and matched.
    Ok,
    /// MIC checked and did not match.
    Bad,
    /// No MIC was present and none was expected.
    None,
    /// A MIC was expected but the packet was too short to hold one.
    Short,
    /// MIC checking was disabled for this call.
    Off,
}

/// Whether [`parse`] should look for and validate a trailing MIC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicMode {
    /// Validate a MIC if `profile.use_mic` says to.
    Auto,
    /// Always validate a MIC, regardless of profile.
    On,
    /// Never validate a MIC.
    Off,
}

/// The result of [`parse`]ing a packet against a [`Profile`].
#[derive(Debug, Clone)]
pub struct ParsedPacket {
    pub header: PrimaryHeader,
    pub sec_hdr: Vec<u8>,
    pub user: Vec<u8>,
    pub mic_status: MicStatus,
}

/// Build a packet from `user_bytes` according to `profile`: primary header,
/// secondary header (if configured), user bytes padded/truncated to fill
/// `data_field_len`, and a trailing CRC-32C MIC if `profile.use_mic`.
///
/// `unix_nanos` is forwarded to [`crate::profile::SecHdrMode::encode`] for
/// time-bearing secondary header modes.
///
/// # Errors
/// [`Error::ConfigurationError`] if the profile fails [`Profile::validate`].
pub fn encode(profile: &Profile, user_bytes: &[u8], seq: u16, unix_nanos: u64) -> Result<Vec<u8>> {
    profile.validate().map_err(|_| {
        Error::ConfigurationError(format!("invalid profile {}", profile.name))
    })?;

    let sec_hdr = profile.sec_hdr.encode(unix_nanos)?;
    let mic_len = usize::from(profile.use_mic) * 4;
    let user_region_len = profile.data_field_len as usize - sec_hdr.len() - mic_len;

    let mut user = user_bytes.to_vec();
    if user.len() < user_region_len {
        user.resize(user_region_len, profile.pad_byte);
    } else {
        user.truncate(user_region_len);
    }

    let mut data_field = Vec::with_capacity(profile.data_field_len as usize);
    data_field.extend_from_slice(&sec_hdr);
    data_field.extend_from_slice(&user);
    if profile.use_mic {
        let digest = crc32c(&user);
        data_field.extend_from_slice(&digest.to_be_bytes());
    }

    let header = PrimaryHeader {
        version: 0,
        type_flag: match profile.packet_type {
            crate::profile::PacketType::Tm => 0,
            crate::profile::PacketType::Tc => 1,
        },
        has_secondary_header: !profile.sec_hdr.is_empty(),
        apid: profile.apid,
        sequence_flags: SEQ_UNSEGMENTED,
        sequence_id: seq & 0x3fff,
        len_minus1: (data_field.len() - 1) as u16,
    };

    let mut out = Vec::with_capacity(PrimaryHeader::LEN + data_field.len());
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(&data_field);
    Ok(out)
}

/// Parse a packet's bytes against `profile`, separating the secondary
/// header, user bytes, and (if applicable) validating the trailing MIC.
///
/// # Errors
/// [`Error::NotEnoughData`] if `dat` is shorter than the primary header or
/// shorter than the header declares, or [`Error::MalformedHeader`] if `dat`
/// does not decode as a primary header at all.
pub fn parse(profile: &Profile, dat: &[u8], mic_mode: MicMode) -> Result<ParsedPacket> {
    let header = PrimaryHeader::decode(dat)
        .ok_or_else(|| Error::MalformedHeader("not enough bytes for primary header".into()))?;
    let total_len = PrimaryHeader::LEN + header.len_minus1 as usize + 1;
    if dat.len() < total_len {
        return Err(Error::NotEnoughData {
            actual: dat.len(),
            minimum: total_len,
        });
    }
    let data_field = &dat[PrimaryHeader::LEN..total_len];
    let sec_hdr_len = profile.sec_hdr.len();
    if data_field.len() < sec_hdr_len {
        return Err(Error::NotEnoughData {
            actual: data_field.len(),
            minimum: sec_hdr_len,
        });
    }
    let sec_hdr = data_field[..sec_hdr_len].to_vec();
    let rest = &data_field[sec_hdr_len..];

    if mic_mode == MicMode::Off {
        return Ok(ParsedPacket {
            header,
            sec_hdr,
            user: rest.to_vec(),
            mic_status: MicStatus::Off,
        });
    }

    if rest.len() < 4 {
        return Ok(ParsedPacket {
            header,
            sec_hdr,
            user: rest.to_vec(),
            mic_status: MicStatus::Short,
        });
    }

    let (user, mic_bytes) = rest.split_at(rest.len() - 4);
    let want = u32::from_be_bytes(mic_bytes.try_into().unwrap());
    let got = crc32c(user);
    let matches = want == got;

    // "auto": detect by content — a match means the trailing 4 bytes were a
    // MIC and get stripped; a mismatch means they were ordinary user data
    // and nothing is stripped. "on": the trailing 4 bytes are always a MIC,
    // so a mismatch is reported as BAD rather than reinterpreted.
    match mic_mode {
        MicMode::Auto if matches => Ok(ParsedPacket {
            header,
            sec_hdr,
            user: user.to_vec(),
            mic_status: MicStatus::Ok,
        }),
        MicMode::Auto => Ok(ParsedPacket {
            header,
            sec_hdr,
            user: rest.to_vec(),
            mic_status: MicStatus::None,
        }),
        MicMode::On => Ok(ParsedPacket {
            header,
            sec_hdr,
            user: user.to_vec(),
            mic_status: if matches { MicStatus::Ok } else { MicStatus::Bad },
        }),
        MicMode::Off => unreachable!(),
    }
}

pub struct PacketReaderIter<R>
where
    R: Read + Send,
{
    pub reader: R,
    pub offset: usize,
}

impl<R> PacketReaderIter<R>
where
    R: Read + Send,
{
    fn new(reader: R) -> Self {
        PacketReaderIter { reader, offset: 0 }
    }
}

impl<R> Iterator for PacketReaderIter<R>
where
    R: Read + Send,
{
    type Item = IOResult<Packet>;

    fn next(&mut self) -> Option<Self::Item> {
        match Packet::read(&mut self.reader) {
            Ok(mut p) => {
                p.offset = self.offset;
                self.offset += PrimaryHeader::LEN + p.header.len_minus1 as usize + 1;
                Some(Ok(p))
            }
            Err(err) => {
                if err.kind() == std::io::ErrorKind::UnexpectedEof {
                    return None;
                }
                Some(Err(err))
            }
        }
    }
}

/// Packet data representing a CCSDS packet group according to the packet
/// sequencing value in the primary header.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PacketGroup {
    pub apid: Apid,
    pub packets: Vec<Packet>,
}

impl PacketGroup {
    /// Return true if this packet group is complete.
    ///
    /// Complete means at least 1 packet and all the packets for a complete group with no
    /// missing packets.
    #[allow(clippy::missing_panics_doc)]
    #[must_use]
    pub fn complete(&self) -> bool {
        if self.packets.is_empty() {
            false
        } else if self.packets.len() == 1 {
            self.packets[0].is_standalone()
        } else {
            self.packets[0].is_first()
                && self.packets.last().unwrap().is_last()
                && !self.have_missing()
        }
    }

    #[must_use]
    pub fn have_missing(&self) -> bool {
        for (a, b) in self.packets.iter().zip(self.packets[1..].iter()) {
            if missing_packets(b.header.sequence_id, a.header.sequence_id) > 0 {
                return true;
            }
        }
        false
    }
}

struct PacketGroupIter<I>
where
    I: Iterator<Item = Packet> + Send,
{
    packets: I,
    cached: Option<Packet>,
    done: bool,
}

impl<I> PacketGroupIter<I>
where
    I: Iterator<Item = Packet> + Send,
{
    /// Create an iterator that sources packets directly from the provided vanilla
    /// iterator.
    ///
    /// Results generated by the iterator will always be `Ok`.
    fn with_packets(packets: I) -> Self {
        PacketGroupIter {
            packets,
            cached: None,
            done: false,
        }
    }
}

impl<I> Iterator for PacketGroupIter<I>
where
    I: Iterator<Item = Packet> + Send,
{
    type Item = IOResult<PacketGroup>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            // only happens when we finish with a packet left in the cache
            return None;
        }

        let mut group: Option<PacketGroup> = None;
        loop {
            // Get packet from cache first, then try iter
            let packet = match self.cached.take() {
                Some(packet) => packet,
                None => match self.packets.next() {
                    Some(packet) => packet,
                    None => {
                        // nothing cached and iter is done
                        break;
                    }
                },
            };

            group = match group.take() {
                None => {
                    // standalone packet with no current group, just return it
                    if packet.is_standalone() {
                        return Some(Ok(PacketGroup {
                            apid: packet.header.apid,
                            packets: vec![packet],
                        }));
                    }
                    // start a new group with our packet
                    Some(PacketGroup {
                        apid: packet.header.apid,
                        packets: vec![packet],
                    })
                }
                Some(mut group) => {
                    // Different apids indicate we're done with this group. However we have a
                    // packet, so we must cache it for use on next iter.
                    if packet.header.apid != group.packets[0].header.apid {
                        self.cached = Some(packet);
                        return Some(Ok(group));
                    }
                    // Adding to group we already started
                    group.packets.push(packet);
                    Some(group)
                }
            };
        }

        // If we have one, return it.
        if let Some(group) = group {
            return Some(Ok(group));
        }

        // Clear cache
        self.done = true;
        match self.cached.take() {
            Some(packet) => Some(Ok(PacketGroup {
                apid: packet.header.apid,
                packets: vec![packet],
            })),
            None => None,
        }
    }
}

/// Return an iterator providing [Packet] data read from a byte synchronized ungrouped
/// packet stream.
///
/// For packet streams that may contain packets that utilize packet grouping see
/// ``read_packet_groups``.
pub fn read_packets<R>(reader: R) -> impl Iterator<Item = IOResult<Packet>> + Send
where
    R: Read + Send,
{
    PacketReaderIter::new(reader)
}

/// Return an [Iterator] that groups read packets into ``PacketGroup``s.
///
/// This is necessary for packet streams containing APIDs that utilize packet grouping sequence
/// flags values ``SEQ_FIRST``, ``SEQ_CONTINUATION``, and ``SEQ_LAST``. It can also be used for
/// non-grouped APIDs (``SEQ_UNSEGMENTED``), however, it is not necessary in such cases. See
/// ``PrimaryHeader::sequence_flags``.
pub fn read_packet_groups<R>(reader: R) -> impl Iterator<Item = IOResult<PacketGroup>>
where
    R: Read + Send,
{
    let packets = PacketReaderIter::new(reader).flatten();
    PacketGroupIter::with_packets(packets)
}

/// Collects the provided packets into ``PacketGroup``s.
pub fn collect_packet_groups<I>(packets: I) -> impl Iterator<Item = IOResult<PacketGroup>> + Send
where
    I: Iterator<Item = Packet> + Send,
{
    PacketGroupIter::with_packets(packets)
}

pub mod summary;
pub use summary::{ApidSummary, Summary};

//! Per-APID profile configuration (spec.md §6's enumerated option table).
//!
//! Built with `typed-builder`, matching the teacher's use of that crate
//! for configuration-shaped types across `ccsds-lib`, and `serde`-
//! (de)serializable so a `Profile` round-trips through `serde_json`
//! exactly like the teacher's `spacecrafts.rs`/`timecode::Format`
//! configuration types. `Profile` replaces the teacher's
//! `spacecrafts`-crate-backed spacecraft database: spec.md's profiles are
//! self-contained per-APID records, not an external lookup, so there is
//! no equivalent need for a bundled JSON database here (see DESIGN.md).

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::{Error, Result};
use crate::spacepacket::Apid;

/// Space Packet type bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PacketType {
    Tm,
    Tc,
}

/// Secondary-header layout mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SecHdrMode {
    None,
    /// 8 bytes of CCSDS Unsegmented Time Code nanoseconds.
    Ns8,
    /// 4 bytes seconds + 4 bytes microseconds.
    SecUs32,
    /// Fixed opaque bytes, supplied as a hex string.
    Fixed { hex: String },
}

impl SecHdrMode {
    /// Length in bytes of this secondary header.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            SecHdrMode::None => 0,
            SecHdrMode::Ns8 => 8,
            SecHdrMode::SecUs32 => 8,
            SecHdrMode::Fixed { hex } => hex.len() / 2,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render the secondary-header bytes for an encode call at time `t`
    /// (Unix nanoseconds), or the literal fixed bytes.
    pub fn encode(&self, unix_nanos: u64) -> Result<Vec<u8>> {
        match self {
            SecHdrMode::None => Ok(Vec::new()),
            SecHdrMode::Ns8 => Ok(unix_nanos.to_be_bytes().to_vec()),
            SecHdrMode::SecUs32 => {
                let secs = (unix_nanos / 1_000_000_000) as u32;
                let micros = ((unix_nanos % 1_000_000_000) / 1_000) as u32;
                let mut out = Vec::with_capacity(8);
                out.extend_from_slice(&secs.to_be_bytes());
                out.extend_from_slice(&micros.to_be_bytes());
                Ok(out)
            }
            SecHdrMode::Fixed { hex } => hex::decode(hex)
                .map_err(|e| Error::ConfigurationError(format!("invalid sec_hdr.hex: {e}"))),
        }
    }
}

/// User-content source for synthetic/test traffic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BodyMode {
    Ascii { text: String },
    Pattern16,
    /// Pre-supplied raw bytes (the `file`-backed mode, with file I/O left
    /// to the caller — reading arbitrary paths is a CLI/process concern,
    /// out of scope per spec.md §1).
    Bytes { extra_bytes: Vec<u8> },
}

impl BodyMode {
    #[must_use]
    pub fn render(&self, len: usize) -> Vec<u8> {
        match self {
            BodyMode::Ascii { text } => text.as_bytes().to_vec(),
            BodyMode::Pattern16 => (0..len as u16).map(|n| (n % 16) as u8).collect(),
            BodyMode::Bytes { extra_bytes } => extra_bytes.clone(),
        }
    }
}

/// A per-APID Space Packet profile (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
pub struct Profile {
    pub name: String,
    pub apid: Apid,
    #[builder(default = PacketType::Tm)]
    pub packet_type: PacketType,
    #[builder(default = SecHdrMode::None)]
    pub sec_hdr: SecHdrMode,
    #[builder(default = BodyMode::Pattern16)]
    pub body: BodyMode,
    #[builder(default = 0x00)]
    pub pad_byte: u8,
    #[builder(default = false)]
    pub use_mic: bool,
    pub data_field_len: u16,
}

impl Profile {
    /// Validate `data_field_len >= sec_hdr_len + (4 if use_mic)`, the
    /// configuration-time check spec.md §9 calls for ("configuration-time
    /// validation ensures data_field_len >= sec_hdr_len + (4 if MIC)").
    ///
    /// # Errors
    /// [`Error::ConfigurationError`] if the profile is inconsistent.
    pub fn validate(&self) -> Result<()> {
        let min = self.sec_hdr.len() + usize::from(self.use_mic) * 4;
        if (self.data_field_len as usize) < min {
            return Err(Error::ConfigurationError(format!(
                "data_field_len {} is smaller than sec_hdr_len {} + mic {}",
                self.data_field_len,
                self.sec_hdr.len(),
                usize::from(self.use_mic) * 4
            )));
        }
        if self.apid > 0x7FF {
            return Err(Error::ConfigurationError(format!(
                "apid {} exceeds 11-bit range",
                self.apid
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_data_field_len_too_small_for_mic() {
        let p = Profile::builder()
            .name("test".into())
            .apid(0x1FE)
            .sec_hdr(SecHdrMode::Ns8)
            .use_mic(true)
            .data_field_len(8)
            .build();
        assert!(p.validate().is_err());
    }

    #[test]
    fn accepts_consistent_profile() {
        let p = Profile::builder()
            .name("test".into())
            .apid(0x1FE)
            .sec_hdr(SecHdrMode::Ns8)
            .use_mic(true)
            .data_field_len(16)
            .build();
        assert!(p.validate().is_ok());
    }

    #[test]
    fn sec_hdr_len_matches_mode() {
        assert_eq!(SecHdrMode::None.len(), 0);
        assert_eq!(SecHdrMode::Ns8.len(), 8);
        assert_eq!(SecHdrMode::SecUs32.len(), 8);
        assert_eq!(
            SecHdrMode::Fixed { hex: "DEADBEEF".into() }.len(),
            4
        );
    }
}

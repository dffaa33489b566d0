//! CRC primitives used for the MIC (CRC-32C) and Transfer Frame FECF
//! (CRC-16-IBM).
//!
//! Both checksums are computed with the `crc` crate's precomputed tables
//! rather than hand-rolled polynomial division, matching the pattern
//! sketched (but never finished) in the teacher's `framing::ocf` module.

use crc::{Crc, CRC_16_IBM_3740, CRC_32_ISCSI};

/// CRC-32C (Castagnoli): poly 0x82F63B78 reflected, init 0xFFFFFFFF,
/// reflected in/out, final XOR 0xFFFFFFFF. This is exactly `CRC_32_ISCSI`.
static CRC32C: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

/// CRC-16 for the Transfer Frame FECF: poly 0x1021, init 0xFFFF, MSB-first,
/// no reflection, no final XOR. This is exactly `CRC_16_IBM_3740`
/// (a.k.a. CRC-16/CCITT-FALSE).
static CRC16_FECF: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Compute the CRC-32C MIC over `user` bytes.
#[must_use]
pub fn crc32c(user: &[u8]) -> u32 {
    CRC32C.checksum(user)
}

/// Compute the CRC-16 FECF over the frame header + TFDF bytes.
#[must_use]
pub fn crc16_fecf(dat: &[u8]) -> u16 {
    CRC16_FECF.checksum(dat)
}

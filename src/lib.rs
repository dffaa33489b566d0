#![doc = include_str!("../README.md")]

mod error;

pub mod asm;
pub mod conv;
pub mod crc;
pub mod frame;
pub mod pipeline;
pub mod pn;
pub mod profile;
pub mod rs;
pub mod spacepacket;
pub mod timecode;
pub mod viterbi;

pub use error::{Error, Result};

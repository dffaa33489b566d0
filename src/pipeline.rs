//! Whole-chain composition: Space Packets → CADUs on transmit, and the
//! inverse on receive.
//!
//! The per-stage iterator adapters (`pn::randomize_frames`,
//! `asm::insert_frames`, `conv::encode_frames`) compose by ordinary
//! `Iterator` chaining (SPEC_FULL.md §5's REDESIGN of the teacher's
//! trait-object stage model). The one stage that justifies its own thread
//! pool is RS correction on receive: it is the most expensive step per
//! frame and independent across frames, exactly the shape the teacher's
//! `framing::pipeline::reed_solomon::reed_solomon` dispatches with a
//! `rayon` pool behind a bounded `crossbeam::channel` — this module
//! reproduces that pattern for `rs::decode_interleaved` (SPEC_FULL.md §8).

use std::sync::Arc;

use crossbeam::channel::Sender;
use tracing::debug;

use crate::asm;
use crate::conv;
use crate::crc::crc16_fecf;
use crate::error::{Error, Result};
use crate::frame::{FrameConfig, Framer};
use crate::pn::{randomize_frames, DefaultRandomizer, Randomizer};
use crate::rs;

/// Configuration for the transmit chain (TM Framer through convolutional
/// encoder).
#[derive(Debug, Clone, Copy)]
pub struct TxConfig {
    pub frame: FrameConfig,
    pub interleave_depth: usize,
    pub randomizer_seed: u16,
}

/// Frame, randomize, RS-encode, ASM-insert, and convolutionally encode a
/// stream of Space Packets into a stream of coded CADU byte strings.
///
/// `packets` supplies complete Space Packet byte strings in arrival order;
/// the framer pulls from it only as needed to fill each fixed-length
/// frame, per spec.md §4.2's suspension rule (a real stream would call
/// `Framer::try_emit_frame` repeatedly and push more packets as they
/// arrive; collecting all packets up front is the batch-oriented
/// simplification appropriate for this crate's non-streaming callers).
pub fn encode_chain(
    packets: impl IntoIterator<Item = Vec<u8>>,
    cfg: TxConfig,
) -> Result<Vec<Vec<u8>>> {
    let tfdf_len = cfg.frame.tfdf_len();
    if tfdf_len != rs::K * cfg.interleave_depth {
        return Err(Error::ConfigurationError(format!(
            "TFDF length {tfdf_len} does not equal {} * interleave depth {}",
            rs::K,
            cfg.interleave_depth
        )));
    }

    let mut framer = Framer::new(cfg.frame);
    for pkt in packets {
        framer.push_packet(pkt);
    }
    let mut frames = Vec::new();
    while let Some(frame) = framer.try_emit_frame() {
        frames.push(frame);
    }
    if let Some(frame) = framer.flush(cfg.frame.idle_byte) {
        frames.push(frame);
    }

    let randomizer = DefaultRandomizer::with_seed(cfg.randomizer_seed);
    let randomized = randomize_frames(&randomizer, frames.into_iter());

    let mut codeblocks = Vec::new();
    for frame in randomized {
        codeblocks.push(rs::encode_interleaved(&frame, cfg.interleave_depth)?);
    }

    let with_asm = asm::insert_frames(codeblocks.into_iter());
    Ok(conv::encode_frames(with_asm).collect())
}

/// Outcome of decoding one received frame.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub frame_bytes: Vec<u8>,
    pub rs_outcomes: Vec<std::result::Result<[u8; rs::N], rs::RsError>>,
    pub fecf_ok: Option<bool>,
}

/// Configuration for the receive chain (post-Viterbi through RS
/// correction, de-randomization, and FECF check).
#[derive(Debug, Clone, Copy)]
pub struct RxConfig {
    pub frame: FrameConfig,
    pub interleave_depth: usize,
    pub randomizer_seed: u16,
    pub num_threads: usize,
    pub buffer_size: usize,
}

/// Strip the ASM, RS-correct, de-randomize, and verify the FECF of each
/// CADU in `cadus` (already Viterbi-decoded to hard bytes), dispatching RS
/// correction to a background `rayon` pool fed through a bounded
/// `crossbeam` channel — frames complete in dispatch order, but RS
/// correction for independent frames runs concurrently.
pub fn decode_rs_corrected(
    cadus: impl Iterator<Item = Vec<u8>> + Send + 'static,
    cfg: RxConfig,
) -> impl Iterator<Item = DecodedFrame> {
    let (tx, rx) = crossbeam::channel::bounded(cfg.buffer_size.max(1));
    std::thread::Builder::new()
        .name("pipeline::rs_dispatch".into())
        .spawn(move || dispatch_rs(cadus, cfg, tx))
        .expect("failed to spawn rs dispatch thread");
    rx.into_iter()
}

fn dispatch_rs(
    cadus: impl Iterator<Item = Vec<u8>> + Send + 'static,
    cfg: RxConfig,
    tx: Sender<DecodedFrame>,
) {
    let pool = rayon::ThreadPoolBuilder::new()
        .thread_name(|i| format!("pipeline::rs_correct{i}"))
        .num_threads(cfg.num_threads)
        .build()
        .expect("failed to build rs correction thread pool");
    let interleave_depth = cfg.interleave_depth;
    let seed = cfg.randomizer_seed;
    let use_fecf = cfg.frame.use_fecf;

    for cadu in cadus {
        let tx = tx.clone();
        pool.spawn_fifo(move || {
            let Some(codeblock) = asm::strip(&cadu) else {
                debug!("cadu missing expected ASM, dropping");
                return;
            };
            let (frame, outcomes) = match rs::decode_interleaved(codeblock, interleave_depth) {
                Ok(v) => v,
                Err(err) => {
                    debug!(%err, "rs decode failed");
                    return;
                }
            };

            let randomizer = DefaultRandomizer::with_seed(seed);
            let derandomized = randomizer.apply(&frame);

            let fecf_ok = if use_fecf && derandomized.len() >= 2 {
                let (body, fecf) = derandomized.split_at(derandomized.len() - 2);
                let want = u16::from_be_bytes([fecf[0], fecf[1]]);
                Some(crc16_fecf(body) == want)
            } else {
                None
            };

            let _ = tx.send(DecodedFrame {
                frame_bytes: derandomized,
                rs_outcomes: outcomes,
                fecf_ok,
            });
        });
    }
}

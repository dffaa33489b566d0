//! Reed–Solomon(255,223) encoding/decoding with round-robin symbol
//! interleaving of depth I, over GF(256) (primitive polynomial 0x11D,
//! α = 2), generator polynomial g(x) = Π_{i=1..32}(x − α^i).
//!
//! The GF(256) arithmetic and the overall shape (syndromes → error
//! locator → Chien search → Forney correction) follow the teacher's
//! from-scratch decoder at `src/rs.rs`, function-for-function
//! (`calc_syndromes`, `find_error_locator`, `find_errors`,
//! `find_error_evaluator`, `correct_errata`). That decoder is unusable
//! as-is here: it is built on a dual-basis representation (`GEN=173`,
//! `FCR=112`) incompatible with spec.md's normative α¹..α³² root set
//! (spec.md §9 Open Question 2), and it has no matching encoder at all
//! (the teacher never ships one). Both are rewritten from scratch against
//! the conventional convention, encoder included, following the
//! structure of the well-known Berlekamp–Massey/Forney textbook
//! algorithm that the teacher's decoder is itself a port of.

mod gf;

use crate::error::{Error, Result};

pub const N: usize = 255;
pub const K: usize = 223;
pub const NPAR: usize = N - K;
const GENERATOR: u8 = 2;
const FCR: i32 = 1;

/// g(x) = Π_{i=1..NPAR} (x − α^i), MSB-first coefficients.
fn generator_poly() -> Vec<u8> {
    let mut g = vec![1u8];
    for i in 0..NPAR as i32 {
        g = gf::poly_mult(&g, &[1, gf::pow(GENERATOR, i + FCR)]);
    }
    g
}

/// Systematically encode a 223-byte message into a 255-byte codeword
/// (message followed by 32 parity bytes).
///
/// # Errors
/// [`Error::ConfigurationError`] if `msg` is not exactly [`K`] bytes.
pub fn encode(msg: &[u8]) -> Result<[u8; N]> {
    if msg.len() != K {
        return Err(Error::ConfigurationError(format!(
            "RS encoder expects exactly {K} message bytes, got {}",
            msg.len()
        )));
    }
    let gen = generator_poly();
    let mut padded = msg.to_vec();
    padded.extend(std::iter::repeat(0u8).take(gen.len() - 1));
    let (_, remainder) = gf::poly_div(&padded, &gen);

    let mut codeword = [0u8; N];
    codeword[..K].copy_from_slice(msg);
    codeword[K..].copy_from_slice(&remainder);
    Ok(codeword)
}

#[derive(thiserror::Error, Debug)]
pub enum RsError {
    #[error("reed-solomon input must be exactly {N} bytes, got {0}")]
    InvalidLength(usize),
    #[error("uncorrectable: {0}")]
    Uncorrectable(String),
}

fn calc_syndromes(msg: &[u8]) -> Vec<u8> {
    let mut synd = vec![0u8; NPAR + 1];
    for i in 0..NPAR {
        synd[i + 1] = gf::poly_eval(msg, gf::pow(GENERATOR, i as i32 + FCR));
    }
    synd
}

fn find_error_locator(synd: &[u8]) -> std::result::Result<Vec<u8>, RsError> {
    let mut err_loc = vec![1u8];
    let mut old_loc = vec![1u8];
    let synd_shift = synd.len().saturating_sub(NPAR);

    for i in 0..NPAR {
        let k = i + synd_shift;
        let mut delta = synd[k];
        for j in 1..err_loc.len() {
            delta ^= gf::mult(err_loc[err_loc.len() - 1 - j], synd[k - j]);
        }
        old_loc.push(0);
        if delta != 0 {
            if old_loc.len() > err_loc.len() {
                let new_loc = gf::poly_scale(&old_loc, delta);
                old_loc = gf::poly_scale(&err_loc, gf::inv(delta));
                err_loc = new_loc;
            }
            err_loc = gf::poly_add(&err_loc, &gf::poly_scale(&old_loc, delta));
        }
    }

    while err_loc.len() > 1 && err_loc[0] == 0 {
        err_loc.remove(0);
    }
    let errs = err_loc.len() - 1;
    if errs * 2 > NPAR {
        return Err(RsError::Uncorrectable(format!(
            "too many errors: locator degree {errs} exceeds correction capacity {}",
            NPAR / 2
        )));
    }
    Ok(err_loc)
}

/// Chien search: find the roots of the error locator polynomial.
fn find_errors(err_loc: &[u8]) -> std::result::Result<Vec<usize>, RsError> {
    let errs = err_loc.len() - 1;
    let mut err_pos = Vec::with_capacity(errs);
    for i in 0..N {
        if gf::poly_eval(err_loc, gf::pow(GENERATOR, i as i32)) == 0 {
            err_pos.push(N - 1 - i);
        }
    }
    if err_pos.len() != errs {
        return Err(RsError::Uncorrectable(
            "Chien search did not find a root for every declared error".to_owned(),
        ));
    }
    Ok(err_pos)
}

fn find_errata_locator(coef_pos: &[i32]) -> Vec<u8> {
    let mut loc = vec![1u8];
    for &p in coef_pos {
        let term = gf::poly_add(&[1], &[gf::pow(GENERATOR, p), 0]);
        loc = gf::poly_mult(&loc, &term);
    }
    loc
}

fn find_error_evaluator(synd: &[u8], err_loc: &[u8], errs: usize) -> Vec<u8> {
    let mut divisor = vec![0u8; errs + 2];
    divisor[0] = 1;
    let (_, remainder) = gf::poly_div(&gf::poly_mult(synd, err_loc), &divisor);
    remainder
}

fn correct_errata(
    msg: &[u8],
    synd: &[u8],
    err_pos: &[usize],
) -> std::result::Result<Vec<u8>, RsError> {
    let coef_pos: Vec<i32> = err_pos.iter().map(|&p| msg.len() as i32 - 1 - p as i32).collect();
    let err_loc = find_errata_locator(&coef_pos);

    let mut rev_synd = synd.to_vec();
    rev_synd.reverse();
    let errs = err_loc.len() - 1;
    let mut err_eval = find_error_evaluator(&rev_synd, &err_loc, errs);
    err_eval.reverse();

    let x: Vec<u8> = coef_pos.iter().map(|&p| gf::pow(GENERATOR, -(N as i32 - 1 - p))).collect();

    let mut e = vec![0u8; msg.len()];
    for (i, &xi) in x.iter().enumerate() {
        let xi_inv = gf::inv(xi);
        let mut err_loc_prime = 1u8;
        for (j, &xj) in x.iter().enumerate() {
            if j != i {
                err_loc_prime = gf::mult(err_loc_prime, 1 ^ gf::mult(xi_inv, xj));
            }
        }
        if err_loc_prime == 0 {
            return Err(RsError::Uncorrectable(
                "could not find error magnitude".to_owned(),
            ));
        }
        let mut y = gf::poly_eval(&err_eval, xi_inv);
        y = gf::mult(gf::pow(xi, 1 - FCR), y);
        e[err_pos[i]] = gf::div(y, err_loc_prime);
    }

    Ok(gf::poly_add(msg, &e))
}

/// Decode and correct a 255-byte RS codeword, returning the corrected
/// 255-byte codeword (message ‖ parity). Corrects up to 16 symbol errors;
/// returns [`RsError::Uncorrectable`] if there are more.
pub fn decode(codeword: &[u8]) -> std::result::Result<[u8; N], RsError> {
    if codeword.len() != N {
        return Err(RsError::InvalidLength(codeword.len()));
    }

    let synd = calc_syndromes(codeword);
    if synd.iter().all(|&s| s == 0) {
        let mut out = [0u8; N];
        out.copy_from_slice(codeword);
        return Ok(out);
    }

    let err_loc = find_error_locator(&synd)?;
    let mut err_loc_rev = err_loc.clone();
    err_loc_rev.reverse();
    let err_pos = find_errors(&err_loc_rev)?;

    let corrected = correct_errata(codeword, &synd, &err_pos)?;

    let verify = calc_syndromes(&corrected);
    if verify.iter().any(|&s| s != 0) {
        return Err(RsError::Uncorrectable(
            "residual syndrome after correction".to_owned(),
        ));
    }

    let mut out = [0u8; N];
    out.copy_from_slice(&corrected);
    Ok(out)
}

/// Demultiplex `frame` (length `k * interleave`) into `interleave`
/// sub-sequences of length `k`: `sub[j][n] = frame[n*interleave + j]`.
#[must_use]
pub fn deinterleave(frame: &[u8], interleave: usize, k: usize) -> Vec<Vec<u8>> {
    let mut subs = vec![vec![0u8; k]; interleave];
    for n in 0..k {
        for j in 0..interleave {
            subs[j][n] = frame[n * interleave + j];
        }
    }
    subs
}

/// Multiplex `interleave` codewords of length `n` each back into a single
/// `n * interleave`-byte block: `out[n*interleave + j] = codewords[j][n]`.
#[must_use]
pub fn interleave(codewords: &[Vec<u8>], n: usize) -> Vec<u8> {
    let interleave = codewords.len();
    let mut out = vec![0u8; n * interleave];
    for idx in 0..n {
        for (j, cw) in codewords.iter().enumerate() {
            out[idx * interleave + j] = cw[idx];
        }
    }
    out
}

/// Encode one randomized Transfer Frame of exactly `223 * interleave`
/// bytes into a `255 * interleave`-byte interleaved RS codeblock.
///
/// # Errors
/// [`Error::ConfigurationError`] if `frame.len() != 223 * interleave`.
pub fn encode_interleaved(frame: &[u8], interleave_depth: usize) -> Result<Vec<u8>> {
    if frame.len() != K * interleave_depth {
        return Err(Error::ConfigurationError(format!(
            "RS interleaver expects {} bytes for interleave depth {interleave_depth}, got {}",
            K * interleave_depth,
            frame.len()
        )));
    }
    let subs = deinterleave(frame, interleave_depth, K);
    let codewords: Vec<Vec<u8>> = subs
        .iter()
        .map(|s| encode(s).map(|cw| cw.to_vec()))
        .collect::<Result<_>>()?;
    Ok(interleave(&codewords, N))
}

/// Decode a `255 * interleave`-byte interleaved RS codeblock back into a
/// `223 * interleave`-byte Transfer Frame, correcting each sub-codeword
/// independently.
///
/// # Errors
/// [`Error::ConfigurationError`] on bad input length; does not fail on
/// uncorrectable sub-codewords — the caller inspects the returned
/// per-codeword outcome to decide integrity status.
pub fn decode_interleaved(
    codeblock: &[u8],
    interleave_depth: usize,
) -> Result<(Vec<u8>, Vec<std::result::Result<[u8; N], RsError>>)> {
    if codeblock.len() != N * interleave_depth {
        return Err(Error::ConfigurationError(format!(
            "RS deinterleaver expects {} bytes for interleave depth {interleave_depth}, got {}",
            N * interleave_depth,
            codeblock.len()
        )));
    }
    let subs = deinterleave(codeblock, interleave_depth, N);
    let mut frame = vec![0u8; K * interleave_depth];
    let mut outcomes = Vec::with_capacity(interleave_depth);
    for (j, sub) in subs.iter().enumerate() {
        let result = decode(sub);
        match &result {
            Ok(corrected) => {
                for n in 0..K {
                    frame[n * interleave_depth + j] = corrected[n];
                }
            }
            Err(_) => {
                for n in 0..K {
                    frame[n * interleave_depth + j] = sub[n];
                }
            }
        }
        outcomes.push(result);
    }
    Ok((frame, outcomes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn encode_decode_noiseless_roundtrip() {
        let msg: Vec<u8> = (0..K as u32).map(|n| (n % 251) as u8).collect();
        let cw = encode(&msg).unwrap();
        let decoded = decode(&cw).unwrap();
        assert_eq!(&decoded[..K], &msg[..]);
    }

    #[test]
    fn corrects_up_to_16_symbol_errors() {
        let msg: Vec<u8> = (0..K as u32).map(|n| ((n * 37) % 251) as u8).collect();
        let mut cw = encode(&msg).unwrap();

        let mut rng = rand::thread_rng();
        let mut positions: Vec<usize> = (0..N).collect();
        for i in (1..positions.len()).rev() {
            let j = rng.gen_range(0..=i);
            positions.swap(i, j);
        }
        for &p in positions.iter().take(16) {
            cw[p] ^= 0xFF;
        }

        let decoded = decode(&cw).expect("16 errors must be correctable");
        assert_eq!(&decoded[..K], &msg[..]);
    }

    #[test]
    fn interleave_round_trip() {
        let frame: Vec<u8> = (0..(K * 5) as u32).map(|n| (n % 251) as u8).collect();
        let codeblock = encode_interleaved(&frame, 5).unwrap();
        assert_eq!(codeblock.len(), N * 5);
        let (decoded, outcomes) = decode_interleaved(&codeblock, 5).unwrap();
        assert_eq!(decoded, frame);
        assert!(outcomes.iter().all(std::result::Result::is_ok));
    }

    #[test]
    fn interleave_recovers_errors_in_different_sub_codewords() {
        let frame: Vec<u8> = (0..(K * 5) as u32).map(|n| (n % 251) as u8).collect();
        let mut codeblock = encode_interleaved(&frame, 5).unwrap();
        // position 2 is in sub-codeword 2 % 5 == 2; position 8 is in
        // sub-codeword 8 % 5 == 3 — two distinct interleave branches.
        codeblock[2] ^= 0xAA;
        codeblock[8] ^= 0x55;
        let (decoded, _) = decode_interleaved(&codeblock, 5).unwrap();
        assert_eq!(decoded, frame);
    }
}

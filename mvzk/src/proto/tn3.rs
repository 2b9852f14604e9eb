//! Batched proof flavour with a Schwartz-Zippel polynomial check.
//!
//! The multiplication triples are laid out as an n1 x n2 grid. Each row of
//! A (randomized by a transcript-derived coefficient) and of B is
//! interpolated as a polynomial over the points `0..n2 + SZ_REPETITIONS`,
//! padded with random masks for zero-knowledge; the prover commits the
//! sum-product polynomial P at the points `n2..2*n2 + 2*SZ_REPETITIONS`.
//! The verifiers jointly sample challenge points (outside the data range)
//! and open `P(z)` against `sum_j A_j(z) * B_j(z)`.

use std::path::Path;

use anyhow::{ensure, Result};
use mvzk_field::coding::{
    default_xcoords, interpolate, interpolate_preprocess_range, interpolate_with_preprocessing,
};
use mvzk_field::decoder::decode;
use mvzk_field::{Gf2k, Sample};
use static_assertions::const_assert;

use super::complain_cheaters;
use crate::bitio::{BitRead, BitWrite, BufferBitReader, BufferBitWriter, FileBitReader};
use crate::circuit::Circuit;
use crate::hash::sha256;
use crate::net::Transport;
use crate::player::Player;
use crate::prng::Prng;

/// Number of verifiers.
pub const N: usize = 4;
/// Corruption threshold; also the sharing polynomial degree.
pub const T: usize = 1;
/// Share field degree; must be big enough to fit the interpolation
/// coordinates of the chosen batch size.
pub const K: usize = 27;
/// Full repetitions with fresh random polynomials.
pub const FULL_REPETITIONS: usize = 3;
/// Schwartz-Zippel challenge points per full repetition.
pub const SZ_REPETITIONS: usize = 2;
pub const PREPROCESSING_REPETITIONS: usize = (40 + K - 1) / K;

const_assert!(N >= 3 * T + 1);
const_assert!((1u128 << K) >= (N + 1) as u128);

pub type ShareEl = Gf2k<K>;

/// Builds the two proof messages: the transcript that seeds the row
/// coefficients, and the committed sum-product evaluations.
pub fn build_proof(
    circ: &Circuit,
    private_input: &Path,
    preprocessed: &Path,
    n2: usize,
) -> Result<(Vec<u8>, Vec<u8>)> {
    ensure!(
        circ.num_outputs() == 1 && circ.num_output_wires(0) == 1,
        "circuit must have a single one-bit output"
    );
    ensure!(n2 > 0, "batch size must be positive");

    let mut input_bits = FileBitReader::open(private_input)?;
    let mut preprocessing = FileBitReader::open(preprocessed)?;
    let mut output = BufferBitWriter::new();

    let mut wires = Vec::new();
    for i in 0..circ.num_inputs() {
        for _ in 0..circ.num_input_wires(i) {
            let inp = input_bits.get_bit()?;
            let mask = preprocessing.read_element::<K>()?;
            output.write_element(mask - ShareEl::from_integer(inp as u128))?;
            wires.push(inp);
        }
    }

    let mut a_vals: Vec<ShareEl> = Vec::new();
    let mut b_vals: Vec<ShareEl> = Vec::new();
    let out = circ.eval_custom(
        &wires,
        |&a, &b| Ok(a ^ b),
        |&a, &b| {
            let mask = preprocessing.read_element::<K>()?;
            output.write_element(mask - ShareEl::from_integer((a && b) as u128))?;
            a_vals.push(ShareEl::from_integer(a as u128));
            b_vals.push(ShareEl::from_integer(b as u128));
            Ok(a && b)
        },
        |&a| Ok(!a),
    )?;
    ensure!(!out, "circuit output is not zero for the provided witness");

    let n1 = (a_vals.len() + n2 - 1) / n2;
    a_vals.resize(n1 * n2, ShareEl::ZERO);
    b_vals.resize(n1 * n2, ShareEl::ZERO);

    // Random interpolation padding: sigma masks per row polynomial, per
    // full repetition, so the openings at the challenge points hide the
    // row data.
    let mut gen = Prng::from_entropy(0);
    let mut ts = vec![ShareEl::ZERO; 2 * n1 * FULL_REPETITIONS * SZ_REPETITIONS];
    for t in ts.iter_mut() {
        *t = ShareEl::sample(&mut gen);
        let mask = preprocessing.read_element::<K>()?;
        output.write_element(mask - *t)?;
    }

    let part_1 = output.drain();
    let seed = sha256(&part_1);
    gen.seed_from(&seed);
    let rs: Vec<ShareEl> = (0..n1 * FULL_REPETITIONS)
        .map(|_| ShareEl::sample(&mut gen))
        .collect();

    let interpolation_pre: Vec<Vec<ShareEl>> = (0..n2 + 2 * SZ_REPETITIONS)
        .map(|i| {
            interpolate_preprocess_range(
                n2 + SZ_REPETITIONS,
                ShareEl::from_integer((n2 + i) as u128),
            )
        })
        .collect();

    for full in 0..FULL_REPETITIONS {
        let mut ps = vec![ShareEl::ZERO; n2 + 2 * SZ_REPETITIONS];
        for j in 0..n1 {
            let pts_a = row_points(&a_vals, &ts, Some(rs[full * n1 + j]), n1, n2, full, j, false);
            let pts_b = row_points(&b_vals, &ts, None, n1, n2, full, j, true);
            for (p, pre) in ps.iter_mut().zip(&interpolation_pre) {
                *p += interpolate_with_preprocessing(pre, &pts_a)
                    * interpolate_with_preprocessing(pre, &pts_b);
            }
        }
        for &p in &ps {
            let mask = preprocessing.read_element::<K>()?;
            output.write_element(mask - p)?;
        }
    }
    let part_2 = output.drain();

    Ok((part_1, part_2))
}

/// A row of the triple grid extended by its interpolation masks, with the
/// row randomizer applied to the A side.
#[allow(clippy::too_many_arguments)]
fn row_points(
    grid: &[ShareEl],
    ts: &[ShareEl],
    randomizer: Option<ShareEl>,
    n1: usize,
    n2: usize,
    full: usize,
    j: usize,
    second_half: bool,
) -> Vec<ShareEl> {
    let mut pts: Vec<ShareEl> = grid[j * n2..(j + 1) * n2].to_vec();
    if let Some(r) = randomizer {
        for a in pts.iter_mut() {
            *a *= r;
        }
    }
    let base = full * 2 * n1 * SZ_REPETITIONS + (2 * j + second_half as usize) * SZ_REPETITIONS;
    pts.extend_from_slice(&ts[base..base + SZ_REPETITIONS]);
    pts
}

/// Proves and broadcasts both messages; returns the total proof size.
pub fn prove<T: Transport>(
    me: &mut Player<T>,
    circ: &Circuit,
    private_input: &Path,
    preprocessed: &Path,
    n2: usize,
) -> Result<usize> {
    let (part_1, part_2) = build_proof(circ, private_input, preprocessed, n2)?;
    me.send_all(&part_1, None)?;
    me.send_all(&part_2, None)?;
    Ok(part_1.len() + part_2.len())
}

/// The share of the evaluations of P: the first n2 points follow from the
/// verifier's own C shares, the rest are the prover's commitments.
fn get_p(
    c_shares: &[ShareEl],
    rs: &[ShareEl],
    proof_2: &mut BufferBitReader,
    preprocessing: &mut FileBitReader,
    n1: usize,
    n2: usize,
    full: usize,
) -> Result<Vec<ShareEl>> {
    let mut ps = vec![ShareEl::ZERO; 2 * n2 + 2 * SZ_REPETITIONS];
    for (i, &c) in c_shares.iter().enumerate() {
        ps[i % n2] += rs[full * n1 + i / n2] * c;
    }
    for i in 0..n2 + 2 * SZ_REPETITIONS {
        ps[n2 + i] = preprocessing.read_element::<K>()? - proof_2.read_element::<K>()?;
    }
    Ok(ps)
}

/// Shares to open for one challenge point: `P(zeta)` followed by
/// `A_j(zeta), B_j(zeta)` for every row.
#[allow(clippy::too_many_arguments)]
fn challenge_openings(
    a_shares: &[ShareEl],
    b_shares: &[ShareEl],
    ps: &[ShareEl],
    rs: &[ShareEl],
    ts: &[ShareEl],
    n1: usize,
    n2: usize,
    full: usize,
    zeta: ShareEl,
) -> Vec<ShareEl> {
    let pre = interpolate_preprocess_range(n2 + SZ_REPETITIONS, zeta);
    let mut res = Vec::with_capacity(1 + 2 * n1);
    res.push(interpolate(ps, zeta));
    for j in 0..n1 {
        let pts_a = row_points(a_shares, ts, Some(rs[full * n1 + j]), n1, n2, full, j, false);
        let pts_b = row_points(b_shares, ts, None, n1, n2, full, j, true);
        res.push(interpolate_with_preprocessing(&pre, &pts_a));
        res.push(interpolate_with_preprocessing(&pre, &pts_b));
    }
    res
}

fn open_all_and_check<Tr: Transport>(
    me: &mut Player<Tr>,
    my_shares: Vec<u8>,
    n1: usize,
) -> Result<bool> {
    me.send_all(&my_shares, Some(0))?;
    let mut raw = me.recv_from_all(Some(0))?;
    raw[me.index()] = my_shares;

    let mut readers: Vec<BufferBitReader> =
        raw.drain(..).skip(1).map(BufferBitReader::new).collect();
    let xcoords = default_xcoords::<K>(N);
    let mut next_row = move |readers: &mut Vec<BufferBitReader>| -> Result<Vec<ShareEl>> {
        readers
            .iter_mut()
            .map(|r| r.read_element::<K>().map_err(Into::into))
            .collect()
    };
    let mut open = |readers: &mut Vec<BufferBitReader>, what: &str| -> Result<Option<ShareEl>> {
        let shares = next_row(readers)?;
        match decode(&xcoords, &shares, T, T) {
            Ok((poly, cheaters)) => {
                complain_cheaters(&cheaters, what);
                Ok(Some(poly[0]))
            }
            Err(err) => {
                ::log::warn!("failed to reconstruct {what}: {err}");
                Ok(None)
            }
        }
    };

    let mut ok = match open(&mut readers, "opening of the output wire")? {
        Some(out) => out == ShareEl::ZERO,
        None => false,
    };

    for _ in 0..FULL_REPETITIONS * SZ_REPETITIONS {
        let p_val = open(&mut readers, "opening of P")?;
        let mut ab = ShareEl::ZERO;
        let mut row_ok = true;
        for _ in 0..n1 {
            let a = open(&mut readers, "opening of an A(zeta)")?;
            let b = open(&mut readers, "opening of a B(zeta)")?;
            match (a, b) {
                (Some(a), Some(b)) => ab += a * b,
                _ => row_ok = false,
            }
        }
        ok = ok && row_ok && p_val == Some(ab);
    }
    Ok(ok)
}

/// Verifies the first proof message (received by the caller) plus the
/// second one (received here); returns whether the proof is accepted.
pub fn verify<Tr: Transport>(
    me: &mut Player<Tr>,
    circ: &Circuit,
    proof_part_1: Vec<u8>,
    preprocessed: &Path,
    n2: usize,
) -> Result<bool> {
    ensure!(
        circ.num_outputs() == 1 && circ.num_output_wires(0) == 1,
        "circuit must have a single one-bit output"
    );
    ensure!(n2 > 0, "batch size must be positive");
    let mut preprocessing = FileBitReader::open(preprocessed)?;
    let proof_part_2 = me.recv_from(0)?;

    // Joint coin among the verifiers, then the challenge points; they must
    // avoid the data range 0..n2 or an opening would leak row data.
    let mut gen = Prng::from_entropy(me.index() as u32);
    me.commit_open_seed(&mut gen, Some(0))?;
    let zetas: Vec<ShareEl> = (0..FULL_REPETITIONS * SZ_REPETITIONS)
        .map(|_| loop {
            let zeta = ShareEl::sample(&mut gen);
            if zeta.to_integer() >= n2 as u128 {
                break zeta;
            }
        })
        .collect();

    let seed = sha256(&proof_part_1);
    let mut proof_1 = BufferBitReader::new(proof_part_1);
    let mut proof_2 = BufferBitReader::new(proof_part_2);

    let mut wires: Vec<ShareEl> = Vec::new();
    for i in 0..circ.num_inputs() {
        for _ in 0..circ.num_input_wires(i) {
            let mask = preprocessing.read_element::<K>()?;
            let diff = proof_1.read_element::<K>()?;
            wires.push(mask - diff);
        }
    }

    let mut a_shares: Vec<ShareEl> = Vec::new();
    let mut b_shares: Vec<ShareEl> = Vec::new();
    let mut c_shares: Vec<ShareEl> = Vec::new();
    let o_share = circ.eval_custom(
        &wires,
        |&a, &b| Ok(a + b),
        |&a, &b| {
            let c = preprocessing.read_element::<K>()? - proof_1.read_element::<K>()?;
            a_shares.push(a);
            b_shares.push(b);
            c_shares.push(c);
            Ok(c)
        },
        |&a| Ok(a + ShareEl::ONE),
    )?;

    let n1 = (a_shares.len() + n2 - 1) / n2;
    a_shares.resize(n1 * n2, ShareEl::ZERO);
    b_shares.resize(n1 * n2, ShareEl::ZERO);
    c_shares.resize(n1 * n2, ShareEl::ZERO);

    let mut ts = vec![ShareEl::ZERO; 2 * n1 * FULL_REPETITIONS * SZ_REPETITIONS];
    for t in ts.iter_mut() {
        *t = preprocessing.read_element::<K>()? - proof_1.read_element::<K>()?;
    }

    gen.seed_from(&seed);
    let rs: Vec<ShareEl> = (0..n1 * FULL_REPETITIONS)
        .map(|_| ShareEl::sample(&mut gen))
        .collect();

    let mut to_open = BufferBitWriter::new();
    to_open.write_element(o_share)?;
    for full in 0..FULL_REPETITIONS {
        let ps = get_p(&c_shares, &rs, &mut proof_2, &mut preprocessing, n1, n2, full)?;
        for z in 0..SZ_REPETITIONS {
            let openings = challenge_openings(
                &a_shares,
                &b_shares,
                &ps,
                &rs,
                &ts,
                n1,
                n2,
                full,
                zetas[full * SZ_REPETITIONS + z],
            );
            for el in openings {
                to_open.write_element(el)?;
            }
        }
    }
    open_all_and_check(me, to_open.drain(), n1)
}

//! Simplest proof flavour, for the higher honest majority N >= 4T + 1.
//!
//! The prover only publishes masked wires. The verifiers draw a joint coin
//! and fold every AND gate into REPETITIONS random linear combinations
//! `A_j += beta * a * b`, `C_j += beta * c`; each `A_j - C_j` is a
//! degree-2T sharing of zero exactly when the published AND outputs were
//! consistent, so it is opened with `decode(2T, T)` along with the circuit
//! output.

use std::path::Path;

use anyhow::{ensure, Result};
use mvzk_field::coding::default_xcoords;
use mvzk_field::decoder::decode;
use mvzk_field::{Gf2k, Sample};
use static_assertions::const_assert;

use super::complain_cheaters;
use crate::bitio::{BitRead, BitWrite, BufferBitReader, BufferBitWriter, FileBitReader};
use crate::circuit::Circuit;
use crate::net::Transport;
use crate::player::Player;
use crate::prng::Prng;

/// Number of verifiers.
pub const N: usize = 5;
/// Corruption threshold; also the sharing polynomial degree.
pub const T: usize = 1;
/// Share field degree.
pub const K: usize = 3;
/// Parallel random linear combinations, for 40-bit statistical security.
pub const REPETITIONS: usize = (40 + K - 1) / K;
pub const PREPROCESSING_REPETITIONS: usize = REPETITIONS;

const_assert!(N >= 4 * T + 1);
const_assert!((1u128 << K) >= (N + 1) as u128);

pub type ShareEl = Gf2k<K>;

/// Builds the proof transcript: masked inputs and masked AND outputs.
pub fn build_proof(circ: &Circuit, private_input: &Path, preprocessed: &Path) -> Result<Vec<u8>> {
    ensure!(
        circ.num_outputs() == 1 && circ.num_output_wires(0) == 1,
        "circuit must have a single one-bit output"
    );
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

    let out = circ.eval_custom(
        &wires,
        |&a, &b| Ok(a ^ b),
        |&a, &b| {
            let mask = preprocessing.read_element::<K>()?;
            output.write_element(mask - ShareEl::from_integer((a && b) as u128))?;
            Ok(a && b)
        },
        |&a| Ok(!a),
    )?;
    ensure!(!out, "circuit output is not zero for the provided witness");

    Ok(output.drain())
}

/// Proves and broadcasts; returns the proof size in bytes.
pub fn prove<T: Transport>(
    me: &mut Player<T>,
    circ: &Circuit,
    private_input: &Path,
    preprocessed: &Path,
) -> Result<usize> {
    let proof = build_proof(circ, private_input, preprocessed)?;
    me.send_all(&proof, None)?;
    Ok(proof.len())
}

/// Mirrors the evaluation over shares and folds the AND gates into the
/// random linear combinations. Returns the circuit output share followed by
/// the `A_j - C_j` shares.
fn compute_combinations<Tr: Transport>(
    me: &mut Player<Tr>,
    circ: &Circuit,
    proof_raw: Vec<u8>,
    preprocessed: &Path,
) -> Result<Vec<ShareEl>> {
    let mut gen = Prng::from_entropy(me.index() as u32);
    me.commit_open_seed(&mut gen, Some(0))?;

    let mut preprocessing = FileBitReader::open(preprocessed)?;
    let mut proof = BufferBitReader::new(proof_raw);

    let mut wires: Vec<ShareEl> = Vec::new();
    for i in 0..circ.num_inputs() {
        for _ in 0..circ.num_input_wires(i) {
            let mask = preprocessing.read_element::<K>()?;
            let diff = proof.read_element::<K>()?;
            wires.push(mask - diff);
        }
    }

    let mut a_combs = vec![ShareEl::ZERO; REPETITIONS];
    let mut c_combs = vec![ShareEl::ZERO; REPETITIONS];
    let circ_out = circ.eval_custom(
        &wires,
        |&a, &b| Ok(a + b),
        |&a, &b| {
            let c = preprocessing.read_element::<K>()? - proof.read_element::<K>()?;
            for (a_comb, c_comb) in a_combs.iter_mut().zip(c_combs.iter_mut()) {
                let beta = ShareEl::sample(&mut gen);
                *a_comb += beta * a * b;
                *c_comb += beta * c;
            }
            Ok(c)
        },
        |&a| Ok(a + ShareEl::ONE),
    )?;

    let mut res = Vec::with_capacity(1 + REPETITIONS);
    res.push(circ_out);
    for (a_comb, c_comb) in a_combs.into_iter().zip(c_combs) {
        res.push(a_comb - c_comb);
    }
    Ok(res)
}

fn validate<Tr: Transport>(me: &mut Player<Tr>, my_shares: &[ShareEl]) -> Result<bool> {
    let mut writer = BufferBitWriter::new();
    for &el in my_shares {
        writer.write_element(el)?;
    }
    me.send_all(&writer.drain(), Some(0))?;
    let raw = me.recv_from_all(Some(0))?;

    let mut all_shares = vec![[ShareEl::ZERO; N]; 1 + REPETITIONS];
    for (p, data) in raw.into_iter().enumerate().skip(1) {
        if p == me.index() {
            for (row, &share) in all_shares.iter_mut().zip(my_shares) {
                row[p - 1] = share;
            }
        } else {
            let mut reader = BufferBitReader::new(data);
            for row in all_shares.iter_mut() {
                row[p - 1] = reader.read_element::<K>()?;
            }
        }
    }

    let xcoords = default_xcoords::<K>(N);
    let mut open = |shares: &[ShareEl], d: usize, what: &str| -> Option<ShareEl> {
        match decode(&xcoords, shares, d, T) {
            Ok((poly, cheaters)) => {
                complain_cheaters(&cheaters, what);
                Some(poly[0])
            }
            Err(err) => {
                ::log::warn!("failed to reconstruct {what}: {err}");
                None
            }
        }
    };

    match open(&all_shares[0], T, "output reconstruction") {
        Some(out) if out == ShareEl::ZERO => {}
        Some(_) => {
            ::log::warn!("circuit output is not zero; invalid proof");
            return Ok(false);
        }
        None => return Ok(false),
    }

    // A - C is a product of two degree-T sharings minus a degree-T one, so
    // it lives on a degree-2T polynomial.
    for row in &all_shares[1..] {
        match open(row, 2 * T, "reconstruction of (A - C)") {
            Some(v) if v == ShareEl::ZERO => {}
            Some(_) => {
                ::log::warn!("multiplications are inconsistent; invalid proof");
                return Ok(false);
            }
            None => return Ok(false),
        }
    }
    Ok(true)
}

/// Verifies a received proof transcript; returns whether it is accepted.
pub fn verify<Tr: Transport>(
    me: &mut Player<Tr>,
    circ: &Circuit,
    proof_raw: Vec<u8>,
    preprocessed: &Path,
) -> Result<bool> {
    ensure!(
        circ.num_outputs() == 1 && circ.num_output_wires(0) == 1,
        "circuit must have a single one-bit output"
    );
    let to_check = compute_combinations(me, circ, proof_raw, preprocessed)?;
    validate(me, &to_check)
}

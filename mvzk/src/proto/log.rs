//! Compression-based proof flavour.
//!
//! The prover turns its multiplication triples into a single inner-product
//! claim via Fiat-Shamir randomization, then repeatedly halves the claim:
//! consecutive triples are interpolated pairwise as degree-1 polynomials,
//! their product polynomial is committed (masked by fresh preprocessing),
//! and everything is re-evaluated at a transcript-derived challenge. After
//! log rounds one multiplication remains; the verifiers open it, together
//! with the circuit output share, and reconstruct with error correction in
//! the large check field.

use std::path::Path;

use anyhow::{ensure, Result};
use mvzk_field::coding::{interpolate_preprocess_range, interpolate_with_preprocessing};
use mvzk_field::decoder::decode;
use mvzk_field::polynomial::{interpolate_pair, poly_eval, poly_mul};
use mvzk_field::{Embedding, Gf2k, Sample};
use static_assertions::const_assert;

use super::{complain_cheaters, randomize_to_inner_product};
use crate::bitio::{BitRead, BitWrite, BufferBitReader, BufferBitWriter, FileBitReader};
use crate::circuit::Circuit;
use crate::net::Transport;
use crate::player::Player;
use crate::prng::Prng;
use crate::transcript::{FsProofStream, HashableBitWriter};

/// Number of verifiers.
pub const N: usize = 4;
/// Corruption threshold; also the sharing polynomial degree.
pub const T: usize = 1;
/// Share field degree; must fit the N+1 party coordinates.
pub const K: usize = 3;
/// Check field degree; the multiplication checks happen here.
pub const K_EXT: usize = 87;
/// Triples combined per compression round. The transcript grows by
/// `log_COMPRESSION(n) * (2 * COMPRESSION - 1)` check elements.
pub const COMPRESSION: usize = 2;
pub const PREPROCESSING_REPETITIONS: usize = (40 + K - 1) / K;
pub const PREPROCESSING_REPETITIONS_EXT: usize = (40 + K_EXT - 1) / K_EXT;

const_assert!(K_EXT >= K && K_EXT % K == 0);
const_assert!(N >= 3 * T + 1);
const_assert!((1u128 << K) >= (N + 1) as u128);
// Recovering the implicit product-polynomial coefficient is only
// implemented for pairwise compression.
const_assert!(COMPRESSION == 2);

pub type ShareEl = Gf2k<K>;
pub type CheckEl = Gf2k<K_EXT>;

fn padded_chunk(chunk: &[CheckEl]) -> [CheckEl; COMPRESSION] {
    let mut pts = [CheckEl::ZERO; COMPRESSION];
    pts[..chunk.len()].copy_from_slice(chunk);
    pts
}

/// One prover compression round: commit to the sum of pairwise product
/// polynomials (masked), derive the challenge, and evaluate every pair at
/// it. Returns the new inner-product claim and the halved triple vectors.
fn commit_and_compress(
    xs: &[CheckEl],
    ys: &[CheckEl],
    preprocessing: &mut impl BitRead,
    output: &mut HashableBitWriter,
) -> Result<(CheckEl, Vec<CheckEl>, Vec<CheckEl>)> {
    let mut product_poly = [CheckEl::ZERO; 2 * COMPRESSION - 1];
    for (xc, yc) in xs.chunks(COMPRESSION).zip(ys.chunks(COMPRESSION)) {
        let to_add = poly_mul(
            &interpolate_pair(padded_chunk(xc)),
            &interpolate_pair(padded_chunk(yc)),
        );
        for (acc, v) in product_poly.iter_mut().zip(to_add) {
            *acc += v;
        }
    }

    // Commit to all but the last coefficient; that one is implied by the
    // running claim.
    for &coeff in &product_poly[..2 * COMPRESSION - 2] {
        let mask = preprocessing.read_element::<K_EXT>()?;
        output.write_element(mask - coeff)?;
    }

    let mut gen = output.hash_seed();
    let r = CheckEl::sample(&mut gen);

    let pre = interpolate_preprocess_range(COMPRESSION, r);
    let mut z = CheckEl::ZERO;
    let mut newxs = Vec::with_capacity(xs.len().div_ceil(COMPRESSION));
    let mut newys = Vec::with_capacity(newxs.capacity());
    for (xc, yc) in xs.chunks(COMPRESSION).zip(ys.chunks(COMPRESSION)) {
        let nx = interpolate_with_preprocessing(&pre, &padded_chunk(xc));
        let ny = interpolate_with_preprocessing(&pre, &padded_chunk(yc));
        z += nx * ny;
        newxs.push(nx);
        newys.push(ny);
    }
    debug_assert_eq!(z, poly_eval(&product_poly, r));
    Ok((z, newxs, newys))
}

/// Builds the proof transcript. Pure computation; the caller broadcasts it.
pub fn build_proof(circ: &Circuit, private_input: &Path, preprocessed: &Path) -> Result<Vec<u8>> {
    ensure!(
        circ.num_outputs() == 1 && circ.num_output_wires(0) == 1,
        "circuit must have a single one-bit output"
    );
    let mut input_bits = FileBitReader::open(private_input)?;
    let mut preprocessing = FileBitReader::open(preprocessed)?;
    let mut output = HashableBitWriter::new();

    let mut wires = Vec::new();
    for i in 0..circ.num_inputs() {
        for _ in 0..circ.num_input_wires(i) {
            let inp = input_bits.get_bit()?;
            let mask = preprocessing.read_element::<K>()?;
            output.write_element(mask - ShareEl::from_integer(inp as u128))?;
            wires.push(inp);
        }
    }

    let mut a_vals: Vec<CheckEl> = Vec::new();
    let mut b_vals: Vec<CheckEl> = Vec::new();
    let mut c_vals: Vec<CheckEl> = Vec::new();
    let out = circ.eval_custom(
        &wires,
        |&a, &b| Ok(a ^ b),
        |&a, &b| {
            let mask = preprocessing.read_element::<K>()?;
            output.write_element(mask - ShareEl::from_integer((a && b) as u128))?;
            a_vals.push(CheckEl::from_integer(a as u128));
            b_vals.push(CheckEl::from_integer(b as u128));
            c_vals.push(CheckEl::from_integer((a && b) as u128));
            Ok(a && b)
        },
        |&a| Ok(!a),
    )?;
    ensure!(!out, "circuit output is not zero for the provided witness");

    // Random multiplication triple so the final opened multiplication
    // leaks nothing about the circuit.
    let mut gen = Prng::from_entropy(0);
    let a = CheckEl::sample(&mut gen);
    let b = CheckEl::sample(&mut gen);
    let c = a * b;
    for value in [a, b, c] {
        let mask = preprocessing.read_element::<K_EXT>()?;
        output.write_element(mask - value)?;
    }
    a_vals.push(a);
    b_vals.push(b);
    c_vals.push(c);

    // First Fiat-Shamir challenge: randomize the triples into an
    // inner-product claim, then compress until one triple remains.
    let mut gen = output.hash_seed();
    let mut innerprod = randomize_to_inner_product(&mut a_vals, &c_vals, &mut gen);
    while a_vals.len() > 1 {
        let (z, xs, ys) = commit_and_compress(&a_vals, &b_vals, &mut preprocessing, &mut output)?;
        innerprod = z;
        a_vals = xs;
        b_vals = ys;
    }
    debug_assert_eq!(innerprod, a_vals[0] * b_vals[0]);

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

/// One verifier compression round, mirroring [`commit_and_compress`] over
/// shares: read the committed coefficients, recover the implicit one from
/// the running claim, and evaluate at the same challenge.
fn check_and_compress(
    innerprod: CheckEl,
    xs: &[CheckEl],
    ys: &[CheckEl],
    proof: &mut FsProofStream,
    preprocessing: &mut impl BitRead,
) -> Result<(CheckEl, Vec<CheckEl>, Vec<CheckEl>)> {
    let mut product_poly = [CheckEl::ZERO; 2 * COMPRESSION - 1];
    for coeff in product_poly[..2 * COMPRESSION - 2].iter_mut() {
        *coeff = preprocessing.read_element::<K_EXT>()? - proof.next::<K_EXT>()?;
    }
    product_poly[2 * COMPRESSION - 2] = recover_final_coefficient(&product_poly, innerprod);

    let mut gen = proof.hash_seed();
    let r = CheckEl::sample(&mut gen);

    let z = poly_eval(&product_poly, r);
    let pre = interpolate_preprocess_range(COMPRESSION, r);
    let mut newxs = Vec::with_capacity(xs.len().div_ceil(COMPRESSION));
    let mut newys = Vec::with_capacity(newxs.capacity());
    for (xc, yc) in xs.chunks(COMPRESSION).zip(ys.chunks(COMPRESSION)) {
        newxs.push(interpolate_with_preprocessing(&pre, &padded_chunk(xc)));
        newys.push(interpolate_with_preprocessing(&pre, &padded_chunk(yc)));
    }
    Ok((z, newxs, newys))
}

/// Recovers the product polynomial's trailing coefficient from the
/// invariant `h(0) + ... + h(COMPRESSION - 1) = sum`. With pairwise
/// compression, `h(0) + h(1) = p0 + (p0 + p1 + p2) = p1 + p2`.
fn recover_final_coefficient(poly: &[CheckEl; 2 * COMPRESSION - 1], sum: CheckEl) -> CheckEl {
    sum - poly[1]
}

fn open_secret(xcoords: &[CheckEl], shares: &[CheckEl], what: &str) -> Option<CheckEl> {
    match decode(xcoords, shares, T, T) {
        Ok((poly, cheaters)) => {
            complain_cheaters(&cheaters, what);
            Some(poly[0])
        }
        Err(err) => {
            ::log::warn!("failed to reconstruct {what}: {err}");
            None
        }
    }
}

fn open_and_check<Tr: Transport>(
    me: &mut Player<Tr>,
    to_open: &mut BufferBitWriter,
    lift: &Embedding<K, K_EXT>,
) -> Result<bool> {
    let mine = to_open.drain();
    me.send_all(&mine, Some(0))?;
    let mut raw = me.recv_from_all(Some(0))?;
    raw[me.index()] = mine;

    let mut readers: Vec<BufferBitReader> =
        raw.drain(..).skip(1).map(BufferBitReader::new).collect();
    let xcoords: Vec<CheckEl> = (1..=N)
        .map(|i| lift.apply(ShareEl::from_integer(i as u128)))
        .collect();
    let mut next_row = move |readers: &mut Vec<BufferBitReader>| -> Result<Vec<CheckEl>> {
        readers
            .iter_mut()
            .map(|r| r.read_element::<K_EXT>().map_err(Into::into))
            .collect()
    };

    let mut ok = true;
    // The final multiplication triple.
    let shares_a = next_row(&mut readers)?;
    let shares_b = next_row(&mut readers)?;
    let shares_c = next_row(&mut readers)?;
    let a = open_secret(&xcoords, &shares_a, "opening of the final multiplication");
    let b = open_secret(&xcoords, &shares_b, "opening of the final multiplication");
    let c = open_secret(&xcoords, &shares_c, "opening of the final multiplication");
    match (a, b, c) {
        (Some(a), Some(b), Some(c)) => {
            if a * b != c {
                ::log::warn!("final multiplication is incorrect");
                ok = false;
            }
        }
        _ => ok = false,
    }

    // The circuit output.
    let shares_out = next_row(&mut readers)?;
    match open_secret(&xcoords, &shares_out, "opening of the circuit output") {
        Some(out) if out == CheckEl::ZERO => {}
        Some(_) => {
            ::log::warn!("circuit output does not reconstruct to zero");
            ok = false;
        }
        None => ok = false,
    }
    Ok(ok)
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
    let lift = Embedding::<K, K_EXT>::new();
    let mut preprocessing = FileBitReader::open(preprocessed)?;
    let mut proof = FsProofStream::new(proof_raw);

    let mut wires: Vec<ShareEl> = Vec::new();
    for i in 0..circ.num_inputs() {
        for _ in 0..circ.num_input_wires(i) {
            let mask = preprocessing.read_element::<K>()?;
            let diff = proof.next::<K>()?;
            wires.push(mask - diff);
        }
    }

    let mut a_shares: Vec<CheckEl> = Vec::new();
    let mut b_shares: Vec<CheckEl> = Vec::new();
    let mut c_shares: Vec<CheckEl> = Vec::new();
    let circ_out = {
        let out = circ.eval_custom(
            &wires,
            |&a, &b| Ok(a + b),
            |&a, &b| {
                let c = preprocessing.read_element::<K>()? - proof.next::<K>()?;
                a_shares.push(lift.apply(a));
                b_shares.push(lift.apply(b));
                c_shares.push(lift.apply(c));
                Ok(c)
            },
            |&a| Ok(a + ShareEl::ONE),
        )?;
        lift.apply(out)
    };

    // Shares of the prover's random masking triple.
    for dst in [&mut a_shares, &mut b_shares, &mut c_shares] {
        let mask = preprocessing.read_element::<K_EXT>()?;
        let diff = proof.next::<K_EXT>()?;
        dst.push(mask - diff);
    }

    let mut gen = proof.hash_seed();
    let mut innerprod = randomize_to_inner_product(&mut a_shares, &c_shares, &mut gen);
    while a_shares.len() > 1 {
        let (z, xs, ys) =
            check_and_compress(innerprod, &a_shares, &b_shares, &mut proof, &mut preprocessing)?;
        innerprod = z;
        a_shares = xs;
        b_shares = ys;
    }

    let mut to_open = BufferBitWriter::new();
    to_open.write_element(a_shares[0])?;
    to_open.write_element(b_shares[0])?;
    to_open.write_element(innerprod)?;
    to_open.write_element(circ_out)?;
    open_and_check(me, &mut to_open, &lift)
}

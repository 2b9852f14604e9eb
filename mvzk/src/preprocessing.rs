//! Offline generation of correlated random shares.
//!
//! Each verifier deals random degree-T polynomials, sending the constant
//! term to the prover and one evaluation to each verifier. Random linear
//! combinations (under a jointly committed coin) are opened and checked
//! against the prover's view, and the surviving secrets are stretched by a
//! Vandermonde matrix into the final outputs. The prover's output file thus
//! holds the masks, and each verifier's file its Shamir share of them.

use anyhow::Result;
use mvzk_field::coding::{encode, interpolate_preprocess, interpolate_with_preprocessing};
use mvzk_field::{Gf2k, Sample};

use crate::bitio::{BitRead, BitWrite, BufferBitReader, BufferBitWriter};
use crate::net::Transport;
use crate::player::Player;
use crate::prng::Prng;

/// How many secrets to deal so that `nout` outputs plus the check
/// combinations survive the (n - t)-wise extension.
pub fn secrets_to_sample(nout: usize, repetitions: usize, n: usize, t: usize) -> usize {
    (nout + repetitions + (n - t - 1)) / (n - t)
}

fn receive_column<T: Transport, const K: usize>(
    me: &mut Player<T>,
    secrets: &mut [Vec<Gf2k<K>>],
    p: usize,
) -> Result<()> {
    let data = me.recv_from_signed(p)?;
    let mut reader = BufferBitReader::new(data);
    for row in secrets.iter_mut() {
        row[p - 1] = reader.read_element::<K>()?;
    }
    Ok(())
}

/// Deals `num_samples` degree-`t` sharings per verifier and gathers the
/// shares addressed to us; `secrets[i][p-1]` is what verifier `p` dealt in
/// round `i` (for the prover: the constant terms).
///
/// The exchange is deadlock-free by construction: send to lower-indexed
/// peers ascending, receive from higher ascending, send to higher
/// descending, receive from lower ascending. The prover only receives.
pub fn sample_shares<T: Transport, const K: usize>(
    me: &mut Player<T>,
    gen: &mut Prng,
    num_samples: usize,
    t: usize,
    xcoords: &[Gf2k<K>],
) -> Result<Vec<Vec<Gf2k<K>>>> {
    let n = xcoords.len();
    let mut secrets = vec![vec![Gf2k::ZERO; n]; num_samples];

    if me.index() != 0 {
        let mut queues: Vec<BufferBitWriter> =
            (0..=n).map(|_| BufferBitWriter::new()).collect();
        for i in 0..num_samples {
            let poly: Vec<Gf2k<K>> = (0..=t).map(|_| Gf2k::sample(gen)).collect();
            queues[0].write_element(poly[0])?;
            let shares = encode(xcoords, &poly);
            for p in 1..=n {
                if p == me.index() {
                    secrets[i][p - 1] = shares[p - 1];
                } else {
                    queues[p].write_element(shares[p - 1])?;
                }
            }
        }

        for p in 0..me.index() {
            let data = queues[p].drain();
            me.send_to_signed(p, &data)?;
        }
        for p in me.index() + 1..=n {
            receive_column(me, &mut secrets, p)?;
        }
        for p in (me.index() + 1..=n).rev() {
            let data = queues[p].drain();
            me.send_to_signed(p, &data)?;
        }
        for p in 1..me.index() {
            receive_column(me, &mut secrets, p)?;
        }
    } else {
        for p in 1..=n {
            receive_column(me, &mut secrets, p)?;
        }
    }
    Ok(secrets)
}

/// Opens `repetitions` random linear combinations of the dealt secrets and
/// checks them: reconstruction from the first t+1 shares must match the
/// remaining shares, and the opened value must match the prover's
/// combination of constant terms. Returns whether everything matched.
pub fn check_linear_combinations<T: Transport, const K: usize>(
    me: &mut Player<T>,
    gen: &mut Prng,
    secrets: &[Vec<Gf2k<K>>],
    repetitions: usize,
    t: usize,
    xcoords: &[Gf2k<K>],
) -> Result<bool> {
    let n = xcoords.len();
    me.commit_open_seed(gen, None)?;

    let mut lincombs = BufferBitWriter::new();
    for _ in 0..repetitions {
        let mut comb = Gf2k::ZERO;
        for row in secrets {
            for &secret in row {
                let coeff = Gf2k::sample(gen);
                comb += coeff * secret;
            }
        }
        lincombs.write_element(comb)?;
    }

    // Small payload; plain broadcast then gather cannot deadlock.
    let my_combinations = lincombs.drain();
    me.send_all(&my_combinations, None)?;

    let mut shares_raw = me.recv_from_all(Some(0))?;
    let expected_raw = if me.index() == 0 {
        my_combinations
    } else {
        shares_raw[me.index()] = my_combinations;
        me.recv_from(0)?
    };

    let mut share_readers: Vec<BufferBitReader> = shares_raw
        .drain(..)
        .skip(1)
        .map(BufferBitReader::new)
        .collect();
    let mut expected_reader = BufferBitReader::new(expected_raw);

    let interp_xcoords = &xcoords[..t + 1];
    let mut interp_pre: Vec<Vec<Gf2k<K>>> = (t + 1..n)
        .map(|i| interpolate_preprocess(interp_xcoords, xcoords[i]))
        .collect();
    interp_pre.push(interpolate_preprocess(interp_xcoords, Gf2k::ZERO));

    let mut ok = true;
    for _ in 0..repetitions {
        let mut d = Vec::with_capacity(t + 1);
        for reader in &mut share_readers[..t + 1] {
            d.push(reader.read_element::<K>()?);
        }
        for p in t + 1..n {
            let to_check = share_readers[p].read_element::<K>()?;
            if to_check != interpolate_with_preprocessing(&interp_pre[p - t - 1], &d) {
                log::warn!("inconsistency detected in random linear combination sharing");
            }
        }
        let opened = interpolate_with_preprocessing(interp_pre.last().unwrap(), &d);
        let expected = expected_reader.read_element::<K>()?;
        ok &= opened == expected;
    }
    Ok(ok)
}

/// Stretches the per-round secrets by the (n - t)-column Vandermonde
/// matrix.
pub fn vandermonde_extend<const K: usize>(
    secrets: &[Vec<Gf2k<K>>],
    n: usize,
    t: usize,
) -> Vec<Gf2k<K>> {
    let cols = n - t;
    let mut res = vec![Gf2k::ZERO; cols * secrets.len()];
    for (i, row) in secrets.iter().enumerate() {
        for j in 0..cols {
            let base = Gf2k::from_integer(j as u128 + 1);
            let mut coeff = base;
            for &secret in row {
                res[i * cols + j] += coeff * secret;
                coeff *= base;
            }
        }
    }
    res
}

/// Runs the whole preprocessing for one field: deal, check, extend. Returns
/// `None` when the linear combination check failed (reported, not fatal).
pub fn generate_field<T: Transport, const K: usize>(
    me: &mut Player<T>,
    seed_idx: u32,
    nout: usize,
    repetitions: usize,
    t: usize,
    xcoords: &[Gf2k<K>],
) -> Result<Option<Vec<Gf2k<K>>>> {
    let n = xcoords.len();
    let mut gen = Prng::from_entropy(seed_idx);
    let num_samples = secrets_to_sample(nout, repetitions, n, t);
    let secrets = sample_shares(me, &mut gen, num_samples, t, xcoords)?;
    if !check_linear_combinations(me, &mut gen, &secrets, repetitions, t, xcoords)? {
        log::warn!("random linear combinations do not open to the prover's values");
        return Ok(None);
    }
    let mut out = vandermonde_extend(&secrets, n, t);
    out.truncate(nout);
    Ok(Some(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mvzk_field::coding::default_xcoords;
    use mvzk_field::decoder::decode;

    /// The prover's outputs must be the secrets the verifiers' share files
    /// reconstruct to, column by column.
    #[test]
    fn shares_reconstruct_to_prover_masks() {
        const K: usize = 27;
        const N: usize = 4;
        const T: usize = 1;
        let nout = 12;
        let reps = 2;

        let handles: Vec<_> = crate::net::LocalMesh::create(N + 1)
            .into_iter()
            .map(|mesh| {
                std::thread::spawn(move || {
                    let mut me = Player::new(mesh);
                    let xcoords = default_xcoords::<K>(N);
                    let idx = me.index() as u32;
                    let out = generate_field(&mut me, idx, nout, reps, T, &xcoords)
                        .unwrap()
                        .expect("honest run passes the check");
                    (me.index(), out)
                })
            })
            .collect();

        let mut outputs: Vec<(usize, Vec<Gf2k<K>>)> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        outputs.sort_by_key(|(idx, _)| *idx);

        let xcoords = default_xcoords::<K>(N);
        for i in 0..nout {
            let shares: Vec<Gf2k<K>> = (1..=N).map(|p| outputs[p].1[i]).collect();
            let (poly, cheaters) = decode(&xcoords, &shares, T, T).unwrap();
            assert!(cheaters.is_empty());
            assert_eq!(poly[0], outputs[0].1[i], "mask {i} does not match");
        }
    }
}

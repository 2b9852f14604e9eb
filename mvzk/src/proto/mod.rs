//! The three proof flavours.
//!
//! All share the same outer shape: the prover evaluates the circuit over
//! its private input bits, publishing each input bit and each AND output
//! masked by the next preprocessed value; every verifier mirrors the
//! evaluation over its Shamir shares of those masks, so wire by wire it
//! holds a share of the prover's value. What differs is how the
//! multiplication triples collected along the way are checked.

use mvzk_field::{Gf2k, Sample};

use crate::prng::Prng;

pub mod log;
pub mod tn3;
pub mod tn4;

/// Randomizes multiplication triples `x_i * y_i = z_i` into one
/// inner-product claim `<{r_i x_i}, {y_i}> = sum r_i z_i`.
///
/// `xs` is scaled in place; the returned value is `sum r_i z_i`. The
/// coefficients come from `gen`, which the caller has seeded from the
/// transcript (or from a verifier challenge).
pub(crate) fn randomize_to_inner_product<const K: usize>(
    xs: &mut [Gf2k<K>],
    zs: &[Gf2k<K>],
    gen: &mut Prng,
) -> Gf2k<K> {
    debug_assert_eq!(xs.len(), zs.len());
    let mut res = Gf2k::ZERO;
    for (x, &z) in xs.iter_mut().zip(zs) {
        let r = Gf2k::sample(gen);
        *x *= r;
        res += z * r;
    }
    res
}

/// Logs the parties whose shares disagreed with the decoded codeword.
pub(crate) fn complain_cheaters(cheaters: &[usize], what: &str) {
    if !cheaters.is_empty() {
        ::log::warn!("the following parties tried to cheat on {what}: {cheaters:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_product_claim_holds() {
        type F = Gf2k<87>;
        let mut gen = Prng::from_seed(&[42u8; 32]);
        let mut xs = F::rand_vec(10);
        let ys = F::rand_vec(10);
        let zs: Vec<F> = xs.iter().zip(&ys).map(|(&x, &y)| x * y).collect();

        let claim = randomize_to_inner_product(&mut xs, &zs, &mut gen);
        let inner: F = xs.iter().zip(&ys).map(|(&x, &y)| x * y).sum();
        assert_eq!(claim, inner);
    }
}

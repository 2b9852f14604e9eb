//! Berlekamp-Welch decoding of Reed-Solomon shares with error reporting.

use thiserror::Error;

use crate::coding::encode;
use crate::gf2k::Gf2k;

/// A sharing that cannot be decoded as claimed. Recoverable at the protocol
/// level: the caller logs the offending shares and carries on with the next
/// check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidSharing {
    #[error("linear system is inconsistent")]
    InconsistentSystem,
    #[error("division by zero polynomial")]
    ZeroPolynomialDivisor,
    #[error("output degree too large")]
    OutputDegreeTooLarge,
    #[error("non-zero remainder after polynomial division")]
    NonZeroRemainder,
}

/// Classical long division of `f` by `g`, as polynomials of fixed lengths.
///
/// Any coefficient of `f` that would land above the quotient must be zero,
/// and the division must be exact; both conditions failing mean the decoded
/// rational function was not a polynomial, i.e. the sharing was invalid.
pub fn poly_div<const K: usize>(
    f: &[Gf2k<K>],
    g: &[Gf2k<K>],
) -> Result<Vec<Gf2k<K>>, InvalidSharing> {
    let (lf, lg) = (f.len(), g.len());
    debug_assert!(lf >= lg);
    let mut f = f.to_vec();
    let mut res = vec![Gf2k::ZERO; lf - lg + 1];

    // Most significant coefficient of the divisor.
    let mut div = Gf2k::ZERO;
    let mut msc = None;
    for i in (0..lg).rev() {
        if !g[i].is_zero() {
            div = g[i].inverse();
            msc = Some(i);
            break;
        }
    }
    let msc = msc.ok_or(InvalidSharing::ZeroPolynomialDivisor)?;

    // Everything that would produce a larger output polynomial must be zero.
    let f_end = lf - lg + msc + 1;
    if f[f_end..].iter().any(|c| !c.is_zero()) {
        return Err(InvalidSharing::OutputDegreeTooLarge);
    }

    for i in (msc..f_end).rev() {
        let el = div * f[i];
        res[i - msc] = el;
        for j in 0..msc {
            let sub = el * g[j];
            f[i - msc + j] -= sub;
        }
    }
    if f[..msc].iter().any(|c| !c.is_zero()) {
        return Err(InvalidSharing::NonZeroRemainder);
    }
    Ok(res)
}

/// Gauss-Jordan elimination with partial pivoting over GF(2^k).
///
/// Free variables resolve to zero; a pivotless row with a non-zero
/// right-hand side makes the system inconsistent.
fn solve<const K: usize>(
    mut m: Vec<Vec<Gf2k<K>>>,
    mut y: Vec<Gf2k<K>>,
) -> Result<Vec<Gf2k<K>>, InvalidSharing> {
    let l = y.len();
    let mut row = 0;
    for col in 0..l {
        if m[row][col].is_zero() {
            match (row + 1..l).find(|&j| !m[j][col].is_zero()) {
                Some(j) => {
                    m.swap(row, j);
                    y.swap(row, j);
                }
                // No pivot in this column; stay on this row.
                None => continue,
            }
        }

        let t = m[row][col].inverse();
        for j in col..l {
            m[row][j] *= t;
        }
        y[row] *= t;
        for j in 0..l {
            if j == row {
                continue;
            }
            let factor = m[j][col];
            if factor.is_zero() {
                continue;
            }
            for c in 0..l {
                let sub = factor * m[row][c];
                m[j][c] -= sub;
            }
            let sub = factor * y[row];
            y[j] -= sub;
        }
        row += 1;
        if row == l {
            break;
        }
    }
    if y[row..].iter().any(|v| !v.is_zero()) {
        return Err(InvalidSharing::InconsistentSystem);
    }

    let mut res = vec![Gf2k::ZERO; l];
    let mut col = 0;
    for i in 0..row {
        while col < l && m[i][col].is_zero() {
            col += 1;
        }
        if col >= l {
            break;
        }
        res[col] = y[i];
    }
    Ok(res)
}

/// Recovers the degree-`d` message polynomial from `shares` at `xcoords`,
/// tolerating up to `e` erroneous shares.
///
/// Solves for f1 = f * f2 and the error locator f2 (with f2(0) = 1) in
/// `f1(x_i) = y_i * f2(x_i)`, then divides. Requires
/// `shares.len() >= d + 2e + 1`.
pub fn berlekamp_welch<const K: usize>(
    xcoords: &[Gf2k<K>],
    shares: &[Gf2k<K>],
    d: usize,
    e: usize,
) -> Result<Vec<Gf2k<K>>, InvalidSharing> {
    let l = d + 2 * e + 1;
    assert!(
        shares.len() >= l && xcoords.len() == shares.len(),
        "cannot do error recovery with the given parameters"
    );
    let mut m = vec![vec![Gf2k::ZERO; l]; l];
    let mut y = vec![Gf2k::ZERO; l];
    for i in 0..l {
        // Coefficients of f1(x).
        let mut a = Gf2k::ONE;
        for j in 0..d + e + 1 {
            m[i][j] = a;
            a *= xcoords[i];
        }
        // Coefficients of f2(x), skipping the fixed f2(0) = 1.
        let mut a = Gf2k::ONE;
        for j in d + e + 1..l {
            a *= xcoords[i];
            m[i][j] = shares[i] * a;
        }
        y[i] = shares[i];
    }
    let sol = solve(m, y)?;

    let f1 = &sol[..d + e + 1];
    let mut f2 = vec![Gf2k::ONE];
    f2.extend_from_slice(&sol[d + e + 1..]);
    poly_div(f1, &f2)
}

/// Decodes `shares` back into the degree-`d` polynomial, reporting the
/// 1-based indices of shares that disagree with the recovered codeword.
pub fn decode<const K: usize>(
    xcoords: &[Gf2k<K>],
    shares: &[Gf2k<K>],
    d: usize,
    e: usize,
) -> Result<(Vec<Gf2k<K>>, Vec<usize>), InvalidSharing> {
    assert!(shares.len() > d + 2 * e, "cannot do error recovery with the given parameters");
    let poly = berlekamp_welch(xcoords, shares, d, e)?;
    let recovered = encode(xcoords, &poly);
    let cheaters = shares
        .iter()
        .zip(&recovered)
        .enumerate()
        .filter(|(_, (s, r))| s != r)
        .map(|(i, _)| i + 1)
        .collect();
    Ok((poly, cheaters))
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::coding::default_xcoords;
    use crate::gf2k::Sample;

    #[test]
    fn decode_flipped_share_reports_cheater() {
        // N = 4, T = 1, K = 4: shares of 3 + 7x, with share 2 corrupted.
        type F = Gf2k<4>;
        let poly = [F::from_integer(3), F::from_integer(7)];
        let xs = default_xcoords::<4>(4);
        let mut shares = encode(&xs, &poly);
        shares[1] += F::from_integer(5);

        let (recovered, cheaters) = decode(&xs, &shares, 1, 1).unwrap();
        assert_eq!(recovered, poly.to_vec());
        assert_eq!(cheaters, vec![2]);
    }

    #[test]
    fn decode_honest_shares() {
        type F = Gf2k<27>;
        let poly = F::rand_vec(3);
        let xs = default_xcoords::<27>(7);
        let shares = encode(&xs, &poly);
        let (recovered, cheaters) = decode(&xs, &shares, 2, 2).unwrap();
        assert_eq!(recovered, poly);
        assert!(cheaters.is_empty());
    }

    #[test]
    fn fuzz_error_recovery() {
        type F = Gf2k<27>;
        let mut rng = StdRng::seed_from_u64(0x1f2e3d4c);
        let (n, d) = (10usize, 2usize);
        let e = (n - 1 - d) / 2;
        let xs = default_xcoords::<27>(n);
        for _ in 0..500 {
            let poly: Vec<F> = (0..d + 1).map(|_| F::sample(&mut rng)).collect();
            let mut shares = encode(&xs, &poly);

            let n_errors = rng.gen_range(0..=e);
            let mut tampered = Vec::new();
            while tampered.len() < n_errors {
                let i = rng.gen_range(0..n);
                if !tampered.contains(&i) {
                    tampered.push(i);
                    shares[i] += F::from_integer(1 + rng.gen_range(0..100));
                }
            }
            tampered.sort_unstable();

            let (recovered, mut cheaters) = decode(&xs, &shares, d, e).unwrap();
            assert_eq!(recovered, poly);
            cheaters.iter_mut().for_each(|c| *c -= 1);
            assert_eq!(cheaters, tampered);
        }
    }

    #[test]
    fn too_many_errors_is_detected() {
        // With e errors beyond the bound, decoding either fails or the
        // re-encoding comparison exposes the mismatches; it never silently
        // accepts the tampered codeword as error-free.
        type F = Gf2k<27>;
        let mut rng = StdRng::seed_from_u64(77);
        let xs = default_xcoords::<27>(5);
        for _ in 0..100 {
            let poly: Vec<F> = (0..2).map(|_| F::sample(&mut rng)).collect();
            let mut shares = encode(&xs, &poly);
            for s in shares.iter_mut().take(3) {
                *s += F::from_integer(1 + rng.gen_range(0..50));
            }
            match decode(&xs, &shares, 1, 1) {
                Ok((recovered, cheaters)) => {
                    assert!(recovered != poly || !cheaters.is_empty());
                }
                Err(_) => {}
            }
        }
    }

    #[test]
    fn division_by_zero_polynomial() {
        type F = Gf2k<8>;
        let f = vec![F::ONE, F::ONE, F::ONE];
        let g = vec![F::ZERO, F::ZERO];
        assert_eq!(poly_div(&f, &g), Err(InvalidSharing::ZeroPolynomialDivisor));
    }

    #[test]
    fn exact_division_round_trip() {
        type F = Gf2k<27>;
        let q = F::rand_vec(3);
        let g = {
            let mut g = F::rand_vec(2);
            if g[1].is_zero() {
                g[1] = F::ONE;
            }
            g
        };
        let f = crate::polynomial::poly_mul(&q, &g);
        assert_eq!(poly_div(&f, &g).unwrap(), q);
    }
}

//! Reed-Solomon encoding and Lagrange interpolation over GF(2^k).

use crate::gf2k::Gf2k;
use crate::polynomial::poly_eval;

/// Encodes a message polynomial by evaluating it at each of the given
/// x-coordinates.
pub fn encode<const K: usize>(xcoords: &[Gf2k<K>], message: &[Gf2k<K>]) -> Vec<Gf2k<K>> {
    xcoords.iter().map(|&x| poly_eval(message, x)).collect()
}

/// The default share x-coordinates `1..=n`.
pub fn default_xcoords<const K: usize>(n: usize) -> Vec<Gf2k<K>> {
    (1..=n as u128).map(Gf2k::from_integer).collect()
}

/// The Lagrange basis value `l_j(x)` for interpolation point `coord` among
/// `xcoords`.
fn lagrange_basis<const K: usize>(xcoords: &[Gf2k<K>], coord: Gf2k<K>, x: Gf2k<K>) -> Gf2k<K> {
    let mut num = Gf2k::ONE;
    let mut denom = Gf2k::ONE;
    for &m in xcoords {
        if m == coord {
            continue;
        }
        num *= x - m;
        denom *= coord - m;
    }
    num * denom.inverse()
}

/// `l_j(x)` for interpolation on the integer points `0..npoints`.
fn lagrange_basis_at_integers<const K: usize>(npoints: usize, j: usize, x: Gf2k<K>) -> Gf2k<K> {
    let el_j = Gf2k::from_integer(j as u128);
    let mut num = Gf2k::ONE;
    let mut denom = Gf2k::ONE;
    for m in 0..npoints as u128 {
        let el_m = Gf2k::from_integer(m);
        if el_m == el_j {
            continue;
        }
        num *= x - el_m;
        denom *= el_j - el_m;
    }
    num * denom.inverse()
}

/// Interpolates the values `ys` at the integer points `0..ys.len()` and
/// evaluates the interpolant at `x`.
pub fn interpolate<const K: usize>(ys: &[Gf2k<K>], x: Gf2k<K>) -> Gf2k<K> {
    assert!(
        (ys.len() as u128) < 1u128 << K.min(63),
        "too many interpolation points for the field"
    );
    ys.iter()
        .enumerate()
        .map(|(j, &y)| y * lagrange_basis_at_integers(ys.len(), j, x))
        .sum()
}

/// Precomputes the vector of Lagrange multipliers for evaluating, at `x`, a
/// polynomial given by its values at `xcoords`.
pub fn interpolate_preprocess<const K: usize>(xcoords: &[Gf2k<K>], x: Gf2k<K>) -> Vec<Gf2k<K>> {
    xcoords
        .iter()
        .map(|&coord| lagrange_basis(xcoords, coord, x))
        .collect()
}

/// As [`interpolate_preprocess`], for the integer points `0..npoints`.
pub fn interpolate_preprocess_range<const K: usize>(npoints: usize, x: Gf2k<K>) -> Vec<Gf2k<K>> {
    (0..npoints)
        .map(|j| lagrange_basis_at_integers(npoints, j, x))
        .collect()
}

/// Finishes an interpolation from precomputed multipliers: `sum l_i * y_i`.
pub fn interpolate_with_preprocessing<const K: usize>(
    pre: &[Gf2k<K>],
    ys: &[Gf2k<K>],
) -> Gf2k<K> {
    debug_assert_eq!(pre.len(), ys.len());
    pre.iter().zip(ys).map(|(&l, &y)| l * y).sum()
}

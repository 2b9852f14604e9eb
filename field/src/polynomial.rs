use crate::gf2k::Gf2k;

/// Evaluates the polynomial with coefficient `poly[i]` at `x^i`, by
/// accumulating `c_i * x^i` left to right.
pub fn poly_eval<const K: usize>(poly: &[Gf2k<K>], x: Gf2k<K>) -> Gf2k<K> {
    let mut pt = Gf2k::ONE;
    let mut res = Gf2k::ZERO;
    for &c in poly {
        res += c * pt;
        pt *= x;
    }
    res
}

/// Schoolbook product; the result has length `|f| + |g| - 1`.
pub fn poly_mul<const K: usize>(f: &[Gf2k<K>], g: &[Gf2k<K>]) -> Vec<Gf2k<K>> {
    let mut res = vec![Gf2k::ZERO; f.len() + g.len() - 1];
    for (i, &a) in f.iter().enumerate() {
        for (j, &b) in g.iter().enumerate() {
            res[i + j] += a * b;
        }
    }
    res
}

/// The degree-1 polynomial through `(0, vals[0])` and `(1, vals[1])`.
pub fn interpolate_pair<const K: usize>(vals: [Gf2k<K>; 2]) -> [Gf2k<K>; 2] {
    [vals[0], vals[1] - vals[0]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gf2k::Sample;

    type F = Gf2k<27>;

    #[test]
    fn eval_constant_and_linear() {
        let c = F::from_integer(11);
        assert_eq!(poly_eval(&[c], F::from_integer(5)), c);

        // 3 + 2x at x = 1 is 3 ^ 2 = 1.
        let poly = [F::from_integer(3), F::from_integer(2)];
        assert_eq!(poly_eval(&poly, F::ONE), F::from_integer(1));
        assert_eq!(poly_eval(&poly, F::ZERO), F::from_integer(3));
    }

    #[test]
    fn mul_degrees_add() {
        let f = F::rand_vec(4);
        let g = F::rand_vec(3);
        let prod = poly_mul(&f, &g);
        assert_eq!(prod.len(), 6);
        for &x in &F::rand_vec(8) {
            assert_eq!(poly_eval(&prod, x), poly_eval(&f, x) * poly_eval(&g, x));
        }
    }

    #[test]
    fn pair_interpolation_hits_both_points() {
        let vals = [F::rand(), F::rand()];
        let poly = interpolate_pair(vals);
        assert_eq!(poly_eval(&poly, F::ZERO), vals[0]);
        assert_eq!(poly_eval(&poly, F::ONE), vals[1]);
    }
}

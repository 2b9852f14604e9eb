use crate::gf2k::Gf2k;

/// The canonical GF(2)-algebra injection GF(2^K) -> GF(2^K2), for K | K2.
///
/// Determined by the images of the standard basis of GF(2^K): `basis[i]` is
/// `r^i` where `r` is a fixed root of the degree-K reduction polynomial
/// inside GF(2^K2). The construction is deterministic, so every party in a
/// protocol run arrives at the same embedding, and it preserves both `+` and
/// `*` because it extends a ring homomorphism of GF(2)[x].
///
/// Built per context rather than cached globally; construction enumerates
/// the 2^K-element subfield, so it is intended for the small K the protocols
/// lift from.
pub struct Embedding<const K: usize, const K2: usize> {
    basis: [Gf2k<K2>; K],
}

impl<const K: usize, const K2: usize> Embedding<K, K2> {
    const DIVIDES: () = assert!(K2 % K == 0, "no subfield of the requested size exists");

    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let _ = Self::DIVIDES;
        let basis: Vec<Gf2k<K2>> = if K == K2 {
            (0..K).map(|i| Gf2k::from_integer(1u128 << i)).collect()
        } else {
            let root = find_subfield_root::<K, K2>();
            let mut powers = Vec::with_capacity(K);
            let mut acc = Gf2k::<K2>::ONE;
            for _ in 0..K {
                powers.push(acc);
                acc *= root;
            }
            powers
        };
        let basis = basis.try_into().ok().expect("basis has length K");
        Self { basis }
    }

    /// Maps `a` into the extension field.
    pub fn apply(&self, a: Gf2k<K>) -> Gf2k<K2> {
        let mut res = Gf2k::ZERO;
        let mut bits = a.to_integer();
        for &basis_el in &self.basis {
            if bits & 1 == 1 {
                res += basis_el;
            }
            bits >>= 1;
        }
        res
    }
}

impl<const K: usize, const K2: usize> Default for Embedding<K, K2> {
    fn default() -> Self {
        Self::new()
    }
}

/// Finds the numerically smallest root of the degree-K reduction polynomial
/// inside the GF(2^K) subfield of GF(2^K2).
fn find_subfield_root<const K: usize, const K2: usize>() -> Gf2k<K2> {
    assert!(K <= 24, "embedding construction is exponential in K");
    let m = K2 / K;

    // The relative trace z + z^(2^K) + ... + z^(2^(K(m-1))) lands in the
    // subfield; traces of successive integers span it.
    let mut echelon: Vec<u128> = Vec::new();
    let mut gens: Vec<Gf2k<K2>> = Vec::new();
    let mut c: u128 = 1;
    while gens.len() < K {
        let t = relative_trace::<K2>(Gf2k::from_integer(c), K, m);
        c += 1;
        let mut v = t.to_integer();
        for &row in &echelon {
            if (v ^ row) < v {
                v ^= row;
            }
        }
        if v == 0 {
            continue;
        }
        echelon.push(v);
        echelon.sort_unstable_by(|a, b| b.cmp(a));
        gens.push(t);
    }

    let exps = crate::gf2k::reduction_exponents_of(K);
    let mut best: Option<Gf2k<K2>> = None;
    for subset in 1u128..(1u128 << K) {
        let mut el = Gf2k::<K2>::ZERO;
        for (i, &g) in gens.iter().enumerate() {
            if (subset >> i) & 1 == 1 {
                el += g;
            }
        }
        // Evaluate p_K(el) = el^K + sum el^(a_i) + 1.
        let mut val = el.pow(K as u64) + Gf2k::ONE;
        for &e in exps {
            val += el.pow(e as u64);
        }
        if val.is_zero() && best.map_or(true, |b| el.to_integer() < b.to_integer()) {
            best = Some(el);
        }
    }
    best.expect("the reduction polynomial splits in the extension field")
}

fn relative_trace<const K2: usize>(z: Gf2k<K2>, k: usize, m: usize) -> Gf2k<K2> {
    let mut acc = z;
    let mut t = z;
    for _ in 1..m {
        for _ in 0..k {
            t = t.square();
        }
        acc += t;
    }
    acc
}

use core::fmt::{self, Debug, Display, Formatter};
use core::iter::{Product, Sum};
use core::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};
use std::sync::OnceLock;

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Number of monomials (3 = trinomial, 5 = pentanomial) of the canonical
/// irreducible polynomial for GF(2^k), indexed by k.
const NUM_REDUCTION_MONOMIALS: [u8; 129] = [
    0, 0, 3, 3, 3, 3, 3, 3, 5, 3, 3, 3, 3, 5, 3, 3,
    5, 3, 3, 5, 3, 3, 3, 3, 5, 3, 5, 5, 3, 3, 3, 3,
    5, 3, 3, 3, 3, 5, 5, 3, 5, 3, 3, 5, 3, 5, 3, 3,
    5, 3, 5, 5, 3, 5, 3, 3, 5, 3, 3, 5, 3, 5, 3, 3,
    5, 3, 3, 5, 3, 5, 5, 3, 5, 3, 3, 5, 3, 5, 5, 3,
    5, 3, 5, 5, 3, 5, 3, 3, 5, 3, 3, 5, 3, 3, 3, 3,
    5, 3, 3, 5, 3, 5, 3, 3, 5, 3, 3, 5, 3, 5, 3, 3,
    5, 3, 5, 5, 5, 5, 3, 3, 5, 3, 5, 3, 3, 5, 3, 3,
    5,
];

/// Interior exponents of the reduction polynomial
/// `x^k + x^(a_m) + ... + x^(a_1) + 1`, indexed by k. Trinomials use the
/// first slot only.
const REDUCTION_EXPONENTS: [[u32; 3]; 129] = [
    [0, 0, 0], [0, 0, 0], [1, 0, 0], [1, 0, 0], [1, 0, 0], [2, 0, 0],
    [1, 0, 0], [1, 0, 0], [1, 3, 4], [1, 0, 0], [3, 0, 0], [2, 0, 0],
    [3, 0, 0], [1, 3, 4], [5, 0, 0], [1, 0, 0], [1, 3, 5], [3, 0, 0],
    [3, 0, 0], [1, 2, 5], [3, 0, 0], [2, 0, 0], [1, 0, 0], [5, 0, 0],
    [1, 3, 4], [3, 0, 0], [1, 3, 4], [1, 2, 5], [1, 0, 0], [2, 0, 0],
    [1, 0, 0], [3, 0, 0], [2, 3, 7], [10, 0, 0], [7, 0, 0], [2, 0, 0],
    [9, 0, 0], [1, 4, 6], [1, 5, 6], [4, 0, 0], [3, 4, 5], [3, 0, 0],
    [7, 0, 0], [3, 4, 6], [5, 0, 0], [1, 3, 4], [1, 0, 0], [5, 0, 0],
    [2, 3, 5], [9, 0, 0], [2, 3, 4], [1, 3, 6], [3, 0, 0], [1, 2, 6],
    [9, 0, 0], [7, 0, 0], [2, 4, 7], [4, 0, 0], [19, 0, 0], [2, 4, 7],
    [1, 0, 0], [1, 2, 5], [29, 0, 0], [1, 0, 0], [1, 3, 4], [18, 0, 0],
    [3, 0, 0], [1, 2, 5], [9, 0, 0], [2, 5, 6], [1, 3, 5], [6, 0, 0],
    [3, 9, 10], [25, 0, 0], [35, 0, 0], [1, 3, 6], [21, 0, 0], [2, 5, 6],
    [3, 5, 6], [9, 0, 0], [2, 4, 9], [4, 0, 0], [1, 3, 8], [2, 4, 7],
    [5, 0, 0], [1, 2, 8], [21, 0, 0], [13, 0, 0], [2, 6, 7], [38, 0, 0],
    [27, 0, 0], [1, 5, 8], [21, 0, 0], [2, 0, 0], [21, 0, 0], [11, 0, 0],
    [6, 9, 10], [6, 0, 0], [11, 0, 0], [1, 3, 6], [15, 0, 0], [1, 6, 7],
    [29, 0, 0], [9, 0, 0], [1, 3, 4], [4, 0, 0], [15, 0, 0], [4, 7, 9],
    [17, 0, 0], [2, 4, 5], [33, 0, 0], [10, 0, 0], [3, 4, 5], [9, 0, 0],
    [2, 3, 5], [5, 7, 8], [1, 2, 4], [1, 2, 5], [33, 0, 0], [8, 0, 0],
    [1, 3, 4], [18, 0, 0], [1, 2, 6], [2, 0, 0], [19, 0, 0], [5, 6, 7],
    [21, 0, 0], [1, 0, 0], [1, 2, 7],
];

const fn low_bits_mask(k: usize) -> u128 {
    if k == 128 {
        u128::MAX
    } else {
        (1u128 << k) - 1
    }
}

/// Interior exponents of the reduction polynomial for GF(2^k).
pub(crate) fn reduction_exponents_of(k: usize) -> &'static [u32] {
    let interior = if NUM_REDUCTION_MONOMIALS[k] == 3 { 1 } else { 3 };
    &REDUCTION_EXPONENTS[k][..interior]
}

/// Carry-less 64x64 -> 128-bit multiplication.
///
/// Branch-free: every shifted addend is selected with an all-ones/all-zeros
/// mask derived from the corresponding multiplier bit. This is the portable
/// functional reference; a hardware CLMUL path must match it bit for bit.
fn clmul64(a: u64, b: u64) -> u128 {
    let a = a as u128;
    let mut acc = 0u128;
    for i in 0..64 {
        let bit = ((b >> i) & 1) as u128;
        acc ^= (a << i) & bit.wrapping_neg();
    }
    acc
}

/// 256-bit polynomial buffer for products of operands wider than 64 bits.
#[derive(Copy, Clone)]
struct U256 {
    lo: u128,
    hi: u128,
}

impl U256 {
    fn xor(self, other: Self) -> Self {
        Self {
            lo: self.lo ^ other.lo,
            hi: self.hi ^ other.hi,
        }
    }

    fn shr(self, s: u32) -> Self {
        if s == 0 {
            self
        } else if s < 128 {
            Self {
                lo: (self.lo >> s) | (self.hi << (128 - s)),
                hi: self.hi >> s,
            }
        } else {
            Self {
                lo: self.hi >> (s - 128),
                hi: 0,
            }
        }
    }

    fn shl(self, s: u32) -> Self {
        if s == 0 {
            self
        } else if s < 128 {
            Self {
                lo: self.lo << s,
                hi: (self.hi << s) | (self.lo >> (128 - s)),
            }
        } else {
            Self {
                lo: 0,
                hi: self.lo << (s - 128),
            }
        }
    }
}

/// Fold the bits at position >= k down by the reduction polynomial.
///
/// A single fold can leave up to max(a_i) bits above position k-1, so callers
/// apply it twice.
fn reduce_once_u128(x: u128, k: usize, exps: &[u32]) -> u128 {
    let hi = x >> k;
    let mut r = (x & low_bits_mask(k)) ^ hi;
    for &e in exps {
        r ^= hi << e;
    }
    r
}

fn reduce_once_u256(x: U256, k: usize, exps: &[u32]) -> U256 {
    let hi = x.shr(k as u32);
    let mut r = U256 {
        lo: x.lo & low_bits_mask(k),
        hi: 0,
    };
    r = r.xor(hi);
    for &e in exps {
        r = r.xor(hi.shl(e));
    }
    r
}

/// Multiply two reduced GF(2^k) elements for 8 < k <= 128.
pub(crate) fn gf_mul(a: u128, b: u128, k: usize) -> u128 {
    let exps = reduction_exponents_of(k);
    if k <= 64 {
        let prod = clmul64(a as u64, b as u64);
        let folded = reduce_once_u128(reduce_once_u128(prod, k, exps), k, exps);
        folded & low_bits_mask(k)
    } else {
        // Karatsuba-style split (a0 + a1 X)(b0 + b1 X) with X = x^64:
        // four 64x64 carry-less products combined into a 256-bit buffer.
        let (a0, a1) = (a as u64, (a >> 64) as u64);
        let (b0, b1) = (b as u64, (b >> 64) as u64);
        let t00 = clmul64(a0, b0);
        let t11 = clmul64(a1, b1);
        let mid = clmul64(a0, b1) ^ clmul64(a1, b0);
        let prod = U256 {
            lo: t00 ^ (mid << 64),
            hi: t11 ^ (mid >> 64),
        };
        let folded = reduce_once_u256(reduce_once_u256(prod, k, exps), k, exps);
        folded.lo & low_bits_mask(k)
    }
}

/// Multiplication and inverse lookup tables for GF(2^k), k <= 8.
///
/// Built once, from the generic carry-less path, so the table and CLMUL
/// semantics cannot diverge.
struct SmallFieldTable {
    mul: Vec<u8>,
    inv: Vec<u8>,
}

static SMALL_FIELD_TABLES: [OnceLock<SmallFieldTable>; 9] = [
    OnceLock::new(),
    OnceLock::new(),
    OnceLock::new(),
    OnceLock::new(),
    OnceLock::new(),
    OnceLock::new(),
    OnceLock::new(),
    OnceLock::new(),
    OnceLock::new(),
];

fn small_field_table(k: usize) -> &'static SmallFieldTable {
    SMALL_FIELD_TABLES[k].get_or_init(|| {
        let size = 1usize << k;
        let mut mul = vec![0u8; size * size];
        let mut inv = vec![0u8; size];
        for a in 0..size {
            for b in a..size {
                let p = gf_mul(a as u128, b as u128, k) as u8;
                mul[(a << k) | b] = p;
                mul[(b << k) | a] = p;
                if p == 1 {
                    inv[a] = b as u8;
                    inv[b] = a as u8;
                }
            }
        }
        SmallFieldTable { mul, inv }
    })
}

/// An element of the binary extension field GF(2^K), for 2 <= K <= 128.
///
/// The element is the polynomial `sum_i b_i x^i` over GF(2), reduced modulo
/// the canonical trinomial/pentanomial of degree K. Invariant: bits at
/// position K and above are zero. Addition is XOR; for K <= 8 products come
/// from a per-field lookup table, above that from a carry-less multiply
/// followed by modular reduction.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Gf2k<const K: usize>(u128);

impl<const K: usize> Gf2k<K> {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self::from_integer(1);

    const MASK: u128 = {
        assert!(2 <= K && K <= 128, "unsupported extension field");
        low_bits_mask(K)
    };

    /// Width of the smallest unsigned integer type holding K bits; the
    /// number of PRNG bytes consumed per sampled element.
    const SAMPLE_BYTES: usize = if K <= 8 {
        1
    } else if K <= 16 {
        2
    } else if K <= 32 {
        4
    } else if K <= 64 {
        8
    } else {
        16
    };

    /// Builds an element from the low K bits of `n`.
    pub const fn from_integer(n: u128) -> Self {
        Self(n & Self::MASK)
    }

    /// The reduced representation as an integer. Only for when the raw bits
    /// are genuinely needed (bit-serialization, range checks on challenges).
    pub const fn to_integer(self) -> u128 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn square(self) -> Self {
        self * self
    }

    pub fn pow(self, mut exp: u64) -> Self {
        let mut base = self;
        let mut res = Self::ONE;
        while exp != 0 {
            if exp & 1 == 1 {
                res *= base;
            }
            base = base.square();
            exp >>= 1;
        }
        res
    }

    pub fn try_inverse(self) -> Option<Self> {
        if self.is_zero() {
            return None;
        }
        if K <= 8 {
            let table = small_field_table(K);
            return Some(Self(table.inv[self.0 as usize] as u128));
        }
        // Fermat: a^-1 = a^(2^K - 2), and 2^K - 2 = 0b11..10, so the inverse
        // is the product of a^(2^i) for i in 1..K.
        let mut res = Self::ONE;
        let mut x = self.square();
        for _ in 0..K - 1 {
            res *= x;
            x = x.square();
        }
        Some(res)
    }

    /// Panics on zero; callers must not pass zero.
    pub fn inverse(self) -> Self {
        self.try_inverse().expect("tried to invert zero")
    }

    /// The K bits of the element, least significant first.
    pub fn to_bits(self) -> [bool; K] {
        let mut bits = [false; K];
        for (i, bit) in bits.iter_mut().enumerate() {
            *bit = (self.0 >> i) & 1 == 1;
        }
        bits
    }

    pub fn from_bits(bits: [bool; K]) -> Self {
        let mut val = 0u128;
        for (i, &bit) in bits.iter().enumerate() {
            val |= (bit as u128) << i;
        }
        Self(val)
    }
}

/// Sampling from a random-number generator.
pub trait Sample: Sized {
    fn sample<R>(rng: &mut R) -> Self
    where
        R: RngCore + ?Sized;

    /// Samples a single value using the [`OsRng`].
    fn rand() -> Self {
        Self::sample(&mut OsRng)
    }

    /// Samples a [`Vec`] of values of length `n` using the [`OsRng`].
    fn rand_vec(n: usize) -> Vec<Self> {
        (0..n).map(|_| Self::rand()).collect()
    }
}

impl<const K: usize> Sample for Gf2k<K> {
    fn sample<R>(rng: &mut R) -> Self
    where
        R: RngCore + ?Sized,
    {
        let mut buf = [0u8; 16];
        rng.fill_bytes(&mut buf[..Self::SAMPLE_BYTES]);
        Self::from_integer(u128::from_le_bytes(buf))
    }
}

impl<const K: usize> Display for Gf2k<K> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

impl<const K: usize> Debug for Gf2k<K> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl<const K: usize> Neg for Gf2k<K> {
    type Output = Self;

    // Characteristic 2: every element is its own negation.
    fn neg(self) -> Self {
        self
    }
}

impl<const K: usize> Add for Gf2k<K> {
    type Output = Self;

    #[allow(clippy::suspicious_arithmetic_impl)]
    fn add(self, rhs: Self) -> Self {
        Self(self.0 ^ rhs.0)
    }
}

impl<const K: usize> AddAssign for Gf2k<K> {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl<const K: usize> Sum for Gf2k<K> {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, x| acc + x)
    }
}

impl<const K: usize> Sub for Gf2k<K> {
    type Output = Self;

    #[allow(clippy::suspicious_arithmetic_impl)]
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 ^ rhs.0)
    }
}

impl<const K: usize> SubAssign for Gf2k<K> {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl<const K: usize> Mul for Gf2k<K> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        if K <= 8 {
            let table = small_field_table(K);
            Self(table.mul[((self.0 as usize) << K) | rhs.0 as usize] as u128)
        } else {
            Self(gf_mul(self.0, rhs.0, K))
        }
    }
}

impl<const K: usize> MulAssign for Gf2k<K> {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl<const K: usize> Product for Gf2k<K> {
    fn product<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ONE, |acc, x| acc * x)
    }
}

impl<const K: usize> Div for Gf2k<K> {
    type Output = Self;

    #[allow(clippy::suspicious_arithmetic_impl)]
    fn div(self, rhs: Self) -> Self {
        self * rhs.inverse()
    }
}

impl<const K: usize> DivAssign for Gf2k<K> {
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_laws<const K: usize>() {
        let xs = Gf2k::<K>::rand_vec(16);
        let ys = Gf2k::<K>::rand_vec(16);
        let zs = Gf2k::<K>::rand_vec(16);
        for ((&a, &b), &c) in xs.iter().zip(&ys).zip(&zs) {
            assert_eq!(a + a, Gf2k::<K>::ZERO);
            assert_eq!(a + Gf2k::<K>::ZERO, a);
            assert_eq!((a + b) + c, a + (b + c));
            assert_eq!(a * Gf2k::<K>::ONE, a);
            assert_eq!(a * Gf2k::<K>::ZERO, Gf2k::<K>::ZERO);
            assert_eq!(a * b, b * a);
            assert_eq!((a * b) * c, a * (b * c));
            assert_eq!(a * (b + c), a * b + a * c);
            if !a.is_zero() {
                assert_eq!(a * a.inverse(), Gf2k::<K>::ONE);
            }
            // Frobenius: a^(2^K) = a.
            let mut frob = a;
            for _ in 0..K {
                frob = frob.square();
            }
            assert_eq!(frob, a);
        }
    }

    #[test]
    fn laws_small_fields() {
        field_laws::<2>();
        field_laws::<3>();
        field_laws::<4>();
        field_laws::<8>();
    }

    #[test]
    fn laws_medium_fields() {
        field_laws::<16>();
        field_laws::<27>();
        field_laws::<40>();
        field_laws::<64>();
    }

    #[test]
    fn laws_wide_fields() {
        field_laws::<65>();
        field_laws::<87>();
        field_laws::<128>();
    }

    #[test]
    fn aes_inverse_pair() {
        // GF(2^8) with x^8 + x^4 + x^3 + x + 1: the classic AES pair.
        let a = Gf2k::<8>::from_integer(0x53);
        let b = Gf2k::<8>::from_integer(0xca);
        assert_eq!(a * b, Gf2k::<8>::ONE);
        assert_eq!(a.inverse(), b);
    }

    #[test]
    fn table_matches_clmul_path() {
        for a in 0..256u128 {
            for b in 0..256u128 {
                let via_table = Gf2k::<8>::from_integer(a) * Gf2k::<8>::from_integer(b);
                assert_eq!(via_table.to_integer(), gf_mul(a, b, 8));
            }
        }
    }

    #[test]
    fn inverse_exhaustive_gf16() {
        for a in 1..16u128 {
            let el = Gf2k::<4>::from_integer(a);
            assert_eq!(el * el.inverse(), Gf2k::<4>::ONE);
        }
    }

    #[test]
    fn bits_round_trip() {
        fn check<const K: usize>() {
            for &el in &Gf2k::<K>::rand_vec(32) {
                assert_eq!(Gf2k::<K>::from_bits(el.to_bits()), el);
            }
        }
        check::<3>();
        check::<8>();
        check::<27>();
        check::<87>();
        check::<128>();
    }

    #[test]
    fn from_integer_masks_high_bits() {
        assert_eq!(Gf2k::<3>::from_integer(0b1111).to_integer(), 0b111);
        assert_eq!(Gf2k::<8>::from_integer(0x1ff).to_integer(), 0xff);
    }
}

use aes::Aes128;
use ctr::cipher::{KeyIvInit, StreamCipher};
use ctr::Ctr128BE;
use rand_core::{CryptoRng, RngCore};

pub const SEED_SIZE: usize = 32;

type KeyStream = Ctr128BE<Aes128>;

/// Seeded AES-128-CTR keystream generator.
///
/// All protocol randomness flows through this type so that a 32-byte seed
/// fully determines the stream: the first half keys the cipher, the second
/// half is the initial counter block. It implements [`RngCore`], so field
/// elements are drawn with `Gf2k::sample(&mut prng)`.
#[derive(Clone)]
pub struct Prng {
    cipher: KeyStream,
}

impl Prng {
    pub fn from_seed(seed: &[u8; SEED_SIZE]) -> Self {
        let key: [u8; 16] = seed[..16].try_into().expect("seed is 32 bytes");
        let iv: [u8; 16] = seed[16..].try_into().expect("seed is 32 bytes");
        Self {
            cipher: KeyStream::new(&key.into(), &iv.into()),
        }
    }

    /// Seeds from the system entropy source, with `thread_id` folded into
    /// the first four bytes so parallel parties diverge. With the
    /// `deterministic` feature the entropy source is replaced by zeros.
    pub fn from_entropy(thread_id: u32) -> Self {
        let mut seed = [0u8; SEED_SIZE];
        if !cfg!(feature = "deterministic") {
            rand::rngs::OsRng.fill_bytes(&mut seed);
        }
        for (s, t) in seed.iter_mut().zip(thread_id.to_le_bytes()) {
            *s ^= t;
        }
        Self::from_seed(&seed)
    }

    /// Re-keys the generator in place.
    pub fn seed_from(&mut self, seed: &[u8; SEED_SIZE]) {
        *self = Self::from_seed(seed);
    }

    /// Re-keys from 32 bytes of another generator's output.
    pub fn reseed_from(&mut self, other: &mut Prng) {
        let mut seed = [0u8; SEED_SIZE];
        other.random_bytes(&mut seed);
        self.seed_from(&seed);
    }

    pub fn random_bytes(&mut self, out: &mut [u8]) {
        out.fill(0);
        self.cipher.apply_keystream(out);
    }

    pub fn random_u32(&mut self) -> u32 {
        let mut buf = [0u8; 4];
        self.random_bytes(&mut buf);
        u32::from_le_bytes(buf)
    }

    pub fn random_u64(&mut self) -> u64 {
        let mut buf = [0u8; 8];
        self.random_bytes(&mut buf);
        u64::from_le_bytes(buf)
    }

    pub fn random_u128(&mut self) -> u128 {
        let mut buf = [0u8; 16];
        self.random_bytes(&mut buf);
        u128::from_le_bytes(buf)
    }

    /// Uniform in [0, 1), with 32 bits of precision.
    pub fn random_double(&mut self) -> f64 {
        self.random_u32() as f64 / 4294967296.0
    }
}

impl RngCore for Prng {
    fn next_u32(&mut self) -> u32 {
        self.random_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.random_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.random_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.random_bytes(dest);
        Ok(())
    }
}

impl CryptoRng for Prng {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let seed = [7u8; SEED_SIZE];
        let mut a = Prng::from_seed(&seed);
        let mut b = Prng::from_seed(&seed);
        let mut x = [0u8; 64];
        let mut y = [0u8; 64];
        a.random_bytes(&mut x);
        b.random_bytes(&mut y);
        assert_eq!(x, y);
        assert_eq!(a.random_u64(), b.random_u64());
        assert_eq!(a.random_u128(), b.random_u128());
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = Prng::from_seed(&[0u8; SEED_SIZE]);
        let mut b = Prng::from_seed(&[1u8; SEED_SIZE]);
        assert_ne!(a.random_u64(), b.random_u64());
    }

    #[test]
    fn stream_advances() {
        let mut a = Prng::from_seed(&[3u8; SEED_SIZE]);
        assert_ne!(a.random_u64(), a.random_u64());
    }

    #[test]
    fn double_in_unit_interval() {
        let mut a = Prng::from_seed(&[9u8; SEED_SIZE]);
        for _ in 0..100 {
            let d = a.random_double();
            assert!((0.0..1.0).contains(&d));
        }
    }

    #[test]
    fn reseed_from_other() {
        let mut source = Prng::from_seed(&[5u8; SEED_SIZE]);
        let mut source_copy = source.clone();
        let mut a = Prng::from_seed(&[0u8; SEED_SIZE]);
        let mut b = Prng::from_seed(&[1u8; SEED_SIZE]);
        a.reseed_from(&mut source);
        b.reseed_from(&mut source_copy);
        assert_eq!(a.random_u64(), b.random_u64());
    }
}

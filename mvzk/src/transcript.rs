//! Rolling Fiat-Shamir transcript over bit-packed proof data.

use mvzk_field::Gf2k;

use crate::bitio::{BitIoError, BitRead, BitWrite, BufferBitReader, BufferBitWriter};
use crate::hash::sha256;
use crate::prng::Prng;

/// A [`BufferBitWriter`] that can derive Fiat-Shamir challenges at any point.
///
/// [`hash_seed`](Self::hash_seed) hashes everything appended since the last
/// call (prefixed by the chain state once one exists), including the partial
/// byte and its bit count so "1" and "1 then zero padding" cannot collide,
/// and returns a PRNG seeded from the digest. Once the buffer has grown past
/// the chain width, 32 bytes drawn from that PRNG become the chain state for
/// the next call, so every challenge depends on the entire prior transcript.
#[derive(Default)]
pub struct HashableBitWriter {
    writer: BufferBitWriter,
    offset: usize,
    chain: [u8; 32],
    chained: bool,
}

impl HashableBitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hash_seed(&mut self) -> Prng {
        let bytes = self.writer.as_bytes();
        let (buffer, bits) = self.writer.partial();

        let mut tohash = Vec::with_capacity(34 + bytes.len() - self.offset);
        if self.chained {
            tohash.extend_from_slice(&self.chain);
        }
        tohash.extend_from_slice(&bytes[self.offset..]);
        tohash.push(buffer);
        tohash.push(bits);

        let digest = sha256(&tohash);
        let mut gen = Prng::from_seed(&digest);
        if bytes.len() > self.chain.len() {
            self.offset = bytes.len();
            gen.random_bytes(&mut self.chain);
            self.chained = true;
        }
        gen
    }

    /// Hands out the accumulated transcript and resets all chaining state.
    pub fn drain(&mut self) -> Vec<u8> {
        self.offset = 0;
        self.chained = false;
        self.chain = [0; 32];
        self.writer.drain()
    }
}

impl BitWrite for HashableBitWriter {
    fn put_bit(&mut self, bit: bool) -> Result<(), BitIoError> {
        self.writer.put_bit(bit)
    }
}

/// Verifier-side view of a received proof.
///
/// Every element read is re-serialized into a mirroring transcript, so
/// [`hash_seed`](Self::hash_seed) sees exactly the prefix of bits the prover
/// had hashed when it derived the same challenge.
pub struct FsProofStream {
    reader: BufferBitReader,
    consumed: HashableBitWriter,
}

impl FsProofStream {
    pub fn new(proof: Vec<u8>) -> Self {
        Self {
            reader: BufferBitReader::new(proof),
            consumed: HashableBitWriter::new(),
        }
    }

    pub fn next<const K: usize>(&mut self) -> Result<Gf2k<K>, BitIoError> {
        let el = self.reader.read_element::<K>()?;
        self.consumed.write_element(el)?;
        Ok(el)
    }

    pub fn hash_seed(&mut self) -> Prng {
        self.consumed.hash_seed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mvzk_field::Sample;

    #[test]
    fn identical_states_seed_identically() {
        let mut a = HashableBitWriter::new();
        let mut b = HashableBitWriter::new();
        for i in 0..19 {
            a.put_bit(i % 3 == 0).unwrap();
            b.put_bit(i % 3 == 0).unwrap();
        }
        assert_eq!(a.hash_seed().random_u64(), b.hash_seed().random_u64());
    }

    #[test]
    fn partial_byte_is_part_of_the_transcript() {
        let mut a = HashableBitWriter::new();
        let mut b = HashableBitWriter::new();
        a.put_bit(true).unwrap();
        b.put_bit(true).unwrap();
        b.put_bit(false).unwrap();
        // Same bytes-so-far (none), different bit counts.
        assert_ne!(a.hash_seed().random_u64(), b.hash_seed().random_u64());
    }

    #[test]
    fn chaining_keeps_history() {
        // Two transcripts that agree on the most recent segment but not on
        // the earlier one must derive different challenges.
        let mut a = HashableBitWriter::new();
        let mut b = HashableBitWriter::new();
        for i in 0..40 * 8 {
            a.put_bit(i % 5 == 0).unwrap();
            b.put_bit(i % 7 == 0).unwrap();
        }
        a.hash_seed();
        b.hash_seed();
        for i in 0..64 {
            a.put_bit(i % 2 == 0).unwrap();
            b.put_bit(i % 2 == 0).unwrap();
        }
        assert_ne!(a.hash_seed().random_u64(), b.hash_seed().random_u64());
    }

    #[test]
    fn proof_stream_mirrors_the_prover() {
        let shares = Gf2k::<3>::rand_vec(50);
        let checks = Gf2k::<87>::rand_vec(4);

        let mut prover = HashableBitWriter::new();
        for &el in &shares {
            prover.write_element(el).unwrap();
        }
        let r1 = Gf2k::<87>::sample(&mut prover.hash_seed());
        for &el in &checks {
            prover.write_element(el).unwrap();
        }
        let r2 = Gf2k::<87>::sample(&mut prover.hash_seed());
        let proof = prover.drain();

        let mut verifier = FsProofStream::new(proof);
        for &el in &shares {
            assert_eq!(verifier.next::<3>().unwrap(), el);
        }
        assert_eq!(Gf2k::<87>::sample(&mut verifier.hash_seed()), r1);
        for &el in &checks {
            assert_eq!(verifier.next::<87>().unwrap(), el);
        }
        assert_eq!(Gf2k::<87>::sample(&mut verifier.hash_seed()), r2);
    }
}

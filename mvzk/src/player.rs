//! Framed, optionally signed messaging between parties.
//!
//! Every message is a 4-byte little-endian length followed by the payload.
//! Signed messages carry a second frame with the DER-encoded ECDSA
//! signature of the payload. By convention the prover is party 0.

use anyhow::{bail, ensure, Context, Result};

use crate::hash::sha256;
use crate::net::Transport;
use crate::prng::{Prng, SEED_SIZE};

pub struct Player<T: Transport> {
    transport: T,
}

impl<T: Transport> Player<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn index(&self) -> usize {
        self.transport.my_index()
    }

    /// Total number of parties, prover included.
    pub fn num_parties(&self) -> usize {
        self.transport.num_parties()
    }

    pub fn close_connection(&mut self, peer: usize) {
        self.transport.close(peer);
    }

    pub fn send_to(&mut self, peer: usize, data: &[u8]) -> Result<()> {
        let len = u32::try_from(data.len()).context("message too large to frame")?;
        self.transport.send(peer, &len.to_le_bytes())?;
        self.transport.send(peer, data)
    }

    pub fn send_to_signed(&mut self, peer: usize, data: &[u8]) -> Result<()> {
        self.send_to(peer, data)?;
        let sig = self.transport.sign(data)?;
        self.send_to(peer, &sig)
    }

    pub fn recv_from(&mut self, peer: usize) -> Result<Vec<u8>> {
        let mut len = [0u8; 4];
        self.transport.recv(peer, &mut len)?;
        let mut data = vec![0u8; u32::from_le_bytes(len) as usize];
        self.transport.recv(peer, &mut data)?;
        Ok(data)
    }

    pub fn recv_from_signed(&mut self, peer: usize) -> Result<Vec<u8>> {
        let data = self.recv_from(peer)?;
        let sig = self.recv_from(peer)?;
        if !self.transport.verify(peer, &data, &sig)? {
            bail!("invalid signature from player {peer}");
        }
        Ok(data)
    }

    /// Sends `data` to every other party, except `skip`.
    pub fn send_all(&mut self, data: &[u8], skip: Option<usize>) -> Result<()> {
        for peer in 0..self.num_parties() {
            if peer == self.index() || Some(peer) == skip {
                continue;
            }
            self.send_to(peer, data)?;
        }
        Ok(())
    }

    /// As [`send_all`](Self::send_all), signing the payload once.
    pub fn send_all_signed(&mut self, data: &[u8], skip: Option<usize>) -> Result<()> {
        let sig = self.transport.sign(data)?;
        for peer in 0..self.num_parties() {
            if peer == self.index() || Some(peer) == skip {
                continue;
            }
            self.send_to(peer, data)?;
            self.send_to(peer, &sig)?;
        }
        Ok(())
    }

    /// Receives one message from every other party, except `skip`. The
    /// returned vector is indexed by party; our own slot and the skipped
    /// slot stay empty.
    pub fn recv_from_all(&mut self, skip: Option<usize>) -> Result<Vec<Vec<u8>>> {
        let mut res = Vec::with_capacity(self.num_parties());
        for peer in 0..self.num_parties() {
            if peer == self.index() || Some(peer) == skip {
                res.push(Vec::new());
            } else {
                res.push(self.recv_from(peer)?);
            }
        }
        Ok(res)
    }

    pub fn recv_from_all_signed(&mut self, skip: Option<usize>) -> Result<Vec<Vec<u8>>> {
        let mut res = Vec::with_capacity(self.num_parties());
        for peer in 0..self.num_parties() {
            if peer == self.index() || Some(peer) == skip {
                res.push(Vec::new());
            } else {
                res.push(self.recv_from_signed(peer)?);
            }
        }
        Ok(res)
    }

    /// Commit-then-open agreement on a joint random seed.
    ///
    /// Every participating party samples 32 bytes from `gen`, broadcasts
    /// the SHA-256 commitment, then the opening. All openings are checked
    /// and XOR-folded into the joint seed, which re-keys `gen`. A wrong
    /// opening is fatal.
    pub fn commit_open_seed(&mut self, gen: &mut Prng, skip: Option<usize>) -> Result<()> {
        let mut my_seed = [0u8; SEED_SIZE];
        gen.random_bytes(&mut my_seed);
        let commitment = sha256(&my_seed);

        self.send_all(&commitment, skip)?;
        let all_commitments = self.recv_from_all(skip)?;

        self.send_all(&my_seed, skip)?;
        let all_seeds = self.recv_from_all(skip)?;

        let mut joint = my_seed;
        for peer in 0..self.num_parties() {
            if peer == self.index() || Some(peer) == skip {
                continue;
            }
            ensure!(
                all_seeds[peer].len() == SEED_SIZE
                    && sha256(&all_seeds[peer]) == all_commitments[peer][..],
                "player {peer} is trying to cheat while establishing a seed"
            );
            for (j, b) in all_seeds[peer].iter().enumerate() {
                joint[j] ^= b;
            }
        }
        gen.seed_from(&joint);
        Ok(())
    }

    /// One-byte broadcast barrier.
    pub fn sync(&mut self) -> Result<()> {
        self.send_all(&[1], None)?;
        self.recv_from_all(None)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::LocalMesh;

    fn run_parties<F>(n: usize, f: F) -> Vec<std::thread::JoinHandle<()>>
    where
        F: Fn(Player<LocalMesh>) + Send + Sync + Clone + 'static,
    {
        LocalMesh::create(n)
            .into_iter()
            .map(|mesh| {
                let f = f.clone();
                std::thread::spawn(move || f(Player::new(mesh)))
            })
            .collect()
    }

    #[test]
    fn framed_round_trip() {
        let handles = run_parties(2, |mut me| {
            if me.index() == 0 {
                me.send_to(1, b"first").unwrap();
                me.send_to_signed(1, b"second").unwrap();
            } else {
                assert_eq!(me.recv_from(0).unwrap(), b"first");
                assert_eq!(me.recv_from_signed(0).unwrap(), b"second");
            }
        });
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn broadcast_and_gather() {
        let handles = run_parties(4, |mut me| {
            let mine = vec![me.index() as u8; 3];
            me.send_all(&mine, None).unwrap();
            let all = me.recv_from_all(None).unwrap();
            for (peer, data) in all.iter().enumerate() {
                if peer == me.index() {
                    assert!(data.is_empty());
                } else {
                    assert_eq!(data, &vec![peer as u8; 3]);
                }
            }
            me.sync().unwrap();
        });
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn joint_seed_agreement() {
        use std::sync::mpsc::channel;

        let (tx, rx) = channel();
        let handles: Vec<_> = LocalMesh::create(3)
            .into_iter()
            .map(|mesh| {
                let tx = tx.clone();
                std::thread::spawn(move || {
                    let mut me = Player::new(mesh);
                    let mut gen = Prng::from_entropy(me.index() as u32);
                    me.commit_open_seed(&mut gen, None).unwrap();
                    tx.send(gen.random_u64()).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        drop(tx);
        let outputs: Vec<u64> = rx.iter().collect();
        assert_eq!(outputs.len(), 3);
        assert!(outputs.iter().all(|&v| v == outputs[0]));
    }
}

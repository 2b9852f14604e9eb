//! In-process mesh over channels, for running all parties as threads.

use std::collections::VecDeque;
use std::sync::mpsc::{channel, Receiver, Sender};

use anyhow::{Context, Result};
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;

use super::Transport;

/// One party's endpoint of a fully connected in-process mesh.
///
/// Channels emulate the byte-stream semantics of the TLS transport:
/// messages queue per peer and reads may span message boundaries. Each
/// party gets a fresh P-256 keypair, so signed sends verify exactly as over
/// the wire.
pub struct LocalMesh {
    me: usize,
    senders: Vec<Option<Sender<Vec<u8>>>>,
    receivers: Vec<Option<Receiver<Vec<u8>>>>,
    pending: Vec<VecDeque<u8>>,
    signing_key: SigningKey,
    verifying_keys: Vec<VerifyingKey>,
}

impl LocalMesh {
    /// Creates endpoints for `n_parties` parties; endpoint `i` belongs to
    /// party `i`.
    pub fn create(n_parties: usize) -> Vec<LocalMesh> {
        let signing_keys: Vec<SigningKey> =
            (0..n_parties).map(|_| SigningKey::random(&mut OsRng)).collect();
        let verifying_keys: Vec<VerifyingKey> =
            signing_keys.iter().map(|k| *k.verifying_key()).collect();

        let mut meshes: Vec<LocalMesh> = signing_keys
            .into_iter()
            .enumerate()
            .map(|(me, signing_key)| LocalMesh {
                me,
                senders: (0..n_parties).map(|_| None).collect(),
                receivers: (0..n_parties).map(|_| None).collect(),
                pending: (0..n_parties).map(|_| VecDeque::new()).collect(),
                signing_key,
                verifying_keys: verifying_keys.clone(),
            })
            .collect();

        for from in 0..n_parties {
            for to in 0..n_parties {
                if from == to {
                    continue;
                }
                let (tx, rx) = channel();
                meshes[from].senders[to] = Some(tx);
                meshes[to].receivers[from] = Some(rx);
            }
        }
        meshes
    }
}

impl Transport for LocalMesh {
    fn num_parties(&self) -> usize {
        self.senders.len()
    }

    fn my_index(&self) -> usize {
        self.me
    }

    fn send(&mut self, peer: usize, data: &[u8]) -> Result<()> {
        self.senders[peer]
            .as_ref()
            .with_context(|| format!("connection to party {peer} is closed"))?
            .send(data.to_vec())
            .map_err(|_| anyhow::anyhow!("party {peer} is gone"))
    }

    fn recv(&mut self, peer: usize, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            if let Some(byte) = self.pending[peer].pop_front() {
                buf[filled] = byte;
                filled += 1;
            } else {
                let msg = self.receivers[peer]
                    .as_ref()
                    .with_context(|| format!("connection from party {peer} is closed"))?
                    .recv()
                    .map_err(|_| anyhow::anyhow!("party {peer} is gone"))?;
                self.pending[peer].extend(msg);
            }
        }
        Ok(())
    }

    fn close(&mut self, peer: usize) {
        self.senders[peer] = None;
        self.receivers[peer] = None;
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let signature: Signature = self.signing_key.sign(data);
        Ok(signature.to_der().as_bytes().to_vec())
    }

    fn verify(&self, peer: usize, data: &[u8], sig: &[u8]) -> Result<bool> {
        let Ok(signature) = Signature::from_der(sig) else {
            return Ok(false);
        };
        Ok(self.verifying_keys[peer].verify(data, &signature).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_flow_between_endpoints() {
        let mut meshes = LocalMesh::create(2);
        let mut b = meshes.pop().unwrap();
        let mut a = meshes.pop().unwrap();

        a.send(1, b"hello ").unwrap();
        a.send(1, b"world").unwrap();
        // Reads span message boundaries.
        let mut buf = [0u8; 11];
        b.recv(0, &mut buf).unwrap();
        assert_eq!(&buf, b"hello world");
    }

    #[test]
    fn signatures_verify_across_endpoints() {
        let mut meshes = LocalMesh::create(3);
        let c = meshes.pop().unwrap();
        let a = &meshes[0];

        let sig = a.sign(b"payload").unwrap();
        assert!(c.verify(0, b"payload", &sig).unwrap());
        assert!(!c.verify(0, b"tampered", &sig).unwrap());
        assert!(!c.verify(1, b"payload", &sig).unwrap());
    }
}

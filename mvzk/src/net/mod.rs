//! Party-to-party transport.
//!
//! The protocols are written against the [`Transport`] seam: a full mesh of
//! reliable, ordered byte channels between the N+1 parties plus per-party
//! ECDSA signing. [`tls::TlsMesh`] is the production implementation;
//! [`local::LocalMesh`] runs all parties inside one process for tests.

use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};

pub mod local;
pub mod tls;

pub use local::LocalMesh;
pub use tls::TlsMesh;

/// A mesh of reliable ordered connections to every other party.
pub trait Transport {
    /// Total number of parties, prover included.
    fn num_parties(&self) -> usize;

    fn my_index(&self) -> usize;

    /// Writes all of `data` to the channel towards `peer`.
    fn send(&mut self, peer: usize, data: &[u8]) -> Result<()>;

    /// Fills `buf` from the channel from `peer`.
    fn recv(&mut self, peer: usize, buf: &mut [u8]) -> Result<()>;

    fn close(&mut self, peer: usize);

    /// ECDSA-P256 signature over SHA-256 of `data`, DER-encoded.
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>>;

    fn verify(&self, peer: usize, data: &[u8], sig: &[u8]) -> Result<bool>;
}

/// Network configuration: the certificate directory followed by one
/// `host port` pair per party, in party order.
#[derive(Clone, Debug)]
pub struct NetworkConfig {
    pub cert_dir: PathBuf,
    pub addresses: Vec<(String, u16)>,
}

impl NetworkConfig {
    pub fn parse(text: &str) -> Result<Self> {
        let mut tok = text.split_whitespace();
        let cert_dir = PathBuf::from(tok.next().context("missing certificate directory")?);
        let mut addresses = Vec::new();
        while let Some(host) = tok.next() {
            let port = tok
                .next()
                .with_context(|| format!("missing port for host {host}"))?
                .parse()
                .with_context(|| format!("invalid port for host {host}"))?;
            addresses.push((host.to_string(), port));
        }
        ensure!(!addresses.is_empty(), "no party addresses in network config");
        Ok(Self {
            cert_dir,
            addresses,
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading network config {}", path.as_ref().display()))?;
        Self::parse(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_config() {
        let cfg = NetworkConfig::parse(
            "certs/five-party localhost 5000 localhost 5001 10.0.0.3 5002",
        )
        .unwrap();
        assert_eq!(cfg.cert_dir, PathBuf::from("certs/five-party"));
        assert_eq!(cfg.addresses.len(), 3);
        assert_eq!(cfg.addresses[2], ("10.0.0.3".to_string(), 5002));
    }

    #[test]
    fn truncated_config_is_rejected() {
        assert!(NetworkConfig::parse("certs localhost").is_err());
        assert!(NetworkConfig::parse("certs").is_err());
    }
}

//! Authenticated TLS mesh between the parties.
//!
//! Establishment order, for every pair: the lower-indexed party acts as TLS
//! server and accepts after reading a 4-byte little-endian peer id; the
//! higher-indexed party connects (retrying while the listener comes up) and
//! sends its id. Both directions then authenticate the peer: the client
//! validates the server certificate against `Root.crt` for the name
//! `player<i>`, and both sides additionally require the presented leaf to be
//! byte-identical to the expected `Player<i>.crt`, which pins the peer's
//! identity to its published certificate.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, ensure, Context, Result};
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::server::WebPkiClientVerifier;
use rustls::{
    ClientConfig, ClientConnection, RootCertStore, ServerConfig, ServerConnection, StreamOwned,
};

use super::{NetworkConfig, Transport};

const CONNECT_ATTEMPTS: usize = 120;

enum TlsStream {
    Server(StreamOwned<ServerConnection, TcpStream>),
    Client(StreamOwned<ClientConnection, TcpStream>),
}

impl TlsStream {
    fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
        match self {
            Self::Server(s) => s.write_all(data).and_then(|_| s.flush()),
            Self::Client(s) => s.write_all(data).and_then(|_| s.flush()),
        }
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        match self {
            Self::Server(s) => s.read_exact(buf),
            Self::Client(s) => s.read_exact(buf),
        }
    }
}

pub struct TlsMesh {
    me: usize,
    streams: Vec<Option<TlsStream>>,
    signing_key: SigningKey,
    verifying_keys: Vec<Option<VerifyingKey>>,
}

impl TlsMesh {
    /// Connects to all peers and completes mutually authenticated TLS
    /// handshakes. Blocks until the whole mesh is up.
    pub fn establish(me: usize, config: &NetworkConfig, n_parties: usize) -> Result<Self> {
        ensure!(
            config.addresses.len() == n_parties,
            "network config lists {} parties, expected {}",
            config.addresses.len(),
            n_parties
        );
        ensure!(me < n_parties, "own index {me} out of range");

        let sockets = raw_mesh(me, config, n_parties)?;

        let dir = &config.cert_dir;
        let root = CertificateDer::from_pem_file(dir.join("Root.crt"))
            .context("loading Root.crt")?;
        let mut roots = RootCertStore::empty();
        roots.add(root).context("adding root certificate")?;
        let roots = Arc::new(roots);

        let my_cert = CertificateDer::from_pem_file(dir.join(format!("Player{me}.crt")))
            .with_context(|| format!("loading Player{me}.crt"))?;

        let client_config = {
            let key = PrivateKeyDer::from_pem_file(dir.join(format!("Player{me}.key")))
                .with_context(|| format!("loading Player{me}.key"))?;
            Arc::new(
                ClientConfig::builder()
                    .with_root_certificates(roots.clone())
                    .with_client_auth_cert(vec![my_cert.clone()], key)
                    .context("building TLS client config")?,
            )
        };
        let server_config = {
            let key = PrivateKeyDer::from_pem_file(dir.join(format!("Player{me}.key")))
                .with_context(|| format!("loading Player{me}.key"))?;
            let verifier = WebPkiClientVerifier::builder(roots)
                .build()
                .context("building client certificate verifier")?;
            Arc::new(
                ServerConfig::builder()
                    .with_client_cert_verifier(verifier)
                    .with_single_cert(vec![my_cert], key)
                    .context("building TLS server config")?,
            )
        };

        let mut streams = Vec::with_capacity(n_parties);
        for (peer, socket) in sockets.into_iter().enumerate() {
            let Some(mut socket) = socket else {
                streams.push(None);
                continue;
            };
            let expected = CertificateDer::from_pem_file(dir.join(format!("Player{peer}.crt")))
                .with_context(|| format!("loading Player{peer}.crt"))?;
            let stream = if peer < me {
                let mut conn = ServerConnection::new(server_config.clone())?;
                while conn.is_handshaking() {
                    conn.complete_io(&mut socket)
                        .with_context(|| format!("TLS accept from player {peer}"))?;
                }
                check_peer_identity(conn.peer_certificates(), &expected, peer)?;
                TlsStream::Server(StreamOwned::new(conn, socket))
            } else {
                let name = ServerName::try_from(format!("player{peer}"))
                    .context("building expected server name")?;
                let mut conn = ClientConnection::new(client_config.clone(), name)?;
                while conn.is_handshaking() {
                    conn.complete_io(&mut socket)
                        .with_context(|| format!("TLS connect to player {peer}"))?;
                }
                check_peer_identity(conn.peer_certificates(), &expected, peer)?;
                TlsStream::Client(StreamOwned::new(conn, socket))
            };
            streams.push(Some(stream));
        }

        let signing_key = {
            let pem = std::fs::read_to_string(dir.join(format!("Player{me}.priv")))
                .with_context(|| format!("loading Player{me}.priv"))?;
            SigningKey::from_pkcs8_pem(&pem)
                .map_err(|e| anyhow::anyhow!("parsing Player{me}.priv: {e}"))?
        };
        let mut verifying_keys = Vec::with_capacity(n_parties);
        for i in 0..n_parties {
            if i == me {
                verifying_keys.push(None);
                continue;
            }
            let pem = std::fs::read_to_string(dir.join(format!("Player{i}.pub")))
                .with_context(|| format!("loading Player{i}.pub"))?;
            let key = VerifyingKey::from_public_key_pem(&pem)
                .map_err(|e| anyhow::anyhow!("parsing Player{i}.pub: {e}"))?;
            verifying_keys.push(Some(key));
        }

        Ok(Self {
            me,
            streams,
            signing_key,
            verifying_keys,
        })
    }
}

/// The plaintext socket mesh: listen on our own port, accept from
/// lower-indexed peers (which identify themselves with 4 bytes), connect to
/// higher-indexed peers and identify ourselves.
fn raw_mesh(me: usize, config: &NetworkConfig, n_parties: usize) -> Result<Vec<Option<TcpStream>>> {
    let my_port = config.addresses[me].1;
    let listener = TcpListener::bind(("0.0.0.0", my_port))
        .with_context(|| format!("binding listener on port {my_port}"))?;

    let mut sockets: Vec<Option<TcpStream>> = (0..n_parties).map(|_| None).collect();
    for i in 0..n_parties {
        if i == me {
            continue;
        }
        if i < me {
            let (mut socket, _) = listener.accept().context("accepting peer connection")?;
            socket.set_nodelay(true)?;
            let mut id = [0u8; 4];
            socket.read_exact(&mut id).context("reading peer id")?;
            let peer = u32::from_le_bytes(id) as usize;
            ensure!(
                peer < me && sockets[peer].is_none(),
                "unexpected peer id {peer}"
            );
            sockets[peer] = Some(socket);
        } else {
            let (host, port) = &config.addresses[i];
            let mut socket = connect_with_retry(host, *port)
                .with_context(|| format!("connecting to player {i} at {host}:{port}"))?;
            socket.set_nodelay(true)?;
            socket
                .write_all(&(me as u32).to_le_bytes())
                .context("sending our id")?;
            sockets[i] = Some(socket);
        }
    }
    Ok(sockets)
}

fn connect_with_retry(host: &str, port: u16) -> Result<TcpStream> {
    for attempt in 0..CONNECT_ATTEMPTS {
        match TcpStream::connect((host, port)) {
            Ok(socket) => return Ok(socket),
            Err(err) => {
                if attempt % 10 == 0 {
                    log::info!("waiting for {host}:{port} ({err}), retrying");
                }
                std::thread::sleep(Duration::from_secs(1));
            }
        }
    }
    bail!("gave up connecting to {host}:{port}");
}

fn check_peer_identity(
    presented: Option<&[CertificateDer<'_>]>,
    expected: &CertificateDer<'_>,
    peer: usize,
) -> Result<()> {
    let leaf = presented
        .and_then(|chain| chain.first())
        .with_context(|| format!("player {peer} presented no certificate"))?;
    ensure!(
        leaf.as_ref() == expected.as_ref(),
        "player {peer} presented a certificate that is not Player{peer}.crt"
    );
    Ok(())
}

impl Transport for TlsMesh {
    fn num_parties(&self) -> usize {
        self.streams.len()
    }

    fn my_index(&self) -> usize {
        self.me
    }

    fn send(&mut self, peer: usize, data: &[u8]) -> Result<()> {
        let stream = self.streams[peer]
            .as_mut()
            .with_context(|| format!("connection to player {peer} is closed"))?;
        stream
            .write_all(data)
            .with_context(|| format!("send to player {peer} failed"))
    }

    fn recv(&mut self, peer: usize, buf: &mut [u8]) -> Result<()> {
        let stream = self.streams[peer]
            .as_mut()
            .with_context(|| format!("connection to player {peer} is closed"))?;
        stream
            .read_exact(buf)
            .with_context(|| format!("receive from player {peer} failed"))
    }

    fn close(&mut self, peer: usize) {
        self.streams[peer] = None;
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let signature: Signature = self.signing_key.sign(data);
        Ok(signature.to_der().as_bytes().to_vec())
    }

    fn verify(&self, peer: usize, data: &[u8], sig: &[u8]) -> Result<bool> {
        let key = self.verifying_keys[peer]
            .as_ref()
            .with_context(|| format!("no verifying key for player {peer}"))?;
        let Ok(signature) = Signature::from_der(sig) else {
            return Ok(false);
        };
        Ok(key.verify(data, &signature).is_ok())
    }
}

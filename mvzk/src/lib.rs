//! Multi-verifier zero-knowledge proofs of Boolean circuit satisfiability.
//!
//! A single prover convinces N verifiers that it knows a private input on
//! which a public Bristol-Fashion circuit outputs 0, without revealing the
//! input. Secrets are Shamir-shared over binary extension fields
//! (`mvzk_field`); security holds against at most T corrupted parties.
//!
//! Three proof flavours share the same substrate and differ in how the
//! AND-gate multiplication triples are checked: [`proto::log`] compresses
//! them into a single multiplication, [`proto::tn3`] batches them behind a
//! Schwartz-Zippel polynomial identity, and [`proto::tn4`] checks random
//! linear combinations directly (needing the larger honest majority
//! N >= 4T + 1).
//!
//! The offline [`preprocessing`] phase produces, per party, a file of
//! correlated random shares that the online phase consumes through the
//! bit-packed [`bitio`] layer. Fiat-Shamir challenges come from the rolling
//! [`transcript`]. Parties talk over an authenticated TLS mesh
//! ([`net::TlsMesh`]), framed and broadcast by [`player::Player`].

pub mod bitio;
pub mod circuit;
pub mod hash;
pub mod net;
pub mod player;
pub mod preprocessing;
pub mod prng;
pub mod proto;
pub mod transcript;

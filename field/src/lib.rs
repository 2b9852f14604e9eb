//! Binary extension field arithmetic and Reed-Solomon share coding.
//!
//! This crate provides the algebra the proof protocols are built on:
//! [`Gf2k`], a GF(2^k) element type for any 2 <= k <= 128, the canonical
//! subfield [`embedding::Embedding`] for k | k', polynomial evaluation and
//! division, Reed-Solomon [`coding`], and the [`decoder`] that reconstructs
//! shared secrets in the presence of corrupted shares.

pub mod coding;
pub mod decoder;
pub mod embedding;
pub mod gf2k;
pub mod polynomial;

pub use decoder::InvalidSharing;
pub use embedding::Embedding;
pub use gf2k::{Gf2k, Sample};

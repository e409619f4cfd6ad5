//! Vigil Shamir Module
//!
//! Splits a 256-bit encryption key into N shares over GF(256) so that any
//! k of them reconstruct it and any k−1 reveal nothing. Shares travel as
//! a compact checksummed wire string, one per guardian.

pub mod gf256;
pub mod shamir;
pub mod wire;

pub use shamir::{combine, split, Share, SECRET_LEN};
pub use wire::{decode_share, encode_share, SHARE_WIRE_LEN};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShamirError {
    #[error("invalid parameters: {0}")]
    InvalidInput(String),
    #[error("not enough shares: have {got}, need {need}")]
    InsufficientShares { got: usize, need: usize },
    #[error("share {index} failed its checksum")]
    CorruptShare { index: u8 },
}

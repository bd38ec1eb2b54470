//! Transaction construction, signing, and nonce sequencing

mod builder;
mod nonce;

pub use builder::TxBuilder;
pub use nonce::NonceSequencer;

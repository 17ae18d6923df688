//! Bitcoin Codec
//!
//! Pure, stateless conversions between the Bitcoin data shapes the pod
//! protocol has to interpret:
//!
//! ```text
//! redeem script ──sha256──▶ witness program ──OP_0 PUSH32──▶ scriptPubKey ──bech32──▶ address
//!                                                                ▲                       │
//!                                                                └───────decode──────────┘
//!
//! PSBT ──global map──▶ unsigned tx ──outputs──▶ [(value, scriptPubKey)]
//! ```
//!
//! - **script**: P2WSH witness programs and the 2-of-2 custody multisig layout
//! - **bech32**: BIP-173 segwit v0 address encoding and decoding
//! - **address**: any standard destination address, via the `bitcoin` crate
//! - **transaction**: bounds-checked reader and raw transaction output parsing
//! - **psbt**: BIP-174 container walking down to the unsigned transaction
//!
//! Nothing here authorizes anything. All amounts are `u64` satoshis.

pub mod address;
pub mod bech32;
pub mod psbt;
pub mod script;
pub mod transaction;

use thiserror::Error;

pub use address::address_to_script_pubkey;
pub use bech32::{bech32_to_script_pubkey, encode_segwit_address, script_pubkey_to_bech32};
pub use psbt::{extract_unsigned_tx, parse_psbt_outputs, PSBT_MAGIC, PSBT_MIN_LEN};
pub use script::{
    build_multisig_script, extract_two_public_keys, script_pubkey_to_witness_program,
    script_to_script_pubkey, script_to_witness_program, validate_compressed_public_key,
    verify_script_matches_witness_program, witness_program_to_script_pubkey,
};
pub use transaction::{parse_transaction, parse_transaction_outputs, ParsedTransaction, TxOutput};

/// Codec errors
///
/// Every variant is a malformed-input failure: the bytes or text handed to
/// the codec did not have the shape the protocol requires.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("malformed multisig script: {0}")]
    MalformedScript(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid witness program length: expected a 34-byte P2WSH scriptPubKey, got {0} bytes")]
    InvalidWitnessProgramLength(usize),

    #[error("scriptPubKey is not a version 0 P2WSH output")]
    UnsupportedScriptPubKey,

    #[error("invalid bech32 address: {0}")]
    InvalidAddress(String),

    #[error("PSBT too short: {0} bytes")]
    PsbtTooShort(usize),

    #[error("invalid PSBT magic bytes")]
    InvalidPsbtMagic,

    #[error("unsupported PSBT version: {0}")]
    UnsupportedPsbtVersion(u32),

    #[error("PSBT has no unsigned transaction")]
    MissingUnsignedTx,

    #[error("duplicate PSBT global key type 0x{0:02x}")]
    DuplicatePsbtKey(u8),

    #[error("transaction too short: {0} bytes")]
    TransactionTooShort(usize),

    #[error("unexpected end of data at offset {offset} (needed {needed} bytes)")]
    UnexpectedEndOfData { offset: usize, needed: usize },

    #[error("length prefix {0} exceeds addressable memory")]
    LengthOverflow(u64),
}

impl CodecError {
    pub(crate) fn invalid_address(msg: impl Into<String>) -> Self {
        Self::InvalidAddress(msg.into())
    }

    pub(crate) fn malformed_script(msg: impl Into<String>) -> Self {
        Self::MalformedScript(msg.into())
    }
}

//! PSBT container parsing (BIP-174)
//!
//! Layout walked here:
//!
//! ```text
//! "psbt" 0xff | <keylen> <keytype ...key> <valuelen> <value> | ... | 0x00 | input maps | output maps
//!             └────────────────── global map ──────────────────┘
//! ```
//!
//! Only the global map is read. The unsigned transaction (key type 0x00)
//! carries the outputs; a global version entry (key type 0xFB) other than 0
//! is rejected rather than parsed as something it is not.

use super::transaction::{parse_transaction_outputs, ByteReader, TxOutput, MIN_TX_LEN};
use super::CodecError;

/// "psbt" followed by the 0xff separator
pub const PSBT_MAGIC: [u8; 5] = [0x70, 0x73, 0x62, 0x74, 0xff];

/// magic + one key-value header (keylen, keytype, valuelen) + minimal tx + map separator
pub const PSBT_MIN_LEN: usize = PSBT_MAGIC.len() + 3 + MIN_TX_LEN + 1;

const PSBT_GLOBAL_UNSIGNED_TX: u8 = 0x00;
const PSBT_GLOBAL_VERSION: u8 = 0xfb;
const SUPPORTED_PSBT_VERSION: u32 = 0;

/// Locate the unsigned transaction inside a PSBT
pub fn extract_unsigned_tx(psbt: &[u8]) -> Result<&[u8], CodecError> {
    if psbt.len() < PSBT_MIN_LEN {
        return Err(CodecError::PsbtTooShort(psbt.len()));
    }

    if psbt[..PSBT_MAGIC.len()] != PSBT_MAGIC {
        return Err(CodecError::InvalidPsbtMagic);
    }

    let mut reader = ByteReader::at(psbt, PSBT_MAGIC.len());
    let mut unsigned_tx = None;

    loop {
        let key_len = reader.read_length()?;
        if key_len == 0 {
            break;
        }

        let key = reader.take(key_len)?;
        let value_len = reader.read_length()?;
        let value = reader.take(value_len)?;

        match key[0] {
            PSBT_GLOBAL_UNSIGNED_TX => {
                if unsigned_tx.replace(value).is_some() {
                    return Err(CodecError::DuplicatePsbtKey(PSBT_GLOBAL_UNSIGNED_TX));
                }
            }
            PSBT_GLOBAL_VERSION => {
                let mut version_reader = ByteReader::new(value);
                let version = version_reader.read_u32_le()?;
                if version != SUPPORTED_PSBT_VERSION {
                    return Err(CodecError::UnsupportedPsbtVersion(version));
                }
            }
            _ => {}
        }
    }

    unsigned_tx.ok_or(CodecError::MissingUnsignedTx)
}

/// Parse the outputs of the unsigned transaction embedded in a PSBT
pub fn parse_psbt_outputs(psbt: &[u8]) -> Result<Vec<TxOutput>, CodecError> {
    let unsigned_tx = extract_unsigned_tx(psbt)?;
    parse_transaction_outputs(unsigned_tx)
}

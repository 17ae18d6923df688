//! Custody scripts and P2WSH witness programs
//!
//! The custody redeem script is a fixed-layout 2-of-2 multisig:
//!
//! ```text
//! OP_2 PUSH33 <pubkey1> PUSH33 <pubkey2> OP_2 OP_CHECKMULTISIG
//! 0x52 0x21   [2..35]   0x21   [36..69]  0x52 0xae            = 71 bytes
//! ```

use bitcoin::secp256k1::PublicKey;
use sha2::{Digest, Sha256};

use super::CodecError;

pub const OP_0: u8 = 0x00;
pub const OP_2: u8 = 0x52;
pub const OP_PUSHBYTES_32: u8 = 0x20;
pub const OP_PUSHBYTES_33: u8 = 0x21;
pub const OP_CHECKMULTISIG: u8 = 0xae;

pub const COMPRESSED_PUBKEY_LEN: usize = 33;
pub const WITNESS_PROGRAM_LEN: usize = 32;
pub const P2WSH_SCRIPT_PUBKEY_LEN: usize = 2 + WITNESS_PROGRAM_LEN;
pub const MULTISIG_2_OF_2_LEN: usize = 3 + 2 * (1 + COMPRESSED_PUBKEY_LEN);

const FIRST_KEY_OFFSET: usize = 2;
const SECOND_KEY_OFFSET: usize = FIRST_KEY_OFFSET + COMPRESSED_PUBKEY_LEN + 1;

/// P2WSH witness program: SHA-256 of the redeem script
pub fn script_to_witness_program(script: &[u8]) -> [u8; 32] {
    let mut program = [0u8; 32];
    program.copy_from_slice(&Sha256::digest(script));
    program
}

/// `OP_0 PUSH32 <program>`
pub fn witness_program_to_script_pubkey(program: &[u8; 32]) -> [u8; P2WSH_SCRIPT_PUBKEY_LEN] {
    let mut spk = [0u8; P2WSH_SCRIPT_PUBKEY_LEN];
    spk[0] = OP_0;
    spk[1] = OP_PUSHBYTES_32;
    spk[2..].copy_from_slice(program);
    spk
}

/// P2WSH scriptPubKey committing to the redeem script
pub fn script_to_script_pubkey(script: &[u8]) -> [u8; P2WSH_SCRIPT_PUBKEY_LEN] {
    witness_program_to_script_pubkey(&script_to_witness_program(script))
}

/// Witness program committed in a v0 P2WSH scriptPubKey
pub fn script_pubkey_to_witness_program(script_pubkey: &[u8]) -> Result<[u8; 32], CodecError> {
    if script_pubkey.len() != P2WSH_SCRIPT_PUBKEY_LEN {
        return Err(CodecError::InvalidWitnessProgramLength(script_pubkey.len()));
    }
    if script_pubkey[0] != OP_0 || script_pubkey[1] != OP_PUSHBYTES_32 {
        return Err(CodecError::UnsupportedScriptPubKey);
    }

    let mut program = [0u8; 32];
    program.copy_from_slice(&script_pubkey[2..]);
    Ok(program)
}

/// Whether `script` hashes to `witness_program`
pub fn verify_script_matches_witness_program(script: &[u8], witness_program: &[u8]) -> bool {
    witness_program.len() == WITNESS_PROGRAM_LEN
        && script_to_witness_program(script)[..] == *witness_program
}

/// Pull both compressed keys out of a 2-of-2 custody script
pub fn extract_two_public_keys(
    script: &[u8],
) -> Result<([u8; COMPRESSED_PUBKEY_LEN], [u8; COMPRESSED_PUBKEY_LEN]), CodecError> {
    if script.len() < MULTISIG_2_OF_2_LEN {
        return Err(CodecError::malformed_script(format!(
            "expected {} bytes, got {}",
            MULTISIG_2_OF_2_LEN,
            script.len()
        )));
    }
    if script[FIRST_KEY_OFFSET - 1] != OP_PUSHBYTES_33
        || script[SECOND_KEY_OFFSET - 1] != OP_PUSHBYTES_33
    {
        return Err(CodecError::malformed_script("public keys must be 33-byte pushes"));
    }

    let mut first = [0u8; COMPRESSED_PUBKEY_LEN];
    first.copy_from_slice(&script[FIRST_KEY_OFFSET..FIRST_KEY_OFFSET + COMPRESSED_PUBKEY_LEN]);

    let mut second = [0u8; COMPRESSED_PUBKEY_LEN];
    second.copy_from_slice(&script[SECOND_KEY_OFFSET..SECOND_KEY_OFFSET + COMPRESSED_PUBKEY_LEN]);

    Ok((first, second))
}

/// Build the 2-of-2 custody script for two compressed keys
pub fn build_multisig_script(
    first: &[u8; COMPRESSED_PUBKEY_LEN],
    second: &[u8; COMPRESSED_PUBKEY_LEN],
) -> Vec<u8> {
    let mut script = Vec::with_capacity(MULTISIG_2_OF_2_LEN);
    script.push(OP_2);
    script.push(OP_PUSHBYTES_33);
    script.extend_from_slice(first);
    script.push(OP_PUSHBYTES_33);
    script.extend_from_slice(second);
    script.push(OP_2);
    script.push(OP_CHECKMULTISIG);
    script
}

/// Check that `key` is a valid compressed secp256k1 point
pub fn validate_compressed_public_key(key: &[u8]) -> Result<(), CodecError> {
    if key.len() != COMPRESSED_PUBKEY_LEN {
        return Err(CodecError::InvalidPublicKey(format!(
            "expected {} bytes, got {}",
            COMPRESSED_PUBKEY_LEN,
            key.len()
        )));
    }

    PublicKey::from_slice(key)
        .map(|_| ())
        .map_err(|e| CodecError::InvalidPublicKey(e.to_string()))
}

//! Bech32 segwit v0 addresses (BIP-173)
//!
//! Encoding regroups the 8-bit witness program into 5-bit words, prefixes
//! the witness version and appends a 6-word BCH checksum computed over the
//! expanded human-readable part and the data.

use super::script::{
    OP_0, OP_PUSHBYTES_32, P2WSH_SCRIPT_PUBKEY_LEN, WITNESS_PROGRAM_LEN,
};
use super::CodecError;

const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";
const GENERATOR: [u32; 5] = [0x3b6a_57b2, 0x2650_8e6d, 0x1ea1_19fa, 0x3d42_33dd, 0x2a14_62b3];
const BECH32_CONST: u32 = 1;
const CHECKSUM_LEN: usize = 6;
const SEPARATOR: char = '1';
const MAX_ADDRESS_LEN: usize = 90;
const P2WPKH_PROGRAM_LEN: usize = 20;

fn polymod(values: &[u8]) -> u32 {
    let mut chk: u32 = 1;
    for value in values {
        let top = chk >> 25;
        chk = ((chk & 0x01ff_ffff) << 5) ^ u32::from(*value);
        for (i, generator) in GENERATOR.iter().enumerate() {
            if (top >> i) & 1 == 1 {
                chk ^= generator;
            }
        }
    }
    chk
}

fn hrp_expand(hrp: &[u8]) -> Vec<u8> {
    let mut expanded = Vec::with_capacity(hrp.len() * 2 + 1);
    expanded.extend(hrp.iter().map(|c| c >> 5));
    expanded.push(0);
    expanded.extend(hrp.iter().map(|c| c & 0x1f));
    expanded
}

fn create_checksum(hrp: &[u8], data: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut values = hrp_expand(hrp);
    values.extend_from_slice(data);
    values.extend_from_slice(&[0u8; CHECKSUM_LEN]);

    let pm = polymod(&values) ^ BECH32_CONST;
    let mut checksum = [0u8; CHECKSUM_LEN];
    for (i, word) in checksum.iter_mut().enumerate() {
        *word = ((pm >> (5 * (5 - i))) & 0x1f) as u8;
    }
    checksum
}

fn verify_checksum(hrp: &[u8], data: &[u8]) -> bool {
    let mut values = hrp_expand(hrp);
    values.extend_from_slice(data);
    polymod(&values) == BECH32_CONST
}

/// Regroup bits between word sizes (8 → 5 when encoding, 5 → 8 when decoding)
fn convert_bits(data: &[u8], from: u32, to: u32, pad: bool) -> Result<Vec<u8>, CodecError> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let max_value: u32 = (1 << to) - 1;
    let max_acc: u32 = (1 << (from + to - 1)) - 1;
    let mut out = Vec::with_capacity(data.len() * from as usize / to as usize + 1);

    for value in data {
        let v = u32::from(*value);
        if v >> from != 0 {
            return Err(CodecError::invalid_address("data word out of range"));
        }
        acc = ((acc << from) | v) & max_acc;
        bits += from;
        while bits >= to {
            bits -= to;
            out.push(((acc >> bits) & max_value) as u8);
        }
    }

    if pad {
        if bits > 0 {
            out.push(((acc << (to - bits)) & max_value) as u8);
        }
    } else if bits >= from || ((acc << (to - bits)) & max_value) != 0 {
        return Err(CodecError::invalid_address("invalid padding"));
    }

    Ok(out)
}

/// Encode a witness program as a bech32 segwit address
pub fn encode_segwit_address(hrp: &str, version: u8, program: &[u8]) -> Result<String, CodecError> {
    if hrp.is_empty() || !hrp.bytes().all(|c| (33..=126).contains(&c)) {
        return Err(CodecError::invalid_address(format!("invalid prefix {:?}", hrp)));
    }
    if version > 16 {
        return Err(CodecError::invalid_address(format!("invalid witness version {}", version)));
    }

    let hrp = hrp.to_ascii_lowercase();
    let mut data = vec![version];
    data.extend(convert_bits(program, 8, 5, true)?);
    let checksum = create_checksum(hrp.as_bytes(), &data);

    let mut address = String::with_capacity(hrp.len() + 1 + data.len() + CHECKSUM_LEN);
    address.push_str(&hrp);
    address.push(SEPARATOR);
    for word in data.iter().chain(checksum.iter()) {
        address.push(CHARSET[*word as usize] as char);
    }
    Ok(address)
}

/// Encode a v0 P2WSH scriptPubKey as a bech32 address.
///
/// Anything other than `OP_0 PUSH32 <32 bytes>` is rejected.
pub fn script_pubkey_to_bech32(script_pubkey: &[u8], hrp: &str) -> Result<String, CodecError> {
    if script_pubkey.len() != P2WSH_SCRIPT_PUBKEY_LEN {
        return Err(CodecError::InvalidWitnessProgramLength(script_pubkey.len()));
    }
    if script_pubkey[0] != OP_0 || script_pubkey[1] != OP_PUSHBYTES_32 {
        return Err(CodecError::UnsupportedScriptPubKey);
    }

    encode_segwit_address(hrp, 0, &script_pubkey[2..])
}

/// Decode a v0 segwit address into its scriptPubKey.
///
/// Accepts P2WPKH (20-byte) and P2WSH (32-byte) programs under the expected
/// human-readable prefix.
pub fn bech32_to_script_pubkey(address: &str, expected_hrp: &str) -> Result<Vec<u8>, CodecError> {
    if address.len() < 8 || address.len() > MAX_ADDRESS_LEN {
        return Err(CodecError::invalid_address(format!("bad length {}", address.len())));
    }
    if !address.is_ascii() {
        return Err(CodecError::invalid_address("non-ASCII character"));
    }
    let has_lower = address.bytes().any(|c| c.is_ascii_lowercase());
    let has_upper = address.bytes().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper {
        return Err(CodecError::invalid_address("mixed case"));
    }

    let address = address.to_ascii_lowercase();
    let separator = address
        .rfind(SEPARATOR)
        .ok_or_else(|| CodecError::invalid_address("missing separator"))?;
    let (hrp, rest) = address.split_at(separator);
    let encoded = &rest[1..];

    if hrp.is_empty() || encoded.len() < CHECKSUM_LEN + 1 {
        return Err(CodecError::invalid_address("missing prefix or data"));
    }
    if hrp != expected_hrp.to_ascii_lowercase() {
        return Err(CodecError::invalid_address(format!(
            "wrong network prefix {:?}, expected {:?}",
            hrp, expected_hrp
        )));
    }

    let mut data = Vec::with_capacity(encoded.len());
    for c in encoded.bytes() {
        let word = CHARSET
            .iter()
            .position(|&x| x == c)
            .ok_or_else(|| CodecError::invalid_address(format!("invalid character {:?}", c as char)))?;
        data.push(word as u8);
    }

    if !verify_checksum(hrp.as_bytes(), &data) {
        return Err(CodecError::invalid_address("checksum mismatch"));
    }

    let data = &data[..data.len() - CHECKSUM_LEN];
    let version = data[0];
    if version != 0 {
        return Err(CodecError::invalid_address(format!(
            "unsupported witness version {}",
            version
        )));
    }

    let program = convert_bits(&data[1..], 5, 8, false)?;
    if program.len() != P2WPKH_PROGRAM_LEN && program.len() != WITNESS_PROGRAM_LEN {
        return Err(CodecError::invalid_address(format!(
            "invalid v0 program length {}",
            program.len()
        )));
    }

    let mut script_pubkey = Vec::with_capacity(2 + program.len());
    script_pubkey.push(OP_0);
    script_pubkey.push(program.len() as u8);
    script_pubkey.extend_from_slice(&program);
    Ok(script_pubkey)
}

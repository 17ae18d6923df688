//! Destination address decoding
//!
//! Withdrawals may pay any standard address on the configured network
//! (P2PKH, P2SH, segwit v0, taproot), so decoding is left to the `bitcoin`
//! crate. Custody addresses stay on the BIP-173 codec in [`super::bech32`].

use bitcoin::{Address, Network};
use std::str::FromStr;

use super::CodecError;

/// Decode an address valid on `network` into its scriptPubKey
pub fn address_to_script_pubkey(address: &str, network: Network) -> Result<Vec<u8>, CodecError> {
    let address = Address::from_str(address)
        .map_err(|e| CodecError::InvalidAddress(e.to_string()))?
        .require_network(network)
        .map_err(|e| CodecError::InvalidAddress(e.to_string()))?;

    Ok(address.script_pubkey().into_bytes())
}

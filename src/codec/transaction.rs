//! Raw transaction parsing
//!
//! Only the parts the pod protocol needs are interpreted: version, input
//! count and the output list. Witnesses and lock time are not read.

use serde::Serialize;

use super::CodecError;

/// version (4) + input count (1) + output count (1) + lock time (4)
pub const MIN_TX_LEN: usize = 10;

/// value (8) + empty script length (1)
const MIN_OUTPUT_LEN: usize = 9;

/// outpoint (36) + empty script length (1) + sequence (4)
const MIN_INPUT_LEN: usize = 41;

/// Parsed transaction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxOutput {
    /// Output value in satoshis
    pub value: u64,
    /// Script pubkey (locking script)
    pub script_pubkey: Vec<u8>,
}

/// Parsed transaction header and outputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTransaction {
    pub version: u32,
    pub is_segwit: bool,
    pub input_count: usize,
    pub outputs: Vec<TxOutput>,
}

/// Forward-only cursor over untrusted bytes.
///
/// Every read checks bounds first; the offset never moves backwards.
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub(crate) fn at(data: &'a [u8], offset: usize) -> Self {
        Self { data, offset }
    }

    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.offset)
    }

    pub(crate) fn peek(&self, ahead: usize) -> Option<u8> {
        self.offset
            .checked_add(ahead)
            .and_then(|i| self.data.get(i))
            .copied()
    }

    pub(crate) fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        let eod = CodecError::UnexpectedEndOfData {
            offset: self.offset,
            needed: len,
        };
        let end = self.offset.checked_add(len).ok_or(eod.clone())?;
        if end > self.data.len() {
            return Err(eod);
        }

        let slice = &self.data[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    pub(crate) fn skip(&mut self, len: usize) -> Result<(), CodecError> {
        self.take(len).map(|_| ())
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn read_u16_le(&mut self) -> Result<u16, CodecError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub(crate) fn read_u32_le(&mut self) -> Result<u32, CodecError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn read_u64_le(&mut self) -> Result<u64, CodecError> {
        let b = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(u64::from_le_bytes(buf))
    }

    /// Bitcoin compact size ("varint")
    pub(crate) fn read_compact_size(&mut self) -> Result<u64, CodecError> {
        match self.read_u8()? {
            n @ 0..=0xfc => Ok(n as u64),
            0xfd => Ok(self.read_u16_le()? as u64),
            0xfe => Ok(self.read_u32_le()? as u64),
            0xff => self.read_u64_le(),
        }
    }

    /// Compact size used as a byte or item count
    pub(crate) fn read_length(&mut self) -> Result<usize, CodecError> {
        let n = self.read_compact_size()?;
        usize::try_from(n).map_err(|_| CodecError::LengthOverflow(n))
    }
}

/// Parse a serialized transaction (legacy or segwit-marked)
pub fn parse_transaction(raw_tx: &[u8]) -> Result<ParsedTransaction, CodecError> {
    if raw_tx.len() < MIN_TX_LEN {
        return Err(CodecError::TransactionTooShort(raw_tx.len()));
    }

    let mut reader = ByteReader::new(raw_tx);
    let version = reader.read_u32_le()?;

    let is_segwit = reader.peek(0) == Some(0x00) && reader.peek(1) == Some(0x01);
    if is_segwit {
        reader.skip(2)?;
    }

    let input_count = reader.read_length()?;
    if input_count > reader.remaining() / MIN_INPUT_LEN {
        return Err(CodecError::UnexpectedEndOfData {
            offset: reader.offset(),
            needed: input_count.saturating_mul(MIN_INPUT_LEN),
        });
    }
    for _ in 0..input_count {
        reader.skip(36)?; // previous outpoint
        let script_len = reader.read_length()?;
        reader.skip(script_len)?;
        reader.skip(4)?; // sequence
    }

    let outputs = read_outputs(&mut reader)?;

    Ok(ParsedTransaction {
        version,
        is_segwit,
        input_count,
        outputs,
    })
}

/// Parse only the outputs of a serialized transaction
pub fn parse_transaction_outputs(raw_tx: &[u8]) -> Result<Vec<TxOutput>, CodecError> {
    parse_transaction(raw_tx).map(|tx| tx.outputs)
}

fn read_outputs(reader: &mut ByteReader<'_>) -> Result<Vec<TxOutput>, CodecError> {
    let output_count = reader.read_length()?;
    if output_count > reader.remaining() / MIN_OUTPUT_LEN {
        return Err(CodecError::UnexpectedEndOfData {
            offset: reader.offset(),
            needed: output_count.saturating_mul(MIN_OUTPUT_LEN),
        });
    }

    let mut outputs = Vec::with_capacity(output_count);
    for _ in 0..output_count {
        let value = reader.read_u64_le()?;
        let script_len = reader.read_length()?;
        let script_pubkey = reader.take(script_len)?.to_vec();
        outputs.push(TxOutput {
            value,
            script_pubkey,
        });
    }

    Ok(outputs)
}

//! Commitment to the ordered input set of a transaction.
//!
//! Each input contributes `txid (32, wire order) || index (u32 LE)`, concatenated in
//! input order. The close transition receives this value as an argument and
//! requires it to match the transaction it is validating byte for byte, which
//! lets the covenant reason about inputs it cannot see directly.

use std::fmt;

use kaspa_consensus_core::tx::{Transaction, TransactionId, TransactionOutpoint};

use crate::errors::AuctionError;

pub const OUTPOINT_TXID_SIZE: usize = 32;
pub const OUTPOINT_INDEX_SIZE: usize = 4;
pub const PREVOUT_ENTRY_LEN: usize = OUTPOINT_TXID_SIZE + OUTPOINT_INDEX_SIZE;

pub(crate) fn encode_outpoint(out: &mut Vec<u8>, outpoint: &TransactionOutpoint) {
    out.extend_from_slice(&outpoint.transaction_id.as_bytes());
    out.extend_from_slice(&outpoint.index.to_le_bytes());
}

pub(crate) fn decode_outpoint(entry: &[u8]) -> Option<TransactionOutpoint> {
    if entry.len() != PREVOUT_ENTRY_LEN {
        return None;
    }
    let mut txid = [0u8; OUTPOINT_TXID_SIZE];
    txid.copy_from_slice(&entry[..OUTPOINT_TXID_SIZE]);
    let mut index = [0u8; OUTPOINT_INDEX_SIZE];
    index.copy_from_slice(&entry[OUTPOINT_TXID_SIZE..]);
    Some(TransactionOutpoint::new(TransactionId::from_bytes(txid), u32::from_le_bytes(index)))
}

#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct PrevoutCommitment(Vec<u8>);

impl PrevoutCommitment {
    pub fn from_outpoints<'a>(outpoints: impl IntoIterator<Item = &'a TransactionOutpoint>) -> Self {
        let mut bytes = Vec::new();
        for outpoint in outpoints {
            encode_outpoint(&mut bytes, outpoint);
        }
        Self(bytes)
    }

    /// The commitment the transaction actually makes, from its final inputs.
    pub fn from_transaction(tx: &Transaction) -> Self {
        Self::from_outpoints(tx.inputs.iter().map(|input| &input.previous_outpoint))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Number of complete entries.
    pub fn len(&self) -> usize {
        self.0.len() / PREVOUT_ENTRY_LEN
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn outpoint_at(&self, index: usize) -> Option<TransactionOutpoint> {
        let start = index.checked_mul(PREVOUT_ENTRY_LEN)?;
        self.0.get(start..start.checked_add(PREVOUT_ENTRY_LEN)?).and_then(decode_outpoint)
    }

    pub fn outpoints(&self) -> impl Iterator<Item = TransactionOutpoint> + '_ {
        self.0.chunks_exact(PREVOUT_ENTRY_LEN).filter_map(decode_outpoint)
    }

    /// Requires this commitment to equal the prevouts of `tx` exactly.
    pub fn verify(&self, tx: &Transaction) -> Result<(), AuctionError> {
        let actual = Self::from_transaction(tx);
        if *self != actual {
            return Err(AuctionError::PrevoutMismatch { supplied: self.to_string(), actual: actual.to_string() });
        }
        Ok(())
    }
}

impl From<Vec<u8>> for PrevoutCommitment {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for PrevoutCommitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrevoutCommitment({self})")
    }
}

impl fmt::Display for PrevoutCommitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

//! Covenant state carried by every auction instance.
//!
//! The state is a fixed 108-byte record:
//!
//! ```text
//! [asset txid (32)][asset index u32 LE (4)][auctioneer (32)][deadline u64 LE (8)][bidder (32)]
//! ```
//!
//! The first three fields are fixed when the auction is created and must be
//! byte-identical in every instance of the chain. Only the bidder changes.

use std::fmt;
use std::ops::Range;

use kaspa_consensus_core::constants::LOCK_TIME_THRESHOLD;
use kaspa_consensus_core::tx::{Transaction, TransactionOutpoint, UtxoEntry};
use secp256k1::XOnlyPublicKey;
use serde::{Deserialize, Serialize};

use crate::errors::{AuctionError, CloseGate, SuccessorDefect};
use crate::prevouts::{PREVOUT_ENTRY_LEN, PrevoutCommitment, decode_outpoint, encode_outpoint};

pub const IDENTITY_LEN: usize = 32;
pub const STATE_LEN: usize = PREVOUT_ENTRY_LEN + IDENTITY_LEN + 8 + IDENTITY_LEN;

const ASSET_RANGE: Range<usize> = 0..PREVOUT_ENTRY_LEN;
const AUCTIONEER_RANGE: Range<usize> = ASSET_RANGE.end..ASSET_RANGE.end + IDENTITY_LEN;
const DEADLINE_RANGE: Range<usize> = AUCTIONEER_RANGE.end..AUCTIONEER_RANGE.end + 8;
const BIDDER_RANGE: Range<usize> = DEADLINE_RANGE.end..STATE_LEN;

/// An x-only Schnorr public key identifying the auctioneer or a bidder.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity(XOnlyPublicKey);

impl Identity {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, AuctionError> {
        XOnlyPublicKey::from_slice(bytes).map(Self).map_err(|_| AuctionError::InvalidPublicKey(hex::encode(bytes)))
    }

    pub fn from_hex(value: &str) -> Result<Self, AuctionError> {
        let bytes = hex::decode(value).map_err(|_| AuctionError::InvalidPublicKey(value.to_string()))?;
        Self::from_slice(&bytes)
    }

    pub fn serialize(&self) -> [u8; IDENTITY_LEN] {
        self.0.serialize()
    }

    pub fn x_only_public_key(&self) -> &XOnlyPublicKey {
        &self.0
    }
}

impl From<XOnlyPublicKey> for Identity {
    fn from(key: XOnlyPublicKey) -> Self {
        Self(key)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({self})")
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.serialize()))
    }
}

/// How a lock-time value is interpreted by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockTimeKind {
    DaaScore,
    /// Milliseconds since the unix epoch.
    Timestamp,
}

impl LockTimeKind {
    pub fn of(lock_time: u64) -> Self {
        if lock_time < LOCK_TIME_THRESHOLD { Self::DaaScore } else { Self::Timestamp }
    }
}

/// Absolute point after which the auction may be closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Deadline(u64);

impl Deadline {
    pub const fn new(lock_time: u64) -> Self {
        Self(lock_time)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }

    pub fn kind(&self) -> LockTimeKind {
        LockTimeKind::of(self.0)
    }

    /// Passes iff `lock_time` is of the same kind as the deadline and not earlier than it.
    pub fn check_lock_time(&self, lock_time: u64) -> Result<(), CloseGate> {
        if LockTimeKind::of(lock_time) != self.kind() {
            return Err(CloseGate::KindMismatch { lock_time, deadline: self.0 });
        }
        if lock_time < self.0 {
            return Err(CloseGate::BeforeDeadline { lock_time, deadline: self.0 });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CovenantState {
    asset: TransactionOutpoint,
    auctioneer: Identity,
    deadline: Deadline,
    bidder: Identity,
}

impl CovenantState {
    /// State of a fresh auction: nobody has bid yet, so the auctioneer holds the bidder slot.
    pub fn genesis(asset: TransactionOutpoint, auctioneer: Identity, deadline: Deadline) -> Self {
        Self { asset, auctioneer, deadline, bidder: auctioneer }
    }

    /// Genesis state whose asset is entry `index` of a prevout commitment, e.g. of the
    /// transaction that last moved the asset.
    pub fn genesis_from_commitment(
        commitment: &PrevoutCommitment,
        index: usize,
        auctioneer: Identity,
        deadline: Deadline,
    ) -> Result<Self, AuctionError> {
        let asset =
            commitment.outpoint_at(index).ok_or(AuctionError::MissingCommitmentEntry { index, entries: commitment.len() })?;
        Ok(Self::genesis(asset, auctioneer, deadline))
    }

    pub fn asset(&self) -> TransactionOutpoint {
        self.asset
    }

    pub fn auctioneer(&self) -> Identity {
        self.auctioneer
    }

    pub fn deadline(&self) -> Deadline {
        self.deadline
    }

    pub fn bidder(&self) -> Identity {
        self.bidder
    }

    /// Returns the successor state, identical except for the bidder.
    pub fn with_bidder(&self, bidder: Identity) -> Self {
        Self { bidder, ..*self }
    }

    pub fn encode(&self) -> [u8; STATE_LEN] {
        let mut bytes = Vec::with_capacity(STATE_LEN);
        encode_outpoint(&mut bytes, &self.asset);
        bytes.extend_from_slice(&self.auctioneer.serialize());
        bytes.extend_from_slice(&self.deadline.value().to_le_bytes());
        bytes.extend_from_slice(&self.bidder.serialize());

        let mut out = [0u8; STATE_LEN];
        out.copy_from_slice(&bytes);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, AuctionError> {
        if bytes.len() != STATE_LEN {
            return Err(AuctionError::InvalidStateLength { expected: STATE_LEN, actual: bytes.len() });
        }
        let asset = decode_outpoint(&bytes[ASSET_RANGE])
            .ok_or(AuctionError::InvalidStateLength { expected: STATE_LEN, actual: bytes.len() })?;
        let auctioneer = Identity::from_slice(&bytes[AUCTIONEER_RANGE])?;
        let mut deadline = [0u8; 8];
        deadline.copy_from_slice(&bytes[DEADLINE_RANGE]);
        let bidder = Identity::from_slice(&bytes[BIDDER_RANGE])?;

        Ok(Self { asset, auctioneer, deadline: Deadline::new(u64::from_le_bytes(deadline)), bidder })
    }

    /// Compares the immutable fields of `successor` with ours, byte for byte.
    pub fn ensure_same_terms(&self, successor: &CovenantState) -> Result<(), AuctionError> {
        let ours = self.encode();
        let theirs = successor.encode();
        for (field, range) in [("asset", ASSET_RANGE), ("auctioneer", AUCTIONEER_RANGE), ("deadline", DEADLINE_RANGE)] {
            if ours[range.clone()] != theirs[range] {
                return Err(AuctionError::StateCorruption { field });
            }
        }
        Ok(())
    }
}

/// One snapshot in the auction chain: a covenant state and the UTXO that carries it.
#[derive(Debug, Clone)]
pub struct CovenantInstance {
    state: CovenantState,
    utxo_outpoint: TransactionOutpoint,
    utxo_entry: UtxoEntry,
}

impl CovenantInstance {
    pub fn new(state: CovenantState, utxo_outpoint: TransactionOutpoint, utxo_entry: UtxoEntry) -> Self {
        Self { state, utxo_outpoint, utxo_entry }
    }

    /// Reads the instance created at `output_index` of a finalized transaction.
    ///
    /// The entry records DAA score 0 since the transaction is not yet accepted.
    pub fn from_transaction(state: CovenantState, tx: &Transaction, output_index: u32) -> Result<Self, AuctionError> {
        let output = tx.outputs.get(output_index as usize).ok_or(SuccessorDefect::MissingOutput(output_index as usize))?;
        let entry = UtxoEntry::new(output.value, output.script_public_key.clone(), 0, false);
        Ok(Self::new(state, TransactionOutpoint::new(tx.id(), output_index), entry))
    }

    pub fn state(&self) -> &CovenantState {
        &self.state
    }

    pub fn utxo_outpoint(&self) -> &TransactionOutpoint {
        &self.utxo_outpoint
    }

    pub fn utxo_entry(&self) -> &UtxoEntry {
        &self.utxo_entry
    }

    /// The running highest bid.
    pub fn amount(&self) -> u64 {
        self.utxo_entry.amount
    }
}

//! Locking scripts used by the auction.
//!
//! Two kinds of outputs appear in the auction:
//!
//! - Covenant instances, locked to the P2SH of `[state push][contract body]`. The body
//!   is the compiled auction logic and never changes along the chain; the pushed state
//!   does. Rebuilding the redeem script around a new state and hashing it yields the
//!   exact locking script a successor output must carry.
//! - Payouts, locked to a hash of the recipient's public key.

use blake2b_simd::Params;
use kaspa_consensus_core::tx::ScriptPublicKey;
use kaspa_txscript::{
    opcodes::codes::{OpBlake2b, OpEqual},
    pay_to_script_hash_script,
    script_builder::{ScriptBuilder, ScriptBuilderError},
};

use crate::errors::AuctionError;
use crate::state::{CovenantState, Identity, STATE_LEN};

pub const PUBKEY_HASH_LEN: usize = 20;

/// First 20 bytes of blake2b-256 over the x-only key.
pub fn pubkey_hash(identity: &Identity) -> [u8; PUBKEY_HASH_LEN] {
    let digest = Params::new().hash_length(32).to_state().update(&identity.serialize()).finalize();
    let mut hash = [0u8; PUBKEY_HASH_LEN];
    hash.copy_from_slice(&digest.as_bytes()[..PUBKEY_HASH_LEN]);
    hash
}

/// `OpBlake2b <pubkey hash> OpEqual`
pub fn pay_to_pubkey_hash_script(identity: &Identity) -> Result<ScriptPublicKey, ScriptBuilderError> {
    let script = ScriptBuilder::new().add_op(OpBlake2b)?.add_data(&pubkey_hash(identity))?.add_op(OpEqual)?.drain();
    Ok(ScriptPublicKey::new(0, script.into()))
}

pub fn script_hex(spk: &ScriptPublicKey) -> String {
    hex::encode(spk.script())
}

/// Redeem script template shared by every instance of one auction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CovenantScript {
    body: Vec<u8>,
    state_push_header: Vec<u8>,
}

impl CovenantScript {
    /// Wraps the compiled contract body. The body expects the encoded state on top of the stack.
    pub fn new(body: Vec<u8>) -> Result<Self, AuctionError> {
        let placeholder = [0u8; STATE_LEN];
        let push = ScriptBuilder::new().add_data(&placeholder)?.drain();
        let state_push_header = push[..push.len() - STATE_LEN].to_vec();
        Ok(Self { body, state_push_header })
    }

    /// Byte offset of the state inside every redeem script built from this template.
    pub fn state_offset(&self) -> usize {
        self.state_push_header.len()
    }

    /// Redeem script length, identical for every state.
    pub fn redeem_script_len(&self) -> usize {
        self.state_offset() + STATE_LEN + self.body.len()
    }

    pub fn redeem_script(&self, state: &CovenantState) -> Vec<u8> {
        let mut script = Vec::with_capacity(self.redeem_script_len());
        script.extend_from_slice(&self.state_push_header);
        script.extend_from_slice(&state.encode());
        script.extend_from_slice(&self.body);
        script
    }

    pub fn locking_script(&self, state: &CovenantState) -> ScriptPublicKey {
        pay_to_script_hash_script(&self.redeem_script(state))
    }

    /// Recovers the state from a redeem script built from this template.
    pub fn extract_state(&self, redeem_script: &[u8]) -> Result<CovenantState, AuctionError> {
        let start = self.state_offset();
        let end = start + STATE_LEN;
        if redeem_script.len() != self.redeem_script_len()
            || redeem_script[..start] != self.state_push_header[..]
            || redeem_script[end..] != self.body[..]
        {
            return Err(AuctionError::InvalidStateLength {
                expected: self.redeem_script_len(),
                actual: redeem_script.len(),
            });
        }
        CovenantState::decode(&redeem_script[start..end])
    }
}

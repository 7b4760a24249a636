//! Signature seam for the close transition.
//!
//! Key custody lives elsewhere; anything that can produce a Schnorr signature over a
//! 32-byte sighash implements [`SighashSigner`]. Signatures travel as 64 bytes followed
//! by the sighash type byte, and only `SIG_HASH_ALL` is accepted.

use kaspa_consensus_core::hashing::sighash::{SigHashReusedValuesUnsync, calc_schnorr_signature_hash};
use kaspa_consensus_core::hashing::sighash_type::SIG_HASH_ALL;
use kaspa_consensus_core::tx::VerifiableTransaction;
use kaspa_hashes::Hash;
use secp256k1::{Keypair, Message, SECP256K1, schnorr};

use crate::errors::SignatureDefect;
use crate::state::Identity;

pub const SCHNORR_SIGNATURE_LEN: usize = 64;
pub const SIGNATURE_WITH_TYPE_LEN: usize = SCHNORR_SIGNATURE_LEN + 1;

pub trait SighashSigner {
    fn identity(&self) -> Identity;
    fn sign_digest(&self, digest: [u8; 32]) -> [u8; SCHNORR_SIGNATURE_LEN];
}

impl SighashSigner for Keypair {
    fn identity(&self) -> Identity {
        Identity::from(self.x_only_public_key().0)
    }

    fn sign_digest(&self, digest: [u8; 32]) -> [u8; SCHNORR_SIGNATURE_LEN] {
        self.sign_schnorr(Message::from_digest(digest)).serialize()
    }
}

pub fn input_sighash(tx: &impl VerifiableTransaction, input_index: usize) -> Hash {
    let reused_values = SigHashReusedValuesUnsync::new();
    calc_schnorr_signature_hash(tx, input_index, SIG_HASH_ALL, &reused_values)
}

/// Signs input `input_index` of a populated transaction, returning signature || sighash type.
pub fn sign_input(tx: &impl VerifiableTransaction, input_index: usize, signer: &impl SighashSigner) -> Vec<u8> {
    let sighash = input_sighash(tx, input_index);
    let mut signature = Vec::with_capacity(SIGNATURE_WITH_TYPE_LEN);
    signature.extend_from_slice(&signer.sign_digest(sighash.as_bytes()));
    signature.push(SIG_HASH_ALL.to_u8());
    signature
}

pub fn verify_input_signature(
    tx: &impl VerifiableTransaction,
    input_index: usize,
    identity: &Identity,
    signature: &[u8],
) -> Result<(), SignatureDefect> {
    if signature.len() != SIGNATURE_WITH_TYPE_LEN {
        return Err(SignatureDefect::Length(signature.len()));
    }
    let (raw, hash_type) = signature.split_at(SCHNORR_SIGNATURE_LEN);
    if hash_type[0] != SIG_HASH_ALL.to_u8() {
        return Err(SignatureDefect::SigHashType(hash_type[0]));
    }
    let sig = schnorr::Signature::from_slice(raw).map_err(|_| SignatureDefect::Encoding)?;
    let msg = Message::from_digest(input_sighash(tx, input_index).as_bytes());
    SECP256K1.verify_schnorr(&sig, &msg, identity.x_only_public_key()).map_err(|_| SignatureDefect::Verification)
}

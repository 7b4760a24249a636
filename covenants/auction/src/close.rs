//! Close transition.
//!
//! After the deadline the auctioneer spends the asset and the live covenant
//! instance in one transaction with exactly two outputs:
//!
//! ```text
//! inputs:  [asset, covenant, fee inputs...]   (asset/covenant order set by AuctionConfig)
//! outputs: [asset amount -> P2PKH(bidder), locked amount -> P2PKH(auctioneer)]
//! ```
//!
//! The covenant cannot see its sibling inputs, so the closer passes a
//! [`PrevoutCommitment`] alongside the signature and the predicate requires it to
//! equal the real input set. The asset position is then read from the commitment.

use kaspa_consensus_core::constants::{MAX_TX_IN_SEQUENCE_NUM, TX_VERSION};
use kaspa_consensus_core::subnets::SUBNETWORK_ID_NATIVE;
use kaspa_consensus_core::tx::{
    MutableTransaction, Transaction, TransactionInput, TransactionOutpoint, TransactionOutput, UtxoEntry, VerifiableTransaction,
};
use log::{debug, warn};

use crate::config::AuctionConfig;
use crate::errors::{AuctionError, CloseGate, PayoutDefect};
use crate::prevouts::PrevoutCommitment;
use crate::script::pay_to_pubkey_hash_script;
use crate::signer::{SighashSigner, sign_input, verify_input_signature};
use crate::state::CovenantInstance;

pub const WINNER_OUTPUT_INDEX: usize = 0;
pub const PROCEEDS_OUTPUT_INDEX: usize = 1;
pub const CLOSE_OUTPUT_COUNT: usize = 2;

/// Sequence used on the asset and covenant inputs. Anything but the final value arms the lock time.
pub const CLOSE_INPUT_SEQUENCE: u64 = 0;

/// The UTXO currently holding the auctioned asset.
#[derive(Debug, Clone)]
pub struct AssetUtxo {
    pub outpoint: TransactionOutpoint,
    pub entry: UtxoEntry,
}

/// Arguments the closer supplies to the covenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseWitness {
    pub signature: Vec<u8>,
    pub prevouts: PrevoutCommitment,
}

/// An unsigned close transaction and the commitment to its final inputs.
#[derive(Debug, Clone)]
pub struct CloseTransaction {
    pub tx: MutableTransaction<Transaction>,
    pub prevouts: PrevoutCommitment,
    pub covenant_input_index: usize,
}

impl CloseTransaction {
    pub fn sign(&self, signer: &impl SighashSigner) -> CloseWitness {
        let signature = sign_close_input(&self.tx.as_verifiable(), self.covenant_input_index, signer);
        CloseWitness { signature, prevouts: self.prevouts.clone() }
    }
}

/// The auctioneer's authorization: a `SIG_HASH_ALL` signature over the covenant input.
pub fn sign_close_input(tx: &impl VerifiableTransaction, covenant_input_index: usize, signer: &impl SighashSigner) -> Vec<u8> {
    sign_input(tx, covenant_input_index, signer)
}

/// Builds the close skeleton for `instance`.
///
/// `lock_time` must not be earlier than the deadline. Fee inputs are appended after
/// the asset and covenant and are consumed entirely, the transaction has no change.
pub fn build_close_transaction(
    instance: &CovenantInstance,
    asset: &AssetUtxo,
    fee_inputs: Vec<(TransactionInput, UtxoEntry)>,
    lock_time: u64,
    config: &AuctionConfig,
) -> Result<CloseTransaction, AuctionError> {
    config.validate()?;
    let state = instance.state();
    if asset.outpoint != state.asset() {
        return Err(AuctionError::MissingInput { outpoint: state.asset() });
    }
    state.deadline().check_lock_time(lock_time)?;

    let asset_input = (TransactionInput::new(asset.outpoint, vec![], CLOSE_INPUT_SEQUENCE, 1), asset.entry.clone());
    let covenant_input =
        (TransactionInput::new(*instance.utxo_outpoint(), vec![], CLOSE_INPUT_SEQUENCE, 1), instance.utxo_entry().clone());
    let leading = if config.covenant_input_index == 0 { [covenant_input, asset_input] } else { [asset_input, covenant_input] };
    let (inputs, entries): (Vec<_>, Vec<_>) = leading.into_iter().chain(fee_inputs).unzip();

    let outputs = vec![
        TransactionOutput::new(asset.entry.amount, pay_to_pubkey_hash_script(&state.bidder())?),
        TransactionOutput::new(instance.amount(), pay_to_pubkey_hash_script(&state.auctioneer())?),
    ];

    let mut tx = Transaction::new(TX_VERSION, inputs, outputs, lock_time, SUBNETWORK_ID_NATIVE, 0, vec![]);
    tx.finalize();
    let prevouts = PrevoutCommitment::from_transaction(&tx);
    debug!("built close {} paying {} to {}", tx.id(), instance.amount(), state.auctioneer());

    Ok(CloseTransaction {
        tx: MutableTransaction::with_entries(tx, entries),
        prevouts,
        covenant_input_index: config.covenant_input_index,
    })
}

/// Checks that `tx` validly closes the auction held by `instance`.
///
/// `tx` must be populated with the UTXO entries of its inputs.
pub fn verify_close_transaction(
    instance: &CovenantInstance,
    tx: &impl VerifiableTransaction,
    witness: &CloseWitness,
    config: &AuctionConfig,
) -> Result<(), AuctionError> {
    check_close_transaction(instance, tx, witness, config)
        .inspect_err(|err| warn!("close of {:?} rejected: {err}", instance.utxo_outpoint()))?;
    debug!("close {} accepted, winner {}", tx.tx().id(), instance.state().bidder());
    Ok(())
}

fn check_close_transaction(
    instance: &CovenantInstance,
    tx: &impl VerifiableTransaction,
    witness: &CloseWitness,
    config: &AuctionConfig,
) -> Result<(), AuctionError> {
    config.validate()?;
    let state = instance.state();
    let covenant_index = config.covenant_input_index;
    let asset_index = config.asset_input_index();

    let covenant_input = tx
        .tx()
        .inputs
        .get(covenant_index)
        .filter(|input| input.previous_outpoint == *instance.utxo_outpoint())
        .ok_or(AuctionError::InputMismatch { index: covenant_index, expected: *instance.utxo_outpoint() })?;
    if covenant_input.sequence == MAX_TX_IN_SEQUENCE_NUM {
        return Err(CloseGate::FinalSequence { input_index: covenant_index }.into());
    }
    state.deadline().check_lock_time(tx.tx().lock_time)?;

    witness.prevouts.verify(tx.tx())?;
    if witness.prevouts.outpoint_at(asset_index) != Some(state.asset()) {
        return Err(AuctionError::InputMismatch { index: asset_index, expected: state.asset() });
    }

    check_payouts(instance, tx, asset_index)?;

    verify_input_signature(tx, covenant_index, &state.auctioneer(), &witness.signature)?;
    Ok(())
}

fn check_payouts(instance: &CovenantInstance, tx: &impl VerifiableTransaction, asset_index: usize) -> Result<(), AuctionError> {
    let state = instance.state();
    let outputs = &tx.tx().outputs;
    if outputs.len() != CLOSE_OUTPUT_COUNT {
        return Err(PayoutDefect::OutputCount(outputs.len()).into());
    }

    let (_, asset_entry) = tx.populated_input(asset_index);
    let expected = [
        (pay_to_pubkey_hash_script(&state.bidder())?, asset_entry.amount),
        (pay_to_pubkey_hash_script(&state.auctioneer())?, instance.amount()),
    ];
    for (index, (output, (script, amount))) in outputs.iter().zip(expected).enumerate() {
        if output.script_public_key != script {
            return Err(PayoutDefect::Script { index }.into());
        }
        if output.value != amount {
            return Err(PayoutDefect::Amount { index, expected: amount, actual: output.value }.into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kaspa_consensus_core::tx::TransactionId;
    use kaspa_txscript::opcodes::codes::OpTrue;
    use secp256k1::{Keypair, Secp256k1, SecretKey};

    use crate::errors::{RejectionKind, SignatureDefect};
    use crate::prevouts::{OUTPOINT_TXID_SIZE, PREVOUT_ENTRY_LEN};
    use crate::script::CovenantScript;
    use crate::state::{CovenantState, Deadline, Identity};

    const DEADLINE: u64 = 20_000;

    fn keypair(seed: u8) -> Keypair {
        Keypair::from_secret_key(&Secp256k1::new(), &SecretKey::from_slice(&[seed; 32]).expect("valid secret"))
    }

    fn identity(seed: u8) -> Identity {
        keypair(seed).identity()
    }

    fn asset() -> AssetUtxo {
        let spk = pay_to_pubkey_hash_script(&identity(1)).expect("p2pkh");
        AssetUtxo { outpoint: TransactionOutpoint::new(TransactionId::from_bytes([9u8; 32]), 0), entry: UtxoEntry::new(1, spk, 0, false) }
    }

    fn instance() -> CovenantInstance {
        let contract = CovenantScript::new(vec![OpTrue]).expect("template");
        let state = CovenantState::genesis(asset().outpoint, identity(1), Deadline::new(DEADLINE)).with_bidder(identity(2));
        let entry = UtxoEntry::new(5_000, contract.locking_script(&state), 0, false);
        CovenantInstance::new(state, TransactionOutpoint::new(TransactionId::from_bytes([8u8; 32]), 0), entry)
    }

    fn fee_inputs() -> Vec<(TransactionInput, UtxoEntry)> {
        let spk = pay_to_pubkey_hash_script(&identity(1)).expect("p2pkh");
        let outpoint = TransactionOutpoint::new(TransactionId::from_bytes([7u8; 32]), 3);
        vec![(TransactionInput::new(outpoint, vec![], 0, 1), UtxoEntry::new(300, spk, 0, false))]
    }

    fn signed_close(lock_time: u64, config: &AuctionConfig) -> (CloseTransaction, CloseWitness) {
        let close = build_close_transaction(&instance(), &asset(), fee_inputs(), lock_time, config).expect("close tx");
        let witness = close.sign(&keypair(1));
        (close, witness)
    }

    fn resign(tx: &MutableTransaction<Transaction>, witness: &CloseWitness) -> CloseWitness {
        CloseWitness { signature: sign_close_input(&tx.as_verifiable(), 1, &keypair(1)), prevouts: witness.prevouts.clone() }
    }

    #[test]
    fn skeleton_has_the_required_shape() {
        let (close, witness) = signed_close(DEADLINE, &AuctionConfig::default());
        let tx = &close.tx.tx;

        assert_eq!(tx.inputs[0].previous_outpoint, asset().outpoint);
        assert_eq!(tx.inputs[1].previous_outpoint, *instance().utxo_outpoint());
        assert_eq!(tx.inputs[1].sequence, CLOSE_INPUT_SEQUENCE);
        assert_eq!(tx.lock_time, DEADLINE);
        assert_eq!(tx.outputs.len(), CLOSE_OUTPUT_COUNT);
        assert_eq!(tx.outputs[0].value, 1);
        assert_eq!(tx.outputs[0].script_public_key, pay_to_pubkey_hash_script(&identity(2)).expect("p2pkh"));
        assert_eq!(tx.outputs[1].value, 5_000);
        assert_eq!(tx.outputs[1].script_public_key, pay_to_pubkey_hash_script(&identity(1)).expect("p2pkh"));
        assert_eq!(close.prevouts, PrevoutCommitment::from_transaction(tx));
        assert_eq!(witness.prevouts.len(), 3);

        verify_close_transaction(&instance(), &close.tx.as_verifiable(), &witness, &AuctionConfig::default()).expect("close should verify");
    }

    #[test]
    fn covenant_first_ordering_is_supported() {
        let config = AuctionConfig { covenant_input_index: 0, ..Default::default() };
        let (close, witness) = signed_close(DEADLINE + 1, &config);

        assert_eq!(close.tx.tx.inputs[0].previous_outpoint, *instance().utxo_outpoint());
        assert_eq!(close.tx.tx.inputs[1].previous_outpoint, asset().outpoint);
        verify_close_transaction(&instance(), &close.tx.as_verifiable(), &witness, &config).expect("close should verify");

        // Checked under the other ordering, the covenant input is not where it should be.
        let err = verify_close_transaction(&instance(), &close.tx.as_verifiable(), &witness, &AuctionConfig::default()).unwrap_err();
        assert!(matches!(err, AuctionError::InputMismatch { index: 1, .. }));
        assert_eq!(err.kind(), RejectionKind::PrevoutMismatch);
    }

    #[test]
    fn foreign_coin_in_the_asset_slot_is_rejected() {
        let (close, _) = signed_close(DEADLINE, &AuctionConfig::default());
        let foreign = TransactionOutpoint::new(TransactionId::from_bytes([6u8; 32]), 0);

        // Commitment and signature are both honest for the substituted transaction.
        let mut substituted = close.tx.clone();
        substituted.tx.inputs[0].previous_outpoint = foreign;
        let prevouts = PrevoutCommitment::from_transaction(&substituted.tx);
        let witness = CloseWitness { signature: sign_close_input(&substituted.as_verifiable(), 1, &keypair(1)), prevouts };

        let err = verify_close_transaction(&instance(), &substituted.as_verifiable(), &witness, &AuctionConfig::default()).unwrap_err();
        assert!(matches!(err, AuctionError::InputMismatch { index: 0, expected } if expected == asset().outpoint));
        assert_eq!(err.kind(), RejectionKind::PrevoutMismatch);
    }

    #[test]
    fn builder_refuses_early_lock_time_and_foreign_asset() {
        let err = build_close_transaction(&instance(), &asset(), vec![], DEADLINE - 1, &AuctionConfig::default()).unwrap_err();
        assert_eq!(err.kind(), RejectionKind::PrematureClose);

        let foreign = AssetUtxo { outpoint: TransactionOutpoint::new(TransactionId::from_bytes([9u8; 32]), 1), ..asset() };
        let err = build_close_transaction(&instance(), &foreign, vec![], DEADLINE, &AuctionConfig::default()).unwrap_err();
        assert!(matches!(err, AuctionError::MissingInput { .. }));
    }

    #[test]
    fn lock_time_gate_is_enforced() {
        let (close, witness) = signed_close(DEADLINE, &AuctionConfig::default());

        let mut early = close.tx.clone();
        early.tx.lock_time = DEADLINE - 1;
        let witness_early = resign(&early, &witness);
        assert!(matches!(
            verify_close_transaction(&instance(), &early.as_verifiable(), &witness_early, &AuctionConfig::default()),
            Err(AuctionError::PrematureClose(CloseGate::BeforeDeadline { .. }))
        ));

        let mut final_sequence = close.tx.clone();
        final_sequence.tx.inputs[1].sequence = MAX_TX_IN_SEQUENCE_NUM;
        let witness_final = resign(&final_sequence, &witness);
        assert!(matches!(
            verify_close_transaction(&instance(), &final_sequence.as_verifiable(), &witness_final, &AuctionConfig::default()),
            Err(AuctionError::PrematureClose(CloseGate::FinalSequence { input_index: 1 }))
        ));
    }

    #[test]
    fn signature_must_come_from_the_auctioneer() {
        let (close, _) = signed_close(DEADLINE, &AuctionConfig::default());
        let forged = close.sign(&keypair(2));
        let err = verify_close_transaction(&instance(), &close.tx.as_verifiable(), &forged, &AuctionConfig::default()).unwrap_err();
        assert!(matches!(err, AuctionError::AuthorizationFailure(SignatureDefect::Verification)));

        let truncated = CloseWitness { signature: vec![0u8; 10], prevouts: close.prevouts.clone() };
        let err = verify_close_transaction(&instance(), &close.tx.as_verifiable(), &truncated, &AuctionConfig::default()).unwrap_err();
        assert_eq!(err.kind(), RejectionKind::AuthorizationFailure);
    }

    #[test]
    fn tampered_commitment_is_a_prevout_mismatch() {
        let (close, witness) = signed_close(DEADLINE, &AuctionConfig::default());

        let mut bytes = witness.prevouts.clone().into_bytes();
        bytes[PREVOUT_ENTRY_LEN + OUTPOINT_TXID_SIZE] ^= 0x01;
        let tampered = CloseWitness { prevouts: PrevoutCommitment::from(bytes), ..witness.clone() };
        let err = verify_close_transaction(&instance(), &close.tx.as_verifiable(), &tampered, &AuctionConfig::default()).unwrap_err();
        assert_eq!(err.kind(), RejectionKind::PrevoutMismatch);

        let omitted = CloseWitness {
            prevouts: PrevoutCommitment::from_outpoints(&[asset().outpoint, *instance().utxo_outpoint()]),
            ..witness
        };
        let err = verify_close_transaction(&instance(), &close.tx.as_verifiable(), &omitted, &AuctionConfig::default()).unwrap_err();
        assert_eq!(err.kind(), RejectionKind::PrevoutMismatch);
    }

    #[test]
    fn payout_shape_is_enforced() {
        let config = AuctionConfig::default();
        let (close, witness) = signed_close(DEADLINE, &config);

        let mut swapped = close.tx.clone();
        swapped.tx.outputs.swap(0, 1);
        assert!(matches!(
            verify_close_transaction(&instance(), &swapped.as_verifiable(), &resign(&swapped, &witness), &config),
            Err(AuctionError::MalformedPayout(PayoutDefect::Script { index: 0 }))
        ));

        let mut skimmed = close.tx.clone();
        skimmed.tx.outputs[1].value = 4_999;
        assert!(matches!(
            verify_close_transaction(&instance(), &skimmed.as_verifiable(), &resign(&skimmed, &witness), &config),
            Err(AuctionError::MalformedPayout(PayoutDefect::Amount { index: 1, expected: 5_000, actual: 4_999 }))
        ));

        let mut extra = close.tx.clone();
        extra.tx.outputs.push(TransactionOutput::new(10, pay_to_pubkey_hash_script(&identity(3)).expect("p2pkh")));
        assert!(matches!(
            verify_close_transaction(&instance(), &extra.as_verifiable(), &resign(&extra, &witness), &config),
            Err(AuctionError::MalformedPayout(PayoutDefect::OutputCount(3)))
        ));
    }
}

//! Bid transition.
//!
//! A bid spends the live covenant instance and creates exactly one successor at
//! output 0. The successor keeps the auction terms, names the new bidder and locks
//! exactly the bid, which must beat the previous locked amount by at least the
//! configured increment. Anyone may bid; no signature is involved.

use kaspa_consensus_core::constants::TX_VERSION;
use kaspa_consensus_core::subnets::SUBNETWORK_ID_NATIVE;
use kaspa_consensus_core::tx::{MutableTransaction, ScriptPublicKey, Transaction, TransactionInput, TransactionOutput, UtxoEntry};
use log::{debug, warn};

use crate::config::{AuctionConfig, RefundPolicy};
use crate::errors::{AuctionError, SuccessorDefect};
use crate::script::{CovenantScript, pay_to_pubkey_hash_script};
use crate::state::{CovenantInstance, CovenantState, Identity};

pub const SUCCESSOR_OUTPUT_INDEX: usize = 0;
pub const REFUND_OUTPUT_INDEX: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BidProposal {
    pub bidder: Identity,
    pub amount: u64,
}

/// The successor a bid has to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextInstance {
    pub state: CovenantState,
    pub amount: u64,
    pub redeem_script: Vec<u8>,
    pub locking_script: ScriptPublicKey,
}

impl NextInstance {
    pub fn encoded_state(&self) -> Vec<u8> {
        self.state.encode().to_vec()
    }
}

/// A bid transaction ready for the unlocking scripts, with the successor it creates.
#[derive(Debug, Clone)]
pub struct BidTransaction {
    pub tx: MutableTransaction<Transaction>,
    pub successor: CovenantInstance,
}

/// The state-transition predicate of a bid, independent of transaction shape.
pub fn validate_bid(
    current: &CovenantState,
    previous_amount: u64,
    successor: &CovenantState,
    bid_amount: u64,
    config: &AuctionConfig,
) -> Result<(), AuctionError> {
    config.validate()?;
    let insufficient =
        || AuctionError::MonotonicityViolation { previous: previous_amount, offered: bid_amount, min_increment: config.min_increment };
    let required = previous_amount.checked_add(config.min_increment).ok_or_else(insufficient)?;
    if bid_amount < required {
        return Err(insufficient());
    }
    current.ensure_same_terms(successor)
}

/// Computes the successor of `current` for a proposed bid ("build next instance").
pub fn build_next_instance(
    current: &CovenantInstance,
    proposal: &BidProposal,
    contract: &CovenantScript,
    config: &AuctionConfig,
) -> Result<NextInstance, AuctionError> {
    let state = current.state().with_bidder(proposal.bidder);
    validate_bid(current.state(), current.amount(), &state, proposal.amount, config)?;
    Ok(NextInstance {
        state,
        amount: proposal.amount,
        redeem_script: contract.redeem_script(&state),
        locking_script: contract.locking_script(&state),
    })
}

/// Checks that `tx` is a valid bid on `current` creating `successor` with `bid_amount` locked.
pub fn verify_bid_transaction(
    current: &CovenantInstance,
    successor: &CovenantState,
    bid_amount: u64,
    tx: &Transaction,
    contract: &CovenantScript,
    config: &AuctionConfig,
) -> Result<(), AuctionError> {
    check_bid_transaction(current, successor, bid_amount, tx, contract, config)
        .inspect_err(|err| warn!("bid of {bid_amount} on {:?} rejected: {err}", current.utxo_outpoint()))?;
    debug!("bid of {bid_amount} by {} accepted over {}", successor.bidder(), current.amount());
    Ok(())
}

fn check_bid_transaction(
    current: &CovenantInstance,
    successor: &CovenantState,
    bid_amount: u64,
    tx: &Transaction,
    contract: &CovenantScript,
    config: &AuctionConfig,
) -> Result<(), AuctionError> {
    if !tx.inputs.iter().any(|input| input.previous_outpoint == *current.utxo_outpoint()) {
        return Err(AuctionError::MissingInput { outpoint: *current.utxo_outpoint() });
    }

    validate_bid(current.state(), current.amount(), successor, bid_amount, config)?;

    let output = tx.outputs.get(SUCCESSOR_OUTPUT_INDEX).ok_or(SuccessorDefect::MissingOutput(SUCCESSOR_OUTPUT_INDEX))?;
    if output.script_public_key != contract.locking_script(successor) {
        return Err(SuccessorDefect::Script.into());
    }
    if output.value != bid_amount {
        return Err(SuccessorDefect::Amount { expected: bid_amount, actual: output.value }.into());
    }

    if config.refund_policy == RefundPolicy::OnChain {
        let refund = tx.outputs.get(REFUND_OUTPUT_INDEX).ok_or(SuccessorDefect::MissingOutput(REFUND_OUTPUT_INDEX))?;
        if refund.script_public_key != pay_to_pubkey_hash_script(&current.state().bidder())? {
            return Err(SuccessorDefect::RefundScript.into());
        }
        if refund.value != current.amount() {
            return Err(SuccessorDefect::RefundAmount { expected: current.amount(), actual: refund.value }.into());
        }
    }
    Ok(())
}

fn funding_total(funding: &[(TransactionInput, UtxoEntry)]) -> Result<u64, AuctionError> {
    funding.iter().try_fold(0u64, |total, (_, entry)| total.checked_add(entry.amount).ok_or(AuctionError::FundingOverflow))
}

/// Assembles a bid: `[covenant, funding...] -> [successor, refund, change?]`.
///
/// The refund returns the previous locked amount to the previous bidder. Funding
/// inputs pay for the new bid and `fee`; whatever is left goes to `change_script`.
/// Unlocking scripts are left empty for the caller to fill.
pub fn build_bid_transaction(
    current: &CovenantInstance,
    next: &NextInstance,
    funding: Vec<(TransactionInput, UtxoEntry)>,
    change_script: &ScriptPublicKey,
    fee: u64,
) -> Result<BidTransaction, AuctionError> {
    let available = funding_total(&funding)?;
    let required = next.amount.checked_add(fee).ok_or(AuctionError::InsufficientFunds { available, required: u64::MAX })?;
    let change = available.checked_sub(required).ok_or(AuctionError::InsufficientFunds { available, required })?;

    let covenant_input = TransactionInput::new(*current.utxo_outpoint(), vec![], 0, 0);
    let (funding_inputs, funding_entries): (Vec<_>, Vec<_>) = funding.into_iter().unzip();

    let mut outputs = vec![
        TransactionOutput::new(next.amount, next.locking_script.clone()),
        TransactionOutput::new(current.amount(), pay_to_pubkey_hash_script(&current.state().bidder())?),
    ];
    if change > 0 {
        outputs.push(TransactionOutput::new(change, change_script.clone()));
    }

    let inputs = std::iter::once(covenant_input).chain(funding_inputs).collect();
    let entries = std::iter::once(current.utxo_entry().clone()).chain(funding_entries).collect();

    let mut tx = Transaction::new(TX_VERSION, inputs, outputs, 0, SUBNETWORK_ID_NATIVE, 0, vec![]);
    tx.finalize();
    let successor = CovenantInstance::from_transaction(next.state, &tx, SUCCESSOR_OUTPUT_INDEX as u32)?;
    debug!("built bid {} locking {} for {}", tx.id(), next.amount, next.state.bidder());

    Ok(BidTransaction { tx: MutableTransaction::with_entries(tx, entries), successor })
}

/// Deploys the genesis instance: `[funding...] -> [covenant(amount), change?]`.
pub fn build_genesis_transaction(
    state: &CovenantState,
    contract: &CovenantScript,
    amount: u64,
    funding: Vec<(TransactionInput, UtxoEntry)>,
    change_script: &ScriptPublicKey,
    fee: u64,
) -> Result<BidTransaction, AuctionError> {
    let available = funding_total(&funding)?;
    let required = amount.checked_add(fee).ok_or(AuctionError::InsufficientFunds { available, required: u64::MAX })?;
    let change = available.checked_sub(required).ok_or(AuctionError::InsufficientFunds { available, required })?;

    let (inputs, entries): (Vec<_>, Vec<_>) = funding.into_iter().unzip();
    let mut outputs = vec![TransactionOutput::new(amount, contract.locking_script(state))];
    if change > 0 {
        outputs.push(TransactionOutput::new(change, change_script.clone()));
    }

    let mut tx = Transaction::new(TX_VERSION, inputs, outputs, 0, SUBNETWORK_ID_NATIVE, 0, vec![]);
    tx.finalize();
    let successor = CovenantInstance::from_transaction(*state, &tx, SUCCESSOR_OUTPUT_INDEX as u32)?;
    debug!("built genesis {} for asset {}:{}", tx.id(), state.asset().transaction_id, state.asset().index);

    Ok(BidTransaction { tx: MutableTransaction::with_entries(tx, entries), successor })
}

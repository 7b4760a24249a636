use kaspa_consensus_core::tx::{Transaction, TransactionId, VerifiableTransaction};
use log::{debug, info};

use crate::bid::{BidProposal, NextInstance, SUCCESSOR_OUTPUT_INDEX, build_next_instance, verify_bid_transaction};
use crate::close::{CloseWitness, verify_close_transaction};
use crate::config::AuctionConfig;
use crate::errors::{AuctionError, SuccessorDefect};
use crate::script::CovenantScript;
use crate::state::{CovenantInstance, CovenantState};

/// Append-only history of one auction.
///
/// Every accepted bid appends the instance it creates; the last entry is the live
/// one until a close is accepted. Nothing is ever removed or rewritten.
#[derive(Debug, Clone)]
pub struct AuctionChain {
    contract: CovenantScript,
    config: AuctionConfig,
    history: Vec<CovenantInstance>,
    closed_by: Option<TransactionId>,
}

impl AuctionChain {
    /// Starts tracking an auction from its funded genesis instance.
    pub fn genesis(genesis: CovenantInstance, contract: CovenantScript, config: AuctionConfig) -> Result<Self, AuctionError> {
        config.validate()?;
        if genesis.utxo_entry().script_public_key != contract.locking_script(genesis.state()) {
            return Err(SuccessorDefect::Script.into());
        }
        debug!("auction for {:?} opened at {}", genesis.state().asset(), genesis.amount());
        Ok(Self { contract, config, history: vec![genesis], closed_by: None })
    }

    pub fn contract(&self) -> &CovenantScript {
        &self.contract
    }

    pub fn config(&self) -> &AuctionConfig {
        &self.config
    }

    /// The unspent instance, or `None` once the auction is closed.
    pub fn live(&self) -> Option<&CovenantInstance> {
        if self.closed_by.is_some() { None } else { self.history.last() }
    }

    pub fn history(&self) -> &[CovenantInstance] {
        &self.history
    }

    pub fn is_closed(&self) -> bool {
        self.closed_by.is_some()
    }

    pub fn closed_by(&self) -> Option<TransactionId> {
        self.closed_by
    }

    fn live_or_closed(&self) -> Result<&CovenantInstance, AuctionError> {
        self.live().ok_or(AuctionError::AuctionClosed)
    }

    /// Computes the successor a bid on the live instance has to create.
    pub fn propose(&self, proposal: &BidProposal) -> Result<NextInstance, AuctionError> {
        build_next_instance(self.live_or_closed()?, proposal, &self.contract, &self.config)
    }

    /// Accepts a bid transaction and appends the instance it creates.
    pub fn apply_bid(&mut self, tx: &Transaction, successor: &CovenantState, bid_amount: u64) -> Result<&CovenantInstance, AuctionError> {
        let live = self.live_or_closed()?;
        verify_bid_transaction(live, successor, bid_amount, tx, &self.contract, &self.config)?;
        let next = CovenantInstance::from_transaction(*successor, tx, SUCCESSOR_OUTPUT_INDEX as u32)?;
        self.history.push(next);
        Ok(&self.history[self.history.len() - 1])
    }

    /// Accepts the close transaction, after which the chain takes no further transitions.
    pub fn apply_close(&mut self, tx: &impl VerifiableTransaction, witness: &CloseWitness) -> Result<(), AuctionError> {
        let live = self.live_or_closed()?;
        verify_close_transaction(live, tx, witness, &self.config)?;
        info!("auction for {:?} closed by {}, winner {} at {}", live.state().asset(), tx.tx().id(), live.state().bidder(), live.amount());
        self.closed_by = Some(tx.tx().id());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kaspa_consensus_core::tx::{TransactionInput, TransactionOutpoint, UtxoEntry};
    use kaspa_txscript::opcodes::codes::{OpDrop, OpTrue};
    use secp256k1::{Keypair, Secp256k1, SecretKey};

    use crate::bid::build_bid_transaction;
    use crate::close::{AssetUtxo, build_close_transaction};
    use crate::errors::RejectionKind;
    use crate::script::pay_to_pubkey_hash_script;
    use crate::signer::SighashSigner;
    use crate::state::{Deadline, Identity};

    const DEADLINE: u64 = 30_000;

    fn keypair(seed: u8) -> Keypair {
        Keypair::from_secret_key(&Secp256k1::new(), &SecretKey::from_slice(&[seed; 32]).expect("valid secret"))
    }

    fn identity(seed: u8) -> Identity {
        keypair(seed).identity()
    }

    fn contract() -> CovenantScript {
        CovenantScript::new(vec![OpDrop, OpTrue]).expect("template")
    }

    fn asset() -> AssetUtxo {
        let spk = pay_to_pubkey_hash_script(&identity(1)).expect("p2pkh");
        AssetUtxo { outpoint: TransactionOutpoint::new(TransactionId::from_bytes([0xaa; 32]), 0), entry: UtxoEntry::new(1, spk, 0, false) }
    }

    fn new_chain() -> AuctionChain {
        let state = CovenantState::genesis(asset().outpoint, identity(1), Deadline::new(DEADLINE));
        let entry = UtxoEntry::new(1, contract().locking_script(&state), 0, false);
        let genesis = CovenantInstance::new(state, TransactionOutpoint::new(TransactionId::from_bytes([0xbb; 32]), 0), entry);
        AuctionChain::genesis(genesis, contract(), AuctionConfig::default()).expect("genesis")
    }

    fn funding(seed: u8, amount: u64) -> Vec<(TransactionInput, UtxoEntry)> {
        let outpoint = TransactionOutpoint::new(TransactionId::from_bytes([seed; 32]), 0);
        let spk = pay_to_pubkey_hash_script(&identity(seed)).expect("p2pkh");
        vec![(TransactionInput::new(outpoint, vec![], 0, 1), UtxoEntry::new(amount, spk, 0, false))]
    }

    fn bid(chain: &mut AuctionChain, seed: u8, amount: u64) -> Result<(), AuctionError> {
        let next = chain.propose(&BidProposal { bidder: identity(seed), amount })?;
        let change = pay_to_pubkey_hash_script(&identity(seed))?;
        let built = build_bid_transaction(chain.live().expect("live"), &next, funding(seed, amount + 100), &change, 10)?;
        chain.apply_bid(&built.tx.tx, &next.state, amount).map(|_| ())
    }

    #[test]
    fn genesis_must_carry_the_contract_lock() {
        let state = CovenantState::genesis(asset().outpoint, identity(1), Deadline::new(DEADLINE));
        let wrong = UtxoEntry::new(1, pay_to_pubkey_hash_script(&identity(1)).expect("p2pkh"), 0, false);
        let genesis = CovenantInstance::new(state, TransactionOutpoint::new(TransactionId::from_bytes([0xbb; 32]), 0), wrong);
        let err = AuctionChain::genesis(genesis, contract(), AuctionConfig::default()).unwrap_err();
        assert_eq!(err.kind(), RejectionKind::MalformedSuccessor);
    }

    #[test]
    fn bids_append_and_keep_terms() {
        let mut chain = new_chain();
        bid(&mut chain, 2, 101).expect("first bid");
        bid(&mut chain, 3, 250).expect("second bid");

        assert_eq!(chain.history().len(), 3);
        let live = chain.live().expect("live");
        assert_eq!(live.amount(), 250);
        assert_eq!(live.state().bidder(), identity(3));
        for instance in chain.history() {
            assert!(chain.history()[0].state().ensure_same_terms(instance.state()).is_ok());
        }

        let err = bid(&mut chain, 4, 250).unwrap_err();
        assert_eq!(err.kind(), RejectionKind::MonotonicityViolation);
        assert_eq!(chain.history().len(), 3);
    }

    #[test]
    fn stale_bid_on_spent_instance_is_rejected() {
        let mut chain = new_chain();
        let genesis = chain.live().expect("live").clone();
        let next = chain.propose(&BidProposal { bidder: identity(2), amount: 101 }).expect("proposal");
        let change = pay_to_pubkey_hash_script(&identity(2)).expect("p2pkh");
        let stale = build_bid_transaction(&genesis, &next, funding(2, 500), &change, 10).expect("bid tx");

        bid(&mut chain, 3, 150).expect("competing bid wins");
        let err = chain.apply_bid(&stale.tx.tx, &next.state, 101).unwrap_err();
        assert!(matches!(err, AuctionError::MissingInput { outpoint } if outpoint == *genesis.utxo_outpoint()));
    }

    #[test]
    fn close_terminates_the_chain() {
        let mut chain = new_chain();
        bid(&mut chain, 2, 101).expect("bid");

        let close = build_close_transaction(chain.live().expect("live"), &asset(), vec![], DEADLINE, chain.config()).expect("close");
        let witness = close.sign(&keypair(1));
        chain.apply_close(&close.tx.as_verifiable(), &witness).expect("close accepted");

        assert!(chain.is_closed());
        assert!(chain.live().is_none());
        assert_eq!(chain.closed_by(), Some(close.tx.tx.id()));
        assert!(matches!(chain.propose(&BidProposal { bidder: identity(5), amount: 1_000 }), Err(AuctionError::AuctionClosed)));
        assert!(matches!(chain.apply_close(&close.tx.as_verifiable(), &witness), Err(AuctionError::AuctionClosed)));
        assert_eq!(chain.history().len(), 2);
    }
}

use kaspa_consensus_core::tx::{ScriptPublicKey, TransactionId, TransactionInput, TransactionOutpoint, UtxoEntry};
use kaspa_txscript::opcodes::codes::{OpDrop, OpTrue};
use ordinal_auction::{
    AssetUtxo, AuctionChain, AuctionConfig, AuctionError, BidProposal, CovenantScript, CovenantState, Deadline, Identity,
    SighashSigner, build_bid_transaction, build_close_transaction, build_genesis_transaction, pay_to_pubkey_hash_script,
};
use secp256k1::{Keypair, Secp256k1, SecretKey};

const DEADLINE: u64 = 1_700_000_000_000;

fn keypair(seed: u8) -> Keypair {
    let secret = SecretKey::from_slice(&[seed; 32]).expect("seed is a valid secret key");
    Keypair::from_secret_key(&Secp256k1::new(), &secret)
}

fn p2pkh(identity: &Identity) -> Result<ScriptPublicKey, AuctionError> {
    Ok(pay_to_pubkey_hash_script(identity)?)
}

fn wallet_utxo(owner: &Identity, tag: u8, amount: u64) -> Result<(TransactionInput, UtxoEntry), AuctionError> {
    let outpoint = TransactionOutpoint::new(TransactionId::from_bytes([tag; 32]), 0);
    Ok((TransactionInput::new(outpoint, vec![], 0, 1), UtxoEntry::new(amount, p2pkh(owner)?, 0, false)))
}

fn main() -> Result<(), AuctionError> {
    let auctioneer = keypair(1);
    let bidders = [keypair(2), keypair(3), keypair(4)];
    let config = AuctionConfig::default();
    // Stand-in for the compiled auction logic; it only has to consume the pushed state.
    let contract = CovenantScript::new(vec![OpDrop, OpTrue])?;

    let asset = AssetUtxo {
        outpoint: TransactionOutpoint::new(TransactionId::from_bytes([0xa5; 32]), 0),
        entry: UtxoEntry::new(1, p2pkh(&auctioneer.identity())?, 0, false),
    };
    let state = CovenantState::genesis(asset.outpoint, auctioneer.identity(), Deadline::new(DEADLINE));
    println!("genesis state: {}", hex::encode(state.encode()));

    let funding = vec![wallet_utxo(&auctioneer.identity(), 0x10, 1_000)?];
    let genesis = build_genesis_transaction(&state, &contract, 1, funding, &p2pkh(&auctioneer.identity())?, 10)?;
    let mut chain = AuctionChain::genesis(genesis.successor, contract, config)?;

    for (tag, (bidder, amount)) in (0x20u8..).zip(bidders.iter().zip([101u64, 250, 1_000])) {
        let next = chain.propose(&BidProposal { bidder: bidder.identity(), amount })?;
        let live = chain.live().ok_or(AuctionError::AuctionClosed)?;
        let funding = vec![wallet_utxo(&bidder.identity(), tag, amount + 100)?];
        let bid = build_bid_transaction(live, &next, funding, &p2pkh(&bidder.identity())?, 20)?;
        chain.apply_bid(&bid.tx.tx, &next.state, amount)?;
        println!("bid {amount} by {} in {}", bidder.identity(), bid.tx.tx.id());
    }

    let live = chain.live().ok_or(AuctionError::AuctionClosed)?.clone();
    let close = build_close_transaction(&live, &asset, vec![wallet_utxo(&auctioneer.identity(), 0x30, 50)?], DEADLINE, chain.config())?;
    let witness = close.sign(&auctioneer);
    println!("prevout commitment: {}", witness.prevouts);
    chain.apply_close(&close.tx.as_verifiable(), &witness)?;

    println!("closed by {}: asset to {}, {} to the auctioneer", close.tx.tx.id(), live.state().bidder(), live.amount());
    Ok(())
}

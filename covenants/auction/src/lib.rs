//! Ascending-bid auction covenant for a single non-fungible asset.
//!
//! The auction lives as a chain of covenant instances. Every bid spends the live
//! instance and creates exactly one successor that carries the new highest bidder
//! and locks the new highest bid. After the deadline the auctioneer closes the
//! chain in one transaction that spends the asset and the live instance together,
//! paying the asset to the winner and the proceeds to the auctioneer.
//!
//! The crate provides the validation predicates the covenant enforces, together
//! with builders that assemble transactions satisfying them:
//!
//! - [`state`]: the covenant record and its fixed byte encoding.
//! - [`prevouts`]: the input-set commitment checked by the close transition.
//! - [`bid`]: bid predicate, successor construction and bid transactions.
//! - [`close`]: close predicate and closing transaction skeletons.
//! - [`chain`]: the append-only history of instances with exactly one live record.

pub mod bid;
pub mod chain;
pub mod close;
pub mod config;
pub mod errors;
pub mod prevouts;
pub mod script;
pub mod signer;
pub mod state;

pub use bid::{
    BidProposal, BidTransaction, NextInstance, build_bid_transaction, build_genesis_transaction, build_next_instance, validate_bid,
    verify_bid_transaction,
};
pub use chain::AuctionChain;
pub use close::{AssetUtxo, CloseTransaction, CloseWitness, build_close_transaction, sign_close_input, verify_close_transaction};
pub use config::{AuctionConfig, RefundPolicy};
pub use errors::{AuctionError, CloseGate, PayoutDefect, RejectionKind, SignatureDefect, SuccessorDefect};
pub use prevouts::PrevoutCommitment;
pub use script::{CovenantScript, pay_to_pubkey_hash_script, pubkey_hash};
pub use signer::SighashSigner;
pub use state::{CovenantInstance, CovenantState, Deadline, Identity, LockTimeKind};

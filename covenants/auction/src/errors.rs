use kaspa_consensus_core::tx::TransactionOutpoint;
use kaspa_txscript::script_builder::ScriptBuilderError;
use thiserror::Error;

/// Coarse class of a rejected transition or construction request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    MonotonicityViolation,
    StateCorruption,
    PrematureClose,
    AuthorizationFailure,
    PrevoutMismatch,
    MalformedPayout,
    MalformedSuccessor,
    Construction,
}

/// Why the lock-time gate of a close transaction is not satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CloseGate {
    #[error("lock time {lock_time} is before the deadline {deadline}")]
    BeforeDeadline { lock_time: u64, deadline: u64 },
    #[error("lock time {lock_time} and deadline {deadline} are measured in different units")]
    KindMismatch { lock_time: u64, deadline: u64 },
    #[error("input {input_index} has a final sequence number, so lock time is not enforced")]
    FinalSequence { input_index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureDefect {
    #[error("expected a 65-byte signature, got {0} bytes")]
    Length(usize),
    #[error("unsupported sighash type {0:#04x}")]
    SigHashType(u8),
    #[error("not a valid schnorr signature encoding")]
    Encoding,
    #[error("signature does not verify against the auctioneer key")]
    Verification,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayoutDefect {
    #[error("expected exactly 2 outputs, got {0}")]
    OutputCount(usize),
    #[error("output {index} does not pay the expected public key hash")]
    Script { index: usize },
    #[error("output {index} pays {actual}, expected {expected}")]
    Amount { index: usize, expected: u64, actual: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SuccessorDefect {
    #[error("transaction has no output {0}")]
    MissingOutput(usize),
    #[error("output 0 is not locked to the successor covenant")]
    Script,
    #[error("successor locks {actual}, the bid is {expected}")]
    Amount { expected: u64, actual: u64 },
    #[error("refund output does not pay the previous bidder")]
    RefundScript,
    #[error("refund output pays {actual}, expected {expected}")]
    RefundAmount { expected: u64, actual: u64 },
}

#[derive(Debug, Error)]
pub enum AuctionError {
    #[error("insufficient bid: {offered} does not exceed {previous} by at least {min_increment}")]
    MonotonicityViolation { previous: u64, offered: u64, min_increment: u64 },
    #[error("state corruption: immutable field '{field}' changed across the transition")]
    StateCorruption { field: &'static str },
    #[error("premature close: {0}")]
    PrematureClose(CloseGate),
    #[error("bad signature: {0}")]
    AuthorizationFailure(SignatureDefect),
    #[error("prevout mismatch: supplied {supplied}, transaction spends {actual}")]
    PrevoutMismatch { supplied: String, actual: String },
    #[error("input {index} does not spend {}:{}", .expected.transaction_id, .expected.index)]
    InputMismatch { index: usize, expected: TransactionOutpoint },
    #[error("malformed payout: {0}")]
    MalformedPayout(PayoutDefect),
    #[error("malformed successor: {0}")]
    MalformedSuccessor(SuccessorDefect),
    #[error("transaction does not spend {}:{} at the expected input", .outpoint.transaction_id, .outpoint.index)]
    MissingInput { outpoint: TransactionOutpoint },
    #[error("covenant state must be {expected} bytes, got {actual}")]
    InvalidStateLength { expected: usize, actual: usize },
    #[error("invalid x-only public key: {0}")]
    InvalidPublicKey(String),
    #[error("insufficient funds: {available} available, {required} required")]
    InsufficientFunds { available: u64, required: u64 },
    #[error("funding inputs add up to more than {}", u64::MAX)]
    FundingOverflow,
    #[error("commitment has no entry {index}, it holds {entries}")]
    MissingCommitmentEntry { index: usize, entries: usize },
    #[error("the auction is already closed")]
    AuctionClosed,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
    #[error("script build error: {0}")]
    ScriptBuilder(#[from] ScriptBuilderError),
}

impl AuctionError {
    pub fn kind(&self) -> RejectionKind {
        match self {
            Self::MonotonicityViolation { .. } => RejectionKind::MonotonicityViolation,
            Self::StateCorruption { .. } => RejectionKind::StateCorruption,
            Self::PrematureClose(_) => RejectionKind::PrematureClose,
            Self::AuthorizationFailure(_) => RejectionKind::AuthorizationFailure,
            Self::PrevoutMismatch { .. } | Self::InputMismatch { .. } => RejectionKind::PrevoutMismatch,
            Self::MalformedPayout(_) => RejectionKind::MalformedPayout,
            Self::MalformedSuccessor(_) => RejectionKind::MalformedSuccessor,
            Self::MissingInput { .. }
            | Self::InvalidStateLength { .. }
            | Self::InvalidPublicKey(_)
            | Self::InsufficientFunds { .. }
            | Self::FundingOverflow
            | Self::MissingCommitmentEntry { .. }
            | Self::AuctionClosed
            | Self::InvalidConfig(_)
            | Self::ScriptBuilder(_) => RejectionKind::Construction,
        }
    }
}

impl From<CloseGate> for AuctionError {
    fn from(gate: CloseGate) -> Self {
        Self::PrematureClose(gate)
    }
}

impl From<SignatureDefect> for AuctionError {
    fn from(defect: SignatureDefect) -> Self {
        Self::AuthorizationFailure(defect)
    }
}

impl From<PayoutDefect> for AuctionError {
    fn from(defect: PayoutDefect) -> Self {
        Self::MalformedPayout(defect)
    }
}

impl From<SuccessorDefect> for AuctionError {
    fn from(defect: SuccessorDefect) -> Self {
        Self::MalformedSuccessor(defect)
    }
}

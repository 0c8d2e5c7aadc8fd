//! Error taxonomy shared by the sieve, ledger store, Merkle builder and proof codec.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors surfaced by ledger operations.
///
/// Verification mismatches are not errors; they are reported as
/// [`Verification`](crate::Verification) values.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid sieve window (start {start}, size {size})")]
    /// The requested sieve window is empty, starts at zero, or overflows.
    InvalidRange {
        /// First number of the requested window.
        start: u64,
        /// Requested window width.
        size: u64,
    },
    #[error("corrupt ledger at token {position}: {token:?}")]
    /// The persisted ledger contains a token that is not a valid entry.
    CorruptLedger {
        /// Zero-based index of the offending token.
        position: usize,
        /// Raw token text as stored on disk.
        token: String,
    },
    #[error("cannot build a merkle tree over an empty sequence")]
    /// A Merkle tree was requested over zero items.
    EmptyInput,
    #[error("prefix length {requested} out of range (ledger holds {available})")]
    /// A snapshot was requested beyond the ledger length, or of length zero.
    OutOfRange {
        /// Prefix length asked for.
        requested: u64,
        /// Entries currently held.
        available: u64,
    },
    #[error("batch is not strictly increasing past the ledger tip ({tip:?} then {next})")]
    /// An appended batch would break the strictly increasing ledger order.
    NonMonotonic {
        /// Last entry before the offending value, if any.
        tip: Option<u64>,
        /// First value that failed the ordering check.
        next: u64,
    },
    #[error("ledger is empty")]
    /// A proof was requested while the ledger holds no primes.
    EmptyLedger,
    #[error("malformed proof: {0}")]
    /// A proof string could not be decoded or had the wrong shape.
    Malformed(String),
    #[error("tail proof did not stabilise after {attempts} attempts")]
    /// Tail proof generation kept failing its own self-check.
    TailUnstable {
        /// Number of generate-then-verify rounds attempted.
        attempts: usize,
    },
    #[error("scheduler error: {0}")]
    /// The mining scheduler could not perform the requested transition.
    Scheduler(String),
    #[error("io error: {0}")]
    /// Underlying filesystem failure.
    Io(#[from] std::io::Error),
}

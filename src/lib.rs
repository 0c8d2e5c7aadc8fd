#![deny(missing_docs)]

//! # prime_ledger
//!
//! **prime_ledger** grows an append-only ledger of primes with a segmented
//! sieve and lets third parties check that the prefix they hold agrees with
//! the authoritative one through a compact, Merkle-rooted proof string.
//!
//! ## Features
//!
//! * **Segmented sieve**: [`compute_window`] returns every prime in a
//!   half-open window.  Adjacent windows compose exactly, which is what keeps
//!   the ledger exhaustive as it grows.
//! * **Durable ledger**: [`LedgerStore`] persists comma-separated decimal text
//!   and only publishes an append after it has reached disk.
//! * **Merkle trees**: [`MerkleTree`] hashes each entry's decimal text with
//!   SHA-256 and combines hex digests pairwise, pairing a dangling node with
//!   itself.
//! * **Background mining**: [`MiningScheduler`] sweeps window after window on
//!   one worker thread, with RAII pausing and joining shutdown.
//! * **Chain proofs**: [`ChainProof`] encodes `last:count:root` as base64 and
//!   verifies it by re-hashing the local prefix; [`TailProof`] commits to the
//!   last fifty entries only.
//!
//! ## Usage
//!
//! ```rust
//! use prime_ledger::{ChainProof, LedgerStore, Verification, compute_window};
//!
//! let dir = std::env::temp_dir().join(format!("prime_ledger_doc_{}", std::process::id()));
//! # std::fs::remove_dir_all(&dir).ok();
//! let store = LedgerStore::open(dir.join("primes.csv")).unwrap();
//! store.append(&compute_window(1, 30).unwrap()).unwrap();
//!
//! let shared = ChainProof::generate(&store).unwrap().encode();
//! let claim = ChainProof::parse(&shared).unwrap();
//! assert_eq!(claim.last_prime, 29);
//! assert_eq!(claim.verify(&store), Verification::Valid);
//! # std::fs::remove_dir_all(&dir).ok();
//! ```
//!
//! Verification re-hashes the whole claimed prefix; no inclusion path is
//! transmitted.  That keeps proofs tiny at the cost of `O(n)` work per check.

pub mod config;
mod error;
mod hash;
mod merkle;
mod proof;
mod scheduler;
mod service;
mod sieve;
mod store;
pub mod telemetry;
#[cfg(test)]
mod testutil;

pub use config::{LedgerConfig, MinerConfig};
pub use error::{LedgerError, Result};
pub use hash::{digest_decimal, digest_text, hash_pair};
pub use merkle::{merkle_root, MerkleTree};
pub use proof::{ChainProof, TailProof, Verification, MAX_TAIL_ATTEMPTS, TAIL_WINDOW};
pub use scheduler::{MinerStats, MiningScheduler, PauseGuard, SchedulerState};
pub use service::{PrimeLedger, ProofVerdict};
pub use sieve::{compute_window, primes_up_to, SieveWindow};
pub use store::{encode_ledger, load_ledger, parse_ledger, LedgerSnapshot, LedgerStatus, LedgerStore};

//! Shareable chain proofs.
//!
//! A [`ChainProof`] commits to a whole ledger prefix as
//! `base64("<last_prime>:<count>:<merkle_root_hex>")`.  A verifier holding a
//! ledger at least `count` entries long recomputes the Merkle root over its own
//! first `count` entries and compares; no sibling path is transmitted, so the
//! verifier re-hashes the entire prefix.
//!
//! [`TailProof`] is the compact variant `base64("<count>:<merkle_root_hex>")`
//! that only commits to the last [`TAIL_WINDOW`] entries of the prefix.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::merkle::merkle_root;
use crate::scheduler::MiningScheduler;
use crate::store::{LedgerSnapshot, LedgerStore};

/// Entries covered by a [`TailProof`].
pub const TAIL_WINDOW: u64 = 50;
/// Generate-then-verify rounds attempted by [`TailProof::generate`].
pub const MAX_TAIL_ATTEMPTS: usize = 5;

/// Outcome of checking a well-formed proof against a local ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verification {
    /// The claim matches the local prefix.
    Valid,
    /// The claim covers zero entries.
    EmptyClaim,
    /// The claim is longer than the local ledger.
    CountExceedsLedger {
        /// Entries claimed by the proof.
        claimed: u64,
        /// Entries held locally.
        held: u64,
    },
    /// The prefix ends in a different prime.
    TipMismatch {
        /// Tip carried by the proof.
        claimed: u64,
        /// Tip of the local prefix.
        held: u64,
    },
    /// The recomputed root differs from the claimed one.
    RootMismatch {
        /// Root carried by the proof.
        claimed: String,
        /// Root recomputed locally.
        computed: String,
    },
}

impl Verification {
    /// Returns `true` for [`Verification::Valid`].
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => write!(f, "chain is valid"),
            Self::EmptyClaim => write!(f, "proof claims an empty chain"),
            Self::CountExceedsLedger { claimed, held } => write!(
                f,
                "provided chain length {claimed} is longer than our chain ({held})"
            ),
            Self::TipMismatch { claimed, held } => {
                write!(f, "most recent prime mismatch: claimed {claimed}, held {held}")
            }
            Self::RootMismatch { claimed, computed } => {
                write!(f, "merkle root mismatch: claimed {claimed}, computed {computed}")
            }
        }
    }
}

/// Whole-prefix proof: tip, length and Merkle root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainProof {
    /// Last prime of the committed prefix.
    pub last_prime: u64,
    /// Length of the committed prefix.
    pub count: u64,
    /// Hex Merkle root over the prefix.
    pub merkle_root: String,
}

impl ChainProof {
    /// Builds a proof over the store's current contents.
    ///
    /// Count, tip and root all come from one snapshot, so a concurrent append
    /// can make the proof stale but never inconsistent.
    pub fn generate(store: &LedgerStore) -> Result<Self> {
        Self::from_snapshot(&store.latest())
    }

    /// Builds a proof over an explicit snapshot.
    pub fn from_snapshot(snapshot: &LedgerSnapshot) -> Result<Self> {
        let last_prime = snapshot.last().ok_or(LedgerError::EmptyLedger)?;
        Ok(Self {
            last_prime,
            count: snapshot.count(),
            merkle_root: merkle_root(snapshot.primes())?,
        })
    }

    /// Base64 form of `"<last>:<count>:<root>"`.
    pub fn encode(&self) -> String {
        BASE64.encode(format!(
            "{}:{}:{}",
            self.last_prime, self.count, self.merkle_root
        ))
    }

    /// Decodes a string produced by [`ChainProof::encode`].
    pub fn parse(encoded: &str) -> Result<Self> {
        let text = decode_text(encoded)?;
        let fields: Vec<&str> = text.split(':').collect();
        match fields.as_slice() {
            [last, count, root] => Ok(Self {
                last_prime: parse_field(last, "last prime")?,
                count: parse_field(count, "count")?,
                merkle_root: root.to_string(),
            }),
            other => Err(LedgerError::Malformed(format!(
                "expected 3 fields, found {}",
                other.len()
            ))),
        }
    }

    /// Checks the claim against the store's prefix of the same length.
    pub fn verify(&self, store: &LedgerStore) -> Verification {
        let held = store.count();
        if self.count > held {
            return Verification::CountExceedsLedger {
                claimed: self.count,
                held,
            };
        }
        if self.count == 0 {
            return Verification::EmptyClaim;
        }
        // The ledger only grows, so a prefix that fit a moment ago still fits.
        match store.snapshot(self.count) {
            Ok(prefix) => self.verify_prefix(prefix.primes()),
            Err(_) => Verification::CountExceedsLedger {
                claimed: self.count,
                held,
            },
        }
    }

    /// Checks the claim against an in-memory ledger.
    pub fn verify_against(&self, primes: &[u64]) -> Verification {
        let held = primes.len() as u64;
        if self.count > held {
            return Verification::CountExceedsLedger {
                claimed: self.count,
                held,
            };
        }
        if self.count == 0 {
            return Verification::EmptyClaim;
        }
        self.verify_prefix(&primes[..self.count as usize])
    }

    fn verify_prefix(&self, prefix: &[u64]) -> Verification {
        let tip = prefix[prefix.len() - 1];
        if tip != self.last_prime {
            return Verification::TipMismatch {
                claimed: self.last_prime,
                held: tip,
            };
        }
        compare_roots(&self.merkle_root, prefix)
    }
}

impl fmt::Display for ChainProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for ChainProof {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Compact proof over the last [`TAIL_WINDOW`] entries of a prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TailProof {
    /// Length of the prefix whose tail is committed.
    pub count: u64,
    /// Hex Merkle root over the tail.
    pub merkle_root: String,
}

impl TailProof {
    /// Pauses `scheduler`, builds the tail proof, resumes, then self-verifies.
    /// Retries up to [`MAX_TAIL_ATTEMPTS`] times when the self-check fails.
    pub fn generate(store: &LedgerStore, scheduler: &MiningScheduler) -> Result<Self> {
        for attempt in 1..=MAX_TAIL_ATTEMPTS {
            let candidate =
                scheduler.with_paused(|| store.with_primes(Self::from_primes))?;
            let verdict = candidate.verify(store);
            if verdict.is_valid() {
                return Ok(candidate);
            }
            tracing::warn!(attempt, %verdict, "tail proof self-check failed, retrying");
        }
        Err(LedgerError::TailUnstable {
            attempts: MAX_TAIL_ATTEMPTS,
        })
    }

    /// Builds the tail proof over a full ledger.
    pub fn from_primes(primes: &[u64]) -> Result<Self> {
        if primes.is_empty() {
            return Err(LedgerError::EmptyLedger);
        }
        let count = primes.len() as u64;
        Ok(Self {
            count,
            merkle_root: merkle_root(tail_of(primes, count))?,
        })
    }

    /// Base64 form of `"<count>:<root>"`.
    pub fn encode(&self) -> String {
        BASE64.encode(format!("{}:{}", self.count, self.merkle_root))
    }

    /// Decodes a string produced by [`TailProof::encode`].
    pub fn parse(encoded: &str) -> Result<Self> {
        let text = decode_text(encoded)?;
        let fields: Vec<&str> = text.split(':').collect();
        match fields.as_slice() {
            [count, root] => Ok(Self {
                count: parse_field(count, "count")?,
                merkle_root: root.to_string(),
            }),
            other => Err(LedgerError::Malformed(format!(
                "expected 2 fields, found {}",
                other.len()
            ))),
        }
    }

    /// Checks the claim against the tail of the store's matching prefix.
    pub fn verify(&self, store: &LedgerStore) -> Verification {
        store.with_primes(|primes| self.verify_against(primes))
    }

    /// Checks the claim against an in-memory ledger.
    pub fn verify_against(&self, primes: &[u64]) -> Verification {
        let held = primes.len() as u64;
        if self.count > held {
            return Verification::CountExceedsLedger {
                claimed: self.count,
                held,
            };
        }
        if self.count == 0 {
            return Verification::EmptyClaim;
        }
        compare_roots(&self.merkle_root, tail_of(primes, self.count))
    }
}

impl fmt::Display for TailProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for TailProof {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn tail_of(primes: &[u64], count: u64) -> &[u64] {
    let end = count as usize;
    &primes[end.saturating_sub(TAIL_WINDOW as usize)..end]
}

fn compare_roots(claimed: &str, items: &[u64]) -> Verification {
    match merkle_root(items) {
        Ok(computed) if computed == claimed => Verification::Valid,
        Ok(computed) => Verification::RootMismatch {
            claimed: claimed.to_string(),
            computed,
        },
        Err(_) => Verification::EmptyClaim,
    }
}

fn decode_text(encoded: &str) -> Result<String> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|err| LedgerError::Malformed(format!("invalid base64: {err}")))?;
    String::from_utf8(bytes).map_err(|err| LedgerError::Malformed(format!("invalid utf-8: {err}")))
}

fn parse_field(field: &str, name: &str) -> Result<u64> {
    field
        .parse::<u64>()
        .map_err(|_| LedgerError::Malformed(format!("invalid {name}: {field:?}")))
}

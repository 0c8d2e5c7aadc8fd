//! Collaborator-facing facade.
//!
//! A [`PrimeLedger`] is constructed once and handed by reference to whatever
//! front end drives it (web handlers, a menu, the `primeledger` binary).  It
//! owns the store and the miner; nothing is kept in process-wide statics.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{LedgerConfig, MinerConfig};
use crate::error::{LedgerError, Result};
use crate::proof::{ChainProof, TailProof, Verification};
use crate::scheduler::{MinerStats, MiningScheduler, SchedulerState};
use crate::store::{LedgerStatus, LedgerStore};

/// Result of checking a submitted proof string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProofVerdict {
    /// The proof matches the local ledger.
    Valid,
    /// The proof decoded but does not match; carries the reason.
    Invalid(String),
    /// The proof could not be decoded; carries the reason.
    Malformed(String),
}

impl ProofVerdict {
    /// Returns `true` for [`ProofVerdict::Valid`].
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

impl From<Verification> for ProofVerdict {
    fn from(verification: Verification) -> Self {
        match verification {
            Verification::Valid => Self::Valid,
            other => Self::Invalid(other.to_string()),
        }
    }
}

/// Ledger, miner and proof protocol behind one handle.
#[derive(Debug)]
pub struct PrimeLedger {
    store: Arc<LedgerStore>,
    scheduler: MiningScheduler,
}

impl PrimeLedger {
    /// Loads the ledger and starts mining when `config.autostart` is set.
    pub fn open(config: LedgerConfig) -> Result<Self> {
        let store = Arc::new(LedgerStore::open(&config.ledger_path)?);
        let ledger = Self::with_store(store, config.miner);
        if config.autostart {
            ledger.start()?;
        }
        Ok(ledger)
    }

    /// Wraps an already opened store without starting the miner.
    pub fn with_store(store: Arc<LedgerStore>, miner: MinerConfig) -> Self {
        let scheduler = MiningScheduler::new(Arc::clone(&store), miner);
        Self { store, scheduler }
    }

    /// Current count and most recent prime.
    pub fn status(&self) -> LedgerStatus {
        self.store.status()
    }

    /// Miner lifecycle state.
    pub fn miner_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// Miner progress counters.
    pub fn miner_stats(&self) -> MinerStats {
        self.scheduler.stats()
    }

    /// Generates a whole-chain proof string.
    pub fn share(&self) -> Result<String> {
        let proof = ChainProof::generate(&self.store)?;
        tracing::info!(count = proof.count, last = proof.last_prime, "chain proof generated");
        Ok(proof.encode())
    }

    /// Generates a tail proof string, pausing the miner while it is built.
    pub fn share_tail(&self) -> Result<String> {
        let proof = TailProof::generate(&self.store, &self.scheduler)?;
        tracing::info!(count = proof.count, "tail proof generated");
        Ok(proof.encode())
    }

    /// Checks a whole-chain proof string against the local ledger.
    pub fn verify(&self, encoded: &str) -> ProofVerdict {
        let verdict = match ChainProof::parse(encoded) {
            Ok(proof) => proof.verify(&self.store).into(),
            Err(err) => malformed(err),
        };
        tracing::info!(?verdict, "chain proof checked");
        verdict
    }

    /// Checks a tail proof string against the local ledger.
    pub fn verify_tail(&self, encoded: &str) -> ProofVerdict {
        let verdict = match TailProof::parse(encoded) {
            Ok(proof) => proof.verify(&self.store).into(),
            Err(err) => malformed(err),
        };
        tracing::info!(?verdict, "tail proof checked");
        verdict
    }

    /// Starts (or restarts) the miner.
    pub fn start(&self) -> Result<()> {
        self.scheduler.start()
    }

    /// Stops the miner and waits for it to exit.
    pub fn shutdown(&self) {
        self.scheduler.stop();
    }

    /// Underlying store.
    pub fn store(&self) -> &Arc<LedgerStore> {
        &self.store
    }

    /// Underlying scheduler.
    pub fn scheduler(&self) -> &MiningScheduler {
        &self.scheduler
    }
}

fn malformed(err: LedgerError) -> ProofVerdict {
    match err {
        LedgerError::Malformed(reason) => ProofVerdict::Malformed(reason),
        other => ProofVerdict::Malformed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::wait_until;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::tempdir;

    fn config(path: &Path) -> LedgerConfig {
        LedgerConfig {
            ledger_path: path.to_path_buf(),
            miner: MinerConfig {
                window_size: 1_000,
                interval: Duration::from_millis(1),
            },
            autostart: false,
        }
    }

    #[test]
    fn share_and_verify_round_trip() {
        let dir = tempdir().unwrap();
        let ledger = PrimeLedger::open(config(&dir.path().join("primes.csv"))).unwrap();
        assert!(matches!(ledger.share(), Err(LedgerError::EmptyLedger)));
        ledger.store().append(&[2, 3, 5, 7, 11]).unwrap();

        let proof = ledger.share().unwrap();
        assert_eq!(ledger.verify(&proof), ProofVerdict::Valid);
        assert_eq!(
            ledger.status(),
            LedgerStatus {
                count: 5,
                most_recent: Some(11)
            }
        );

        let tail = ledger.share_tail().unwrap();
        assert!(ledger.verify_tail(&tail).is_valid());
        assert_eq!(ledger.miner_state(), SchedulerState::Idle);
    }

    #[test]
    fn foreign_proofs_are_classified() {
        let dir = tempdir().unwrap();
        let long = PrimeLedger::open(config(&dir.path().join("long.csv"))).unwrap();
        long.store().append(&[2, 3, 5, 7, 11]).unwrap();
        let short = PrimeLedger::open(config(&dir.path().join("short.csv"))).unwrap();
        short.store().append(&[2, 3, 5]).unwrap();

        let proof = long.share().unwrap();
        assert!(matches!(short.verify(&proof), ProofVerdict::Invalid(_)));
        assert!(long.verify(&short.share().unwrap()).is_valid());
        assert!(matches!(long.verify("%%%"), ProofVerdict::Malformed(_)));
        assert!(matches!(
            long.verify(&long.share_tail().unwrap()),
            ProofVerdict::Malformed(_)
        ));
    }

    #[test]
    fn autostart_mines_until_shutdown() {
        let dir = tempdir().unwrap();
        let mut cfg = config(&dir.path().join("primes.csv"));
        cfg.autostart = true;
        let ledger = PrimeLedger::open(cfg).unwrap();
        assert!(ledger.scheduler().is_running());
        assert!(wait_until(|| ledger.status().count >= 168));
        ledger.shutdown();
        assert_eq!(ledger.miner_state(), SchedulerState::Stopped);
        assert_eq!(ledger.store().snapshot(168).unwrap().last(), Some(997));
        assert!(ledger.miner_stats().windows_mined >= 1);
    }
}

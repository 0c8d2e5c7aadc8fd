//! Runtime configuration for the ledger and its miner.
//!
//! Defaults are a `primes.csv` ledger in the working directory, 150 000-wide
//! windows and five seconds between windows.  Each can be overridden through
//! `PL_*` environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Ledger file used when `PL_LEDGER_PATH` is unset.
pub const DEFAULT_LEDGER_PATH: &str = "primes.csv";
/// Width of each sieve window when `PL_WINDOW_SIZE` is unset.
pub const DEFAULT_WINDOW_SIZE: u64 = 150_000;
/// Pause between windows when `PL_INTERVAL_MS` is unset.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// Settings for the background mining loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinerConfig {
    /// Number of integers swept per window.
    pub window_size: u64,
    /// Sleep between consecutive windows.
    pub interval: Duration,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            interval: DEFAULT_INTERVAL,
        }
    }
}

/// Top-level configuration consumed by [`PrimeLedger::open`](crate::PrimeLedger::open).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Comma-separated ledger file.
    pub ledger_path: PathBuf,
    /// Mining loop settings.
    pub miner: MinerConfig,
    /// Start the miner as soon as the ledger is opened.
    pub autostart: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            ledger_path: PathBuf::from(DEFAULT_LEDGER_PATH),
            miner: MinerConfig::default(),
            autostart: true,
        }
    }
}

impl LedgerConfig {
    /// Default configuration backed by `ledger_path`.
    pub fn new(ledger_path: impl Into<PathBuf>) -> Self {
        Self {
            ledger_path: ledger_path.into(),
            ..Self::default()
        }
    }

    /// Reads `PL_LEDGER_PATH`, `PL_WINDOW_SIZE`, `PL_INTERVAL_MS` and
    /// `PL_AUTOSTART`, falling back to defaults for unset or unparsable values.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`LedgerConfig::from_env`] but with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let ledger_path = lookup("PL_LEDGER_PATH")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.ledger_path);
        let window_size = lookup("PL_WINDOW_SIZE")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_WINDOW_SIZE);
        let interval = lookup("PL_INTERVAL_MS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_INTERVAL);
        let autostart = lookup("PL_AUTOSTART")
            .map(|v| parse_env_flag(&v))
            .unwrap_or(defaults.autostart);
        Self {
            ledger_path,
            miner: MinerConfig {
                window_size,
                interval,
            },
            autostart,
        }
    }
}

fn parse_env_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

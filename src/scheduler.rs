//! Background mining loop.
//!
//! A single worker thread sweeps consecutive sieve windows and appends each
//! result to the ledger.  Callers coordinate with it through one control block
//! guarded by a mutex and condition variable:
//!
//! * pausing blocks until any in-flight window has been appended and keeps the
//!   ledger frozen until the returned [`PauseGuard`] is dropped;
//! * stopping raises a cancellation flag that the worker checks before each
//!   window and while sleeping, then joins the thread.
//!
//! Shutdown latency is therefore bounded by the time to sweep one window.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};

use crate::config::MinerConfig;
use crate::error::{LedgerError, Result};
use crate::sieve::SieveWindow;
use crate::store::LedgerStore;

/// Lifecycle of the mining worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerState {
    /// No worker has been started yet.
    Idle,
    /// The worker is sweeping windows.
    Running,
    /// A caller holds at least one [`PauseGuard`].
    Paused,
    /// The worker exited after a stop request.
    Stopped,
    /// The worker died; the reason is kept for operators.
    Failed(String),
}

/// Progress counters for the current process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinerStats {
    /// Windows swept and appended.
    pub windows_mined: u64,
    /// Primes appended by this scheduler.
    pub primes_appended: u64,
    /// Start of the window the worker will sweep next.
    pub next_window_start: Option<u64>,
}

#[derive(Debug)]
struct Control {
    state: SchedulerState,
    stop: bool,
    pauses: usize,
    busy: bool,
    stats: MinerStats,
}

#[derive(Debug)]
struct Shared {
    control: Mutex<Control>,
    signal: Condvar,
}

impl Shared {
    fn fail(&self, reason: String) {
        let mut control = self.control.lock();
        control.busy = false;
        control.state = SchedulerState::Failed(reason);
        self.signal.notify_all();
    }
}

/// Owns the background worker that grows the ledger.
#[derive(Debug)]
pub struct MiningScheduler {
    store: Arc<LedgerStore>,
    config: MinerConfig,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MiningScheduler {
    /// Creates an idle scheduler over `store`.
    pub fn new(store: Arc<LedgerStore>, config: MinerConfig) -> Self {
        Self {
            store,
            config,
            shared: Arc::new(Shared {
                control: Mutex::new(Control {
                    state: SchedulerState::Idle,
                    stop: false,
                    pauses: 0,
                    busy: false,
                    stats: MinerStats::default(),
                }),
                signal: Condvar::new(),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Launches the worker.  Any previous worker is stopped and joined first,
    /// so at most one worker ever mutates the ledger.
    pub fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock();
        if let Some(handle) = worker.take() {
            self.retire(handle);
        }

        let first_start = self.store.most_recent().map_or(Ok(1), |tip| {
            tip.checked_add(1)
                .ok_or_else(|| LedgerError::Scheduler("ledger tip at u64::MAX".to_string()))
        })?;
        let window = SieveWindow::new(first_start, self.config.window_size)?;
        {
            let mut control = self.shared.control.lock();
            control.stop = false;
            control.busy = false;
            control.state = SchedulerState::Running;
            control.stats.next_window_start = Some(window.start);
        }

        let store = Arc::clone(&self.store);
        let shared = Arc::clone(&self.shared);
        let config = self.config.clone();
        let handle = thread::Builder::new()
            .name("prime-miner".to_string())
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    mine(&store, &shared, &config, window)
                }));
                if outcome.is_err() {
                    tracing::error!("miner thread panicked");
                    shared.fail("miner thread panicked".to_string());
                }
            })
            .map_err(|err| {
                self.shared.fail(format!("spawn failed: {err}"));
                LedgerError::Io(err)
            })?;
        tracing::info!(start = window.start, size = window.size, "miner started");
        *worker = Some(handle);
        Ok(())
    }

    /// Requests cancellation and blocks until the worker has exited.  No
    /// ledger mutation happens after this returns.
    pub fn stop(&self) {
        let mut worker = self.worker.lock();
        if let Some(handle) = worker.take() {
            self.retire(handle);
            tracing::info!(state = ?self.state(), "miner stopped");
        }
    }

    /// Freezes the ledger until the returned guard is dropped.
    ///
    /// Blocks while the worker is in the middle of a window.  Pauses nest;
    /// the worker resumes once every guard is gone.  Dropping the guard during
    /// unwinding also resumes, so a failing caller cannot strand the miner.
    pub fn pause(&self) -> PauseGuard {
        let mut control = self.shared.control.lock();
        control.pauses += 1;
        while control.busy {
            self.shared.signal.wait(&mut control);
        }
        drop(control);
        // Wake a sleeping worker so it parks on the pause instead.
        self.shared.signal.notify_all();
        PauseGuard {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Runs `f` with the miner paused.
    pub fn with_paused<R>(&self, f: impl FnOnce() -> R) -> R {
        let _paused = self.pause();
        f()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        let control = self.shared.control.lock();
        match &control.state {
            SchedulerState::Running if control.pauses > 0 => SchedulerState::Paused,
            other => other.clone(),
        }
    }

    /// Returns `true` while a worker is alive and not failed.
    pub fn is_running(&self) -> bool {
        matches!(
            self.state(),
            SchedulerState::Running | SchedulerState::Paused
        )
    }

    /// Progress counters.
    pub fn stats(&self) -> MinerStats {
        self.shared.control.lock().stats
    }

    /// Configuration the worker runs with.
    pub fn config(&self) -> &MinerConfig {
        &self.config
    }

    fn retire(&self, handle: JoinHandle<()>) {
        self.shared.control.lock().stop = true;
        self.shared.signal.notify_all();
        if handle.join().is_err() {
            self.shared.fail("miner thread panicked".to_string());
        }
        let mut control = self.shared.control.lock();
        if control.state == SchedulerState::Running {
            control.state = SchedulerState::Stopped;
        }
    }
}

impl Drop for MiningScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Keeps the miner paused while alive.
#[derive(Debug)]
#[must_use = "the miner resumes as soon as the guard is dropped"]
pub struct PauseGuard {
    shared: Arc<Shared>,
}

impl PauseGuard {
    /// Resumes the miner explicitly.
    pub fn resume(self) {}
}

impl Drop for PauseGuard {
    fn drop(&mut self) {
        let mut control = self.shared.control.lock();
        control.pauses = control.pauses.saturating_sub(1);
        self.shared.signal.notify_all();
    }
}

fn mine(store: &LedgerStore, shared: &Shared, config: &MinerConfig, mut window: SieveWindow) {
    loop {
        {
            let mut control = shared.control.lock();
            while control.pauses > 0 && !control.stop {
                shared.signal.wait(&mut control);
            }
            if control.stop {
                break;
            }
            control.busy = true;
        }

        let primes = window.sweep();
        let appended = store.append(&primes);

        let mut control = shared.control.lock();
        control.busy = false;
        shared.signal.notify_all();
        let count = match appended {
            Ok(count) => count,
            Err(err) => {
                tracing::error!(start = window.start, %err, "append failed, miner halting");
                control.state = SchedulerState::Failed(err.to_string());
                return;
            }
        };
        control.stats.windows_mined += 1;
        control.stats.primes_appended += primes.len() as u64;
        tracing::debug!(
            start = window.start,
            end = window.end(),
            found = primes.len(),
            count,
            "window mined"
        );

        window = match window.next() {
            Ok(next) => next,
            Err(err) => {
                tracing::error!(%err, "window range exhausted, miner halting");
                control.state = SchedulerState::Failed(err.to_string());
                return;
            }
        };
        control.stats.next_window_start = Some(window.start);

        if !control.stop && control.pauses == 0 {
            shared.signal.wait_while_for(
                &mut control,
                |control| !control.stop && control.pauses == 0,
                config.interval,
            );
        }
    }

    let mut control = shared.control.lock();
    if control.state == SchedulerState::Running {
        control.state = SchedulerState::Stopped;
    }
}

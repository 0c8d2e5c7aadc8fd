//! Helpers shared by the unit tests of the threaded modules.

use std::thread;
use std::time::{Duration, Instant};

/// Polls `condition` every few milliseconds for up to ten seconds.
pub(crate) fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

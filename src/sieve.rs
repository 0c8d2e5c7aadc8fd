//! Segmented sieve of Eratosthenes.
//!
//! A window `[start, start + size)` is swept completely, so consecutive
//! windows whose boundaries meet compose into exactly the primes of their
//! union.  Only the window itself and the base primes up to `sqrt(end)` are
//! held in memory.

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// Half-open numeric window `[start, start + size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SieveWindow {
    /// First number covered by the window.
    pub start: u64,
    /// Number of integers covered.
    pub size: u64,
}

impl SieveWindow {
    /// Creates a window, rejecting empty, zero-based, or overflowing ranges.
    pub fn new(start: u64, size: u64) -> Result<Self> {
        if start == 0 || size == 0 || start.checked_add(size).is_none() {
            return Err(LedgerError::InvalidRange { start, size });
        }
        Ok(Self { start, size })
    }

    /// Exclusive upper bound.
    pub fn end(&self) -> u64 {
        self.start + self.size
    }

    /// The adjacent window of the same width.
    pub fn next(&self) -> Result<Self> {
        Self::new(self.end(), self.size)
    }

    /// Sweeps the window and returns its primes in ascending order.
    pub fn sweep(&self) -> Vec<u64> {
        sweep(self.start, self.end())
    }
}

/// Returns all primes in `[start, start + size)` in ascending order.
pub fn compute_window(start: u64, size: u64) -> Result<Vec<u64>> {
    SieveWindow::new(start, size).map(|window| window.sweep())
}

/// Classic sieve returning every prime `<= limit`.
pub fn primes_up_to(limit: u64) -> Vec<u64> {
    if limit < 2 {
        return Vec::new();
    }
    let len = limit as usize + 1;
    let mut composite = vec![false; len];
    let mut i = 2usize;
    while i * i < len {
        if !composite[i] {
            let mut multiple = i * i;
            while multiple < len {
                composite[multiple] = true;
                multiple += i;
            }
        }
        i += 1;
    }
    (2..len)
        .filter(|n| !composite[*n])
        .map(|n| n as u64)
        .collect()
}

fn sweep(start: u64, end: u64) -> Vec<u64> {
    let low = start.max(2);
    if low >= end {
        return Vec::new();
    }
    let base = primes_up_to(isqrt(end - 1));
    let width = (end - low) as usize;
    let mut composite = vec![false; width];
    for p in base {
        // Strike from p*p upward, aligned to the first multiple inside the window.
        let square = p * p;
        let first = if square >= low {
            square
        } else {
            low.div_ceil(p) * p
        };
        let mut multiple = first;
        while multiple < end {
            composite[(multiple - low) as usize] = true;
            multiple = match multiple.checked_add(p) {
                Some(next) => next,
                None => break,
            };
        }
    }
    composite
        .iter()
        .enumerate()
        .filter(|(_, struck)| !**struck)
        .map(|(offset, _)| low + offset as u64)
        .collect()
}

fn isqrt(n: u64) -> u64 {
    let mut root = (n as f64).sqrt() as u64;
    while root.checked_mul(root).map_or(true, |sq| sq > n) {
        root -= 1;
    }
    while (root + 1).checked_mul(root + 1).map_or(false, |sq| sq <= n) {
        root += 1;
    }
    root
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn first_window_matches_known_primes() {
        assert_eq!(
            compute_window(1, 30).unwrap(),
            vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]
        );
    }

    #[test]
    fn invalid_windows_are_rejected() {
        assert!(matches!(
            compute_window(1, 0),
            Err(LedgerError::InvalidRange { start: 1, size: 0 })
        ));
        assert!(compute_window(0, 10).is_err());
        assert!(compute_window(u64::MAX, 2).is_err());
    }

    #[test]
    fn window_excludes_its_end() {
        assert_eq!(compute_window(11, 2).unwrap(), vec![11]);
        assert_eq!(compute_window(12, 1).unwrap(), Vec::<u64>::new());
        assert_eq!(compute_window(1, 2).unwrap(), Vec::<u64>::new());
    }

    #[test]
    fn composite_squares_inside_window_are_struck() {
        assert_eq!(compute_window(120, 10).unwrap(), vec![127]);
        assert_eq!(compute_window(9_990, 20).unwrap(), vec![10_007, 10_009]);
    }

    #[test]
    fn next_window_is_adjacent() {
        let window = SieveWindow::new(1, 150_000).unwrap();
        let next = window.next().unwrap();
        assert_eq!(next.start, 150_001);
        assert_eq!(next.size, 150_000);
    }

    #[test]
    fn isqrt_handles_boundaries() {
        assert_eq!(isqrt(0), 0);
        assert_eq!(isqrt(15), 3);
        assert_eq!(isqrt(16), 4);
        assert_eq!(isqrt(u64::MAX), u32::MAX as u64);
    }

    proptest! {
        #[test]
        fn adjacent_windows_compose(a in 1u64..5_000, ab in 1u64..2_000, bc in 1u64..2_000) {
            let b = a + ab;
            let c = b + bc;
            let mut split = compute_window(a, b - a).unwrap();
            split.extend(compute_window(b, c - b).unwrap());
            prop_assert_eq!(split, compute_window(a, c - a).unwrap());
        }

        #[test]
        fn window_matches_classic_sieve(start in 1u64..3_000, size in 1u64..1_500) {
            let expected: Vec<u64> = primes_up_to(start + size - 1)
                .into_iter()
                .filter(|p| *p >= start)
                .collect();
            prop_assert_eq!(compute_window(start, size).unwrap(), expected);
        }
    }
}

use log::info;

/// Sink for transfer progress.
///
/// Implementations must return quickly: the producer calls `report` inline
/// between chunk writes.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, sent: u64, total: u64);
}

impl<F> ProgressReporter for F
where
    F: Fn(u64, u64) + Send + Sync,
{
    fn report(&self, sent: u64, total: u64) {
        self(sent, total)
    }
}

/// Reporter that logs the machine-readable line `u<sent>:<total>|<fraction>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ProgressReporter for LogReporter {
    fn report(&self, sent: u64, total: u64) {
        info!("{}", format_progress(sent, total));
    }
}

/// Completed fraction in `[0, 1]`; an empty transfer reports `0.0`.
pub fn fraction(sent: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    sent.min(total) as f64 / total as f64
}

pub fn format_progress(sent: u64, total: u64) -> String {
    format!("u{}:{}|{:.3}", sent, total, fraction(sent, total))
}

/// Byte counter for one transfer.
///
/// `total` is fixed when the transfer starts and `sent` only grows; it can never
/// pass `total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressState {
    sent: u64,
    total: u64,
}

impl ProgressState {
    pub fn new(total: u64) -> Self {
        Self { sent: 0, total }
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn remaining(&self) -> u64 {
        self.total - self.sent
    }

    pub fn is_complete(&self) -> bool {
        self.sent == self.total
    }

    /// Record `n` more bytes. Returns `None`, leaving the state untouched, if
    /// that would exceed the declared total.
    pub fn advance(&mut self, n: u64) -> Option<u64> {
        let next = self.sent.checked_add(n).filter(|next| *next <= self.total)?;
        self.sent = next;
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_fraction_zero_total() {
        assert_eq!(fraction(0, 0), 0.0);
        assert_eq!(format_progress(0, 0), "u0:0|0.000");
    }

    #[test]
    fn test_fraction_values() {
        assert_eq!(fraction(50, 100), 0.5);
        assert_eq!(fraction(100, 100), 1.0);
        assert_eq!(format_progress(1, 3), "u1:3|0.333");
    }

    #[test]
    fn test_advance_is_bounded() {
        let mut state = ProgressState::new(10);
        assert_eq!(state.advance(4), Some(4));
        assert_eq!(state.advance(6), Some(10));
        assert!(state.is_complete());
        assert_eq!(state.advance(1), None);
        assert_eq!(state.sent(), 10);
        assert_eq!(state.remaining(), 0);
    }

    #[test]
    fn test_advance_overflow() {
        let mut state = ProgressState::new(u64::MAX);
        assert_eq!(state.advance(u64::MAX), Some(u64::MAX));
        assert_eq!(state.advance(1), None);
    }

    #[test]
    fn test_closure_reporter() {
        let seen = Mutex::new(Vec::new());
        let reporter = |sent: u64, total: u64| seen.lock().unwrap().push((sent, total));
        reporter.report(1, 2);
        reporter.report(2, 2);
        assert_eq!(*seen.lock().unwrap(), vec![(1, 2), (2, 2)]);
    }
}

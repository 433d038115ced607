//! Batch completion percentage.

use derive_more::Display;

/// Percent of the current batch that has been attempted, in `0..=100`.
///
/// Zero doubles as "no batch running" and is also what single-file batches
/// show for their whole run.
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[display("{_0}%")]
pub struct BatchProgress(u8);

impl BatchProgress {
    pub const IDLE: Self = Self(0);

    pub fn percent(self) -> u8 {
        self.0
    }

    /// Progress to report once the item at `index` (0-based) of a `total`
    /// item batch has been attempted, successful or not.
    ///
    /// Returns `None` for batches of fewer than two items, which do not
    /// report per-item progress.
    ///
    /// ```
    /// use ncmdrop_queue::BatchProgress;
    ///
    /// assert_eq!(BatchProgress::after_attempt(0, 3).map(BatchProgress::percent), Some(33));
    /// assert_eq!(BatchProgress::after_attempt(2, 3).map(BatchProgress::percent), Some(100));
    /// assert_eq!(BatchProgress::after_attempt(0, 1), None);
    /// ```
    pub fn after_attempt(index: usize, total: usize) -> Option<Self> {
        if total < 2 || index >= total {
            return None;
        }
        let percent = (index + 1).saturating_mul(100) / total;
        // Infallible: index < total, so percent is at most 100.
        Some(Self(u8::try_from(percent).unwrap_or(100)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(2, &[50, 100])]
    #[case(3, &[33, 66, 100])]
    #[case(4, &[25, 50, 75, 100])]
    #[case(7, &[14, 28, 42, 57, 71, 85, 100])]
    fn test_after_attempt(#[case] total: usize, #[case] expected: &[u8]) {
        let seen: Vec<u8> = (0..total)
            .map(|i| BatchProgress::after_attempt(i, total).unwrap().percent())
            .collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_monotonic() {
        for total in 2..=250 {
            let seen: Vec<BatchProgress> = (0..total).filter_map(|i| BatchProgress::after_attempt(i, total)).collect();
            assert_eq!(seen.len(), total);
            if total <= 100 {
                assert!(seen.windows(2).all(|w| w[0] < w[1]), "not strictly increasing for {total}");
            } else {
                assert!(seen.windows(2).all(|w| w[0] <= w[1]), "not monotonic for {total}");
            }
            assert_eq!(seen.last().map(|p| p.percent()), Some(100));
        }
    }

    #[rstest]
    #[case(0, 0)]
    #[case(0, 1)]
    #[case(3, 3)]
    fn test_no_progress(#[case] index: usize, #[case] total: usize) {
        assert_eq!(BatchProgress::after_attempt(index, total), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(BatchProgress::IDLE.to_string(), "0%");
        assert_eq!(BatchProgress::after_attempt(1, 2).unwrap().to_string(), "100%");
    }
}

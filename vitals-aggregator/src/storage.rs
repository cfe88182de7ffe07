use jiff::{SignedDuration, Timestamp};
use vitals_core::{Sample, Thresholds};

/// Statistics about retained samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of samples currently retained.
    pub samples_total: usize,
    /// Number of retained samples carrying a heart rate.
    pub heart_rate_samples: usize,
    /// Number of retained samples carrying a sleep duration.
    pub sleep_samples: usize,
    /// Samples purged by retention since the store was created.
    pub samples_purged: u64,
    /// Timestamp of the oldest retained sample.
    pub oldest: Option<Timestamp>,
    /// Timestamp of the newest retained sample.
    pub newest: Option<Timestamp>,
}

/// In-memory sample history bounded by a trailing time window.
///
/// Expired samples are dropped on every append, never in the background.
pub(crate) struct SampleStore {
    samples: Vec<Sample>,
    window: SignedDuration,
    purged: u64,
}

impl SampleStore {
    pub(crate) fn new(window: SignedDuration) -> Self {
        Self {
            samples: Vec::new(),
            window,
            purged: 0,
        }
    }

    /// Insert `sample` in timestamp order, then purge everything at or
    /// before `now - window`. Returns the number of purged samples.
    pub(crate) fn append(&mut self, sample: Sample, now: Timestamp) -> usize {
        let at = self
            .samples
            .partition_point(|s| s.timestamp() <= sample.timestamp());
        self.samples.insert(at, sample);

        self.purge(now)
    }

    fn purge(&mut self, now: Timestamp) -> usize {
        let cutoff = now.checked_sub(self.window).unwrap_or(Timestamp::MIN);

        let before = self.samples.len();
        self.samples.retain(|s| s.timestamp() > cutoff);
        let purged = before - self.samples.len();

        self.purged += purged as u64;
        purged
    }

    /// All retained samples, oldest first.
    pub(crate) fn history(&self) -> Vec<Sample> {
        self.samples.clone()
    }

    pub(crate) fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Relabel every sample. Returns how many samples changed.
    pub(crate) fn reclassify(&mut self, thresholds: &Thresholds) -> usize {
        self.samples
            .iter_mut()
            .map(|s| s.reclassify(thresholds))
            .filter(|changed| *changed)
            .count()
    }

    pub(crate) fn stats(&self) -> StoreStats {
        StoreStats {
            samples_total: self.samples.len(),
            heart_rate_samples: self
                .samples
                .iter()
                .filter(|s| s.heart_rate().is_some())
                .count(),
            sleep_samples: self
                .samples
                .iter()
                .filter(|s| s.sleep_duration().is_some())
                .count(),
            samples_purged: self.purged,
            oldest: self.samples.first().map(Sample::timestamp),
            newest: self.samples.last().map(Sample::timestamp),
        }
    }
}

//! Total ordering for host times.
//!
//! Host times are plain `f64` frames. The caches in this crate are built on
//! sorted maps, so times are wrapped in [`TimeKey`] which orders via
//! `f64::total_cmp`.

use std::cmp::Ordering;

/// An `f64` time usable as a `BTreeMap`/`BTreeSet` key.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TimeKey(f64);

impl TimeKey {
    #[must_use]
    pub fn new(time: f64) -> Self {
        Self(time)
    }

    #[must_use]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl Eq for TimeKey {}

impl PartialOrd for TimeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl From<f64> for TimeKey {
    fn from(time: f64) -> Self {
        Self(time)
    }
}

impl From<TimeKey> for f64 {
    fn from(key: TimeKey) -> Self {
        key.0
    }
}

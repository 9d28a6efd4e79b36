//! Per-object transform matrix cache.
//!
//! Maps time to a 4x4 matrix, filled on demand and never evicted; entries
//! only disappear through [`MatrixCache::clear`]. Evaluation of the
//! underlying transform is the caller's concern and is passed in as a
//! closure so the cache itself stays host-free.

use std::collections::BTreeMap;

use glam::DMat4;

use crate::time::TimeKey;

#[derive(Debug, Default)]
pub struct MatrixCache {
    entries: BTreeMap<TimeKey, DMat4>,
}

impl MatrixCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the matrix for `time`, evaluating and inserting it if absent
    /// or if `force` is set.
    pub fn ensure_with(
        &mut self,
        time: f64,
        force: bool,
        eval: impl FnOnce(f64) -> DMat4,
    ) -> DMat4 {
        let key = TimeKey::new(time);
        if force {
            let m = eval(time);
            self.entries.insert(key, m);
            return m;
        }
        *self.entries.entry(key).or_insert_with(|| eval(time))
    }

    #[must_use]
    pub fn get(&self, time: f64) -> Option<DMat4> {
        self.entries.get(&TimeKey::new(time)).copied()
    }

    #[must_use]
    pub fn contains(&self, time: f64) -> bool {
        self.entries.contains_key(&TimeKey::new(time))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

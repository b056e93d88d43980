//! Per-worker model cache keyed by segmentation label.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use super::model::RegressionModel;

/// Regression models already fitted by one worker, one per segment label.
///
/// The first pixel of a segment pays for the fit; every later pixel with
/// the same label reuses it. Pixels without a label are never cached.
/// A cache lives exactly as long as the worker that owns it.
#[derive(Debug, Default)]
pub struct RegressionCache {
    models: HashMap<i64, RegressionModel>,
    uncached: Option<RegressionModel>,
}

impl RegressionCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the model for `label`, calling `fit` only on a miss.
    ///
    /// The flag is `true` when the model came from the cache. With no label
    /// the fit always runs and its result is held only until the next call.
    pub fn get_or_fit<F>(&mut self, label: Option<i64>, fit: F) -> (&RegressionModel, bool)
    where
        F: FnOnce() -> RegressionModel,
    {
        let Some(label) = label else {
            return (self.uncached.insert(fit()), false);
        };

        match self.models.entry(label) {
            Entry::Occupied(entry) => (entry.into_mut(), true),
            Entry::Vacant(entry) => (entry.insert(fit()), false),
        }
    }

    /// Number of cached labels.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

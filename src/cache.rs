use std::collections::HashMap;
use std::sync::Arc;

use crate::aggregation::{Dimension, SeriesPoint};
use crate::store::QueryFilter;

/// A write to the record store that may stale cached series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteEvent {
    /// Activity records were added, changed or removed for these years.
    Activities { years: Vec<i32> },
    /// The whole activity set was replaced.
    ActivitiesReplaced,
    /// Targets or measures changed. Series do not depend on them.
    Targets,
    Measures,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Memoized aggregate series keyed by `(dimension, filter)`.
///
/// Nothing is invalidated implicitly: whoever writes to the store must call
/// [`MetricsCache::on_write`] (or [`MetricsCache::invalidate_all`]).
#[derive(Debug, Default)]
pub struct MetricsCache {
    entries: HashMap<(Dimension, QueryFilter), Arc<Vec<SeriesPoint>>>,
    hits: u64,
    misses: u64,
}

impl MetricsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, dimension: Dimension, filter: &QueryFilter) -> Option<Arc<Vec<SeriesPoint>>> {
        self.entries.get(&(dimension, filter.clone())).cloned()
    }

    pub fn get_or_compute<F>(
        &mut self,
        dimension: Dimension,
        filter: &QueryFilter,
        compute: F,
    ) -> Arc<Vec<SeriesPoint>>
    where
        F: FnOnce() -> Vec<SeriesPoint>,
    {
        let key = (dimension, filter.clone());
        if let Some(series) = self.entries.get(&key) {
            self.hits += 1;
            tracing::debug!(%dimension, ?filter, "Series cache hit");
            return Arc::clone(series);
        }

        self.misses += 1;
        tracing::debug!(%dimension, ?filter, "Series cache miss");
        let series = Arc::new(compute());
        self.entries.insert(key, Arc::clone(&series));
        series
    }

    /// Invalidation hook for store writes.
    pub fn on_write(&mut self, event: &WriteEvent) {
        match event {
            WriteEvent::Activities { years } => {
                let before = self.entries.len();
                self.entries
                    .retain(|(_, filter), _| !filter.may_include_any_year(years));
                tracing::debug!(
                    ?years,
                    dropped = before - self.entries.len(),
                    "Invalidated series for written years"
                );
            }
            WriteEvent::ActivitiesReplaced => self.invalidate_all(),
            WriteEvent::Targets | WriteEvent::Measures => {}
        }
    }

    pub fn invalidate_dimension(&mut self, dimension: Dimension) {
        self.entries.retain(|(d, _), _| *d != dimension);
    }

    pub fn invalidate_all(&mut self) {
        if !self.entries.is_empty() {
            tracing::debug!(dropped = self.entries.len(), "Invalidated all cached series");
        }
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.entries.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(label: &str) -> Vec<SeriesPoint> {
        vec![SeriesPoint {
            key: crate::aggregation::BucketKey::Label(label.to_string()),
            label: label.to_string(),
            total_kg: 1000.0,
            total_t: 1.0,
            count: 1,
        }]
    }

    #[test]
    fn test_second_lookup_hits() {
        let mut cache = MetricsCache::new();
        let filter = QueryFilter::default();
        let mut calls = 0;
        for _ in 0..3 {
            cache.get_or_compute(Dimension::Location, &filter, || {
                calls += 1;
                point("Berlin")
            });
        }
        assert_eq!(calls, 1);
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (2, 1, 1));
    }

    #[test]
    fn test_filters_are_separate_entries() {
        let mut cache = MetricsCache::new();
        cache.get_or_compute(Dimension::Year, &QueryFilter::default(), || point("a"));
        cache.get_or_compute(Dimension::Year, &QueryFilter::for_year(2023), || point("b"));
        assert_eq!(cache.stats().entries, 2);
        let cached = cache.get(Dimension::Year, &QueryFilter::for_year(2023)).unwrap();
        assert_eq!(cached[0].label, "b");
    }

    #[test]
    fn test_activity_write_drops_matching_years_only() {
        let mut cache = MetricsCache::new();
        cache.get_or_compute(Dimension::Year, &QueryFilter::default(), || point("all"));
        cache.get_or_compute(Dimension::Year, &QueryFilter::for_year(2022), || point("2022"));
        cache.get_or_compute(Dimension::Year, &QueryFilter::for_year(2023), || point("2023"));

        cache.on_write(&WriteEvent::Activities { years: vec![2023] });

        assert!(cache.get(Dimension::Year, &QueryFilter::default()).is_none());
        assert!(cache.get(Dimension::Year, &QueryFilter::for_year(2023)).is_none());
        assert!(cache.get(Dimension::Year, &QueryFilter::for_year(2022)).is_some());
    }

    #[test]
    fn test_target_write_keeps_series() {
        let mut cache = MetricsCache::new();
        cache.get_or_compute(Dimension::Department, &QueryFilter::default(), || point("IT"));
        cache.on_write(&WriteEvent::Targets);
        assert_eq!(cache.stats().entries, 1);
        cache.on_write(&WriteEvent::ActivitiesReplaced);
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_invalidate_dimension() {
        let mut cache = MetricsCache::new();
        cache.get_or_compute(Dimension::Location, &QueryFilter::default(), || point("a"));
        cache.get_or_compute(Dimension::Category, &QueryFilter::default(), || point("b"));
        cache.invalidate_dimension(Dimension::Location);
        assert!(cache.get(Dimension::Location, &QueryFilter::default()).is_none());
        assert!(cache.get(Dimension::Category, &QueryFilter::default()).is_some());
    }
}

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::Prediction;
use crate::error::FetchError;

/// Shared handle: the fetch task writes, the decision loop reads
pub type SharedPredictions = Arc<RwLock<PredictionCache>>;

/// Last successfully fetched prediction.
///
/// Replaced as a whole on every successful fetch; failures leave the previous
/// values in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictionCache {
    latest: Option<Prediction>,
    fetched_at: Option<DateTime<Utc>>,
    /// Incremented on every successful publish
    sequence: u64,
    consecutive_failures: u32,
    last_error: Option<FetchError>,
}

impl PredictionCache {
    pub fn shared() -> SharedPredictions {
        Arc::new(RwLock::new(Self::default()))
    }

    pub fn publish(&mut self, prediction: Prediction, fetched_at: DateTime<Utc>) {
        self.latest = Some(prediction);
        self.fetched_at = Some(fetched_at);
        self.sequence += 1;
        self.consecutive_failures = 0;
        self.last_error = None;
    }

    pub fn record_failure(&mut self, err: FetchError) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_error = Some(err);
    }

    pub fn latest(&self) -> Option<&Prediction> {
        self.latest.as_ref()
    }

    /// Generation to use this cycle: last known value, 0 if never fetched
    pub fn generation_w(&self) -> f64 {
        self.latest.as_ref().map(|p| p.generation_w).unwrap_or(0.0)
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_error(&self) -> Option<&FetchError> {
        self.last_error.as_ref()
    }

    /// Age of the held prediction, `None` if never fetched
    pub fn age(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.fetched_at.map(|t| now - t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(generation_w: f64) -> Prediction {
        Prediction {
            generation_w,
            consumption_w: 800.0,
            soc_hint_percent: 55.0,
        }
    }

    #[test]
    fn test_generation_defaults_to_zero() {
        let cache = PredictionCache::default();
        assert_eq!(cache.generation_w(), 0.0);
        assert_eq!(cache.sequence(), 0);
        assert!(cache.age(Utc::now()).is_none());
    }

    #[test]
    fn test_failure_keeps_previous_values() {
        let mut cache = PredictionCache::default();
        cache.publish(prediction(2500.0), Utc::now());
        cache.record_failure(FetchError::Transport("connection refused".into()));
        cache.record_failure(FetchError::Parse("eof".into()));

        assert_eq!(cache.generation_w(), 2500.0);
        assert_eq!(cache.sequence(), 1);
        assert_eq!(cache.consecutive_failures(), 2);
        assert_eq!(cache.last_error(), Some(&FetchError::Parse("eof".into())));
    }

    #[test]
    fn test_publish_resets_failures() {
        let mut cache = PredictionCache::default();
        cache.record_failure(FetchError::Transport("down".into()));
        cache.publish(prediction(100.0), Utc::now());
        assert_eq!(cache.consecutive_failures(), 0);
        assert!(cache.last_error().is_none());
        assert_eq!(cache.sequence(), 1);
    }

    #[test]
    fn test_age_counts_from_fetch() {
        let fetched_at = Utc::now();
        let mut cache = PredictionCache::default();
        cache.publish(prediction(100.0), fetched_at);
        let age = cache.age(fetched_at + chrono::Duration::seconds(90));
        assert_eq!(age, Some(chrono::Duration::seconds(90)));
    }

    #[tokio::test]
    async fn test_shared_publish_is_seen_whole() {
        let shared = PredictionCache::shared();
        shared.write().await.publish(prediction(1234.0), Utc::now());
        let view = shared.read().await.clone();
        assert_eq!(view.latest(), Some(&prediction(1234.0)));
    }
}
